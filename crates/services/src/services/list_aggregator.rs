//! List screens: the whole table, decorated, with statistics computed over
//! every row and search/pagination applied afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use db::store::{DataStore, OrderBy, StoreError, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use ts_rs::TS;

use super::{
    decorator::{ViewModel, decorate},
    load_scope::{LoadError, LoadScope},
    reference_resolver::{ReferenceResolver, ResolveMode},
    registry::{DERIVED_STATUS_FIELD, EntitySpec},
    schedule::derive_status,
    timezone,
};

pub const PAGE_SIZE: usize = 10;
pub const TREND_DAYS: usize = 7;
const UNKNOWN_STATUS: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("could not load {table}: {source}")]
    Fetch {
        table: Table,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct TrendBucket {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ListStats {
    pub total: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub amount_total: Option<f64>,
    pub trend: Vec<TrendBucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListPage {
    pub rows: Vec<ViewModel>,
    pub page: usize,
    pub page_count: usize,
    pub filtered_total: usize,
    pub stats: ListStats,
}

/// Sets the entity's derived fields: window status and localized times.
pub fn apply_derived_fields(view: &mut ViewModel, spec: &EntitySpec, reference: DateTime<Utc>) {
    if let Some(window) = spec.active_window {
        let status = derive_status(
            view.get_str(window.start_field),
            view.get_str(window.end_field),
            reference,
        );
        view.set(DERIVED_STATUS_FIELD, Value::String(status.to_string()));
    }
    if let Some(local) = spec.local_time {
        let rendered = match (view.get_str(local.instant_field), view.get_str(local.zone_field)) {
            (Some(instant), Some(zone)) => timezone::localize(instant, zone),
            _ => None,
        };
        view.set(
            local.target_field,
            rendered.map(Value::String).unwrap_or(Value::Null),
        );
    }
}

fn searchable_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Case-insensitive substring match over `fields`. An empty query matches.
pub fn matches_query(view: &ViewModel, fields: &[&str], query: &str) -> bool {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields.iter().any(|field| {
        view.get(field)
            .and_then(searchable_text)
            .is_some_and(|text| text.contains(&needle))
    })
}

fn amount(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The `TREND_DAYS` most recent distinct days present in `rows`, ascending.
pub fn trend(rows: &[ViewModel], field: &str) -> Vec<TrendBucket> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for day in rows
        .iter()
        .filter_map(|row| row.get_str(field))
        .filter_map(utils::dates::parse_day)
    {
        *per_day.entry(day).or_default() += 1;
    }
    let skip = per_day.len().saturating_sub(TREND_DAYS);
    per_day
        .into_iter()
        .skip(skip)
        .map(|(date, count)| TrendBucket { date, count })
        .collect()
}

pub fn compute_stats(rows: &[ViewModel], spec: &EntitySpec) -> ListStats {
    let status_field = if spec.active_window.is_some() {
        Some(DERIVED_STATUS_FIELD)
    } else {
        spec.status_field
    };

    let mut status_counts = BTreeMap::new();
    if let Some(field) = status_field {
        for row in rows {
            let status = row.get_str(field).unwrap_or(UNKNOWN_STATUS).to_string();
            *status_counts.entry(status).or_default() += 1;
        }
    }

    let amount_total = spec
        .amount_field
        .map(|field| rows.iter().filter_map(|row| amount(row.get(field))).sum());

    ListStats {
        total: rows.len(),
        status_counts,
        amount_total,
        trend: trend(rows, spec.trend_field),
    }
}

fn paginate(rows: Vec<ViewModel>, page: usize) -> (Vec<ViewModel>, usize) {
    let page_count = rows.len().div_ceil(PAGE_SIZE).max(1);
    let start = (page - 1).saturating_mul(PAGE_SIZE);
    let rows = rows.into_iter().skip(start).take(PAGE_SIZE).collect();
    (rows, page_count)
}

pub struct ListAggregator<'a> {
    store: &'a dyn DataStore,
}

impl<'a> ListAggregator<'a> {
    pub fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// Every row of the table, decorated and derived, newest first.
    pub async fn load_all(
        &self,
        spec: &EntitySpec,
        scope: &LoadScope,
        reference: DateTime<Utc>,
    ) -> Result<Vec<ViewModel>, ListError> {
        let records = scope
            .run(self.store.fetch_all(spec.table, &OrderBy::newest_first()))
            .await?
            .map_err(|source| ListError::Fetch {
                table: spec.table,
                source,
            })?;

        let resolver = ReferenceResolver::new(self.store, ResolveMode::Batched);
        let refs = scope
            .child()
            .run(resolver.resolve(&spec.joins, &records))
            .await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let mut view = decorate(record, &spec.joins, &refs);
                apply_derived_fields(&mut view, spec, reference);
                view
            })
            .collect())
    }

    pub async fn load(
        &self,
        spec: &EntitySpec,
        query: &ListQuery,
        scope: &LoadScope,
        reference: DateTime<Utc>,
    ) -> Result<ListPage, ListError> {
        let rows = self.load_all(spec, scope, reference).await?;
        let stats = compute_stats(&rows, spec);

        let needle = query.q.as_deref().unwrap_or_default();
        let filtered: Vec<ViewModel> = rows
            .into_iter()
            .filter(|row| matches_query(row, spec.searchable, needle))
            .collect();
        let filtered_total = filtered.len();

        let page = query.page.unwrap_or(1).max(1);
        let (rows, page_count) = paginate(filtered, page);
        debug!(
            table = %spec.table,
            total = stats.total,
            filtered_total,
            page,
            "Aggregated list"
        );
        info!(table = %spec.table, rows = rows.len(), "Loaded list page");

        Ok(ListPage {
            rows,
            page,
            page_count,
            filtered_total,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use db::store::memory::MemoryStore;
    use serde_json::json;

    use super::*;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    fn view(value: Value) -> ViewModel {
        ViewModel::from(value.as_object().cloned().unwrap())
    }

    fn seeded_jobs(count: usize) -> MemoryStore {
        let store = MemoryStore::new();
        let rows = (0..count)
            .map(|i| {
                json!({
                    "id": format!("j{i:02}"),
                    "title": if i % 3 == 0 { format!("Floral Arch {i}") } else { format!("DJ set {i}") },
                    "vendor_id": if i % 2 == 0 { json!("v1") } else { Value::Null },
                    "status": if i % 4 == 0 { json!("closed") } else { json!("open") },
                    "budget": 100.0,
                    "created_at": format!("2026-03-{:02}T09:00:00.000Z", 1 + i % 10),
                })
            })
            .collect();
        store.seed(Table::Jobs, rows);
        store.seed(Table::Vendors, vec![json!({ "id": "v1", "business_name": "Bloom" })]);
        store
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let row = view(json!({ "title": "Floral Arch", "category": "Flowers" }));
        assert!(matches_query(&row, &["title", "category"], "floral"));
        assert!(matches_query(&row, &["title", "category"], "OWERS"));
        assert!(!matches_query(&row, &["title"], "owers"));
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let row = view(json!({ "title": null }));
        assert!(matches_query(&row, &["title"], ""));
    }

    #[test]
    fn test_whitespace_is_part_of_the_query() {
        let row = view(json!({ "title": "Archway" }));
        assert!(!matches_query(&row, &["title"], " "));
        assert!(!matches_query(&row, &["title"], "arch "));
        assert!(matches_query(&view(json!({ "title": "Floral Arch" })), &["title"], "l a"));
    }

    #[test]
    fn test_trend_keeps_seven_most_recent_days_ascending() {
        let rows: Vec<ViewModel> = (1..=10)
            .flat_map(|day| {
                (0..day).map(move |_| view(json!({ "created_at": format!("2026-02-{day:02}T23:59:00Z") })))
            })
            .collect();
        let buckets = trend(&rows, "created_at");
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].date, NaiveDate::from_ymd_opt(2026, 2, 4).unwrap());
        assert_eq!(buckets[0].count, 4);
        assert_eq!(buckets[6].date, NaiveDate::from_ymd_opt(2026, 2, 10).unwrap());
        assert_eq!(buckets[6].count, 10);
        assert!(buckets.windows(2).all(|pair| pair[0].date < pair[1].date));
    }

    #[test]
    fn test_trend_counts_by_date_not_datetime() {
        let rows = vec![
            view(json!({ "created_at": "2026-02-01T00:00:00Z" })),
            view(json!({ "created_at": "2026-02-01T23:59:59Z" })),
            view(json!({ "created_at": "2026-02-01" })),
            view(json!({ "created_at": "garbage" })),
        ];
        assert_eq!(
            trend(&rows, "created_at"),
            vec![TrendBucket {
                date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                count: 3
            }]
        );
    }

    #[test]
    fn test_status_histogram_counts_missing_as_unknown() {
        let spec = EntitySpec::for_table(Table::Issues);
        let rows = vec![
            view(json!({ "status": "open" })),
            view(json!({ "status": "open" })),
            view(json!({ "status": null })),
        ];
        let stats = compute_stats(&rows, &spec);
        assert_eq!(stats.status_counts.get("open"), Some(&2));
        assert_eq!(stats.status_counts.get("unknown"), Some(&1));
        assert_eq!(stats.amount_total, None);
    }

    #[test]
    fn test_windowed_entities_count_derived_status() {
        let spec = EntitySpec::for_table(Table::Ads);
        let mut rows = vec![
            view(json!({ "start_date": "2026-03-01", "end_date": "2026-03-15", "price": 150 })),
            view(json!({ "start_date": "2026-01-01", "end_date": "2026-01-31", "price": "90.5" })),
        ];
        for row in &mut rows {
            apply_derived_fields(row, &spec, reference());
        }
        let stats = compute_stats(&rows, &spec);
        assert_eq!(stats.status_counts.get("Active"), Some(&1));
        assert_eq!(stats.status_counts.get("Inactive"), Some(&1));
        assert_eq!(stats.amount_total, Some(240.5));
    }

    #[test]
    fn test_local_time_is_derived_for_events() {
        let spec = EntitySpec::for_table(Table::Events);
        let mut row = view(json!({ "event_date": "2026-06-01T14:00:00Z", "timezone": "+05:30" }));
        apply_derived_fields(&mut row, &spec, reference());
        assert_eq!(row.get_str("event_date_local"), Some("2026-06-01T19:30:00+05:30"));

        let mut row = view(json!({ "event_date": "2026-06-01T14:00:00Z", "timezone": null }));
        apply_derived_fields(&mut row, &spec, reference());
        assert_eq!(row.get("event_date_local"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_stats_cover_full_set_while_rows_are_filtered_and_paged() {
        let store = seeded_jobs(25);
        let spec = EntitySpec::for_table(Table::Jobs);
        let query = ListQuery {
            q: Some("floral".to_string()),
            page: Some(1),
        };
        let page = ListAggregator::new(&store)
            .load(&spec, &query, &LoadScope::new(), reference())
            .await
            .unwrap();

        assert_eq!(page.stats.total, 25);
        assert_eq!(page.stats.amount_total, Some(2500.0));
        assert_eq!(page.stats.status_counts.get("closed"), Some(&7));
        assert_eq!(page.filtered_total, 9);
        assert_eq!(page.rows.len(), 9);
        assert_eq!(page.page_count, 1);
    }

    #[tokio::test]
    async fn test_pages_hold_page_size_rows() {
        let store = seeded_jobs(25);
        let spec = EntitySpec::for_table(Table::Jobs);
        let aggregator = ListAggregator::new(&store);
        let scope = LoadScope::new();

        let third = aggregator
            .load(&spec, &ListQuery { q: None, page: Some(3) }, &scope, reference())
            .await
            .unwrap();
        assert_eq!(third.page_count, 3);
        assert_eq!(third.rows.len(), 5);

        let beyond = aggregator
            .load(&spec, &ListQuery { q: None, page: Some(9) }, &scope, reference())
            .await
            .unwrap();
        assert!(beyond.rows.is_empty());
        assert_eq!(beyond.filtered_total, 25);
    }

    #[tokio::test]
    async fn test_list_references_are_batched_once_per_table() {
        let store = seeded_jobs(25);
        let spec = EntitySpec::for_table(Table::Jobs);
        let page = ListAggregator::new(&store)
            .load(&spec, &ListQuery::default(), &LoadScope::new(), reference())
            .await
            .unwrap();

        let vendor_lookups: Vec<_> = store
            .lookups()
            .into_iter()
            .filter(|(table, _)| *table == Table::Vendors)
            .collect();
        assert_eq!(vendor_lookups.len(), 1);
        assert_eq!(vendor_lookups[0].1, vec!["v1".to_string()]);
        assert!(page.rows.iter().all(|row| row.get("vendor_name").is_some_and(Value::is_string)));
    }

    #[tokio::test]
    async fn test_failed_table_fetch_is_an_error() {
        let store = seeded_jobs(3);
        store.fail_reads(Table::Jobs);
        let spec = EntitySpec::for_table(Table::Jobs);
        let err = ListAggregator::new(&store)
            .load(&spec, &ListQuery::default(), &LoadScope::new(), reference())
            .await
            .unwrap_err();
        assert!(matches!(err, ListError::Fetch { table: Table::Jobs, .. }));
    }
}
