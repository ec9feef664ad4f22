//! Per-table screen definitions: which references to resolve, which fields
//! the search box looks at, and which derived values and statistics apply.

use db::store::Table;

use super::reference_resolver::{JoinPath, JoinSpec, UNKNOWN};

/// Start/end columns of a validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start_field: &'static str,
    pub end_field: &'static str,
}

/// Renders `instant_field` in the zone stored in `zone_field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub instant_field: &'static str,
    pub zone_field: &'static str,
    pub target_field: &'static str,
}

#[derive(Debug, Clone)]
pub struct EntitySpec {
    pub table: Table,
    pub joins: Vec<JoinSpec>,
    pub searchable: &'static [&'static str],
    pub status_field: Option<&'static str>,
    pub amount_field: Option<&'static str>,
    pub trend_field: &'static str,
    pub active_window: Option<ActiveWindow>,
    pub local_time: Option<LocalTime>,
}

pub const DERIVED_STATUS_FIELD: &str = "derived_status";

const VALIDITY_WINDOW: ActiveWindow = ActiveWindow {
    start_field: "start_date",
    end_field: "end_date",
};

fn vendor_name() -> JoinSpec {
    JoinSpec::new(
        "vendor_name",
        "vendor_id",
        JoinPath::to(Table::Vendors, "id").display("business_name"),
    )
}

fn couple_name() -> JoinSpec {
    JoinSpec::new("couple_name", "couple_id", JoinPath::to(Table::Couples, "id"))
}

fn user_email(target_field: &'static str, key_field: &'static str) -> JoinSpec {
    JoinSpec::new(
        target_field,
        key_field,
        JoinPath::to(Table::Users, "id").display("email"),
    )
}

/// user -> couple name, or vendor business name.
fn customer_name() -> JoinSpec {
    JoinSpec::new("customer_name", "user_id", JoinPath::to(Table::Couples, "user_id"))
        .or_else(JoinPath::to(Table::Vendors, "user_id").display("business_name"))
        .placeholder(UNKNOWN)
}

/// payment -> order -> user -> couple or vendor.
fn payer_name() -> JoinSpec {
    JoinSpec::new(
        "payer_name",
        "order_id",
        JoinPath::to(Table::Orders, "id").then("user_id", Table::Couples, "user_id"),
    )
    .or_else(
        JoinPath::to(Table::Orders, "id")
            .then("user_id", Table::Vendors, "user_id")
            .display("business_name"),
    )
    .placeholder(UNKNOWN)
}

impl EntitySpec {
    fn base(table: Table, searchable: &'static [&'static str]) -> Self {
        Self {
            table,
            joins: Vec::new(),
            searchable,
            status_field: None,
            amount_field: None,
            trend_field: "created_at",
            active_window: None,
            local_time: None,
        }
    }

    /// Fields filled in at read time; they have no column behind them.
    pub fn computed_fields(&self) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = self.joins.iter().map(|join| join.target_field).collect();
        if self.active_window.is_some() {
            fields.push(DERIVED_STATUS_FIELD);
        }
        if let Some(local) = &self.local_time {
            fields.push(local.target_field);
        }
        fields
    }

    pub fn for_table(table: Table) -> Self {
        match table {
            Table::Ads => Self {
                joins: vec![vendor_name()],
                amount_field: Some("price"),
                active_window: Some(VALIDITY_WINDOW),
                ..Self::base(table, &["placement", "vendor_name"])
            },
            Table::BlogPosts => Self {
                joins: vec![user_email("author_email", "author_id")],
                ..Self::base(table, &["title", "slug", "author_email"])
            },
            Table::Couples => Self {
                joins: vec![user_email("user_email", "user_id")],
                ..Self::base(table, &["name", "partner_name", "email", "phone"])
            },
            Table::Events => Self {
                joins: vec![
                    couple_name(),
                    JoinSpec::new("venue_name", "venue_id", JoinPath::to(Table::Venues, "id")),
                ],
                local_time: Some(LocalTime {
                    instant_field: "event_date",
                    zone_field: "timezone",
                    target_field: "event_date_local",
                }),
                ..Self::base(table, &["name", "couple_name", "venue_name"])
            },
            Table::Faqs => Self::base(table, &["question", "answer", "category"]),
            Table::Issues => Self {
                joins: vec![user_email("reporter_email", "reporter_id")],
                status_field: Some("status"),
                ..Self::base(table, &["subject", "description", "reporter_email"])
            },
            Table::Jobs => Self {
                joins: vec![couple_name(), vendor_name()],
                status_field: Some("status"),
                amount_field: Some("budget"),
                ..Self::base(
                    table,
                    &["title", "category", "location", "contact_name", "contact_email"],
                )
            },
            Table::Orders => Self {
                joins: vec![
                    customer_name(),
                    JoinSpec::new("product_name", "product_id", JoinPath::to(Table::Products, "id")),
                ],
                status_field: Some("status"),
                amount_field: Some("total"),
                ..Self::base(table, &["id", "status", "customer_name", "product_name"])
            },
            Table::Payments => Self {
                joins: vec![user_email("customer_email", "user_id"), payer_name()],
                status_field: Some("status"),
                amount_field: Some("amount"),
                ..Self::base(table, &["id", "status", "currency", "customer_email", "payer_name"])
            },
            Table::Products => Self {
                joins: vec![vendor_name()],
                amount_field: Some("price"),
                ..Self::base(table, &["name", "vendor_name"])
            },
            Table::SupportReviews => Self {
                joins: vec![user_email("user_email", "user_id")],
                ..Self::base(table, &["comment", "user_email"])
            },
            Table::Timelines => Self {
                joins: vec![couple_name()],
                ..Self::base(table, &["title", "couple_name"])
            },
            Table::Users => Self {
                status_field: Some("role"),
                ..Self::base(table, &["email", "role"])
            },
            Table::Vendors => Self {
                joins: vec![user_email("user_email", "user_id")],
                ..Self::base(table, &["business_name", "category", "email", "phone"])
            },
            Table::Venues => Self {
                joins: vec![vendor_name()],
                amount_field: Some("price"),
                ..Self::base(table, &["name", "city", "vendor_name"])
            },
            Table::VenueInsurance => Self {
                joins: vec![JoinSpec::new(
                    "venue_name",
                    "venue_id",
                    JoinPath::to(Table::Venues, "id"),
                )],
                active_window: Some(VALIDITY_WINDOW),
                ..Self::base(table, &["provider", "policy_number", "venue_name"])
            },
        }
    }
}
