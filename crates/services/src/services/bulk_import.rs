//! CSV bulk import.
//!
//! Both import dialects go through one RFC 4180 reader and a declarative
//! [`ImportSchema`]. Rows are validated and written one at a time; a bad row
//! is reported and the import moves on.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim};
use db::{
    models::{
        couple::CreateCouple,
        job::CreateJob,
        to_record,
        user::{CreateUser, UserRole},
    },
    store::{DataStore, Record, StoreError, Table},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Number, Value};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

use super::{
    email::validate_recipient,
    identity::{IdentityError, IdentityProvider, NewIdentity, temporary_password},
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("header row is missing column {0}")]
    MissingColumn(&'static str),
    #[error("the file has no header row")]
    MissingHeader,
}

/// Failure of one row; the message ends up in the report.
#[derive(Debug, Error)]
enum RowError {
    #[error("{0}")]
    Invalid(String),
    #[error("could not save: {0}")]
    Store(#[from] StoreError),
    #[error("could not create account: {0}")]
    Identity(#[from] IdentityError),
    #[error("unexpected row shape: {0}")]
    Shape(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    /// Normalized to `YYYY-MM-DD`.
    Date,
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub field: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn column(field: &'static str, kind: FieldKind, required: bool) -> ColumnMapping {
    ColumnMapping {
        field,
        kind,
        required,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMode {
    /// No header; columns are taken in order and the field count must match.
    Positional,
    /// First row names the columns, matched case-insensitively.
    Named,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSchema {
    pub header: HeaderMode,
    pub columns: Vec<ColumnMapping>,
}

#[derive(Debug)]
pub struct ParsedRow {
    /// 1-based among data rows.
    pub row: usize,
    pub fields: Result<Record, String>,
}

impl ImportSchema {
    pub fn jobs() -> Self {
        use FieldKind::*;
        Self {
            header: HeaderMode::Positional,
            columns: vec![
                column("title", Text, true),
                column("description", Text, false),
                column("category", Text, false),
                column("location", Text, false),
                column("event_date", Date, false),
                column("budget", Decimal, false),
                column("contact_name", Text, false),
                column("contact_email", Email, false),
            ],
        }
    }

    pub fn couples() -> Self {
        use FieldKind::*;
        Self {
            header: HeaderMode::Named,
            columns: vec![
                column("name", Text, true),
                column("partner_name", Text, false),
                column("email", Email, true),
                column("phone", Text, false),
                column("wedding_date", Date, false),
            ],
        }
    }

    /// A row that is not valid UTF-8 fails on its own; the header must be.
    pub fn parse(&self, input: &[u8]) -> Result<Vec<ParsedRow>, ImportError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input);
        let mut records = reader.records();

        let positions: Vec<Option<usize>> = match self.header {
            HeaderMode::Positional => (0..self.columns.len()).map(Some).collect(),
            HeaderMode::Named => {
                let header = records.next().ok_or(ImportError::MissingHeader)??;
                self.header_positions(&header)?
            }
        };

        let mut rows = Vec::new();
        for (index, record) in records.enumerate() {
            let row = index + 1;
            let fields = match record {
                Ok(record) => self.validate(&record, &positions),
                Err(err) => Err(err.to_string()),
            };
            rows.push(ParsedRow { row, fields });
        }
        Ok(rows)
    }

    /// Missing optional columns map to `None` and read as empty.
    fn header_positions(&self, header: &StringRecord) -> Result<Vec<Option<usize>>, ImportError> {
        let by_name: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(index, name)| (name.to_ascii_lowercase(), index))
            .collect();
        self.columns
            .iter()
            .map(|mapping| match by_name.get(mapping.field) {
                Some(&index) => Ok(Some(index)),
                None if mapping.required => Err(ImportError::MissingColumn(mapping.field)),
                None => Ok(None),
            })
            .collect()
    }

    fn validate(&self, record: &StringRecord, positions: &[Option<usize>]) -> Result<Record, String> {
        if self.header == HeaderMode::Positional && record.len() != self.columns.len() {
            return Err(format!(
                "expected {} fields, got {}",
                self.columns.len(),
                record.len()
            ));
        }

        let mut fields = Record::new();
        for (mapping, &position) in self.columns.iter().zip(positions) {
            let raw = position
                .and_then(|position| record.get(position))
                .unwrap_or_default();
            if raw.is_empty() {
                if mapping.required {
                    return Err(format!("{} is required", mapping.field));
                }
                continue;
            }
            fields.insert(mapping.field.to_string(), convert(mapping, raw)?);
        }
        Ok(fields)
    }
}

fn convert(mapping: &ColumnMapping, raw: &str) -> Result<Value, String> {
    match mapping.kind {
        FieldKind::Text => Ok(Value::String(raw.to_string())),
        FieldKind::Email => validate_recipient(raw)
            .map(|()| Value::String(raw.to_string()))
            .map_err(|_| format!("{} is not a valid email: {raw}", mapping.field)),
        FieldKind::Date => utils::dates::parse_day(raw)
            .map(|day| Value::String(day.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| format!("{} is not a date: {raw}", mapping.field)),
        FieldKind::Decimal => raw
            .trim_start_matches('$')
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("{} is not a number: {raw}", mapping.field)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
pub struct RowOutcome {
    pub row: usize,
    pub success: bool,
    pub id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
pub struct ImportReport {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<RowOutcome>,
}

impl ImportReport {
    fn push(&mut self, row: usize, result: Result<String, String>) {
        let outcome = match result {
            Ok(id) => {
                self.succeeded += 1;
                RowOutcome {
                    row,
                    success: true,
                    id: Some(id),
                    error: None,
                }
            }
            Err(error) => {
                self.failed += 1;
                RowOutcome {
                    row,
                    success: false,
                    id: None,
                    error: Some(error),
                }
            }
        };
        self.outcomes.push(outcome);
    }
}

fn typed<T: DeserializeOwned>(fields: Record) -> Result<T, RowError> {
    Ok(serde_json::from_value(Value::Object(fields))?)
}

fn inserted_id(row: &Record) -> String {
    db::store::key_string(row.get("id")).unwrap_or_default()
}

pub async fn import_jobs(store: &dyn DataStore, input: &[u8]) -> Result<ImportReport, ImportError> {
    let rows = ImportSchema::jobs().parse(input)?;
    let mut report = ImportReport::default();

    for ParsedRow { row, fields } in rows {
        let result = match fields {
            Ok(fields) => insert_job(store, fields).await.map_err(|e| e.to_string()),
            Err(error) => Err(error),
        };
        if let Err(error) = &result {
            warn!(row, error = %error, "Job import row failed");
        }
        report.push(row, result);
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "Imported jobs"
    );
    Ok(report)
}

async fn insert_job(store: &dyn DataStore, fields: Record) -> Result<String, RowError> {
    let job: CreateJob = typed(fields)?;
    let record = to_record(&job)?;
    let stored = store.insert(Table::Jobs, record).await?;
    Ok(inserted_id(&stored))
}

pub async fn import_couples(
    store: &dyn DataStore,
    identity: &dyn IdentityProvider,
    input: &[u8],
) -> Result<ImportReport, ImportError> {
    let rows = ImportSchema::couples().parse(input)?;
    let mut report = ImportReport::default();

    for ParsedRow { row, fields } in rows {
        let result = match fields {
            Ok(fields) => insert_couple(store, identity, fields)
                .await
                .map_err(|e| e.to_string()),
            Err(error) => Err(error),
        };
        if let Err(error) = &result {
            warn!(row, error = %error, "Couple import row failed");
        }
        report.push(row, result);
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "Imported couples"
    );
    Ok(report)
}

/// identity -> users row -> couples row. A failed step undoes the earlier
/// ones, best effort.
async fn insert_couple(
    store: &dyn DataStore,
    identity: &dyn IdentityProvider,
    fields: Record,
) -> Result<String, RowError> {
    let couple: CreateCouple = typed(fields)?;
    let account = identity
        .create_user(&NewIdentity {
            email: couple.email.clone(),
            password: temporary_password(),
            display_name: Some(couple.name.clone()),
        })
        .await?;

    let user = CreateUser {
        id: account.id.clone(),
        email: couple.email.clone(),
        role: UserRole::Couple,
    };
    if let Err(err) = insert_typed(store, Table::Users, &user).await {
        undo_identity(identity, &account.id).await;
        return Err(err);
    }

    let couple = CreateCouple {
        user_id: Some(account.id.clone()),
        ..couple
    };
    match insert_typed(store, Table::Couples, &couple).await {
        Ok(id) => Ok(id),
        Err(err) => {
            if let Err(undo) = store.delete(Table::Users, &account.id).await {
                warn!(user_id = %account.id, error = %undo, "Could not remove users row after failed import");
            }
            undo_identity(identity, &account.id).await;
            Err(err)
        }
    }
}

async fn insert_typed<T: Serialize>(
    store: &dyn DataStore,
    table: Table,
    row: &T,
) -> Result<String, RowError> {
    let stored = store.insert(table, to_record(row)?).await?;
    Ok(inserted_id(&stored))
}

pub(crate) async fn undo_identity(identity: &dyn IdentityProvider, id: &str) {
    if let Err(err) = identity.delete_user(id).await {
        warn!(user_id = id, error = %err, "Could not remove identity account");
    }
}

#[cfg(test)]
mod tests {
    use db::store::memory::{MemoryStore, WriteOp};
    use serde_json::json;

    use super::*;
    use crate::services::test_support::FakeIdentity;

    const JOBS: &str = "\
Photographer,Full day coverage,photography,Lisbon,2026-09-12,2500,Ana,ana@example.com
DJ,\"Ceremony, dinner and party\",music,Porto,2026-10-01,\"$1,200.50\",Luis,luis@example.com
Florist,Arch,flowers,Braga,not-a-date,800,Rita,rita@example.com
Caterer,120 guests,food,Faro,2026-11-20,9000,Joao,joao@example.com
";

    const JOBS_BAD_ENCODING: &[u8] = b"\
Photographer,,photography,Lisbon,2026-09-12,2500,Ana,ana@example.com
Flor\xffist,,flowers,Braga,2026-09-12,800,Rita,rita@example.com
Caterer,,food,Faro,2026-11-20,9000,Joao,joao@example.com
";

    #[test]
    fn test_quoted_fields_keep_commas() {
        let rows = ImportSchema::jobs().parse(JOBS.as_bytes()).unwrap();
        let second = rows[1].fields.as_ref().unwrap();
        assert_eq!(second["description"], json!("Ceremony, dinner and party"));
        assert_eq!(second["budget"], json!(1200.5));
    }

    #[test]
    fn test_wrong_field_count_fails_only_that_row() {
        let rows = ImportSchema::jobs().parse(b"a,b\nTitle,,,,,,,\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields.as_ref().unwrap_err(), "expected 8 fields, got 2");
        assert!(rows[1].fields.is_ok());
    }

    #[test]
    fn test_named_header_is_case_insensitive_and_order_free() {
        let input = "Email,NAME,Wedding_Date\nana@example.com,Ana & Luis,12/09/2026\nana@example.com,Ana & Luis,2026-09-12\n";
        let mut schema = ImportSchema::couples();
        schema.columns.retain(|c| ["name", "email", "wedding_date"].contains(&c.field));
        let rows = schema.parse(input.as_bytes()).unwrap();
        assert_eq!(rows[0].fields.as_ref().unwrap_err(), "wedding_date is not a date: 12/09/2026");
        let second = rows[1].fields.as_ref().unwrap();
        assert_eq!(second["name"], json!("Ana & Luis"));
        assert_eq!(second["wedding_date"], json!("2026-09-12"));
    }

    #[test]
    fn test_missing_required_header_column_rejects_the_file() {
        let err = ImportSchema::couples().parse(b"name,phone\nAna,123\n").unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn("email")));
    }

    #[test]
    fn test_missing_optional_header_columns_read_as_empty() {
        let rows = ImportSchema::couples()
            .parse(b"name,email\nAna & Luis,ana@example.com\n")
            .unwrap();
        let fields = rows[0].fields.as_ref().unwrap();
        assert_eq!(fields["name"], json!("Ana & Luis"));
        assert!(!fields.contains_key("phone"));
        assert!(!fields.contains_key("partner_name"));
    }

    #[tokio::test]
    async fn test_row_with_invalid_utf8_fails_alone() {
        let store = MemoryStore::new();
        let report = import_jobs(&store, JOBS_BAD_ENCODING).await.unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.outcomes[1].success);
        assert_eq!(report.outcomes[1].row, 2);
        assert!(report.outcomes[2].success);
        assert_eq!(store.rows(Table::Jobs).len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_row_is_isolated() {
        let store = MemoryStore::new();
        let report = import_jobs(&store, JOBS.as_bytes()).await.unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 1);
        let failed: Vec<&RowOutcome> = report.outcomes.iter().filter(|o| !o.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].row, 3);
        assert!(failed[0].error.as_deref().unwrap().contains("event_date"));
        assert_eq!(store.rows(Table::Jobs).len(), 3);
        assert!(report.outcomes[3].success);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_per_row() {
        let store = MemoryStore::new();
        store.fail_writes(Table::Jobs);
        let report = import_jobs(&store, JOBS.as_bytes()).await.unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 4);
    }

    const COUPLES: &str = "\
name,partner_name,email,phone,wedding_date
\"Ana\",\"Luis\",ana@example.com,+351 900 000 000,2026-09-12
\"Rita\",,taken@example.com,,
\"Maria\",\"Joao\",maria@example.com,,2027-01-30
";

    #[tokio::test]
    async fn test_couple_rows_create_identity_user_and_couple() {
        let store = MemoryStore::new();
        let identity = FakeIdentity::new();
        identity.reject("taken@example.com");
        let report = import_couples(&store, &identity, COUPLES.as_bytes()).await.unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.outcomes[1].row, 2);
        assert!(!report.outcomes[1].success);

        let users = store.rows(Table::Users);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["role"], json!("couple"));
        let couples = store.rows(Table::Couples);
        assert_eq!(couples[0]["user_id"], users[0]["id"]);
        assert_eq!(couples[0]["partner_name"], json!("Luis"));
        assert!(identity.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_failed_couple_insert_undoes_user_and_identity() {
        let store = MemoryStore::new();
        store.fail_writes(Table::Couples);
        let identity = FakeIdentity::new();
        let report = import_couples(
            &store,
            &identity,
            b"name,partner_name,email,phone,wedding_date\nAna,Luis,ana@example.com,,\n",
        )
        .await
        .unwrap();

        assert_eq!(report.failed, 1);
        let created = identity.created();
        assert_eq!(identity.deleted(), vec![created[0].id.clone()]);
        assert!(store.rows(Table::Users).is_empty());
        assert!(store.writes().iter().any(|op| matches!(
            op,
            WriteOp::Delete { table: Table::Users, id } if *id == created[0].id
        )));
    }

    #[tokio::test]
    async fn test_failed_user_insert_undoes_identity() {
        let store = MemoryStore::new();
        store.fail_writes(Table::Users);
        let identity = FakeIdentity::new();
        let report = import_couples(
            &store,
            &identity,
            b"name,partner_name,email,phone,wedding_date\nAna,Luis,ana@example.com,,\n",
        )
        .await
        .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(identity.deleted().len(), 1);
        assert!(store.rows(Table::Couples).is_empty());
    }
}
