use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A job-board posting as created by bulk import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CreateJob {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    /// `YYYY-MM-DD`
    pub event_date: Option<String>,
    pub budget: Option<f64>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
}
