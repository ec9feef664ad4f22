use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CreateCouple {
    pub user_id: Option<String>,
    pub name: String,
    pub partner_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    /// `YYYY-MM-DD`
    pub wedding_date: Option<String>,
}
