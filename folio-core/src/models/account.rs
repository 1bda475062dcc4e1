use serde::{Deserialize, Serialize};

/// An investment or cash account owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: String,
    /// ISO 4217 code
    pub currency: String,
    pub balance: f64,
    pub created_at: String, // RFC3339 UTC
    pub updated_at: String, // RFC3339 UTC
}
