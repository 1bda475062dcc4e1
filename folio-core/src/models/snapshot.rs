use serde::{Deserialize, Serialize};

/// Total portfolio value at a point in time, in the user's base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub id: i64,
    pub total_value: f64,
    pub currency: String,
    pub recorded_at: String, // RFC3339 UTC
}
