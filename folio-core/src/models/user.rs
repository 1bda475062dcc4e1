use serde::{Deserialize, Serialize};

/// User profile as exposed on the wire (never carries credentials or the TOTP secret).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub base_currency: String,
    pub two_factor_enabled: bool,
}
