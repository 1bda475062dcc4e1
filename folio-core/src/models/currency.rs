use serde::{Deserialize, Serialize};

/// Exchange rate: one unit of `from_currency` is worth `rate` units of `to_currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub updated_at: String, // RFC3339 UTC
}

/// True for a three-letter uppercase code such as "EUR".
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}
