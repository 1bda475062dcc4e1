use std::fmt;

use serde::{Deserialize, Serialize};

/// Market data feeds whose freshness is tracked by the last-update cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataSource {
    Currency,
    IbPortfolio,
    ManualInvestments,
}

impl DataSource {
    pub const ALL: [DataSource; 3] = [
        DataSource::Currency,
        DataSource::IbPortfolio,
        DataSource::ManualInvestments,
    ];

    /// Key used in the persisted cache file.
    pub fn key(self) -> &'static str {
        match self {
            DataSource::Currency => "currency",
            DataSource::IbPortfolio => "ibPortfolio",
            DataSource::ManualInvestments => "manualInvestments",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
