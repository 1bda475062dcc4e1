//! folio-core: wire types shared by server and clients (models, HTTP DTOs, errors).
//! No I/O and no async here.

pub mod error;
pub mod models;
pub mod protocol;
pub mod utils;

pub use error::ErrorBody;
pub use models::{Account, CurrencyRate, DataSource, PortfolioSnapshot, User};
pub use protocol::http::{
    AccountResponse, AccountValuation, AuthResponse, ConversionQuery, ConversionResponse,
    CreateAccountRequest, HealthResponse, HistoryQuery, HistoryResponse, LastUpdateTimes,
    LastUpdatesResponse, ListAccountsResponse, ListRatesResponse, LoginRequest, LoginResponse,
    MessageResponse, PerformanceSummary, RefreshFlags, RegisterRequest, SnapshotResponse,
    TwoFactorChallenge, TwoFactorLoginRequest, TwoFactorSetupResponse, TwoFactorStatusResponse,
    TwoFactorVerifyRequest, TwoFactorVerifyResponse, UpdateAccountRequest, UpsertRateRequest,
};
pub use utils::{epoch_millis_to_rfc3339, now_millis, now_timestamp};
