pub mod account;
pub mod currency;
pub mod data_source;
pub mod snapshot;
pub mod user;

// Re-exports
pub use account::Account;
pub use currency::CurrencyRate;
pub use data_source::DataSource;
pub use snapshot::PortfolioSnapshot;
pub use user::User;
