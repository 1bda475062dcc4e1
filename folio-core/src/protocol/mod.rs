pub mod http;

// Re-exports
pub use http::{
    AuthResponse, LoginRequest, LoginResponse, RegisterRequest, TwoFactorChallenge,
    TwoFactorLoginRequest, TwoFactorSetupResponse, TwoFactorStatusResponse,
    TwoFactorVerifyRequest, TwoFactorVerifyResponse,
};
