//! # budget-auth-api
//!
//! Shared API types for the budget-auth service.
//! This crate is designed to be WASM-compatible and can be used in both
//! backend (Rust) and frontend (WASM/TypeScript via wasm-bindgen) applications.
//!
//! ## Features
//!
//! - Request DTOs for the sign-up flow (`SendCodeRequest`, `VerifyCodeRequest`,
//!   `RegisterRequest`) and for login (`LoginRequest`)
//! - Response DTOs (`UserResponse`, `AuthResponse`, ...)
//! - Error response format (`ErrorResponse`)
//!
//! ## Example
//!
//! ```rust
//! use budget_auth_api::LoginRequest;
//!
//! let request = LoginRequest {
//!     identifier: "user@example.com".to_string(),
//!     password: "Password123!".to_string(),
//! };
//! ```

pub mod error;
pub mod requests;
pub mod responses;

// Re-exports for convenient access
pub use error::ErrorResponse;
pub use requests::*;
pub use responses::*;
