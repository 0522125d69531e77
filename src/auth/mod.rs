pub mod extractors;
pub mod jwt;
pub mod lockout;
pub mod password;
pub mod revocation;
pub mod services;
pub mod verification;
