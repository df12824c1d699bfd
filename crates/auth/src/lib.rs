//! `storefront-auth` — pure authentication boundary (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage. The API layer
//! hands tokens in; verified claims come out.

pub mod claims;
pub mod jwt;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
