//! Authentication adapters implementing the `SessionValidator` port.
//!
//! - `jwt` - HS256 tokens from the account service
//! - `mock` - token-to-user map for tests and local runs

mod jwt;
mod mock;

pub use jwt::{AccessClaims, JwtSessionValidator};
pub use mock::MockSessionValidator;
