//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - Ticket, checkout session, catalog and token stores
//! - `memory` - In-process stores and a manual clock for tests and local runs
//! - `stripe` - Payment gateway (Stripe Checkout) and its mock
//! - `auth` - Bearer token validation (HS256 JWT) and its mock
//! - `http` - axum routes, middleware and error mapping
//! - `workers` - Background reconcilers and their supervisor

pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
pub mod workers;
