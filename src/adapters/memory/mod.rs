//! In-memory adapters.
//!
//! Used by tests and by local runs without a database.

mod clock;
mod store;

pub use clock::ManualClock;
pub use store::InMemoryStore;
