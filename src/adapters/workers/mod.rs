//! Background reconcilers.
//!
//! Each reconciler converges one kind of stale state on a fixed interval:
//! - `LockExpiryReconciler` - expired ticket locks back to unsold
//! - `SessionExpiryReconciler` - stale checkout sessions against the provider
//! - `TokenExpiryReconciler` - expired one-time auth tokens
//!
//! `WorkerSupervisor` runs them and holds process shutdown until each has
//! observed cancellation.

mod lock_expiry;
mod reconciler;
mod session_expiry;
mod supervisor;
mod token_expiry;

pub use lock_expiry::LockExpiryReconciler;
pub use reconciler::{run_periodic, Reconciler, SweepReport};
pub use session_expiry::SessionExpiryReconciler;
pub use supervisor::{WorkerExit, WorkerSupervisor};
pub use token_expiry::TokenExpiryReconciler;
