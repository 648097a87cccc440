//! Showtime - Cinema seat reservation service
//!
//! Sells seats for scheduled showings. A patron locks individual tickets for a
//! short window, pays for the locked set through a hosted checkout, and the
//! payment result turns the locks into sold tickets. Background reconcilers
//! return abandoned locks and checkouts to sale.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
