//! Ticket state machine.
//!
//! `Unsold -> Locked -> Sold`, with `Locked -> Unsold` as the only way back.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sale state of a single ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    /// Available to anyone. Initial state.
    Unsold,

    /// Held by one user until unlocked, expired or fulfilled.
    Locked,

    /// Paid for. Terminal.
    Sold,
}

impl TicketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketState::Unsold => "unsold",
            TicketState::Locked => "locked",
            TicketState::Sold => "sold",
        }
    }
}

impl StateMachine for TicketState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use TicketState::*;
        matches!((self, target), (Unsold, Locked) | (Locked, Unsold) | (Locked, Sold))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use TicketState::*;
        match self {
            Unsold => vec![Locked],
            Locked => vec![Unsold, Sold],
            Sold => vec![],
        }
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsold" => Ok(TicketState::Unsold),
            "locked" => Ok(TicketState::Locked),
            "sold" => Ok(TicketState::Sold),
            other => Err(ValidationError::invalid_format(
                "state",
                format!("unknown ticket state '{}'", other),
            )),
        }
    }
}
