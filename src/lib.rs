//! Prop-firm Trading State & Risk Engine
//!
//! Tracks a trader's simulated account against prop-firm risk rules:
//! a functional trade ledger, an advisory risk gate, a performance
//! aggregator, and a forex session clock, with pluggable persistence.

pub mod config;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod metrics;
pub mod risk;
pub mod session;
pub mod state_manager;
pub mod types;

pub use config::Config;
pub use error::{LedgerError, StateError};
pub use ledger::{TradeEvent, Transition};
pub use risk::{BlockReason, TradePermission};
pub use session::{compute_session_status, MarketSession, SessionStatus, TimezoneSelection};
pub use state_manager::StateStore;
pub use types::*;
