//! State module for tracking run progress
//!
//! # Components
//!
//! - `UnitState`: Tracks the state of individual work units (pending, searching, fetching, done, etc.)
//! - `DomainState`: Tracks per-domain politeness state (concurrency slots, pacing, adaptive penalty)

mod domain_state;
mod unit_state;

// Re-export main types
pub use domain_state::{next_penalty, DomainState};
pub use unit_state::UnitState;
