//! Worker system — claim tasks from the marketplace and run them.
//!
//! Core components:
//! - `capacity` — bounded set of active task ids (admission control)
//! - `claim` — claim request and conflict classification
//! - `executor` — handler dispatch, completion reporting, guaranteed release
//! - `poll` — timer-driven poll/filter/claim/dispatch loop
//! - `worker` — lifecycle facade: start, single cycles, graceful stop

pub mod capacity;
pub mod claim;
pub mod executor;
pub mod poll;
#[allow(clippy::module_inception)]
pub mod worker;

pub use capacity::{CapacityGate, CapacityPermit};
pub use claim::{ClaimOutcome, ClaimProtocol};
pub use executor::TaskExecutor;
pub use poll::{CycleReport, PollLoop, PollState};
pub use worker::Worker;
