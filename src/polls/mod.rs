//! Polling Module
//!
//! Multiple-choice polls with one vote per voter address.

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use config::{NewPoll, PollLimits};
pub use engine::{PollEngine, VoteRequest};
pub use error::PollError;
pub use memory::MemoryPollStore;
pub use store::{PollStore, SqlitePollStore, StoreError};
pub use types::{OptionId, OptionResults, Poll, PollId, PollOption, PollResults, VoteRecord};
