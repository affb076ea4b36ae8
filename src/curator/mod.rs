//! Curation Engine
//!
//! Candidate generation, repair, ranking and the escalation loop that drives
//! them across a backend ladder.

mod candidate;
mod engine;
mod ranker;
mod repair;

pub use candidate::{Candidate, Ranking};
pub use engine::{CurateRequest, EscalationOutcome, EscalationState, Escalator};
pub use ranker::CandidateRanker;
pub use repair::{RepairOutcome, repair};
