//! Retrieval planners, candidates, and snippets.
//!
//! The standard planner ladders through six search modes; the recency
//! planner replaces it when the prompt asks about recent activity. Both
//! emit [`ScoredCandidate`] pools that the handlers pack into a token
//! budget.

pub mod candidate;
pub mod planner;
pub mod recency;
pub mod snippet;

pub use candidate::{ScoredCandidate, near_dedup, three_tier_sort};
pub use planner::{PackedResults, SearchOptions, StandardPlanner, pack_to_budget};
pub use recency::RecencyPlanner;
pub use snippet::{query_biased_snippet, smart_truncate};
