//! Episodic and semantic memory: similar-situation recall,
//! learned rules/patterns, and a trade-log performance rollup.

pub mod episodic;
pub mod performance;
pub mod semantic;

pub use episodic::{recall_similar, record_episode, FeatureVector};
pub use performance::{recent_performance, RecentPerformance};
pub use semantic::{deactivate, identify_pattern, learn_rule, record_application, record_sighting};
