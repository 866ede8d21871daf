//! Session analytics
//!
//! Usage metrics derived from the event stream of a single agent run.
//! See [`aggregator`] for the summary lifecycle.

pub mod aggregator;

pub use aggregator::SessionAggregator;
