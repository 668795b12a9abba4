//! Store module for uptrail.
//!
//! The sample series is persisted as one JSON document in a remote content
//! store, replaced wholesale on every write under optimistic concurrency.

mod models;
mod remote;

pub use models::*;
pub use remote::*;
