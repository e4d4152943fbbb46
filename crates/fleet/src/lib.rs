//! Logwell - Fleet
//!
//! Keeps the set of running listeners consistent with the set of active
//! source configurations. One listener per active source; starts, stops,
//! and restarts are serialized per fleet so conflicting lifecycle
//! operations for the same source cannot race.
//!
//! # Design
//!
//! - The fleet owns a directory mapping source id to a running
//!   [`ListenerHandle`](logwell_sources::ListenerHandle) and never touches a
//!   listener's internals.
//! - Bind failures surface to whoever requested the change, so the
//!   configuration layer can fail its transaction instead of recording a
//!   source that has no listener. One source's failure never affects the
//!   others.
//! - A watcher per listener notices receive tasks that die unexpectedly
//!   and restarts the listener a bounded number of times.

mod error;
mod fleet;
mod store;

pub use error::FleetError;
pub use fleet::{ListenerFleet, SourceStatus};
pub use store::{ConfigStore, StaticConfigStore};
