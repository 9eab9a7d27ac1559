//! Background lease extension and garbage collection for the Strata store.
//!
//! A [`StoreGcService`] owns one worker thread. Every `period` it wakes,
//! collects garbage if the GC deadline has passed, then extends the leases
//! of the live graph if that deadline has passed. The worker can be paused,
//! resumed and terminated; it only observes those requests while idle.
//!
//! In a running build the live graph is the output of the sessions held in
//! [`LiveSessions`]; a finished run's output is left to expire.

pub mod config;
pub mod error;
pub mod maintenance;
pub mod schedule;
pub mod service;

pub use config::{GcConfig, GcIntervals};
pub use error::{GcError, GcResult};
pub use maintenance::{LiveSessions, StoreMaintenance};
pub use schedule::{GcSchedule, TickReport};
pub use service::{GcStats, ServiceState, StoreGcService};
