//! Upload pipeline
//!
//! # Architecture
//!
//! ```text
//!                 ┌─────────────────────────┐
//!                 │      TreeWalker         │
//!                 │  (coordinator thread)   │
//!                 │  read_dir, depth-first  │
//!                 └───────────┬─────────────┘
//!                             │ push(Job)
//!                             ▼
//!                 ┌─────────────────────────┐
//!                 │        JobQueue         │
//!                 │  crossbeam, closed once │
//!                 └───────────┬─────────────┘
//!       ┌─────────────────────┼─────────────────────┐
//!       │                     │                     │
//! ┌─────▼─────┐         ┌─────▼─────┐         ┌─────▼─────┐
//! │ Worker 1  │         │ Worker 2  │         │ Worker N  │
//! │ retry +   │         │ retry +   │         │ retry +   │
//! │ upload    │         │ upload    │         │ upload    │
//! └─────┬─────┘         └─────┬─────┘         └─────┬─────┘
//!       └──────── failures ───┼─────────────────────┘
//!                             ▼
//!                 ┌─────────────────────────┐
//!                 │   Failure log writer    │
//!                 └─────────────────────────┘
//! ```

pub mod coordinator;
pub mod queue;
pub mod scan;
pub mod worker;

pub use coordinator::{RunSummary, SweepCoordinator, SweepMonitor, SweepProgress};
pub use queue::{JobQueue, JobQueueReceiver, JobQueueSender, QueueClosed};
pub use scan::{TreeWalker, WalkCounters};
pub use worker::{PoolReport, WorkerContext, WorkerPool};
