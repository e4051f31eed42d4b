//! Parallel find/delete traversal
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────────┐
//!                  │     FindCoordinator      │
//!                  │  - spawns one rank/thread│
//!                  └────────────┬─────────────┘
//!                               │
//!       ┌───────────────────────┼───────────────────────┐
//!       │                       │                       │
//! ┌─────▼─────┐           ┌─────▼─────┐           ┌─────▼─────┐
//! │  Rank 0   │◄─ steal ─►│  Rank 1   │◄─ steal ─►│  Rank N   │
//! │ seed+drain│           │   drain   │           │   drain   │
//! └─────┬─────┘           └─────┬─────┘           └─────┬─────┘
//!       └───────────────────────┼───────────────────────┘
//!                               ▼
//!                   Collective reduce → rank 0
//! ```
//!
//! - [`item`]: work tokens and entry classification
//! - [`stonewall`]: per-worker deadline
//! - [`filter`]: stat-and-filter / delete action
//! - [`driver`]: seed and process callbacks
//! - [`queue`]: work-stealing queue
//! - [`collective`]: barrier-based reduction
//! - [`aggregate`]: local and global results

pub mod aggregate;
pub mod collective;
pub mod coordinator;
pub mod driver;
pub mod filter;
pub mod item;
pub mod queue;
pub mod stonewall;

pub use aggregate::{GlobalResult, LocalResult};
pub use coordinator::{FindCoordinator, WalkProgress};
pub use driver::TraversalDriver;
pub use filter::{Evaluation, Evaluator, FilterPolicy};
pub use item::{EntryTag, PathCodec, Token, WorkItem};
pub use queue::{Enqueue, WorkQueue};
pub use stonewall::Stonewall;
