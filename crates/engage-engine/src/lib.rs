//! Engagement write-back engine.
//!
//! Three components share one fast store:
//!
//! - [`InteractionBuffer`]: like/collect toggles land in the fast store and are
//!   flushed to the durable store in coalesced batches by background workers.
//! - [`AttendanceTracker`]: daily check-ins kept as one bitmap per user per
//!   month, with cached streaks.
//! - [`PresenceTracker`]: last-seen timestamps in a sorted set, swept on demand.
//!
//! [`Engine`] wires them together from an [`EngineConfig`].
//!
//! # Example
//!
//! ```no_run
//! use engage_core::{InteractionKind, SubjectId, UserId};
//! use engage_engine::{Engine, EngineConfig};
//!
//! # async fn run() -> engage_engine::Result<()> {
//! let engine = Engine::connect(EngineConfig::from_env()).await?;
//! engine.recover().await?;
//!
//! engine
//!     .interactions
//!     .toggle(InteractionKind::Like, SubjectId::new(42), UserId::new(7), true)
//!     .await?;
//! assert!(
//!     engine
//!         .interactions
//!         .has_interaction(InteractionKind::Like, SubjectId::new(42), UserId::new(7))
//!         .await?
//! );
//!
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod attendance;
pub mod config;
pub mod engine;
pub mod error;
pub mod interaction;
pub mod keys;
pub mod presence;
mod scheduler;
mod stats;

pub use attendance::AttendanceTracker;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use interaction::InteractionBuffer;
pub use keys::KeySpace;
pub use presence::PresenceTracker;
pub use stats::FlushStatsSnapshot;
