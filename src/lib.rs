//! Offline-first sync core for the Hearthlist shared-household client:
//! a last-known-good snapshot cache, a durable FIFO queue of pending
//! writes, and the session/resume controller that decides when to trust
//! cached data, refetch, retry, or surface an error.

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod id;
pub mod logging;
pub mod model;
pub mod queue;
pub mod reconcile;
pub mod remote;
pub mod session;
pub mod state;
pub mod store;
pub mod time;

pub use error::{AppError, AppResult};
pub use session::{SessionController, SessionPhase, SessionSnapshot};
pub use state::AppCtx;
