//! Taskdeck client core.
//!
//! Reconciles three independent update sources — a one-shot snapshot fetch,
//! locally submitted create mutations, and live `task_created` push events —
//! into a single idempotent in-memory task store, behind an explicitly owned
//! [`sync::Synchronizer`]. See DESIGN.md for the component map.

pub mod api;
pub mod auth;
pub mod channel;
pub mod config;
pub mod error;
pub mod sync;
pub mod tasks;

pub use auth::{AccessToken, Authorizer, BearerAuth};
pub use channel::{ChannelState, LiveEvent};
pub use config::ClientConfig;
pub use error::ClientError;
pub use sync::{StoreChange, SyncPhase, Synchronizer};
pub use tasks::{Task, TaskDraft, TaskStatus, TaskStore};
