//! # Taskdeck
//!
//! A shared task board server: tasks organized into ordered columns,
//! moved collaboratively in real time, with column-triggered automations
//! and validator notifications.
//!
//! ## Transition pipeline
//!
//! ```text
//!   client move ──► TransitionService
//!                      │ 1. persist column reassignment (BoardStore)
//!                      │ 2. review column + bound group? ► ValidatorNotifier
//!                      │ 3. matching rules ► AutomationEngine
//!                      ▼ 4. BoardEvents.broadcast_changed()
//!              all connected sessions re-fetch
//! ```
//!
//! The transition succeeds once step 1 persists; steps 2 and 3 fail per
//! unit of work without affecting the response, and step 4 always runs.
//!
//! ## Modules
//! - `store`: JSON-file-backed board state behind a `RwLock`
//! - `transition`: the move/toggle pipeline
//! - `automation`: rule matching and execution
//! - `notify`: validator group notification dispatch
//! - `realtime`: the injected broadcast fan-out channel
//! - `api`: HTTP routes, JWT auth, and the WebSocket push channel

pub mod api;
pub mod automation;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod realtime;
pub mod store;
pub mod transition;

pub use config::Config;
pub use error::ApiError;
