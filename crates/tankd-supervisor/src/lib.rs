//! Process supervision for the tankd control loop.
//!
//! The supervisor runs one control-loop instance as a child process and
//! keeps a live mirror of its `(Params, State)` fed by the child's
//! side-channel status stream. Three workers accompany every run: a stdout
//! relay into the supervisor's own log, the side-channel reader, and a
//! watchdog that blocks on child exit and classifies any non-zero exit code
//! as a crash. A crash never restarts the loop automatically — it is
//! surfaced through `RunInfo` for an operator to act on.

pub mod error;
pub mod instance;
pub mod service;
pub mod store;

pub use error::{StoreError, SupervisorError};
pub use instance::{ChildCommand, Instance, Mirror, RunInfo, RunReason};
pub use service::SupervisorService;
pub use store::ParamsStore;
