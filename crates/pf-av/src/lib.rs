//! pf-av: external tool plumbing for postforge.
//!
//! Tool discovery on `PATH`, bounded subprocess execution, and ffprobe
//! duration interrogation. All invocations carry a timeout so an
//! unresponsive external process fails the stage instead of hanging the
//! run.

pub mod command;
pub mod probe;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use probe::media_duration;
pub use tools::{ToolHandle, ToolRegistry, ToolStatus, KNOWN_TOOLS};
