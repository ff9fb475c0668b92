//! The five standard pipeline stages.

mod audio;
mod backup;
mod captions;
mod thumbs;
mod video;

pub use audio::AudioAgent;
pub use backup::{select_evictions, BackupAgent, BackupEntry};
pub use captions::CaptionsAgent;
pub use thumbs::ThumbnailsAgent;
pub use video::VideoAgent;

use std::path::Path;

use pf_core::Error;

/// Shared precondition: the input must be an existing regular file.
pub(crate) fn ensure_input_file(agent: &str, input: &Path) -> pf_core::Result<()> {
    if input.is_file() {
        Ok(())
    } else {
        Err(Error::agent(
            agent,
            format!("input file not found: {}", input.display()),
        ))
    }
}
