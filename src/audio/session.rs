//! Audio session configuration seam
//!
//! Platform differences in audio routing (mobile session categories,
//! desktop default devices) live behind this capability trait, selected at
//! composition time instead of compile-time conditionals.

use crate::Result;

/// Prepares the platform audio session before capture or playback starts
pub trait AudioSessionConfigurer: Send + Sync {
    /// Configure the session for microphone capture
    ///
    /// # Errors
    ///
    /// Returns error if the platform session cannot be configured
    fn configure_capture(&self) -> Result<()>;

    /// Configure the session for speaker playback
    ///
    /// # Errors
    ///
    /// Returns error if the platform session cannot be configured
    fn configure_playback(&self) -> Result<()>;
}

/// Desktop session: routing goes through the host's default devices, so
/// there is nothing to set up
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopSession;

impl AudioSessionConfigurer for DesktopSession {
    fn configure_capture(&self) -> Result<()> {
        Ok(())
    }

    fn configure_playback(&self) -> Result<()> {
        Ok(())
    }
}
