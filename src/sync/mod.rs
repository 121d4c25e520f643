//! Document synchronization engine.
//!
//! One [`SyncEngine`] per process owns the [`SessionRegistry`]; every open
//! document gets a session that keeps a shadow copy of the content, debounces
//! writes back to the store, tracks collaborator presence and reacts to
//! control messages pushed through the same subscription.

pub mod content;
pub mod debouncer;
pub mod multiplexer;
pub mod presence;
pub mod registry;
pub mod session;

use std::time::Duration;

pub use content::ContentSynchronizer;
pub use debouncer::Debouncer;
pub use multiplexer::{ControlAction, UpdateEvent};
pub use presence::PresenceTracker;
pub use registry::{CleanupFn, SessionRegistry};
pub use session::{SessionCallbacks, SessionHandle, SessionOptions, SyncEngine};

pub const DEFAULT_CONTENT_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_PRESENCE_IDLE: Duration = Duration::from_secs(60);

/// Timing knobs for every session created by a [`SyncEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub content_delay: Duration,
    /// Shorter than `content_delay`; presence churns faster and is cheap to overwrite.
    pub presence_delay: Duration,
    /// Collaborators not seen for this long are not reported as active.
    pub presence_idle: Duration,
}

impl SyncSettings {
    /// Derives the presence delay as a tenth of the content delay.
    pub fn with_content_delay(content_delay: Duration) -> Self {
        Self {
            content_delay,
            presence_delay: content_delay / 10,
            presence_idle: DEFAULT_PRESENCE_IDLE,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::with_content_delay(DEFAULT_CONTENT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_flushes_before_content_by_default() {
        let settings = SyncSettings::default();
        assert_eq!(settings.content_delay, Duration::from_millis(1000));
        assert_eq!(settings.presence_delay, Duration::from_millis(100));
        assert!(settings.presence_delay < settings.content_delay);
    }
}
