use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

/// Handle to a pre-recorded background track. The core never decodes it,
/// it only tells the collaborator the track is ready to be played.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundClip {
    pub path: PathBuf,
    pub volume: f32,
}

/// Outbound calls to the visual / game layer. Both calls are fire-and-forget.
pub trait GameHooks {
    fn on_note_visual(&mut self, pitch: u8, velocity: f32);

    fn on_background_track_ready(&mut self, _clip: &BackgroundClip) {}
}

/// Hooks that only write to the log
#[derive(Debug, Default)]
pub struct LogHooks;

impl GameHooks for LogHooks {
    fn on_note_visual(&mut self, pitch: u8, velocity: f32) {
        log::trace!("[VISUAL] note {} velocity {:.2}", pitch, velocity);
    }

    fn on_background_track_ready(&mut self, clip: &BackgroundClip) {
        log::info!("[VISUAL] background track ready: {}", clip.path.display());
    }
}

/// Invoke a collaborator call, swallowing any panic it raises
pub(crate) fn fire<F: FnOnce()>(what: &str, call: F) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        log::warn!("collaborator call '{}' panicked; ignored", what);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_swallows_panics() {
        let mut reached = false;
        fire("boom", || panic!("collaborator failure"));
        fire("ok", || reached = true);
        assert!(reached);
    }
}
