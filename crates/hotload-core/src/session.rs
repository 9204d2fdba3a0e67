use serde::Serialize;
use tracing::debug;

use crate::activate::ControlSurface;

/// Counters across runs of one pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub fetch_attempts: u64,
}

/// Run counters plus the currently active control surface.
#[derive(Default)]
pub struct Session {
    stats: SessionStats,
    surface: Option<Box<dyn ControlSurface>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn surface(&self) -> Option<&dyn ControlSurface> {
        self.surface.as_deref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut (dyn ControlSurface + 'static)> {
        self.surface.as_deref_mut()
    }

    pub(crate) fn record_attempts(&mut self, attempts: u32) {
        self.stats.fetch_attempts += u64::from(attempts);
    }

    pub(crate) fn record_failure(&mut self) {
        self.stats.runs += 1;
        self.stats.failures += 1;
    }

    /// Count a success and swap in `surface`. The previous surface is
    /// cleaned up before it is dropped; a success without a surface leaves
    /// the old one torn down and clears the slot.
    pub(crate) fn record_success(&mut self, surface: Option<Box<dyn ControlSurface>>) {
        self.stats.runs += 1;
        self.stats.successes += 1;
        if let Some(mut previous) = self.surface.take() {
            debug!(version = previous.version(), "retiring previous control surface");
            previous.cleanup();
        }
        self.surface = surface;
    }

    /// Tear down the active surface, if any.
    pub fn shutdown(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingSurface;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn surface(version: &str, cleanups: &Arc<AtomicUsize>) -> Box<dyn ControlSurface> {
        Box::new(CountingSurface {
            version: version.into(),
            cleanups: Arc::clone(cleanups),
        })
    }

    #[test]
    fn success_replaces_and_cleans_previous_surface() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut session = Session::new();

        session.record_success(Some(surface("v1", &cleanups)));
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);

        session.record_success(Some(surface("v2", &cleanups)));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(session.surface().map(|s| s.version()), Some("v2"));
        assert_eq!(session.stats().successes, 2);
    }

    #[test]
    fn failure_keeps_surface() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut session = Session::new();
        session.record_success(Some(surface("v1", &cleanups)));

        session.record_failure();
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);
        assert_eq!(session.surface().map(|s| s.version()), Some("v1"));
        assert_eq!(
            session.stats(),
            SessionStats {
                runs: 2,
                successes: 1,
                failures: 1,
                fetch_attempts: 0
            }
        );
    }

    #[test]
    fn shutdown_cleans_active_surface() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut session = Session::new();
        session.record_success(Some(surface("v1", &cleanups)));
        session.shutdown();
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert!(session.surface().is_none());
    }
}
