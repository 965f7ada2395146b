//! Hook recording.

use parking_lot::Mutex;
use std::sync::Arc;

/// Records the names of hooks as they run.
///
/// Cloning shares the log.
#[derive(Debug, Clone, Default)]
pub struct HookLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl HookLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a hook that appends `name` when run.
    pub fn hook(&self, name: impl Into<String>) -> impl FnOnce() + Send + 'static {
        let entries = Arc::clone(&self.entries);
        let name = name.into();
        move || entries.lock().push(name)
    }

    /// Returns the recorded names in firing order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Returns the recorded names and clears the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_call_order() {
        let log = HookLog::new();
        let a = log.hook("a");
        let b = log.hook("b");
        b();
        a();
        assert_eq!(log.take(), ["b", "a"]);
        assert!(log.entries().is_empty());
    }
}
