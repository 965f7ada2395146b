//! Deferred callbacks attached to a cursor's lifecycle events.

use crate::error::CoreError;
use std::fmt;
use std::str::FromStr;

/// A zero-argument callback run when its event fires.
pub type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle events a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// The cursor committed.
    Commit,
    /// The cursor rolled back, explicitly or by closing without a commit.
    Rollback,
    /// The cursor closed.
    Close,
}

impl HookEvent {
    /// All events, in firing order of a cursor closed without a commit.
    pub const ALL: [HookEvent; 3] = [HookEvent::Commit, HookEvent::Rollback, HookEvent::Close];

    /// Event name accepted by [`crate::Cursor::after`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::Close => "close",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Commit => 0,
            Self::Rollback => 1,
            Self::Close => 2,
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookEvent {
    type Err = CoreError;

    /// Parses an event name. Names are case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(Self::Commit),
            "rollback" => Ok(Self::Rollback),
            "close" => Ok(Self::Close),
            other => Err(CoreError::validation(format!(
                "invalid hook event {other:?}: expected \"commit\", \"rollback\" or \"close\""
            ))),
        }
    }
}

/// Hooks of one cursor, grouped by event in registration order.
///
/// Each event fires at most once. A hook registered after its event fired
/// is dropped without running.
#[derive(Default)]
pub(crate) struct HookRegistry {
    pending: [Vec<Hook>; 3],
    fired: [bool; 3],
}

impl HookRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues `hook`. Returns `false` if `event` already fired.
    pub(crate) fn register(&mut self, event: HookEvent, hook: Hook) -> bool {
        if self.fired[event.index()] {
            return false;
        }
        self.pending[event.index()].push(hook);
        true
    }

    /// Runs every hook queued for `event` and marks it fired.
    ///
    /// Returns how many hooks ran.
    pub(crate) fn fire(&mut self, event: HookEvent) -> usize {
        let hooks = std::mem::take(&mut self.pending[event.index()]);
        self.fired[event.index()] = true;
        let count = hooks.len();
        for hook in hooks {
            hook();
        }
        count
    }

    pub(crate) fn pending(&self, event: HookEvent) -> usize {
        self.pending[event.index()].len()
    }

    /// Drops every queued hook without running it.
    pub(crate) fn clear(&mut self) {
        for hooks in &mut self.pending {
            hooks.clear();
        }
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for event in HookEvent::ALL {
            map.entry(&event.as_str(), &self.pending(event));
        }
        map.finish()
    }
}
