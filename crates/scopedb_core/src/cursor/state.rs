//! Cursor lifecycle states.

use std::fmt;

/// Where a cursor is in its lifecycle.
///
/// ```text
/// Open --commit--> Committed  --close--> Closed
/// Open --rollback--> RolledBack --close--> Closed
/// Open --close (implicit rollback)-----> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Accepts reads, writes and nested cursors.
    Open,
    /// Committed; readable until closed.
    Committed,
    /// Rolled back; readable until closed.
    RolledBack,
    /// Terminal.
    Closed,
}

impl CursorState {
    /// Returns `true` once commit or rollback has run but close has not.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    /// Returns `true` if reads are allowed.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::Closed)
    }

    pub(crate) const fn describe(self) -> &'static str {
        match self {
            Self::Open => "cursor is open",
            Self::Committed => "cursor already committed",
            Self::RolledBack => "cursor already rolled back",
            Self::Closed => "cursor is closed",
        }
    }
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::Closed => "closed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_states() {
        assert!(!CursorState::Open.is_resolved());
        assert!(CursorState::Committed.is_resolved());
        assert!(CursorState::RolledBack.is_resolved());
        assert!(!CursorState::Closed.is_resolved());
        assert!(CursorState::RolledBack.is_readable());
        assert!(!CursorState::Closed.is_readable());
    }
}
