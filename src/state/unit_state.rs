/// Work-unit state definitions for tracking pipeline progress
///
/// A work unit is one search query or one seed URL. Every unit walks the
/// same state machine; the pipeline logs each transition.
use std::fmt;

/// Represents the current state of a work unit in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    // ===== Active States =====
    /// Unit has been read from input but not started
    Pending,

    /// Waiting on the search provider
    Searching,

    /// Seed URL taken as the sole candidate
    Seeded,

    /// Candidates are being filtered against exclusions, dedup, and checkpoint
    Filtering,

    /// Fetching the frontier level at the given depth
    Fetching { depth: u32 },

    /// Extracting text from fetched pages
    Extracting,

    /// Writing the accepted batch
    Writing,

    // ===== Terminal States =====
    /// Unit finished and recorded in the checkpoint
    Done,

    /// Unit was already done in the checkpoint
    Skipped,
}

impl UnitState {
    /// Returns true if no further processing happens for this unit
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// Returns true if moving from `self` to `next` follows the state machine
    ///
    /// `Done` is reachable from every active state so a failing unit can be
    /// closed out wherever it broke.
    pub fn can_transition_to(&self, next: UnitState) -> bool {
        use UnitState::*;

        if self.is_terminal() {
            return false;
        }
        if next == Done {
            return true;
        }

        match (*self, next) {
            (Pending, Searching) | (Pending, Seeded) | (Pending, Skipped) => true,
            (Searching, Filtering) | (Seeded, Filtering) => true,
            (Filtering, Fetching { depth: 0 }) => true,
            (Fetching { .. }, Extracting) => true,
            (Extracting, Fetching { .. }) | (Extracting, Writing) => true,
            (Fetching { .. }, Writing) => true,
            _ => false,
        }
    }

    /// Short label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Searching => "searching",
            Self::Seeded => "seeded",
            Self::Filtering => "filtering",
            Self::Fetching { .. } => "fetching",
            Self::Extracting => "extracting",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetching { depth } => write!(f, "fetching(depth={})", depth),
            other => write!(f, "{}", other.label()),
        }
    }
}
