/// Story state definitions for tracking progress through one run
///
/// Every story the coordinator touches walks through these states and ends
/// in exactly one terminal state.
use std::fmt;

/// Represents where a story currently is within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryState {
    // ===== Active States =====
    /// Resolving story identity and metadata from its page
    Discovering,

    /// Computing which chapters to fetch
    Planning,

    /// Fetching planned chapters
    Fetching,

    /// Writing a fetched chapter to the sink and advancing progress
    Committing,

    // ===== Terminal States =====
    /// All planned work finished (possibly with zero new chapters)
    Done,

    /// Abandoned for this run; see the attached reason
    Skipped,
}

impl StoryState {
    /// Returns true if no further processing happens for this story
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// Returns true if the state may move to `next`
    ///
    /// Any active state may fall into `Skipped`. `Committing` loops back to
    /// `Fetching` for the next planned chapter.
    pub fn can_transition_to(&self, next: StoryState) -> bool {
        use StoryState::*;
        match (self, next) {
            (Discovering, Planning) => true,
            (Planning, Fetching) => true,
            (Fetching, Committing) | (Fetching, Done) => true,
            (Committing, Fetching) => true,
            (from, Skipped) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Planning => "planning",
            Self::Fetching => "fetching",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a story ended the run in `Skipped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The story page could not be fetched or parsed
    DiscoveryFailed,

    /// A chapter fetch kept failing after all retries
    FetchFailed,

    /// Writing the chapter or advancing progress failed
    CommitFailed,

    /// Persisted progress for the story is malformed
    CorruptState,

    /// The state store could not be read
    StorageUnavailable,

    /// The run was cancelled while the story was in flight
    Cancelled,
}

impl SkipReason {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::DiscoveryFailed => "discovery_failed",
            Self::FetchFailed => "fetch_failed",
            Self::CommitFailed => "commit_failed",
            Self::CorruptState => "corrupt_state",
            Self::StorageUnavailable => "storage_unavailable",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
