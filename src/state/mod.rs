//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `StoryState`: where a story is within one run (discovering, fetching, done, ...)
//! - `SkipReason`: why a story was abandoned for a run
//! - `ProgressRecord`: the durable per-story resume point

mod progress;
mod story_state;

// Re-export main types
pub use progress::ProgressRecord;
pub use story_state::{SkipReason, StoryState};
