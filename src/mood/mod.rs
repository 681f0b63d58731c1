//! Static mood profiles used to seed mood-based recommendations.

pub mod profiles;

pub use profiles::{all_moods, get_mood, MoodProfile, MOOD_PROFILES};
