//! Mood profile definitions.
//!
//! Each mood is bootstrapped from a handful of hand-picked seed artists. Seed
//! names are written the way they appear in cleaned listening data.

use serde::Serialize;

/// A mood and the artists that seed it
#[derive(Debug, Clone, Serialize)]
pub struct MoodProfile {
    /// Lookup key (lowercase)
    #[serde(skip)]
    pub key: &'static str,
    /// Display name
    pub name: &'static str,
    pub description: &'static str,
    /// Ordered seed artists
    pub seed_artists: &'static [&'static str],
}

pub const MOOD_HEARTBREAK: MoodProfile = MoodProfile {
    key: "heartbreak",
    name: "Heartbreak 💔",
    description: "For when you need to feel it all...",
    seed_artists: &["radiohead", "bon iver", "elliott smith", "the smiths", "jeff buckley"],
};

pub const MOOD_LOVE: MoodProfile = MoodProfile {
    key: "love",
    name: "Romance ❤️",
    description: "Perfect for those in love",
    seed_artists: &["arctic monkeys", "the xx", "vampire weekend", "beach house", "mazzy star"],
};

pub const MOOD_FEELGOOD: MoodProfile = MoodProfile {
    key: "feelgood",
    name: "Feel Good 😊",
    description: "Uplifting and positive vibes",
    seed_artists: &["the beatles", "coldplay", "phoenix", "mgmt", "vampire weekend"],
};

pub const MOOD_RAGE: MoodProfile = MoodProfile {
    key: "rage",
    name: "Rage 🔥",
    description: "Let it all out",
    seed_artists: &[
        "rage against the machine",
        "system of a down",
        "metallica",
        "slipknot",
        "tool",
    ],
};

pub const MOOD_MOTIVATION: MoodProfile = MoodProfile {
    key: "motivation",
    name: "Motivation 💪",
    description: "Get pumped up",
    seed_artists: &["queen", "imagine dragons", "foo fighters", "linkin park", "muse"],
};

pub const MOOD_PARTY: MoodProfile = MoodProfile {
    key: "party",
    name: "Party 🎉",
    description: "Dance the night away",
    seed_artists: &["daft punk", "calvin harris", "david guetta", "avicii", "deadmau5"],
};

pub const MOOD_CHILL: MoodProfile = MoodProfile {
    key: "chill",
    name: "Chill 😌",
    description: "Relax and unwind",
    seed_artists: &["bonobo", "tycho", "zero 7", "air", "thievery corporation"],
};

pub const MOOD_LATENIGHT: MoodProfile = MoodProfile {
    key: "latenight",
    name: "Late Night 🌙",
    description: "For those midnight hours",
    seed_artists: &["the weeknd", "massive attack", "portishead", "fka twigs", "james blake"],
};

pub const MOOD_ROCK: MoodProfile = MoodProfile {
    key: "rock",
    name: "Rock Out 🎸",
    description: "Classic rock energy",
    seed_artists: &["led zeppelin", "pink floyd", "the rolling stones", "ac/dc", "the who"],
};

pub const MOOD_CLASSICAL: MoodProfile = MoodProfile {
    key: "classical",
    name: "Classical 🎩",
    description: "Timeless elegance",
    seed_artists: &["ludovico einaudi", "yiruma", "ólafur arnalds", "max richter", "nils frahm"],
};

pub const MOOD_JAZZ: MoodProfile = MoodProfile {
    key: "jazz",
    name: "Jazz 🎷",
    description: "Smooth and sophisticated",
    seed_artists: &[
        "miles davis",
        "john coltrane",
        "billie holiday",
        "ella fitzgerald",
        "chet baker",
    ],
};

pub const MOOD_FOCUS: MoodProfile = MoodProfile {
    key: "focus",
    name: "Focus 📚",
    description: "Concentration music",
    seed_artists: &[
        "ludovico einaudi",
        "max richter",
        "ólafur arnalds",
        "nils frahm",
        "explosions in the sky",
    ],
};

/// Every mood, in display order
pub const MOOD_PROFILES: &[MoodProfile] = &[
    MOOD_HEARTBREAK,
    MOOD_LOVE,
    MOOD_FEELGOOD,
    MOOD_RAGE,
    MOOD_MOTIVATION,
    MOOD_PARTY,
    MOOD_CHILL,
    MOOD_LATENIGHT,
    MOOD_ROCK,
    MOOD_CLASSICAL,
    MOOD_JAZZ,
    MOOD_FOCUS,
];

pub fn all_moods() -> &'static [MoodProfile] {
    MOOD_PROFILES
}

/// Find a mood by key, ignoring case and surrounding whitespace
pub fn get_mood(key: &str) -> Option<&'static MoodProfile> {
    let key = key.trim();
    MOOD_PROFILES.iter().find(|m| m.key.eq_ignore_ascii_case(key))
}
