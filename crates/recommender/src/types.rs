//! Core data model for the recommendation engine
//!
//! Items are owned by the catalog cache and shared downstream behind `Arc`.
//! User state (preference vector, seen/rejected sets, liked list, wishlist,
//! interaction log) is owned by the queue service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Supported catalog platforms.
///
/// Provider-side platform names are resolved to this enum inside the
/// provider adapter, so downstream code never matches on strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "PlayStation 1")]
    PlayStation1,
    #[serde(rename = "PlayStation 2")]
    PlayStation2,
    #[serde(rename = "PlayStation 3")]
    PlayStation3,
    #[serde(rename = "PlayStation Vita")]
    PlayStationVita,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::PlayStation1,
        Platform::PlayStation2,
        Platform::PlayStation3,
        Platform::PlayStationVita,
    ];

    /// Display name, also used for cache keys and preference keys
    pub fn name(&self) -> &'static str {
        match self {
            Platform::PlayStation1 => "PlayStation 1",
            Platform::PlayStation2 => "PlayStation 2",
            Platform::PlayStation3 => "PlayStation 3",
            Platform::PlayStationVita => "PlayStation Vita",
        }
    }

    /// Platform id used by the RAWG catalog
    pub fn rawg_id(&self) -> u32 {
        match self {
            Platform::PlayStation1 => 10,
            Platform::PlayStation2 => 15,
            Platform::PlayStation3 => 16,
            Platform::PlayStationVita => 19,
        }
    }

    pub fn from_rawg_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.rawg_id() == id)
    }

    /// Years during which the platform generation was actively released for
    pub fn active_years(&self) -> (i32, i32) {
        match self {
            Platform::PlayStation1 => (1994, 2006),
            Platform::PlayStation2 => (2000, 2013),
            Platform::PlayStation3 => (2006, 2017),
            Platform::PlayStationVita => (2011, 2019),
        }
    }

    pub fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "playstation 1" | "playstation" | "ps1" | "psx" => Ok(Platform::PlayStation1),
            "playstation 2" | "ps2" => Ok(Platform::PlayStation2),
            "playstation 3" | "ps3" => Ok(Platform::PlayStation3),
            "playstation vita" | "ps vita" | "vita" => Ok(Platform::PlayStationVita),
            _ => Err(EngineError::UnsupportedPlatform(s.to_string())),
        }
    }
}

/// Non-empty set of selected platforms.
///
/// The cache key is the sorted, comma-joined set of platform names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformSet(BTreeSet<Platform>);

impl PlatformSet {
    pub fn new(platforms: impl IntoIterator<Item = Platform>) -> Result<Self, EngineError> {
        let set: BTreeSet<Platform> = platforms.into_iter().collect();
        if set.is_empty() {
            return Err(EngineError::EmptyPlatformSet);
        }
        Ok(Self(set))
    }

    /// Parse platform names, rejecting unknown ones
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, EngineError> {
        let platforms = names
            .iter()
            .map(|n| n.as_ref().parse::<Platform>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(platforms)
    }

    pub fn cache_key(&self) -> String {
        let mut names: Vec<&str> = self.0.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.join(",")
    }

    pub fn contains(&self, platform: Platform) -> bool {
        self.0.contains(&platform)
    }

    pub fn iter(&self) -> impl Iterator<Item = Platform> + '_ {
        self.0.iter().copied()
    }

    /// First platform in the set's order
    pub fn first(&self) -> Platform {
        // sets are never empty; the fallback is unreachable
        self.0.iter().next().copied().unwrap_or(Platform::PlayStation2)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlatformSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Letter grade derived from critic and user scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatingClass {
    S,
    A,
    B,
    C,
    E,
    D,
    F,
}

impl RatingClass {
    /// Derive a grade from a critic score (0-100) and a user rating (0-5)
    pub fn derive(metacritic: Option<u32>, rating: Option<f32>) -> Self {
        let mc = metacritic.unwrap_or(0);
        let r = rating.unwrap_or(0.0);

        if mc >= 90 {
            RatingClass::S
        } else if mc >= 80 || r >= 4.5 {
            RatingClass::A
        } else if mc >= 70 || r >= 3.5 {
            RatingClass::B
        } else if mc >= 60 || r >= 2.5 {
            RatingClass::C
        } else if mc >= 50 || r >= 1.5 {
            RatingClass::E
        } else if mc >= 40 || r >= 1.0 {
            RatingClass::D
        } else {
            RatingClass::F
        }
    }
}

/// A single catalog entry.
///
/// Items are immutable once fetched except for `description`, which can be
/// upgraded by applying an [`ItemDetail`] patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    /// `None` when the release date is unknown
    pub release_year: Option<i32>,
    pub platform: Platform,
    pub developer: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    /// At most 8 tags are retained
    #[serde(default)]
    pub tags: Vec<String>,
    /// User rating on a 0-5 scale
    pub rating: Option<f32>,
    pub metacritic: Option<u32>,
    pub rating_class: RatingClass,
    /// First image is the primary one
    #[serde(default)]
    pub images: Vec<String>,
}

impl Item {
    /// Genres followed by tags, in record order (duplicates preserved)
    pub fn feature_keys(&self) -> impl Iterator<Item = &str> {
        self.genres
            .iter()
            .chain(self.tags.iter())
            .map(String::as_str)
    }

    /// Deduplicated union of genres and tags
    pub fn feature_set(&self) -> HashSet<&str> {
        self.feature_keys().collect()
    }

    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false)
    }

    /// Apply a detail patch fetched after the summary record
    pub fn apply_detail(&mut self, detail: ItemDetail) {
        if let Some(description) = detail.description.filter(|d| !d.trim().is_empty()) {
            self.description = Some(description);
        }
        if self.developer.is_none() {
            self.developer = detail.developer;
        }
    }
}

/// Long-form fields fetched lazily for a single item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub description: Option<String>,
    pub developer: Option<String>,
}

/// Swipe action recorded against an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[serde(alias = "wishlisted")]
    Accepted,
    Skipped,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Accepted => "accepted",
            Action::Skipped => "skipped",
            Action::Rejected => "rejected",
            Action::Unknown => "unknown",
        }
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "accepted" | "wishlisted" => Action::Accepted,
            "skipped" => Action::Skipped,
            "rejected" => Action::Rejected,
            _ => Action::Unknown,
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only interaction log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub item_id: String,
    pub action: Action,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    pub fn new(item_id: impl Into<String>, action: Action) -> Self {
        Self {
            item_id: item_id.into(),
            action,
            timestamp: Utc::now(),
        }
    }
}

/// Additive feature weights learned from interactions.
///
/// Keys are genre/tag names, `dev_<developer>` or `platform_<platform>`.
/// An absent key has weight 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceVector(HashMap<String, f64>);

impl PreferenceVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    pub fn add(&mut self, key: impl Into<String>, delta: f64) {
        *self.0.entry(key.into()).or_insert(0.0) += delta;
    }

    pub fn developer_key(developer: &str) -> String {
        format!("dev_{}", developer)
    }

    pub fn platform_key(platform: Platform) -> String {
        format!("platform_{}", platform.name())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl FromIterator<(String, f64)> for PreferenceVector {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-user state consumed by the queue builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub preference_vector: PreferenceVector,
    pub seen: HashSet<String>,
    pub rejected: HashSet<String>,
    /// Accepted item ids in acceptance order
    pub liked: Vec<String>,
    pub wishlist: Vec<String>,
    pub interactions: Vec<Interaction>,
}

impl UserState {
    /// True when any preference signal exists
    pub fn has_history(&self) -> bool {
        !self.preference_vector.is_empty() || !self.liked.is_empty()
    }

    pub fn is_excluded(&self, item_id: &str) -> bool {
        self.seen.contains(item_id) || self.rejected.contains(item_id)
    }
}
