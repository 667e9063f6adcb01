//! Preference Model
//!
//! Maintains an additive weight vector over genres/tags, developers and
//! platforms. Every interaction adds a fixed delta to each feature of the
//! item it was recorded against.

use tracing::warn;

use crate::types::{Action, Interaction, Item, PreferenceVector};

const ACCEPTED_DELTA: f64 = 1.5;
const SKIPPED_DELTA: f64 = -0.1;
const REJECTED_DELTA: f64 = -1.2;
const DEVELOPER_FACTOR: f64 = 0.3;
const PLATFORM_FACTOR: f64 = 0.2;

/// Weight delta applied to each feature for an action
pub fn action_delta(action: Action) -> f64 {
    match action {
        Action::Accepted => ACCEPTED_DELTA,
        Action::Skipped => SKIPPED_DELTA,
        Action::Rejected => REJECTED_DELTA,
        Action::Unknown => 0.0,
    }
}

/// Apply one interaction to a preference vector
///
/// Pure: returns a new vector and leaves `current` untouched.
/// - every genre and tag gets `delta`
/// - `dev_<developer>` gets `0.3 * delta`
/// - `platform_<platform>` gets `0.2 * delta`
pub struct UpdatePreferenceVector;

impl UpdatePreferenceVector {
    pub fn execute(action: Action, item: &Item, current: &PreferenceVector) -> PreferenceVector {
        let mut next = current.clone();
        Self::apply(action, item, &mut next);
        next
    }

    /// In-place variant used when replaying a log
    pub fn apply(action: Action, item: &Item, vector: &mut PreferenceVector) {
        if action == Action::Unknown {
            warn!(item_id = %item.id, "Unrecognized action, preference vector unchanged");
            return;
        }
        let delta = action_delta(action);

        for key in item.feature_keys() {
            vector.add(key, delta);
        }

        if let Some(developer) = item.developer.as_deref() {
            vector.add(
                PreferenceVector::developer_key(developer),
                delta * DEVELOPER_FACTOR,
            );
        }

        vector.add(
            PreferenceVector::platform_key(item.platform),
            delta * PLATFORM_FACTOR,
        );
    }
}

/// Recompute a preference vector by replaying an interaction log.
///
/// Interactions whose item cannot be resolved are skipped.
pub struct RebuildPreferenceVector;

impl RebuildPreferenceVector {
    pub fn execute<'a>(
        interactions: &[Interaction],
        lookup: impl Fn(&str) -> Option<&'a Item>,
    ) -> PreferenceVector {
        let mut vector = PreferenceVector::new();
        for interaction in interactions {
            if let Some(item) = lookup(&interaction.item_id) {
                UpdatePreferenceVector::apply(interaction.action, item, &mut vector);
            }
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Platform, RatingClass};

    fn item(genres: &[&str], developer: Option<&str>) -> Item {
        Item {
            id: "42".to_string(),
            title: "Test".to_string(),
            release_year: Some(2004),
            platform: Platform::PlayStation2,
            developer: developer.map(String::from),
            description: None,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            tags: vec!["singleplayer".to_string()],
            rating: None,
            metacritic: None,
            rating_class: RatingClass::F,
            images: Vec::new(),
        }
    }

    #[test]
    fn test_accept_adds_weights() {
        let it = item(&["rpg", "action"], Some("Square"));
        let vector = UpdatePreferenceVector::execute(Action::Accepted, &it, &PreferenceVector::new());

        assert_eq!(vector.weight("rpg"), 1.5);
        assert_eq!(vector.weight("action"), 1.5);
        assert_eq!(vector.weight("singleplayer"), 1.5);
        assert!((vector.weight("dev_Square") - 0.45).abs() < 1e-9);
        assert!((vector.weight("platform_PlayStation 2") - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_update_is_pure() {
        let it = item(&["rpg"], None);
        let start = PreferenceVector::new();
        let _ = UpdatePreferenceVector::execute(Action::Rejected, &it, &start);
        assert!(start.is_empty());
    }

    #[test]
    fn test_unknown_action_changes_nothing() {
        let it = item(&["rpg"], None);
        let vector = UpdatePreferenceVector::execute(Action::Unknown, &it, &PreferenceVector::new());
        assert!(vector.is_empty());
    }

    #[test]
    fn test_missing_developer_is_skipped() {
        let it = item(&["rpg"], None);
        let vector = UpdatePreferenceVector::execute(Action::Accepted, &it, &PreferenceVector::new());
        assert!(vector.iter().all(|(k, _)| !k.starts_with("dev_")));
    }

    #[test]
    fn test_rebuild_matches_incremental_updates() {
        let a = item(&["rpg"], Some("Atlus"));
        let mut b = item(&["puzzle"], None);
        b.id = "43".to_string();

        let log = vec![
            Interaction::new("42", Action::Accepted),
            Interaction::new("43", Action::Skipped),
            Interaction::new("missing", Action::Accepted),
            Interaction::new("42", Action::Rejected),
        ];

        let items = [a.clone(), b.clone()];
        let rebuilt = RebuildPreferenceVector::execute(&log, |id| items.iter().find(|i| i.id == id));

        let mut incremental = PreferenceVector::new();
        incremental = UpdatePreferenceVector::execute(Action::Accepted, &a, &incremental);
        incremental = UpdatePreferenceVector::execute(Action::Skipped, &b, &incremental);
        incremental = UpdatePreferenceVector::execute(Action::Rejected, &a, &incremental);

        for (key, weight) in incremental.iter() {
            assert!((rebuilt.weight(key) - weight).abs() < 1e-9, "{}", key);
        }
        assert_eq!(rebuilt.len(), incremental.len());
    }
}
