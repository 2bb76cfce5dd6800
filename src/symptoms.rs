//! Static symptom → watering action policy for photo diagnoses.

use serde::Serialize;

// ---

/// Label every unrecognized class resolves to.
pub const UNKNOWN: &str = "unknown";

/// Recommended reaction to a diagnosed symptom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SymptomAction {
    // ---
    /// Days to add to (positive) or remove from (negative) the watering interval.
    pub adjust_watering_days: f64,
    /// Millilitres to drop from (positive) or add to (negative) the next watering.
    pub reduce_water_ml: f64,
    pub notify_user: &'static str,
}

const fn action(days: f64, ml: f64, notify_user: &'static str) -> SymptomAction {
    SymptomAction {
        adjust_watering_days: days,
        reduce_water_ml: ml,
        notify_user,
    }
}

static TABLE: &[(&str, SymptomAction)] = &[
    (
        "healthy",
        action(0.0, 0.0, "The plant looks healthy. Keep the current watering schedule."),
    ),
    (
        "overwatering",
        action(2.0, 50.0, "Signs of overwatering. Let the soil dry out before the next watering."),
    ),
    (
        "underwatering",
        action(-1.0, -30.0, "Signs of underwatering. Water sooner and a little more."),
    ),
    (
        "root_rot",
        action(3.0, 80.0, "Possible root rot. Pause watering and check drainage."),
    ),
    (
        "leaf_spot",
        action(1.0, 20.0, "Leaf spots detected. Keep leaves dry and water at the base."),
    ),
    (
        "fungal_infection",
        action(1.0, 20.0, "Possible fungal infection. Improve airflow and reduce watering."),
    ),
    (
        "nutrient_deficiency",
        action(0.0, 0.0, "Possible nutrient deficiency. Consider fertilizing."),
    ),
    (
        "pest_damage",
        action(0.0, 0.0, "Pest damage detected. Inspect the leaves and treat the plant."),
    ),
    (
        "sunburn",
        action(0.0, 0.0, "Leaf scorch detected. Move the plant out of direct sun."),
    ),
    (
        UNKNOWN,
        action(0.0, 0.0, "The symptom could not be identified. Check the plant manually."),
    ),
];

/// Look up the action for `label`, falling back to the `unknown` entry.
pub fn lookup(label: &str) -> &'static SymptomAction {
    // ---
    find(label)
        .or_else(|| find(UNKNOWN))
        .unwrap_or(&UNKNOWN_ACTION)
}

// Same text as the table's `unknown` row; only reached if that row is removed.
static UNKNOWN_ACTION: SymptomAction =
    action(0.0, 0.0, "The symptom could not be identified. Check the plant manually.");

fn find(label: &str) -> Option<&'static SymptomAction> {
    TABLE
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, action)| action)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_table_contains_unknown_entry() {
        // ---
        assert!(find(UNKNOWN).is_some());
        assert_eq!(find(UNKNOWN), Some(&UNKNOWN_ACTION));
    }

    #[test]
    fn test_lookup_known_label() {
        // ---
        let entry = lookup("overwatering");
        assert_eq!(entry.adjust_watering_days, 2.0);
        assert_eq!(entry.reduce_water_ml, 50.0);
    }

    #[test]
    fn test_lookup_is_total() {
        // ---
        for label in ["", "UNKNOWN", "Healthy", "spider_mites", "🌱"] {
            assert_eq!(lookup(label), find(UNKNOWN).unwrap(), "label {label:?}");
        }
    }

    #[test]
    fn test_labels_are_unique() {
        // ---
        let mut names: Vec<_> = TABLE.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TABLE.len());
    }
}
