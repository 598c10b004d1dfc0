//! Random label generation
//!
//! Entities created without an explicit label get a readable
//! adjective-noun pair so that traces and telemetry stay greppable.

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brisk", "calm", "clever", "crimson", "dusty", "eager", "fuzzy", "gentle",
    "golden", "hazy", "icy", "jolly", "keen", "lively", "mellow", "nimble", "opal", "pale",
    "quiet", "rapid", "rustic", "silent", "sleek", "solar", "stout", "swift", "tidy", "vivid",
    "wild", "witty",
];

const NOUNS: &[&str] = &[
    "aurora", "badger", "basin", "beacon", "brook", "canyon", "cedar", "comet", "crane", "delta",
    "ember", "falcon", "fjord", "garnet", "glacier", "harbor", "heron", "lagoon", "lark", "mesa",
    "nebula", "osprey", "otter", "pebble", "prairie", "quartz", "raven", "reef", "sparrow",
    "summit", "thicket", "willow",
];

/// Draw a fresh `adjective-noun` label.
pub fn random_label(rng: &mut fastrand::Rng) -> String {
    let adjective = ADJECTIVES[rng.usize(..ADJECTIVES.len())];
    let noun = NOUNS[rng.usize(..NOUNS.len())];
    format!("{adjective}-{noun}")
}

/// Use the given label, or draw one.
pub fn label_or_random(label: Option<String>, rng: &mut fastrand::Rng) -> String {
    label.unwrap_or_else(|| random_label(rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_adjective_noun_pairs() {
        let mut rng = fastrand::Rng::with_seed(1);
        let label = random_label(&mut rng);
        let parts: Vec<&str> = label.split('-').collect();
        assert_eq!(parts.len(), 2);
        assert!(ADJECTIVES.contains(&parts[0]));
        assert!(NOUNS.contains(&parts[1]));
    }

    #[test]
    fn explicit_label_wins() {
        let mut rng = fastrand::Rng::with_seed(1);
        assert_eq!(
            label_or_random(Some("edge-0".into()), &mut rng),
            "edge-0".to_string()
        );
    }
}
