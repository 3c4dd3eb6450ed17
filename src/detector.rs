//! Dialect detection
//!
//! Classifies a [`Document`] by weighted feature scoring. Features are
//! presence checks on top-level fields plus the shape of action entries.
//! Each dialect sums fixed weights for its own features and subtracts
//! penalties for the defining features of the others; the score is
//! clamped to `[0, 1]` and the strictly highest score wins.

use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeSet;

use crate::dialect::{compact, simplified, Dialect, Document};

/// Default confidence below which a warning is attached
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// Fraction of entries above which a shape counts as the majority
const MAJORITY: f64 = 0.8;

/// Named structural feature of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    TestField,
    DoField,
    NavField,
    DataField,
    NameField,
    StepsField,
    InfrastructureField,
    ConfigField,
    ExtendedConfig,
    CompactActions,
    MajorityCompactActions,
    SimplifiedSteps,
    MajoritySimplifiedSteps,
    TypedSteps,
    MajorityTypedSteps,
}

struct Weights {
    positive: &'static [(Feature, f64)],
    negative: &'static [(Feature, f64)],
}

const COMPACT_WEIGHTS: Weights = Weights {
    positive: &[
        (Feature::TestField, 0.3),
        (Feature::DoField, 0.3),
        (Feature::CompactActions, 0.2),
        (Feature::MajorityCompactActions, 0.1),
        (Feature::NavField, 0.05),
        (Feature::DataField, 0.05),
    ],
    negative: &[
        (Feature::NameField, 0.3),
        (Feature::StepsField, 0.3),
        (Feature::InfrastructureField, 0.3),
        (Feature::TypedSteps, 0.2),
    ],
};

const SIMPLIFIED_WEIGHTS: Weights = Weights {
    positive: &[
        (Feature::NameField, 0.25),
        (Feature::StepsField, 0.25),
        (Feature::SimplifiedSteps, 0.25),
        (Feature::MajoritySimplifiedSteps, 0.25),
    ],
    negative: &[
        (Feature::TestField, 0.4),
        (Feature::DoField, 0.4),
        (Feature::InfrastructureField, 0.5),
        (Feature::TypedSteps, 0.5),
        (Feature::ExtendedConfig, 0.2),
    ],
};

const EXTENDED_WEIGHTS: Weights = Weights {
    positive: &[
        (Feature::InfrastructureField, 0.35),
        (Feature::TypedSteps, 0.25),
        (Feature::MajorityTypedSteps, 0.2),
        (Feature::ExtendedConfig, 0.1),
        (Feature::NameField, 0.05),
        (Feature::StepsField, 0.05),
    ],
    negative: &[
        (Feature::TestField, 0.4),
        (Feature::DoField, 0.4),
        (Feature::CompactActions, 0.3),
        (Feature::SimplifiedSteps, 0.4),
    ],
};

/// Per-dialect scores before the winner is picked
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Scores {
    pub compact: f64,
    pub simplified: f64,
    pub extended: f64,
}

/// Outcome of classifying one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub dialect: Dialect,
    pub confidence: f64,
    pub features: BTreeSet<Feature>,
    pub scores: Scores,
    pub warnings: Vec<String>,
}

impl DetectionResult {
    pub fn has(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

/// Dialect detector
#[derive(Debug, Clone, Copy)]
pub struct Detector {
    min_confidence: f64,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl Detector {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Classify a document. Pure and deterministic.
    pub fn detect(&self, doc: &Document) -> DetectionResult {
        if doc.is_empty() {
            return DetectionResult {
                dialect: Dialect::Unknown,
                confidence: 0.0,
                features: BTreeSet::new(),
                scores: Scores::default(),
                warnings: vec!["empty document".to_string()],
            };
        }

        let features = extract_features(doc);
        let scores = Scores {
            compact: score(&features, &COMPACT_WEIGHTS),
            simplified: score(&features, &SIMPLIFIED_WEIGHTS),
            extended: score(&features, &EXTENDED_WEIGHTS),
        };
        let (mut dialect, mut confidence) = pick(&scores);
        let mut warnings = Vec::new();

        if let Some(conflict) = mixed_format(doc, &features) {
            tracing::debug!(%conflict, "Mixed dialect indicators");
            warnings.push(conflict);
            dialect = Dialect::Unknown;
            confidence = 0.0;
        }

        if confidence < self.min_confidence {
            warnings.push(format!(
                "Low confidence detection ({confidence:.2}). Format may be ambiguous"
            ));
        }

        DetectionResult {
            dialect,
            confidence,
            features,
            scores,
            warnings,
        }
    }
}

/// Classify with the default confidence threshold
pub fn detect(doc: &Document) -> DetectionResult {
    Detector::default().detect(doc)
}

fn extract_features(doc: &Document) -> BTreeSet<Feature> {
    let mut features = BTreeSet::new();
    let fields = [
        ("test", Feature::TestField),
        ("do", Feature::DoField),
        ("nav", Feature::NavField),
        ("data", Feature::DataField),
        ("name", Feature::NameField),
        ("steps", Feature::StepsField),
        ("infrastructure", Feature::InfrastructureField),
        ("config", Feature::ConfigField),
    ];
    for (key, feature) in fields {
        if doc.contains_key(key) {
            features.insert(feature);
        }
    }

    if let Some(Value::Mapping(config)) = doc.get("config") {
        if config.contains_key("timeout") {
            features.insert(Feature::ExtendedConfig);
        }
    }

    let entries = ["setup", "do", "teardown", "steps"]
        .iter()
        .flat_map(|key| doc.sequence(key));
    let mut total = 0usize;
    let mut compact_count = 0usize;
    let mut simplified_count = 0usize;
    let mut typed_count = 0usize;

    for entry in entries {
        total += 1;
        let Some(map) = entry.as_mapping() else {
            continue;
        };
        let keys: Vec<&str> = map.keys().filter_map(Value::as_str).collect();

        if keys.contains(&"type") {
            typed_count += 1;
            continue;
        }
        if keys.iter().any(|k| is_compact_key(k)) {
            compact_count += 1;
        }
        if keys.iter().any(|k| simplified::VERBS.contains(k)) {
            simplified_count += 1;
        }
    }

    let mut mark = |count: usize, any: Feature, majority: Feature| {
        if count > 0 {
            features.insert(any);
        }
        if total > 0 && count as f64 / total as f64 > MAJORITY {
            features.insert(majority);
        }
    };
    mark(
        compact_count,
        Feature::CompactActions,
        Feature::MajorityCompactActions,
    );
    mark(
        simplified_count,
        Feature::SimplifiedSteps,
        Feature::MajoritySimplifiedSteps,
    );
    mark(typed_count, Feature::TypedSteps, Feature::MajorityTypedSteps);

    features
}

/// Short keys (`c`, `t`, `ch`, ...) mark compact actions
fn is_compact_key(key: &str) -> bool {
    key != "type" && (key.len() <= 4 || compact::ACTION_KEYS.contains(&key))
}

fn score(features: &BTreeSet<Feature>, weights: &Weights) -> f64 {
    let sum_of = |list: &[(Feature, f64)]| -> f64 {
        list.iter()
            .filter(|(f, _)| features.contains(f))
            .map(|(_, w)| w)
            .sum()
    };
    (sum_of(weights.positive) - sum_of(weights.negative)).clamp(0.0, 1.0)
}

fn pick(scores: &Scores) -> (Dialect, f64) {
    let candidates = [
        (Dialect::Compact, scores.compact),
        (Dialect::Simplified, scores.simplified),
        (Dialect::Extended, scores.extended),
    ];
    let best = candidates
        .iter()
        .map(|(_, s)| *s)
        .fold(0.0_f64, f64::max);
    let winners: Vec<_> = candidates.iter().filter(|(_, s)| *s == best).collect();
    match winners.as_slice() {
        [(dialect, score)] if *score > 0.0 => (*dialect, *score),
        _ => (Dialect::Unknown, 0.0),
    }
}

/// Conflicting indicators force an `Unknown` result
fn mixed_format(doc: &Document, features: &BTreeSet<Feature>) -> Option<String> {
    let compact_field = ["test", "do"].into_iter().find(|k| doc.contains_key(k));
    let simplified_field = ["name", "steps"].into_iter().find(|k| doc.contains_key(k));
    if let (Some(a), Some(b)) = (compact_field, simplified_field) {
        return Some(format!(
            "Mixed format indicators: both '{a}' and '{b}' fields present"
        ));
    }
    if features.contains(&Feature::CompactActions) && features.contains(&Feature::TypedSteps) {
        return Some(
            "Mixed format indicators: both compact actions and steps with a 'type' field present"
                .to_string(),
        );
    }
    None
}
