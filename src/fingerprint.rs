use std::fmt;

use serde::{Serialize, Serializer};

use crate::spotify::data::AudioFeatures;

const TEMPO_RANGE: (f64, f64) = (50.0, 200.0);
const LOUDNESS_RANGE: (f64, f64) = (-30.0, 0.0);
const DEFAULT_THRESHOLDS: (f64, f64) = (0.33, 0.66);
const COMPLEXITY_THRESHOLDS: (f64, f64) = (0.40, 0.70);

pub fn clamp(x: f64, low: f64, high: f64) -> f64 {
    low.max(x.min(high))
}

fn unit(x: f64) -> f64 {
    clamp(x, 0.0, 1.0)
}

/// Maps `x` from `[low, high]` onto `[0, 1]`. A degenerate range maps to 0.
pub fn normalize_range(x: f64, low: f64, high: f64) -> f64 {
    if high == low {
        return 0.0;
    }
    unit((x - low) / (high - low))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn bucket(score: f64, (t1, t2): (f64, f64)) -> Self {
        if score < t1 {
            Level::Low
        } else if score < t2 {
            Level::Medium
        } else {
            Level::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Energy,
    Valence,
    Intensity,
    Complexity,
    Size,
}

impl Dimension {
    fn thresholds(self) -> (f64, f64) {
        match self {
            Dimension::Complexity => COMPLEXITY_THRESHOLDS,
            _ => DEFAULT_THRESHOLDS,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Dimension::Energy => "energy",
            Dimension::Valence => "valence",
            Dimension::Intensity => "intensity",
            Dimension::Complexity => "complexity",
            Dimension::Size => "size",
        }
    }

    fn adjective(self, level: Level) -> &'static str {
        match (self, level) {
            (Dimension::Valence, Level::Low) => "negative",
            (Dimension::Valence, Level::Medium) => "neutral",
            (Dimension::Valence, Level::High) => "positive",
            (Dimension::Size, Level::Low) => "small",
            (Dimension::Size, Level::Medium) => "medium",
            (Dimension::Size, Level::High) => "large",
            (_, Level::Low) => "low",
            (_, Level::Medium) => "medium",
            (_, Level::High) => "high",
        }
    }
}

/// One scored dimension, e.g. "high energy" at 0.81.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub dimension: Dimension,
    pub score: f64,
    pub level: Level,
}

impl Reading {
    fn new(dimension: Dimension, raw: f64) -> Self {
        let score = unit(raw);
        Self {
            dimension,
            score,
            level: Level::bucket(score, dimension.thresholds()),
        }
    }

    pub fn label(&self) -> String {
        format!(
            "{} {}",
            self.dimension.adjective(self.level),
            self.dimension.noun()
        )
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Reading", 3)?;
        state.serialize_field("score", &self.score)?;
        state.serialize_field("level", &self.level)?;
        state.serialize_field("label", &self.label())?;
        state.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fingerprint {
    pub energy: Reading,
    pub valence: Reading,
    pub intensity: Reading,
    pub complexity: Reading,
    pub size: Reading,
}

impl Fingerprint {
    pub fn readings(&self) -> [&Reading; 5] {
        [
            &self.energy,
            &self.valence,
            &self.intensity,
            &self.complexity,
            &self.size,
        ]
    }
}

fn complexity_raw(features: &AudioFeatures) -> f64 {
    let mut raw = if matches!(features.time_signature, 3 | 4) {
        0.25
    } else {
        0.65
    };
    if features.mode == 0 {
        raw += 0.15;
    }
    if features.key == -1 {
        raw += 0.10;
    }
    raw
}

pub fn compute(features: &AudioFeatures) -> Fingerprint {
    let tempo_n = normalize_range(features.tempo, TEMPO_RANGE.0, TEMPO_RANGE.1);
    let loudness_n = normalize_range(features.loudness, LOUDNESS_RANGE.0, LOUDNESS_RANGE.1);

    Fingerprint {
        energy: Reading::new(
            Dimension::Energy,
            0.45 * features.energy + 0.35 * tempo_n + 0.20 * features.danceability,
        ),
        valence: Reading::new(
            Dimension::Valence,
            0.85 * features.valence + 0.15 * tempo_n,
        ),
        intensity: Reading::new(
            Dimension::Intensity,
            0.45 * features.energy + 0.35 * loudness_n + 0.20 * tempo_n,
        ),
        complexity: Reading::new(Dimension::Complexity, complexity_raw(features)),
        size: Reading::new(
            Dimension::Size,
            0.55 * (1.0 - features.acousticness)
                + 0.25 * (1.0 - features.instrumentalness)
                + 0.20 * features.valence,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_normalize_range() {
        assert!(approx(normalize_range(125.0, 50.0, 200.0), 0.5));
        assert_eq!(normalize_range(20.0, 50.0, 200.0), 0.0);
        assert_eq!(normalize_range(250.0, 50.0, 200.0), 1.0);
        assert_eq!(normalize_range(5.0, 3.0, 3.0), 0.0);
        assert!(approx(normalize_range(-15.0, -30.0, 0.0), 0.5));
    }

    #[test]
    fn test_bucket_thresholds_are_exclusive_upper_bounds() {
        assert_eq!(Level::bucket(0.329, DEFAULT_THRESHOLDS), Level::Low);
        assert_eq!(Level::bucket(0.33, DEFAULT_THRESHOLDS), Level::Medium);
        assert_eq!(Level::bucket(0.66, DEFAULT_THRESHOLDS), Level::High);
        assert_eq!(Level::bucket(0.40, COMPLEXITY_THRESHOLDS), Level::Medium);
        assert_eq!(Level::bucket(0.69, COMPLEXITY_THRESHOLDS), Level::Medium);
    }

    #[test]
    fn test_upbeat_pop_track() {
        let features = AudioFeatures {
            tempo: 125.0,
            danceability: 0.8,
            energy: 0.9,
            valence: 0.9,
            loudness: -4.5,
            time_signature: 4,
            key: 5,
            mode: 1,
            acousticness: 0.05,
            instrumentalness: 0.0,
            ..AudioFeatures::default()
        };
        let fp = compute(&features);

        // 0.45*0.9 + 0.35*0.5 + 0.20*0.8
        assert!(approx(fp.energy.score, 0.74));
        assert_eq!(fp.energy.label(), "high energy");
        // 0.85*0.9 + 0.15*0.5
        assert!(approx(fp.valence.score, 0.84));
        assert_eq!(fp.valence.label(), "positive valence");
        // 0.45*0.9 + 0.35*0.85 + 0.20*0.5
        assert!(approx(fp.intensity.score, 0.8025));
        assert_eq!(fp.intensity.label(), "high intensity");
        assert!(approx(fp.complexity.score, 0.25));
        assert_eq!(fp.complexity.label(), "low complexity");
        // 0.55*0.95 + 0.25*1.0 + 0.20*0.9
        assert!(approx(fp.size.score, 0.9525));
        assert_eq!(fp.size.label(), "large size");
    }

    #[test]
    fn test_quiet_acoustic_track() {
        let features = AudioFeatures {
            tempo: 60.0,
            danceability: 0.3,
            energy: 0.1,
            valence: 0.1,
            loudness: -25.0,
            time_signature: 4,
            key: 2,
            mode: 0,
            acousticness: 0.95,
            instrumentalness: 0.9,
            ..AudioFeatures::default()
        };
        let fp = compute(&features);

        assert_eq!(fp.energy.label(), "low energy");
        assert_eq!(fp.valence.label(), "negative valence");
        assert_eq!(fp.intensity.label(), "low intensity");
        // 0.25 + 0.15 minor
        assert!(approx(fp.complexity.score, 0.40));
        assert_eq!(fp.complexity.label(), "medium complexity");
        // 0.55*0.05 + 0.25*0.1 + 0.20*0.1
        assert!(approx(fp.size.score, 0.0725));
        assert_eq!(fp.size.label(), "small size");
    }

    #[test]
    fn test_odd_meter_minor_without_key_scores_high() {
        let features = AudioFeatures {
            time_signature: 7,
            mode: 0,
            key: -1,
            ..AudioFeatures::default()
        };
        let fp = compute(&features);
        // 0.65 + 0.15 + 0.10
        assert_eq!(fp.complexity.score, 0.90);
        assert_eq!(fp.complexity.level, Level::High);
    }

    #[test]
    fn test_scores_stay_in_unit_interval_for_extreme_inputs() {
        let extremes = [
            AudioFeatures {
                tempo: 1000.0,
                danceability: 5.0,
                energy: 5.0,
                valence: 5.0,
                loudness: 20.0,
                acousticness: -3.0,
                instrumentalness: -3.0,
                ..AudioFeatures::default()
            },
            AudioFeatures {
                tempo: -10.0,
                danceability: -5.0,
                energy: -5.0,
                valence: -5.0,
                loudness: -200.0,
                acousticness: 4.0,
                instrumentalness: 4.0,
                ..AudioFeatures::default()
            },
        ];
        for features in &extremes {
            for reading in compute(features).readings() {
                assert!((0.0..=1.0).contains(&reading.score), "{:?}", reading);
            }
        }
    }

    #[test]
    fn test_default_features_fingerprint() {
        let fp = compute(&AudioFeatures::default());
        assert_eq!(fp.energy.score, 0.0);
        assert_eq!(fp.intensity.score, 0.0);
        // 0.55 + 0.25
        assert!(approx(fp.size.score, 0.80));
        assert_eq!(fp.size.label(), "large size");
    }

    #[test]
    fn test_reading_serializes_label() {
        let fp = compute(&AudioFeatures::default());
        let json = serde_json::to_value(fp.energy).unwrap();
        assert_eq!(json["level"], "low");
        assert_eq!(json["label"], "low energy");
    }
}
