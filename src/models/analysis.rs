use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::selection::VegetationIndex;
use super::serde_helpers::deserialize_loose_string;

// ===== HEALTH STATUS =====

/// Ordinal health classification. Declaration order is the ordering:
/// `Unknown` ranks lowest (least confidence), `Excellent` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Critical,
    Poor,
    Average,
    Good,
    Excellent,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Critical => "critical",
            HealthStatus::Poor => "poor",
            HealthStatus::Average => "average",
            HealthStatus::Good => "good",
            HealthStatus::Excellent => "excellent",
        }
    }

    pub fn badge(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl From<&str> for HealthStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "excellent" => HealthStatus::Excellent,
            "good" => HealthStatus::Good,
            "average" => HealthStatus::Average,
            "poor" => HealthStatus::Poor,
            "critical" => HealthStatus::Critical,
            _ => HealthStatus::Unknown,
        }
    }
}

// Case-insensitive; anything unrecognised is `Unknown`
impl<'de> Deserialize<'de> for HealthStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(HealthStatus::from(raw.as_str()))
    }
}

// ===== INDEX VALUES =====

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub mean: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A per-index value: either summary statistics or a single scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
    Stats(IndexStats),
    Scalar(f64),
}

impl IndexValue {
    pub fn mean(&self) -> f64 {
        match self {
            IndexValue::Stats(stats) => stats.mean,
            IndexValue::Scalar(v) => *v,
        }
    }
}

// ===== STRESS & METADATA =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StressInfo {
    #[serde(default)]
    pub stress_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_type: Option<String>,
    /// Share of the field under stress, in percent, clamped to [0, 100].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ImageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Ground resolution in metres, kept as text since backends send both forms.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_loose_string"
    )]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct AnalysisMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<ImageMetadata>,
}

// ===== ANALYSIS RESULT =====

/// Wire shape of `GET /api/fields/{id}/analyze`. Per-index stats may appear at the
/// top level (`"ndvi": {...}`) and/or as entries of `indices`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AnalysisPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    health_status: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    indices: BTreeMap<String, Option<IndexValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ndvi: Option<IndexValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    evi: Option<IndexValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ndwi: Option<IndexValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    moisture: Option<IndexValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    moisture_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stress: Option<StressInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recommendations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<AnalysisMetadata>,
}

/// Normalised analysis for one field/provider/date-range request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "AnalysisPayload", into = "AnalysisPayload")]
pub struct AnalysisResult {
    pub health_status: HealthStatus,
    pub index_values: BTreeMap<VegetationIndex, IndexValue>,
    pub moisture_status: Option<String>,
    pub stress: StressInfo,
    pub recommendations: Vec<String>,
    pub image: ImageMetadata,
}

impl AnalysisResult {
    pub fn index_value(&self, index: VegetationIndex) -> Option<&IndexValue> {
        self.index_values.get(&index)
    }
}

impl From<AnalysisPayload> for AnalysisResult {
    fn from(payload: AnalysisPayload) -> Self {
        let mut index_values = BTreeMap::new();

        for (name, value) in payload.indices {
            if let (Ok(index), Some(value)) = (name.parse::<VegetationIndex>(), value) {
                if value.mean().is_finite() {
                    index_values.insert(index, value);
                }
            }
        }

        // Top-level entries carry full stats and win over the `indices` summary
        let top_level = [
            (VegetationIndex::Ndvi, payload.ndvi),
            (VegetationIndex::Evi, payload.evi),
            (VegetationIndex::Ndwi, payload.ndwi),
            (VegetationIndex::Moisture, payload.moisture),
        ];
        for (index, value) in top_level {
            if let Some(value) = value.filter(|v| v.mean().is_finite()) {
                index_values.insert(index, value);
            }
        }

        let mut stress = payload.stress.unwrap_or_default();
        stress.stress_percentage = stress
            .stress_percentage
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0));

        let recommendations = payload
            .recommendations
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        Self {
            health_status: payload.health_status.unwrap_or_default(),
            index_values,
            moisture_status: payload.moisture_status,
            stress,
            recommendations,
            image: payload.metadata.and_then(|m| m.image).unwrap_or_default(),
        }
    }
}

impl From<AnalysisResult> for AnalysisPayload {
    fn from(result: AnalysisResult) -> Self {
        let image = if result.image == ImageMetadata::default() {
            None
        } else {
            Some(result.image)
        };
        Self {
            health_status: Some(result.health_status),
            indices: result
                .index_values
                .into_iter()
                .map(|(index, value)| (index.as_str().to_string(), Some(value)))
                .collect(),
            moisture_status: result.moisture_status,
            stress: Some(result.stress),
            recommendations: Some(result.recommendations),
            metadata: image.map(|image| AnalysisMetadata { image: Some(image) }),
            ..Default::default()
        }
    }
}

// ===== AUTH =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_ordering() {
        assert!(HealthStatus::Excellent > HealthStatus::Good);
        assert!(HealthStatus::Good > HealthStatus::Average);
        assert!(HealthStatus::Poor > HealthStatus::Critical);
        assert!(HealthStatus::Critical > HealthStatus::Unknown);
        let parsed: HealthStatus = serde_json::from_str("\"thriving\"").unwrap();
        assert_eq!(parsed, HealthStatus::Unknown);
    }

    #[test]
    fn test_health_status_reads_any_case() {
        let upper: HealthStatus = serde_json::from_str("\"GOOD\"").unwrap();
        assert_eq!(upper, HealthStatus::Good);
        let padded: HealthStatus = serde_json::from_str("\" Critical \"").unwrap();
        assert_eq!(padded, HealthStatus::Critical);
        assert_eq!(serde_json::to_string(&HealthStatus::Excellent).unwrap(), "\"excellent\"");

        let result: AnalysisResult = serde_json::from_str(r#"{"health_status": "Poor"}"#).unwrap();
        assert_eq!(result.health_status, HealthStatus::Poor);
    }

    #[test]
    fn test_minimal_payload() {
        let result: AnalysisResult =
            serde_json::from_str(r#"{"health_status": "good", "indices": {"ndvi": 0.62}}"#).unwrap();
        assert_eq!(result.health_status, HealthStatus::Good);
        assert_eq!(result.index_value(VegetationIndex::Ndvi), Some(&IndexValue::Scalar(0.62)));
        assert!(result.index_value(VegetationIndex::Evi).is_none());
        assert!(!result.stress.stress_detected);
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_top_level_stats_take_precedence() {
        let json = r#"{
            "health_status": "average",
            "indices": {"ndvi": 0.5, "evi": null, "savi": 0.3},
            "ndvi": {"mean": 0.55, "min": 0.2, "max": 0.8},
            "moisture": {"mean": 0.31, "min": 0.1, "max": 0.4},
            "moisture_status": "Adequate",
            "stress": {"stress_detected": true, "stress_type": "water", "stress_percentage": 140.0},
            "recommendations": ["Irrigate the eastern half", "  "],
            "metadata": {"image": {"provider": "liss_iv", "resolution": 5.8, "acquisition_date": "2024-03-02"}}
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        match result.index_value(VegetationIndex::Ndvi) {
            Some(IndexValue::Stats(stats)) => {
                assert_eq!(stats.mean, 0.55);
                assert_eq!(stats.max, Some(0.8));
            }
            other => panic!("expected stats, got {:?}", other),
        }
        assert_eq!(result.index_values.len(), 2);
        assert_eq!(result.stress.stress_percentage, Some(100.0));
        assert_eq!(result.recommendations, vec!["Irrigate the eastern half".to_string()]);
        assert_eq!(result.image.resolution.as_deref(), Some("5.8"));
        assert_eq!(result.moisture_status.as_deref(), Some("Adequate"));
    }

    #[test]
    fn test_serialized_form_reads_back() {
        let result: AnalysisResult = serde_json::from_str(
            r#"{"health_status": "poor", "ndwi": {"mean": 0.1}, "recommendations": ["Scout for pests"]}"#,
        )
        .unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
