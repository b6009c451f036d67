use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Wire shape of `GET /api/fields/{id}/trend`: three parallel sequences.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct TrendPayload {
    #[serde(default)]
    dates: Vec<String>,
    #[serde(default)]
    ndvi: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
}

/// Time series aligned by position. Construction guarantees
/// `dates.len() == ndvi.len() == precipitation.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(try_from = "TrendPayload", into = "TrendPayload")]
pub struct TrendSeries {
    dates: Vec<String>,
    ndvi: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint<'a> {
    pub date: &'a str,
    pub ndvi: Option<f64>,
    pub precipitation: Option<f64>,
}

impl TrendSeries {
    pub fn new(
        dates: Vec<String>,
        ndvi: Vec<Option<f64>>,
        precipitation: Vec<Option<f64>>,
    ) -> Result<Self, MonitorError> {
        if dates.len() != ndvi.len() || dates.len() != precipitation.len() {
            return Err(MonitorError::Fetch(format!(
                "malformed trend series: {} dates, {} ndvi values, {} precipitation values",
                dates.len(),
                ndvi.len(),
                precipitation.len()
            )));
        }
        // Non-finite samples are gaps, not data
        let clean = |values: Vec<Option<f64>>| -> Vec<Option<f64>> {
            values.into_iter().map(|v| v.filter(|x| x.is_finite())).collect()
        };
        Ok(Self {
            dates,
            ndvi: clean(ndvi),
            precipitation: clean(precipitation),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn ndvi(&self) -> &[Option<f64>] {
        &self.ndvi
    }

    pub fn precipitation(&self) -> &[Option<f64>] {
        &self.precipitation
    }

    pub fn points(&self) -> impl Iterator<Item = TrendPoint<'_>> {
        self.dates
            .iter()
            .zip(self.ndvi.iter())
            .zip(self.precipitation.iter())
            .map(|((date, ndvi), precipitation)| TrendPoint {
                date: date.as_str(),
                ndvi: *ndvi,
                precipitation: *precipitation,
            })
    }
}

impl TryFrom<TrendPayload> for TrendSeries {
    type Error = MonitorError;

    fn try_from(payload: TrendPayload) -> Result<Self, Self::Error> {
        TrendSeries::new(payload.dates, payload.ndvi, payload.precipitation)
    }
}

impl From<TrendSeries> for TrendPayload {
    fn from(series: TrendSeries) -> Self {
        Self {
            dates: series.dates,
            ndvi: series.ndvi,
            precipitation: series.precipitation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_from_backend_json() {
        let json = r#"{
            "dates": ["2024-01-01", "2024-01-15", "2024-02-01"],
            "ndvi": [0.41, null, 0.58],
            "precipitation": [12.0, 0.0, 3.5]
        }"#;
        let series: TrendSeries = serde_json::from_str(json).unwrap();
        assert_eq!(series.len(), 3);
        let points: Vec<TrendPoint> = series.points().collect();
        assert_eq!(points[1].date, "2024-01-15");
        assert_eq!(points[1].ndvi, None);
        assert_eq!(points[2].precipitation, Some(3.5));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let json = r#"{"dates": ["2024-01-01"], "ndvi": [0.4, 0.5], "precipitation": [1.0]}"#;
        let err = serde_json::from_str::<TrendSeries>(json).unwrap_err();
        assert!(err.to_string().contains("malformed trend series"));
    }

    #[test]
    fn test_empty_payload_is_empty_series() {
        let series: TrendSeries = serde_json::from_str("{}").unwrap();
        assert!(series.is_empty());
        assert_eq!(series, TrendSeries::empty());
    }
}
