use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::field::Field;
use crate::error::{MonitorError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ===== PROVIDER =====

/// Satellite imagery source used to filter analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "liss_iv")]
    LissIv,
    #[serde(rename = "hr_data")]
    HrData,
    #[serde(rename = "eos_04")]
    Eos04,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::LissIv, Provider::HrData, Provider::Eos04];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::LissIv => "liss_iv",
            Provider::HrData => "hr_data",
            Provider::Eos04 => "eos_04",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Provider::LissIv => "LISS IV",
            Provider::HrData => "HR Data",
            Provider::Eos04 => "EOS-04",
        }
    }

    /// Cycles none -> liss_iv -> hr_data -> eos_04 -> none.
    pub fn cycle(current: Option<Provider>) -> Option<Provider> {
        match current {
            None => Some(Provider::LissIv),
            Some(Provider::LissIv) => Some(Provider::HrData),
            Some(Provider::HrData) => Some(Provider::Eos04),
            Some(Provider::Eos04) => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "liss_iv" => Ok(Provider::LissIv),
            "hr_data" => Ok(Provider::HrData),
            "eos_04" => Ok(Provider::Eos04),
            other => Err(MonitorError::InvalidArgument(format!(
                "unknown provider '{}' (expected liss_iv, hr_data or eos_04)",
                other
            ))),
        }
    }
}

// ===== VEGETATION INDEX =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VegetationIndex {
    #[default]
    Ndvi,
    Evi,
    Ndwi,
    Moisture,
}

impl VegetationIndex {
    pub const ALL: [VegetationIndex; 4] = [
        VegetationIndex::Ndvi,
        VegetationIndex::Evi,
        VegetationIndex::Ndwi,
        VegetationIndex::Moisture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VegetationIndex::Ndvi => "ndvi",
            VegetationIndex::Evi => "evi",
            VegetationIndex::Ndwi => "ndwi",
            VegetationIndex::Moisture => "moisture",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VegetationIndex::Ndvi => "NDVI",
            VegetationIndex::Evi => "EVI",
            VegetationIndex::Ndwi => "NDWI",
            VegetationIndex::Moisture => "Moisture",
        }
    }

    pub fn next(&self) -> VegetationIndex {
        match self {
            VegetationIndex::Ndvi => VegetationIndex::Evi,
            VegetationIndex::Evi => VegetationIndex::Ndwi,
            VegetationIndex::Ndwi => VegetationIndex::Moisture,
            VegetationIndex::Moisture => VegetationIndex::Ndvi,
        }
    }
}

impl fmt::Display for VegetationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for VegetationIndex {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ndvi" => Ok(VegetationIndex::Ndvi),
            "evi" => Ok(VegetationIndex::Evi),
            "ndwi" => Ok(VegetationIndex::Ndwi),
            "moisture" => Ok(VegetationIndex::Moisture),
            other => Err(MonitorError::InvalidArgument(format!("unknown index '{}'", other))),
        }
    }
}

// ===== DATE RANGE =====

/// Inclusive date window; either end may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(MonitorError::InvalidArgument(format!(
                    "start date {} is after end date {}",
                    s, e
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// The `days`-day window ending on `today`.
    pub fn last_days(days: i64, today: NaiveDate) -> Self {
        Self {
            start: Some(today - Duration::days(days.max(0))),
            end: Some(today),
        }
    }

    /// Parses optional `YYYY-MM-DD` strings, as typed on a command line.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let parse_one = |raw: Option<&str>| -> Result<Option<NaiveDate>> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT).map(Some).map_err(|e| {
                    MonitorError::InvalidArgument(format!("invalid date '{}': {}", s, e))
                }),
                None => Ok(None),
            }
        };
        Self::new(parse_one(start)?, parse_one(end)?)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Query parameters for the analyze/trend endpoints; absent ends are omitted.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(start) = self.start {
            params.push(("start_date", start.format(DATE_FORMAT).to_string()));
        }
        if let Some(end) = self.end {
            params.push(("end_date", end.format(DATE_FORMAT).to_string()));
        }
        params
    }

    pub fn label(&self) -> String {
        match (self.start, self.end) {
            (None, None) => "All dates".to_string(),
            (Some(s), None) => format!("From {}", s.format(DATE_FORMAT)),
            (None, Some(e)) => format!("Until {}", e.format(DATE_FORMAT)),
            (Some(s), Some(e)) => format!("{} to {}", s.format(DATE_FORMAT), e.format(DATE_FORMAT)),
        }
    }
}

// ===== SELECTION =====

/// The single live combination of field, provider, index and date range.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub field: Option<Field>,
    pub provider: Option<Provider>,
    pub index: VegetationIndex,
    pub date_range: DateRange,
}

impl Selection {
    pub fn field_id(&self) -> Option<&str> {
        self.field.as_ref().map(|f| f.field_id.as_str())
    }
}
