use serde::{Deserialize, Serialize};

use super::geo::{Bounds, LonLat};
use super::serde_helpers::{deserialize_id, deserialize_lenient};

// ===== GEOMETRY =====

/// GeoJSON-style polygon: `coordinates` is a list of rings, each an ordered list of
/// `[lon, lat]` (or `[lon, lat, alt]`) positions. Only the exterior ring is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default = "default_geometry_type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Vec<Vec<Vec<f64>>>,
}

fn default_geometry_type() -> String {
    "Polygon".to_string()
}

impl Geometry {
    pub fn polygon(ring: &[LonLat]) -> Self {
        Self {
            kind: default_geometry_type(),
            coordinates: vec![ring.iter().map(|p| vec![p.lon, p.lat]).collect()],
        }
    }

    /// Exterior ring as positions. Malformed positions are dropped; fewer than three
    /// usable positions means there is no drawable boundary.
    pub fn exterior_ring(&self) -> Option<Vec<LonLat>> {
        let ring: Vec<LonLat> = self
            .coordinates
            .first()?
            .iter()
            .filter(|pos| pos.len() >= 2)
            .map(|pos| LonLat::new(pos[0], pos[1]))
            .filter(LonLat::is_finite)
            .collect();
        if ring.len() < 3 {
            return None;
        }
        Some(ring)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.exterior_ring().and_then(|ring| Bounds::from_points(&ring))
    }
}

// ===== FIELD =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(deserialize_with = "deserialize_id")]
    pub field_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_hectares: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_stage: Option<String>,
    /// Anything other than a plain polygon decodes as no geometry.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_lenient"
    )]
    pub geometry: Option<Geometry>,
    /// Representative `[lat, lon]` point, as the map widget expects it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_lenient"
    )]
    pub coordinates: Option<[f64; 2]>,
}

impl Field {
    pub fn new(field_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            name: name.into(),
            area_hectares: None,
            crop_type: None,
            soil_type: None,
            growth_stage: None,
            geometry: None,
            coordinates: None,
        }
    }

    pub fn with_area(mut self, hectares: f64) -> Self {
        self.area_hectares = Some(hectares);
        self
    }

    pub fn with_crop(mut self, crop: impl Into<String>) -> Self {
        self.crop_type = Some(crop.into());
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.coordinates = Some([lat, lon]);
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unnamed Field"
        } else {
            &self.name
        }
    }

    pub fn boundary(&self) -> Option<Vec<LonLat>> {
        self.geometry.as_ref().and_then(Geometry::exterior_ring)
    }

    pub fn representative_point(&self) -> Option<LonLat> {
        self.coordinates
            .map(|[lat, lon]| LonLat::new(lon, lat))
            .filter(LonLat::is_finite)
    }

    pub fn area_label(&self) -> String {
        match self.area_hectares {
            Some(area) => format!("{:.2} ha", area),
            None => "Unknown".to_string(),
        }
    }

    pub fn crop_label(&self) -> &str {
        self.crop_type.as_deref().unwrap_or("Unknown")
    }

    pub fn soil_label(&self) -> &str {
        self.soil_type.as_deref().unwrap_or("Unknown")
    }

    pub fn growth_stage_label(&self) -> &str {
        self.growth_stage.as_deref().unwrap_or("Unknown")
    }
}
