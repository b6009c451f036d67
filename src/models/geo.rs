use serde::{Deserialize, Serialize};

/// A longitude/latitude position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

/// Axis-aligned geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LonLat>) -> Option<Self> {
        let mut iter = points.into_iter().filter(|p| p.is_finite());
        let first = iter.next()?;
        let mut bounds = Bounds {
            min_lon: first.lon,
            min_lat: first.lat,
            max_lon: first.lon,
            max_lat: first.lat,
        };
        for p in iter {
            bounds.extend(*p);
        }
        Some(bounds)
    }

    /// Square-ish window of `span` degrees of longitude around a centre point.
    pub fn around(center: LonLat, lon_span: f64, lat_span: f64) -> Self {
        Bounds {
            min_lon: center.lon - lon_span / 2.0,
            min_lat: center.lat - lat_span / 2.0,
            max_lon: center.lon + lon_span / 2.0,
            max_lat: center.lat + lat_span / 2.0,
        }
    }

    pub fn extend(&mut self, p: LonLat) {
        self.min_lon = self.min_lon.min(p.lon);
        self.min_lat = self.min_lat.min(p.lat);
        self.max_lon = self.max_lon.max(p.lon);
        self.max_lat = self.max_lat.max(p.lat);
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    pub fn center(&self) -> LonLat {
        LonLat::new(
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    pub fn contains(&self, p: LonLat) -> bool {
        p.lon >= self.min_lon && p.lon <= self.max_lon && p.lat >= self.min_lat && p.lat <= self.max_lat
    }

    /// Grows the box by `ratio` of its size on each side; degenerate boxes get a minimum pad.
    pub fn padded(&self, ratio: f64) -> Bounds {
        const MIN_PAD: f64 = 0.0005;
        let pad_lon = ((self.max_lon - self.min_lon) * ratio).max(MIN_PAD);
        let pad_lat = ((self.max_lat - self.min_lat) * ratio).max(MIN_PAD);
        Bounds {
            min_lon: self.min_lon - pad_lon,
            min_lat: self.min_lat - pad_lat,
            max_lon: self.max_lon + pad_lon,
            max_lat: self.max_lat + pad_lat,
        }
    }
}

/// Ray-casting point-in-polygon test. The ring may or may not repeat its first vertex.
pub fn ring_contains(ring: &[LonLat], p: LonLat) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let x = (b.lon - a.lon) * (p.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if p.lon < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
