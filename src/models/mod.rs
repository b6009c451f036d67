pub mod analysis;
pub mod field;
pub mod geo;
pub mod selection;
pub mod serde_helpers;
pub mod session;
pub mod trend;

pub use analysis::{
    AnalysisResult, HealthStatus, ImageMetadata, IndexStats, IndexValue, StressInfo, TokenResponse,
};
pub use field::{Field, Geometry};
pub use geo::{ring_contains, Bounds, LonLat};
pub use selection::{DateRange, Provider, Selection, VegetationIndex, DATE_FORMAT};
pub use session::CredentialLocal;
pub use trend::{TrendPoint, TrendSeries};
