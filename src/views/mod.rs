//! Presentation state fed from the event bus. Each view is a pure projection of
//! the events it has seen; the terminal layer in `ui` only renders them.

pub mod fields;
pub mod map;
pub mod metrics;
pub mod trend;

pub use fields::{display_fields, field_details, FieldListPanel, FieldListing, FieldRow};
pub use map::{imagery_placeholder, MapView, Overlay, RedrawReport, Viewport};
pub use metrics::{badge_color, project_metrics, MetricsPanel, MetricsSummary, MetricsView};
pub use trend::{project_trend, TrendChart, TrendProjection, TrendView};

use crate::bus::MonitorEvent;

/// A subscriber to monitor events.
pub trait MonitorView {
    fn on_event(&mut self, event: &MonitorEvent);
}
