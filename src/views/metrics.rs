use std::sync::Arc;

use ratatui::style::Color;

use super::MonitorView;
use crate::bus::MonitorEvent;
use crate::controller::RequestToken;
use crate::models::{AnalysisResult, HealthStatus, IndexValue, StressInfo, VegetationIndex};

pub const NO_RECOMMENDATIONS: &str = "No recommendations available";
pub const NO_STRESS: &str = "No significant stress detected";
pub const UNAVAILABLE: &str = "unavailable";

pub fn badge_color(status: HealthStatus) -> Color {
    match status {
        HealthStatus::Excellent => Color::Green,
        HealthStatus::Good => Color::Blue,
        HealthStatus::Average => Color::Cyan,
        HealthStatus::Poor => Color::Yellow,
        HealthStatus::Critical => Color::Red,
        HealthStatus::Unknown => Color::Gray,
    }
}

/// Everything the metrics panel shows for a settled analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub health: HealthStatus,
    pub badge: String,
    pub index_label: &'static str,
    pub index_value: String,
    pub moisture_status: Option<String>,
    pub stress_detected: bool,
    pub stress: String,
    pub recommendations: Vec<String>,
    pub has_recommendations: bool,
    pub image_provider: String,
    pub image_resolution: String,
    pub image_date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricsView {
    Idle,
    Loading,
    Failed(String),
    Ready(MetricsSummary),
}

fn format_index_value(value: Option<&IndexValue>) -> String {
    match value {
        None => UNAVAILABLE.to_string(),
        Some(IndexValue::Scalar(v)) => format!("{:.2}", v),
        Some(IndexValue::Stats(stats)) => match (stats.min, stats.max) {
            (Some(min), Some(max)) => format!("{:.2} (min {:.2}, max {:.2})", stats.mean, min, max),
            (Some(min), None) => format!("{:.2} (min {:.2})", stats.mean, min),
            (None, Some(max)) => format!("{:.2} (max {:.2})", stats.mean, max),
            (None, None) => format!("{:.2}", stats.mean),
        },
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_stress(stress: &StressInfo) -> String {
    if !stress.stress_detected {
        return NO_STRESS.to_string();
    }
    let kind = match stress.stress_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => format!("{} stress", capitalize(t)),
        None => "Stress".to_string(),
    };
    match stress.stress_percentage {
        Some(pct) => format!("{} — {:.1}% of field", kind, pct),
        None => format!("{} detected", kind),
    }
}

pub fn project_metrics(result: &AnalysisResult, index: VegetationIndex) -> MetricsSummary {
    let unknown = || "Unknown".to_string();
    let has_recommendations = !result.recommendations.is_empty();
    let recommendations = if has_recommendations {
        result.recommendations.clone()
    } else {
        vec![NO_RECOMMENDATIONS.to_string()]
    };

    MetricsSummary {
        health: result.health_status,
        badge: result.health_status.badge(),
        index_label: index.label(),
        index_value: format_index_value(result.index_value(index)),
        moisture_status: if index == VegetationIndex::Moisture {
            result.moisture_status.clone()
        } else {
            None
        },
        stress_detected: result.stress.stress_detected,
        stress: format_stress(&result.stress),
        recommendations,
        has_recommendations,
        image_provider: result.image.provider.clone().unwrap_or_else(unknown),
        image_resolution: result
            .image
            .resolution
            .as_ref()
            .map(|r| format!("{}m", r))
            .unwrap_or_else(unknown),
        image_date: result.image.acquisition_date.clone().unwrap_or_else(unknown),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
enum PanelStatus {
    #[default]
    Idle,
    Loading(RequestToken),
    Ready(Arc<AnalysisResult>),
    Failed(String),
}

/// Tracks the latest analysis outcome and the active index.
#[derive(Debug, Default)]
pub struct MetricsPanel {
    status: PanelStatus,
    index: VegetationIndex,
}

impl MetricsPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> VegetationIndex {
        self.index
    }

    pub fn view(&self) -> MetricsView {
        match &self.status {
            PanelStatus::Idle => MetricsView::Idle,
            PanelStatus::Loading(_) => MetricsView::Loading,
            PanelStatus::Failed(message) => MetricsView::Failed(message.clone()),
            PanelStatus::Ready(result) => MetricsView::Ready(project_metrics(result, self.index)),
        }
    }

    fn awaiting(&self, token: RequestToken) -> bool {
        self.status == PanelStatus::Loading(token)
    }
}

impl MonitorView for MetricsPanel {
    fn on_event(&mut self, event: &MonitorEvent) {
        match event {
            MonitorEvent::AnalysisRequested { token, .. } => self.status = PanelStatus::Loading(*token),
            MonitorEvent::AnalysisSettled { token, result } if self.awaiting(*token) => {
                self.status = PanelStatus::Ready(Arc::clone(result));
            }
            MonitorEvent::AnalysisFailed { token, message } if self.awaiting(*token) => {
                self.status = PanelStatus::Failed(message.clone());
            }
            MonitorEvent::IndexChanged(index) => self.index = *index,
            MonitorEvent::SelectionCleared => self.status = PanelStatus::Idle,
            MonitorEvent::SignedOut => *self = Self::default(),
            _ => {}
        }
    }
}
