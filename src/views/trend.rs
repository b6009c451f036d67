use std::sync::Arc;

use super::MonitorView;
use crate::bus::MonitorEvent;
use crate::controller::RequestToken;
use crate::models::TrendSeries;

pub const NO_TREND_DATA: &str = "No trend data available";

/// Chart-ready series. NDVI sits on a fixed [0, 1] axis; precipitation is
/// divided by its own maximum so both share the plot, and the real scale is
/// reported through `precipitation_max` for the right-hand label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrendProjection {
    pub ndvi: Vec<(f64, f64)>,
    pub precipitation: Vec<(f64, f64)>,
    pub precipitation_max: f64,
    pub x_max: f64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

impl TrendProjection {
    pub fn is_empty(&self) -> bool {
        self.ndvi.is_empty() && self.precipitation.is_empty()
    }

    pub const NDVI_BOUNDS: [f64; 2] = [0.0, 1.0];
}

pub fn project_trend(series: &TrendSeries) -> TrendProjection {
    let mut ndvi = Vec::new();
    let mut raw_precipitation = Vec::new();

    for (i, point) in series.points().enumerate() {
        let x = i as f64;
        if let Some(v) = point.ndvi {
            ndvi.push((x, v.clamp(0.0, 1.0)));
        }
        if let Some(p) = point.precipitation {
            raw_precipitation.push((x, p.max(0.0)));
        }
    }

    let precipitation_max = raw_precipitation.iter().map(|(_, p)| *p).fold(0.0, f64::max);
    let precipitation = if precipitation_max > 0.0 {
        raw_precipitation
            .into_iter()
            .map(|(x, p)| (x, p / precipitation_max))
            .collect()
    } else {
        raw_precipitation
    };

    TrendProjection {
        ndvi,
        precipitation,
        precipitation_max,
        x_max: series.len().saturating_sub(1).max(1) as f64,
        first_date: series.dates().first().cloned(),
        last_date: series.dates().last().cloned(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrendView {
    Idle,
    Loading,
    Failed(String),
    Empty,
    Ready(TrendProjection),
}

#[derive(Debug, Clone, Default, PartialEq)]
enum ChartStatus {
    #[default]
    Idle,
    Loading(RequestToken),
    Ready(Arc<TrendSeries>),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct TrendChart {
    status: ChartStatus,
}

impl TrendChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> TrendView {
        match &self.status {
            ChartStatus::Idle => TrendView::Idle,
            ChartStatus::Loading(_) => TrendView::Loading,
            ChartStatus::Failed(message) => TrendView::Failed(message.clone()),
            ChartStatus::Ready(series) => {
                let projection = project_trend(series);
                if projection.is_empty() {
                    TrendView::Empty
                } else {
                    TrendView::Ready(projection)
                }
            }
        }
    }

    fn awaiting(&self, token: RequestToken) -> bool {
        self.status == ChartStatus::Loading(token)
    }
}

impl MonitorView for TrendChart {
    fn on_event(&mut self, event: &MonitorEvent) {
        match event {
            MonitorEvent::AnalysisRequested { token, .. } => self.status = ChartStatus::Loading(*token),
            MonitorEvent::TrendSettled { token, series } if self.awaiting(*token) => {
                self.status = ChartStatus::Ready(Arc::clone(series));
            }
            MonitorEvent::TrendFailed { token, message } if self.awaiting(*token) => {
                self.status = ChartStatus::Failed(message.clone());
            }
            MonitorEvent::SelectionCleared | MonitorEvent::SignedOut => self.status = ChartStatus::Idle,
            _ => {}
        }
    }
}
