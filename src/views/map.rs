//! Field boundaries drawn over a single long-lived base map.

use ratatui::{
    layout::Rect,
    style::{Color, Style, Stylize},
    text::Line,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points},
        Block, Borders,
    },
    Frame,
};
use tracing::debug;

use super::MonitorView;
use crate::bus::MonitorEvent;
use crate::models::{ring_contains, Bounds, Field, LonLat, Provider, VegetationIndex};

pub const DEFAULT_CENTER: LonLat = LonLat {
    lon: 78.9629,
    lat: 20.5937,
};
pub const DEFAULT_ZOOM: u8 = 5;
pub const FOCUS_ZOOM: u8 = 13;

const FIT_PADDING: f64 = 0.1;

/// Visible geographic window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bounds: Bounds,
}

impl Viewport {
    /// Web-map style zoom: each level halves the visible span.
    pub fn at(center: LonLat, zoom: u8) -> Self {
        let scale = 2f64.powi(i32::from(zoom));
        Self {
            bounds: Bounds::around(center, 360.0 / scale, 180.0 / scale),
        }
    }

    pub fn fit(bounds: Bounds) -> Self {
        Self {
            bounds: bounds.padded(FIT_PADDING),
        }
    }

    pub fn center(&self) -> LonLat {
        self.bounds.center()
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::at(DEFAULT_CENTER, DEFAULT_ZOOM)
    }
}

/// One drawn field boundary
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub field_id: String,
    pub ring: Vec<LonLat>,
    pub bounds: Bounds,
    pub label: String,
}

impl Overlay {
    fn for_field(field: &Field) -> Option<Self> {
        let ring = field.boundary()?;
        let bounds = Bounds::from_points(&ring)?;
        Some(Self {
            field_id: field.field_id.clone(),
            label: popup_label(field),
            ring,
            bounds,
        })
    }

    pub fn contains(&self, p: LonLat) -> bool {
        self.bounds.contains(p) && ring_contains(&self.ring, p)
    }
}

fn popup_label(field: &Field) -> String {
    format!("{} | {} | {}", field.display_name(), field.area_label(), field.crop_label())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedrawReport {
    pub removed: usize,
    pub drawn: usize,
    /// Fields with no usable geometry
    pub skipped: Vec<String>,
}

pub fn imagery_placeholder(index: VegetationIndex, provider: Option<Provider>) -> String {
    let provider = provider.map(|p| p.label()).unwrap_or("All providers");
    format!("{} index visualization unavailable ({})", index.label(), provider)
}

#[derive(Debug)]
struct BaseMap {
    viewport: Viewport,
    overlays: Vec<Overlay>,
}

/// Owns the one base map for the life of the dashboard. Redraws clear every
/// overlay and draw them again from the latest field list.
#[derive(Debug)]
pub struct MapView {
    base: BaseMap,
    selected: Option<String>,
    provider: Option<Provider>,
    index: VegetationIndex,
}

impl Default for MapView {
    fn default() -> Self {
        Self::new()
    }
}

impl MapView {
    pub fn new() -> Self {
        Self {
            base: BaseMap {
                viewport: Viewport::default(),
                overlays: Vec::new(),
            },
            selected: None,
            provider: None,
            index: VegetationIndex::default(),
        }
    }

    pub fn redraw(&mut self, fields: &[Field]) -> RedrawReport {
        let removed = self.base.overlays.len();
        self.base.overlays.clear();

        let mut skipped = Vec::new();
        for field in fields {
            match Overlay::for_field(field) {
                Some(overlay) => self.base.overlays.push(overlay),
                None => skipped.push(field.field_id.clone()),
            }
        }
        if !skipped.is_empty() {
            debug!("Skipped {} fields without geometry", skipped.len());
        }

        self.fit_all();
        RedrawReport {
            removed,
            drawn: self.base.overlays.len(),
            skipped,
        }
    }

    /// Fits the viewport to every drawn boundary; no-op when nothing is drawn.
    pub fn fit_all(&mut self) -> bool {
        let union = self
            .base
            .overlays
            .iter()
            .map(|o| o.bounds)
            .reduce(|a, b| a.union(&b));
        match union {
            Some(bounds) => {
                self.base.viewport = Viewport::fit(bounds);
                true
            }
            None => false,
        }
    }

    /// Centres on a field: its boundary if drawable, else its representative point.
    pub fn focus(&mut self, field: &Field) -> bool {
        if let Some(bounds) = field.geometry.as_ref().and_then(|g| g.bounds()) {
            self.base.viewport = Viewport::fit(bounds);
            return true;
        }
        if let Some(point) = field.representative_point() {
            self.base.viewport = Viewport::at(point, FOCUS_ZOOM);
            return true;
        }
        false
    }

    pub fn field_at(&self, p: LonLat) -> Option<&str> {
        // Last drawn is on top
        self.base
            .overlays
            .iter()
            .rev()
            .find(|o| o.contains(p))
            .map(|o| o.field_id.as_str())
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.base.overlays
    }

    pub fn viewport(&self) -> &Viewport {
        &self.base.viewport
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn placeholder(&self) -> String {
        imagery_placeholder(self.index, self.provider)
    }

    /// Maps a terminal cell inside the map block to a geographic position.
    pub fn cell_to_lonlat(&self, area: Rect, column: u16, row: u16) -> Option<LonLat> {
        let inner = Block::default().borders(Borders::ALL).inner(area);
        if inner.width == 0
            || inner.height == 0
            || column < inner.x
            || row < inner.y
            || column >= inner.x + inner.width
            || row >= inner.y + inner.height
        {
            return None;
        }
        let b = &self.base.viewport.bounds;
        let fx = (f64::from(column - inner.x) + 0.5) / f64::from(inner.width);
        let fy = (f64::from(row - inner.y) + 0.5) / f64::from(inner.height);
        Some(LonLat::new(
            b.min_lon + fx * (b.max_lon - b.min_lon),
            b.max_lat - fy * (b.max_lat - b.min_lat),
        ))
    }

    /// Resolves a click on the terminal cell (`column`, `row`) of a map drawn in
    /// `area` to the field whose boundary is under it.
    pub fn field_at_cell(&self, area: Rect, column: u16, row: u16) -> Option<&str> {
        self.cell_to_lonlat(area, column, row)
            .and_then(|p| self.field_at(p))
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let b = self.base.viewport.bounds;
        let center = b.center();
        let title = format!(" Map ({:.4}, {:.4}) ", center.lat, center.lon);

        let canvas = Canvas::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_bottom(Line::from(format!(" {} ", self.placeholder())).dark_gray()),
            )
            .x_bounds([b.min_lon, b.max_lon])
            .y_bounds([b.min_lat, b.max_lat])
            .paint(|ctx| {
                for overlay in &self.base.overlays {
                    let selected = self.selected.as_deref() == Some(overlay.field_id.as_str());
                    let color = if selected { Color::Yellow } else { Color::Green };
                    for pair in overlay.ring.windows(2) {
                        ctx.draw(&CanvasLine::new(pair[0].lon, pair[0].lat, pair[1].lon, pair[1].lat, color));
                    }
                    // Close rings that do not repeat their first vertex
                    if let (Some(first), Some(last)) = (overlay.ring.first(), overlay.ring.last()) {
                        if first != last {
                            ctx.draw(&CanvasLine::new(last.lon, last.lat, first.lon, first.lat, color));
                        }
                    }
                }
                ctx.layer();
                for overlay in &self.base.overlays {
                    let c = overlay.bounds.center();
                    let style = if self.selected.as_deref() == Some(overlay.field_id.as_str()) {
                        Style::default().fg(Color::Yellow).bold()
                    } else {
                        Style::default().fg(Color::White)
                    };
                    ctx.print(c.lon, c.lat, Line::styled(overlay.label.clone(), style));
                }
                if self.base.overlays.is_empty() {
                    ctx.draw(&Points {
                        coords: &[(center.lon, center.lat)],
                        color: Color::DarkGray,
                    });
                }
            });

        f.render_widget(canvas, area);
    }
}

impl MonitorView for MapView {
    fn on_event(&mut self, event: &MonitorEvent) {
        match event {
            MonitorEvent::FieldsLoaded(fields) => {
                let report = self.redraw(fields);
                debug!(
                    "Map redraw: removed {}, drew {}, skipped {}",
                    report.removed,
                    report.drawn,
                    report.skipped.len()
                );
                let selected = self
                    .selected
                    .as_ref()
                    .and_then(|id| fields.iter().find(|f| &f.field_id == id));
                if let Some(field) = selected {
                    self.focus(field);
                }
            }
            MonitorEvent::FieldSelected(field) => {
                self.selected = Some(field.field_id.clone());
                self.focus(field);
            }
            MonitorEvent::SelectionCleared => {
                self.selected = None;
                self.fit_all();
            }
            MonitorEvent::ProviderChanged(provider) => self.provider = *provider,
            MonitorEvent::IndexChanged(index) => self.index = *index,
            MonitorEvent::SignedOut => {
                self.base.overlays.clear();
                self.base.viewport = Viewport::default();
                self.selected = None;
                self.provider = None;
                self.index = VegetationIndex::default();
            }
            _ => {}
        }
    }
}
