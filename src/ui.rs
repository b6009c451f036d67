use crate::bus::{self, MonitorEvent};
use crate::config::MonitorConfig;
use crate::models::{DateRange, Field};
use crate::monitor::FieldMonitor;
use crate::views::trend::NO_TREND_DATA;
use crate::views::{
    badge_color, field_details, FieldListPanel, FieldListing, MapView, MetricsPanel, MetricsView,
    MonitorView, TrendChart, TrendProjection, TrendView,
};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEventKind,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Date range presets cycled with `d`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatePreset {
    #[default]
    AllDates,
    Last30Days,
    Last90Days,
    LastYear,
}

impl DatePreset {
    pub fn next(self) -> Self {
        match self {
            DatePreset::AllDates => DatePreset::Last30Days,
            DatePreset::Last30Days => DatePreset::Last90Days,
            DatePreset::Last90Days => DatePreset::LastYear,
            DatePreset::LastYear => DatePreset::AllDates,
        }
    }

    pub fn range(self, today: chrono::NaiveDate) -> DateRange {
        match self {
            DatePreset::AllDates => DateRange::unbounded(),
            DatePreset::Last30Days => DateRange::last_days(30, today),
            DatePreset::Last90Days => DateRange::last_days(90, today),
            DatePreset::LastYear => DateRange::last_days(365, today),
        }
    }
}

/// Dashboard state: the monitor plus every view subscribed to its events
pub struct Dashboard {
    monitor: FieldMonitor,
    events: broadcast::Receiver<MonitorEvent>,
    config: MonitorConfig,
    field_list: FieldListPanel,
    map: MapView,
    metrics: MetricsPanel,
    trend: TrendChart,
    date_preset: DatePreset,
    status: String,
    map_area: Rect,
    reauth_pending: bool,
    should_quit: bool,
}

impl Dashboard {
    pub fn new(monitor: FieldMonitor, config: MonitorConfig) -> Self {
        let events = monitor.subscribe();
        Self {
            monitor,
            events,
            config,
            field_list: FieldListPanel::new(),
            map: MapView::new(),
            metrics: MetricsPanel::new(),
            trend: TrendChart::new(),
            date_preset: DatePreset::default(),
            status: "Starting...".to_string(),
            map_area: Rect::default(),
            reauth_pending: false,
            should_quit: false,
        }
    }

    /// Fans queued monitor events out to every view.
    fn dispatch_events(&mut self) {
        for event in bus::drain(&mut self.events) {
            self.field_list.on_event(&event);
            self.map.on_event(&event);
            self.metrics.on_event(&event);
            self.trend.on_event(&event);

            match &event {
                MonitorEvent::FieldsLoaded(fields) => {
                    self.status = format!("Loaded {} fields", fields.len());
                }
                MonitorEvent::AnalysisRequested { selection, .. } => {
                    let name = selection.field.as_ref().map(Field::display_name).unwrap_or("field");
                    self.status = format!("Analyzing {}...", name);
                }
                MonitorEvent::AnalysisSettled { .. } => self.status = "Analysis complete".to_string(),
                MonitorEvent::AnalysisFailed { message, .. } => {
                    self.status = format!("Analysis failed: {}", message);
                }
                MonitorEvent::AuthRequired => self.reauth_pending = true,
                MonitorEvent::SignedOut => self.status = "Signed out".to_string(),
                _ => {}
            }
        }
    }

    async fn sign_in_from_config(&mut self) -> bool {
        let Some((username, password)) = self
            .config
            .credentials()
            .map(|(u, p)| (u.to_string(), p.to_string()))
        else {
            self.status = "Sign-in required: set FIELD_MONITOR_USERNAME and FIELD_MONITOR_PASSWORD".to_string();
            return false;
        };
        match self.monitor.sign_in(&username, &password).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Sign-in failed: {}", e);
                self.status = format!("Sign-in failed: {}", e.user_message());
                false
            }
        }
    }

    async fn refresh(&mut self) {
        if let Err(e) = self.monitor.refresh_fields().await {
            self.status = format!("Failed to load fields: {}", e.user_message());
        }
    }

    async fn reauthenticate(&mut self) {
        self.reauth_pending = false;
        info!("Re-authenticating after credential rejection");
        if self.sign_in_from_config().await {
            self.refresh().await;
            if self.monitor.registry().selected().is_some() {
                self.monitor.reevaluate();
            }
        }
    }

    async fn select(&mut self, field_id: String) {
        if let Err(e) = self.monitor.select_field(&field_id).await {
            self.status = if e.is_not_found() {
                "Field no longer exists; list reloaded".to_string()
            } else {
                e.user_message()
            };
        }
    }

    async fn handle_input(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Up => self.field_list.previous(),
                KeyCode::Down => self.field_list.next(),
                KeyCode::Enter => {
                    if let Some(id) = self.field_list.field_under_cursor().map(|f| f.field_id.clone()) {
                        self.select(id).await;
                    }
                }
                KeyCode::Char('p') => {
                    if self.monitor.registry().selected().is_none() {
                        self.status = "Select a field before choosing a provider".to_string();
                    } else {
                        self.monitor.cycle_provider();
                    }
                }
                KeyCode::Char('i') => {
                    let next = self.monitor.filters().index().next();
                    self.monitor.set_index(next);
                }
                KeyCode::Char('d') => {
                    self.date_preset = self.date_preset.next();
                    let range = self.date_preset.range(chrono::Local::now().date_naive());
                    if let Err(e) = self.monitor.set_date_range(range) {
                        self.status = e.user_message();
                    }
                }
                KeyCode::Char('r') => self.refresh().await,
                KeyCode::Char('c') | KeyCode::Backspace => self.monitor.clear_selection(),
                KeyCode::Char('o') => {
                    if let Err(e) = self.monitor.sign_out() {
                        self.status = e.user_message();
                    }
                    self.date_preset = DatePreset::default();
                }
                KeyCode::Char('l') => {
                    if self.sign_in_from_config().await {
                        self.refresh().await;
                    }
                }
                _ => {}
            },
            Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                let hit = self
                    .map
                    .field_at_cell(self.map_area, mouse.column, mouse.row)
                    .map(str::to_string);
                if let Some(id) = hit {
                    debug!("Map click selected field {}", id);
                    self.select(id).await;
                }
            }
            _ => {}
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(12),   // Body
                Constraint::Length(3), // Status/instructions
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(25),
                Constraint::Percentage(40),
                Constraint::Percentage(35),
            ])
            .split(chunks[1]);

        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(7)])
            .split(columns[0]);
        self.render_field_list(f, left[0]);
        self.render_field_details(f, left[1]);

        self.map_area = columns[1];
        self.map.render(f, columns[1]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(columns[2]);
        self.render_metrics(f, right[0]);
        self.render_trend(f, right[1]);

        let footer = Paragraph::new(vec![Line::from(vec![
            Span::styled(self.status.clone(), Style::default().fg(Color::Yellow)),
            Span::raw(" | ↑↓ Enter: Select | p: Provider | i: Index | d: Dates | r: Refresh | c: Clear | l: Sign in | o: Sign out | q: Quit"),
        ])])
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);
        f.render_widget(footer, chunks[2]);
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let filters = self.monitor.filters();
        let provider = filters.provider().map(|p| p.label()).unwrap_or("All providers");
        let auth = if self.monitor.is_signed_in() { "Signed in" } else { "Signed out" };
        let header = Paragraph::new(format!(
            "Field Monitor | {} | Provider: {} | Index: {} | {}",
            auth,
            provider,
            filters.index().label(),
            filters.date_range().label()
        ))
        .style(Style::default().fg(Color::LightBlue).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn render_field_list(&self, f: &mut Frame, area: Rect) {
        let mut title = "Fields".to_string();
        if let Some(status) = self.field_list.status() {
            title = format!("Fields ({})", status);
        }
        let block = Block::default().borders(Borders::ALL).title(title);

        match self.field_list.listing() {
            FieldListing::Empty(message) => {
                let empty = Paragraph::new(message)
                    .style(Style::default().fg(Color::Gray))
                    .block(block)
                    .alignment(Alignment::Center);
                f.render_widget(empty, area);
            }
            FieldListing::Rows(rows) => {
                let selected_id = self.field_list.selected().map(|f| f.field_id.as_str());
                let items: Vec<ListItem> = rows
                    .iter()
                    .map(|row| {
                        let style = if Some(row.field_id.as_str()) == selected_id {
                            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                        } else {
                            Style::default()
                        };
                        ListItem::new(Line::from(Span::styled(row.display_text(), style)))
                    })
                    .collect();
                let list = List::new(items)
                    .block(block)
                    .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));
                let mut state = ListState::default();
                state.select(self.field_list.cursor());
                f.render_stateful_widget(list, area, &mut state);
            }
        }
    }

    fn render_field_details(&self, f: &mut Frame, area: Rect) {
        let lines: Vec<Line> = match self.field_list.selected() {
            Some(field) => field_details(field)
                .into_iter()
                .map(|(label, value)| {
                    Line::from(vec![
                        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
                        Span::raw(value),
                    ])
                })
                .collect(),
            None => vec![Line::from("No field selected".dark_gray())],
        };
        let details = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Details"));
        f.render_widget(details, area);
    }

    fn render_metrics(&self, f: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Health");
        let lines: Vec<Line> = match self.metrics.view() {
            MetricsView::Idle => vec![Line::from("Select a field to view its analysis".dark_gray())],
            MetricsView::Loading => vec![Line::from("Loading analysis...".yellow())],
            MetricsView::Failed(message) => vec![Line::from(Span::styled(
                format!("Analysis unavailable: {}", message),
                Style::default().fg(Color::Red),
            ))],
            MetricsView::Ready(summary) => {
                let mut lines = vec![
                    Line::from(vec![
                        Span::raw("Status: "),
                        Span::styled(
                            format!(" {} ", summary.badge),
                            Style::default()
                                .fg(Color::Black)
                                .bg(badge_color(summary.health))
                                .add_modifier(Modifier::BOLD),
                        ),
                    ]),
                    Line::from(format!("{}: {}", summary.index_label, summary.index_value)),
                ];
                if let Some(moisture) = &summary.moisture_status {
                    lines.push(Line::from(format!("Moisture status: {}", moisture)));
                }
                let stress_color = if summary.stress_detected { Color::Red } else { Color::Green };
                lines.push(Line::from(Span::styled(summary.stress.clone(), Style::default().fg(stress_color))));
                lines.push(Line::from("Recommendations:".bold()));
                for rec in &summary.recommendations {
                    if summary.has_recommendations {
                        lines.push(Line::from(format!("  • {}", rec)));
                    } else {
                        lines.push(Line::from(format!("  {}", rec).dark_gray()));
                    }
                }
                lines.push(Line::from(
                    format!(
                        "Image: {} | {} | {}",
                        summary.image_provider, summary.image_resolution, summary.image_date
                    )
                    .dark_gray(),
                ));
                lines
            }
        };
        let panel = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        f.render_widget(panel, area);
    }

    fn render_trend(&self, f: &mut Frame, area: Rect) {
        let projection = match self.trend.view() {
            TrendView::Idle => return draw_placeholder(f, area, "Select a field to view its trend"),
            TrendView::Loading => return draw_placeholder(f, area, "Loading trend..."),
            TrendView::Failed(message) => {
                return draw_placeholder(f, area, &format!("Trend unavailable: {}", message))
            }
            TrendView::Empty => return draw_placeholder(f, area, NO_TREND_DATA),
            TrendView::Ready(projection) => projection,
        };

        let datasets = vec![
            Dataset::default()
                .name("NDVI")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Green))
                .data(&projection.ndvi),
            Dataset::default()
                .name("Precipitation")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Blue))
                .data(&projection.precipitation),
        ];

        let first = projection.first_date.clone().unwrap_or_default();
        let last = projection.last_date.clone().unwrap_or_default();
        let chart = Chart::new(datasets)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("NDVI Trend")
                    .title(Line::from(format!("Precip max {:.1} mm ", projection.precipitation_max)).right_aligned()),
            )
            .x_axis(
                Axis::default()
                    .bounds([0.0, projection.x_max])
                    .labels(vec![Line::from(first), Line::from(last)]),
            )
            .y_axis(
                Axis::default()
                    .title("NDVI".dark_gray())
                    .bounds(TrendProjection::NDVI_BOUNDS)
                    .labels(vec![Line::from("0.0"), Line::from("0.5"), Line::from("1.0")]),
            );
        f.render_widget(chart, area);
    }
}

fn draw_placeholder(f: &mut Frame, area: Rect, text: &str) {
    let p = Paragraph::new(text.to_string())
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL).title("NDVI Trend"))
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

/// Runs the interactive dashboard until the user quits
pub async fn run_dashboard(monitor: FieldMonitor, config: MonitorConfig) -> anyhow::Result<()> {
    // Setup terminal
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, Dashboard::new(monitor, config)).await;

    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    crossterm::terminal::disable_raw_mode()?;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut dashboard: Dashboard,
) -> anyhow::Result<()> {
    // Terminal input is blocking; read it on a blocking thread that polls so it
    // notices shutdown and the runtime can drop without waiting for a key
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Event>();
    let shutdown = Arc::new(AtomicBool::new(false));
    let reader_shutdown = Arc::clone(&shutdown);
    let reader = tokio::task::spawn_blocking(move || {
        forward_input(&reader_shutdown, &input_tx, event::poll, event::read)
    });

    let result = run_until_quit(terminal, &mut dashboard, &mut input_rx).await;

    shutdown.store(true, Ordering::Relaxed);
    input_rx.close();
    if let Err(e) = reader.await {
        warn!("Input reader ended abnormally: {}", e);
    }
    result
}

/// Forwards terminal events until `shutdown` is set, the receiver is gone or
/// the terminal errors. Never blocks longer than one poll interval.
fn forward_input(
    shutdown: &AtomicBool,
    tx: &mpsc::UnboundedSender<Event>,
    mut poll: impl FnMut(Duration) -> io::Result<bool>,
    mut read: impl FnMut() -> io::Result<Event>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match poll(INPUT_POLL_INTERVAL) {
            Ok(true) => match read() {
                Ok(ev) => {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Terminal read failed: {}", e);
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!("Terminal poll failed: {}", e);
                break;
            }
        }
    }
}

async fn run_until_quit(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    dashboard: &mut Dashboard,
    input_rx: &mut mpsc::UnboundedReceiver<Event>,
) -> anyhow::Result<()> {
    if !dashboard.monitor.is_signed_in() {
        dashboard.sign_in_from_config().await;
    }
    if dashboard.monitor.is_signed_in() {
        dashboard.refresh().await;
    }

    loop {
        dashboard.dispatch_events();
        if dashboard.reauth_pending {
            dashboard.reauthenticate().await;
            dashboard.dispatch_events();
        }

        terminal.draw(|f| dashboard.draw(f))?;

        if dashboard.should_quit {
            break;
        }

        tokio::select! {
            Some(input) = input_rx.recv() => {
                dashboard.handle_input(input).await;
            }
            Some(completion) = dashboard.monitor.next_completion() => {
                dashboard.monitor.handle_completion(completion);
                dashboard.monitor.process_pending();
            }
            else => break,
        }
    }

    Ok(())
}
