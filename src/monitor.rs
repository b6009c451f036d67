//! The single orchestration path: every user action goes through `FieldMonitor`,
//! which updates registry/filter state, asks the controller for a new trigger,
//! dispatches backend work and publishes the outcome on the event bus.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, MonitorEvent};
use crate::client::FieldBackend;
use crate::controller::{AnalysisController, AnalysisRequest, AnalysisState, RequestToken, TrendState};
use crate::error::{MonitorError, Result};
use crate::filters::FilterState;
use crate::models::{AnalysisResult, DateRange, Field, Provider, Selection, TrendSeries, VegetationIndex};
use crate::registry::FieldRegistry;
use crate::session::SessionStore;

#[derive(Debug)]
pub enum CompletionKind {
    Analysis(Result<AnalysisResult>),
    Trend(Result<TrendSeries>),
}

/// A backend response tagged with the trigger it was issued under and the
/// session generation whose credential it was sent with.
#[derive(Debug)]
pub struct Completion {
    pub token: RequestToken,
    pub session_generation: u64,
    pub kind: CompletionKind,
}

pub struct FieldMonitor {
    backend: Arc<dyn FieldBackend>,
    session: Arc<SessionStore>,
    registry: FieldRegistry,
    filters: FilterState,
    controller: AnalysisController,
    bus: EventBus,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl FieldMonitor {
    pub fn new(backend: Arc<dyn FieldBackend>, session: Arc<SessionStore>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            session,
            registry: FieldRegistry::new(),
            filters: FilterState::new(),
            controller: AnalysisController::new(),
            bus: EventBus::new(),
            completions_tx,
            completions_rx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn controller(&self) -> &AnalysisController {
        &self.controller
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self.session.get_credential(), Ok(Some(_)))
    }

    /// The live selection, assembled from the registry and the filters.
    pub fn selection(&self) -> Selection {
        Selection {
            field: self.registry.selected().cloned(),
            provider: self.filters.provider(),
            index: self.filters.index(),
            date_range: self.filters.date_range(),
        }
    }

    // ===== AUTH =====

    pub async fn sign_in(&mut self, username: &str, password: &str) -> Result<()> {
        let token = self.backend.request_token(username, password).await?;
        self.session.set_credential(&token.access_token)?;
        info!("Signed in as {}", username);
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.session.clear()?;
        self.controller.reset();
        self.registry.clear();
        self.filters = FilterState::new();
        info!("Signed out");
        self.bus.publish(MonitorEvent::SignedOut);
        Ok(())
    }

    fn credential_rejected(&mut self, error: &MonitorError) {
        let current = self.session.generation();
        self.reject_credential_issued_at(current, error);
    }

    /// Clears the credential only if it is still the one that was rejected. A
    /// credential issued after the request went out is left alone.
    fn reject_credential_issued_at(&mut self, generation: u64, error: &MonitorError) {
        if self.session.generation() != generation {
            debug!("Ignoring rejection of a superseded credential: {}", error);
            return;
        }
        warn!("Credential rejected: {}", error);
        if let Err(e) = self.session.clear() {
            warn!("Failed to clear stored credential: {}", e);
        }
        self.bus.publish(MonitorEvent::AuthRequired);
    }

    // ===== FIELD REGISTRY =====

    pub async fn refresh_fields(&mut self) -> Result<Arc<Vec<Field>>> {
        let had_selection = self.registry.selected().is_some();

        match self.registry.load_fields(self.backend.as_ref()).await {
            Ok(fields) => {
                self.bus.publish(MonitorEvent::FieldsLoaded(Arc::clone(&fields)));
                if had_selection && self.registry.selected().is_none() {
                    debug!("Selected field vanished on refresh");
                    self.controller.cancel();
                    self.bus.publish(MonitorEvent::SelectionCleared);
                }
                Ok(fields)
            }
            Err(e) => {
                if e.is_auth() {
                    self.credential_rejected(&e);
                }
                self.bus.publish(MonitorEvent::FieldsFailed(e.user_message()));
                Err(e)
            }
        }
    }

    /// Selects a field from the last-loaded list and starts a trigger. An unknown
    /// id means the list is stale: it is reloaded and `NotFound` is returned.
    pub async fn select_field(&mut self, field_id: &str) -> Result<Field> {
        match self.registry.select_field(field_id) {
            Ok(field) => {
                info!("Selected field {} ({})", field.field_id, field.display_name());
                self.bus.publish(MonitorEvent::FieldSelected(field.clone()));
                self.reevaluate();
                Ok(field)
            }
            Err(e) => {
                warn!("Field {} not in registry, reloading", field_id);
                if let Err(reload) = self.refresh_fields().await {
                    debug!("Reload after NotFound failed: {}", reload);
                }
                Err(e)
            }
        }
    }

    pub fn clear_selection(&mut self) {
        if self.registry.clear_selection().is_some() {
            debug!("Selection cleared");
        }
        self.controller.cancel();
        self.bus.publish(MonitorEvent::SelectionCleared);
    }

    // ===== FILTERS =====

    /// No-op (returns `None`) while no field is selected or when the provider is unchanged.
    pub fn set_provider(&mut self, provider: Option<Provider>) -> Option<RequestToken> {
        if self.registry.selected().is_none() {
            debug!("Provider change ignored: no field selected");
            return None;
        }
        if !self.filters.set_provider(provider) {
            return None;
        }
        self.bus.publish(MonitorEvent::ProviderChanged(provider));
        self.reevaluate()
    }

    pub fn cycle_provider(&mut self) -> Option<RequestToken> {
        self.set_provider(Provider::cycle(self.filters.provider()))
    }

    /// Changes which already-fetched index is displayed. Never hits the backend.
    pub fn set_index(&mut self, index: VegetationIndex) {
        if self.filters.set_index(index) {
            self.bus.publish(MonitorEvent::IndexChanged(index));
        }
    }

    pub fn set_date_range(&mut self, date_range: DateRange) -> Result<Option<RequestToken>> {
        let date_range = DateRange::new(date_range.start, date_range.end)?;
        if !self.filters.set_date_range(date_range) {
            return Ok(None);
        }
        self.bus.publish(MonitorEvent::DateRangeChanged(date_range));
        if self.registry.selected().is_none() {
            return Ok(None);
        }
        Ok(self.reevaluate())
    }

    // ===== ORCHESTRATION =====

    /// Mints a token for the current selection and dispatches analysis and trend.
    pub fn reevaluate(&mut self) -> Option<RequestToken> {
        let selection = self.selection();
        let request = self.controller.begin(&selection)?;
        let token = request.token;
        self.bus.publish(MonitorEvent::AnalysisRequested {
            token,
            selection: request.selection.clone(),
        });
        self.dispatch(request);
        Some(token)
    }

    fn dispatch(&self, request: AnalysisRequest) {
        let token = request.token;
        let field_id = request.field_id().to_string();
        let provider = request.selection.provider;
        let date_range = request.selection.date_range;
        let session_generation = self.session.generation();

        let backend = Arc::clone(&self.backend);
        let tx = self.completions_tx.clone();
        let id = field_id.clone();
        tokio::spawn(async move {
            let outcome = backend.analyze_field(&id, provider, &date_range).await;
            let completion = Completion {
                token,
                session_generation,
                kind: CompletionKind::Analysis(outcome),
            };
            if tx.send(completion).is_err() {
                debug!("Monitor dropped before analysis {} completed", token);
            }
        });

        let backend = Arc::clone(&self.backend);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let outcome = backend.field_trend(&field_id, &date_range).await;
            let completion = Completion {
                token,
                session_generation,
                kind: CompletionKind::Trend(outcome),
            };
            if tx.send(completion).is_err() {
                debug!("Monitor dropped before trend {} completed", token);
            }
        });
    }

    /// Applies one completion. Returns false if it was stale and discarded.
    pub fn handle_completion(&mut self, completion: Completion) -> bool {
        let Completion {
            token,
            session_generation,
            kind,
        } = completion;

        match kind {
            CompletionKind::Analysis(outcome) => {
                let outcome = outcome.map_err(|e| self.failure_message(session_generation, &e));
                match self.controller.apply_analysis(token, outcome) {
                    Ok(AnalysisState::Settled { result, .. }) => {
                        let result = Arc::clone(result);
                        debug!("Analysis {} settled: {}", token, result.health_status.as_str());
                        self.bus.publish(MonitorEvent::AnalysisSettled { token, result });
                        true
                    }
                    Ok(AnalysisState::Failed { error, .. }) => {
                        let message = error.clone();
                        warn!("Analysis {} failed: {}", token, message);
                        self.bus.publish(MonitorEvent::AnalysisFailed { token, message });
                        true
                    }
                    Ok(_) => true,
                    Err(e) => {
                        debug!("{}", e);
                        false
                    }
                }
            }
            CompletionKind::Trend(outcome) => {
                let outcome = outcome.map_err(|e| self.failure_message(session_generation, &e));
                match self.controller.apply_trend(token, outcome) {
                    Ok(TrendState::Ready(series)) => {
                        let series = Arc::clone(series);
                        self.bus.publish(MonitorEvent::TrendSettled { token, series });
                        true
                    }
                    Ok(TrendState::Failed(message)) => {
                        let message = message.clone();
                        warn!("Trend {} failed: {}", token, message);
                        self.bus.publish(MonitorEvent::TrendFailed { token, message });
                        true
                    }
                    Ok(_) => true,
                    Err(e) => {
                        debug!("{}", e);
                        false
                    }
                }
            }
        }
    }

    // A 401 invalidates the credential it was sent with, current trigger or not
    fn failure_message(&mut self, session_generation: u64, error: &MonitorError) -> String {
        if error.is_auth() {
            self.reject_credential_issued_at(session_generation, error);
        }
        error.user_message()
    }

    /// Applies every completion that has already arrived. Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if self.handle_completion(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Waits for the next backend completion without applying it.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    pub fn in_flight(&self) -> bool {
        self.controller.state().is_requesting() || matches!(self.controller.trend(), TrendState::Loading)
    }

    /// Applies completions until the current trigger's analysis and trend have
    /// both resolved. Stale completions met along the way are discarded.
    pub async fn settle(&mut self) {
        while self.in_flight() {
            match self.completions_rx.recv().await {
                Some(completion) => {
                    self.handle_completion(completion);
                }
                None => break,
            }
        }
    }
}
