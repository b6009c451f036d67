#![allow(dead_code)]

use async_trait::async_trait;
use field_monitor::client::FieldBackend;
use field_monitor::models::{
    AnalysisResult, DateRange, Field, Geometry, HealthStatus, ImageMetadata, IndexValue, LonLat,
    Provider, TokenResponse, TrendSeries, VegetationIndex,
};
use field_monitor::{FieldMonitor, MonitorError, Result, SessionStore};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    ListFields,
    GetField,
    Analyze,
    Trend,
    Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: CallKind,
    pub field_id: Option<String>,
    pub provider: Option<Provider>,
    pub date_range: DateRange,
}

/// In-memory backend. Analysis and trend responses can be held and then
/// released in any order to simulate network reordering.
#[derive(Default)]
pub struct ScriptedBackend {
    fields: Mutex<Vec<Field>>,
    calls: Mutex<Vec<Call>>,
    held: Mutex<Vec<(Call, oneshot::Sender<()>)>>,
    hold: AtomicBool,
    unauthorized: AtomicBool,
    analysis_error: Mutex<Option<String>>,
    list_error: Mutex<Option<String>>,
}

impl ScriptedBackend {
    pub fn new(fields: Vec<Field>) -> Arc<Self> {
        let backend = Self::default();
        *backend.fields.lock().unwrap() = fields;
        Arc::new(backend)
    }

    pub fn hold_responses(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn reject_credentials(&self) {
        self.unauthorized.store(true, Ordering::SeqCst);
    }

    pub fn fail_analysis(&self, message: &str) {
        *self.analysis_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_list(&self, message: Option<&str>) {
        *self.list_error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn set_fields(&self, fields: Vec<Field>) {
        *self.fields.lock().unwrap() = fields;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.kind == kind).count()
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Yields until `n` responses are parked.
    pub async fn wait_for_held(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.held_count() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("timed out waiting for held requests");
    }

    /// Releases every held response matching `predicate`. Returns how many.
    pub fn release_where(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        let mut held = self.held.lock().unwrap();
        let (release, keep): (Vec<_>, Vec<_>) = held.drain(..).partition(|(call, _)| predicate(call));
        *held = keep;
        let released = release.len();
        for (_, gate) in release {
            let _ = gate.send(());
        }
        released
    }

    /// Releases only the earliest-held response matching `predicate`.
    pub fn release_oldest_where(&self, predicate: impl Fn(&Call) -> bool) -> bool {
        let mut held = self.held.lock().unwrap();
        match held.iter().position(|(call, _)| predicate(call)) {
            Some(pos) => {
                let (_, gate) = held.remove(pos);
                let _ = gate.send(());
                true
            }
            None => false,
        }
    }

    pub fn release_provider(&self, provider: Option<Provider>) -> usize {
        self.release_where(|call| call.provider == provider)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn gate(&self, call: Call) {
        self.record(call.clone());
        if self.hold.load(Ordering::SeqCst) {
            let (tx, rx) = oneshot::channel();
            self.held.lock().unwrap().push((call, tx));
            let _ = rx.await;
        }
    }

    fn check_auth(&self) -> Result<()> {
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(MonitorError::Auth("credential rejected by server".to_string()));
        }
        Ok(())
    }
}

/// The result carries the provider it was requested for in its image metadata.
pub fn analysis_for(provider: Option<Provider>) -> AnalysisResult {
    let mut index_values = BTreeMap::new();
    index_values.insert(VegetationIndex::Ndvi, IndexValue::Scalar(0.62));
    AnalysisResult {
        health_status: HealthStatus::Good,
        index_values,
        image: ImageMetadata {
            provider: provider.map(|p| p.as_str().to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn trend_for(provider_tag: &str) -> TrendSeries {
    TrendSeries::new(
        vec![format!("2024-01-01-{}", provider_tag), "2024-02-01".to_string()],
        vec![Some(0.4), Some(0.5)],
        vec![Some(3.0), Some(0.0)],
    )
    .expect("aligned series")
}

#[async_trait]
impl FieldBackend for ScriptedBackend {
    async fn list_fields(&self) -> Result<Vec<Field>> {
        self.record(Call {
            kind: CallKind::ListFields,
            field_id: None,
            provider: None,
            date_range: DateRange::unbounded(),
        });
        self.check_auth()?;
        if let Some(message) = self.list_error.lock().unwrap().clone() {
            return Err(MonitorError::Fetch(message));
        }
        Ok(self.fields.lock().unwrap().clone())
    }

    async fn get_field(&self, field_id: &str) -> Result<Field> {
        self.record(Call {
            kind: CallKind::GetField,
            field_id: Some(field_id.to_string()),
            provider: None,
            date_range: DateRange::unbounded(),
        });
        self.check_auth()?;
        self.fields
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.field_id == field_id)
            .cloned()
            .ok_or_else(|| MonitorError::NotFound(field_id.to_string()))
    }

    async fn analyze_field(
        &self,
        field_id: &str,
        provider: Option<Provider>,
        date_range: &DateRange,
    ) -> Result<AnalysisResult> {
        self.gate(Call {
            kind: CallKind::Analyze,
            field_id: Some(field_id.to_string()),
            provider,
            date_range: *date_range,
        })
        .await;
        self.check_auth()?;
        if let Some(message) = self.analysis_error.lock().unwrap().clone() {
            return Err(MonitorError::Fetch(message));
        }
        Ok(analysis_for(provider))
    }

    async fn field_trend(&self, field_id: &str, date_range: &DateRange) -> Result<TrendSeries> {
        // Trend calls carry no provider; tag them by the provider of the matching analysis
        let provider = self
            .calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.kind == CallKind::Analyze && c.field_id.as_deref() == Some(field_id))
            .and_then(|c| c.provider);
        self.gate(Call {
            kind: CallKind::Trend,
            field_id: Some(field_id.to_string()),
            provider,
            date_range: *date_range,
        })
        .await;
        self.check_auth()?;
        Ok(trend_for(provider.map(|p| p.as_str()).unwrap_or("default")))
    }

    async fn request_token(&self, username: &str, password: &str) -> Result<TokenResponse> {
        self.record(Call {
            kind: CallKind::Token,
            field_id: None,
            provider: None,
            date_range: DateRange::unbounded(),
        });
        if username == "agronomist" && password == "secret" {
            Ok(TokenResponse {
                access_token: "token-abc".to_string(),
                token_type: Some("bearer".to_string()),
            })
        } else {
            Err(MonitorError::Auth("invalid credentials".to_string()))
        }
    }
}

pub fn square_field(id: &str, name: &str, lon: f64, lat: f64) -> Field {
    let ring = [
        LonLat::new(lon, lat),
        LonLat::new(lon + 0.01, lat),
        LonLat::new(lon + 0.01, lat + 0.01),
        LonLat::new(lon, lat + 0.01),
        LonLat::new(lon, lat),
    ];
    Field::new(id, name)
        .with_area(12.5)
        .with_crop("wheat")
        .with_geometry(Geometry::polygon(&ring))
}

pub fn sample_fields() -> Vec<Field> {
    vec![
        square_field("f1", "North Plot", 78.10, 20.10),
        square_field("f2", "South Plot", 78.20, 20.00),
        Field::new("f3", "Unmapped Plot").with_coordinates(20.5, 78.5),
    ]
}

/// Monitor over `backend` with a signed-in in-memory session.
pub fn monitor_with(backend: Arc<ScriptedBackend>) -> (FieldMonitor, Arc<SessionStore>) {
    let session = Arc::new(SessionStore::in_memory().expect("in-memory session store"));
    session.set_credential("token-abc").expect("store credential");
    let monitor = FieldMonitor::new(backend, Arc::clone(&session));
    (monitor, session)
}

/// Applies the next `n` completions, returning how many were current.
pub async fn apply_completions(monitor: &mut FieldMonitor, n: usize) -> usize {
    let mut applied = 0;
    for _ in 0..n {
        let completion = tokio::time::timeout(Duration::from_secs(5), monitor.next_completion())
            .await
            .expect("timed out waiting for completion")
            .expect("completion channel open");
        if monitor.handle_completion(completion) {
            applied += 1;
        }
    }
    applied
}
