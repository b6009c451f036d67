//! Analysis request state machine.
//!
//! Every trigger (field, provider or date-range change) mints a fresh
//! [`RequestToken`]. Completions carry the token they were issued under and are
//! only applied when it is still the current one, so the live result always
//! belongs to the most recent trigger regardless of arrival order.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{MonitorError, Result};
use crate::models::{AnalysisResult, Selection, TrendSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisState {
    Idle,
    Requesting {
        token: RequestToken,
        selection: Selection,
    },
    Settled {
        token: RequestToken,
        selection: Selection,
        result: Arc<AnalysisResult>,
    },
    Failed {
        token: RequestToken,
        selection: Selection,
        error: String,
    },
}

impl AnalysisState {
    pub fn token(&self) -> Option<RequestToken> {
        match self {
            AnalysisState::Idle => None,
            AnalysisState::Requesting { token, .. }
            | AnalysisState::Settled { token, .. }
            | AnalysisState::Failed { token, .. } => Some(*token),
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            AnalysisState::Idle => None,
            AnalysisState::Requesting { selection, .. }
            | AnalysisState::Settled { selection, .. }
            | AnalysisState::Failed { selection, .. } => Some(selection),
        }
    }

    pub fn result(&self) -> Option<&Arc<AnalysisResult>> {
        match self {
            AnalysisState::Settled { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn is_requesting(&self) -> bool {
        matches!(self, AnalysisState::Requesting { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrendState {
    #[default]
    Idle,
    Loading,
    Ready(Arc<TrendSeries>),
    Failed(String),
}

/// Work the caller must dispatch to the backend for one trigger. Analysis and
/// trend share the token.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub token: RequestToken,
    pub selection: Selection,
}

impl AnalysisRequest {
    pub fn field_id(&self) -> &str {
        self.selection.field_id().unwrap_or_default()
    }
}

/// All orchestration state in one owned value. Created at start-up, reset on sign-out.
#[derive(Debug, Clone)]
pub struct OrchestrationState {
    next_token: u64,
    current: Option<RequestToken>,
    analysis: AnalysisState,
    trend: TrendState,
}

impl Default for OrchestrationState {
    fn default() -> Self {
        Self {
            next_token: 1,
            current: None,
            analysis: AnalysisState::Idle,
            trend: TrendState::Idle,
        }
    }
}

#[derive(Debug, Default)]
pub struct AnalysisController {
    state: OrchestrationState,
}

impl AnalysisController {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self) -> RequestToken {
        let token = RequestToken(self.state.next_token);
        self.state.next_token += 1;
        self.state.current = Some(token);
        token
    }

    /// Starts a new trigger for `selection`. Any earlier in-flight request becomes
    /// stale. Returns `None` (and goes Idle) when no field is selected.
    pub fn begin(&mut self, selection: &Selection) -> Option<AnalysisRequest> {
        let token = self.mint();

        if selection.field.is_none() {
            debug!("Trigger {} has no field; controller idle", token);
            self.state.analysis = AnalysisState::Idle;
            self.state.trend = TrendState::Idle;
            return None;
        }

        debug!("Trigger {} for field {:?}", token, selection.field_id());
        self.state.analysis = AnalysisState::Requesting {
            token,
            selection: selection.clone(),
        };
        self.state.trend = TrendState::Loading;

        Some(AnalysisRequest {
            token,
            selection: selection.clone(),
        })
    }

    /// Invalidates anything in flight and returns to Idle.
    pub fn cancel(&mut self) -> RequestToken {
        let token = self.mint();
        self.state.analysis = AnalysisState::Idle;
        self.state.trend = TrendState::Idle;
        token
    }

    fn check_current(&self, token: RequestToken) -> Result<()> {
        if self.state.current == Some(token) && self.state.analysis.token().is_some() {
            Ok(())
        } else {
            Err(MonitorError::StaleResponse {
                token,
                current: self.state.current,
            })
        }
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.check_current(token).is_ok()
    }

    /// Applies an analysis completion. Stale tokens are rejected with
    /// `StaleResponse` and leave state untouched.
    pub fn apply_analysis(
        &mut self,
        token: RequestToken,
        outcome: std::result::Result<AnalysisResult, String>,
    ) -> Result<&AnalysisState> {
        self.check_current(token)?;

        let selection = match self.state.analysis.selection() {
            Some(selection) => selection.clone(),
            None => Selection::default(),
        };
        self.state.analysis = match outcome {
            Ok(result) => AnalysisState::Settled {
                token,
                selection,
                result: Arc::new(result),
            },
            Err(error) => AnalysisState::Failed {
                token,
                selection,
                error,
            },
        };
        Ok(&self.state.analysis)
    }

    pub fn apply_trend(
        &mut self,
        token: RequestToken,
        outcome: std::result::Result<TrendSeries, String>,
    ) -> Result<&TrendState> {
        self.check_current(token)?;

        self.state.trend = match outcome {
            Ok(series) => TrendState::Ready(Arc::new(series)),
            Err(error) => TrendState::Failed(error),
        };
        Ok(&self.state.trend)
    }

    pub fn reset(&mut self) {
        // Keep counting so tokens from before the reset can never match again
        let next_token = self.state.next_token;
        self.state = OrchestrationState {
            next_token,
            ..Default::default()
        };
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state.analysis
    }

    pub fn trend(&self) -> &TrendState {
        &self.state.trend
    }

    pub fn current_token(&self) -> Option<RequestToken> {
        self.state.current
    }
}
