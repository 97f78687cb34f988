//! Per-session analysis state
//!
//! The dashboard flow is: log in, upload an export, train, classify. Each
//! step's result is cached here so later steps can reuse it. The context is
//! owned by whichever driver runs the flow (HTTP state or a CLI invocation);
//! the analysis functions themselves stay stateless.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::data::Dataset;
use crate::training::{ModelKind, TrainedModel};

/// A cached training result
#[derive(Debug)]
pub struct TrainingOutcome {
    pub kind: ModelKind,
    pub model: TrainedModel,
    pub mse: f64,
}

/// Everything one user session has produced so far
#[derive(Debug)]
pub struct SessionContext {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub authenticated: bool,
    pub email: Option<String>,
    pub dataset: Option<Dataset>,
    pub outcome: Option<TrainingOutcome>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string()[..8].to_string(),
            created_at: Utc::now(),
            authenticated: false,
            email: None,
            dataset: None,
            outcome: None,
        }
    }

    /// Mark the session authenticated after the identity gate passes
    pub fn log_in(&mut self, email: String) {
        self.authenticated = true;
        self.email = Some(email);
    }

    /// Cache a fresh upload. Any previous model was fit on the old rows, so
    /// it is dropped along with its predictions.
    pub fn cache_upload(&mut self, dataset: Dataset) {
        self.dataset = Some(dataset);
        self.outcome = None;
    }

    /// Cache a training result and the dataset scored with its predictions
    pub fn cache_training(&mut self, scored: Dataset, kind: ModelKind, model: TrainedModel, mse: f64) {
        self.dataset = Some(scored);
        self.outcome = Some(TrainingOutcome { kind, model, mse });
    }

    /// Drop everything but the identity
    pub fn reset(&mut self) {
        self.dataset = None;
        self.outcome = None;
    }

    pub fn has_dataset(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn has_model(&self) -> bool {
        self.outcome.is_some()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
