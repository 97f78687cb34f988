//! serplens - SEO search-performance analytics
//!
//! Takes a Google Search Console export, fits a regression model that
//! predicts clicks from CTR, position, and impressions, and buckets every
//! query into one of four CTR/position quadrants for prioritizing SEO work.
//!
//! The analysis core lives in [`data`] (export ingestion and CTR
//! normalization), [`training`] (the regression models and the
//! train/evaluate pipeline) and [`quadrant`] (the mean-based report).
//! Around it sit [`gate`] and [`session`] for the login flow, with the
//! [`server`] REST API and the [`cli`] on top.

pub mod error;

pub mod data;
pub mod quadrant;
pub mod training;

pub mod gate;
pub mod session;

pub mod cli;
pub mod server;

pub use error::{Result, SerplensError};

/// The types most callers need
pub mod prelude {
    pub use crate::data::{Dataset, Observation, PREDICTION_FLOOR};
    pub use crate::error::{Result, SerplensError};
    pub use crate::gate::IdentityGate;
    pub use crate::quadrant::{classify, Quadrant, QuadrantReport};
    pub use crate::session::SessionContext;
    pub use crate::training::{
        train, train_with_metrics, ModelKind, RegressionMetrics, Regressor, TrainedModel,
    };
}
