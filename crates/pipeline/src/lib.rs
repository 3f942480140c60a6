//! Explanation job execution.
//!
//! - [`runner::JobRunner`] drives one job from the uploaded input file to
//!   a stored artifact, reporting progress into the shared registry.
//! - [`scorer::ProgressScorer`] is the scoring callback that turns sample
//!   counts into progress and honours cancellation.
//! - [`explainer::SampledExplainer`] is the default explanation capability.
//! - [`remote::RemoteClassifier`] calls a model server over HTTP.
//! - [`predict`] is the synchronous top-k classification used by the
//!   predict endpoint.

pub mod explainer;
pub mod predict;
pub mod remote;
pub mod runner;
pub mod scorer;

pub use explainer::SampledExplainer;
pub use remote::RemoteClassifier;
pub use runner::{JobRunner, RunnerConfig};
pub use scorer::ProgressScorer;
