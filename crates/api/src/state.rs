use std::sync::Arc;

use xplain_core::capability::Classifier;
use xplain_core::labels::LabelSet;
use xplain_core::registry::JobRegistry;
use xplain_core::storage::ArtifactStore;
use xplain_pipeline::JobRunner;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory table of explanation jobs. Shared with `runner`.
    pub registry: Arc<JobRegistry>,
    /// Spawns explanation jobs.
    pub runner: Arc<JobRunner>,
    /// Classifier used by the synchronous predict endpoint.
    pub classifier: Arc<dyn Classifier>,
    /// Label names, indexed like the classifier's score vectors.
    pub labels: Arc<LabelSet>,
    /// Where finished artifacts live.
    pub store: Arc<dyn ArtifactStore>,
    /// Database pool, present only when `DATABASE_URL` is configured.
    pub pool: Option<xplain_db::DbPool>,
}
