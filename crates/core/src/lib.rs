//! Domain layer for the image explanation service.
//!
//! Holds everything the job pipeline shares between the HTTP layer and
//! the background runners: the in-memory [`registry::JobRegistry`], the
//! capability traits the pipeline drives ([`capability::Classifier`],
//! [`capability::Explainer`]), image tensor helpers, the label set and
//! the artifact storage seam.

pub mod capability;
pub mod error;
pub mod image;
pub mod job;
pub mod labels;
pub mod registry;
pub mod storage;
pub mod types;
