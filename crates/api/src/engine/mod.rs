//! Long-lived response producers that outlive a single handler call.

pub mod progress;
