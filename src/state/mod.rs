//! State module for tracking manifest health
//!
//! # Components
//!
//! - `ManifestStatus`: The lifecycle status stored with every manifest
//! - `LifecyclePolicy`: Threshold-driven transitions between statuses

mod lifecycle;
mod manifest_status;

// Re-export main types
pub use lifecycle::LifecyclePolicy;
pub use manifest_status::ManifestStatus;
