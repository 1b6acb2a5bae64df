//! Interaction tracking for the persona profile service.
//!
//! Loading a profile counts as an interaction. Each interaction bumps the
//! profile's `total_interactions`; the first interaction by a given viewer
//! also creates that viewer's [`ViewerRecord`](persona_types::ViewerRecord)
//! and bumps `unique_viewers`. Both happen in one optimistic store
//! transaction, retried a bounded number of times on conflict.
//!
//! - [`InteractionRecorder`] -- the counting transaction and its retry loop
//! - [`ProfileService`] -- create/load entry points used by request handlers
//! - [`RetryPolicy`] -- retry budget for conflicting commits

pub mod error;
pub mod recorder;
pub mod retry;
pub mod service;

pub use error::{TrackerError, TrackerResult};
pub use recorder::{plan_interaction, Interaction, InteractionRecorder};
pub use retry::RetryPolicy;
pub use service::{NewProfile, ProfileService};
