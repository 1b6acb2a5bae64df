//! HTTP server for the persona profile service.
//!
//! Owners create profiles with a bearer token, anyone holding a share link
//! loads them (each load is counted), and owners list summaries of what they
//! created.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod summary;

pub use auth::{AuthProvider, Credentials, Identity, StaticTokenAuth};
pub use config::{AnonymousPolicy, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::PersonaServer;
pub use summary::ProfileSummary;
