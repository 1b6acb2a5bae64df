use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Json;
use persona_tracker::{NewProfile, ProfileService, TrackerError, TrackerResult};
use persona_types::{Profile, ProfileKey, ViewerId};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::auth::{AuthProvider, Credentials, Identity};
use crate::config::{AnonymousPolicy, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::summary::ProfileSummary;

/// Version tag stored alongside every payload created over HTTP.
pub const PAYLOAD_VERSION: &str = "8.0";

#[derive(Clone)]
pub struct AppState {
    pub service: ProfileService,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<ServerConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub uuid: ProfileKey,
    pub share_url: String,
}

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "persona-server",
        "version": env!("CARGO_PKG_VERSION"),
        "payload_version": PAYLOAD_VERSION,
        "durable": state.config.data_dir.is_some(),
    }))
}

/// `POST /createQR`: store a new profile owned by the caller.
pub async fn create_qr_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Json<CreatedResponse>> {
    let Json(body) = body.map_err(|rejection| ServerError::Validation {
        details: vec![rejection.body_text()],
    })?;
    let (generated, user_input) = validate_create_body(body)?;

    let identity = require_user(&state, &headers).await?;
    let payload = json!({
        "version": PAYLOAD_VERSION,
        "generatedProfile": generated,
        "userInput": user_input,
    });
    let request = NewProfile::new(payload).owned_by(identity.name);

    let service = state.service.clone();
    let profile = blocking(move || service.create_profile(request)).await?;
    let share_url = state.config.share_url(profile.key.as_str());
    Ok(Json(CreatedResponse {
        uuid: profile.key,
        share_url,
    }))
}

/// `GET /loadQR/:uuid`: return the profile and count this load.
pub async fn load_qr_handler(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Json<Value>> {
    let key = ProfileKey::parse(uuid.as_str()).map_err(|_| ServerError::NotFound(uuid))?;
    let viewer = resolve_viewer(&state, &headers).await?;
    debug!(profile = %key, anonymous = viewer.is_anonymous(), "loading profile");

    let service = state.service.clone();
    let profile = blocking(move || service.load_profile(&key, &viewer)).await?;
    Ok(Json(profile_document(&profile)?))
}

/// The profile as one flat document: payload fields at the top level with
/// the tracked fields (`uuid`, `uid`, counters, timestamps) over them.
///
/// A payload that is not a JSON object stays nested under `payload`.
pub fn profile_document(profile: &Profile) -> ServerResult<Value> {
    let Value::Object(mut tracked) =
        serde_json::to_value(profile).map_err(|e| ServerError::Internal(e.to_string()))?
    else {
        return Err(ServerError::Internal("profile did not serialize to an object".into()));
    };
    let mut document = match tracked.remove("payload") {
        Some(Value::Object(fields)) => fields,
        Some(other) => Map::from_iter([("payload".to_string(), other)]),
        None => Map::new(),
    };
    document.extend(tracked);
    Ok(Value::Object(document))
}

/// `GET /objects/awoken`: summaries of the caller's profiles.
pub async fn objects_awoken_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<Vec<ProfileSummary>>> {
    let identity = require_user(&state, &headers).await?;
    let service = state.service.clone();
    let owner = identity.name.clone();
    let profiles = blocking(move || service.profiles_owned_by(&owner)).await?;
    info!(owner = %identity.name, count = profiles.len(), "listing owned profiles");
    Ok(Json(profiles.iter().map(ProfileSummary::from_profile).collect()))
}

fn validate_create_body(body: Value) -> ServerResult<(Map<String, Value>, Map<String, Value>)> {
    let Value::Object(mut fields) = body else {
        return Err(ServerError::Validation {
            details: vec!["request body must be a JSON object".into()],
        });
    };
    let generated = fields.remove("generatedProfile");
    let user_input = fields.remove("userInput");

    let mut details = Vec::new();
    if !matches!(generated, Some(Value::Object(_))) {
        details.push("generatedProfile must be an object".to_string());
    }
    if !matches!(user_input, Some(Value::Object(_))) {
        details.push("userInput must be an object".to_string());
    }
    match (generated, user_input) {
        (Some(Value::Object(generated)), Some(Value::Object(user_input))) => {
            Ok((generated, user_input))
        }
        _ => Err(ServerError::Validation { details }),
    }
}

async fn require_user(state: &AppState, headers: &HeaderMap) -> ServerResult<Identity> {
    match Credentials::from_headers(headers)? {
        Credentials::Anonymous => Err(ServerError::AuthFailed("authentication required".into())),
        credentials => state.auth.authenticate(&credentials).await,
    }
}

async fn resolve_viewer(state: &AppState, headers: &HeaderMap) -> ServerResult<ViewerId> {
    let credentials = Credentials::from_headers(headers)?;
    if credentials == Credentials::Anonymous {
        return match state.config.anonymous_viewers {
            AnonymousPolicy::PerRequest => Ok(ViewerId::anonymous()),
            AnonymousPolicy::Deny => Err(ServerError::AuthFailed(
                "anonymous viewers are not accepted".into(),
            )),
        };
    }
    let identity = state.auth.authenticate(&credentials).await?;
    identity
        .viewer_id()
        .map_err(|e| ServerError::Tracker(TrackerError::from(e)))
}

/// Run a synchronous service call off the async workers.
async fn blocking<T, F>(call: F) -> ServerResult<T>
where
    F: FnOnce() -> TrackerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}
