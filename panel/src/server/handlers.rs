//! HTTP request handlers

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::DeployError;
use crate::models::application::AppId;
use crate::models::deployment::DeploySpec;
use crate::server::state::ServerState;
use crate::terminal::websocket::WsChannel;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "gakwaya-panel".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Body of `POST /api/applications/{id}/deploy-from-git`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployFromGitRequest {
    pub git_url: String,

    #[serde(default)]
    pub branch: Option<String>,

    /// When absent the application's stored environment is used
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub volumes: Vec<String>,

    #[serde(default)]
    pub build_args: BTreeMap<String, String>,

    #[serde(default)]
    pub dockerfile_path: Option<String>,
}

/// Deploy response
#[derive(Debug, Serialize, Deserialize)]
pub struct DeployResponse {
    pub container_id: String,
    pub image_tag: String,
    pub commit: String,
    pub status: String,
}

/// Deploy failure body
#[derive(Debug, Serialize, Deserialize)]
pub struct DeployErrorResponse {
    pub error: String,
    pub stage: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_log: Option<String>,
}

/// Deploy an application from its git repository
pub async fn deploy_from_git_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<AppId>,
    Json(request): Json<DeployFromGitRequest>,
) -> Response {
    if request.git_url.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "git_url is required" })),
        )
            .into_response();
    }

    let env = match request.env {
        Some(env) => env,
        None => match state.store.get(id).await {
            Ok(Some(record)) => record.env,
            // the orchestrator reports missing applications itself
            Ok(None) => BTreeMap::new(),
            Err(e) => return deploy_error_response(DeployError::Lookup(e)),
        },
    };

    let spec = DeploySpec {
        source_url: request.git_url.trim().to_string(),
        branch: request.branch,
        dockerfile_path: request.dockerfile_path,
        env,
        volumes: request.volumes,
        build_args: request.build_args,
    };

    // detached so a dropped client connection cannot abandon a deploy mid-flight
    let orchestrator = state.orchestrator.clone();
    let deploy = tokio::spawn(async move { orchestrator.deploy(id, &spec).await });

    match deploy.await {
        Ok(Ok(outcome)) => (
            StatusCode::CREATED,
            Json(DeployResponse {
                container_id: outcome.container_id,
                image_tag: outcome.image_tag,
                commit: outcome.commit.to_string(),
                status: "started".to_string(),
            }),
        )
            .into_response(),
        Ok(Err(e)) => deploy_error_response(e),
        Err(e) => {
            warn!("Deploy task for application {} failed: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DeployErrorResponse {
                    error: format!("deploy task failed: {}", e),
                    stage: "deploy".to_string(),
                    build_log: None,
                }),
            )
                .into_response()
        }
    }
}

/// Status code for a deploy failure
pub fn deploy_error_status(err: &DeployError) -> StatusCode {
    if err.is_caller_error() {
        StatusCode::BAD_REQUEST
    } else if matches!(err, DeployError::ApplicationNotFound(_)) {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn deploy_error_response(err: DeployError) -> Response {
    let body = DeployErrorResponse {
        error: err.to_string(),
        stage: err.stage().to_string(),
        build_log: err.build_log().map(str::to_string),
    };
    (deploy_error_status(&err), Json(body)).into_response()
}

/// Open an interactive shell in a container over a WebSocket
pub async fn terminal_handler(
    State(state): State<Arc<ServerState>>,
    Path(container_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let bridge = state.bridge.clone();
    ws.on_upgrade(move |socket| async move {
        info!("Terminal requested for container {}", container_id);
        if let Err(e) = bridge.open(&container_id, WsChannel::new(socket)).await {
            warn!("Terminal session for {} failed: {}", container_id, e);
        }
    })
}
