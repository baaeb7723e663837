//! HTTP surface cert-manager calls into.
//!
//! cert-manager talks to solvers through the Kubernetes API aggregation layer:
//! each challenge arrives as a `ChallengePayload` created under
//! `/apis/<group>/v1alpha1/<solver name>` and the response payload reports
//! whether the solver succeeded.

pub mod payload;

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, error};
use crate::{
    challenge::ChallengeAction,
    solver::Solver,
};
use self::payload::{ApiResourceList, ChallengePayload, ChallengeResponse, Status};

pub const API_VERSION: &str = "v1alpha1";

struct AppState<S> {
    solver: Arc<S>,
    group: Arc<str>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            solver: Arc::clone(&self.solver),
            group: Arc::clone(&self.group),
        }
    }
}

pub fn app<S: Solver + 'static>(solver: Arc<S>, group: &str) -> Router {
    let state = AppState {
        solver,
        group: Arc::from(group),
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/apis/:group/v1alpha1", get(discovery::<S>))
        .route("/apis/:group/v1alpha1/:resource", post(solve::<S>))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn discovery<S: Solver + 'static>(
    State(state): State<AppState<S>>,
    Path(group): Path<String>,
) -> Response {
    if group != *state.group {
        return not_found(&group, API_VERSION);
    }

    let list = ApiResourceList::for_solver(format!("{}/{}", state.group, API_VERSION), state.solver.name());
    Json(list).into_response()
}

async fn solve<S: Solver + 'static>(
    State(state): State<AppState<S>>,
    Path((group, resource)): Path<(String, String)>,
    payload: Result<Json<ChallengePayload>, JsonRejection>,
) -> Response {
    if group != *state.group || resource != state.solver.name() {
        return not_found(&group, &resource);
    }

    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let Some(request) = payload.request else {
        return bad_request("challenge payload has no request".to_owned());
    };

    debug!(uid = %request.uid, action = %request.action, fqdn = %request.resolved_fqdn, "received challenge");

    let result = match request.action {
        ChallengeAction::Present => state.solver.present(&request).await,
        ChallengeAction::CleanUp => state.solver.cleanup(&request).await,
    };

    if let Err(e) = &result {
        error!(uid = %request.uid, action = %request.action, "solver returned an error: {}", e);
    }

    let response = ChallengeResponse::from_result(request.uid, result);
    (StatusCode::CREATED, Json(ChallengePayload::response(response))).into_response()
}

fn bad_request(message: String) -> Response {
    let status = Status::failure(400, "BadRequest", message);
    (StatusCode::BAD_REQUEST, Json(status.into_object())).into_response()
}

fn not_found(group: &str, resource: &str) -> Response {
    let status = Status::failure(404, "NotFound", format!("{}/{} not served by this webhook", group, resource));
    (StatusCode::NOT_FOUND, Json(status.into_object())).into_response()
}
