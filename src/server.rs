use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::datatype::Type;
use crate::error::{Result, SiphonError};
use crate::interface::{Action, Interface};

#[derive(Deserialize)]
pub struct SelectorParams {
    #[serde(default)]
    pub selector: String,
}

pub fn router(interface: Arc<Interface>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/json", get(json))
        .route("/schema", get(schema))
        .route("/:action", post(mutate))
        .layer(cors)
        .with_state(interface)
}

async fn json(State(iface): State<Arc<Interface>>, Query(params): Query<SelectorParams>) -> Response {
    run(iface, Action::Json, params.selector, None).await
}

async fn mutate(
    State(iface): State<Arc<Interface>>,
    Path(action): Path<String>,
    Query(params): Query<SelectorParams>,
    body: Bytes,
) -> Response {
    let action = match action.parse::<Action>() {
        Ok(action) if action.is_mutation() => action,
        _ => {
            let err = SiphonError::Noop(format!("no such action: {}", action));
            return (StatusCode::NOT_FOUND, Json(error_body(&err))).into_response();
        }
    };
    let body = if action.needs_body() {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => Some(value),
            Err(e) => return failure(SiphonError::from(e)),
        }
    } else {
        None
    };
    run(iface, action, params.selector, body).await
}

// top level field name -> canonical type
async fn schema(State(iface): State<Arc<Interface>>) -> Response {
    match root_fields(iface.database().root_type()) {
        Ok(fields) => (StatusCode::OK, Json(Value::Object(fields))).into_response(),
        Err(e) => failure(e),
    }
}

fn root_fields(root: Type) -> Result<Map<String, Value>> {
    let Type::Struct(st) = root else {
        return Err(SiphonError::Internal(format!("the root is a {}, not a struct", root)));
    };
    Ok(st
        .fields()?
        .into_iter()
        .map(|(name, ty)| (name, Value::String(ty.to_string())))
        .collect())
}

async fn run(iface: Arc<Interface>, action: Action, selector: String, body: Option<Value>) -> Response {
    // the engine is synchronous and may block on the database lock
    let joined = tokio::task::spawn_blocking(move || iface.submit(action, &selector, body.as_ref())).await;
    let outcome = match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "Join error");
            return failure(SiphonError::Internal(format!("request task failed: {}", e)));
        }
    };
    let ms = outcome.elapsed.as_secs_f64() * 1000.0;
    match outcome.result {
        Ok(rendered) => {
            info!(id = outcome.id.0, %action, ms, "request complete");
            match rendered {
                Some(value) => (StatusCode::OK, Json(value)).into_response(),
                None => StatusCode::OK.into_response(),
            }
        }
        Err(e) => {
            warn!(id = outcome.id.0, %action, ms, kind = e.kind(), error = %e, "request failed");
            failure(e)
        }
    }
}

fn error_body(e: &SiphonError) -> Value {
    json!({ "err": e.to_string(), "kind": e.kind() })
}

fn failure(e: SiphonError) -> Response {
    let status = if e.is_malformed_input() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(error_body(&e))).into_response()
}
