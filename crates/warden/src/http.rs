//! Axum HTTP façade for the PDP.
//!
//! Two endpoints: `GET /getDecision` evaluates query parameters and returns
//! the decision as JSON, `GET /health` reports readiness. The PDP itself has
//! no dependency on this layer.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use warden_core::Response;
use warden_pdp::Pdp;

use crate::request_map;

/// Shared application state. The PDP slot starts empty so `/health` can
/// answer `initializing` while policies load.
pub struct AppState {
    pdp: RwLock<Option<Arc<Pdp>>>,
}

impl AppState {
    pub fn initializing() -> Self {
        Self {
            pdp: RwLock::new(None),
        }
    }

    pub fn ready(pdp: Arc<Pdp>) -> Self {
        Self {
            pdp: RwLock::new(Some(pdp)),
        }
    }

    pub fn set_ready(&self, pdp: Arc<Pdp>) {
        if let Ok(mut slot) = self.pdp.write() {
            *slot = Some(pdp);
        }
    }

    fn pdp(&self) -> Option<Arc<Pdp>> {
        self.pdp.read().ok().and_then(|slot| slot.clone())
    }
}

/// Build the router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/getDecision", get(handle_get_decision))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// GET /getDecision?action=...&task_id=...
async fn handle_get_decision(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let Some(pdp) = state.pdp() else {
        return Json(serde_json::json!({
            "decision": "Indeterminate",
            "obligations": [],
            "reason": ["policy decision point is initializing"],
        }));
    };

    let response = match request_map::build_request(&params) {
        Ok(request) => pdp.evaluate(&request),
        Err(error) => warden_core::Response::indeterminate(
            warden_core::Status::syntax_error(error.to_string()),
        ),
    };
    Json(decision_json(&response))
}

/// GET /health
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let status = if state.pdp().is_some() {
        "ready"
    } else {
        "initializing"
    };
    Json(serde_json::json!({ "status": status }))
}

/// The decision envelope enforcement points consume:
/// `{ "decision": <string>, "obligations": <json>, "reason": <list|null> }`.
pub fn decision_json(response: &Response) -> serde_json::Value {
    let Some(result) = response.result() else {
        return serde_json::json!({
            "decision": "Indeterminate",
            "obligations": [],
            "reason": ["empty response"],
        });
    };

    let obligations: Vec<serde_json::Value> = result
        .obligations
        .iter()
        .map(|obligation| {
            serde_json::json!({
                "id": obligation.id,
                "assignments": obligation.assignments.iter().map(|a| {
                    serde_json::json!({
                        "id": a.id,
                        "value": a.value.lexical(),
                        "dataType": a.value.data_type().uri(),
                    })
                }).collect::<Vec<_>>(),
            })
        })
        .collect();

    let mut reasons: Vec<serde_json::Value> = result
        .status
        .missing
        .iter()
        .map(|detail| {
            serde_json::json!({
                "category": detail.category,
                "attributeId": detail.attribute_id,
                "dataType": detail.data_type.uri(),
            })
        })
        .collect();
    if reasons.is_empty() {
        if let Some(message) = &result.status.message {
            reasons.push(serde_json::Value::String(message.clone()));
        }
    }

    serde_json::json!({
        "decision": result.decision.as_str(),
        "obligations": obligations,
        "reason": if reasons.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::Value::Array(reasons)
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{Decision, MissingAttributeDetail, Status};

    #[test]
    fn test_decision_json_permit() {
        let response = Response::of_decision(Decision::Permit);
        let json = decision_json(&response);
        assert_eq!(json["decision"], "Permit");
        assert!(json["reason"].is_null());
    }

    #[test]
    fn test_decision_json_reason_lists_missing_attributes() {
        let mut response = Response::of_decision(Decision::Deny);
        response.results[0].status = Status {
            code: warden_core::StatusCode::Ok,
            message: None,
            missing: vec![MissingAttributeDetail {
                category: "urn:oasis:names:tc:xacml:1.0:attribute-category:resource".into(),
                attribute_id: "task_expires".into(),
                data_type: warden_core::DataType::DateTime,
                issuer: None,
            }],
        };
        let json = decision_json(&response);
        assert_eq!(json["decision"], "Deny");
        assert_eq!(json["reason"][0]["attributeId"], "task_expires");
    }

    #[test]
    fn test_decision_json_syntax_error_reason() {
        let response = Response::indeterminate(Status::syntax_error("bad dateTime"));
        let json = decision_json(&response);
        assert_eq!(json["decision"], "Indeterminate");
        assert!(json["reason"][0].as_str().unwrap().contains("bad dateTime"));
    }

    #[test]
    fn test_app_state_readiness() {
        let state = AppState::initializing();
        assert!(state.pdp().is_none());
    }
}
