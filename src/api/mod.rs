//! HTTP API layer: response envelope, auth middleware, handlers, routes

pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::service::{AuthService, OAuthService};

pub use routes::create_routes;

/// Shared application state for all route handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub oauth_service: Option<Arc<OAuthService>>,
}

/// Standard success envelope returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub code: u16,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Success envelope with a data payload
    pub fn success(
        code: StatusCode,
        msg: impl Into<String>,
        data: T,
    ) -> (StatusCode, Json<ApiResponse<T>>) {
        (
            code,
            Json(ApiResponse {
                status: "success",
                code: code.as_u16(),
                msg: msg.into(),
                data: Some(data),
            }),
        )
    }
}

impl ApiResponse<()> {
    /// Success envelope carrying only a message
    pub fn message(
        code: StatusCode,
        msg: impl Into<String>,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        (
            code,
            Json(ApiResponse {
                status: "success",
                code: code.as_u16(),
                msg: msg.into(),
                data: None,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let (status, Json(body)) =
            ApiResponse::success(StatusCode::CREATED, "Created", serde_json::json!({"id": 1}));

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.status, "success");
        assert_eq!(body.code, 201);
        assert_eq!(body.msg, "Created");
        assert!(body.data.is_some());
    }

    #[test]
    fn test_message_envelope_omits_data() {
        let (_, Json(body)) = ApiResponse::message(StatusCode::OK, "Done");
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("data").is_none());
    }
}
