//! Tests for HTTP error mapping.

use super::*;
use axum::body::to_bytes;
use wecom_relay_core::DecryptStage;

async fn body_of(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_authentication_failure_is_forbidden() {
    let response = CallbackHandlerError::Rejected(CallbackError::AuthenticationFailed).into_response();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_of(response).await, "Forbidden");
}

#[tokio::test]
async fn test_other_core_errors_are_bad_request_with_generic_body() {
    let errors = [
        CallbackError::DecryptionFailed {
            stage: DecryptStage::Padding,
        },
        CallbackError::MalformedFrame {
            reason: "length prefix is not hexadecimal".to_string(),
        },
        CallbackError::TenantMismatch,
        CallbackError::MalformedPayload {
            reason: "no Encrypt element".to_string(),
        },
    ];

    for error in errors {
        let response = CallbackHandlerError::Rejected(error).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert_eq!(body, "Bad Request");
    }
}

#[test]
fn test_service_error_exit_codes() {
    let bind = ServiceError::BindFailed {
        address: "0.0.0.0:80".to_string(),
        message: "permission denied".to_string(),
    };
    let server = ServiceError::ServerFailed {
        message: "io".to_string(),
    };
    let config = ServiceError::Configuration(ConfigError::Missing {
        key: "wecom.token".to_string(),
    });

    assert_eq!(bind.exit_code(), 1);
    assert_eq!(server.exit_code(), 2);
    assert_eq!(config.exit_code(), 3);
}

#[test]
fn test_key_error_converts_to_config_error() {
    let error: ConfigError = KeyError::InvalidEncoding.into();

    assert!(matches!(error, ConfigError::InvalidKey(KeyError::InvalidEncoding)));
}
