//! Integration tests for service configuration

mod common;

use common::*;
use wecom_relay_api::{ConfigError, ServiceConfig};

fn valid_document() -> serde_json::Value {
    serde_json::json!({
        "server": { "port": 9090 },
        "wecom": {
            "endpoint_path": "/hooks/wecom",
            "token": "T",
            "encoding_aes_key": ZERO_KEY,
            "corp_id": CORP_ID
        },
        "telegram": {
            "bot_token": "123:abc",
            "chat_id": "-100"
        }
    })
}

/// Verify that a minimal deployment document deserializes and validates
#[test]
fn test_minimal_document_is_valid() {
    let config: ServiceConfig = serde_json::from_value(valid_document()).unwrap();

    config.validate().unwrap();
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.wecom.endpoint_path, "/hooks/wecom");
    assert_eq!(config.telegram.api_base_url, "https://api.telegram.org");
}

/// Verify that each required secret is reported by name
#[test]
fn test_each_required_field_is_enforced() {
    let required = [
        ("wecom", "token"),
        ("wecom", "encoding_aes_key"),
        ("wecom", "corp_id"),
        ("telegram", "bot_token"),
        ("telegram", "chat_id"),
    ];

    for (section, field) in required {
        let mut document = valid_document();
        document[section][field] = serde_json::json!("");
        let config: ServiceConfig = serde_json::from_value(document).unwrap();

        let error = config.validate().unwrap_err();
        assert!(
            matches!(error, ConfigError::Missing { .. } | ConfigError::InvalidKey(_)),
            "{}.{} produced {:?}",
            section,
            field,
            error
        );
    }
}

/// Verify that a malformed AES key is caught at validation time
#[test]
fn test_short_aes_key_is_rejected() {
    let mut document = valid_document();
    document["wecom"]["encoding_aes_key"] = serde_json::json!("too-short");
    let config: ServiceConfig = serde_json::from_value(document).unwrap();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidKey(_))
    ));
}

/// Verify that secrets never appear in debug output
#[test]
fn test_debug_output_redacts_secrets() {
    let mut document = valid_document();
    document["wecom"]["token"] = serde_json::json!("wecom-signing-token");
    document["telegram"]["bot_token"] = serde_json::json!("123:telegram-bot-secret");
    let config: ServiceConfig = serde_json::from_value(document).unwrap();

    let debug = format!("{:?}", config);
    assert!(!debug.contains("wecom-signing-token"));
    assert!(!debug.contains("telegram-bot-secret"));
    assert!(!debug.contains(ZERO_KEY));
    assert!(debug.contains(CORP_ID));
}
