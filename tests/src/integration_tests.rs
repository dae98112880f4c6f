use app_authentication::{CredentialService, CredentialServiceTrait, StoredHash};
use app_config::{AppConfig, CONFIG_PATH_VAR};
use app_error::AppError;
use app_test::test_config;
use axum::{http::StatusCode, response::IntoResponse};
use clap::Parser;
use micro_credential::cli::{self, Cli, Outcome};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{Cursor, Write};

// Helper to turn an error into its HTTP status and JSON body
async fn error_response(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[test]
fn test_config_file_to_service() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "security": {{ "jwt": {{ "ttl_seconds": 60 }}, "password": {{ "cost": 4 }} }} }}"#
    )
    .unwrap();

    let path = file.path().to_string_lossy().to_string();
    let vars: HashMap<&str, String> = HashMap::from([
        (CONFIG_PATH_VAR, path),
        ("JWT_SECRET", "integration-secret-from-env".to_string()),
    ]);

    let config = AppConfig::load_with(|key| vars.get(key).cloned()).unwrap();
    let service = CredentialService::from_config(&config).unwrap();

    let stored = service.enroll("from-config").unwrap();
    assert_eq!(stored.cost(), Some(4));

    let response = service.authenticate("user-1", "from-config", &stored).unwrap();
    assert!(service.check_token(&response.token).unwrap().is_valid());
}

#[test]
fn test_missing_secret_fails_startup() {
    let err = AppConfig::load_with(|_| None).unwrap_err();
    assert!(matches!(err, AppError::ConfigError(_)));
}

#[tokio::test]
async fn test_expired_token_maps_to_unauthorized() {
    let (status, body) = error_response(AppError::token_expired()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn test_corrupt_hash_maps_to_server_error() {
    let service = CredentialService::from_config(&test_config()).unwrap();
    let err = service
        .authenticate("user-1", "secret", &StoredHash::new("$argon2id$broken"))
        .unwrap_err();

    let (status, body) = error_response(err).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "CORRUPT_HASH");
    assert!(body.get("details").is_none());
}

#[test]
fn test_cli_issue_and_validate_share_configuration() {
    let config = test_config();
    let mut output = Vec::new();

    let issue = Cli::try_parse_from(["micro-credential", "issue", "--subject", "ops"]).unwrap();
    let outcome = cli::run(&issue.command, &config, &mut Cursor::new(Vec::new()), &mut output).unwrap();
    assert_eq!(outcome, Outcome::Success);

    let token = String::from_utf8(output).unwrap();
    let mut report = Vec::new();
    let validate = Cli::try_parse_from(["micro-credential", "validate"]).unwrap();
    let outcome = cli::run(
        &validate.command,
        &config,
        &mut Cursor::new(token.into_bytes()),
        &mut report,
    )
    .unwrap();

    assert_eq!(outcome, Outcome::Success);
    let report: Value = serde_json::from_slice(&report).unwrap();
    assert_eq!(report["subject"], "ops");
}
