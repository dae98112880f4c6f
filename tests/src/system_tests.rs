use app_authentication::{
    BcryptHasher, CredentialServiceTrait, PasswordHasher, TokenStatus, verify_password,
};
use app_error::AppError;
use app_test::{TEST_COST, test_authenticator, test_service};
use chrono::Duration;
use std::sync::Arc;
use tokio::task::JoinSet;

#[test]
fn test_password_round_trip() {
    let hasher = BcryptHasher::default();
    let stored = hasher
        .hash(b"correct horse battery staple", 10)
        .expect("hashing should succeed");

    assert!(verify_password(b"correct horse battery staple", &stored).unwrap());
    assert!(!verify_password(b"wrong password", &stored).unwrap());
}

#[test]
fn test_token_round_trip() {
    let authenticator = test_authenticator();
    let token = authenticator
        .issue("user-42", Duration::seconds(3600))
        .unwrap();

    let validation = authenticator.validate(&token).unwrap();
    assert_eq!(validation.subject.as_deref(), Some("user-42"));
    assert!(validation.is_valid());
}

#[test]
fn test_register_login_check_flow() {
    let service = test_service();

    // Registration stores only the hash and signs the user in
    let registered = service.register("user-42", "s3cret-passphrase").unwrap();
    let stored = registered.stored;
    assert!(!stored.as_str().contains("s3cret-passphrase"));
    assert!(service.check_token(&registered.token).unwrap().is_valid());

    // Login
    let response = service
        .authenticate("user-42", "s3cret-passphrase", &stored)
        .unwrap();
    assert!(response.expires_at > chrono::Utc::now());

    // Request check
    let validation = service.check_token(&response.token).unwrap();
    assert!(validation.is_valid());
    assert_eq!(validation.subject.as_deref(), Some("user-42"));

    // Failed login
    let err = service
        .authenticate("user-42", "guess", &stored)
        .unwrap_err();
    assert!(matches!(err, AppError::AuthenticationError(_)));
}

#[test]
fn test_token_from_other_deployment_rejected() {
    let service = test_service();
    let other = app_authentication::TokenAuthenticator::new(b"another-secret", Duration::hours(1));

    let token = other.issue("user-42", Duration::hours(1)).unwrap();
    let validation = service.check_token(&token).unwrap();
    assert_eq!(validation.status, TokenStatus::InvalidSignature);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_validation() {
    let service = test_service();
    let mut tasks = JoinSet::new();

    for i in 0..32 {
        let service = Arc::clone(&service);
        tasks.spawn(async move {
            let subject = format!("user-{}", i);
            let token = service
                .get_token_authenticator()
                .issue(&subject, Duration::minutes(5))
                .unwrap();

            let validation = service.check_token(&token).unwrap();
            assert!(validation.is_valid());
            assert_eq!(validation.subject, Some(subject));

            let garbage = service.check_token("not.a.token").unwrap();
            assert!(!garbage.is_valid());
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.expect("validation task panicked");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verify() {
    let service = test_service();
    let stored = Arc::new(service.enroll("shared-secret").unwrap());
    let mut tasks = JoinSet::new();

    for i in 0..8 {
        let service = Arc::clone(&service);
        let stored = Arc::clone(&stored);
        // hashing is CPU bound; keep it off the async workers
        tasks.spawn_blocking(move || {
            let secret = if i % 2 == 0 { "shared-secret" } else { "other-secret" };
            let matched = service.hasher().verify(secret.as_bytes(), &stored).unwrap();
            assert_eq!(matched, i % 2 == 0);
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.expect("verify task panicked");
    }

    assert_eq!(service.cost(), TEST_COST);
}
