//! End-to-end session scenarios against the service layer

use std::sync::Arc;

use crate::core::auth::{
    AuthError, AuthGate, BcryptVerifier, LoginRequest, RefreshOutcome, RegisterRequest,
    SessionService, TokenClass, TokenCodec, TokenConfig, TokenIssuer,
};
use crate::core::db::repositories::InMemoryUserRepository;

fn setup_with(config: TokenConfig) -> (SessionService, AuthGate) {
    let codec = TokenCodec::new(config);
    let service = SessionService::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(BcryptVerifier::new(4)),
        TokenIssuer::new(codec.clone()),
    );
    (service, AuthGate::new(codec))
}

fn setup() -> (SessionService, AuthGate) {
    setup_with(TokenConfig::new("scenario_access", "scenario_refresh"))
}

fn alice(password: &str) -> (RegisterRequest, LoginRequest) {
    (
        RegisterRequest {
            email: "alice@example.com".to_string(),
            password: password.to_string(),
        },
        LoginRequest {
            email: "alice@example.com".to_string(),
            password: password.to_string(),
        },
    )
}

// ============================================================================
// Full Session Scenario
// ============================================================================

#[tokio::test]
async fn test_register_login_rotate_replay() {
    let (service, gate) = setup();
    let (register, login) = alice("pw123");

    let user = service.register(register).await.unwrap();
    assert_eq!(user.email, "alice@example.com");

    let wrong = service.login(alice("wrong").1).await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

    let session = service.login(login).await.unwrap();
    assert_eq!(gate.authenticate(&session.tokens.access_token).unwrap(), user.id);

    let RefreshOutcome::Rotated(rotated) = service
        .refresh(Some(&session.tokens.refresh_token))
        .await
        .unwrap()
    else {
        panic!("expected rotation");
    };
    assert_ne!(rotated.refresh_token, session.tokens.refresh_token);
    assert_eq!(gate.authenticate(&rotated.access_token).unwrap(), user.id);

    let replay = service
        .refresh(Some(&session.tokens.refresh_token))
        .await
        .unwrap();
    assert_eq!(replay.access_token(), "");
}

#[tokio::test]
async fn test_refresh_token_never_opens_the_gate() {
    let (service, gate) = setup();
    let (register, login) = alice("pw123");
    service.register(register).await.unwrap();

    let session = service.login(login).await.unwrap();

    assert!(matches!(
        gate.authenticate(&session.tokens.refresh_token),
        Err(AuthError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_expired_access_token_is_unauthorized() {
    let (service, gate) = setup_with(
        TokenConfig::new("scenario_access", "scenario_refresh").access_token_expiration(-1),
    );
    let (register, login) = alice("pw123");
    service.register(register).await.unwrap();

    let session = service.login(login).await.unwrap();

    assert!(matches!(
        gate.authenticate(&session.tokens.access_token),
        Err(AuthError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_expired_refresh_token_is_no_session() {
    let (service, _) = setup_with(
        TokenConfig::new("scenario_access", "scenario_refresh").refresh_token_expiration(-1),
    );
    let (register, login) = alice("pw123");
    service.register(register).await.unwrap();

    let session = service.login(login).await.unwrap();
    let outcome = service
        .refresh(Some(&session.tokens.refresh_token))
        .await
        .unwrap();

    assert!(matches!(outcome, RefreshOutcome::NoSession));
}

#[tokio::test]
async fn test_rotated_access_tokens_carry_the_subject() {
    let (service, _) = setup();
    let (register, login) = alice("pw123");
    let user = service.register(register).await.unwrap();
    let session = service.login(login).await.unwrap();

    let RefreshOutcome::Rotated(rotated) = service
        .refresh(Some(&session.tokens.refresh_token))
        .await
        .unwrap()
    else {
        panic!("expected rotation");
    };

    let claims = service
        .codec()
        .decode(&rotated.refresh_token, TokenClass::Refresh)
        .unwrap();
    assert_eq!(claims.subject_id().unwrap(), user.id);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_only_one_wins() {
    let (service, _) = setup();
    let (register, login) = alice("pw123");
    service.register(register).await.unwrap();
    let session = service.login(login).await.unwrap();
    let token = session.tokens.refresh_token;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let token = token.clone();
        handles.push(tokio::spawn(
            async move { service.refresh(Some(&token)).await },
        ));
    }

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(RefreshOutcome::Rotated(tokens)) => winners.push(tokens),
            Ok(RefreshOutcome::NoSession) | Err(AuthError::Busy) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(winners.len(), 1);

    // The winner's token is the live one
    let next = service
        .refresh(Some(&winners[0].refresh_token))
        .await
        .unwrap();
    assert!(matches!(next, RefreshOutcome::Rotated(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_same_email() {
    let (service, _) = setup();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.register(alice("pw123").0).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AuthError::UserAlreadyExists) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(created, 1);
}
