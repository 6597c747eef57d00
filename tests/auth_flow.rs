//! End-to-end auth flows against the in-memory session store and repository

use folio_auth::session::{session_key, user_cache_key};
use folio_auth::token::TokenIssuer;
use folio_auth::{
    AuthConfig, AuthError, AuthService, Credentials, InMemorySessionStore,
    InMemoryUserRepository, SessionStore, StoreError, TokenClaims, TokenKind, UpdateUserRequest,
};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

fn config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "access-secret-access-secret-0123".to_string(),
        jwt_refresh_secret: "refresh-secret-refresh-secret-01".to_string(),
        access_token_max_age: 300,
        refresh_token_max_age: 3600,
        cookie_secure: false,
        cookie_http_only: true,
        store_timeout_ms: 50,
        bulk_delete_timeout_ms: 5000,
        min_password_length: 6,
        max_password_length: 250,
        user_cache_ttl: 3600,
        argon2_memory_cost: 256,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
    }
}

fn setup() -> (AuthService, Arc<InMemorySessionStore>) {
    let store = Arc::new(InMemorySessionStore::new());
    let service = AuthService::new(
        config(),
        Arc::new(InMemoryUserRepository::new()),
        store.clone(),
    )
    .unwrap();
    (service, store)
}

/// Session store that can be taken down mid-test.
///
/// Every call yields once so concurrent requests interleave.
#[derive(Default)]
struct FlakyStore {
    inner: InMemorySessionStore,
    down: AtomicBool,
    stall: AtomicBool,
    scan_down: AtomicBool,
    slow_scan: AtomicBool,
}

impl FlakyStore {
    async fn check(&self) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check().await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check().await?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        self.check().await?;
        self.inner.delete(keys).await
    }

    async fn delete_by_prefix(&self, pattern: &str) -> Result<usize, StoreError> {
        self.check().await?;
        if self.scan_down.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("scan aborted".to_string()));
        }
        if self.slow_scan.load(Ordering::SeqCst) {
            // Several SCAN pages, each well inside the single-call timeout
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
        }
        self.inner.delete_by_prefix(pattern).await
    }
}

fn setup_flaky() -> (AuthService, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    let service = AuthService::new(
        config(),
        Arc::new(InMemoryUserRepository::new()),
        store.clone(),
    )
    .unwrap();
    (service, store)
}

#[tokio::test]
async fn login_authorize_logout_round_trip() {
    let (service, _) = setup();
    service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    let auth = assert_ok!(
        service
            .login(Credentials::new("a@test.com", "secret123"))
            .await
    );

    let ctx = assert_ok!(
        service
            .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
            .await
    );
    assert_eq!(ctx.user_id, auth.user.id);
    assert_eq!(ctx.access_id, auth.access_id);
    assert_eq!(ctx.refresh_id, auth.refresh_id);

    assert_ok!(service.logout(&ctx).await);

    let err = assert_err!(
        service
            .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
            .await
    );
    assert_eq!(err, AuthError::Unauthorized);
}

#[tokio::test]
async fn login_pair_ids_are_distinct_and_owned_by_user() {
    let (service, store) = setup();
    let auth = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    assert_ne!(auth.access_id, auth.refresh_id);

    let owner = Some(auth.user.id.to_string());
    assert_eq!(
        store
            .get(&session_key(auth.user.id, auth.access_id))
            .await
            .unwrap(),
        owner
    );
    assert_eq!(
        store
            .get(&session_key(auth.user.id, auth.refresh_id))
            .await
            .unwrap(),
        owner
    );
}

#[tokio::test]
async fn tampered_token_is_rejected_with_live_session() {
    let (service, _) = setup();
    let auth = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    let (body, signature) = auth.access_token.rsplit_once('.').unwrap();
    let flipped = if signature.starts_with('A') { "B" } else { "A" };
    let tampered = format!("{}.{}{}", body, flipped, &signature[1..]);

    assert_eq!(
        service
            .authorize(Some(&tampered), Some(&auth.refresh_token))
            .await,
        Err(AuthError::Unauthorized)
    );
    // The untouched pair is still good
    assert_ok!(
        service
            .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
            .await
    );
}

#[tokio::test]
async fn expired_token_is_rejected_with_live_session() {
    let (service, store) = setup();
    let auth = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    let issuer = TokenIssuer::new(&config());
    let expired = TokenClaims {
        id: Uuid::new_v4(),
        user_id: auth.user.id,
        exp: Utc::now().timestamp() - 1,
    };
    let token = issuer.sign(&expired, TokenKind::Access).unwrap();
    store
        .set(
            &session_key(auth.user.id, expired.id),
            &auth.user.id.to_string(),
            Duration::from_secs(600),
        )
        .await
        .unwrap();

    assert_eq!(
        service
            .authorize(Some(&token), Some(&auth.refresh_token))
            .await,
        Err(AuthError::Unauthorized)
    );
}

#[tokio::test]
async fn logout_deletes_exactly_the_presented_pair() {
    let (service, store) = setup();
    let first = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();
    let second = service
        .login(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    let ctx = service
        .authorize(Some(&first.access_token), Some(&first.refresh_token))
        .await
        .unwrap();
    service.logout(&ctx).await.unwrap();

    let uid = first.user.id;
    assert_eq!(
        store.get(&session_key(uid, first.access_id)).await.unwrap(),
        None
    );
    assert_eq!(
        store.get(&session_key(uid, first.refresh_id)).await.unwrap(),
        None
    );

    // The other device is untouched
    assert_ok!(
        service
            .authorize(Some(&second.access_token), Some(&second.refresh_token))
            .await
    );
}

#[tokio::test]
async fn logout_all_revokes_earlier_sessions_only() {
    let (service, store) = setup();
    let laptop = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();
    let phone = service
        .login(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();
    let other = service
        .register(Credentials::new("b@test.com", "secret123"))
        .await
        .unwrap();

    let deleted = service.logout_all(laptop.user.id).await.unwrap();
    assert_eq!(deleted, 4);

    for auth in [&laptop, &phone] {
        assert_eq!(
            service
                .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
                .await,
            Err(AuthError::Unauthorized)
        );
    }
    assert_ok!(
        service
            .authorize(Some(&other.access_token), Some(&other.refresh_token))
            .await
    );

    let prefix = format!("auth:{}:", laptop.user.id);
    assert!(!store.keys().await.iter().any(|k| k.starts_with(&prefix)));

    let fresh = service
        .login(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();
    assert_ok!(
        service
            .authorize(Some(&fresh.access_token), Some(&fresh.refresh_token))
            .await
    );
}

#[tokio::test]
async fn refresh_rotates_the_pair() {
    let (service, store) = setup();
    let old = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    let new = assert_ok!(service.refresh(Some(&old.refresh_token)).await);

    assert_eq!(new.user.id, old.user.id);
    assert_ne!(new.access_id, old.access_id);
    assert_ne!(new.refresh_id, old.refresh_id);
    assert_eq!(
        store
            .get(&session_key(old.user.id, old.refresh_id))
            .await
            .unwrap(),
        None
    );

    // The consumed refresh token cannot be replayed
    assert_eq!(
        service.refresh(Some(&old.refresh_token)).await.unwrap_err(),
        AuthError::Unauthorized
    );

    assert_ok!(
        service
            .authorize(Some(&new.access_token), Some(&new.refresh_token))
            .await
    );

    // Old access entry lives on until its own expiry
    assert!(store
        .get(&session_key(old.user.id, old.access_id))
        .await
        .unwrap()
        .is_some());
    assert_ok!(
        service
            .authorize(Some(&old.access_token), Some(&new.refresh_token))
            .await
    );
}

#[tokio::test]
async fn refresh_requires_a_refresh_token() {
    let (service, _) = setup();
    let auth = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    assert_eq!(
        service.refresh(None).await.unwrap_err(),
        AuthError::Unauthorized
    );
    assert_eq!(
        service.refresh(Some(&auth.access_token)).await.unwrap_err(),
        AuthError::Unauthorized
    );
}

#[tokio::test]
async fn concurrent_refresh_of_one_token_has_a_single_winner() {
    let (service, store) = setup_flaky();
    let old = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        service.refresh(Some(&old.refresh_token)),
        service.refresh(Some(&old.refresh_token)),
    );

    let (winner, loser) = match (first, second) {
        (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
        (first, second) => panic!("expected one winner, got {:?} and {:?}", first, second),
    };
    assert_eq!(loser, AuthError::Unauthorized);

    // Old access entry plus the winning pair; the losing pair was revoked
    let prefix = format!("auth:{}:", old.user.id);
    let mut live: Vec<String> = store
        .inner
        .keys()
        .await
        .into_iter()
        .filter(|k| k.starts_with(&prefix))
        .collect();
    live.sort();
    let mut expected = vec![
        session_key(old.user.id, old.access_id),
        session_key(old.user.id, winner.access_id),
        session_key(old.user.id, winner.refresh_id),
    ];
    expected.sort();
    assert_eq!(live, expected);

    assert_ok!(
        service
            .authorize(Some(&winner.access_token), Some(&winner.refresh_token))
            .await
    );
    assert_eq!(
        service.refresh(Some(&old.refresh_token)).await.unwrap_err(),
        AuthError::Unauthorized
    );
}

#[tokio::test]
async fn authorization_fails_closed_when_store_is_down() {
    let (service, store) = setup_flaky();
    let auth = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    store.down.store(true, Ordering::SeqCst);
    assert_eq!(
        service
            .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
            .await,
        Err(AuthError::Unauthorized)
    );
    assert_eq!(
        service.refresh(Some(&auth.refresh_token)).await.unwrap_err(),
        AuthError::Unauthorized
    );

    // Issuance refuses to hand out tokens it could not record
    assert_eq!(
        service
            .login(Credentials::new("a@test.com", "secret123"))
            .await
            .unwrap_err(),
        AuthError::Internal
    );
}

#[tokio::test]
async fn authorization_fails_fast_when_store_stalls() {
    let (service, store) = setup_flaky();
    let auth = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    store.stall.store(true, Ordering::SeqCst);
    let started = std::time::Instant::now();
    assert_eq!(
        service
            .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
            .await,
        Err(AuthError::Unauthorized)
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn deleting_account_revokes_every_session() {
    let (service, store) = setup();
    let auth = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();
    let other_device = service
        .login(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();
    let ctx = service
        .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
        .await
        .unwrap();

    assert_ok!(service.delete_user(&ctx, auth.user.id).await);

    assert_eq!(
        service
            .authorize(
                Some(&other_device.access_token),
                Some(&other_device.refresh_token)
            )
            .await,
        Err(AuthError::Unauthorized)
    );
    assert_eq!(
        store.get(&user_cache_key(auth.user.id)).await.unwrap(),
        None
    );
    assert_eq!(
        service.get_user(auth.user.id).await.unwrap_err(),
        AuthError::NotFound
    );
    assert_eq!(
        service
            .login(Credentials::new("a@test.com", "secret123"))
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
}

#[tokio::test]
async fn failed_revocation_keeps_the_account() {
    let (service, store) = setup_flaky();
    let auth = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();
    let ctx = service
        .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
        .await
        .unwrap();

    store.scan_down.store(true, Ordering::SeqCst);
    assert_eq!(
        service.delete_user(&ctx, auth.user.id).await.unwrap_err(),
        AuthError::Internal
    );

    // Nothing was removed, so the user can retry
    assert_ok!(service.get_user(auth.user.id).await);
    assert_ok!(
        service
            .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
            .await
    );
    assert_ok!(
        service
            .login(Credentials::new("a@test.com", "secret123"))
            .await
    );

    store.scan_down.store(false, Ordering::SeqCst);
    assert_ok!(service.delete_user(&ctx, auth.user.id).await);
    assert_eq!(
        service.get_user(auth.user.id).await.unwrap_err(),
        AuthError::NotFound
    );
    assert_eq!(
        service
            .authorize(Some(&auth.access_token), Some(&auth.refresh_token))
            .await,
        Err(AuthError::Unauthorized)
    );
}

#[tokio::test]
async fn logout_all_outlasts_the_single_call_timeout() {
    let (service, store) = setup_flaky();
    let auth = service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();
    let other_device = service
        .login(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    store.slow_scan.store(true, Ordering::SeqCst);
    assert_eq!(service.logout_all(auth.user.id).await, Ok(4));

    for session in [&auth, &other_device] {
        assert_eq!(
            service
                .authorize(Some(&session.access_token), Some(&session.refresh_token))
                .await,
            Err(AuthError::Unauthorized)
        );
    }
}

#[tokio::test]
async fn oversized_login_password_is_invalid_credentials() {
    let (service, _) = setup();
    service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();

    assert_eq!(
        service
            .login(Credentials::new("a@test.com", "x".repeat(251)))
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
}

#[tokio::test]
async fn users_can_only_change_themselves() {
    let (service, _) = setup();
    let alice = service
        .register(Credentials::new("alice@test.com", "secret123"))
        .await
        .unwrap();
    let bob = service
        .register(Credentials::new("bob@test.com", "secret123"))
        .await
        .unwrap();
    let ctx = service
        .authorize(Some(&alice.access_token), Some(&alice.refresh_token))
        .await
        .unwrap();

    let update = UpdateUserRequest {
        email: "mallory@test.com".to_string(),
        password: None,
    };
    assert_eq!(
        service
            .update_user(&ctx, bob.user.id, update)
            .await
            .unwrap_err(),
        AuthError::Forbidden
    );
    assert_eq!(
        service.delete_user(&ctx, bob.user.id).await.unwrap_err(),
        AuthError::Forbidden
    );

    assert_eq!(
        service.get_user(bob.user.id).await.unwrap().email,
        "bob@test.com"
    );
}

#[tokio::test]
async fn list_users_never_exposes_hashes() {
    let (service, _) = setup();
    service
        .register(Credentials::new("a@test.com", "secret123"))
        .await
        .unwrap();
    service
        .register(Credentials::new("b@test.com", "secret123"))
        .await
        .unwrap();

    let list = service.list_users().await.unwrap();
    assert_eq!(list.total_count, 2);

    let json = serde_json::to_string(&list).unwrap();
    assert!(!json.contains("argon2"));
    assert!(!json.contains("password"));
}
