use std::time::Duration;

use super::*;
use crate::net::types::AuthChangeEvent;
use crate::test_helpers::{GOOD_PASSWORD, MockIdentity, test_session, test_user};

fn store_with(mock: MockIdentity) -> (Arc<MockIdentity>, AuthStore) {
    let mock = Arc::new(mock);
    let store = AuthStore::new(mock.clone());
    (mock, store)
}

/// Wait until the listener has applied the next write.
async fn next_change(rx: &mut watch::Receiver<AuthState>) {
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .expect("no state change within 1s")
        .expect("store dropped");
}

// =============================================================================
// AuthState
// =============================================================================

#[test]
fn initial_state_is_loading_without_user() {
    let state = AuthState::default();
    assert!(state.loading);
    assert!(state.user.is_none());
    assert!(!state.is_authenticated());
}

#[test]
fn authenticated_iff_user_present() {
    let state = AuthState { user: Some(test_user("a@b.com")), loading: false };
    assert!(state.is_authenticated());
    let state = AuthState { user: None, loading: false };
    assert!(!state.is_authenticated());
}

// =============================================================================
// refresh
// =============================================================================

#[tokio::test]
async fn refresh_with_no_session_clears_loading() {
    let (mock, store) = store_with(MockIdentity::new());
    assert!(store.is_loading());

    store.refresh().await;
    assert!(!store.is_loading());
    assert!(!store.is_authenticated());
    assert_eq!(mock.current_user_calls(), 1);
}

#[tokio::test]
async fn refresh_picks_up_existing_session() {
    let (_mock, store) = store_with(MockIdentity::with_user("a@b.com"));
    store.refresh().await;
    assert!(store.is_authenticated());
    assert_eq!(store.user().and_then(|u| u.email), Some("a@b.com".to_owned()));
}

#[tokio::test]
async fn refresh_failure_fails_closed() {
    let (mock, store) = store_with(MockIdentity::with_user("a@b.com"));
    store.refresh().await;
    assert!(store.is_authenticated());

    mock.set_fail_current_user(true);
    store.refresh().await;
    assert!(!store.is_loading());
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn refresh_with_malformed_response_fails_closed() {
    let (mock, store) = store_with(MockIdentity::with_user("a@b.com"));
    store.refresh().await;
    assert!(store.is_authenticated());

    mock.set_malformed_current_user(true);
    store.refresh().await;
    assert!(!store.is_loading());
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn refresh_sets_loading_while_in_flight() {
    let (_mock, store) = store_with(MockIdentity::new());
    store.refresh().await;
    let mut rx = store.subscribe();
    rx.borrow_and_update();

    let refresh = store.refresh();
    tokio::pin!(refresh);
    // First poll runs up to the provider's yield point.
    assert!(poll_once(refresh.as_mut()).await.is_none());
    assert!(rx.borrow_and_update().loading);

    refresh.await;
    assert!(!store.is_loading());
}

#[tokio::test]
async fn concurrent_refreshes_converge() {
    let (mock, store) = store_with(MockIdentity::with_user("a@b.com"));
    tokio::join!(store.refresh(), store.refresh(), store.refresh());
    assert_eq!(mock.current_user_calls(), 3);
    assert!(!store.is_loading());
    assert!(store.is_authenticated());
}

async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
    let mut fut = fut;
    std::future::poll_fn(|cx| match std::pin::Pin::new(&mut fut).poll(cx) {
        std::task::Poll::Ready(out) => std::task::Poll::Ready(Some(out)),
        std::task::Poll::Pending => std::task::Poll::Ready(None),
    })
    .await
}

// =============================================================================
// sign_in / sign_up
// =============================================================================

#[tokio::test]
async fn sign_in_authenticates_without_refresh() {
    let (mock, store) = store_with(MockIdentity::new());
    let resp = store.sign_in(&Credentials::new("a@b.com", GOOD_PASSWORD)).await.unwrap();

    assert!(resp.session.is_some());
    assert!(store.is_authenticated());
    assert_eq!(mock.current_user_calls(), 0);
}

#[tokio::test]
async fn sign_in_rejection_leaves_state_untouched() {
    let (_mock, store) = store_with(MockIdentity::new());
    store.refresh().await;
    let before = store.snapshot();

    let err = store.sign_in(&Credentials::new("a@b.com", "bad")).await.unwrap_err();
    assert!(matches!(err, IdentityError::Api { status: 400, .. }));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn sign_in_rejection_keeps_previous_user() {
    let (_mock, store) = store_with(MockIdentity::new());
    store.sign_in(&Credentials::new("a@b.com", GOOD_PASSWORD)).await.unwrap();

    assert!(store.sign_in(&Credentials::new("c@d.com", "bad")).await.is_err());
    assert_eq!(store.user().and_then(|u| u.email), Some("a@b.com".to_owned()));
}

#[tokio::test]
async fn sign_up_authenticates() {
    let (_mock, store) = store_with(MockIdentity::new());
    store.sign_up(&Credentials::new("new@b.com", GOOD_PASSWORD)).await.unwrap();
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn sign_up_rejection_propagates() {
    let (_mock, store) = store_with(MockIdentity::new());
    let err = store.sign_up(&Credentials::new("taken@b.com", GOOD_PASSWORD)).await.unwrap_err();
    assert!(err.is_rejection());
    assert!(!store.is_authenticated());
}

// =============================================================================
// sign_out / update_password
// =============================================================================

#[tokio::test]
async fn sign_out_clears_user() {
    let (_mock, store) = store_with(MockIdentity::new());
    store.sign_in(&Credentials::new("a@b.com", GOOD_PASSWORD)).await.unwrap();

    store.sign_out().await.unwrap();
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn sign_out_failure_keeps_user() {
    let (mock, store) = store_with(MockIdentity::new());
    store.sign_in(&Credentials::new("a@b.com", GOOD_PASSWORD)).await.unwrap();
    mock.set_fail_sign_out(true);

    assert!(store.sign_out().await.is_err());
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn update_password_does_not_touch_identity() {
    let (_mock, store) = store_with(MockIdentity::new());
    store.sign_in(&Credentials::new("a@b.com", GOOD_PASSWORD)).await.unwrap();
    let before = store.snapshot();

    let user = store.update_password("longer-secret").await.unwrap();
    assert_eq!(user.email.as_deref(), Some("a@b.com"));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn update_password_errors_propagate() {
    let (_mock, store) = store_with(MockIdentity::new());
    assert!(matches!(store.update_password("longer-secret").await, Err(IdentityError::NoSession)));

    store.sign_in(&Credentials::new("a@b.com", GOOD_PASSWORD)).await.unwrap();
    assert!(store.update_password("abc").await.unwrap_err().is_rejection());
}

// =============================================================================
// change notifications
// =============================================================================

#[tokio::test]
async fn notification_with_session_sets_user() {
    let (mock, store) = store_with(MockIdentity::new());
    let mut rx = store.subscribe();

    mock.emit(AuthChangeEvent::SignedIn, Some(test_session(test_user("elsewhere@b.com"))));
    next_change(&mut rx).await;

    assert!(store.is_authenticated());
    assert_eq!(store.user().map(|u| u.id), Some("id-elsewhere@b.com".to_owned()));
}

#[tokio::test]
async fn notification_without_session_clears_user() {
    let (mock, store) = store_with(MockIdentity::new());
    store.sign_in(&Credentials::new("a@b.com", GOOD_PASSWORD)).await.unwrap();
    let mut rx = store.subscribe();
    rx.borrow_and_update();

    mock.emit(AuthChangeEvent::SignedOut, None);
    next_change(&mut rx).await;

    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn notifications_apply_in_order_last_writer_wins() {
    let (mock, store) = store_with(MockIdentity::new());
    let mut rx = store.subscribe();

    mock.emit(AuthChangeEvent::SignedIn, Some(test_session(test_user("first@b.com"))));
    mock.emit(AuthChangeEvent::TokenRefreshed, Some(test_session(test_user("second@b.com"))));
    mock.emit(AuthChangeEvent::UserUpdated, Some(test_session(test_user("third@b.com"))));

    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            rx.changed().await.unwrap();
            if rx.borrow_and_update().user.as_ref().and_then(|u| u.email.as_deref()) == Some("third@b.com") {
                break;
            }
        }
    })
    .await
    .expect("last notification never applied");
}

#[tokio::test]
async fn notification_does_not_touch_loading() {
    let (mock, store) = store_with(MockIdentity::new());
    let mut rx = store.subscribe();

    mock.emit(AuthChangeEvent::InitialSession, Some(test_session(test_user("a@b.com"))));
    next_change(&mut rx).await;

    assert!(store.is_loading());
    assert!(store.is_authenticated());
}
