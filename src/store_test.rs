use super::test_helpers::{login_response, test_store};
use super::*;
use crate::storage::MemoryStorage;

// =============================================================================
// login
// =============================================================================

#[test]
fn login_sets_user_tokens_and_mirrors() {
    let t = test_store();
    t.store.set_loading(true);
    t.store.login(&login_response("access-1", "refresh-1"));

    let session = t.store.snapshot();
    assert!(session.is_authenticated());
    assert!(!session.is_loading);
    assert_eq!(session.user.as_ref().map(|u| u.email.as_str()), Some("a@b.com"));
    assert_eq!(session.access_token(), Some("access-1"));
    assert_eq!(session.refresh_token(), Some("refresh-1"));

    assert_eq!(t.store.cookie().token().as_deref(), Some("access-1"));
    let record = t.storage.load().unwrap().unwrap();
    assert_eq!(record.access_token.as_deref(), Some("access-1"));
    assert!(record.is_authenticated);
}

// =============================================================================
// logout
// =============================================================================

#[test]
fn logout_clears_everything_and_navigates() {
    let t = test_store();
    t.store.login(&login_response("access-1", "refresh-1"));
    t.store.logout();

    assert_eq!(t.store.snapshot(), Session::default());
    assert!(t.store.access_token().is_none());
    assert!(t.store.refresh_token().is_none());
    assert!(t.store.cookie().token().is_none());
    assert!(t.storage.load().unwrap().is_none());
    assert_eq!(t.navigator.visits(), vec!["/login".to_owned()]);
}

#[test]
fn logout_twice_only_navigates_again() {
    let t = test_store();
    t.store.logout();
    t.store.logout();
    assert!(!t.store.is_authenticated());
    assert_eq!(t.navigator.visits().len(), 2);
}

// =============================================================================
// set_tokens / set_loading
// =============================================================================

#[test]
fn set_tokens_keeps_user() {
    let t = test_store();
    t.store.login(&login_response("access-1", "refresh-1"));
    assert!(t.store.set_tokens("access-2", "refresh-1"));

    assert_eq!(t.store.access_token().as_deref(), Some("access-2"));
    assert_eq!(t.store.refresh_token().as_deref(), Some("refresh-1"));
    assert_eq!(t.store.user().map(|u| u.full_name), Some("Ana B".to_owned()));
    assert_eq!(t.store.cookie().token().as_deref(), Some("access-2"));
    assert_eq!(t.storage.load().unwrap().unwrap().access_token.as_deref(), Some("access-2"));
}

#[test]
fn set_tokens_without_session_is_rejected() {
    let t = test_store();
    assert!(!t.store.set_tokens("access-2", "refresh-2"));
    assert!(!t.store.is_authenticated());
    assert!(t.store.cookie().token().is_none());
}

#[test]
fn set_loading_does_not_authenticate() {
    let t = test_store();
    t.store.set_loading(true);
    assert!(t.store.is_loading());
    assert!(!t.store.is_authenticated());
    t.store.set_loading(false);
    assert!(!t.store.is_loading());
}

// =============================================================================
// restore
// =============================================================================

fn store_with_record(record: PersistedSession) -> (SessionStore, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::with_record(record));
    let store = SessionStore::new(
        storage.clone(),
        Arc::new(CookieMirror::new(3600)),
        Arc::new(test_helpers::RecordingNavigator::default()),
    );
    (store, storage)
}

#[test]
fn restore_picks_up_persisted_session() {
    let (store, _) = store_with_record(PersistedSession {
        user: Some(User { email: "a@b.com".into(), full_name: "Ana B".into(), role: "admin".into() }),
        access_token: Some("access".into()),
        refresh_token: Some("refresh".into()),
        is_authenticated: true,
    });
    assert!(store.restore());
    assert!(store.is_authenticated());
    assert_eq!(store.cookie().token().as_deref(), Some("access"));
}

#[test]
fn restore_discards_unpaired_token() {
    let (store, storage) = store_with_record(PersistedSession {
        user: None,
        access_token: Some("access".into()),
        refresh_token: None,
        is_authenticated: true,
    });
    assert!(!store.restore());
    assert!(!store.is_authenticated());
    assert!(storage.load().unwrap().is_none());
}

#[test]
fn restore_with_empty_storage_stays_logged_out() {
    let t = test_store();
    assert!(!t.store.restore());
    assert!(!t.store.is_authenticated());
}

// =============================================================================
// subscribe
// =============================================================================

#[tokio::test]
async fn subscribers_see_token_changes() {
    let t = test_store();
    let mut rx = t.store.subscribe();
    t.store.login(&login_response("access-1", "refresh-1"));
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().access_token(), Some("access-1"));

    t.store.logout();
    rx.changed().await.unwrap();
    assert!(!rx.borrow_and_update().is_authenticated());
}
