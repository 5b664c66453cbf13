//! Tests for session lifetime and secret rotation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::{SessionConfig, SessionId, SessionStore};

fn short_lived(timeout_secs: u64) -> std::sync::Arc<SessionStore> {
	SessionStore::new_with_config(SessionConfig {
		timeout: Duration::from_secs(timeout_secs),
	})
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn first_touch_creates_later_touches_refresh() {
	let store = SessionStore::new();
	let id = SessionId::generate();

	assert!(store.create_or_touch(&id));
	let secret = store.secret(&id).unwrap();
	assert_eq!(secret.as_str().len(), 64);

	tokio::time::advance(Duration::from_secs(30)).await;
	assert!(!store.create_or_touch(&id));
	assert_eq!(store.secret(&id), Some(secret));
	assert_eq!(store.age(&id), Some(Duration::from_secs(30)));
	assert_eq!(store.idle_time(&id), Some(Duration::ZERO));
	assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn rotation_invalidates_previous_secret() {
	let store = SessionStore::new();
	let id = SessionId::generate();
	store.create_or_touch(&id);

	let first = store.secret(&id).unwrap();
	let second = store.rotate(&id).unwrap();
	assert_ne!(first, second);
	assert_eq!(store.secret(&id), Some(second.clone()));

	let third = store.rotate(&id).unwrap();
	assert_ne!(second, third);
	assert_ne!(first, third);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn rotating_unknown_session_is_none() {
	let store = SessionStore::new();
	assert!(store.rotate(&SessionId::generate()).is_none());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn idle_session_expires() {
	let store = short_lived(60);
	let id = SessionId::generate();
	store.create_or_touch(&id);

	tokio::time::advance(Duration::from_secs(59)).await;
	assert!(store.secret(&id).is_some());

	// Reading the secret does not count as use; a touch does.
	assert!(!store.create_or_touch(&id));
	tokio::time::advance(Duration::from_secs(59)).await;
	assert!(store.secret(&id).is_some());

	tokio::time::advance(Duration::from_secs(2)).await;
	assert!(store.secret(&id).is_none());
	assert!(store.rotate(&id).is_none());
	assert!(store.is_empty());

	// The same id starts over as a new session.
	assert!(store.create_or_touch(&id));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn logout_destroys_session() {
	let store = SessionStore::new();
	let id = SessionId::generate();
	store.create_or_touch(&id);

	assert!(store.logout(&id));
	assert!(!store.logout(&id));
	assert!(store.secret(&id).is_none());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn purge_drops_only_expired_sessions() {
	let store = short_lived(60);
	let old = SessionId::generate();
	let fresh = SessionId::generate();
	store.create_or_touch(&old);

	tokio::time::advance(Duration::from_secs(45)).await;
	store.create_or_touch(&fresh);
	tokio::time::advance(Duration::from_secs(30)).await;

	assert_eq!(store.purge_expired(), 1);
	assert!(store.secret(&fresh).is_some());
	assert_eq!(store.purge_expired(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn sweeper_purges_until_shutdown() {
	let store = short_lived(10);
	let shutdown = CancellationToken::new();
	let sweeper = store.spawn_sweeper(Duration::from_secs(5), shutdown.clone());

	store.create_or_touch(&SessionId::generate());
	tokio::task::yield_now().await;

	tokio::time::sleep(Duration::from_secs(16)).await;
	assert!(store.is_empty());

	shutdown.cancel();
	sweeper.await.unwrap();
}
