//! Session table.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::RngCore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identifies one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
	/// Generates a fresh random session id.
	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl FromStr for SessionId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s).map(Self)
	}
}

/// Shared secret for the next authenticated call of a session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(String);

impl SessionSecret {
	fn generate() -> Self {
		let mut bytes = [0u8; 32];
		rand::rngs::OsRng.fill_bytes(&mut bytes);
		Self(hex::encode(bytes))
	}

	/// Secret as transmitted to the client.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for SessionSecret {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SessionSecret(<redacted>)")
	}
}

/// Session store configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Idle time after which a session is destroyed.
	pub timeout: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			timeout: Duration::from_secs(15 * 60),
		}
	}
}

struct Session {
	secret: SessionSecret,
	created_at: Instant,
	last_touched_at: Instant,
	expires_at: Instant,
}

/// Table of live sessions.
pub struct SessionStore {
	sessions: Mutex<HashMap<SessionId, Session>>,
	config: SessionConfig,
}

impl fmt::Debug for SessionStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionStore")
			.field("sessions", &self.sessions.lock().len())
			.field("config", &self.config)
			.finish()
	}
}

impl SessionStore {
	/// Creates a store with the default idle timeout.
	pub fn new() -> Arc<Self> {
		Self::new_with_config(SessionConfig::default())
	}

	/// Creates a store with a custom configuration.
	pub fn new_with_config(config: SessionConfig) -> Arc<Self> {
		Arc::new(Self {
			sessions: Mutex::new(HashMap::new()),
			config,
		})
	}

	/// Creates the session if it does not exist (or has expired) and returns
	/// `true`; otherwise refreshes its idle deadline and returns `false`.
	pub fn create_or_touch(&self, id: &SessionId) -> bool {
		let now = Instant::now();
		let mut sessions = self.sessions.lock();
		if let Some(session) = live_entry(&mut sessions, id, now) {
			session.last_touched_at = now;
			session.expires_at = now + self.config.timeout;
			return false;
		}

		sessions.insert(
			*id,
			Session {
				secret: SessionSecret::generate(),
				created_at: now,
				last_touched_at: now,
				expires_at: now + self.config.timeout,
			},
		);
		tracing::info!(session = %id, "session created");
		true
	}

	/// Replaces the secret of a live session and returns the new one.
	pub fn rotate(&self, id: &SessionId) -> Option<SessionSecret> {
		let mut sessions = self.sessions.lock();
		let session = live_entry(&mut sessions, id, Instant::now())?;
		session.secret = SessionSecret::generate();
		Some(session.secret.clone())
	}

	/// Current secret of a live session.
	pub fn secret(&self, id: &SessionId) -> Option<SessionSecret> {
		let mut sessions = self.sessions.lock();
		live_entry(&mut sessions, id, Instant::now()).map(|s| s.secret.clone())
	}

	/// Destroys a session. Returns `true` if it was live.
	pub fn logout(&self, id: &SessionId) -> bool {
		let mut sessions = self.sessions.lock();
		let live = live_entry(&mut sessions, id, Instant::now()).is_some();
		sessions.remove(id);
		if live {
			tracing::info!(session = %id, "session logged out");
		}
		live
	}

	/// Time since a live session was created.
	pub fn age(&self, id: &SessionId) -> Option<Duration> {
		let now = Instant::now();
		let mut sessions = self.sessions.lock();
		live_entry(&mut sessions, id, now).map(|s| now - s.created_at)
	}

	/// Time since a live session was last used.
	pub fn idle_time(&self, id: &SessionId) -> Option<Duration> {
		let now = Instant::now();
		let mut sessions = self.sessions.lock();
		live_entry(&mut sessions, id, now).map(|s| now - s.last_touched_at)
	}

	/// Number of live sessions.
	pub fn len(&self) -> usize {
		let now = Instant::now();
		self.sessions
			.lock()
			.values()
			.filter(|s| s.expires_at > now)
			.count()
	}

	/// Returns `true` if no session is live.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drops every expired session and returns how many were dropped.
	pub fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let mut sessions = self.sessions.lock();
		let before = sessions.len();
		sessions.retain(|_, s| s.expires_at > now);
		before - sessions.len()
	}

	/// Spawns a task that purges expired sessions every `interval` until
	/// `shutdown` fires.
	pub fn spawn_sweeper(
		self: &Arc<Self>,
		interval: Duration,
		shutdown: CancellationToken,
	) -> JoinHandle<()> {
		let store = Arc::clone(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			loop {
				tokio::select! {
					_ = shutdown.cancelled() => break,
					_ = ticker.tick() => {
						let purged = store.purge_expired();
						if purged > 0 {
							tracing::debug!(purged, "expired sessions purged");
						}
					}
				}
			}
		})
	}
}

/// Returns the session if it is live, dropping it first if it has expired.
fn live_entry<'a>(
	sessions: &'a mut HashMap<SessionId, Session>,
	id: &SessionId,
	now: Instant,
) -> Option<&'a mut Session> {
	if sessions.get(id).is_some_and(|s| s.expires_at <= now) {
		sessions.remove(id);
		tracing::debug!(session = %id, "session expired");
		return None;
	}
	sessions.get_mut(id)
}
