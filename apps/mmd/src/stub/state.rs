use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One conversation held by the stub backend.
#[derive(Debug, Clone)]
pub struct StubSession {
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// (question, answer) pairs.
    pub chat_history: Vec<(String, String)>,
    pub reset_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLookup {
    Active,
    Expired,
    Unknown,
}

/// What the session middleware saw on an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub path: String,
    pub cookie: Option<String>,
    pub page_load: bool,
}

/// Shared state injected into all stub handlers via Axum extractors.
#[derive(Clone)]
pub struct StubState {
    inner: Arc<StubInner>,
}

struct StubInner {
    sessions: Mutex<HashMap<String, StubSession>>,
    ttl: Duration,
    probe_delay: Duration,
    probes: AtomicU64,
    requests: Mutex<Vec<RequestRecord>>,
}

impl StubState {
    pub fn new(ttl: Duration) -> Self {
        Self::with_probe_delay(ttl, Duration::ZERO)
    }

    /// `probe_delay` slows `GET /v1/session/stats` down, which widens the renewal window.
    pub fn with_probe_delay(ttl: Duration, probe_delay: Duration) -> Self {
        Self {
            inner: Arc::new(StubInner {
                sessions: Mutex::new(HashMap::new()),
                ttl,
                probe_delay,
                probes: AtomicU64::new(0),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn probe_delay(&self) -> Duration {
        self.inner.probe_delay
    }

    pub fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let session = StubSession {
            created_at: now,
            last_activity: now,
            expires_at: now + self.ttl_delta(),
            chat_history: Vec::new(),
            reset_count: 0,
        };
        self.sessions().insert(id.clone(), session);
        id
    }

    pub fn lookup(&self, id: &str) -> SessionLookup {
        match self.sessions().get(id) {
            Some(session) if session.expires_at > Utc::now() => SessionLookup::Active,
            Some(_) => SessionLookup::Expired,
            None => SessionLookup::Unknown,
        }
    }

    /// Refreshes last activity and slides the expiry window.
    pub fn touch(&self, id: &str) {
        let ttl = self.ttl_delta();
        if let Some(session) = self.sessions().get_mut(id) {
            let now = Utc::now();
            session.last_activity = now;
            session.expires_at = now + ttl;
        }
    }

    pub fn get(&self, id: &str) -> Option<StubSession> {
        self.sessions().get(id).cloned()
    }

    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut StubSession) -> R) -> Option<R> {
        self.sessions().get_mut(id).map(f)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions().remove(id).is_some()
    }

    /// Ages every session past its expiry.
    pub fn expire_all(&self) {
        let past = Utc::now() - chrono::Duration::seconds(1);
        for session in self.sessions().values_mut() {
            session.expires_at = past;
        }
    }

    pub fn session_counts(&self) -> (usize, usize, usize) {
        let now = Utc::now();
        let sessions = self.sessions();
        let active = sessions.values().filter(|s| s.expires_at > now).count();
        let messages = sessions.values().map(|s| s.chat_history.len()).sum();
        (sessions.len(), active, messages)
    }

    pub fn average_session_secs(&self) -> f64 {
        let sessions = self.sessions();
        if sessions.is_empty() {
            return 0.0;
        }
        let total: i64 = sessions
            .values()
            .map(|s| (s.last_activity - s.created_at).num_seconds())
            .sum();
        total as f64 / sessions.len() as f64
    }

    pub fn most_recent_activity(&self) -> Option<DateTime<Utc>> {
        self.sessions().values().map(|s| s.last_activity).max()
    }

    pub fn record_probe(&self) {
        self.inner.probes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn probe_count(&self) -> u64 {
        self.inner.probes.load(Ordering::Relaxed)
    }

    pub fn record_request(&self, record: RequestRecord) {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn requests(&self) -> Vec<RequestRecord> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ttl_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.inner.ttl).unwrap_or_else(|_| chrono::Duration::days(1))
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, StubSession>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
