//! Session Coordinator: owns the session cookie and performs single-flight renewal.
//!
//! ```text
//!            first 401/403 (not yet retried)
//!   IDLE ────────────────────────────────────────▶ RENEWING
//!    ▲                                               │  later 401/403: enqueue waiter
//!    └──────── probe settled, waiters released ──────┘
//! ```
//!
//! Only the leader (the request that moved the state to `RENEWING`) issues the probe.
//! Waiters are released in enqueue order with the probe's outcome.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::errors::ApiError;
use crate::session::cookies::{short_id, SessionCookies};
use crate::session::markers::SessionMarkers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Renewing,
}

type Waiter = oneshot::Sender<Result<(), ApiError>>;

enum RenewalState {
    Idle,
    Renewing { queue: Vec<Waiter> },
}

/// Result of asking the coordinator to renew the session.
#[derive(Debug)]
pub enum RenewalOutcome {
    /// The probe succeeded; the caller should resubmit its request once.
    Renewed,
    /// The probe failed. `led` is true for the request that issued the probe.
    Failed { error: ApiError, led: bool },
}

pub struct SessionCoordinator {
    state: Mutex<RenewalState>,
    cookies: SessionCookies,
    markers: SessionMarkers,
    probes_issued: AtomicU64,
}

impl SessionCoordinator {
    pub fn new(cookies: SessionCookies) -> Self {
        Self {
            state: Mutex::new(RenewalState::Idle),
            cookies,
            markers: SessionMarkers::new(),
            probes_issued: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        match *self.lock() {
            RenewalState::Idle => CoordinatorState::Idle,
            RenewalState::Renewing { .. } => CoordinatorState::Renewing,
        }
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub fn markers(&self) -> &SessionMarkers {
        &self.markers
    }

    /// Number of renewal probes issued over the coordinator's lifetime.
    pub fn probes_issued(&self) -> u64 {
        self.probes_issued.load(Ordering::Relaxed)
    }

    /// Drops the current session on the client side so the next request starts a new one.
    ///
    /// Expires the cookie under every plausible domain/path, clears the markers and re-arms
    /// the page-load headers for the next request. Best effort; never fails.
    pub fn force_new_session(&self) {
        info!("Forcing new session");
        if let Some(previous) = self.cookies.session_id() {
            debug!("Expiring session cookie {}", short_id(&previous));
        }
        self.cookies.expire_session();
        self.markers.clear_session_id();
        self.markers.arm_page_load();

        if let Some(survivor) = self.cookies.session_id() {
            warn!(
                "Session cookie {} survived deletion (attributes did not match)",
                short_id(&survivor)
            );
        }
    }

    /// Runs `probe` unless a renewal is already in flight, in which case this call waits
    /// for that renewal's outcome instead.
    pub async fn renew<F, Fut>(&self, probe: F) -> RenewalOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        let waiter = {
            let mut state = self.lock();
            match &mut *state {
                RenewalState::Renewing { queue } => {
                    let (tx, rx) = oneshot::channel();
                    queue.push(tx);
                    debug!("Renewal in flight; queued request (position {})", queue.len());
                    Some(rx)
                }
                RenewalState::Idle => {
                    *state = RenewalState::Renewing { queue: Vec::new() };
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return match rx.await {
                Ok(Ok(())) => RenewalOutcome::Renewed,
                Ok(Err(error)) => RenewalOutcome::Failed { error, led: false },
                Err(_) => RenewalOutcome::Failed {
                    error: ApiError::Session("session renewal was abandoned".to_string()),
                    led: false,
                },
            };
        }

        info!("Session expired; probing for renewal");
        self.probes_issued.fetch_add(1, Ordering::Relaxed);

        let mut guard = LeaderGuard {
            coordinator: self,
            settled: false,
        };
        let result = probe().await;
        guard.settled = true;
        let released = self.settle(result.clone());

        match result {
            Ok(()) => {
                info!("Session renewed; releasing {released} queued request(s)");
                RenewalOutcome::Renewed
            }
            Err(error) => {
                warn!("Session renewal failed ({error}); rejecting {released} queued request(s)");
                RenewalOutcome::Failed { error, led: true }
            }
        }
    }

    /// Returns to `IDLE` and releases every waiter, in enqueue order, with `result`.
    fn settle(&self, result: Result<(), ApiError>) -> usize {
        let queue = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, RenewalState::Idle) {
                RenewalState::Renewing { queue } => queue,
                RenewalState::Idle => Vec::new(),
            }
        };
        let released = queue.len();
        for waiter in queue {
            // A waiter whose caller went away is simply skipped.
            let _ = waiter.send(result.clone());
        }
        released
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RenewalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Puts the coordinator back to `IDLE` if the leader is dropped mid-probe.
struct LeaderGuard<'a> {
    coordinator: &'a SessionCoordinator,
    settled: bool,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Renewal leader cancelled; rejecting queued requests");
            self.coordinator.settle(Err(ApiError::Session(
                "session renewal was cancelled".to_string(),
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::Jar;
    use reqwest::Url;
    use std::sync::Arc;
    use std::time::Duration;

    fn coordinator() -> Arc<SessionCoordinator> {
        let cookies = SessionCookies::new(
            Arc::new(Jar::default()),
            Url::parse("http://localhost:8000/api").unwrap(),
        );
        Arc::new(SessionCoordinator::new(cookies))
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_renewals_share_one_probe() {
        let coordinator = coordinator();

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .renew(|| async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<(), ApiError>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(coordinator.state(), CoordinatorState::Renewing);

        let mut followers = Vec::new();
        for _ in 0..3 {
            let coordinator = Arc::clone(&coordinator);
            followers.push(tokio::spawn(async move {
                coordinator
                    .renew(|| async {
                        Err(ApiError::Session("followers never probe".to_string()))
                    })
                    .await
            }));
        }

        assert!(matches!(leader.await.unwrap(), RenewalOutcome::Renewed));
        for follower in followers {
            assert!(matches!(follower.await.unwrap(), RenewalOutcome::Renewed));
        }
        assert_eq!(coordinator.probes_issued(), 1);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reaches_waiters_and_resets_state() {
        let coordinator = coordinator();
        let probe_error = ApiError::Http {
            status: 403,
            body: "forbidden".to_string(),
        };

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            let probe_error = probe_error.clone();
            tokio::spawn(async move {
                coordinator
                    .renew(|| async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(probe_error)
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let follower = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.renew(|| async { Ok::<(), ApiError>(()) }).await })
        };

        match leader.await.unwrap() {
            RenewalOutcome::Failed { led, error } => {
                assert!(led);
                assert_eq!(error.status(), Some(403));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        match follower.await.unwrap() {
            RenewalOutcome::Failed { led, error } => {
                assert!(!led);
                assert_eq!(error.status(), Some(403));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        // A later renewal starts a fresh probe.
        assert!(matches!(
            coordinator.renew(|| async { Ok::<(), ApiError>(()) }).await,
            RenewalOutcome::Renewed
        ));
        assert_eq!(coordinator.probes_issued(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_leader_releases_waiters() {
        let coordinator = coordinator();

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .renew(|| async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok::<(), ApiError>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let follower = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.renew(|| async { Ok::<(), ApiError>(()) }).await })
        };
        tokio::task::yield_now().await;

        leader.abort();
        let _ = leader.await;

        match follower.await.unwrap() {
            RenewalOutcome::Failed { error, led } => {
                assert!(!led);
                assert!(matches!(error, ApiError::Session(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_force_new_session_clears_cookie_and_rearms_page_load() {
        let coordinator = coordinator();
        let url = coordinator.cookies().base_url().clone();
        coordinator
            .cookies()
            .jar()
            .add_cookie_str("session_id=previous; Path=/; Max-Age=1800", &url);
        coordinator.markers().record_session_id("previous");
        assert!(coordinator.markers().take_page_load());

        coordinator.force_new_session();

        assert_eq!(coordinator.cookies().session_id(), None);
        assert_eq!(coordinator.markers().last_session_id(), None);
        assert!(coordinator.markers().is_page_load());
    }
}
