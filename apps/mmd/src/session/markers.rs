use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// In-process mirror of the session bookkeeping a browser keeps in local/session storage.
///
/// Nothing here is authoritative: the cookie is the session. The markers only drive the
/// page-load headers and make the current session visible in logs.
#[derive(Debug)]
pub struct SessionMarkers {
    page_load: AtomicBool,
    last_session_id: Mutex<Option<String>>,
}

impl Default for SessionMarkers {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMarkers {
    /// A fresh process counts as a page load.
    pub fn new() -> Self {
        Self {
            page_load: AtomicBool::new(true),
            last_session_id: Mutex::new(None),
        }
    }

    /// Returns `true` exactly once per page load.
    pub fn take_page_load(&self) -> bool {
        self.page_load.swap(false, Ordering::AcqRel)
    }

    pub fn is_page_load(&self) -> bool {
        self.page_load.load(Ordering::Acquire)
    }

    pub fn arm_page_load(&self) {
        self.page_load.store(true, Ordering::Release);
    }

    pub fn record_session_id(&self, session_id: &str) {
        *self
            .last_session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(session_id.to_string());
    }

    pub fn last_session_id(&self) -> Option<String> {
        self.last_session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_session_id(&self) {
        self.last_session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
