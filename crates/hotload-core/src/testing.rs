//! Scripted collaborators shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::activate::{CodeHost, ControlSurface, HostError, SurfaceStats};
use crate::http::{HttpClient, HttpRequest, HttpResponse, TransportError};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Status(u16, String),
    Fail(TransportError),
    /// Never completes; only a timeout ends the request.
    Hang,
}

impl Reply {
    pub(crate) fn ok(body: &str) -> Self {
        Reply::Status(200, body.to_string())
    }

    pub(crate) fn status(code: u16, body: &str) -> Self {
        Reply::Status(code, body.to_string())
    }
}

pub(crate) fn strip_query(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

/// Replies per URL (query ignored). The last scripted reply repeats;
/// unscripted URLs answer 404.
#[derive(Default)]
pub(crate) struct ScriptedHttp {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(&self, url: &str, replies: impl IntoIterator<Item = Reply>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into_iter().collect());
    }

    pub(crate) fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| strip_query(&r.url) == url)
            .count()
    }

    fn next_reply(&self, request: &HttpRequest) -> Reply {
        self.calls.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(strip_query(&request.url)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Reply::status(404, "")),
            None => Reply::status(404, ""),
        }
    }
}

impl HttpClient for ScriptedHttp {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        match self.next_reply(&request) {
            Reply::Status(status, body) => Ok(HttpResponse { status, body }),
            Reply::Fail(e) => Err(e),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Surface that only counts lifecycle calls.
pub(crate) struct CountingSurface {
    pub(crate) version: String,
    pub(crate) cleanups: Arc<AtomicUsize>,
}

impl ControlSurface for CountingSurface {
    fn version(&self) -> &str {
        &self.version
    }

    fn stats(&self) -> SurfaceStats {
        SurfaceStats::default()
    }

    fn reprocess(&mut self) {}

    fn cleanup(&mut self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }

    fn restart(&mut self) {}

    fn execute_global_rule(&mut self, _name: &str) -> bool {
        false
    }

    fn reset_global_rule(&mut self, _name: &str) {}
}

/// Host that records every payload it is handed.
#[derive(Default)]
pub(crate) struct RecordingHost {
    pub(crate) executed: Mutex<Vec<String>>,
    pub(crate) reject: bool,
    /// When set, each activation publishes a [`CountingSurface`] sharing this counter.
    pub(crate) cleanups: Option<Arc<AtomicUsize>>,
}

impl RecordingHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_surfaces(cleanups: Arc<AtomicUsize>) -> Self {
        Self {
            cleanups: Some(cleanups),
            ..Self::default()
        }
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl CodeHost for RecordingHost {
    fn execute(&self, payload: &str) -> Result<Option<Box<dyn ControlSurface>>, HostError> {
        if self.reject {
            return Err(HostError::Rejected("syntax error".into()));
        }
        let mut executed = self.executed.lock().unwrap();
        executed.push(payload.to_string());
        Ok(self.cleanups.as_ref().map(|counter| {
            Box::new(CountingSurface {
                version: format!("v{}", executed.len()),
                cleanups: Arc::clone(counter),
            }) as Box<dyn ControlSurface>
        }))
    }
}
