//! The transport contract (§4.D.1): `peek`/`get`/`put` against a single
//! location string, cancellable and progress-reporting through a shared
//! [`Context`], with errors classified into not-found vs everything else.
//!
//! Two concrete transports exist as variants rather than trait objects,
//! mirroring the tagged-variant style `aether_core::selector` already
//! uses for policy objects: the set of transports is fixed and known at
//! compile time, so there is no need for dynamic dispatch.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aether_util::errors::AetherError;

use crate::file_transport::FileTransport;
use crate::http_transport::HttpTransport;

/// Where a `get` should land: an in-memory buffer, or a destination path
/// on disk (used by the file transport's copy/symlink/hardlink strategies
/// and by the HTTP transport's range-resumable download).
pub enum Sink<'a> {
    Memory(&'a mut Vec<u8>),
    Path(&'a Path),
}

/// Reports transfer progress; installed on a [`Context`].
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, transferred: u64, total: Option<u64>);
}

/// Cancellation token plus progress sink, threaded through every
/// transport call per the §9 "listener/cancellation" design note.
#[derive(Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    listener: Option<Arc<dyn ProgressListener>>,
    if_modified_since: Option<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(listener: Arc<dyn ProgressListener>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            listener: Some(listener),
            if_modified_since: None,
        }
    }

    /// Attach an `If-Modified-Since` value (RFC 7231 HTTP-date) so the
    /// HTTP transport can skip re-downloading an unchanged resource. No
    /// effect on the file transport.
    pub fn with_if_modified_since(mut self, value: impl Into<String>) -> Self {
        self.if_modified_since = Some(value.into());
        self
    }

    pub fn if_modified_since(&self) -> Option<&str> {
        self.if_modified_since.as_deref()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn report(&self, transferred: u64, total: Option<u64>) {
        if let Some(listener) = &self.listener {
            listener.on_progress(transferred, total);
        }
    }

    pub(crate) fn check_cancelled(&self) -> miette::Result<()> {
        if self.is_cancelled() {
            Err(AetherError::Generic {
                message: "transfer cancelled".to_string(),
            }
            .into())
        } else {
            Ok(())
        }
    }
}

/// A single location a transport resolves: a transport-relative path or
/// URL, independent of the repository layout that produced it.
#[derive(Debug, Clone)]
pub struct Location(pub String);

/// A pluggable transport: local filesystem or HTTP(S).
#[derive(Clone)]
pub enum Transport {
    File(FileTransport),
    Http(HttpTransport),
}

impl Transport {
    /// Existence check with no body transferred.
    pub async fn peek(&self, loc: &Location, cx: &Context) -> miette::Result<bool> {
        cx.check_cancelled()?;
        match self {
            Transport::File(t) => t.peek(loc),
            Transport::Http(t) => t.peek(loc).await,
        }
    }

    /// Stream the resource at `loc` into `sink`. `resume_offset` is the
    /// byte offset already present locally (0 for a fresh download);
    /// returns the total number of bytes now present at the destination.
    pub async fn get(
        &self,
        loc: &Location,
        sink: Sink<'_>,
        resume_offset: u64,
        cx: &Context,
    ) -> miette::Result<u64> {
        cx.check_cancelled()?;
        match self {
            Transport::File(t) => t.get(loc, sink, cx),
            Transport::Http(t) => t.get(loc, sink, resume_offset, cx).await,
        }
    }

    pub async fn put(&self, loc: &Location, data: &[u8], cx: &Context) -> miette::Result<()> {
        cx.check_cancelled()?;
        match self {
            Transport::File(t) => t.put(loc, data),
            Transport::Http(t) => t.put(loc, data, cx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<(u64, Option<u64>)>>);
    impl ProgressListener for Recorder {
        fn on_progress(&self, transferred: u64, total: Option<u64>) {
            self.0.lock().unwrap().push((transferred, total));
        }
    }

    #[test]
    fn context_cancel_is_observed() {
        let cx = Context::new();
        assert!(!cx.is_cancelled());
        cx.cancel();
        assert!(cx.is_cancelled());
        assert!(cx.check_cancelled().is_err());
    }

    #[test]
    fn context_reports_to_listener() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let cx = Context::with_listener(recorder.clone());
        cx.report(10, Some(100));
        assert_eq!(recorder.0.lock().unwrap().as_slice(), &[(10, Some(100))]);
    }
}
