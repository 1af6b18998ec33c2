//! Servant, locator, and reply sink doubles shared by the dispatch suites.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::identity::Identity;
use crate::locator::{Cookie, LocateError, Located, ServantLocator};
use crate::servant::{Reply, ReplySink, Request, Servant, ServantResult, sync_servant};
use crate::{Continuation, UserFailure};

/// Maximum time a test waits for an asynchronous reply.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns a reply sink and the receiver its reply arrives on.
pub fn reply_probe() -> (impl ReplySink + 'static, Receiver<Reply>) {
    let (sender, receiver) = mpsc::channel();
    let sink = move |reply: Reply| {
        // The receiver may be gone when a test only checks side effects.
        let _ = sender.send(reply);
    };
    (sink, receiver)
}

/// Synchronous servant that counts invocations and echoes a fixed payload.
pub struct CountingServant {
    calls: Arc<AtomicUsize>,
    servant: Arc<dyn Servant>,
}

impl CountingServant {
    pub fn replying(payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        Self::with_result(move || Ok(payload.clone()))
    }

    pub fn failing(message: &'static str) -> Self {
        Self::with_result(move || Err(UserFailure::new(message)))
    }

    fn with_result<F>(result: F) -> Self
    where
        F: Fn() -> ServantResult + Send + Sync + 'static,
    {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let servant = sync_servant(move |_request| {
            counter.fetch_add(1, Ordering::SeqCst);
            result()
        });
        Self { calls, servant }
    }

    pub fn servant(&self) -> Arc<dyn Servant> {
        Arc::clone(&self.servant)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Servant that parks every continuation until the test completes it.
#[derive(Default)]
pub struct DeferredServant {
    pending: Mutex<Vec<Continuation>>,
}

impl DeferredServant {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().expect("pending mutex poisoned").len()
    }

    /// Removes the oldest parked continuation.
    pub fn take(&self) -> Continuation {
        let mut pending = self.pending.lock().expect("pending mutex poisoned");
        assert!(!pending.is_empty(), "no continuation parked");
        pending.remove(0)
    }
}

impl Servant for DeferredServant {
    fn dispatch(&self, _request: &Request, continuation: Continuation) {
        self.pending
            .lock()
            .expect("pending mutex poisoned")
            .push(continuation);
    }
}

/// `finished` invocation captured by [`RecordingLocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedCall {
    pub identity: Identity,
    pub had_servant: bool,
    pub cookie: Option<u32>,
}

enum Resolution {
    Servant(Arc<dyn Servant>),
    Missing,
    Failure(LocateError),
    Panic,
}

/// Servant locator double recording every callback it receives.
pub struct RecordingLocator {
    resolution: Resolution,
    next_cookie: AtomicU32,
    locates: AtomicUsize,
    finished: Mutex<Vec<FinishedCall>>,
    deactivated: Mutex<Vec<String>>,
}

impl RecordingLocator {
    fn with(resolution: Resolution) -> Arc<Self> {
        Arc::new(Self {
            resolution,
            next_cookie: AtomicU32::new(1),
            locates: AtomicUsize::new(0),
            finished: Mutex::new(Vec::new()),
            deactivated: Mutex::new(Vec::new()),
        })
    }

    /// Resolves every identity to `servant`.
    pub fn resolving(servant: Arc<dyn Servant>) -> Arc<Self> {
        Self::with(Resolution::Servant(servant))
    }

    /// Reports every identity as missing.
    pub fn missing() -> Arc<Self> {
        Self::with(Resolution::Missing)
    }

    /// Fails every resolution with `error`.
    pub fn failing(error: LocateError) -> Arc<Self> {
        Self::with(Resolution::Failure(error))
    }

    /// Panics inside every resolution.
    pub fn panicking() -> Arc<Self> {
        Self::with(Resolution::Panic)
    }

    pub fn locates(&self) -> usize {
        self.locates.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> Vec<FinishedCall> {
        self.finished.lock().expect("finished mutex poisoned").clone()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.lock().expect("finished mutex poisoned").len()
    }

    pub fn deactivated(&self) -> Vec<String> {
        self.deactivated
            .lock()
            .expect("deactivated mutex poisoned")
            .clone()
    }
}

impl ServantLocator for RecordingLocator {
    fn locate(&self, request: &Request) -> Result<Option<Located>, LocateError> {
        self.locates.fetch_add(1, Ordering::SeqCst);
        match &self.resolution {
            Resolution::Servant(servant) => {
                let cookie = self.next_cookie.fetch_add(1, Ordering::SeqCst);
                Ok(Some(Located::new(Arc::clone(servant)).with_cookie(cookie)))
            }
            Resolution::Missing => Ok(None),
            Resolution::Failure(LocateError::FacetNotFound { .. }) => {
                Err(LocateError::facet_not_found(request))
            }
            Resolution::Failure(error) => Err(error.clone()),
            Resolution::Panic => panic!("locator exploded for {}", request.identity()),
        }
    }

    fn finished(&self, request: &Request, servant: Option<&Arc<dyn Servant>>, cookie: Option<Cookie>) {
        let cookie = cookie.and_then(|value| value.downcast::<u32>().ok().map(|boxed| *boxed));
        self.finished
            .lock()
            .expect("finished mutex poisoned")
            .push(FinishedCall {
                identity: request.identity().clone(),
                had_servant: servant.is_some(),
                cookie,
            });
    }

    fn deactivate(&self, category: &str) {
        self.deactivated
            .lock()
            .expect("deactivated mutex poisoned")
            .push(category.to_owned());
    }
}
