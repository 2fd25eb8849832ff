//! Request objects and `fetch`.

use super::{fire, Callback, HostObject, Slot};
use crate::event::SharedNetworkEvent;
use crate::result::{InstrumentError, InstrumentResult};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;

/// Request readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadyState {
    /// Created, not opened
    Unsent = 0,
    /// `open` was called
    Opened = 1,
    /// Response headers arrived
    HeadersReceived = 2,
    /// Response body is downloading
    Loading = 3,
    /// Completed or failed
    Done = 4,
}

/// `open(method, url)`; `url` is an arbitrary host value
pub type XhrOpenFn = Rc<dyn Fn(&XhrRequest, &str, &Value)>;

/// `send(body)`
pub type XhrSendFn = Rc<dyn Fn(&XhrRequest, Option<&str>)>;

/// Shared prototype of every request object
#[derive(Debug, Clone)]
pub struct XhrPrototype {
    object: HostObject,
    /// Patchable `open`
    pub open: Slot<XhrOpenFn>,
    /// Patchable `send`
    pub send: Slot<XhrSendFn>,
}

impl XhrPrototype {
    /// Prototype with host behaviour
    #[must_use]
    pub fn native() -> Self {
        let object = HostObject::new("XMLHttpRequest.prototype");
        let open: XhrOpenFn = Rc::new(|xhr: &XhrRequest, method: &str, url: &Value| {
            xhr.inner.method.replace(method.to_string());
            xhr.inner
                .url
                .replace(url.as_str().map_or_else(|| url.to_string(), String::from));
            // open has no channel for handler failures
            let _ = xhr.advance(ReadyState::Opened);
        });
        let send: XhrSendFn = Rc::new(|xhr: &XhrRequest, body: Option<&str>| {
            xhr.inner.body.replace(body.map(String::from));
            xhr.inner.sent.set(true);
        });
        Self {
            object,
            open: Slot::new(object, "open", open),
            send: Slot::new(object, "send", send),
        }
    }

    /// Host object behind this prototype
    #[must_use]
    pub const fn object(&self) -> HostObject {
        self.object
    }
}

struct XhrInner {
    object: HostObject,
    prototype: XhrPrototype,
    ready_state: Cell<ReadyState>,
    status: Cell<u16>,
    status_readable: Cell<bool>,
    method: RefCell<String>,
    url: RefCell<String>,
    body: RefCell<Option<String>>,
    sent: Cell<bool>,
    tracked: RefCell<Option<SharedNetworkEvent>>,
    onreadystatechange: Slot<Option<Callback>>,
    onload: Slot<Option<Callback>>,
    onerror: Slot<Option<Callback>>,
    onprogress: Slot<Option<Callback>>,
}

/// One request object instance
#[derive(Clone)]
pub struct XhrRequest {
    inner: Rc<XhrInner>,
}

impl XhrRequest {
    /// Construct from a prototype
    #[must_use]
    pub fn new(prototype: &XhrPrototype) -> Self {
        let object = HostObject::new("XMLHttpRequest");
        Self {
            inner: Rc::new(XhrInner {
                object,
                prototype: prototype.clone(),
                ready_state: Cell::new(ReadyState::Unsent),
                status: Cell::new(0),
                status_readable: Cell::new(true),
                method: RefCell::new(String::new()),
                url: RefCell::new(String::new()),
                body: RefCell::new(None),
                sent: Cell::new(false),
                tracked: RefCell::new(None),
                onreadystatechange: Slot::new(object, "onreadystatechange", None),
                onload: Slot::new(object, "onload", None),
                onerror: Slot::new(object, "onerror", None),
                onprogress: Slot::new(object, "onprogress", None),
            }),
        }
    }

    /// Host object behind this request
    #[must_use]
    pub fn object(&self) -> HostObject {
        self.inner.object
    }

    /// Call the prototype's current `open`
    pub fn open(&self, method: &str, url: impl Into<Value>) {
        let open = self.inner.prototype.open.get();
        open(self, method, &url.into());
    }

    /// Call the prototype's current `send`
    pub fn send(&self, body: Option<&str>) {
        let send = self.inner.prototype.send.get();
        send(self, body);
    }

    /// Move to `state` and fire `onreadystatechange`
    pub fn advance(&self, state: ReadyState) -> InstrumentResult<()> {
        self.inner.ready_state.set(state);
        fire(&self.inner.onreadystatechange)
    }

    /// Finish with `status`, then fire `onload`
    pub fn complete(&self, status: u16) -> InstrumentResult<()> {
        self.inner.status.set(status);
        self.advance(ReadyState::Done)?;
        fire(&self.inner.onload)
    }

    /// Fail at the network level, then fire `onerror`
    pub fn fail(&self) -> InstrumentResult<()> {
        self.inner.status.set(0);
        self.advance(ReadyState::Done)?;
        fire(&self.inner.onerror)
    }

    /// Fire `onprogress`
    pub fn progress(&self) -> InstrumentResult<()> {
        fire(&self.inner.onprogress)
    }

    /// Current readiness
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.inner.ready_state.get()
    }

    /// Response status; some hosts raise when it is read too early
    pub fn status(&self) -> InstrumentResult<u16> {
        if self.inner.status_readable.get() {
            Ok(self.inner.status.get())
        } else {
            Err(InstrumentError::StatusUnavailable)
        }
    }

    /// Make reading `status` fail (or succeed again)
    pub fn set_status_readable(&self, readable: bool) {
        self.inner.status_readable.set(readable);
    }

    /// Method passed to `open`
    #[must_use]
    pub fn method(&self) -> String {
        self.inner.method.borrow().clone()
    }

    /// URL passed to `open`
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.url.borrow().clone()
    }

    /// Body passed to `send`
    #[must_use]
    pub fn body(&self) -> Option<String> {
        self.inner.body.borrow().clone()
    }

    /// Whether `send` reached the host implementation
    #[must_use]
    pub fn was_sent(&self) -> bool {
        self.inner.sent.get()
    }

    /// Descriptor attached by the network interceptor
    #[must_use]
    pub fn tracked(&self) -> Option<SharedNetworkEvent> {
        self.inner.tracked.borrow().clone()
    }

    /// Attach or clear the interceptor's descriptor
    pub fn set_tracked(&self, descriptor: Option<SharedNetworkEvent>) {
        self.inner.tracked.replace(descriptor);
    }

    /// `onreadystatechange`
    #[must_use]
    pub fn onreadystatechange(&self) -> &Slot<Option<Callback>> {
        &self.inner.onreadystatechange
    }

    /// `onload`
    #[must_use]
    pub fn onload(&self) -> &Slot<Option<Callback>> {
        &self.inner.onload
    }

    /// `onerror`
    #[must_use]
    pub fn onerror(&self) -> &Slot<Option<Callback>> {
        &self.inner.onerror
    }

    /// `onprogress`
    #[must_use]
    pub fn onprogress(&self) -> &Slot<Option<Callback>> {
        &self.inner.onprogress
    }

    /// Non-owning handle for callbacks stored on this request
    #[must_use]
    pub fn downgrade(&self) -> WeakXhrRequest {
        WeakXhrRequest {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for XhrRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XhrRequest")
            .field("object", &self.inner.object)
            .field("ready_state", &self.inner.ready_state.get())
            .field("status", &self.inner.status.get())
            .field("url", &self.inner.url.borrow())
            .finish()
    }
}

/// Weak reference to a request object
#[derive(Clone)]
pub struct WeakXhrRequest {
    inner: Weak<XhrInner>,
}

impl WeakXhrRequest {
    /// Upgrade if the request is still alive
    #[must_use]
    pub fn upgrade(&self) -> Option<XhrRequest> {
        self.inner.upgrade().map(|inner| XhrRequest { inner })
    }
}

impl fmt::Debug for WeakXhrRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakXhrRequest")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// First argument to `fetch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchInput {
    /// A URL string
    Url(String),
    /// A request object
    Request {
        /// Request URL
        url: String,
        /// Request method, if set
        method: Option<String>,
    },
}

impl From<&str> for FetchInput {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for FetchInput {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

/// Second argument to `fetch`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchInit {
    /// Method override
    pub method: Option<String>,
}

impl FetchInit {
    /// Options carrying a method
    #[must_use]
    pub fn method(method: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
        }
    }
}

/// Resolved `fetch` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// HTTP status
    pub status: u16,
    /// Final URL
    pub url: String,
    /// Body text
    pub body: String,
}

impl FetchResponse {
    /// Empty-bodied response
    #[must_use]
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            body: String::new(),
        }
    }

    /// Set body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// A rejected `fetch`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch failed: {message}")]
pub struct FetchError {
    /// Error message
    pub message: String,
}

impl FetchError {
    /// Create a fetch error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pending `fetch` result, completed on the host's task queue
pub type FetchFuture = LocalBoxFuture<'static, Result<FetchResponse, FetchError>>;

/// `fetch(input, init)`
pub type FetchFn = Rc<dyn Fn(FetchInput, Option<FetchInit>) -> FetchFuture>;

/// Host `fetch` answering through `responder(url, method)`
pub(crate) fn native_fetch(
    window: HostObject,
    responder: impl Fn(&str, &str) -> Result<FetchResponse, FetchError> + 'static,
) -> Slot<FetchFn> {
    let responder = Rc::new(responder);
    let fetch: FetchFn = Rc::new(move |input: FetchInput, init: Option<FetchInit>| {
        let (url, method) = match input {
            FetchInput::Url(url) => (url, None),
            FetchInput::Request { url, method } => (url, method),
        };
        let method = init
            .and_then(|init| init.method)
            .or(method)
            .unwrap_or_else(|| "GET".to_string());
        let responder = Rc::clone(&responder);
        async move { responder(&url, &method) }.boxed_local()
    });
    Slot::new(window, "fetch", fetch)
}
