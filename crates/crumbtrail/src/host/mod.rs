//! Host Environment Model
//!
//! Rust has no runtime property substitution, so every entry point an
//! interceptor may replace is an explicit [`Slot`]: a shared cell tagged with
//! the owning host object and the property name. Host code always calls
//! whatever the slot currently holds, which is what makes a substitution
//! observable and, through the ledger, reversible.
//!
//! ```text
//! ┌──────────────┐   get()/set()   ┌──────────────────────────┐
//! │  Interceptor │ ──────────────► │ Slot { owner, property } │
//! └──────────────┘                 └────────────┬─────────────┘
//!                                               │ current value
//!                        host dispatch ◄────────┘
//! ```

mod dom;
mod network;

pub use dom::{
    Body, ClassName, Document, Element, EventTarget, HitTest, HostEvent, Listener, ListenerId,
    SelectOption,
};
pub use network::{
    FetchError, FetchFn, FetchFuture, FetchInit, FetchInput, FetchResponse, ReadyState,
    WeakXhrRequest, XhrOpenFn, XhrPrototype, XhrRequest, XhrSendFn,
};

use crate::event::Level;
use crate::result::InstrumentResult;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a host object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh identity
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A named host object that owns patchable slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostObject {
    id: ObjectId,
    name: &'static str,
}

impl HostObject {
    /// Create a new object with a fresh identity
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            id: ObjectId::next(),
            name,
        }
    }

    /// Object identity
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Display name, e.g. `XMLHttpRequest.prototype`
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

/// Zero-argument host callback (`onload`, `onpopstate`, ...)
///
/// An `Err` is the Rust rendition of a callback throwing.
pub type Callback = Rc<dyn Fn() -> InstrumentResult<()>>;

/// Patchable entry point on a host object
pub struct Slot<T> {
    owner: HostObject,
    property: &'static str,
    value: Rc<RefCell<T>>,
}

impl<T> Slot<T> {
    /// Create a slot holding `value`
    #[must_use]
    pub fn new(owner: HostObject, property: &'static str, value: T) -> Self {
        Self {
            owner,
            property,
            value: Rc::new(RefCell::new(value)),
        }
    }

    /// Owning host object
    #[must_use]
    pub const fn owner(&self) -> HostObject {
        self.owner
    }

    /// Property name
    #[must_use]
    pub const fn property(&self) -> &'static str {
        self.property
    }

    /// Replace the current value
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
    }
}

impl<T: Clone> Slot<T> {
    /// Current value
    ///
    /// Values are cloned out so callers never hold a borrow across a call
    /// into host or user code.
    #[must_use]
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            property: self.property,
            value: Rc::clone(&self.value),
        }
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("owner", &self.owner)
            .field("property", &self.property)
            .finish()
    }
}

/// Invoke an optional callback slot
pub(crate) fn fire(slot: &Slot<Option<Callback>>) -> InstrumentResult<()> {
    match slot.get() {
        Some(callback) => callback(),
        None => Ok(()),
    }
}

/// The document's address
#[derive(Debug, Clone)]
pub struct Location {
    href: Rc<RefCell<String>>,
}

impl Location {
    /// Create a location at `href`
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: Rc::new(RefCell::new(href.into())),
        }
    }

    /// Current absolute URL
    #[must_use]
    pub fn href(&self) -> String {
        self.href.borrow().clone()
    }

    /// Navigate to `url`, resolved against the current address
    pub fn assign(&self, url: &str) {
        let resolved = url::Url::parse(&self.href())
            .and_then(|base| base.join(url))
            .map_or_else(|_| url.to_string(), String::from);
        *self.href.borrow_mut() = resolved;
    }
}

/// `history.pushState(state, title, url)`
pub type PushStateFn = Rc<dyn Fn(&Value, &str, Option<&str>)>;

/// Session history
#[derive(Debug, Clone)]
pub struct History {
    object: HostObject,
    /// Patchable `pushState`
    pub push_state: Slot<PushStateFn>,
    entries: Rc<RefCell<Vec<String>>>,
}

impl History {
    /// History whose `pushState` updates `location`
    #[must_use]
    pub fn native(location: &Location) -> Self {
        let object = HostObject::new("history");
        let entries = Rc::new(RefCell::new(vec![location.href()]));
        let push_state: PushStateFn = {
            let location = location.clone();
            let entries = Rc::clone(&entries);
            Rc::new(move |_state: &Value, _title: &str, url: Option<&str>| {
                if let Some(url) = url {
                    location.assign(url);
                }
                entries.borrow_mut().push(location.href());
            })
        };
        Self {
            object,
            push_state: Slot::new(object, "pushState", push_state),
            entries,
        }
    }

    /// Host object behind this history
    #[must_use]
    pub const fn object(&self) -> HostObject {
        self.object
    }

    /// Call whatever `pushState` currently is
    pub fn push(&self, state: &Value, title: &str, url: Option<&str>) {
        let push_state = self.push_state.get();
        push_state(state, title, url);
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Console method names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConsoleMethod {
    /// `console.debug`
    Debug,
    /// `console.info`
    Info,
    /// `console.warn`
    Warn,
    /// `console.error`
    Error,
    /// `console.log`
    Log,
}

impl ConsoleMethod {
    /// Every instrumented method
    pub const ALL: [Self; 5] = [Self::Debug, Self::Info, Self::Warn, Self::Error, Self::Log];

    /// Property name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Log => "log",
        }
    }

    /// Severity of a line written through this method
    #[must_use]
    pub const fn level(&self) -> Level {
        match self {
            Self::Debug => Level::Debug,
            Self::Info => Level::Info,
            Self::Warn => Level::Warning,
            Self::Error => Level::Error,
            Self::Log => Level::Log,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Warn => 2,
            Self::Error => 3,
            Self::Log => 4,
        }
    }
}

/// A console method implementation
pub type ConsoleFn = Rc<dyn Fn(&[Value])>;

/// Lines the native console wrote
pub type ConsoleOutput = Rc<RefCell<Vec<(ConsoleMethod, Vec<Value>)>>>;

/// The host console
///
/// A `None` slot is a method the host does not provide.
#[derive(Debug, Clone)]
pub struct Console {
    object: HostObject,
    methods: [Slot<Option<ConsoleFn>>; 5],
}

impl Console {
    /// Console with every method writing to `output`
    #[must_use]
    pub fn native(output: &ConsoleOutput) -> Self {
        Self::with_methods(&ConsoleMethod::ALL, output)
    }

    /// Console providing only `methods`
    #[must_use]
    pub fn with_methods(methods: &[ConsoleMethod], output: &ConsoleOutput) -> Self {
        let object = HostObject::new("console");
        let slot = |method: ConsoleMethod| {
            let value = methods.contains(&method).then(|| {
                let output = Rc::clone(output);
                Rc::new(move |args: &[Value]| {
                    output.borrow_mut().push((method, args.to_vec()));
                }) as ConsoleFn
            });
            Slot::new(object, method.as_str(), value)
        };
        Self {
            object,
            methods: ConsoleMethod::ALL.map(slot),
        }
    }

    /// Host object behind this console
    #[must_use]
    pub const fn object(&self) -> HostObject {
        self.object
    }

    /// Slot for one method
    #[must_use]
    pub const fn slot(&self, method: ConsoleMethod) -> &Slot<Option<ConsoleFn>> {
        &self.methods[method.index()]
    }

    /// Call `console.<method>(args...)`
    pub fn call(&self, method: ConsoleMethod, args: &[Value]) {
        if let Some(f) = self.slot(method).get() {
            f(args);
        }
    }
}

/// The global object the engine instruments
///
/// Optional fields are capabilities a host may lack; instrumentation of a
/// category whose capability is missing is skipped.
#[derive(Debug, Clone)]
pub struct Window {
    object: HostObject,
    /// Current address
    pub location: Location,
    /// Request object prototype
    pub xhr: Option<XhrPrototype>,
    /// Global `fetch`
    pub fetch: Option<Slot<FetchFn>>,
    /// Global console
    pub console: Option<Console>,
    /// Session history
    pub history: Option<History>,
    /// `window.onpopstate`
    pub onpopstate: Slot<Option<Callback>>,
    /// `addEventListener` support
    pub listeners: Option<EventTarget>,
    /// Legacy `attachEvent` support
    pub legacy_listeners: Option<EventTarget>,
    /// The loaded document
    pub document: Document,
    /// Running inside a packaged-app shell without an address bar
    pub packaged_app: bool,
}

impl Window {
    /// A host with no optional capabilities
    #[must_use]
    pub fn bare(href: impl Into<String>) -> Self {
        let object = HostObject::new("window");
        Self {
            object,
            location: Location::new(href),
            xhr: None,
            fetch: None,
            console: None,
            history: None,
            onpopstate: Slot::new(object, "onpopstate", None),
            listeners: None,
            legacy_listeners: None,
            document: Document::new(),
            packaged_app: false,
        }
    }

    /// A fully capable host
    ///
    /// `fetch` answers through `responder`; the console writes to `output`.
    #[must_use]
    pub fn browser(
        href: impl Into<String>,
        responder: impl Fn(&str, &str) -> Result<FetchResponse, FetchError> + 'static,
        output: &ConsoleOutput,
    ) -> Self {
        let mut window = Self::bare(href);
        window.xhr = Some(XhrPrototype::native());
        window.fetch = Some(network::native_fetch(window.object, responder));
        window.console = Some(Console::native(output));
        window.history = Some(History::native(&window.location));
        window.listeners = Some(EventTarget::new("window"));
        window.document = Document::new().with_body(Body::new());
        window
    }

    /// Host object behind this window
    #[must_use]
    pub const fn object(&self) -> HostObject {
        self.object
    }

    /// Call whatever `fetch` currently is
    ///
    /// Returns `None` when the host has no `fetch`.
    #[must_use]
    pub fn fetch(&self, input: FetchInput, init: Option<FetchInit>) -> Option<FetchFuture> {
        self.fetch.as_ref().map(|slot| {
            let fetch = slot.get();
            fetch(input, init)
        })
    }

    /// Create a request object from the host prototype
    #[must_use]
    pub fn new_request(&self) -> Option<XhrRequest> {
        self.xhr.as_ref().map(XhrRequest::new)
    }

    /// Dispatch a click
    pub fn click(&self, event: &HostEvent) {
        self.dispatch("click", "click", event);
    }

    /// Dispatch a blur
    pub fn blur(&self, event: &HostEvent) {
        self.dispatch("blur", "onfocusout", event);
    }

    /// Browser back/forward: move to `href` and fire `onpopstate`
    pub fn pop_state(&self, href: &str) -> InstrumentResult<()> {
        self.location.assign(href);
        fire(&self.onpopstate)
    }

    /// Fire the `online` signal
    pub fn go_online(&self) -> InstrumentResult<()> {
        self.signal_connectivity("online")
    }

    /// Fire the `offline` signal
    pub fn go_offline(&self) -> InstrumentResult<()> {
        self.signal_connectivity("offline")
    }

    fn dispatch(&self, kind: &str, legacy_kind: &str, event: &HostEvent) {
        if let Some(listeners) = &self.listeners {
            listeners.dispatch(kind, event);
        } else if let Some(legacy) = &self.legacy_listeners {
            legacy.dispatch(legacy_kind, event);
        }
    }

    fn signal_connectivity(&self, kind: &str) -> InstrumentResult<()> {
        if let Some(listeners) = &self.listeners {
            listeners.dispatch(kind, &HostEvent::signal());
        }
        match (&self.document.body, kind) {
            (Some(body), "online") => fire(&body.ononline),
            (Some(body), _) => fire(&body.onoffline),
            (None, _) => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn output() -> ConsoleOutput {
        Rc::new(RefCell::new(Vec::new()))
    }

    mod slot_tests {
        use super::*;

        #[test]
        fn test_clones_share_value() {
            let slot = Slot::new(HostObject::new("thing"), "prop", 1);
            let other = slot.clone();
            other.set(2);
            assert_eq!(slot.get(), 2);
            assert_eq!(slot.property(), "prop");
            assert_eq!(slot.owner().name(), "thing");
        }

        #[test]
        fn test_object_ids_are_unique() {
            let a = HostObject::new("a");
            let b = HostObject::new("a");
            assert_ne!(a.id(), b.id());
        }
    }

    mod location_tests {
        use super::*;

        #[test]
        fn test_assign_resolves_relative() {
            let location = Location::new("https://a.com/x/y");
            location.assign("/z?q=1#top");
            assert_eq!(location.href(), "https://a.com/z?q=1#top");
            location.assign("https://b.com/");
            assert_eq!(location.href(), "https://b.com/");
        }

        #[test]
        fn test_push_state_moves_location() {
            let location = Location::new("https://a.com/");
            let history = History::native(&location);
            history.push(&Value::Null, "", Some("/next"));
            history.push(&Value::Null, "", None);
            assert_eq!(location.href(), "https://a.com/next");
            assert_eq!(history.len(), 3);
        }
    }

    mod console_tests {
        use super::*;

        #[test]
        fn test_native_console_records_calls() {
            let out = output();
            let console = Console::native(&out);
            console.call(ConsoleMethod::Warn, &[Value::from("careful")]);
            assert_eq!(out.borrow().len(), 1);
            assert_eq!(out.borrow()[0].0, ConsoleMethod::Warn);
        }

        #[test]
        fn test_missing_methods_are_none() {
            let out = output();
            let console = Console::with_methods(&[ConsoleMethod::Log], &out);
            assert!(console.slot(ConsoleMethod::Debug).get().is_none());
            assert!(console.slot(ConsoleMethod::Log).get().is_some());
            console.call(ConsoleMethod::Debug, &[]);
            assert!(out.borrow().is_empty());
        }

        #[test]
        fn test_warn_maps_to_warning() {
            assert_eq!(ConsoleMethod::Warn.level(), Level::Warning);
            assert_eq!(ConsoleMethod::Log.level(), Level::Log);
        }
    }

    mod window_tests {
        use super::*;

        #[test]
        fn test_bare_window_has_no_capabilities() {
            let window = Window::bare("https://a.com/");
            assert!(window.xhr.is_none());
            assert!(window.fetch(FetchInput::from("/x"), None).is_none());
            assert!(window.new_request().is_none());
            assert!(window.pop_state("/y").is_ok());
            assert_eq!(window.location.href(), "https://a.com/y");
        }

        #[test]
        fn test_browser_window_fetch_resolves() {
            let out = output();
            let window = Window::browser(
                "https://a.com/",
                |url, _| Ok(FetchResponse::new(200, url)),
                &out,
            );
            let response =
                futures::executor::block_on(window.fetch(FetchInput::from("/api"), None).unwrap())
                    .unwrap();
            assert_eq!(response.status, 200);
            assert_eq!(response.url, "/api");
        }
    }
}
