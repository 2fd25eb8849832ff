//! Collaborator Contracts and Reference Sink
//!
//! Interceptors never transmit anything themselves. They hand descriptors to
//! a [`Telemeter`] and route host callbacks through an [`ErrorBoundary`].
//! [`BreadcrumbQueue`] and [`ReportingBoundary`] are in-process
//! implementations of both, used by embedders without a client of their own
//! and by the test suite.

use crate::clock::SharedClock;
use crate::event::{
    ConnectivityEvent, ConnectivityState, DomEvent, DomSubtype, EventDescriptor, Level, LogEvent,
    NavigationEvent, SharedNetworkEvent, Transport,
};
use crate::host::Callback;
use crate::result::{InstrumentError, InstrumentResult};
use serde::Serialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Default number of breadcrumbs a queue retains
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;

/// One delivered event
#[derive(Debug, Serialize)]
pub struct Breadcrumb {
    /// When the sink received it
    pub timestamp_ms: u64,
    /// Severity; network breadcrumbs are re-levelled in place
    pub level: Cell<Level>,
    /// The descriptor
    pub body: EventDescriptor,
}

impl Breadcrumb {
    /// Create a breadcrumb
    #[must_use]
    pub fn new(timestamp_ms: u64, level: Level, body: EventDescriptor) -> Self {
        Self {
            timestamp_ms,
            level: Cell::new(level),
            body,
        }
    }

    /// Current severity
    #[must_use]
    pub fn level(&self) -> Level {
        self.level.get()
    }

    /// Re-level after the fact
    pub fn set_level(&self, level: Level) {
        self.level.set(level);
    }
}

/// The telemetry sink
pub trait Telemeter {
    /// Record a network call
    ///
    /// The descriptor stays shared; its status and end time are filled in
    /// later without another call. The returned handle is re-levelled as the
    /// status becomes known.
    fn capture_network(&self, descriptor: SharedNetworkEvent, transport: Transport) -> Rc<Breadcrumb>;

    /// Record a console line
    fn capture_log(&self, message: &str, level: Level);

    /// Record a click or input
    fn capture_dom(&self, subtype: DomSubtype, element: &str, value: Option<&str>, checked: Option<bool>);

    /// Record a URL change
    fn capture_navigation(&self, from: &str, to: &str);

    /// Record an online/offline change
    fn capture_connectivity_change(&self, state: ConnectivityState);

    /// Severity policy for a raw status code
    fn level_from_status(&self, status: u16) -> Level {
        level_from_status(status)
    }
}

/// Default status severity: 2xx/3xx info, 0 or 4xx/5xx error
#[must_use]
pub const fn level_from_status(status: u16) -> Level {
    match status {
        200..=399 => Level::Info,
        0 | 400.. => Level::Error,
        _ => Level::Info,
    }
}

/// The error-boundary facility
pub trait ErrorBoundary {
    /// Wrap `callback` so its failures are reported before propagating
    ///
    /// `on_invoke`, when given, runs before `callback` on every call.
    fn wrap(&self, callback: Callback, on_invoke: Option<Callback>) -> Callback;
}

/// Formats console arguments into one message
pub type ArgFormatter = Rc<dyn Fn(&[Value]) -> String>;

/// Join arguments with spaces; strings verbatim, everything else as JSON
#[must_use]
pub fn format_args_as_string(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Default formatter handle
#[must_use]
pub fn default_formatter() -> ArgFormatter {
    Rc::new(|args: &[Value]| format_args_as_string(args))
}

/// Bounded in-memory breadcrumb sink
pub struct BreadcrumbQueue {
    clock: SharedClock,
    max_breadcrumbs: usize,
    queue: RefCell<VecDeque<Rc<Breadcrumb>>>,
}

impl BreadcrumbQueue {
    /// Queue holding [`DEFAULT_MAX_BREADCRUMBS`]
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self::with_capacity(clock, DEFAULT_MAX_BREADCRUMBS)
    }

    /// Queue holding at most `max_breadcrumbs`
    #[must_use]
    pub fn with_capacity(clock: SharedClock, max_breadcrumbs: usize) -> Self {
        Self {
            clock,
            max_breadcrumbs,
            queue: RefCell::new(VecDeque::new()),
        }
    }

    /// Append a breadcrumb, dropping the oldest past capacity
    pub fn capture(&self, body: EventDescriptor, level: Level) -> Rc<Breadcrumb> {
        let breadcrumb = Rc::new(Breadcrumb::new(self.clock.now_ms(), level, body));
        let mut queue = self.queue.borrow_mut();
        queue.push_back(Rc::clone(&breadcrumb));
        while queue.len() > self.max_breadcrumbs {
            queue.pop_front();
        }
        breadcrumb
    }

    /// Retained breadcrumbs, oldest first
    #[must_use]
    pub fn breadcrumbs(&self) -> Vec<Rc<Breadcrumb>> {
        self.queue.borrow().iter().cloned().collect()
    }

    /// Retained breadcrumbs of one type
    #[must_use]
    pub fn of_kind(&self, kind: &str) -> Vec<Rc<Breadcrumb>> {
        self.queue
            .borrow()
            .iter()
            .filter(|breadcrumb| breadcrumb.body.kind() == kind)
            .cloned()
            .collect()
    }

    /// Number retained
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Whether nothing is retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
    }

    /// Export retained breadcrumbs as a JSON array
    pub fn to_json(&self) -> InstrumentResult<String> {
        let queue = self.queue.borrow();
        let breadcrumbs: Vec<&Breadcrumb> = queue.iter().map(|b| b.as_ref()).collect();
        Ok(serde_json::to_string(&breadcrumbs)?)
    }
}

impl fmt::Debug for BreadcrumbQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreadcrumbQueue")
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("len", &self.len())
            .finish()
    }
}

impl Telemeter for BreadcrumbQueue {
    fn capture_network(&self, descriptor: SharedNetworkEvent, transport: Transport) -> Rc<Breadcrumb> {
        tracing::trace!(transport = transport.as_str(), "network breadcrumb");
        self.capture(EventDescriptor::Network(descriptor), Level::Info)
    }

    fn capture_log(&self, message: &str, level: Level) {
        self.capture(
            EventDescriptor::Log(LogEvent {
                message: message.to_string(),
                level,
            }),
            level,
        );
    }

    fn capture_dom(&self, subtype: DomSubtype, element: &str, value: Option<&str>, checked: Option<bool>) {
        self.capture(
            EventDescriptor::Dom(DomEvent {
                subtype,
                element: element.to_string(),
                value: value.map(String::from),
                checked,
            }),
            Level::Info,
        );
    }

    fn capture_navigation(&self, from: &str, to: &str) {
        self.capture(
            EventDescriptor::Navigation(NavigationEvent {
                from: from.to_string(),
                to: to.to_string(),
            }),
            Level::Info,
        );
    }

    fn capture_connectivity_change(&self, state: ConnectivityState) {
        self.capture(
            EventDescriptor::Connectivity(ConnectivityEvent { change: state }),
            Level::Info,
        );
    }
}

/// Error boundary that records what it reports
#[derive(Debug, Clone, Default)]
pub struct ReportingBoundary {
    reported: Rc<RefCell<Vec<String>>>,
}

impl ReportingBoundary {
    /// Create a boundary with no reports
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages of every reported failure
    #[must_use]
    pub fn reported(&self) -> Vec<String> {
        self.reported.borrow().clone()
    }

    fn report(reported: &RefCell<Vec<String>>, err: &InstrumentError) {
        tracing::warn!(error = %err, "host callback failed");
        reported.borrow_mut().push(err.to_string());
    }
}

impl ErrorBoundary for ReportingBoundary {
    fn wrap(&self, callback: Callback, on_invoke: Option<Callback>) -> Callback {
        let reported = Rc::clone(&self.reported);
        Rc::new(move || {
            if let Some(on_invoke) = &on_invoke {
                if let Err(err) = on_invoke() {
                    Self::report(&reported, &err);
                }
            }
            let result = callback();
            if let Err(err) = &result {
                Self::report(&reported, err);
            }
            result
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::event::NetworkEvent;
    use serde_json::json;

    fn queue(capacity: usize) -> (FakeClock, BreadcrumbQueue) {
        let clock = FakeClock::fixed(1_000);
        let queue = BreadcrumbQueue::with_capacity(Rc::new(clock.clone()), capacity);
        (clock, queue)
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn test_level_from_status() {
            assert_eq!(level_from_status(200), Level::Info);
            assert_eq!(level_from_status(304), Level::Info);
            assert_eq!(level_from_status(0), Level::Error);
            assert_eq!(level_from_status(404), Level::Error);
            assert_eq!(level_from_status(503), Level::Error);
            assert_eq!(level_from_status(101), Level::Info);
        }

        #[test]
        fn test_format_args() {
            let message = format_args_as_string(&[json!("count"), json!(3), json!({"a": 1}), json!(null)]);
            assert_eq!(message, r#"count 3 {"a":1} null"#);
            assert_eq!(format_args_as_string(&[]), "");
            assert_eq!(default_formatter()(&[json!("x"), json!(true)]), "x true");
        }
    }

    mod queue_tests {
        use super::*;

        #[test]
        fn test_capacity_drops_oldest() {
            let (_, queue) = queue(2);
            queue.capture_log("one", Level::Info);
            queue.capture_log("two", Level::Info);
            queue.capture_log("three", Level::Warning);
            let messages: Vec<_> = queue
                .breadcrumbs()
                .iter()
                .map(|b| match &b.body {
                    EventDescriptor::Log(log) => log.message.clone(),
                    _ => String::new(),
                })
                .collect();
            assert_eq!(messages, ["two", "three"]);
        }

        #[test]
        fn test_timestamps_from_clock() {
            let (clock, queue) = queue(10);
            queue.capture_connectivity_change(ConnectivityState::Offline);
            clock.fast_forward_ms(5);
            queue.capture_navigation("/a", "/b");
            let stamps: Vec<_> = queue.breadcrumbs().iter().map(|b| b.timestamp_ms).collect();
            assert_eq!(stamps, [1_000, 1_005]);
            assert_eq!(queue.of_kind("navigation").len(), 1);
        }

        #[test]
        fn test_network_handle_relevels_in_place() {
            let (_, queue) = queue(10);
            let descriptor = NetworkEvent::new("GET", "/x", 0, Transport::Xhr).shared();
            let handle = queue.capture_network(descriptor.clone(), Transport::Xhr);
            handle.set_level(Level::Error);
            descriptor.borrow_mut().status_code = Some(500);
            let stored = &queue.breadcrumbs()[0];
            assert_eq!(stored.level(), Level::Error);
            assert_eq!(stored.body.network().unwrap().status_code, Some(500));
        }

        #[test]
        fn test_to_json() {
            let (_, queue) = queue(10);
            queue.capture_dom(DomSubtype::Input, "input#q", Some("rust"), None);
            queue.clear();
            assert!(queue.is_empty());
            queue.capture_dom(DomSubtype::Click, "a#home", None, None);
            let exported: serde_json::Value = serde_json::from_str(&queue.to_json().unwrap()).unwrap();
            assert_eq!(exported[0]["level"], "info");
            assert_eq!(exported[0]["body"]["type"], "dom");
            assert_eq!(exported[0]["body"]["body"]["element"], "a#home");
        }
    }

    mod boundary_tests {
        use super::*;

        #[test]
        fn test_wrap_runs_on_invoke_first() {
            let boundary = ReportingBoundary::new();
            let order = Rc::new(RefCell::new(Vec::new()));
            let first = Rc::clone(&order);
            let second = Rc::clone(&order);
            let wrapped = boundary.wrap(
                Rc::new(move || {
                    second.borrow_mut().push("callback");
                    Ok(())
                }),
                Some(Rc::new(move || {
                    first.borrow_mut().push("on_invoke");
                    Ok(())
                })),
            );
            wrapped().unwrap();
            assert_eq!(*order.borrow(), ["on_invoke", "callback"]);
            assert!(boundary.reported().is_empty());
        }

        #[test]
        fn test_wrap_reports_and_propagates() {
            let boundary = ReportingBoundary::new();
            let wrapped = boundary.wrap(Rc::new(|| Err(InstrumentError::callback("bad handler"))), None);
            assert!(wrapped().is_err());
            assert_eq!(boundary.reported(), ["Host callback failed: bad handler"]);
        }
    }
}
