//! Event descriptors handed to the telemetry sink.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Breadcrumb severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Debug output
    Debug,
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Critical failure
    ///
    /// Never produced by the interceptors; sinks may assign it to their own
    /// breadcrumbs.
    Critical,
    /// Plain `console.log`
    Log,
}

impl Level {
    /// Lower-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call shape a network event was observed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Callback-driven request object
    Xhr,
    /// Promise/future-returning fetch call
    Fetch,
}

impl Transport {
    /// Lower-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Xhr => "xhr",
            Self::Fetch => "fetch",
        }
    }
}

/// Kind of DOM interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomSubtype {
    /// Activation of a link, button, or button-like input
    Click,
    /// A form control's value was observed
    Input,
}

/// Host connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Host came online
    Online,
    /// Host went offline
    Offline,
}

impl ConnectivityState {
    /// Lower-case name, also the host signal name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// Instrumentation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Request objects and fetch
    Network,
    /// Console methods
    Log,
    /// Click and blur listeners
    Dom,
    /// History push and pop
    Navigation,
    /// Online/offline signals
    Connectivity,
}

impl Category {
    /// Every category, in install order
    pub const ALL: [Self; 5] = [
        Self::Network,
        Self::Log,
        Self::Dom,
        Self::Navigation,
        Self::Connectivity,
    ];

    /// Config key for this category
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Log => "log",
            Self::Dom => "dom",
            Self::Navigation => "navigation",
            Self::Connectivity => "connectivity",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An observed network call
///
/// `status_code` and `end_time_ms` are refined in place after emission; they
/// are never reset to `None` once set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEvent {
    /// HTTP method as passed by the caller
    pub method: String,
    /// Request URL as passed by the caller
    pub url: String,
    /// Response status, `None` while unknown
    pub status_code: Option<u16>,
    /// When the call started
    pub start_time_ms: u64,
    /// When the call completed
    pub end_time_ms: Option<u64>,
    /// Call shape
    pub transport: Transport,
}

impl NetworkEvent {
    /// Create an in-flight descriptor
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        start_time_ms: u64,
        transport: Transport,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            status_code: None,
            start_time_ms,
            end_time_ms: None,
            transport,
        }
    }

    /// Wrap for shared in-place mutation
    #[must_use]
    pub fn shared(self) -> SharedNetworkEvent {
        Rc::new(RefCell::new(self))
    }
}

/// Network descriptor shared between the interceptor and the sink
pub type SharedNetworkEvent = Rc<RefCell<NetworkEvent>>;

/// A console call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Formatted arguments
    pub message: String,
    /// Severity derived from the console method
    pub level: Level,
}

/// A click or input observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomEvent {
    /// Interaction kind
    pub subtype: DomSubtype,
    /// Bounded ancestry summary of the element
    pub element: String,
    /// Captured value, suppressed for password inputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Checked state for checkboxes and radios
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

/// A URL transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEvent {
    /// Previous location
    pub from: String,
    /// New location
    pub to: String,
}

/// An online/offline transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityEvent {
    /// New state
    pub change: ConnectivityState,
}

/// Normalized, sink-bound observation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "lowercase")]
pub enum EventDescriptor {
    /// Network call, shared for later refinement
    Network(SharedNetworkEvent),
    /// Console line
    Log(LogEvent),
    /// DOM interaction
    Dom(DomEvent),
    /// URL change
    Navigation(NavigationEvent),
    /// Connectivity change
    Connectivity(ConnectivityEvent),
}

impl EventDescriptor {
    /// Breadcrumb type name
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Log(_) => "log",
            Self::Dom(_) => "dom",
            Self::Navigation(_) => "navigation",
            Self::Connectivity(_) => "connectivity",
        }
    }

    /// Current snapshot of a network descriptor
    #[must_use]
    pub fn network(&self) -> Option<NetworkEvent> {
        match self {
            Self::Network(shared) => Some(shared.borrow().clone()),
            _ => None,
        }
    }
}
