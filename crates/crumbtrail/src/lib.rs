//! Crumbtrail: Reversible Host Instrumentation for Breadcrumbs
//!
//! Crumbtrail substitutes well-known host entry points (request objects,
//! `fetch`, console methods, click/blur listeners, history, connectivity
//! signals) so that every use of them leaves a breadcrumb, and records each
//! substitution so it can be undone exactly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    CRUMBTRAIL Architecture                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ AutoInstr. │    │ Instrument │    │ Host       │            │
//! │   │ (config)   │───►│ -er        │───►│ Window     │            │
//! │   │            │    │            │    │ (slots)    │            │
//! │   └────────────┘    └─────┬──────┘    └─────┬──────┘            │
//! │                           │ records         │ intercepted calls │
//! │                     ┌─────▼──────┐    ┌─────▼──────┐            │
//! │                     │ Patch      │    │ Telemeter  │            │
//! │                     │ Ledger     │    │ (sink)     │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use crumbtrail::host::{ConsoleMethod, FetchError, Window};
//! use crumbtrail::{AutoInstrument, BreadcrumbQueue, Instrumenter, ReportingBoundary};
//! use serde_json::Value;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let output = Rc::new(RefCell::new(Vec::new()));
//! let window = Window::browser("https://example.com/", |_, _| Err(FetchError::new("offline")), &output);
//! let queue = Rc::new(BreadcrumbQueue::new(crumbtrail::clock::system_clock()));
//!
//! let mut instrumenter = Instrumenter::new(
//!     AutoInstrument::default(),
//!     queue.clone(),
//!     Rc::new(ReportingBoundary::new()),
//!     window,
//! );
//! instrumenter.install();
//!
//! let console = instrumenter.window().console.clone().unwrap();
//! console.call(ConsoleMethod::Warn, &[Value::from("disk almost full")]);
//! assert_eq!(queue.of_kind("log").len(), 1);
//!
//! instrumenter.restore();
//! assert!(instrumenter.ledger().is_empty());
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Time sources for breadcrumb timestamps
pub mod clock;

/// Capability configuration
#[allow(clippy::struct_excessive_bools)]
pub mod config;

/// Event descriptors handed to the sink
pub mod event;

/// In-process host environment model
///
/// Every patchable entry point is a [`host::Slot`].
#[allow(clippy::missing_const_for_fn)]
pub mod host;

/// Controller and interceptors
#[allow(clippy::missing_const_for_fn)]
pub mod instrument;

/// Patch Ledger and the `wrap` primitive
pub mod ledger;

mod result;

/// Sink and error-boundary contracts with in-process implementations
pub mod sink;

pub use config::AutoInstrument;
pub use event::{
    Category, ConnectivityEvent, ConnectivityState, DomEvent, DomSubtype, EventDescriptor, Level,
    LogEvent, NavigationEvent, NetworkEvent, SharedNetworkEvent, Transport,
};
pub use instrument::summary::{element_summary, ElementDescription};
pub use instrument::{normalize_url, Instrumenter, InstrumenterBuilder};
pub use ledger::{wrap, PatchLedger, PatchRecord};
pub use result::{InstrumentError, InstrumentResult};
pub use sink::{
    format_args_as_string, level_from_status, Breadcrumb, BreadcrumbQueue, ErrorBoundary,
    ReportingBoundary, Telemeter,
};
