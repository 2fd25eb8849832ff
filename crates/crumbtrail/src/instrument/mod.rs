//! Instrumentation Controller
//!
//! Reads the capability configuration, asks each enabled interceptor to
//! install itself against the [`Window`], and keeps every substitution in one
//! [`PatchLedger`] so [`Instrumenter::restore`] can undo them all.
//!
//! ```text
//! ┌──────────────┐ install ┌─────────────┐ wrap() ┌─────────────┐
//! │ Instrumenter │───────► │ Interceptor │──────► │ PatchLedger │
//! └──────┬───────┘         └──────┬──────┘        └──────▲──────┘
//!        │                        │ capture_*()          │
//!        │ restore()              ▼                      │
//!        │                 ┌─────────────┐               │
//!        └─────────────────┼─ Telemeter  │  ─────────────┘
//!                          └─────────────┘
//! ```

mod connectivity;
mod console;
mod dom;
mod navigation;
mod network;
pub mod summary;

pub use navigation::normalize_url;
pub use network::{normalize_status, ResolvedCall};

use crate::clock::{system_clock, SharedClock};
use crate::config::AutoInstrument;
use crate::event::Category;
use crate::host::{Document, Location, Window};
use crate::ledger::PatchLedger;
use crate::result::InstrumentResult;
use crate::sink::{default_formatter, ArgFormatter, ErrorBoundary, Telemeter};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// State shared by every installed interceptor
///
/// Closures installed into the host hold this, never the ledger itself.
pub(crate) struct Context {
    pub(crate) telemeter: Rc<dyn Telemeter>,
    pub(crate) boundary: Rc<dyn ErrorBoundary>,
    pub(crate) clock: SharedClock,
    pub(crate) formatter: ArgFormatter,
    pub(crate) location: Location,
    pub(crate) document: Document,
    pub(crate) last_href: RefCell<String>,
}

impl Context {
    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

/// Builder for [`Instrumenter`]
pub struct InstrumenterBuilder {
    config: AutoInstrument,
    telemeter: Rc<dyn Telemeter>,
    boundary: Rc<dyn ErrorBoundary>,
    window: Window,
    clock: SharedClock,
    formatter: ArgFormatter,
}

impl InstrumenterBuilder {
    /// Set the capability configuration
    #[must_use]
    pub fn config(mut self, config: AutoInstrument) -> Self {
        self.config = config;
        self
    }

    /// Set the time source
    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Set the console argument formatter
    #[must_use]
    pub fn formatter(mut self, formatter: ArgFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Build the instrumenter (nothing is installed yet)
    #[must_use]
    pub fn build(self) -> Instrumenter {
        let context = Context {
            telemeter: self.telemeter,
            boundary: self.boundary,
            clock: self.clock,
            formatter: self.formatter,
            location: self.window.location.clone(),
            document: self.window.document.clone(),
            last_href: RefCell::new(self.window.location.href()),
        };
        Instrumenter {
            config: self.config,
            window: self.window,
            ledger: PatchLedger::new(),
            context: Rc::new(context),
            installed: false,
        }
    }
}

impl fmt::Debug for InstrumenterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumenterBuilder")
            .field("config", &self.config)
            .field("window", &self.window)
            .finish()
    }
}

/// Installs and removes every interceptor
pub struct Instrumenter {
    config: AutoInstrument,
    window: Window,
    ledger: PatchLedger,
    context: Rc<Context>,
    installed: bool,
}

impl Instrumenter {
    /// Start building an instrumenter for `window`
    #[must_use]
    pub fn builder(
        window: Window,
        telemeter: Rc<dyn Telemeter>,
        boundary: Rc<dyn ErrorBoundary>,
    ) -> InstrumenterBuilder {
        InstrumenterBuilder {
            config: AutoInstrument::default(),
            telemeter,
            boundary,
            window,
            clock: system_clock(),
            formatter: default_formatter(),
        }
    }

    /// Instrumenter with the wall clock and default formatter
    #[must_use]
    pub fn new(
        config: AutoInstrument,
        telemeter: Rc<dyn Telemeter>,
        boundary: Rc<dyn ErrorBoundary>,
        window: Window,
    ) -> Self {
        Self::builder(window, telemeter, boundary)
            .config(config)
            .build()
    }

    /// Install every enabled category
    ///
    /// Never fails: a category whose host capability is missing, or whose
    /// entry points are already patched, is logged and skipped.
    pub fn install(&mut self) {
        if self.installed {
            tracing::debug!("instrumentation already installed");
            return;
        }
        for category in self.config.enabled_categories() {
            match self.install_category(category) {
                Ok(()) => tracing::debug!(%category, "instrumented"),
                Err(err) => tracing::debug!(%category, error = %err, "skipped"),
            }
        }
        self.installed = true;
    }

    fn install_category(&self, category: Category) -> InstrumentResult<()> {
        let (ctx, window, ledger) = (&self.context, &self.window, &self.ledger);
        match category {
            Category::Network => network::install(ctx, window, ledger),
            Category::Log => console::install(ctx, window, ledger),
            Category::Dom => dom::install(ctx, window, ledger),
            Category::Navigation => navigation::install(ctx, window, ledger),
            Category::Connectivity => connectivity::install(ctx, window, ledger),
        }
    }

    /// Undo every substitution and empty the ledger
    pub fn restore(&mut self) {
        let count = self.ledger.restore();
        tracing::debug!(count, "instrumentation restored");
        self.installed = false;
    }

    /// Whether `install` has run since the last `restore`
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        self.installed
    }

    /// Active substitutions
    #[must_use]
    pub const fn ledger(&self) -> &PatchLedger {
        &self.ledger
    }

    /// Capability configuration in effect
    #[must_use]
    pub const fn config(&self) -> &AutoInstrument {
        &self.config
    }

    /// The instrumented host
    #[must_use]
    pub const fn window(&self) -> &Window {
        &self.window
    }

    /// Last URL a navigation breadcrumb moved to
    #[must_use]
    pub fn last_href(&self) -> String {
        self.context.last_href.borrow().clone()
    }
}

impl fmt::Debug for Instrumenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumenter")
            .field("config", &self.config)
            .field("installed", &self.installed)
            .field("ledger", &self.ledger)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clock::FakeClock;
    use crate::host::{ConsoleOutput, FetchResponse};
    use crate::sink::{BreadcrumbQueue, ReportingBoundary};

    /// Everything a test needs to drive one instrumented host
    pub(crate) struct Harness {
        pub(crate) instrumenter: Instrumenter,
        pub(crate) queue: Rc<BreadcrumbQueue>,
        pub(crate) boundary: ReportingBoundary,
        pub(crate) clock: FakeClock,
        pub(crate) output: ConsoleOutput,
    }

    impl Harness {
        pub(crate) fn window(&self) -> &Window {
            self.instrumenter.window()
        }
    }

    pub(crate) fn browser(href: &str) -> (Window, ConsoleOutput) {
        let output: ConsoleOutput = Rc::new(RefCell::new(Vec::new()));
        let window = Window::browser(href, |url, _| Ok(FetchResponse::new(200, url)), &output);
        (window, output)
    }

    pub(crate) fn harness_for(window: Window, output: ConsoleOutput, config: AutoInstrument) -> Harness {
        let clock = FakeClock::fixed(1_000);
        let queue = Rc::new(BreadcrumbQueue::new(Rc::new(clock.clone())));
        let boundary = ReportingBoundary::new();
        let mut instrumenter = Instrumenter::builder(window, queue.clone(), Rc::new(boundary.clone()))
            .config(config)
            .clock(Rc::new(clock.clone()))
            .build();
        instrumenter.install();
        Harness {
            instrumenter,
            queue,
            boundary,
            clock,
            output,
        }
    }

    pub(crate) fn harness(config: AutoInstrument) -> Harness {
        let (window, output) = browser("https://a.com/x");
        harness_for(window, output, config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::host::{ConsoleMethod, Element, FetchInput, HostEvent};
    use serde_json::json;

    fn patched_targets(instrumenter: &Instrumenter) -> Vec<String> {
        instrumenter
            .ledger()
            .entries()
            .into_iter()
            .map(|(target, property)| format!("{target}.{property}"))
            .collect()
    }

    #[test]
    fn test_install_all_records_every_category() {
        let h = harness(AutoInstrument::all());
        let targets = patched_targets(&h.instrumenter);
        for expected in [
            "XMLHttpRequest.prototype.open",
            "XMLHttpRequest.prototype.send",
            "window.fetch",
            "console.log",
            "window.click listener",
            "window.blur listener",
            "window.onpopstate",
            "history.pushState",
            "window.online listener",
            "window.offline listener",
        ] {
            assert!(targets.iter().any(|t| t == expected), "missing {expected}");
        }
        assert!(h.instrumenter.is_installed());
    }

    #[test]
    fn test_network_disabled_leaves_network_untouched() {
        let h = harness(AutoInstrument::all().with_network(false));
        let xhr = h.window().xhr.as_ref().unwrap();
        assert!(!h.instrumenter.ledger().touches(xhr.object().id()));
        let targets = patched_targets(&h.instrumenter);
        assert!(!targets.iter().any(|t| t == "window.fetch"));
        assert!(targets.iter().any(|t| t == "history.pushState"));
        assert!(targets.iter().any(|t| t == "console.warn"));

        let request = h.window().new_request().unwrap();
        request.open("GET", "/quiet");
        request.send(None);
        request.complete(200).unwrap();
        assert!(h.queue.of_kind("network").is_empty());
    }

    #[test]
    fn test_config_false_installs_nothing() {
        let h = harness(AutoInstrument::from_value(&json!(false)));
        assert!(h.instrumenter.ledger().is_empty());
        h.window().console.as_ref().unwrap().call(ConsoleMethod::Log, &[json!("quiet")]);
        assert!(h.queue.is_empty());
    }

    #[test]
    fn test_restore_returns_host_to_original_entry_points() {
        let (window, output) = browser("https://a.com/x");
        let xhr = window.xhr.clone().unwrap();
        let open_before = xhr.open.get();
        let send_before = xhr.send.get();
        let fetch_before = window.fetch.clone().unwrap().get();
        let push_before = window.history.clone().unwrap().push_state.get();
        let log_before = window.console.clone().unwrap().slot(ConsoleMethod::Log).get().unwrap();

        let mut h = harness_for(window, output, AutoInstrument::all());
        assert!(!Rc::ptr_eq(&xhr.open.get(), &open_before));
        h.instrumenter.restore();

        let window = h.window();
        assert!(Rc::ptr_eq(&xhr.open.get(), &open_before));
        assert!(Rc::ptr_eq(&xhr.send.get(), &send_before));
        assert!(Rc::ptr_eq(&window.fetch.as_ref().unwrap().get(), &fetch_before));
        assert!(Rc::ptr_eq(&window.history.as_ref().unwrap().push_state.get(), &push_before));
        let log_after = window.console.as_ref().unwrap().slot(ConsoleMethod::Log).get().unwrap();
        assert!(Rc::ptr_eq(&log_after, &log_before));
        assert!(window.onpopstate.get().is_none());
        let listeners = window.listeners.as_ref().unwrap();
        assert_eq!(listeners.listener_count("click"), 0);
        assert_eq!(listeners.listener_count("online"), 0);
        assert!(h.instrumenter.ledger().is_empty());
        assert!(!h.instrumenter.is_installed());

        let link = Element::new("a").into_rc();
        window.click(&HostEvent::on(&link));
        window.go_offline().unwrap();
        assert!(h.queue.is_empty());
    }

    #[test]
    fn test_reinstall_after_restore() {
        let mut h = harness(AutoInstrument::all());
        let installed = h.instrumenter.ledger().len();
        h.instrumenter.install();
        assert_eq!(h.instrumenter.ledger().len(), installed);
        h.instrumenter.restore();
        h.instrumenter.install();
        assert_eq!(h.instrumenter.ledger().len(), installed);
        let _ = h.window().fetch(FetchInput::from("/once"), None);
        assert_eq!(h.queue.of_kind("network").len(), 1);
    }

    #[test]
    fn test_bare_host_installs_nothing_and_never_fails() {
        let window = Window::bare("https://a.com/");
        let output = Rc::new(RefCell::new(Vec::new()));
        let h = harness_for(window, output, AutoInstrument::all());
        assert!(h.instrumenter.ledger().is_empty());
        assert!(h.instrumenter.is_installed());
    }

    #[test]
    fn test_last_href_starts_at_location() {
        let h = harness(AutoInstrument::none());
        assert_eq!(h.instrumenter.last_href(), "https://a.com/x");
        assert_eq!(h.instrumenter.config(), &AutoInstrument::none());
    }
}
