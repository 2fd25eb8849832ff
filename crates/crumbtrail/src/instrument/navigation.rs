//! Navigation interceptor: history push and pop.

use super::Context;
use crate::host::{Callback, PushStateFn, Window};
use crate::ledger::{wrap, PatchLedger};
use crate::result::{InstrumentError, InstrumentResult};
use serde_json::Value;
use std::rc::Rc;
use url::Url;

pub(crate) fn install(
    ctx: &Rc<Context>,
    window: &Window,
    ledger: &PatchLedger,
) -> InstrumentResult<()> {
    if window.packaged_app {
        return Err(InstrumentError::missing("navigation", "address bar"));
    }
    let history = window
        .history
        .as_ref()
        .ok_or_else(|| InstrumentError::missing("navigation", "history.pushState"))?;

    let pop_ctx = Rc::clone(ctx);
    wrap(
        &window.onpopstate,
        move |previous: Option<Callback>| -> Option<Callback> {
            let handler: Callback = Rc::new(move || {
                let current = pop_ctx.location.href();
                handle_url_change(&pop_ctx, &current);
                match &previous {
                    Some(previous) => previous(),
                    None => Ok(()),
                }
            });
            Some(handler)
        },
        Some(ledger),
    )?;

    let push_ctx = Rc::clone(ctx);
    wrap(
        &history.push_state,
        move |original: PushStateFn| -> PushStateFn {
            Rc::new(move |state: &Value, title: &str, url: Option<&str>| {
                if let Some(to) = url.filter(|to| !to.is_empty()) {
                    handle_url_change(&push_ctx, to);
                }
                original(state, title, url);
            })
        },
        Some(ledger),
    )
}

/// Record a move from the last known URL to `to`
fn handle_url_change(ctx: &Context, to: &str) {
    let from = ctx.last_href.replace(to.to_string());
    let document_href = ctx.location.href();
    let from = normalize_url(&document_href, &from);
    let to = normalize_url(&document_href, to);
    ctx.telemeter.capture_navigation(&from, &to);
}

/// Collapse `raw` to path, query and fragment when it shares the
/// document's scheme, host and port
///
/// Ports are compared after parsing, so a scheme's default port written
/// out explicitly (`https://a.com:443/`) matches a document URL that omits
/// it. Anything else, including relative or unparsable input, is returned
/// unchanged.
///
/// ```
/// use crumbtrail::instrument::normalize_url;
///
/// assert_eq!(normalize_url("https://a.com/x", "https://a.com/z#frag"), "/z#frag");
/// assert_eq!(normalize_url("https://a.com/x", "https://a.com:443/z"), "/z");
/// assert_eq!(normalize_url("https://a.com/x", "https://other.com/z"), "https://other.com/z");
/// ```
#[must_use]
pub fn normalize_url(document_href: &str, raw: &str) -> String {
    let (Ok(document), Ok(url)) = (Url::parse(document_href), Url::parse(raw)) else {
        return raw.to_string();
    };
    let same_origin = document.scheme() == url.scheme()
        && document.host_str() == url.host_str()
        && document.port() == url.port();
    if !same_origin {
        return raw.to_string();
    }
    let mut collapsed = url.path().to_string();
    if let Some(query) = url.query() {
        collapsed.push('?');
        collapsed.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        collapsed.push('#');
        collapsed.push_str(fragment);
    }
    collapsed
}
