//! Network interceptor: request objects and `fetch`.

use super::Context;
use crate::event::{NetworkEvent, SharedNetworkEvent, Transport};
use crate::host::{
    Callback, FetchFn, FetchInit, FetchInput, ReadyState, Slot, WeakXhrRequest, Window,
    XhrOpenFn, XhrPrototype, XhrRequest, XhrSendFn,
};
use crate::ledger::{wrap, PatchLedger};
use crate::result::{InstrumentError, InstrumentResult};
use crate::sink::Breadcrumb;
use futures::FutureExt;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Status some hosts report in place of 204
const NO_CONTENT_QUIRK: u16 = 1223;

/// Map host status quirks onto real HTTP codes
#[must_use]
pub const fn normalize_status(status: u16) -> u16 {
    if status == NO_CONTENT_QUIRK {
        204
    } else {
        status
    }
}

/// `{method, url}` of one `fetch` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    /// Effective method
    pub method: String,
    /// Requested URL
    pub url: String,
}

impl ResolvedCall {
    /// Resolve the call shape; an options method beats a request method,
    /// and `GET` applies when neither is given
    #[must_use]
    pub fn resolve(input: &FetchInput, init: Option<&FetchInit>) -> Self {
        let (url, request_method) = match input {
            FetchInput::Url(url) => (url.clone(), None),
            FetchInput::Request { url, method } => (url.clone(), method.clone()),
        };
        let method = init
            .and_then(|init| init.method.clone())
            .or(request_method)
            .unwrap_or_else(|| "GET".to_string());
        Self { method, url }
    }
}

pub(crate) fn install(
    ctx: &Rc<Context>,
    window: &Window,
    ledger: &PatchLedger,
) -> InstrumentResult<()> {
    if window.xhr.is_none() && window.fetch.is_none() {
        return Err(InstrumentError::missing("network", "XMLHttpRequest or fetch"));
    }
    if let Some(prototype) = &window.xhr {
        instrument_xhr(ctx, prototype, ledger)?;
    }
    if let Some(fetch) = &window.fetch {
        instrument_fetch(ctx, fetch, ledger)?;
    }
    Ok(())
}

fn instrument_xhr(
    ctx: &Rc<Context>,
    prototype: &XhrPrototype,
    ledger: &PatchLedger,
) -> InstrumentResult<()> {
    let open_ctx = Rc::clone(ctx);
    wrap(
        &prototype.open,
        move |original: XhrOpenFn| -> XhrOpenFn {
            Rc::new(move |xhr: &XhrRequest, method: &str, url: &Value| {
                let tracked = url.as_str().map(|url| {
                    NetworkEvent::new(method, url, open_ctx.now_ms(), Transport::Xhr).shared()
                });
                xhr.set_tracked(tracked);
                original(xhr, method, url);
            })
        },
        Some(ledger),
    )?;

    let send_ctx = Rc::clone(ctx);
    wrap(
        &prototype.send,
        move |original: XhrSendFn| -> XhrSendFn {
            Rc::new(move |xhr: &XhrRequest, body: Option<&str>| {
                if let Err(err) = observe_completion(&send_ctx, xhr) {
                    tracing::trace!(error = %err, "request completion not observed");
                }
                original(xhr, body);
            })
        },
        Some(ledger),
    )
}

/// Hook one request's callbacks
///
/// These substitutions live and die with the request, so they stay out of
/// the ledger.
fn observe_completion(ctx: &Rc<Context>, xhr: &XhrRequest) -> InstrumentResult<()> {
    for slot in [xhr.onload(), xhr.onerror(), xhr.onprogress()] {
        guard_callback(ctx, slot)?;
    }

    let handler = readystate_handler(ctx, xhr.downgrade());
    let slot = xhr.onreadystatechange();
    if slot.get().is_some() {
        let boundary = Rc::clone(&ctx.boundary);
        wrap(
            slot,
            move |existing: Option<Callback>| {
                existing.map(|existing| boundary.wrap(existing, Some(handler)))
            },
            None,
        )
    } else {
        slot.set(Some(handler));
        Ok(())
    }
}

/// Route a user callback through the error boundary
fn guard_callback(ctx: &Context, slot: &Slot<Option<Callback>>) -> InstrumentResult<()> {
    let boundary = Rc::clone(&ctx.boundary);
    wrap(
        slot,
        move |handler: Option<Callback>| handler.map(|handler| boundary.wrap(handler, None)),
        None,
    )
}

fn readystate_handler(ctx: &Rc<Context>, request: WeakXhrRequest) -> Callback {
    let ctx = Rc::clone(ctx);
    let emitted: RefCell<Option<Rc<Breadcrumb>>> = RefCell::new(None);
    Rc::new(move || {
        let Some(xhr) = request.upgrade() else {
            return Ok(());
        };
        let Some(descriptor) = xhr.tracked() else {
            return Ok(());
        };
        let state = xhr.ready_state();
        if !matches!(state, ReadyState::Opened | ReadyState::Done) {
            return Ok(());
        }

        let first = descriptor.borrow().status_code.is_none();
        if first {
            descriptor.borrow_mut().status_code = Some(0);
            let handle = ctx
                .telemeter
                .capture_network(Rc::clone(&descriptor), Transport::Xhr);
            emitted.replace(Some(handle));
        }

        let now = ctx.now_ms();
        if state == ReadyState::Opened {
            descriptor.borrow_mut().start_time_ms = now;
        } else {
            descriptor.borrow_mut().end_time_ms = Some(now);
        }

        match xhr.status() {
            Ok(status) => refine_status(&ctx, &descriptor, emitted.borrow().as_ref(), status),
            Err(err) => tracing::trace!(error = %err, "keeping last known status"),
        }
        Ok(())
    })
}

fn refine_status(
    ctx: &Context,
    descriptor: &SharedNetworkEvent,
    handle: Option<&Rc<Breadcrumb>>,
    status: u16,
) {
    let status = normalize_status(status);
    descriptor.borrow_mut().status_code = Some(status);
    if let Some(handle) = handle {
        handle.set_level(ctx.telemeter.level_from_status(status));
    }
}

fn instrument_fetch(
    ctx: &Rc<Context>,
    fetch: &Slot<FetchFn>,
    ledger: &PatchLedger,
) -> InstrumentResult<()> {
    let ctx = Rc::clone(ctx);
    wrap(
        fetch,
        move |original: FetchFn| -> FetchFn {
            Rc::new(move |input: FetchInput, init: Option<FetchInit>| {
                let call = ResolvedCall::resolve(&input, init.as_ref());
                let descriptor =
                    NetworkEvent::new(call.method, call.url, ctx.now_ms(), Transport::Fetch)
                        .shared();
                let handle = ctx
                    .telemeter
                    .capture_network(Rc::clone(&descriptor), Transport::Fetch);
                let ctx = Rc::clone(&ctx);
                original(input, init)
                    .inspect(move |result| {
                        if let Ok(response) = result {
                            descriptor.borrow_mut().end_time_ms = Some(ctx.now_ms());
                            refine_status(&ctx, &descriptor, Some(&handle), response.status);
                        }
                    })
                    .boxed_local()
            })
        },
        Some(ledger),
    )
}
