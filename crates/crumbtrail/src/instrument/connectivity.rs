//! Connectivity interceptor: online/offline signals.

use super::Context;
use crate::event::ConnectivityState;
use crate::host::{Body, Callback, HostEvent, Listener, Slot, Window};
use crate::ledger::{wrap, PatchLedger};
use crate::result::{InstrumentError, InstrumentResult};
use std::rc::Rc;

pub(crate) fn install(
    ctx: &Rc<Context>,
    window: &Window,
    ledger: &PatchLedger,
) -> InstrumentResult<()> {
    if let Some(target) = &window.listeners {
        for state in [ConnectivityState::Online, ConnectivityState::Offline] {
            ledger.record_listener(target, state.as_str(), listener(ctx, state), true)?;
        }
        Ok(())
    } else if let Some(body) = &window.document.body {
        install_body_handlers(ctx, body, ledger)
    } else {
        Err(InstrumentError::missing(
            "connectivity",
            "addEventListener or document.body",
        ))
    }
}

fn listener(ctx: &Rc<Context>, state: ConnectivityState) -> Listener {
    let ctx = Rc::clone(ctx);
    Rc::new(move |_: &HostEvent| ctx.telemeter.capture_connectivity_change(state))
}

fn install_body_handlers(ctx: &Rc<Context>, body: &Body, ledger: &PatchLedger) -> InstrumentResult<()> {
    let handlers: [(&Slot<Option<Callback>>, ConnectivityState); 2] = [
        (&body.ononline, ConnectivityState::Online),
        (&body.onoffline, ConnectivityState::Offline),
    ];
    for (slot, state) in handlers {
        let ctx = Rc::clone(ctx);
        wrap(
            slot,
            move |previous: Option<Callback>| -> Option<Callback> {
                let handler: Callback = Rc::new(move || {
                    ctx.telemeter.capture_connectivity_change(state);
                    match &previous {
                        Some(previous) => previous(),
                        None => Ok(()),
                    }
                });
                Some(handler)
            },
            Some(ledger),
        )?;
    }
    Ok(())
}
