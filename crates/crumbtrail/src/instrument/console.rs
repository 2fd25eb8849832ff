//! Console interceptor.

use super::Context;
use crate::host::{ConsoleFn, ConsoleMethod, Window};
use crate::ledger::{wrap, PatchLedger};
use crate::result::{InstrumentError, InstrumentResult};
use serde_json::Value;
use std::rc::Rc;

pub(crate) fn install(
    ctx: &Rc<Context>,
    window: &Window,
    ledger: &PatchLedger,
) -> InstrumentResult<()> {
    let console = window
        .console
        .as_ref()
        .filter(|console| console.slot(ConsoleMethod::Log).get().is_some())
        .ok_or_else(|| InstrumentError::missing("log", "console.log"))?;

    for method in ConsoleMethod::ALL {
        let ctx = Rc::clone(ctx);
        wrap(
            console.slot(method),
            move |original: Option<ConsoleFn>| -> Option<ConsoleFn> {
                let wrapped: ConsoleFn = Rc::new(move |args: &[Value]| {
                    let message = (ctx.formatter)(args);
                    ctx.telemeter.capture_log(&message, method.level());
                    if let Some(original) = &original {
                        original(args);
                    }
                });
                Some(wrapped)
            },
            Some(ledger),
        )?;
    }
    Ok(())
}
