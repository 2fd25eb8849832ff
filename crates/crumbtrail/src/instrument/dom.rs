//! DOM interceptor: clicks and blurs.

use super::summary::element_summary;
use super::Context;
use crate::event::DomSubtype;
use crate::host::{Document, Element, HostEvent, Listener, Window};
use crate::ledger::PatchLedger;
use crate::result::{InstrumentError, InstrumentResult};
use std::rc::Rc;

type Classifier = fn(&Context, &Rc<Element>);

pub(crate) fn install(
    ctx: &Rc<Context>,
    window: &Window,
    ledger: &PatchLedger,
) -> InstrumentResult<()> {
    if let Some(target) = &window.listeners {
        ledger.record_listener(target, "click", listener(ctx, handle_click), true)?;
        ledger.record_listener(target, "blur", listener(ctx, handle_blur), true)?;
        Ok(())
    } else if let Some(legacy) = &window.legacy_listeners {
        ledger.record_listener(legacy, "click", listener(ctx, handle_click), false)?;
        ledger.record_listener(legacy, "onfocusout", listener(ctx, handle_blur), false)?;
        Ok(())
    } else {
        Err(InstrumentError::missing("dom", "addEventListener or attachEvent"))
    }
}

fn listener(ctx: &Rc<Context>, classify: Classifier) -> Listener {
    let ctx = Rc::clone(ctx);
    Rc::new(move |event: &HostEvent| match resolve_target(&ctx.document, event) {
        Some(element) => classify(&ctx, &element),
        None => tracing::trace!("event target not resolvable"),
    })
}

/// The event's own target, else whatever sits under the pointer
fn resolve_target(document: &Document, event: &HostEvent) -> Option<Rc<Element>> {
    event.target.clone().or_else(|| {
        document
            .element_from_point
            .as_ref()
            .and_then(|hit_test| hit_test(event.client_x, event.client_y))
    })
}

/// Lower-cased `type` attribute, empty when absent
fn element_type(element: &Element) -> String {
    element
        .get_attribute("type")
        .unwrap_or_default()
        .to_lowercase()
}

fn handle_click(ctx: &Context, element: &Rc<Element>) {
    let tag = element.tag_name().to_lowercase();
    let kind = element_type(element);
    match (tag.as_str(), kind.as_str()) {
        ("a" | "button", _) | ("input", "button" | "submit") => {
            capture_dom_event(ctx, DomSubtype::Click, element, None, None);
        }
        ("input", "checkbox" | "radio") => capture_dom_event(
            ctx,
            DomSubtype::Input,
            element,
            Some(element.value()),
            Some(element.checked()),
        ),
        _ => {}
    }
}

fn handle_blur(ctx: &Context, element: &Rc<Element>) {
    let tag = element.tag_name().to_lowercase();
    match tag.as_str() {
        "textarea" => {
            capture_dom_event(ctx, DomSubtype::Input, element, Some(element.value()), None);
        }
        "select" if !element.options().is_empty() => handle_selection(ctx, element),
        "input"
            if !matches!(
                element_type(element).as_str(),
                "button" | "submit" | "hidden" | "checkbox" | "radio"
            ) =>
        {
            capture_dom_event(ctx, DomSubtype::Input, element, Some(element.value()), None);
        }
        _ => {}
    }
}

fn handle_selection(ctx: &Context, element: &Rc<Element>) {
    let options = element.options();
    if element.multiple() {
        for option in options.into_iter().filter(|option| option.selected) {
            capture_dom_event(ctx, DomSubtype::Input, element, Some(option.value), None);
        }
    } else if let Some(option) = element
        .selected_index()
        .and_then(|index| options.into_iter().nth(index))
    {
        capture_dom_event(ctx, DomSubtype::Input, element, Some(option.value), None);
    }
}

/// Sole constructor of DOM breadcrumbs; password values never leave here
fn capture_dom_event(
    ctx: &Context,
    subtype: DomSubtype,
    element: &Rc<Element>,
    value: Option<String>,
    checked: Option<bool>,
) {
    let value = value.filter(|_| element_type(element) != "password");
    let summary = element_summary(element);
    ctx.telemeter
        .capture_dom(subtype, &summary, value.as_deref(), checked);
}
