//! Patch Ledger
//!
//! Every mutation of a host object goes through [`wrap`], which records the
//! original value before replacing it. [`PatchLedger::restore`] replays the
//! records, so undoing instrumentation is data-driven rather than bespoke
//! per interceptor.
//!
//! ## Toyota Way Application
//!
//! - **Poka-Yoke**: a target/property pair can hold only one record, so a
//!   second install cannot stack wrappers
//! - **Jidoka**: a refused patch stops that category, not the engine

use crate::host::{EventTarget, HostObject, Listener, ListenerId, ObjectId, Slot};
use crate::result::{InstrumentError, InstrumentResult};
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One reversible substitution
pub struct PatchRecord {
    target: HostObject,
    property: Cow<'static, str>,
    undo: Box<dyn FnOnce()>,
}

impl PatchRecord {
    /// Create a record whose `undo` reinstates the original
    #[must_use]
    pub fn new(
        target: HostObject,
        property: impl Into<Cow<'static, str>>,
        undo: impl FnOnce() + 'static,
    ) -> Self {
        Self {
            target,
            property: property.into(),
            undo: Box::new(undo),
        }
    }

    /// Patched host object
    #[must_use]
    pub const fn target(&self) -> HostObject {
        self.target
    }

    /// Patched property
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    fn matches(&self, target: ObjectId, property: &str) -> bool {
        self.target.id() == target && self.property == property
    }
}

impl fmt::Debug for PatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchRecord")
            .field("target", &self.target)
            .field("property", &self.property)
            .finish()
    }
}

/// Ordered set of currently active substitutions
///
/// Clones share the same records. Installs append, `restore` drains; the
/// host is single-threaded so the two never interleave.
#[derive(Clone, Default)]
pub struct PatchLedger {
    records: Rc<RefCell<Vec<PatchRecord>>>,
}

impl PatchLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::AlreadyPatched`] if the pair is already
    /// recorded; the record is dropped without running its undo.
    pub fn push(&self, record: PatchRecord) -> InstrumentResult<()> {
        if self.contains(record.target.id(), &record.property) {
            return Err(InstrumentError::AlreadyPatched {
                target: record.target.name().to_string(),
                property: record.property.into_owned(),
            });
        }
        self.records.borrow_mut().push(record);
        Ok(())
    }

    /// Record a listener registration so `restore` removes it
    pub fn record_listener(
        &self,
        target: &EventTarget,
        kind: &'static str,
        listener: Listener,
        capture: bool,
    ) -> InstrumentResult<ListenerId> {
        let property = format!("{kind} listener");
        if self.contains(target.object().id(), &property) {
            return Err(InstrumentError::AlreadyPatched {
                target: target.object().name().to_string(),
                property,
            });
        }
        let id = target.add_event_listener(kind, listener, capture);
        let owner = target.clone();
        self.push(PatchRecord::new(target.object(), property, move || {
            owner.remove_event_listener(id);
        }))?;
        Ok(id)
    }

    /// Whether a record exists for `target.property`
    #[must_use]
    pub fn contains(&self, target: ObjectId, property: &str) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|record| record.matches(target, property))
    }

    /// Recorded `(target name, property)` pairs in installation order
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        self.records
            .borrow()
            .iter()
            .map(|record| (record.target.name().to_string(), record.property.to_string()))
            .collect()
    }

    /// Whether any record targets `target`
    #[must_use]
    pub fn touches(&self, target: ObjectId) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|record| record.target.id() == target)
    }

    /// Number of active records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether nothing is patched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Undo every record exactly once and empty the ledger
    ///
    /// Returns how many records were undone.
    pub fn restore(&self) -> usize {
        let records = std::mem::take(&mut *self.records.borrow_mut());
        let count = records.len();
        for record in records {
            tracing::trace!(target_object = %record.target, property = %record.property, "restoring");
            (record.undo)();
        }
        count
    }
}

impl fmt::Debug for PatchLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchLedger")
            .field("records", &self.records.borrow())
            .finish()
    }
}

/// Replace a slot's value with `factory(current)`
///
/// With a ledger, the original is recorded before it is overwritten; a pair
/// that is already recorded is left untouched.
pub fn wrap<T, F>(slot: &Slot<T>, factory: F, ledger: Option<&PatchLedger>) -> InstrumentResult<()>
where
    T: Clone + 'static,
    F: FnOnce(T) -> T,
{
    let original = slot.get();
    if let Some(ledger) = ledger {
        let target = slot.clone();
        let saved = original.clone();
        ledger.push(PatchRecord::new(slot.owner(), slot.property(), move || {
            target.set(saved);
        }))?;
    }
    slot.set(factory(original));
    Ok(())
}
