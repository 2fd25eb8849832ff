//! Mock DOM: elements, listeners, and the document.

use super::{Callback, HostObject, Slot};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Option of a `select` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    /// Submitted value
    pub value: String,
    /// Whether the option is currently selected
    pub selected: bool,
}

impl SelectOption {
    /// Create an option
    #[must_use]
    pub fn new(value: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.into(),
            selected,
        }
    }
}

/// Value of `className`
///
/// SVG elements expose an object here instead of a string; those never
/// contribute classes to a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassName {
    /// Plain space-separated class list
    Text(String),
    /// Non-string value
    Animated,
}

/// A DOM element
pub struct Element {
    tag_name: String,
    id: String,
    class_name: ClassName,
    attributes: RefCell<Vec<(String, String)>>,
    parent: RefCell<Weak<Element>>,
    value: RefCell<String>,
    checked: Cell<bool>,
    multiple: bool,
    options: RefCell<Vec<SelectOption>>,
    selected_index: Cell<Option<usize>>,
}

impl Element {
    /// Creates a new element with the given tag
    #[must_use]
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            id: String::new(),
            class_name: ClassName::Text(String::new()),
            attributes: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            value: RefCell::new(String::new()),
            checked: Cell::new(false),
            multiple: false,
            options: RefCell::new(Vec::new()),
            selected_index: Cell::new(None),
        }
    }

    /// Sets the id
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Sets `className`
    #[must_use]
    pub fn with_class_name(mut self, class_name: &str) -> Self {
        self.class_name = ClassName::Text(class_name.to_string());
        self
    }

    /// Gives the element a non-string `className`
    #[must_use]
    pub fn with_animated_class_name(mut self) -> Self {
        self.class_name = ClassName::Animated;
        self
    }

    /// Sets an attribute
    #[must_use]
    pub fn with_attr(self, key: &str, value: &str) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Sets the current value
    #[must_use]
    pub fn with_value(self, value: &str) -> Self {
        self.set_value(value);
        self
    }

    /// Sets checked state
    #[must_use]
    pub fn with_checked(self, checked: bool) -> Self {
        self.checked.set(checked);
        self
    }

    /// Makes a `select` multi-valued
    #[must_use]
    pub const fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Sets `select` options; the first selected one becomes `selectedIndex`
    #[must_use]
    pub fn with_options(self, options: Vec<SelectOption>) -> Self {
        self.selected_index
            .set(options.iter().position(|option| option.selected));
        self.options.replace(options);
        self
    }

    /// Finish building a root element
    #[must_use]
    pub fn into_rc(self) -> Rc<Self> {
        Rc::new(self)
    }

    /// Attach `child` under `parent`
    #[must_use]
    pub fn append(parent: &Rc<Self>, child: Self) -> Rc<Self> {
        child.parent.replace(Rc::downgrade(parent));
        Rc::new(child)
    }

    /// Tag name as created
    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Element id, empty if unset
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `className`
    #[must_use]
    pub const fn class_name(&self) -> &ClassName {
        &self.class_name
    }

    /// `getAttribute(key)`
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<String> {
        self.attributes
            .borrow()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    }

    /// `setAttribute(key, value)`
    pub fn set_attribute(&self, key: &str, value: &str) {
        let mut attributes = self.attributes.borrow_mut();
        match attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => attributes.push((key.to_string(), value.to_string())),
        }
    }

    /// Parent element, if still alive
    #[must_use]
    pub fn parent(&self) -> Option<Rc<Self>> {
        self.parent.borrow().upgrade()
    }

    /// Current value
    #[must_use]
    pub fn value(&self) -> String {
        self.value.borrow().clone()
    }

    /// User edits the value
    pub fn set_value(&self, value: &str) {
        self.value.replace(value.to_string());
    }

    /// Checked state
    #[must_use]
    pub fn checked(&self) -> bool {
        self.checked.get()
    }

    /// User toggles the control
    pub fn set_checked(&self, checked: bool) {
        self.checked.set(checked);
    }

    /// Whether a `select` accepts several options
    #[must_use]
    pub const fn multiple(&self) -> bool {
        self.multiple
    }

    /// `select` options
    #[must_use]
    pub fn options(&self) -> Vec<SelectOption> {
        self.options.borrow().clone()
    }

    /// `selectedIndex`, `None` when nothing is selected
    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index.get()
    }

    /// User picks option `index`
    ///
    /// Single selects keep exactly one option selected; multi selects toggle.
    pub fn select(&self, index: usize) {
        let mut options = self.options.borrow_mut();
        if index >= options.len() {
            return;
        }
        if self.multiple {
            options[index].selected = !options[index].selected;
        } else {
            for (i, option) in options.iter_mut().enumerate() {
                option.selected = i == index;
            }
        }
        self.selected_index
            .set(options.iter().position(|option| option.selected));
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag_name", &self.tag_name)
            .field("id", &self.id)
            .field("class_name", &self.class_name)
            .field("attributes", &self.attributes.borrow())
            .finish()
    }
}

/// A dispatched host event
#[derive(Debug, Clone, Default)]
pub struct HostEvent {
    /// Direct target, when the host reports one
    pub target: Option<Rc<Element>>,
    /// Pointer x in client coordinates
    pub client_x: f64,
    /// Pointer y in client coordinates
    pub client_y: f64,
}

impl HostEvent {
    /// Event aimed at `target`
    #[must_use]
    pub fn on(target: &Rc<Element>) -> Self {
        Self {
            target: Some(Rc::clone(target)),
            ..Self::default()
        }
    }

    /// Event with only pointer coordinates
    #[must_use]
    pub fn at(client_x: f64, client_y: f64) -> Self {
        Self {
            target: None,
            client_x,
            client_y,
        }
    }

    /// Targetless signal (online/offline)
    #[must_use]
    pub fn signal() -> Self {
        Self::default()
    }
}

/// Event listener
pub type Listener = Rc<dyn Fn(&HostEvent)>;

/// Handle for removing a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    kind: String,
    capture: bool,
    listener: Listener,
}

/// Something listeners can be attached to
#[derive(Clone)]
pub struct EventTarget {
    object: HostObject,
    registrations: Rc<RefCell<Vec<Registration>>>,
    next_id: Rc<Cell<u64>>,
}

impl EventTarget {
    /// Create an empty target
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            object: HostObject::new(name),
            registrations: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(Cell::new(1)),
        }
    }

    /// Host object behind this target
    #[must_use]
    pub const fn object(&self) -> HostObject {
        self.object
    }

    /// Register `listener` for `kind`
    pub fn add_event_listener(&self, kind: &str, listener: Listener, capture: bool) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.registrations.borrow_mut().push(Registration {
            id,
            kind: kind.to_string(),
            capture,
            listener,
        });
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.borrow_mut();
        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        registrations.len() != before
    }

    /// Number of listeners for `kind`
    #[must_use]
    pub fn listener_count(&self, kind: &str) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|registration| registration.kind == kind)
            .count()
    }

    /// Invoke listeners for `kind`, capturing listeners first
    pub fn dispatch(&self, kind: &str, event: &HostEvent) {
        let mut matching: Vec<(bool, Listener)> = self
            .registrations
            .borrow()
            .iter()
            .filter(|registration| registration.kind == kind)
            .map(|registration| (registration.capture, Rc::clone(&registration.listener)))
            .collect();
        matching.sort_by_key(|(capture, _)| !capture);
        for (_, listener) in matching {
            listener(event);
        }
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("object", &self.object)
            .field("listeners", &self.registrations.borrow().len())
            .finish()
    }
}

/// `document.body` with legacy connectivity handlers
#[derive(Debug, Clone)]
pub struct Body {
    object: HostObject,
    /// `body.ononline`
    pub ononline: Slot<Option<Callback>>,
    /// `body.onoffline`
    pub onoffline: Slot<Option<Callback>>,
}

impl Body {
    /// Body with no handlers
    #[must_use]
    pub fn new() -> Self {
        let object = HostObject::new("document.body");
        Self {
            object,
            ononline: Slot::new(object, "ononline", None),
            onoffline: Slot::new(object, "onoffline", None),
        }
    }

    /// Host object behind this body
    #[must_use]
    pub const fn object(&self) -> HostObject {
        self.object
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-based hit testing (`elementFromPoint`)
pub type HitTest = Rc<dyn Fn(f64, f64) -> Option<Rc<Element>>>;

/// The loaded document
#[derive(Clone, Default)]
pub struct Document {
    /// `document.body`
    pub body: Option<Body>,
    /// `document.elementFromPoint`
    pub element_from_point: Option<HitTest>,
}

impl Document {
    /// Document with neither body nor hit testing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a body
    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Enable hit testing
    #[must_use]
    pub fn with_hit_test(
        mut self,
        hit_test: impl Fn(f64, f64) -> Option<Rc<Element>> + 'static,
    ) -> Self {
        self.element_from_point = Some(Rc::new(hit_test));
        self
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("body", &self.body)
            .field("hit_test", &self.element_from_point.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod element_tests {
        use super::*;

        #[test]
        fn test_parent_links() {
            let form = Element::new("form").into_rc();
            let input = Element::append(&form, Element::new("input"));
            assert_eq!(input.parent().unwrap().tag_name(), "form");
            assert!(form.parent().is_none());
        }

        #[test]
        fn test_attributes_case_insensitive() {
            let input = Element::new("input").with_attr("TYPE", "text");
            assert_eq!(input.get_attribute("type").as_deref(), Some("text"));
            input.set_attribute("type", "password");
            assert_eq!(input.get_attribute("Type").as_deref(), Some("password"));
            assert!(input.get_attribute("name").is_none());
        }

        #[test]
        fn test_single_select() {
            let select = Element::new("select").with_options(vec![
                SelectOption::new("a", false),
                SelectOption::new("b", true),
            ]);
            assert_eq!(select.selected_index(), Some(1));
            select.select(0);
            assert_eq!(select.selected_index(), Some(0));
            assert!(!select.options()[1].selected);
            select.select(9);
            assert_eq!(select.selected_index(), Some(0));
        }

        #[test]
        fn test_multi_select_toggles() {
            let select = Element::new("select")
                .with_multiple(true)
                .with_options(vec![SelectOption::new("a", false), SelectOption::new("b", false)]);
            select.select(0);
            select.select(1);
            assert!(select.options().iter().all(|o| o.selected));
            select.select(0);
            assert_eq!(select.selected_index(), Some(1));
        }
    }

    mod event_target_tests {
        use super::*;

        #[test]
        fn test_capture_listeners_run_first() {
            let target = EventTarget::new("window");
            let order = Rc::new(RefCell::new(Vec::new()));
            let bubble = Rc::clone(&order);
            target.add_event_listener("click", Rc::new(move |_| bubble.borrow_mut().push("bubble")), false);
            let capture = Rc::clone(&order);
            target.add_event_listener("click", Rc::new(move |_| capture.borrow_mut().push("capture")), true);
            target.dispatch("click", &HostEvent::signal());
            assert_eq!(*order.borrow(), ["capture", "bubble"]);
        }

        #[test]
        fn test_remove_listener() {
            let target = EventTarget::new("window");
            let id = target.add_event_listener("blur", Rc::new(|_| {}), true);
            assert_eq!(target.listener_count("blur"), 1);
            assert!(target.remove_event_listener(id));
            assert!(!target.remove_event_listener(id));
            assert_eq!(target.listener_count("blur"), 0);
        }
    }
}
