//! Element Summarizer
//!
//! Turns a DOM node and its ancestry into a short, deterministic string such
//! as `div#app > form.login > input[type="text"][name="user"]`.
//!
//! ## Bounds
//!
//! - At most [`MAX_DEPTH`] nodes are visited, and an `html` ancestor ends
//!   the walk without being included
//! - The rendered chain stays under [`MAX_SUMMARY_LEN`] characters, except
//!   that the first entry is always kept

use crate::host::{ClassName, Element};
use std::fmt::Write as _;
use std::rc::Rc;

/// Ancestry levels visited, the target included
pub const MAX_DEPTH: usize = 5;

/// Length ceiling of a rendered chain, in characters
pub const MAX_SUMMARY_LEN: usize = 80;

/// Separator between chain entries
pub const SEPARATOR: &str = " > ";

/// Attributes copied into a description, in render order
pub const DESCRIBED_ATTRIBUTES: [&str; 4] = ["type", "name", "title", "alt"];

/// Structural fingerprint of one node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementDescription {
    /// Lower-cased tag name
    pub tag_name: String,
    /// Element id, when non-empty
    pub id: Option<String>,
    /// Class list, when `className` is a plain string
    pub classes: Vec<String>,
    /// Present, non-empty attributes out of [`DESCRIBED_ATTRIBUTES`]
    pub attributes: Vec<(String, String)>,
}

impl ElementDescription {
    /// Render as `tag#id.class[key="value"]`
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.tag_name.clone();
        if let Some(id) = &self.id {
            out.push('#');
            out.push_str(id);
        }
        for class in &self.classes {
            out.push('.');
            out.push_str(class);
        }
        for (key, value) in &self.attributes {
            let _ = write!(out, "[{key}=\"{value}\"]");
        }
        out
    }
}

/// Describe a single node
#[must_use]
pub fn describe_element(element: &Element) -> ElementDescription {
    let id = Some(element.id()).filter(|id| !id.is_empty()).map(String::from);
    let classes = match element.class_name() {
        ClassName::Text(text) => text.split_whitespace().map(String::from).collect(),
        ClassName::Animated => Vec::new(),
    };
    let attributes = DESCRIBED_ATTRIBUTES
        .iter()
        .filter_map(|key| {
            element
                .get_attribute(key)
                .filter(|value| !value.is_empty())
                .map(|value| ((*key).to_string(), value))
        })
        .collect();
    ElementDescription {
        tag_name: element.tag_name().to_lowercase(),
        id,
        classes,
        attributes,
    }
}

/// Describe `element` and up to four ancestors, root-most first
#[must_use]
pub fn describe_tree(element: &Rc<Element>) -> Vec<ElementDescription> {
    let mut chain = Vec::with_capacity(MAX_DEPTH);
    let mut current = Some(Rc::clone(element));
    while let Some(node) = current {
        if chain.len() == MAX_DEPTH {
            break;
        }
        let description = describe_element(&node);
        if description.tag_name == "html" {
            break;
        }
        chain.push(description);
        current = node.parent();
    }
    chain.reverse();
    chain
}

/// Join descriptions under the length ceiling
///
/// The first entry is always kept. A later entry is dropped, along with
/// everything after it, once the rendered lengths plus one separator per
/// kept entry would reach [`MAX_SUMMARY_LEN`]. Lengths count characters,
/// not bytes.
#[must_use]
pub fn render_chain(descriptions: &[ElementDescription]) -> String {
    let mut rendered: Vec<String> = Vec::with_capacity(descriptions.len());
    let mut total = 0;
    for description in descriptions {
        let next = description.render();
        let next_len = next.chars().count();
        if !rendered.is_empty()
            && total + rendered.len() * SEPARATOR.len() + next_len >= MAX_SUMMARY_LEN
        {
            break;
        }
        total += next_len;
        rendered.push(next);
    }
    rendered.join(SEPARATOR)
}

/// Summary string for a DOM breadcrumb
#[must_use]
pub fn element_summary(element: &Rc<Element>) -> String {
    render_chain(&describe_tree(element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod describe_tests {
        use super::*;

        #[test]
        fn test_full_description() {
            let input = Element::new("INPUT")
                .with_id("user")
                .with_class_name("  wide   primary ")
                .with_attr("alt", "")
                .with_attr("name", "login")
                .with_attr("type", "text")
                .with_attr("placeholder", "ignored");
            let description = describe_element(&input);
            assert_eq!(description.tag_name, "input");
            assert_eq!(description.id.as_deref(), Some("user"));
            assert_eq!(description.classes, ["wide", "primary"]);
            assert_eq!(
                description.render(),
                r#"input#user.wide.primary[type="text"][name="login"]"#
            );
        }

        #[test]
        fn test_bare_element() {
            let description = describe_element(&Element::new("DIV").with_class_name("   "));
            assert_eq!(description, ElementDescription {
                tag_name: "div".to_string(),
                ..ElementDescription::default()
            });
            assert_eq!(description.render(), "div");
        }

        #[test]
        fn test_animated_class_name_contributes_nothing() {
            let svg = Element::new("svg").with_animated_class_name();
            assert!(describe_element(&svg).classes.is_empty());
        }
    }

    mod tree_tests {
        use super::*;

        fn nest(depth: usize) -> Rc<Element> {
            let mut node = Element::new("html").into_rc();
            for level in 0..depth {
                node = Element::append(&node, Element::new("div").with_id(&format!("d{level}")));
            }
            node
        }

        #[test]
        fn test_stops_before_html() {
            let html = Element::new("html").into_rc();
            let body = Element::append(&html, Element::new("body"));
            let button = Element::append(&body, Element::new("button").with_id("go"));
            let chain = describe_tree(&button);
            assert_eq!(chain.len(), 2);
            assert_eq!(chain[0].tag_name, "body");
            assert_eq!(element_summary(&button), "body > button#go");
        }

        #[test]
        fn test_caps_depth() {
            let leaf = nest(8);
            let chain = describe_tree(&leaf);
            assert_eq!(chain.len(), MAX_DEPTH);
            assert_eq!(chain[0].id.as_deref(), Some("d3"));
            assert_eq!(chain[4].id.as_deref(), Some("d7"));
        }

        #[test]
        fn test_detached_element() {
            let lone = Element::new("span").into_rc();
            assert_eq!(element_summary(&lone), "span");
        }
    }

    mod chain_tests {
        use super::*;

        fn named(tag: &str, len: usize) -> ElementDescription {
            ElementDescription {
                tag_name: tag.repeat(len),
                ..ElementDescription::default()
            }
        }

        #[test]
        fn test_first_entry_always_kept() {
            let long = named("x", 120);
            assert_eq!(render_chain(&[long.clone(), named("y", 1)]), long.render());
        }

        #[test]
        fn test_ceiling_is_exclusive() {
            // 40 + 3 + 37 = 80 reaches the ceiling
            assert_eq!(render_chain(&[named("a", 40), named("b", 37)]), "a".repeat(40));
            // 40 + 3 + 36 = 79 fits
            let fits = render_chain(&[named("a", 40), named("b", 36)]);
            assert_eq!(fits.len(), 79);
        }

        #[test]
        fn test_later_entries_dropped_after_first_overflow() {
            let chain = [named("a", 30), named("b", 60), named("c", 1)];
            assert_eq!(render_chain(&chain), "a".repeat(30));
        }

        #[test]
        fn test_ceiling_counts_characters() {
            let parent = ElementDescription {
                tag_name: "div".to_string(),
                id: Some("é".repeat(29)),
                ..ElementDescription::default()
            };
            let leaf = ElementDescription {
                tag_name: "span".to_string(),
                id: Some("ü".repeat(33)),
                ..ElementDescription::default()
            };
            // 33 + 3 + 38 = 74 characters, though well over 80 bytes
            let summary = render_chain(&[parent, leaf]);
            assert!(summary.contains("span#"));
            assert_eq!(summary.chars().count(), 74);
        }

        #[test]
        fn test_empty_chain() {
            assert_eq!(render_chain(&[]), "");
        }
    }

    proptest! {
        #[test]
        fn prop_summary_under_ceiling(
            lens in prop::collection::vec(1usize..40, 1..8),
            glyph in prop::sample::select(vec!["t", "é", "字"]),
        ) {
            let chain: Vec<_> = lens
                .iter()
                .map(|len| ElementDescription { tag_name: glyph.repeat(*len), ..ElementDescription::default() })
                .collect();
            let summary = render_chain(&chain);
            let first = chain[0].render();
            prop_assert!(summary.starts_with(&first));
            if summary.len() > first.len() {
                prop_assert!(summary.chars().count() < MAX_SUMMARY_LEN);
            }
        }
    }
}
