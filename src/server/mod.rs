//!
//! In-memory DOM backend.
//!
//! Stands in for the browser under plain `cargo test`: a linked element
//! tree plus the document-level state the engine reads (scroll position,
//! color scheme, storage, injected stylesheets), all injectable from tests.
//!

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::{Dom, Error, Rect};

mod node;

pub use node::{Node, RcNode};

pub struct ServerDom {
    html: RcNode,
    body: RcNode,
    scroll_y: Cell<f64>,
    prefers_dark: Cell<bool>,
    storage: RefCell<HashMap<String, String>>,
    stylesheets: RefCell<Vec<(String, String)>>,
}

impl Default for ServerDom {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerDom {
    pub fn new() -> Self {
        let html = Node::create("html");
        let body = Node::create("body");
        html.append_child(Node::create("head"));
        html.append_child(body.clone());
        Self {
            html,
            body,
            scroll_y: Cell::new(0.0),
            prefers_dark: Cell::new(false),
            storage: RefCell::new(HashMap::new()),
            stylesheets: RefCell::new(Vec::new()),
        }
    }

    pub fn body(&self) -> RcNode {
        self.body.clone()
    }

    pub fn create_element_with_classes(&self, tag_name: &str, classes: &[&str]) -> RcNode {
        let node = Node::create(tag_name);
        if !classes.is_empty() {
            node.set_attribute("class", &classes.join(" "));
        }
        node
    }

    pub fn set_scroll(&self, y: f64) {
        self.scroll_y.set(y);
    }

    pub fn set_prefers_dark(&self, dark: bool) {
        self.prefers_dark.set(dark);
    }

    /// Markers of the stylesheets injected so far, in injection order.
    pub fn injected_stylesheets(&self) -> Vec<(String, String)> {
        self.stylesheets.borrow().clone()
    }

    pub fn render(&self) -> String {
        self.body.to_string()
    }
}

impl Dom for ServerDom {
    type Element = RcNode;

    fn query(&self, selector: &str) -> Option<RcNode> {
        self.html
            .descendants()
            .into_iter()
            .find(|node| node.matches(selector))
    }

    fn query_all(&self, selector: &str) -> Vec<RcNode> {
        self.html
            .descendants()
            .into_iter()
            .filter(|node| node.matches(selector))
            .collect()
    }

    fn query_within(&self, scope: &RcNode, selector: &str) -> Option<RcNode> {
        scope
            .descendants()
            .into_iter()
            .find(|node| node.matches(selector))
    }

    fn closest(&self, el: &RcNode, selector: &str) -> Option<RcNode> {
        let mut current = Some(el.clone());
        while let Some(node) = current {
            if node.matches(selector) {
                return Some(node);
            }
            current = node.parent();
        }
        None
    }

    fn same(&self, a: &RcNode, b: &RcNode) -> bool {
        Rc::ptr_eq(a, b)
    }

    fn contains(&self, ancestor: &RcNode, node: &RcNode) -> bool {
        let mut current = Some(node.clone());
        while let Some(step) = current {
            if step.is(ancestor) {
                return true;
            }
            current = step.parent();
        }
        false
    }

    fn parent(&self, el: &RcNode) -> Option<RcNode> {
        el.parent()
    }

    fn children(&self, el: &RcNode) -> Vec<RcNode> {
        el.children()
    }

    fn is_connected(&self, el: &RcNode) -> bool {
        self.contains(&self.html, el)
    }

    fn style_attribute(&self, el: &RcNode) -> Option<String> {
        el.attribute("style")
    }

    fn set_style_attribute(&self, el: &RcNode, css: &str) -> Result<(), Error> {
        el.set_attribute("style", css);
        Ok(())
    }

    fn remove_style_attribute(&self, el: &RcNode) -> Result<(), Error> {
        el.remove_attribute("style");
        Ok(())
    }

    fn set_style_property(
        &self,
        el: &RcNode,
        name: &str,
        value: &str,
        important: bool,
    ) -> Result<(), Error> {
        el.set_style_property(name, value, important);
        Ok(())
    }

    fn computed_style(&self, el: &RcNode, property: &str) -> Option<String> {
        el.computed_style(property)
    }

    fn class_attribute(&self, el: &RcNode) -> Option<String> {
        el.attribute("class")
    }

    fn set_class_attribute(&self, el: &RcNode, value: &str) -> Result<(), Error> {
        el.set_attribute("class", value);
        Ok(())
    }

    fn class_list(&self, el: &RcNode) -> Vec<String> {
        el.class_list()
    }

    fn remove_class(&self, el: &RcNode, class: &str) -> Result<(), Error> {
        el.remove_class(class);
        Ok(())
    }

    fn bounding_rect(&self, el: &RcNode) -> Rect {
        el.rect()
    }

    fn scroll_y(&self) -> f64 {
        self.scroll_y.get()
    }

    fn prefers_dark(&self) -> bool {
        self.prefers_dark.get()
    }

    fn create_element(&self, tag_name: &str) -> Result<RcNode, Error> {
        Ok(Node::create(tag_name))
    }

    fn insert_after(&self, reference: &RcNode, node: &RcNode) -> Result<(), Error> {
        let parent = reference.parent().ok_or(Error::InsertNode)?;
        parent.insert_after_child(reference, node.clone());
        Ok(())
    }

    fn remove(&self, node: &RcNode) -> Result<(), Error> {
        if node.parent().is_none() {
            return Err(Error::RemoveNode);
        }
        node.unlink();
        Ok(())
    }

    fn inject_stylesheet(&self, marker: &str, css: &str) -> Result<(), Error> {
        let mut stylesheets = self.stylesheets.borrow_mut();
        if stylesheets.iter().any(|(m, _)| m == marker) {
            return Ok(());
        }
        stylesheets.push((marker.to_string(), css.to_string()));
        Ok(())
    }

    fn read_storage(&self, key: &str) -> Option<String> {
        self.storage.borrow().get(key).cloned()
    }

    fn write_storage(&self, key: &str, value: &str) -> Result<(), Error> {
        self.storage
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
