//!
//! Browser backend over `web_sys`.
//!

use wasm_bindgen::JsCast;

use crate::{Dom, Error, Rect};

mod page;

pub use page::PagePatcher;

pub struct WebDom {
    window: web_sys::Window,
    document: web_sys::Document,
}

impl WebDom {
    pub fn new() -> Self {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();
        Self { window, document }
    }

    pub fn window(&self) -> &web_sys::Window {
        &self.window
    }

    pub fn document(&self) -> &web_sys::Document {
        &self.document
    }

    fn into_html(element: web_sys::Element) -> Option<web_sys::HtmlElement> {
        element.dyn_into::<web_sys::HtmlElement>().ok()
    }
}

impl From<wasm_bindgen::JsValue> for Error {
    fn from(_js_error: wasm_bindgen::JsValue) -> Self {
        Error::JsError
    }
}

impl Dom for WebDom {
    type Element = web_sys::HtmlElement;

    fn query(&self, selector: &str) -> Option<web_sys::HtmlElement> {
        self.document
            .query_selector(selector)
            .ok()
            .flatten()
            .and_then(Self::into_html)
    }

    fn query_all(&self, selector: &str) -> Vec<web_sys::HtmlElement> {
        let list = match self.document.query_selector_all(selector) {
            Ok(list) => list,
            Err(_) => return Vec::new(),
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<web_sys::HtmlElement>().ok())
            .collect()
    }

    fn query_within(
        &self,
        scope: &web_sys::HtmlElement,
        selector: &str,
    ) -> Option<web_sys::HtmlElement> {
        scope
            .query_selector(selector)
            .ok()
            .flatten()
            .and_then(Self::into_html)
    }

    fn closest(&self, el: &web_sys::HtmlElement, selector: &str) -> Option<web_sys::HtmlElement> {
        el.closest(selector).ok().flatten().and_then(Self::into_html)
    }

    fn same(&self, a: &web_sys::HtmlElement, b: &web_sys::HtmlElement) -> bool {
        a.is_same_node(Some(b.as_ref()))
    }

    fn contains(&self, ancestor: &web_sys::HtmlElement, node: &web_sys::HtmlElement) -> bool {
        ancestor.contains(Some(node.as_ref()))
    }

    fn parent(&self, el: &web_sys::HtmlElement) -> Option<web_sys::HtmlElement> {
        el.parent_element()
            .and_then(|parent| parent.dyn_into::<web_sys::HtmlElement>().ok())
    }

    fn children(&self, el: &web_sys::HtmlElement) -> Vec<web_sys::HtmlElement> {
        let collection = el.children();
        (0..collection.length())
            .filter_map(|i| collection.item(i))
            .filter_map(Self::into_html)
            .collect()
    }

    fn is_connected(&self, el: &web_sys::HtmlElement) -> bool {
        el.is_connected()
    }

    fn style_attribute(&self, el: &web_sys::HtmlElement) -> Option<String> {
        el.get_attribute("style")
    }

    fn set_style_attribute(&self, el: &web_sys::HtmlElement, css: &str) -> Result<(), Error> {
        Ok(el.set_attribute("style", css)?)
    }

    fn remove_style_attribute(&self, el: &web_sys::HtmlElement) -> Result<(), Error> {
        Ok(el.remove_attribute("style")?)
    }

    fn set_style_property(
        &self,
        el: &web_sys::HtmlElement,
        name: &str,
        value: &str,
        important: bool,
    ) -> Result<(), Error> {
        let priority = if important { "important" } else { "" };
        el.style().set_property_with_priority(name, value, priority)?;
        Ok(())
    }

    fn computed_style(&self, el: &web_sys::HtmlElement, property: &str) -> Option<String> {
        self.window
            .get_computed_style(el)
            .ok()
            .flatten()
            .and_then(|style| style.get_property_value(property).ok())
            .filter(|value| !value.is_empty())
    }

    fn class_attribute(&self, el: &web_sys::HtmlElement) -> Option<String> {
        el.get_attribute("class")
    }

    fn set_class_attribute(&self, el: &web_sys::HtmlElement, value: &str) -> Result<(), Error> {
        Ok(el.set_attribute("class", value)?)
    }

    fn class_list(&self, el: &web_sys::HtmlElement) -> Vec<String> {
        let list = el.class_list();
        (0..list.length()).filter_map(|i| list.item(i)).collect()
    }

    fn remove_class(&self, el: &web_sys::HtmlElement, class: &str) -> Result<(), Error> {
        Ok(el.class_list().remove_1(class)?)
    }

    fn bounding_rect(&self, el: &web_sys::HtmlElement) -> Rect {
        let rect = el.get_bounding_client_rect();
        Rect {
            top: rect.top(),
            left: rect.left(),
            width: rect.width(),
            height: rect.height(),
        }
    }

    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn prefers_dark(&self) -> bool {
        self.window
            .match_media("(prefers-color-scheme: dark)")
            .ok()
            .flatten()
            .map(|media| media.matches())
            .unwrap_or(false)
    }

    fn create_element(&self, tag_name: &str) -> Result<web_sys::HtmlElement, Error> {
        let element = self.document.create_element(tag_name)?;
        element.dyn_into::<web_sys::HtmlElement>().map_err(|_| Error::JsError)
    }

    fn insert_after(
        &self,
        reference: &web_sys::HtmlElement,
        node: &web_sys::HtmlElement,
    ) -> Result<(), Error> {
        let parent = reference.parent_node().ok_or(Error::InsertNode)?;
        parent.insert_before(node.as_ref(), reference.next_sibling().as_ref())?;
        Ok(())
    }

    fn remove(&self, node: &web_sys::HtmlElement) -> Result<(), Error> {
        let parent = node.parent_node().ok_or(Error::RemoveNode)?;
        parent.remove_child(node.as_ref())?;
        Ok(())
    }

    fn inject_stylesheet(&self, marker: &str, css: &str) -> Result<(), Error> {
        let probe = format!("style[{}]", marker);
        if self.document.query_selector(&probe)?.is_some() {
            return Ok(());
        }

        let style = self.document.create_element("style")?;
        style.set_attribute(marker, "")?;
        style.set_text_content(Some(css));

        let parent: web_sys::Node = match self.document.head() {
            Some(head) => head.into(),
            None => self
                .document
                .document_element()
                .ok_or(Error::InjectStylesheet)?
                .into(),
        };
        parent.append_child(style.as_ref())?;
        Ok(())
    }

    fn read_storage(&self, key: &str) -> Option<String> {
        self.window
            .local_storage()
            .ok()
            .flatten()
            .and_then(|storage| storage.get_item(key).ok().flatten())
    }

    fn write_storage(&self, key: &str, value: &str) -> Result<(), Error> {
        let storage = self
            .window
            .local_storage()
            .ok()
            .flatten()
            .ok_or(Error::Storage)?;
        storage.set_item(key, value).map_err(|_| Error::Storage)
    }
}
