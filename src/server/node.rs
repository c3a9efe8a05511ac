use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use crate::Rect;

pub type RcNode = Rc<Node>;

///
/// One element of the in-memory tree.
///
/// Carries everything the engine observes through the `Dom` trait:
/// attributes (the `style` attribute doubles as the inline declaration
/// list), a computed-style override map and a layout rect, both injectable
/// from tests because there is no layout engine here.
///
pub struct Node {
    tag_name: String,
    attributes: RefCell<BTreeMap<String, String>>,
    computed: RefCell<HashMap<String, String>>,
    rect: Cell<Rect>,
    links: RefCell<Links>,
}

#[derive(Default)]
struct Links {
    parent: Option<Weak<Node>>,
    children: Vec<RcNode>,
}

#[derive(Clone)]
struct Declaration {
    name: String,
    value: String,
    important: bool,
}

impl Node {
    pub fn create(tag_name: &str) -> RcNode {
        Rc::new(Node {
            tag_name: tag_name.to_string(),
            attributes: RefCell::new(BTreeMap::new()),
            computed: RefCell::new(HashMap::new()),
            rect: Cell::new(Rect::default()),
            links: RefCell::new(Links::default()),
        })
    }

    pub fn is(&self, other: &Node) -> bool {
        self as *const _ == other as *const _
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    // --- attributes ---

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_attribute(&self, name: &str) {
        self.attributes.borrow_mut().remove(name);
    }

    pub fn class_list(&self) -> Vec<String> {
        self.attribute("class")
            .map(|classes| {
                classes
                    .split_whitespace()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remove_class(&self, class: &str) {
        let remaining: Vec<String> = self
            .class_list()
            .into_iter()
            .filter(|c| c != class)
            .collect();
        self.set_attribute("class", &remaining.join(" "));
    }

    // --- inline styles ---

    pub fn set_style_property(&self, name: &str, value: &str, important: bool) {
        let mut declarations = self.declarations();
        match declarations.iter_mut().find(|d| d.name == name) {
            Some(declaration) => {
                declaration.value = value.to_string();
                declaration.important = important;
            }
            None => declarations.push(Declaration {
                name: name.to_string(),
                value: value.to_string(),
                important,
            }),
        }
        self.set_attribute("style", &serialize(&declarations));
    }

    pub fn remove_style_property(&self, name: &str) {
        let declarations: Vec<Declaration> = self
            .declarations()
            .into_iter()
            .filter(|d| d.name != name)
            .collect();
        self.set_attribute("style", &serialize(&declarations));
    }

    fn declarations(&self) -> Vec<Declaration> {
        parse(self.attribute("style").as_deref().unwrap_or(""))
    }

    fn inline_style(&self, property: &str) -> Option<String> {
        self.declarations()
            .into_iter()
            .find(|d| d.name == property)
            .map(|d| d.value)
    }

    // --- computed styles and layout ---

    /// Inject a computed value, standing in for the page's own stylesheets.
    pub fn set_computed_style(&self, property: &str, value: &str) {
        self.computed
            .borrow_mut()
            .insert(property.to_string(), value.to_string());
    }

    /// Resolution order: inline declaration, injected value, property
    /// default. Unknown properties without an injected value resolve to
    /// `None`.
    pub fn computed_style(&self, property: &str) -> Option<String> {
        if let Some(inline) = self.inline_style(property) {
            return Some(inline);
        }
        if let Some(value) = self.computed.borrow().get(property) {
            return Some(value.clone());
        }
        default_style(property).map(str::to_string)
    }

    pub fn set_rect(&self, rect: Rect) {
        self.rect.set(rect);
    }

    pub fn rect(&self) -> Rect {
        self.rect.get()
    }

    // --- tree structure ---

    pub fn parent(&self) -> Option<RcNode> {
        self.links
            .borrow()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn children(&self) -> Vec<RcNode> {
        self.links.borrow().children.clone()
    }

    pub fn append_child(self: &Rc<Self>, child: RcNode) {
        child.unlink();
        child.links.borrow_mut().parent = Some(Rc::downgrade(self));
        self.links.borrow_mut().children.push(child);
    }

    /// Insert `node` directly after `reference` in this node's child list.
    pub fn insert_after_child(self: &Rc<Self>, reference: &RcNode, node: RcNode) {
        node.unlink();
        node.links.borrow_mut().parent = Some(Rc::downgrade(self));
        let mut links = self.links.borrow_mut();
        let index = links
            .children
            .iter()
            .position(|c| c.is(reference))
            .map(|i| i + 1)
            .unwrap_or(links.children.len());
        links.children.insert(index, node);
    }

    pub fn unlink(&self) {
        let parent = self.links.borrow_mut().parent.take();
        if let Some(parent) = parent.as_ref().and_then(Weak::upgrade) {
            parent.links.borrow_mut().children.retain(|c| !c.is(self));
        }
    }

    /// All descendants, depth first, excluding `self`.
    pub fn descendants(self: &Rc<Self>) -> Vec<RcNode> {
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }

    ///
    /// Match one compound selector (`tag`, `.class`, `tag.class.other`).
    /// That is the whole grammar the engine's selector lists use; the real
    /// browser backend gets the full engine for free.
    ///
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        if selector.is_empty() {
            return false;
        }
        let (tag, class_part) = match selector.find('.') {
            Some(0) => (None, &selector[1..]),
            Some(dot) => (Some(&selector[..dot]), &selector[dot + 1..]),
            None => (Some(selector), ""),
        };
        if let Some(tag) = tag {
            if !tag.eq_ignore_ascii_case(&self.tag_name) {
                return false;
            }
        }
        let classes = self.class_list();
        class_part
            .split('.')
            .filter(|c| !c.is_empty())
            .all(|wanted| classes.iter().any(|c| c == wanted))
    }
}

fn collect(node: &RcNode, out: &mut Vec<RcNode>) {
    for child in node.children() {
        out.push(child.clone());
        collect(&child, out);
    }
}

fn parse(css: &str) -> Vec<Declaration> {
    css.split(';')
        .filter_map(|chunk| {
            let chunk = chunk.trim();
            let (name, value) = chunk.split_once(':')?;
            let mut value = value.trim();
            let important = value.ends_with("!important");
            if important {
                value = value[..value.len() - "!important".len()].trim_end();
            }
            Some(Declaration {
                name: name.trim().to_string(),
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

fn serialize(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|d| {
            if d.important {
                format!("{}: {} !important;", d.name, d.value)
            } else {
                format!("{}: {};", d.name, d.value)
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn default_style(property: &str) -> Option<&'static str> {
    match property {
        "position" => Some("static"),
        "top" | "bottom" | "left" | "right" => Some("auto"),
        "transform" | "perspective" | "filter" | "backdrop-filter" | "background-image" => {
            Some("none")
        }
        "visibility" => Some("visible"),
        "display" => Some("block"),
        "margin-top" | "margin-right" | "padding-top" | "padding-right" | "padding-bottom"
        | "padding-left" => Some("0px"),
        "background-color" => Some("rgba(0, 0, 0, 0)"),
        "will-change" => Some("auto"),
        _ => None,
    }
}

impl ToString for Node {
    fn to_string(&self) -> String {
        fn recurse(node: &Node, buf: &mut String) {
            buf.push('<');
            buf.push_str(&node.tag_name);
            for (name, value) in node.attributes.borrow().iter() {
                buf.push(' ');
                buf.push_str(name);
                buf.push_str("=\"");
                buf.push_str(value);
                buf.push('"');
            }

            let children = node.links.borrow().children.clone();
            if children.is_empty() {
                buf.push_str("/>");
            } else {
                buf.push('>');
                for child in &children {
                    recurse(child, buf);
                }
                buf.push_str("</");
                buf.push_str(&node.tag_name);
                buf.push('>');
            }
        }

        let mut buf = String::new();
        recurse(self, &mut buf);
        buf
    }
}
