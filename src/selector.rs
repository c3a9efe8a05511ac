use crate::Dom;

///
/// An ordered list of CSS selectors for one logical target.
///
/// Page markup changes underneath us, so every target is described by a
/// preferred selector plus fallbacks. Resolution returns `None` when nothing
/// matches; callers treat that as "not ready yet" and retry on the next
/// trigger.
///
#[derive(Clone, Debug)]
pub struct SelectorList {
    selectors: Vec<String>,
}

impl SelectorList {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.selectors.iter().map(String::as_str)
    }

    /// First match in the document, trying each selector in order.
    pub fn resolve<D: Dom>(&self, dom: &D) -> Option<D::Element> {
        self.selectors.iter().find_map(|sel| dom.query(sel))
    }

    /// First match under `scope`, falling back to the whole document.
    pub fn resolve_within<D: Dom>(&self, dom: &D, scope: &D::Element) -> Option<D::Element> {
        self.resolve_under(dom, scope).or_else(|| self.resolve(dom))
    }

    /// First match under `scope` only; no document-wide fallback.
    pub fn resolve_under<D: Dom>(&self, dom: &D, scope: &D::Element) -> Option<D::Element> {
        self.selectors
            .iter()
            .find_map(|sel| dom.query_within(scope, sel))
    }

    /// All matches across every selector, deduplicated by node identity.
    pub fn resolve_all<D: Dom>(&self, dom: &D) -> Vec<D::Element> {
        let mut out: Vec<D::Element> = Vec::new();
        for sel in &self.selectors {
            for el in dom.query_all(sel) {
                if !out.iter().any(|seen| dom.same(seen, &el)) {
                    out.push(el);
                }
            }
        }
        out
    }

    /// Nearest ancestor-or-self of `el` matching any selector in the list.
    pub fn closest<D: Dom>(&self, dom: &D, el: &D::Element) -> Option<D::Element> {
        self.selectors.iter().find_map(|sel| dom.closest(el, sel))
    }
}
