use crate::snapshot::PatchLedger;
use crate::{Dom, Error};

///
/// A declarative set of inline style assignments for one element.
///
/// Values the page's own stylesheets may fight over are applied with
/// `!important` so the inline declaration wins on priority.
///
#[derive(Clone, Debug, Default)]
pub struct PatchSpec {
    props: Vec<(&'static str, String)>,
    important: bool,
}

impl PatchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prop(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.props.push((name, value.into()));
        self
    }

    pub fn important(mut self) -> Self {
        self.important = true;
        self
    }

    pub fn props(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.props.iter().map(|(name, value)| (*name, value.as_str()))
    }
}

/// Snapshot the element into the ledger (idempotently), then write the
/// requested properties as inline styles. A failing write abandons this
/// element only; the snapshot stays in the ledger so the element is still
/// restored later.
pub fn apply<D: Dom>(
    dom: &D,
    ledger: &mut PatchLedger<D>,
    el: &D::Element,
    spec: &PatchSpec,
) -> Result<(), Error> {
    ledger.capture(dom, el);
    for (name, value) in spec.props() {
        dom.set_style_property(el, name, value, spec.important)?;
    }
    Ok(())
}

/// Nearest ancestor that establishes an alternate containing block for
/// fixed-position descendants: a non-`none` transform, perspective or
/// filter, or a `will-change` hint for one of those.
pub fn containing_block_ancestor<D: Dom>(dom: &D, el: &D::Element) -> Option<D::Element> {
    let mut node = dom.parent(el);
    while let Some(current) = node {
        if establishes_containing_block(dom, &current) {
            return Some(current);
        }
        node = dom.parent(&current);
    }
    None
}

fn establishes_containing_block<D: Dom>(dom: &D, el: &D::Element) -> bool {
    let non_none = |property: &str| {
        dom.computed_style(el, property)
            .map_or(false, |v| !v.is_empty() && v != "none")
    };
    if non_none("transform") || non_none("perspective") || non_none("filter") {
        return true;
    }
    dom.computed_style(el, "will-change")
        .map_or(false, |v| v.contains("transform") || v.contains("perspective"))
}

/// Inline `top` (integer pixels) that renders a fixed-position element
/// `desired_px` from the viewport top, regardless of which ancestor resolves
/// its offsets. With an alternate containing block at viewport offset `y0`,
/// that is `desired_px − y0`.
pub fn corrected_top<D: Dom>(dom: &D, el: &D::Element, desired_px: f64) -> i32 {
    match containing_block_ancestor(dom, el) {
        None => desired_px.round() as i32,
        Some(ancestor) => {
            let ancestor_top = dom.bounding_rect(&ancestor).top;
            (desired_px - ancestor_top).round() as i32
        }
    }
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;
    use crate::server::ServerDom;
    use crate::{Dom, Rect};

    #[test]
    fn apply_records_before_writing() {
        let dom = ServerDom::new();
        let el = dom.create_element_with_classes("div", &[]);
        dom.body().append_child(el.clone());

        let mut ledger = PatchLedger::new();
        let spec = PatchSpec::new()
            .prop("position", "fixed")
            .prop("top", "0px");
        apply(&dom, &mut ledger, &el, &spec).unwrap();
        apply(&dom, &mut ledger, &el, &spec).unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(
            dom.style_attribute(&el).as_deref(),
            Some("position: fixed; top: 0px;")
        );
    }

    #[test]
    fn important_properties_win() {
        let dom = ServerDom::new();
        let el = dom.create_element_with_classes("nav", &[]);
        dom.body().append_child(el.clone());

        let mut ledger = PatchLedger::new();
        let spec = PatchSpec::new().prop("padding-right", "320px").important();
        apply(&dom, &mut ledger, &el, &spec).unwrap();

        assert_eq!(
            dom.style_attribute(&el).as_deref(),
            Some("padding-right: 320px !important;")
        );
    }

    #[test]
    fn corrected_top_without_transformed_ancestor() {
        let dom = ServerDom::new();
        let el = dom.create_element_with_classes("div", &[]);
        dom.body().append_child(el.clone());

        assert_eq!(corrected_top(&dom, &el, 8.0), 8);
    }

    #[test]
    fn corrected_top_measures_from_viewport() {
        let dom = ServerDom::new();
        let ancestor = dom.create_element_with_classes("div", &[]);
        let el = dom.create_element_with_classes("div", &[]);
        dom.body().append_child(ancestor.clone());
        ancestor.append_child(el.clone());

        ancestor.set_computed_style("transform", "translateY(120px)");
        ancestor.set_rect(Rect {
            top: 120.4,
            left: 0.0,
            width: 800.0,
            height: 40.0,
        });

        assert_eq!(corrected_top(&dom, &el, 8.0), -112);
    }

    #[test]
    fn will_change_hint_counts_as_containing_block() {
        let dom = ServerDom::new();
        let ancestor = dom.create_element_with_classes("div", &[]);
        let el = dom.create_element_with_classes("div", &[]);
        dom.body().append_child(ancestor.clone());
        ancestor.append_child(el.clone());

        ancestor.set_computed_style("will-change", "transform, opacity");
        let found = containing_block_ancestor(&dom, &el).unwrap();
        assert!(dom.same(&found, &ancestor));
    }
}
