use crate::{Dom, Error};

///
/// The recorded pre-patch state of one element.
///
/// Captured exactly once per element per ledger, before the first inline
/// mutation, so a later restore can put back what the page originally had.
///
pub struct StyleSnapshot<E> {
    element: E,
    /// Verbatim `style` attribute at capture time, `None` when absent.
    style_attribute: Option<String>,
    /// Resolved `top` at capture time, kept only when it was a real value.
    /// Used as a restore fallback when no inline style existed.
    computed_top: Option<String>,
    /// Verbatim `class` attribute, captured only when a patch strips classes.
    class_attribute: Option<String>,
}

impl<E> StyleSnapshot<E> {
    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn style_attribute(&self) -> Option<&str> {
        self.style_attribute.as_deref()
    }
}

///
/// The ordered collection of everything the engine must undo.
///
/// Capture is idempotent: a second patch attempt on an already-tracked
/// element never overwrites the first snapshot. Entries leave the ledger
/// only through [PatchLedger::restore_all], which drains it in bulk.
///
pub struct PatchLedger<D: Dom> {
    entries: Vec<StyleSnapshot<D::Element>>,
}

impl<D: Dom> Default for PatchLedger<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dom> PatchLedger<D> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_tracked(&self, dom: &D, el: &D::Element) -> bool {
        self.entries.iter().any(|e| dom.same(&e.element, el))
    }

    /// Record the element's pre-patch state unless it is already tracked.
    /// Returns `true` when a new snapshot was appended.
    pub fn capture(&mut self, dom: &D, el: &D::Element) -> bool {
        self.capture_entry(dom, el, false)
    }

    /// Like [PatchLedger::capture], but also backs up the `class` attribute
    /// for patches that strip classes. Upgrades an existing entry that was
    /// captured without a class backup (the classes are still untouched at
    /// that point, so the backup stays faithful).
    pub fn capture_with_classes(&mut self, dom: &D, el: &D::Element) -> bool {
        self.capture_entry(dom, el, true)
    }

    fn capture_entry(&mut self, dom: &D, el: &D::Element, with_classes: bool) -> bool {
        if let Some(existing) = self.entries.iter_mut().find(|e| dom.same(&e.element, el)) {
            if with_classes && existing.class_attribute.is_none() {
                existing.class_attribute = dom.class_attribute(el);
            }
            return false;
        }

        let computed_top = dom
            .computed_style(el, "top")
            .filter(|top| !top.is_empty() && top != "auto");

        self.entries.push(StyleSnapshot {
            element: el.clone(),
            style_attribute: dom.style_attribute(el),
            computed_top,
            class_attribute: if with_classes {
                dom.class_attribute(el)
            } else {
                None
            },
        });
        true
    }

    /// Put every tracked element back to its pre-patch state and empty the
    /// ledger. Per-element failures are logged and skipped; calling this on
    /// an empty ledger is a no-op.
    pub fn restore_all(&mut self, dom: &D) {
        for entry in self.entries.drain(..) {
            if let Err(err) = restore_entry(dom, &entry) {
                tracing::warn!("skipping element that failed to restore: {}", err);
            }
        }
    }
}

fn restore_entry<D: Dom>(dom: &D, entry: &StyleSnapshot<D::Element>) -> Result<(), Error> {
    match entry.style_attribute.as_deref() {
        Some(css) if !css.is_empty() => {
            dom.set_style_attribute(&entry.element, css)?;
        }
        _ => {
            dom.remove_style_attribute(&entry.element)?;
            // No inline value to go back to; fall back to the position the
            // layout engine reported before we touched the element.
            if let Some(top) = &entry.computed_top {
                dom.set_style_property(&entry.element, "top", top, false)?;
            }
        }
    }

    if let Some(classes) = &entry.class_attribute {
        dom.set_class_attribute(&entry.element, classes)?;
    }

    Ok(())
}
