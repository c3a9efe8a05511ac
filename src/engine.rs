use crate::patch::{self, PatchSpec};
use crate::selector::SelectorList;
use crate::snapshot::PatchLedger;
use crate::{Dom, Error};

/// Whether the patches are currently applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinState {
    Unfixed,
    Fixed,
}

///
/// Everything page-specific the engine needs: which elements to pin, which
/// to collapse, and the stylesheet/spacing constants. The selectors are
/// fallback lists because the page's class names change underneath us.
///
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub header: SelectorList,
    /// Bar collapsed to 1px while pinned (not hidden, so children stay
    /// positionable).
    pub collapse_bar: SelectorList,
    /// Bar fixed to the viewport top while the page is scrolled.
    pub pin_bar: SelectorList,
    /// Control groups lifted out of the collapsed bar, each pinned at
    /// `control_top_px` from the viewport top.
    pub pinned_controls: Vec<SelectorList>,
    /// Child of a pinned control group pushed to the far end.
    pub end_align_child: SelectorList,
    /// Nav element that must reserve room for the pinned controls.
    pub nav_actions: SelectorList,
    /// Containers to fall back to when the actions element is missing,
    /// absolutely positioned or hidden.
    pub nav_containers: SelectorList,
    pub control_top_px: f64,
    /// Extra gap between the nav content and the pinned controls.
    pub nav_gap_px: f64,
    pub pin_z_index: i32,
    pub spacer_class: String,
    /// Attribute marking the injected reset stylesheet, for idempotent
    /// detection.
    pub style_marker: String,
    pub reset_css: String,
}

const GITHUB_RESET_CSS: &str = "\
.UnderlineNav-actions{padding-right:0 !important;margin-right:0 !important;position:relative !important;}\n\
.UnderlineNav-actions[class*=\"pr-\"]{padding-right:0 !important;}\n\
.UnderlineNav-actions.position-absolute{position:relative !important;}\n\
.UnderlineNav,.UnderlineNav-body,.js-repo-nav,.repo-nav{padding-right:0 !important;}\n";

impl EngineConfig {
    /// Selector set for github.com's header: global bar collapsed, local
    /// (repo) bar pinned, the right-side control groups kept visible.
    pub fn github() -> Self {
        Self {
            header: SelectorList::new(["header.AppHeader", "header"]),
            collapse_bar: SelectorList::new([".AppHeader-globalBar"]),
            pin_bar: SelectorList::new([".AppHeader-localBar"]),
            pinned_controls: vec![
                SelectorList::new([".AppHeader-globalBar-end"]),
                SelectorList::new([".AppHeader-actions"]),
            ],
            end_align_child: SelectorList::new([".AppHeader-user"]),
            nav_actions: SelectorList::new([".UnderlineNav-actions"]),
            nav_containers: SelectorList::new([
                ".UnderlineNav",
                ".js-repo-nav",
                ".UnderlineNav-body",
                ".repo-nav",
            ]),
            control_top_px: 8.0,
            nav_gap_px: 8.0,
            pin_z_index: 9998,
            spacer_class: "restyle-spacer".to_string(),
            style_marker: "data-restyle".to_string(),
            reset_css: GITHUB_RESET_CSS.to_string(),
        }
    }
}

/// The watched elements, re-resolved on every trigger because the page may
/// have replaced them since the last one.
struct Targets<D: Dom> {
    header: D::Element,
    collapse_bar: Option<D::Element>,
    pin_bar: D::Element,
}

///
/// The reversible patch engine: one instance per page load.
///
/// Single-threaded by construction: every entry point runs to completion
/// on the host's main thread, so the ledger and the DOM never race. Scroll
/// and resize bursts are coalesced to one evaluation per animation frame
/// through a boolean armed flag; the host schedules a frame callback only
/// when [Engine::on_scroll] / [Engine::on_resize] return `true`.
///
pub struct Engine<D: Dom> {
    dom: D,
    config: EngineConfig,
    state: PinState,
    ledger: PatchLedger<D>,
    spacer: Option<D::Element>,
    /// Control roots pinned by the current Fixed period, for layout
    /// refreshes and containment checks. Cleared on unpin.
    pinned_controls: Vec<D::Element>,
    frame_armed: bool,
}

impl<D: Dom> Engine<D> {
    pub fn new(dom: D, config: EngineConfig) -> Self {
        Self {
            dom,
            config,
            state: PinState::Unfixed,
            ledger: PatchLedger::new(),
            spacer: None,
            pinned_controls: Vec::new(),
            frame_armed: false,
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn state(&self) -> PinState {
        self.state
    }

    pub fn ledger(&self) -> &PatchLedger<D> {
        &self.ledger
    }

    pub fn spacer(&self) -> Option<&D::Element> {
        self.spacer.as_ref()
    }

    /// One-time setup: inject the reset stylesheet, normalize the nav
    /// padding, and evaluate once in case the page loaded pre-scrolled.
    pub fn bootstrap(&mut self) {
        if let Err(err) = self
            .dom
            .inject_stylesheet(&self.config.style_marker, &self.config.reset_css)
        {
            tracing::warn!("reset stylesheet not injected: {}", err);
        }
        self.flush_nav_padding();
        self.evaluate();
    }

    /// Scroll event arrived. Returns `true` when the caller must schedule
    /// one frame callback ending in [Engine::frame_tick]; further events
    /// before that tick are coalesced.
    pub fn on_scroll(&mut self) -> bool {
        if self.frame_armed {
            return false;
        }
        self.frame_armed = true;
        true
    }

    /// Resize event arrived. Only relevant while pinned, same coalescing
    /// contract as [Engine::on_scroll].
    pub fn on_resize(&mut self) -> bool {
        if self.state != PinState::Fixed {
            return false;
        }
        self.on_scroll()
    }

    /// The scheduled animation-frame callback: exactly one state evaluation
    /// per burst, plus a layout refresh for the pinned controls.
    pub fn frame_tick(&mut self) {
        self.frame_armed = false;
        self.evaluate();
        if self.state == PinState::Fixed {
            self.refresh_pinned_tops();
        }
    }

    /// Decide the target state from the scroll position and transition if
    /// it changed. Missing targets mean "not ready yet": do nothing and let
    /// the next trigger retry.
    pub fn evaluate(&mut self) {
        let targets = match self.resolve_targets() {
            Some(targets) => targets,
            None => return,
        };

        let scrolled = self.dom.scroll_y() > 0.0;
        match (scrolled, self.state) {
            (true, PinState::Unfixed) => self.pin(&targets),
            (false, PinState::Fixed) => self.unpin(),
            _ => {}
        }
    }

    /// The page mutated its own tree. Re-inject the stylesheet and the nav
    /// normalization (both idempotent) and, while pinned, re-assert the
    /// patches on whatever elements now match the selectors. Already-tracked
    /// elements keep their first snapshot.
    pub fn mutated(&mut self) {
        if let Err(err) = self
            .dom
            .inject_stylesheet(&self.config.style_marker, &self.config.reset_css)
        {
            tracing::warn!("reset stylesheet not re-injected: {}", err);
        }

        // Flush before re-asserting: the flush writes plain inline values,
        // and must not clobber the `!important` gap a re-assert restores.
        self.flush_nav_padding();

        if self.state == PinState::Fixed {
            if let Some(targets) = self.resolve_targets() {
                self.pin(&targets);
            }
        }
    }

    /// Undo everything; called on page teardown.
    pub fn teardown(&mut self) {
        self.unpin();
    }

    fn resolve_targets(&self) -> Option<Targets<D>> {
        let header = self.config.header.resolve(&self.dom)?;
        let pin_bar = self.config.pin_bar.resolve_within(&self.dom, &header)?;
        let collapse_bar = self.config.collapse_bar.resolve_within(&self.dom, &header);
        Some(Targets {
            header,
            collapse_bar,
            pin_bar,
        })
    }

    fn pin(&mut self, targets: &Targets<D>) {
        let header_rect = self.dom.bounding_rect(&targets.header);
        let header_height = if header_rect.height > 0.0 {
            header_rect.height
        } else {
            self.dom.bounding_rect(&targets.pin_bar).height
        };

        if let Some(bar) = &targets.collapse_bar {
            let spec = PatchSpec::new()
                .prop("height", "1px")
                .prop("min-height", "1px")
                .prop("overflow", "hidden")
                .prop("padding", "0")
                .prop("visibility", "visible");
            if let Err(err) = patch::apply(&self.dom, &mut self.ledger, bar, &spec) {
                tracing::warn!("collapse bar not patched: {}", err);
            }
        }

        let mut spec = PatchSpec::new()
            .prop("position", "fixed")
            .prop("top", "0")
            .prop("left", "0")
            .prop("right", "0")
            .prop("z-index", self.config.pin_z_index.to_string());
        for (name, value) in self.resolve_backdrop(targets) {
            spec = spec.prop(name, value);
        }
        spec = spec.prop("box-shadow", "0 1px 0 rgba(0,0,0,0.08)");
        if let Err(err) = patch::apply(&self.dom, &mut self.ledger, &targets.pin_bar, &spec) {
            tracing::warn!("pin bar not patched: {}", err);
        }

        self.ensure_spacer(&targets.header, header_height);
        if self.state != PinState::Fixed {
            tracing::debug!("pinned at scroll {}", self.dom.scroll_y());
        }
        self.state = PinState::Fixed;

        self.pin_controls(targets);
        self.apply_nav_spacing(targets);
    }

    fn unpin(&mut self) {
        self.ledger.restore_all(&self.dom);
        self.pinned_controls.clear();
        if let Some(spacer) = self.spacer.take() {
            if let Err(err) = self.dom.remove(&spacer) {
                tracing::warn!("spacer not removed: {}", err);
            }
        }
        if self.state != PinState::Unfixed {
            tracing::debug!("unpinned");
        }
        self.state = PinState::Unfixed;
    }

    /// Keep content from jumping when the header leaves the layout flow.
    fn ensure_spacer(&mut self, header: &D::Element, height: f64) {
        if self.spacer.is_some() {
            return;
        }
        let spacer = match self.create_spacer(header, height) {
            Ok(spacer) => spacer,
            Err(err) => {
                tracing::warn!("spacer not inserted: {}", err);
                return;
            }
        };
        self.spacer = Some(spacer);
    }

    fn create_spacer(&self, header: &D::Element, height: f64) -> Result<D::Element, Error> {
        let spacer = self.dom.create_element("div")?;
        self.dom
            .set_class_attribute(&spacer, &self.config.spacer_class)?;
        self.dom.set_style_property(&spacer, "width", "100%", false)?;
        self.dom
            .set_style_property(&spacer, "height", &format!("{}px", height.round()), false)?;
        self.dom.insert_after(header, &spacer)?;
        Ok(spacer)
    }

    fn pin_controls(&mut self, targets: &Targets<D>) {
        self.pinned_controls.clear();

        // Outermost roots only: a group inside an already-pinned root is
        // carried along with it.
        let lists = self.config.pinned_controls.clone();
        for list in &lists {
            let el = match list.resolve_within(&self.dom, &targets.header) {
                Some(el) => el,
                None => continue,
            };
            if self
                .pinned_controls
                .iter()
                .any(|root| self.dom.contains(root, &el))
            {
                continue;
            }
            if let Err(err) = self.pin_control_root(&el) {
                tracing::warn!("control group skipped: {}", err);
                continue;
            }
            self.pinned_controls.push(el);
        }
    }

    fn pin_control_root(&mut self, el: &D::Element) -> Result<(), Error> {
        let top = patch::corrected_top(&self.dom, el, self.config.control_top_px);
        let spec = PatchSpec::new()
            .prop("position", "fixed")
            .prop("top", format!("{}px", top))
            .prop("left", "0")
            .prop("right", "0")
            .prop("z-index", (self.config.pin_z_index + 1).to_string())
            .prop("display", "flex")
            .prop("align-items", "center")
            .prop("pointer-events", "auto")
            .prop("background", "transparent")
            .prop("padding", "0 12px")
            .prop("margin-top", "0")
            .prop("padding-top", "0")
            .prop("transform", "none");
        patch::apply(&self.dom, &mut self.ledger, el, &spec)?;

        let end_child = self.config.end_align_child.resolve_under(&self.dom, el);
        if let Some(child) = &end_child {
            self.ledger.capture(&self.dom, child);
            self.dom
                .set_style_property(child, "margin-left", "auto", false)?;
        }

        // Children with their own top spacing would sit off-center inside
        // the now-fixed group.
        for child in self.dom.children(el) {
            if end_child
                .as_ref()
                .map_or(false, |end| self.dom.same(end, &child))
            {
                continue;
            }
            if !self.child_needs_top_reset(&child) {
                continue;
            }
            self.ledger.capture(&self.dom, &child);
            if let Err(err) = self.reset_child_top(&child) {
                tracing::warn!("child spacing not reset: {}", err);
            }
        }

        Ok(())
    }

    fn child_needs_top_reset(&self, child: &D::Element) -> bool {
        let non_default = |property: &str, default: &str| {
            self.dom
                .computed_style(child, property)
                .map_or(false, |v| !v.is_empty() && v != default)
        };
        non_default("margin-top", "0px")
            || non_default("padding-top", "0px")
            || non_default("transform", "none")
    }

    fn reset_child_top(&self, child: &D::Element) -> Result<(), Error> {
        self.dom.set_style_property(child, "margin-top", "0", false)?;
        self.dom
            .set_style_property(child, "padding-top", "0", false)?;
        self.dom
            .set_style_property(child, "transform", "none", false)?;
        Ok(())
    }

    /// Recompute the corrected `top` of every pinned control group; layout
    /// may have moved an alternate containing block since the last frame.
    fn refresh_pinned_tops(&self) {
        for el in &self.pinned_controls {
            let fixed = self
                .dom
                .computed_style(el, "position")
                .map_or(false, |pos| pos == "fixed");
            if !fixed {
                continue;
            }
            let top = patch::corrected_top(&self.dom, el, self.config.control_top_px);
            if let Err(err) = self
                .dom
                .set_style_property(el, "top", &format!("{}px", top), false)
            {
                tracing::warn!("pinned top not refreshed: {}", err);
            }
        }
    }

    /// Pick a solid backdrop for the pinned bar so page content does not
    /// show through: first non-transparent background color of the bar,
    /// header or collapsed bar, then any header background image, then a
    /// color-scheme fallback. Translucent headers keep their blur.
    fn resolve_backdrop(&self, targets: &Targets<D>) -> Vec<(&'static str, String)> {
        let transparent = |value: &str| {
            value.is_empty()
                || value == "transparent"
                || value == "rgba(0, 0, 0, 0)"
                || value == "rgba(0,0,0,0)"
        };
        let color_of = |el: &D::Element| {
            self.dom
                .computed_style(el, "background-color")
                .filter(|color| !transparent(color))
        };
        let image_of = |el: &D::Element| {
            self.dom
                .computed_style(el, "background-image")
                .filter(|image| !image.is_empty() && image != "none")
        };
        let filter_of = |el: &D::Element| {
            self.dom
                .computed_style(el, "backdrop-filter")
                .filter(|f| !f.is_empty() && f != "none")
        };

        let mut props: Vec<(&'static str, String)> = Vec::new();

        let color = color_of(&targets.pin_bar)
            .or_else(|| color_of(&targets.header))
            .or_else(|| targets.collapse_bar.as_ref().and_then(color_of));
        match color {
            Some(color) => props.push(("background", color)),
            None => {
                let mut sources: Vec<&D::Element> = vec![&targets.header];
                if let Some(bar) = &targets.collapse_bar {
                    sources.push(bar);
                }
                let imaged = sources
                    .into_iter()
                    .find_map(|el| image_of(el).map(|image| (el, image)));
                match imaged {
                    Some((el, image)) => {
                        props.push(("background-image", image));
                        if let Some(size) = self.dom.computed_style(el, "background-size") {
                            props.push(("background-size", size));
                        }
                        if let Some(position) =
                            self.dom.computed_style(el, "background-position")
                        {
                            props.push(("background-position", position));
                        }
                    }
                    None => {
                        let fallback = if self.dom.prefers_dark() {
                            "#0b1117"
                        } else {
                            "#ffffff"
                        };
                        props.push(("background", fallback.to_string()));
                    }
                }
            }
        }

        let blur = filter_of(&targets.header)
            .or_else(|| targets.collapse_bar.as_ref().and_then(filter_of));
        if let Some(blur) = blur {
            props.push(("backdrop-filter", blur));
        }

        props
    }

    /// Normalize the nav padding outside the patch ledger: a permanent
    /// flush the reset stylesheet also enforces, applied inline here so it
    /// holds before the stylesheet loads.
    fn flush_nav_padding(&self) {
        let header = self.config.header.resolve(&self.dom);
        let pin_bar = self.config.pin_bar.resolve(&self.dom);

        for el in self.resolve_nav_targets() {
            if self.skip_nav_target(&el, header.as_ref(), pin_bar.as_ref()) {
                continue;
            }
            let flush = || -> Result<(), Error> {
                self.dom.set_style_property(&el, "padding-right", "0", false)?;
                self.dom.set_style_property(&el, "margin-right", "0", false)?;
                self.dom.set_style_property(&el, "position", "relative", false)?;
                Ok(())
            };
            if let Err(err) = flush() {
                tracing::warn!("nav padding not flushed: {}", err);
            }
        }
    }

    fn resolve_nav_targets(&self) -> Vec<D::Element> {
        let mut targets = self.config.nav_actions.resolve_all(&self.dom);
        if !targets.is_empty() {
            return targets;
        }
        // Fall back to the surrounding containers, preferring an actions
        // element nested inside them.
        for container in self.config.nav_containers.resolve_all(&self.dom) {
            let target = self
                .config
                .nav_actions
                .resolve_under(&self.dom, &container)
                .unwrap_or(container);
            if !targets.iter().any(|seen| self.dom.same(seen, &target)) {
                targets.push(target);
            }
        }
        targets
    }

    fn skip_nav_target(
        &self,
        el: &D::Element,
        header: Option<&D::Element>,
        pin_bar: Option<&D::Element>,
    ) -> bool {
        let in_header = header.map_or(false, |h| self.dom.contains(h, el));
        let in_pin_bar = pin_bar.map_or(false, |bar| self.dom.contains(bar, el));
        if in_header && !in_pin_bar {
            return true;
        }
        self.pinned_controls
            .iter()
            .any(|root| self.dom.contains(root, el))
    }

    /// Reserve room on the nav's right edge for the pinned controls. The
    /// gap is the measured width of the widest connected control group plus
    /// the configured extra, never a hard-coded figure.
    fn apply_nav_spacing(&mut self, targets: &Targets<D>) {
        let mut width: f64 = 0.0;
        for el in &self.pinned_controls {
            if self.dom.is_connected(el) {
                width = width.max(self.dom.bounding_rect(el).width);
            }
        }
        if width <= 0.0 {
            return;
        }
        let needed = (width + self.config.nav_gap_px).round() as i32;

        let candidates = self.resolve_nav_targets();
        let visible: Vec<D::Element> = candidates
            .iter()
            .filter(|el| self.is_visible(el))
            .cloned()
            .collect();
        let chosen = if visible.is_empty() { candidates } else { visible };

        for el in chosen {
            if self.skip_nav_target(&el, Some(&targets.header), Some(&targets.pin_bar)) {
                continue;
            }
            // Spacing on an absolutely-positioned or hidden actions element
            // would not move the visible nav; size its container instead.
            let apply_target = if self.needs_container(&el) {
                self.config
                    .nav_containers
                    .closest(&self.dom, &el)
                    .or_else(|| self.dom.parent(&el))
                    .unwrap_or_else(|| el.clone())
            } else {
                el.clone()
            };
            if let Err(err) = self.reserve_nav_gap(&apply_target, &el, needed) {
                tracing::warn!("nav spacing skipped for one element: {}", err);
            }
        }
    }

    fn is_visible(&self, el: &D::Element) -> bool {
        let style_ok = self
            .dom
            .computed_style(el, "visibility")
            .map_or(true, |v| v != "hidden")
            && self
                .dom
                .computed_style(el, "display")
                .map_or(true, |v| v != "none");
        if !style_ok {
            return false;
        }
        let rect = self.dom.bounding_rect(el);
        rect.width > 0.0 && rect.height > 0.0
    }

    fn needs_container(&self, el: &D::Element) -> bool {
        let is = |property: &str, value: &str| {
            self.dom
                .computed_style(el, property)
                .map_or(false, |v| v == value)
        };
        is("position", "absolute") || is("visibility", "hidden") || is("display", "none")
    }

    fn reserve_nav_gap(
        &mut self,
        apply_target: &D::Element,
        actions: &D::Element,
        needed: i32,
    ) -> Result<(), Error> {
        self.ledger.capture_with_classes(&self.dom, apply_target);
        if !self.dom.same(apply_target, actions) {
            self.ledger.capture_with_classes(&self.dom, actions);
        }

        self.strip_spacing_classes(apply_target);
        self.strip_spacing_classes(actions);

        // Padding shorthand keeps the computed top/bottom/left while the
        // right side takes the reserved gap.
        let side = |property: &str| {
            self.dom
                .computed_style(apply_target, property)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "0px".to_string())
        };
        let shorthand = format!(
            "{} {}px {} {}",
            side("padding-top"),
            needed,
            side("padding-bottom"),
            side("padding-left")
        );
        let gap = format!("{}px", needed);

        self.dom
            .set_style_property(apply_target, "padding", &shorthand, true)?;
        self.dom
            .set_style_property(apply_target, "padding-right", &gap, true)?;
        self.dom
            .set_style_property(apply_target, "margin-right", &gap, true)?;
        self.dom
            .set_style_property(actions, "padding-right", &gap, true)?;
        self.dom
            .set_style_property(actions, "margin-right", &gap, true)?;
        Ok(())
    }

    /// Drop `pr-*` spacing utility classes that would override the reserved
    /// gap. Class backups live in the ledger entries of the affected
    /// elements.
    fn strip_spacing_classes(&self, el: &D::Element) {
        for class in self.dom.class_list(el) {
            if !is_spacing_utility(&class) {
                continue;
            }
            if let Err(err) = self.dom.remove_class(el, &class) {
                tracing::warn!("utility class {} not removed: {}", class, err);
            }
        }
    }
}

/// Matches right-padding utility classes such as `pr-3` or `pr-lg-4`.
fn is_spacing_utility(class: &str) -> bool {
    let mut segments = class.split('-');
    if segments.next() != Some("pr") {
        return false;
    }
    let rest: Vec<&str> = segments.collect();
    match rest.split_last() {
        Some((last, middle)) => {
            last.parse::<u32>().is_ok()
                && middle
                    .iter()
                    .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric()))
        }
        None => false,
    }
}
