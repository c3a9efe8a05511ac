#![cfg(feature = "server")]

//!
//! Full-engine scenarios against the in-memory backend, mirroring a
//! github.com-like page: a header with a collapsible global bar, a local
//! bar that gets pinned, a right-side control group and an actions nav
//! that must reserve room for it.
//!

use restyle::engine::{Engine, EngineConfig, PinState};
use restyle::server::{RcNode, ServerDom};
use restyle::{Dom, Rect};

struct Page {
    header: RcNode,
    global_bar: RcNode,
    global_end: RcNode,
    user: RcNode,
    local_bar: RcNode,
    nav: RcNode,
    actions: RcNode,
}

const FLUSHED: &str = "padding-right: 0; margin-right: 0; position: relative;";

fn build_page(dom: &ServerDom) -> Page {
    let header = dom.create_element_with_classes("header", &["AppHeader"]);
    header.set_rect(Rect {
        top: 0.0,
        left: 0.0,
        width: 1280.0,
        height: 64.0,
    });

    let global_bar = dom.create_element_with_classes("div", &["AppHeader-globalBar"]);
    let global_end = dom.create_element_with_classes("div", &["AppHeader-globalBar-end"]);
    global_end.set_rect(Rect {
        top: 0.0,
        left: 980.0,
        width: 300.0,
        height: 32.0,
    });
    let user = dom.create_element_with_classes("div", &["AppHeader-user"]);

    let local_bar = dom.create_element_with_classes("div", &["AppHeader-localBar"]);
    local_bar.set_rect(Rect {
        top: 32.0,
        left: 0.0,
        width: 1280.0,
        height: 32.0,
    });

    let main = dom.create_element_with_classes("main", &[]);
    let nav = dom.create_element_with_classes("nav", &["UnderlineNav"]);
    let actions = dom.create_element_with_classes("div", &["UnderlineNav-actions", "pr-3"]);

    dom.body().append_child(header.clone());
    header.append_child(global_bar.clone());
    global_bar.append_child(global_end.clone());
    global_end.append_child(user.clone());
    header.append_child(local_bar.clone());
    dom.body().append_child(main.clone());
    main.append_child(nav.clone());
    nav.append_child(actions.clone());

    Page {
        header,
        global_bar,
        global_end,
        user,
        local_bar,
        nav,
        actions,
    }
}

fn style_of(engine: &Engine<ServerDom>, el: &RcNode) -> String {
    engine.dom().style_attribute(el).unwrap_or_default()
}

fn scroll_to(engine: &mut Engine<ServerDom>, y: f64) {
    engine.dom().set_scroll(y);
    assert!(engine.on_scroll());
    engine.frame_tick();
}

#[test]
fn scenario_a_page_loaded_at_top() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();

    assert_eq!(engine.state(), PinState::Unfixed);
    assert!(engine.ledger().is_empty());
    assert!(engine.spacer().is_none());
    assert!(!engine.dom().render().contains("restyle-spacer"));

    // The reset stylesheet went in exactly once, under its marker.
    let sheets = engine.dom().injected_stylesheets();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].0, "data-restyle");

    // The nav padding flush is inline and immediate.
    assert_eq!(style_of(&engine, &page.actions), FLUSHED);
    assert!(style_of(&engine, &page.local_bar).is_empty());
}

#[test]
fn scenario_b_pins_on_scroll() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();

    scroll_to(&mut engine, 120.0);

    assert_eq!(engine.state(), PinState::Fixed);
    // One apply pass: collapse bar, pin bar, control root, end-aligned
    // child, nav actions.
    assert_eq!(engine.ledger().len(), 5);

    let local = style_of(&engine, &page.local_bar);
    assert!(local.contains("position: fixed;"), "local bar: {}", local);
    assert!(local.contains("top: 0;"));
    assert!(local.contains("z-index: 9998;"));

    let global = style_of(&engine, &page.global_bar);
    assert!(global.contains("height: 1px;"));
    assert!(global.contains("overflow: hidden;"));

    // Spacer carries the measured header height and sits right after the
    // header so content keeps its offset.
    let spacer = engine.spacer().cloned().expect("spacer missing");
    assert!(style_of(&engine, &spacer).contains("height: 64px;"));
    let rendered = engine.dom().render();
    let header_at = rendered.find("AppHeader").unwrap();
    let spacer_at = rendered.find("restyle-spacer").unwrap();
    assert!(spacer_at > header_at);

    let controls = style_of(&engine, &page.global_end);
    assert!(controls.contains("position: fixed;"));
    assert!(controls.contains("top: 8px;"));
    assert!(controls.contains("z-index: 9999;"));

    assert!(style_of(&engine, &page.user).contains("margin-left: auto;"));

    // Nav reserves the measured control width (300) plus the 8px gap.
    let actions = style_of(&engine, &page.actions);
    assert!(
        actions.contains("padding-right: 308px !important;"),
        "actions: {}",
        actions
    );
    assert!(actions.contains("padding: 0px 308px 0px 0px !important;"));
    assert_eq!(
        engine.dom().class_attribute(&page.actions).as_deref(),
        Some("UnderlineNav-actions")
    );
}

#[test]
fn scenario_c_restores_at_top() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();

    scroll_to(&mut engine, 120.0);
    scroll_to(&mut engine, 0.0);

    assert_eq!(engine.state(), PinState::Unfixed);
    assert!(engine.ledger().is_empty());
    assert!(engine.spacer().is_none());
    assert!(!engine.dom().render().contains("restyle-spacer"));

    // Every patched element is back to its pre-pin inline state.
    assert_eq!(engine.dom().style_attribute(&page.local_bar), None);
    assert_eq!(engine.dom().style_attribute(&page.global_bar), None);
    assert_eq!(engine.dom().style_attribute(&page.global_end), None);
    assert_eq!(engine.dom().style_attribute(&page.user), None);
    assert_eq!(style_of(&engine, &page.actions), FLUSHED);
    assert_eq!(
        engine.dom().class_attribute(&page.actions).as_deref(),
        Some("UnderlineNav-actions pr-3")
    );

    // A second pass through the cycle behaves the same.
    scroll_to(&mut engine, 80.0);
    assert_eq!(engine.state(), PinState::Fixed);
    assert_eq!(engine.ledger().len(), 5);
    scroll_to(&mut engine, 0.0);
    assert_eq!(engine.dom().style_attribute(&page.local_bar), None);
}

#[test]
fn scenario_d_spa_rerender_while_pinned() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();
    scroll_to(&mut engine, 120.0);
    assert_eq!(engine.ledger().len(), 5);

    // The page swaps the pinned bar for a fresh, selector-equivalent node.
    page.local_bar.unlink();
    let replacement = engine
        .dom()
        .create_element_with_classes("div", &["AppHeader-localBar"]);
    replacement.set_rect(Rect {
        top: 32.0,
        left: 0.0,
        width: 1280.0,
        height: 32.0,
    });
    page.header.append_child(replacement.clone());

    engine.mutated();

    assert_eq!(engine.state(), PinState::Fixed);
    assert!(style_of(&engine, &replacement).contains("position: fixed;"));
    // One new snapshot for the new node, none duplicated for survivors.
    assert_eq!(engine.ledger().len(), 6);
    // The reserved nav gap survives the re-assert.
    assert!(style_of(&engine, &page.actions).contains("padding-right: 308px !important;"));
    // Still exactly one spacer and one stylesheet.
    assert_eq!(engine.dom().render().matches("restyle-spacer").count(), 1);
    assert_eq!(engine.dom().injected_stylesheets().len(), 1);
}

#[test]
fn scroll_bursts_coalesce_to_one_evaluation() {
    let dom = ServerDom::new();
    build_page(&dom);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();

    engine.dom().set_scroll(50.0);
    let scheduled: Vec<bool> = (0..5).map(|_| engine.on_scroll()).collect();
    assert_eq!(scheduled, vec![true, false, false, false, false]);

    engine.frame_tick();
    assert_eq!(engine.state(), PinState::Fixed);

    // The next burst arms again.
    assert!(engine.on_scroll());
}

#[test]
fn missing_targets_mean_not_ready() {
    let dom = ServerDom::new();
    // No header at all yet.
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();

    engine.dom().set_scroll(100.0);
    assert!(engine.on_scroll());
    engine.frame_tick();

    assert_eq!(engine.state(), PinState::Unfixed);
    assert!(engine.ledger().is_empty());
}

#[test]
fn corrects_top_inside_alternate_containing_block() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    page.global_bar
        .set_computed_style("transform", "translateY(10px)");
    page.global_bar.set_rect(Rect {
        top: 10.0,
        left: 0.0,
        width: 1280.0,
        height: 32.0,
    });

    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();
    scroll_to(&mut engine, 120.0);

    // Desired 8px from the viewport, ancestor at 10px: inline top is -2px.
    assert!(style_of(&engine, &page.global_end).contains("top: -2px;"));

    // Layout moved the ancestor; a resize tick recomputes the offset.
    page.global_bar.set_rect(Rect {
        top: 20.0,
        left: 0.0,
        width: 1280.0,
        height: 32.0,
    });
    assert!(engine.on_resize());
    engine.frame_tick();
    assert!(style_of(&engine, &page.global_end).contains("top: -12px;"));
}

#[test]
fn resize_is_ignored_while_unfixed() {
    let dom = ServerDom::new();
    build_page(&dom);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();

    assert!(!engine.on_resize());
}

#[test]
fn backdrop_falls_back_to_color_scheme() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    dom.set_prefers_dark(true);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();
    scroll_to(&mut engine, 60.0);

    assert!(style_of(&engine, &page.local_bar).contains("background: #0b1117;"));
}

#[test]
fn backdrop_prefers_real_background_color() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    page.local_bar
        .set_computed_style("background-color", "rgb(36, 41, 46)");
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();
    scroll_to(&mut engine, 60.0);

    assert!(style_of(&engine, &page.local_bar).contains("background: rgb(36, 41, 46);"));
}

#[test]
fn hidden_actions_put_spacing_on_their_container() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    page.actions.set_computed_style("position", "absolute");

    let mut engine = Engine::new(dom, EngineConfig::github());
    // No bootstrap: the inline flush would neutralize the absolute
    // positioning, which is exactly what this test must keep.
    engine.dom().set_scroll(90.0);
    assert!(engine.on_scroll());
    engine.frame_tick();

    let nav = style_of(&engine, &page.nav);
    assert!(nav.contains("padding-right: 308px !important;"), "nav: {}", nav);
    let actions = style_of(&engine, &page.actions);
    assert!(actions.contains("padding-right: 308px !important;"));
}

#[test]
fn state_and_ledger_always_agree() {
    let dom = ServerDom::new();
    build_page(&dom);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();

    let check = |engine: &Engine<ServerDom>| match engine.state() {
        PinState::Unfixed => assert!(engine.ledger().is_empty()),
        PinState::Fixed => assert!(!engine.ledger().is_empty()),
    };

    check(&engine);
    for &y in &[30.0, 0.0, 500.0, 500.0, 0.0, 1.0] {
        engine.dom().set_scroll(y);
        if engine.on_scroll() {
            engine.frame_tick();
        }
        check(&engine);
    }

    engine.mutated();
    check(&engine);
    engine.teardown();
    assert_eq!(engine.state(), PinState::Unfixed);
    check(&engine);
}

#[test]
fn unpin_survives_page_removed_spacer() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();
    scroll_to(&mut engine, 120.0);

    // The page tears out the spacer on its own; removing it again during
    // unpin fails, and the failure must not stop the restore.
    let spacer = engine.spacer().cloned().expect("spacer missing");
    spacer.unlink();

    scroll_to(&mut engine, 0.0);

    assert_eq!(engine.state(), PinState::Unfixed);
    assert!(engine.ledger().is_empty());
    assert!(engine.spacer().is_none());
    assert_eq!(engine.dom().style_attribute(&page.local_bar), None);
    assert_eq!(engine.dom().style_attribute(&page.global_bar), None);
    assert_eq!(style_of(&engine, &page.actions), FLUSHED);
    assert_eq!(
        engine.dom().class_attribute(&page.actions).as_deref(),
        Some("UnderlineNav-actions pr-3")
    );
}

#[test]
fn teardown_restores_everything() {
    let dom = ServerDom::new();
    let page = build_page(&dom);
    let mut engine = Engine::new(dom, EngineConfig::github());
    engine.bootstrap();
    scroll_to(&mut engine, 250.0);
    assert_eq!(engine.state(), PinState::Fixed);

    engine.teardown();

    assert_eq!(engine.state(), PinState::Unfixed);
    assert!(engine.ledger().is_empty());
    assert_eq!(engine.dom().style_attribute(&page.local_bar), None);
    assert!(!engine.dom().render().contains("restyle-spacer"));
}
