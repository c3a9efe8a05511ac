use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use super::WebDom;
use crate::engine::Engine;
use crate::error::Error;

///
/// Wires one [Engine] to the live page: a mutation observer over the whole
/// document subtree, a passive scroll listener and a resize listener that
/// both coalesce into a single animation-frame callback, and an unload hook
/// that disconnects everything.
///
/// The browser only holds weak references to these closures, so the
/// patcher must stay alive for as long as the page does: either keep the
/// returned value around or call [PagePatcher::forget].
///
pub struct PagePatcher {
    engine: Rc<RefCell<Engine<WebDom>>>,
    observer: web_sys::MutationObserver,
    _frame: Rc<Closure<dyn FnMut()>>,
    _on_scroll: Closure<dyn FnMut()>,
    _on_resize: Closure<dyn FnMut()>,
    _on_mutation: Closure<dyn FnMut()>,
    _on_unload: Closure<dyn FnMut()>,
}

impl PagePatcher {
    /// Bootstrap the engine and subscribe to every trigger source.
    pub fn install(mut engine: Engine<WebDom>) -> Result<PagePatcher, Error> {
        let window = web_sys::window().ok_or(Error::JsError)?;
        let document = window.document().ok_or(Error::JsError)?;

        engine.bootstrap();
        let engine = Rc::new(RefCell::new(engine));

        // One shared frame callback; scheduled at most once per burst
        // because the engine arms itself until the tick runs.
        let frame = {
            let engine = engine.clone();
            Rc::new(Closure::wrap(Box::new(move || {
                engine.borrow_mut().frame_tick();
            }) as Box<dyn FnMut()>))
        };

        let on_scroll = {
            let engine = engine.clone();
            let frame = frame.clone();
            let window = window.clone();
            Closure::wrap(Box::new(move || {
                if engine.borrow_mut().on_scroll() {
                    schedule_frame(&window, &frame);
                }
            }) as Box<dyn FnMut()>)
        };
        let scroll_options = web_sys::AddEventListenerOptions::new();
        scroll_options.set_passive(true);
        window.add_event_listener_with_callback_and_add_event_listener_options(
            "scroll",
            on_scroll.as_ref().unchecked_ref(),
            &scroll_options,
        )?;

        let on_resize = {
            let engine = engine.clone();
            let frame = frame.clone();
            let window = window.clone();
            Closure::wrap(Box::new(move || {
                if engine.borrow_mut().on_resize() {
                    schedule_frame(&window, &frame);
                }
            }) as Box<dyn FnMut()>)
        };
        window
            .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())?;

        // The observer callback never fires re-entrantly (mutation batches
        // are delivered between tasks), and re-asserting is idempotent, so
        // the engine's own writes only cost a redundant pass.
        let on_mutation = {
            let engine = engine.clone();
            Closure::wrap(Box::new(move || {
                engine.borrow_mut().mutated();
            }) as Box<dyn FnMut()>)
        };
        let observer =
            web_sys::MutationObserver::new(on_mutation.as_ref().unchecked_ref())?;
        let init = web_sys::MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        let watch_root: web_sys::Node = match document.document_element() {
            Some(root) => root.into(),
            None => document.into(),
        };
        observer.observe_with_options(&watch_root, &init)?;

        let on_unload = {
            let engine = engine.clone();
            let observer = observer.clone();
            Closure::wrap(Box::new(move || {
                observer.disconnect();
                engine.borrow_mut().teardown();
            }) as Box<dyn FnMut()>)
        };
        window.add_event_listener_with_callback(
            "beforeunload",
            on_unload.as_ref().unchecked_ref(),
        )?;

        Ok(PagePatcher {
            engine,
            observer,
            _frame: frame,
            _on_scroll: on_scroll,
            _on_resize: on_resize,
            _on_mutation: on_mutation,
            _on_unload: on_unload,
        })
    }

    pub fn engine(&self) -> &Rc<RefCell<Engine<WebDom>>> {
        &self.engine
    }

    /// Stop observing and restore the page.
    pub fn disconnect(&self) {
        self.observer.disconnect();
        self.engine.borrow_mut().teardown();
    }

    /// Leak the patcher so the closures outlive this scope; the usual way
    /// to install from a userscript entry point.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

fn schedule_frame(window: &web_sys::Window, frame: &Rc<Closure<dyn FnMut()>>) {
    if let Err(err) = window.request_animation_frame(frame.as_ref().as_ref().unchecked_ref()) {
        tracing::warn!("animation frame not scheduled: {:?}", err);
    }
}
