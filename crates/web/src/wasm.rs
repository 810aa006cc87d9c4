use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use js_sys::Function;
use sequencer::{
    AnimationHooks, ClassName, ElementId, Route, Scheduler, Sequencer, SequencerEvent,
    StorageError, StorageKey, Surface, TimerHandle, TimerKind, VisitStore,
};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement, MouseEvent, Storage, Window};

use crate::{elapsed_between, timeout_millis, with_idle, CLEANUP_HOOK, INIT_HOOK};

type PageSequencer = Sequencer<LocalStore, DomSurface, WindowScheduler, GlobalHooks>;

fn js_reason(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

// ---------------------------------------------------------------------------
// localStorage
// ---------------------------------------------------------------------------

/// [`VisitStore`] over `window.localStorage`.
///
/// Private browsing modes may refuse access to storage altogether; every
/// call then reports [`StorageError::Unavailable`].
pub struct LocalStore {
    storage: Option<Storage>,
}

impl LocalStore {
    pub fn from_window(window: &Window) -> Self {
        let storage = match window.local_storage() {
            Ok(storage) => storage,
            Err(e) => {
                warn!(reason = %js_reason(&e), "localStorage refused");
                None
            }
        };
        Self { storage }
    }

    fn storage(&self) -> Result<&Storage, StorageError> {
        self.storage.as_ref().ok_or_else(|| StorageError::Unavailable {
            reason: "localStorage is not available".to_string(),
        })
    }
}

fn unavailable(e: JsValue) -> StorageError {
    StorageError::Unavailable {
        reason: js_reason(&e),
    }
}

impl VisitStore for LocalStore {
    fn get(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        self.storage()?.get_item(key.as_str()).map_err(unavailable)
    }

    fn set(&mut self, key: &StorageKey, value: &str) -> Result<(), StorageError> {
        self.storage()?
            .set_item(key.as_str(), value)
            .map_err(unavailable)
    }

    fn remove(&mut self, key: &StorageKey) -> Result<(), StorageError> {
        self.storage()?.remove_item(key.as_str()).map_err(unavailable)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// [`Surface`] over the live document.
pub struct DomSurface {
    document: Document,
}

impl DomSurface {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn html(&self, id: &ElementId) -> Option<HtmlElement> {
        self.document
            .get_element_by_id(id.as_str())
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
    }
}

impl Surface for DomSurface {
    fn contains(&self, id: &ElementId) -> bool {
        self.document.get_element_by_id(id.as_str()).is_some()
    }

    fn add_class(&mut self, id: &ElementId, class: &ClassName) {
        if let Some(el) = self.document.get_element_by_id(id.as_str()) {
            if let Err(e) = el.class_list().add_1(class.as_str()) {
                debug!(element = %id, reason = %js_reason(&e), "classList.add failed");
            }
        }
    }

    fn remove_class(&mut self, id: &ElementId, class: &ClassName) {
        if let Some(el) = self.document.get_element_by_id(id.as_str()) {
            if let Err(e) = el.class_list().remove_1(class.as_str()) {
                debug!(element = %id, reason = %js_reason(&e), "classList.remove failed");
            }
        }
    }

    fn set_visible(&mut self, id: &ElementId, visible: bool) {
        let Some(el) = self.html(id) else {
            return;
        };
        let style = el.style();
        let result = if visible {
            style.remove_property("display").map(|_| ())
        } else {
            style.set_property("display", "none")
        };
        if let Err(e) = result {
            debug!(element = %id, reason = %js_reason(&e), "style update failed");
        }
    }

    fn is_visible(&self, id: &ElementId) -> bool {
        match self.html(id) {
            Some(el) => el
                .style()
                .get_property_value("display")
                .map(|display| display != "none")
                .unwrap_or(true),
            None => self.contains(id),
        }
    }
}

// ---------------------------------------------------------------------------
// setTimeout
// ---------------------------------------------------------------------------

/// Routes elapsed timers back into the sequencer once it exists.
#[derive(Clone, Default)]
struct Dispatcher(Rc<RefCell<Option<Rc<dyn Fn(SequencerEvent)>>>>);

impl Dispatcher {
    fn bind(&self, target: Rc<dyn Fn(SequencerEvent)>) {
        *self.0.borrow_mut() = Some(target);
    }

    fn dispatch(&self, event: SequencerEvent) {
        let target = self.0.borrow().clone();
        match target {
            Some(target) => target(event),
            None => warn!(?event, "timer fired before the sequencer was bound"),
        }
    }
}

/// [`Scheduler`] over `window.setTimeout`.
///
/// The clock is `Date.now()` relative to construction. Each pending timer
/// maps our handle to the browser's timeout id so it can be cleared.
pub struct WindowScheduler {
    window: Window,
    origin_ms: f64,
    next_id: u64,
    pending: Rc<RefCell<HashMap<u64, i32>>>,
    dispatcher: Dispatcher,
}

impl WindowScheduler {
    fn new(window: Window, dispatcher: Dispatcher) -> Self {
        Self {
            window,
            origin_ms: js_sys::Date::now(),
            next_id: 1,
            pending: Rc::default(),
            dispatcher,
        }
    }

    /// Number of timers armed and not yet fired or cleared.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl Scheduler for WindowScheduler {
    fn now(&self) -> Duration {
        elapsed_between(self.origin_ms, js_sys::Date::now())
    }

    fn schedule(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;

        let pending = Rc::clone(&self.pending);
        let dispatcher = self.dispatcher.clone();
        // Frees itself after the single invocation; a cleared timeout leaks
        // its closure, which is at most a handful per page load.
        let callback = Closure::once_into_js(move || {
            pending.borrow_mut().remove(&id);
            dispatcher.dispatch(SequencerEvent::TimerFired(kind));
        });
        let function: &Function = callback.unchecked_ref();

        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(function, timeout_millis(delay))
        {
            Ok(timeout_id) => {
                self.pending.borrow_mut().insert(id, timeout_id);
            }
            Err(e) => warn!(?kind, reason = %js_reason(&e), "setTimeout failed"),
        }
        TimerHandle::new(id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(timeout_id) = self.pending.borrow_mut().remove(&handle.as_u64()) {
            self.window.clear_timeout_with_handle(timeout_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Animation hooks
// ---------------------------------------------------------------------------

/// [`AnimationHooks`] calling optional functions on the global object.
#[derive(Debug, Default)]
pub struct GlobalHooks;

fn call_global(name: &str) -> bool {
    let global = js_sys::global();
    let Ok(value) = js_sys::Reflect::get(&global, &JsValue::from_str(name)) else {
        return false;
    };
    if !value.is_function() {
        debug!(hook = name, "hook not defined");
        return false;
    }
    let function: Function = value.unchecked_into();
    match function.call0(&global) {
        Ok(_) => true,
        Err(e) => {
            warn!(hook = name, reason = %js_reason(&e), "hook threw");
            true
        }
    }
}

impl AnimationHooks for GlobalHooks {
    fn init_loader(&mut self) -> bool {
        call_global(INIT_HOOK)
    }

    fn cleanup(&mut self) -> bool {
        call_global(CLEANUP_HOOK)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Keeps the sequencer and its click listener alive. Dropping it detaches
/// the listener and turns any armed timers into no-ops.
#[wasm_bindgen]
pub struct RevealHandle {
    sequencer: Rc<RefCell<PageSequencer>>,
    loader: Option<web_sys::Element>,
    on_click: Closure<dyn FnMut(MouseEvent)>,
}

#[wasm_bindgen]
impl RevealHandle {
    /// Current overlay state (`shown`, `exploding`, `revealed`, `hidden`),
    /// or `undefined` when the page has no overlay.
    pub fn state(&self) -> Option<String> {
        with_idle(&*self.sequencer, |sequencer| sequencer.state())
            .flatten()
            .map(|state| state.to_string())
    }

    /// Starts the transition as if the overlay had been clicked.
    #[wasm_bindgen(js_name = startTransition)]
    pub fn start_transition(&self) -> bool {
        with_idle(&*self.sequencer, |sequencer| sequencer.start_transition()).unwrap_or(false)
    }

    /// Clears the visit flag so the next load of the entry page shows the
    /// overlay again.
    #[wasm_bindgen(js_name = resetVisitFlag)]
    pub fn reset_visit_flag(&self) -> Result<(), JsValue> {
        with_idle(&*self.sequencer, |sequencer| sequencer.reset())
            .ok_or_else(|| JsValue::from_str("sequencer busy"))?
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl Drop for RevealHandle {
    fn drop(&mut self) {
        if let Some(loader) = &self.loader {
            let _ = loader
                .remove_event_listener_with_callback("click", self.on_click.as_ref().unchecked_ref());
        }
    }
}

/// Wires the sequencer to the current page and initialises it for
/// `location.pathname`.
#[wasm_bindgen(js_name = startRevealSequencer)]
pub fn start_reveal_sequencer() -> Result<RevealHandle, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let route = Route::new(window.location().pathname()?);

    let dispatcher = Dispatcher::default();
    let sequencer = Sequencer::new(
        LocalStore::from_window(&window),
        DomSurface::new(document.clone()),
        WindowScheduler::new(window, dispatcher.clone()),
    )
    .with_hooks(GlobalHooks);
    let loader_id = sequencer.settings().dom.loader.clone();
    let sequencer = Rc::new(RefCell::new(sequencer));

    let weak = Rc::downgrade(&sequencer);
    dispatcher.bind(Rc::new(move |event| {
        let Some(sequencer) = weak.upgrade() else {
            return;
        };
        if with_idle(&*sequencer, |sequencer| sequencer.advance(event)).is_none() {
            warn!(?event, "sequencer busy; event dropped");
        }
    }));

    let outcome = sequencer.borrow_mut().initialize(&route);
    debug!(?outcome, route = %route, "reveal sequencer started");

    let clicked = Rc::downgrade(&sequencer);
    let on_click = Closure::<dyn FnMut(MouseEvent)>::new(move |_event: MouseEvent| {
        if let Some(sequencer) = clicked.upgrade() {
            with_idle(&*sequencer, |sequencer| sequencer.advance(SequencerEvent::Click));
        }
    });

    let loader = document.get_element_by_id(loader_id.as_str());
    if let Some(loader) = &loader {
        loader.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
    }

    Ok(RevealHandle {
        sequencer,
        loader,
        on_click,
    })
}
