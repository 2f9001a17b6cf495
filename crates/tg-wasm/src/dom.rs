//! `web-sys` implementations of the engine's host traits.

use std::collections::HashMap;

use js_sys::{Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlElement, HtmlMediaElement, Window};

use tg_core::dom::{Dom, DomError, Scheduler};
use tg_core::{DomEvent, Listener, Selector, TimerId};

/// Element property holding the handler functions bound on it, keyed by
/// `"<event>:<listener>"`. Handlers live and die with their element.
const BINDINGS_PROPERTY: &str = "__tgBindings";

fn js_error(err: JsValue) -> DomError {
    DomError::Host(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

fn binding_key(event: DomEvent, listener: Listener) -> JsValue {
    JsValue::from_str(&format!("{}:{}", event.name(), listener.name()))
}

/// The live document.
pub struct WebDom {
    window: Window,
    document: Document,
    on_play_rejected: Closure<dyn FnMut(JsValue)>,
}

impl WebDom {
    pub fn new(window: Window) -> Result<Self, DomError> {
        let document = window
            .document()
            .ok_or_else(|| DomError::Host("window has no document".to_string()))?;
        let on_play_rejected = Closure::<dyn FnMut(JsValue)>::new(|reason: JsValue| {
            log::warn!("Could not resume video: {:?}", reason);
        });
        Ok(Self {
            window,
            document,
            on_play_rejected,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn binding_store(node: &Element, create: bool) -> Option<Object> {
        let existing = Reflect::get(node, &JsValue::from_str(BINDINGS_PROPERTY)).ok()?;
        if existing.is_object() {
            return Some(existing.unchecked_into());
        }
        if !create {
            return None;
        }
        let store = Object::new();
        Reflect::set(node, &JsValue::from_str(BINDINGS_PROPERTY), &store).ok()?;
        Some(store)
    }

    fn collect(list: web_sys::NodeList) -> Vec<Element> {
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }
}

impl Dom for WebDom {
    type Node = Element;

    fn query_all(&self, selector: &Selector) -> Vec<Element> {
        match self.document.query_selector_all(selector.css()) {
            Ok(list) => Self::collect(list),
            Err(err) => {
                log::warn!("Selector '{}' rejected by the page: {:?}", selector.css(), err);
                Vec::new()
            }
        }
    }

    fn query_within(&self, root: &Element, selector: &Selector) -> Option<Element> {
        root.query_selector(selector.css()).ok().flatten()
    }

    fn matches(&self, node: &Element, selector: &Selector) -> bool {
        node.matches(selector.css()).unwrap_or(false)
    }

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn document_element(&self) -> Option<Element> {
        self.document.document_element()
    }

    fn location(&self) -> String {
        let location = self.window.location();
        let path = location.pathname().unwrap_or_default();
        let search = location.search().unwrap_or_default();
        path + &search
    }

    fn text_content(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn add_class(&mut self, node: &Element, class: &str) {
        if let Err(err) = node.class_list().add_1(class) {
            log::debug!("add class {} failed: {:?}", class, err);
        }
    }

    fn remove_class(&mut self, node: &Element, class: &str) {
        if let Err(err) = node.class_list().remove_1(class) {
            log::debug!("remove class {} failed: {:?}", class, err);
        }
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Element, name: &str, value: &str) {
        if let Err(err) = node.set_attribute(name, value) {
            log::debug!("set attribute {} failed: {:?}", name, err);
        }
    }

    fn remove_attribute(&mut self, node: &Element, name: &str) {
        if let Err(err) = node.remove_attribute(name) {
            log::debug!("remove attribute {} failed: {:?}", name, err);
        }
    }

    fn has_attribute(&self, node: &Element, name: &str) -> bool {
        node.has_attribute(name)
    }

    fn style(&self, node: &Element, property: &str) -> Option<String> {
        let element = node.dyn_ref::<HtmlElement>()?;
        element
            .style()
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn set_style(&mut self, node: &Element, property: &str, value: &str) {
        let Some(element) = node.dyn_ref::<HtmlElement>() else {
            return;
        };
        let style = element.style();
        let result = if value.is_empty() {
            style.remove_property(property).map(|_| ())
        } else {
            style.set_property(property, value)
        };
        if let Err(err) = result {
            log::debug!("style {} failed: {:?}", property, err);
        }
    }

    fn z_index(&self, node: &Element) -> Option<i32> {
        let computed = self.window.get_computed_style(node).ok().flatten()?;
        computed
            .get_property_value("z-index")
            .ok()
            .and_then(|value| value.trim().parse().ok())
    }

    fn create_element(&mut self, tag: &str) -> Result<Element, DomError> {
        self.document.create_element(tag).map_err(js_error)
    }

    fn append_child(&mut self, parent: &Element, child: &Element) -> Result<(), DomError> {
        parent.append_child(child).map(|_| ()).map_err(js_error)
    }

    fn set_text(&mut self, node: &Element, text: &str) {
        node.set_text_content(Some(text));
    }

    fn remove(&mut self, node: &Element) {
        node.remove();
    }

    fn listen(&mut self, node: &Element, event: DomEvent, listener: Listener) {
        let Some(store) = Self::binding_store(node, true) else {
            return;
        };
        let key = binding_key(event, listener);
        if Reflect::has(&store, &key).unwrap_or(false) {
            return;
        }

        let handler = Closure::<dyn FnMut(Event)>::new(move |dom_event: Event| {
            let target = dom_event
                .current_target()
                .and_then(|target| target.dyn_into::<Element>().ok());
            if let Some(element) = target {
                crate::dispatch_event(&element, event, listener);
            }
        })
        .into_js_value();

        let function: &Function = handler.unchecked_ref();
        if let Err(err) = node.add_event_listener_with_callback(event.name(), function) {
            log::warn!("Could not bind {} on element: {:?}", event.name(), err);
            return;
        }
        let _ = Reflect::set(&store, &key, &handler);
    }

    fn unlisten(&mut self, node: &Element, event: DomEvent, listener: Listener) {
        let Some(store) = Self::binding_store(node, false) else {
            return;
        };
        let key = binding_key(event, listener);
        let Ok(handler) = Reflect::get(&store, &key) else {
            return;
        };
        if let Some(function) = handler.dyn_ref::<Function>() {
            let _ = node.remove_event_listener_with_callback(event.name(), function);
        }
        let _ = Reflect::delete_property(&store, &key);
    }

    fn is_paused(&self, media: &Element) -> bool {
        media
            .dyn_ref::<HtmlMediaElement>()
            .map_or(true, HtmlMediaElement::paused)
    }

    fn pause(&mut self, media: &Element) {
        if let Some(media) = media.dyn_ref::<HtmlMediaElement>() {
            if let Err(err) = media.pause() {
                log::warn!("Could not pause video: {:?}", err);
            }
        }
    }

    fn play(&mut self, media: &Element) -> Result<(), DomError> {
        let media = media
            .dyn_ref::<HtmlMediaElement>()
            .ok_or_else(|| DomError::Host("not a media element".to_string()))?;
        let promise = media.play().map_err(js_error)?;
        // Rejections arrive asynchronously; they are only logged.
        let _ = promise.catch(&self.on_play_rejected);
        Ok(())
    }
}

/// `window.setTimeout` with engine-side ids.
pub struct WebScheduler {
    window: Window,
    next_id: u32,
    handles: HashMap<TimerId, i32>,
}

impl WebScheduler {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            next_id: 0,
            handles: HashMap::new(),
        }
    }

    /// Forget a timer that has fired.
    pub fn fired(&mut self, id: TimerId) {
        self.handles.remove(&id);
    }

    pub fn pending_count(&self) -> usize {
        self.handles.len()
    }
}

impl Scheduler for WebScheduler {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    fn set_timeout(&mut self, delay_ms: u64) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let callback = Closure::once_into_js(move || crate::dispatch_timer(id));
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
        {
            Ok(handle) => {
                self.handles.insert(id, handle);
            }
            Err(err) => log::warn!("setTimeout failed: {:?}", err),
        }
        id
    }

    fn clear_timeout(&mut self, id: TimerId) {
        if let Some(handle) = self.handles.remove(&id) {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}
