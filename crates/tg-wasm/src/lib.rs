//! WebAssembly bindings for TubeGuard
//!
//! The extension's content-script glue loads this module and calls
//! [`start`] once per page, then forwards runtime messages to
//! [`handle_message`] and the stored settings to [`apply_settings`] (or
//! [`settings_unavailable`] if the store could not be read).

mod dom;

use std::cell::RefCell;
use std::sync::Once;

use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, MutationObserver, MutationObserverInit, MutationRecord};

use tg_core::{
    CommandAck, DomEvent, Engine, EngineConfig, Listener, ObserverKind, SettingsError, SettingsSnapshot, TimerId,
    SETTINGS_KEYS,
};

pub use dom::{WebDom, WebScheduler};

/// Events after which the page may have navigated without a reload.
const NAVIGATION_EVENTS: [&str; 2] = ["popstate", "yt-navigate-finish"];

type WebEngine = Engine<WebDom, WebScheduler>;
type MutationCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

struct Runtime {
    engine: WebEngine,
    observers: Vec<(MutationObserver, MutationCallback)>,
    on_navigation: Closure<dyn FnMut()>,
}

static INIT_LOGGING: Once = Once::new();

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// Run `f` against the engine. Re-entrant calls (the engine already
/// borrowed further up the stack) are logged and dropped.
fn with_engine<R>(f: impl FnOnce(&mut WebEngine) -> R) -> Option<R> {
    RUNTIME.with(|cell| match cell.try_borrow_mut() {
        Ok(mut runtime) => runtime.as_mut().map(|runtime| f(&mut runtime.engine)),
        Err(_) => {
            log::warn!("Engine busy, dropping re-entrant callback");
            None
        }
    })
}

pub(crate) fn dispatch_event(node: &Element, event: DomEvent, listener: Listener) {
    with_engine(|engine| engine.handle_event(node, event, listener));
}

pub(crate) fn dispatch_timer(id: TimerId) {
    with_engine(|engine| {
        engine.scheduler_mut().fired(id);
        engine.on_timer(id);
    });
}

fn added_elements(records: &js_sys::Array) -> Vec<Element> {
    let mut added = Vec::new();
    for record in records.iter() {
        let Ok(record) = record.dyn_into::<MutationRecord>() else {
            continue;
        };
        let nodes = record.added_nodes();
        for i in 0..nodes.length() {
            if let Some(element) = nodes.item(i).and_then(|node| node.dyn_into::<Element>().ok()) {
                added.push(element);
            }
        }
    }
    added
}

fn observe(kind: ObserverKind, target: &Element) -> Result<(MutationObserver, MutationCallback), JsValue> {
    let callback: MutationCallback = Closure::new(move |records: js_sys::Array, _observer: MutationObserver| {
        let added = added_elements(&records);
        with_engine(|engine| engine.on_mutations(kind, &added));
    });
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    observer.observe_with_options(target, &init)?;
    Ok((observer, callback))
}

/// Convert a structured-cloneable JS value to JSON.
fn to_json(value: &JsValue) -> Value {
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|text| text.as_string())
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or(Value::Null)
}

/// Panic hook and console logger, installed on the first `start`.
fn init_logging() {
    INIT_LOGGING.call_once(|| {
        console_error_panic_hook::set_once();
        let level = if cfg!(debug_assertions) {
            log::Level::Debug
        } else {
            log::Level::Info
        };
        wasm_logger::init(wasm_logger::Config::new(level).module_prefix("tg_"));
    });
}

fn ack_to_js(ack: &CommandAck) -> JsValue {
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"response".into(), &JsValue::from_str(&ack.response));
    result.into()
}

/// Start the engine on the current page. `config_json` is an optional
/// `EngineConfig` object in JSON.
#[wasm_bindgen]
pub fn start(config_json: Option<String>) -> Result<(), JsValue> {
    init_logging();

    if RUNTIME.with(|cell| cell.borrow().is_some()) {
        return Err(JsValue::from_str("Already started. Call stop() first."));
    }

    let config = match config_json.as_deref() {
        Some(text) => EngineConfig::from_json(text).map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?,
        None => EngineConfig::default(),
    };

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let dom = WebDom::new(window.clone()).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let document = dom.document().clone();
    let body = document
        .body()
        .map(Element::from)
        .ok_or_else(|| JsValue::from_str("Document has no body"))?;

    let mut engine = Engine::new(dom, WebScheduler::new(window.clone()), config)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let observers = vec![observe(ObserverKind::Content, &body)?, observe(ObserverKind::Popup, &body)?];

    let on_navigation = Closure::<dyn FnMut()>::new(|| {
        with_engine(|engine| engine.on_navigation());
    });
    for event in NAVIGATION_EVENTS {
        window.add_event_listener_with_callback(event, on_navigation.as_ref().unchecked_ref())?;
    }

    let report = engine.start();
    log::info!("TubeGuard started: {:?}", report);

    RUNTIME.with(|cell| {
        *cell.borrow_mut() = Some(Runtime {
            engine,
            observers,
            on_navigation,
        });
    });
    Ok(())
}

/// Handle a control-surface message. Always returns `{response}`.
#[wasm_bindgen]
pub fn handle_message(message: JsValue) -> JsValue {
    let message = to_json(&message);
    let ack = with_engine(|engine| engine.handle_message(&message)).unwrap_or_default();
    ack_to_js(&ack)
}

/// Deliver the settings read from storage.
#[wasm_bindgen]
pub fn apply_settings(settings: JsValue) {
    let snapshot = SettingsSnapshot::from_value(&to_json(&settings));
    with_engine(|engine| engine.apply_settings(snapshot));
}

/// Report that the settings store could not be read.
#[wasm_bindgen]
pub fn settings_unavailable(reason: String) {
    with_engine(|engine| engine.apply_settings(Err(SettingsError::Unavailable(reason))));
}

/// The keys to request from the settings store.
#[wasm_bindgen]
pub fn settings_keys() -> js_sys::Array {
    SETTINGS_KEYS.iter().map(|key| JsValue::from_str(key)).collect()
}

/// The host noticed a navigation the built-in listeners cannot see.
#[wasm_bindgen]
pub fn notify_navigation() {
    with_engine(|engine| engine.on_navigation());
}

/// Disconnect the observers, cancel timers and drop the engine.
#[wasm_bindgen]
pub fn stop() {
    let runtime = RUNTIME.with(|cell| cell.try_borrow_mut().ok().and_then(|mut slot| slot.take()));
    let Some(mut runtime) = runtime else {
        return;
    };

    for (observer, _callback) in &runtime.observers {
        observer.disconnect();
    }
    if let Some(window) = web_sys::window() {
        for event in NAVIGATION_EVENTS {
            let _ = window.remove_event_listener_with_callback(event, runtime.on_navigation.as_ref().unchecked_ref());
        }
    }
    runtime.engine.shutdown();
    log::info!(
        "Stopped after {} pass(es), {} timer(s) left pending",
        runtime.engine.passes(),
        runtime.engine.scheduler().pending_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::dom::Scheduler;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_to_json_round_trips_plain_objects() {
        let object = js_sys::Object::new();
        js_sys::Reflect::set(&object, &"action".into(), &"toggleBlur".into()).unwrap();
        js_sys::Reflect::set(&object, &"enabled".into(), &JsValue::FALSE).unwrap();

        let value = to_json(&object.into());
        assert_eq!(value, serde_json::json!({"action": "toggleBlur", "enabled": false}));
    }

    #[wasm_bindgen_test]
    fn test_to_json_of_undefined_is_null() {
        assert_eq!(to_json(&JsValue::UNDEFINED), Value::Null);
    }

    #[wasm_bindgen_test]
    fn test_handle_message_before_start_still_acks() {
        let reply = handle_message(JsValue::from_str("bogus"));
        let response = js_sys::Reflect::get(&reply, &"response".into()).unwrap();
        assert_eq!(response.as_string().as_deref(), Some("Settings updated"));
    }

    #[wasm_bindgen_test]
    fn test_settings_keys_are_exported() {
        let keys = settings_keys();
        assert_eq!(keys.length() as usize, SETTINGS_KEYS.len());
        assert_eq!(keys.get(0).as_string().as_deref(), Some("blurEnabled"));
    }

    #[wasm_bindgen_test]
    fn test_scheduler_tracks_pending_timers() {
        let window = web_sys::window().unwrap();
        let mut scheduler = WebScheduler::new(window);
        let first = scheduler.set_timeout(60_000);
        let second = scheduler.set_timeout(60_000);
        assert_eq!(scheduler.pending_count(), 2);

        scheduler.clear_timeout(first);
        scheduler.fired(second);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[wasm_bindgen_test]
    fn test_logging_init_is_repeatable() {
        init_logging();
        init_logging();
        log::info!("logger installed once");
    }
}
