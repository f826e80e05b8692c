use crate::logging;
use crate::page_api::{ElementId, KeyPhase, PageApi};
use crate::protocol::{ButtonStates, HostAction, PressedButton, KEY_ENTER, KEY_ESCAPE};
use crate::ui_reset::{Completion, TimerTicket, Timers};
use crate::{BridgeConfig, SharedBridge};
use js_sys::{Array, Function, Object, Reflect, JSON};
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, KeyboardEvent, KeyboardEventInit, Window};
use web_time::Instant;

// Name-stable: the native side calls into it.
const EXO_UTILS_GLOBAL: &str = "ExoUtils";
const CONFIG_GLOBAL: &str = "ExoUtilsConfig";

const PLAYER_UTILS: &str = "YouTubePlayerUtils";
const YOUTUBE_UTILS: &str = "YouTubeUtils";
const SUGGESTIONS_WATCHER: &str = "SuggestionsWatcher";
const OVERLAY_WATCHER: &str = "OverlayWatcher";
const DEVICE_UTILS: &str = "DeviceUtils";
const HOST_OBJECT: &str = "app";
const LAST_BUTTON_GLOBAL: &str = "lastButtonName";
const HOST_CALLBACK: &str = "onGenericStringResult";

thread_local! {
    static BRIDGE: OnceCell<SharedBridge> = OnceCell::new();
    static TIMER_HANDLES: RefCell<HashMap<TimerTicket, i32>> = RefCell::new(HashMap::new());
}

struct WebPage {
    window: Window,
    document: Document,
    elements: RefCell<Vec<Element>>,
}

impl WebPage {
    fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self {
            window,
            document,
            elements: RefCell::new(Vec::new()),
        })
    }

    fn track(&self, element: Element) -> ElementId {
        let mut elements = self.elements.borrow_mut();
        elements.push(element);
        elements.len() - 1
    }

    fn element(&self, id: ElementId) -> Option<Element> {
        self.elements.borrow().get(id).cloned()
    }

    fn global(&self, name: &str) -> Option<JsValue> {
        let value = Reflect::get(&self.window, &JsValue::from_str(name)).ok()?;
        if value.is_undefined() || value.is_null() {
            None
        } else {
            Some(value)
        }
    }

    fn call_helper(&self, object: &str, method: &str) -> Option<JsValue> {
        let Some(target) = self.global(object) else {
            debug!("{object} not loaded, skipping {method}");
            return None;
        };
        let func = Reflect::get(&target, &JsValue::from_str(method))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok());
        let Some(func) = func else {
            debug!("{object}.{method} is not a function");
            return None;
        };
        match func.call0(&target) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{object}.{method} threw: {e:?}");
                None
            }
        }
    }

    fn host(&self) -> Option<(JsValue, Function)> {
        let app = self.global(HOST_OBJECT)?;
        let callback = Reflect::get(&app, &JsValue::from_str(HOST_CALLBACK))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        Some((app, callback))
    }
}

fn key_name(key_code: u32) -> &'static str {
    match key_code {
        KEY_ESCAPE => "Escape",
        KEY_ENTER => "Enter",
        _ => "Unidentified",
    }
}

fn key_event(phase: KeyPhase, key_code: u32) -> Result<KeyboardEvent, JsValue> {
    let init = KeyboardEventInit::new();
    init.set_key(key_name(key_code));
    init.set_bubbles(true);
    init.set_cancelable(true);
    let event = KeyboardEvent::new_with_keyboard_event_init_dict(phase.event_type(), &init)?;

    // The player still reads the legacy numeric fields.
    let descriptor = Object::new();
    Reflect::set(&descriptor, &"value".into(), &JsValue::from(key_code))?;
    Object::define_property(&event, &"keyCode".into(), &descriptor);
    Object::define_property(&event, &"which".into(), &descriptor);
    Ok(event)
}

impl PageApi for WebPage {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn query(&self, selector: &str) -> Option<ElementId> {
        let element = self.document.query_selector(selector).ok().flatten()?;
        Some(self.track(element))
    }

    fn has_class(&self, element: ElementId, class: &str) -> bool {
        self.element(element)
            .is_some_and(|el| el.class_list().contains(class))
    }

    fn is_visible(&self, element: ElementId) -> bool {
        self.element(element).is_some_and(|el| {
            el.dyn_ref::<HtmlElement>()
                .map_or(true, |h| h.offset_width() > 0 || h.offset_height() > 0)
        })
    }

    fn activate(&self, element: ElementId) -> Result<(), String> {
        self.dispatch_key(element, KeyPhase::Down, KEY_ENTER)?;
        self.dispatch_key(element, KeyPhase::Up, KEY_ENTER)
    }

    fn active_element(&self) -> Option<ElementId> {
        let element = self.document.active_element()?;
        Some(self.track(element))
    }

    fn dispatch_key(
        &self,
        element: ElementId,
        phase: KeyPhase,
        key_code: u32,
    ) -> Result<(), String> {
        let el = self
            .element(element)
            .ok_or_else(|| format!("stale element handle {element}"))?;
        let event = key_event(phase, key_code).map_err(|e| format!("{e:?}"))?;
        el.dispatch_event(&event)
            .map(|_| ())
            .map_err(|e| format!("{e:?}"))
    }

    fn screen_width(&self) -> u32 {
        let width = self
            .call_helper(DEVICE_UTILS, "getScreenWidth")
            .and_then(|w| w.as_f64())
            .or_else(|| self.window.inner_width().ok().and_then(|w| w.as_f64()))
            .unwrap_or(0.0);
        width.max(0.0) as u32
    }

    fn hide_player_background(&self) {
        self.call_helper(PLAYER_UTILS, "hidePlayerBackground");
    }

    fn show_player_background(&self) {
        self.call_helper(PLAYER_UTILS, "showPlayerBackground");
    }

    fn is_player_closed(&self) -> bool {
        self.call_helper(PLAYER_UTILS, "isPlayerClosed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }

    fn is_all_player_ui_closed(&self) -> bool {
        self.call_helper(PLAYER_UTILS, "isAllPlayerUIClosed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }

    fn reset_player_options(&self) {
        self.call_helper(PLAYER_UTILS, "resetPlayerOptions");
    }

    fn close_player_controls(&self) {
        self.call_helper(PLAYER_UTILS, "closePlayerControls");
    }

    fn reset_focus(&self) {
        self.call_helper(YOUTUBE_UTILS, "resetFocus");
    }

    fn init_suggestions_watcher(&self) {
        let Some(ctor) = self
            .global(SUGGESTIONS_WATCHER)
            .and_then(|c| c.dyn_into::<Function>().ok())
        else {
            debug!("{SUGGESTIONS_WATCHER} not loaded");
            return;
        };
        if let Err(e) = Reflect::construct(&ctor, &Array::of1(&JsValue::NULL)) {
            warn!("new {SUGGESTIONS_WATCHER} threw: {e:?}");
        }
    }

    fn disable_suggestions_watcher(&self) {
        self.call_helper(SUGGESTIONS_WATCHER, "disable");
    }

    fn disable_overlay_watcher(&self) {
        self.call_helper(OVERLAY_WATCHER, "disable");
    }

    fn last_button(&self) -> Option<String> {
        self.global(LAST_BUTTON_GLOBAL).and_then(|v| v.as_string())
    }

    fn clear_last_button(&self) {
        if let Err(e) = set_prop(&self.window, LAST_BUTTON_GLOBAL, &JsValue::NULL) {
            warn!("clearing {LAST_BUTTON_GLOBAL} failed: {e:?}");
        }
    }

    fn host_available(&self) -> bool {
        self.host().is_some()
    }

    fn send_to_host(&self, action: &str) -> Result<(), String> {
        let (app, callback) = self.host().ok_or_else(|| "app not found".to_string())?;
        callback
            .call1(&app, &JsValue::from_str(action))
            .map(|_| ())
            .map_err(|e| format!("{e:?}"))
    }
}

// Handles live in a thread-local so a completion that restarts the loop never
// finds them borrowed.
struct WebTimers;

impl Timers for WebTimers {
    fn schedule(&mut self, ticket: TimerTicket, delay: Duration) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let callback = Closure::once_into_js(move || on_close_timer(ticket));
        let ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), ms) {
            Ok(handle) => {
                TIMER_HANDLES.with(|h| h.borrow_mut().insert(ticket, handle));
            }
            Err(e) => warn!(?ticket, "setTimeout failed: {e:?}"),
        }
    }

    fn cancel(&mut self, ticket: TimerTicket) {
        let handle = TIMER_HANDLES.with(|h| h.borrow_mut().remove(&ticket));
        if let (Some(handle), Some(window)) = (handle, web_sys::window()) {
            window.clear_timeout_with_handle(handle);
        }
    }
}

fn with_bridge<R>(f: impl FnOnce(&SharedBridge) -> R) -> Option<R> {
    let out = BRIDGE.with(|cell| cell.get().map(f));
    if out.is_none() {
        warn!("{EXO_UTILS_GLOBAL} called before install");
    }
    out
}

fn on_close_timer(ticket: TimerTicket) {
    TIMER_HANDLES.with(|h| h.borrow_mut().remove(&ticket));
    let Some(page) = WebPage::new() else {
        return;
    };
    with_bridge(|bridge| bridge.on_close_timer(&page, &mut WebTimers, ticket));
}

fn get_button_states() -> JsValue {
    let Some(page) = WebPage::new() else {
        return JsValue::UNDEFINED;
    };
    let Some(states) = with_bridge(|bridge| bridge.get_button_states(&page)).flatten() else {
        return JsValue::UNDEFINED;
    };
    match serde_json::to_string(&states) {
        Ok(json) => JSON::parse(&json).unwrap_or(JsValue::UNDEFINED),
        Err(e) => {
            warn!("getButtonStates: encode failed: {e}");
            JsValue::UNDEFINED
        }
    }
}

fn parse_states(value: &JsValue) -> Result<ButtonStates, String> {
    let text = JSON::stringify(value)
        .map_err(|e| format!("{e:?}"))?
        .as_string()
        .ok_or_else(|| "states are not an object".to_string())?;
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

fn sync_buttons(states: JsValue) {
    let Some(page) = WebPage::new() else {
        return;
    };
    let states = match parse_states(&states) {
        Ok(s) => s,
        Err(e) => {
            warn!("syncButtons: bad payload: {e}");
            with_bridge(|bridge| bridge.reject_sync(&page));
            return;
        }
    };
    if let Some(outcome) = with_bridge(|bridge| bridge.sync_buttons(&page, &states)) {
        debug!(?outcome, "syncButtons");
    }
}

fn reset_player_ui(callback: JsValue) {
    let callback = callback.dyn_into::<Function>().ok();
    let completion: Completion = Box::new(move |outcome| {
        debug!(?outcome, "resetPlayerUI finished");
        if let Some(cb) = callback {
            if let Err(e) = cb.call0(&JsValue::NULL) {
                warn!("resetPlayerUI callback threw: {e:?}");
            }
        }
    });
    let Some(page) = WebPage::new() else {
        return;
    };
    with_bridge(|bridge| bridge.reset_player_ui(&page, &mut WebTimers, completion));
}

fn send_action(action: JsValue) {
    let Some(name) = action.as_string() else {
        warn!("sendAction: action is not a string");
        return;
    };
    let action = match HostAction::from_str(&name) {
        Ok(a) => a,
        Err(e) => {
            warn!("sendAction: {e}");
            return;
        }
    };
    let Some(page) = WebPage::new() else {
        return;
    };
    if let Some(Err(e)) = with_bridge(|bridge| bridge.send_action(&page, action)) {
        debug!("sendAction {}: {e}", action.as_str());
    }
}

fn set_last_button(name: JsValue) {
    let button = match name.as_string() {
        None => None,
        Some(name) => match PressedButton::from_str(&name) {
            Ok(b) => Some(b),
            Err(e) => {
                debug!("setLastButton: {e}");
                None
            }
        },
    };
    with_bridge(|bridge| bridge.set_last_button(button));
}

fn mapping_report() -> JsValue {
    let Some(page) = WebPage::new() else {
        return JsValue::UNDEFINED;
    };
    let report = with_bridge(|bridge| bridge.mapping_report(&page)).unwrap_or_default();
    serde_json::to_string(&report)
        .ok()
        .and_then(|json| JSON::parse(&json).ok())
        .unwrap_or(JsValue::UNDEFINED)
}

fn read_config(window: &Window) -> BridgeConfig {
    let raw = Reflect::get(window, &JsValue::from_str(CONFIG_GLOBAL)).unwrap_or(JsValue::UNDEFINED);
    if raw.is_undefined() || raw.is_null() {
        return BridgeConfig::default();
    }
    let text = JSON::stringify(&raw).ok().and_then(|s| s.as_string());
    match text.map(|t| BridgeConfig::from_json(&t)) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            warn!("{CONFIG_GLOBAL} rejected, using defaults: {e}");
            BridgeConfig::default()
        }
        None => BridgeConfig::default(),
    }
}

fn constant_name(action: HostAction) -> &'static str {
    match action {
        HostAction::CloseSuggestions => "ACTION_CLOSE_SUGGESTIONS",
        HostAction::PlaybackStarted => "ACTION_PLAYBACK_STARTED",
        HostAction::DisableKeyEvents => "ACTION_DISABLE_KEY_EVENTS",
    }
}

fn set_prop(target: &JsValue, name: &str, value: &JsValue) -> Result<(), JsValue> {
    Reflect::set(target, &JsValue::from_str(name), value).map(|_| ())
}

fn install() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window is unavailable"))?;

    let bridge = SharedBridge::new(&read_config(&window))
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    BRIDGE.with(|cell| {
        if cell.set(bridge).is_err() {
            debug!("bridge already installed");
        }
    });

    let exo = Object::new();
    set_prop(
        &exo,
        "getButtonStates",
        &Closure::<dyn FnMut() -> JsValue>::new(get_button_states).into_js_value(),
    )?;
    set_prop(
        &exo,
        "syncButtons",
        &Closure::<dyn FnMut(JsValue)>::new(sync_buttons).into_js_value(),
    )?;
    set_prop(
        &exo,
        "resetPlayerUI",
        &Closure::<dyn FnMut(JsValue)>::new(reset_player_ui).into_js_value(),
    )?;
    set_prop(
        &exo,
        "sendAction",
        &Closure::<dyn FnMut(JsValue)>::new(send_action).into_js_value(),
    )?;
    set_prop(
        &exo,
        "setLastButton",
        &Closure::<dyn FnMut(JsValue)>::new(set_last_button).into_js_value(),
    )?;
    set_prop(
        &exo,
        "getMappingReport",
        &Closure::<dyn FnMut() -> JsValue>::new(mapping_report).into_js_value(),
    )?;
    for action in HostAction::ALL {
        set_prop(&exo, constant_name(action), &JsValue::from_str(action.as_str()))?;
    }
    set_prop(&window, EXO_UTILS_GLOBAL, &exo)?;

    info!("Scripts::Running core script {EXO_UTILS_GLOBAL}");
    Ok(())
}

#[wasm_bindgen(start)]
pub fn start() {
    logging::init();
    if let Err(e) = install() {
        warn!("{EXO_UTILS_GLOBAL} install failed: {e:?}");
    }
}
