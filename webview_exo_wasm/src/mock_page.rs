use crate::button::{DISABLED_CLASS, SELECTED_CLASS};
use crate::page_api::{ElementId, KeyPhase, PageApi};
use crate::protocol::KEY_ESCAPE;
use crate::resolver::{ButtonKind, ControlMap};
use crate::ui_reset::{TimerTicket, Timers};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use web_time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    HideBackground,
    ShowBackground,
    InitSuggestionsWatcher,
    DisableSuggestionsWatcher,
    DisableOverlayWatcher,
    ResetPlayerOptions,
    ClosePlayerControls,
    ResetFocus,
    ClearLastButton,
    Query {
        selector: String,
    },
    Activate {
        element: ElementId,
    },
    Key {
        element: ElementId,
        phase: KeyPhase,
        key_code: u32,
    },
    HostAction(String),
}

#[derive(Debug, Clone)]
struct MockElement {
    selector: String,
    classes: BTreeSet<String>,
    visible: bool,
    kind: ButtonKind,
    activations: u32,
}

struct MockState {
    elements: Vec<MockElement>,
    focused: Option<ElementId>,
    player_closed: bool,
    ui_closed: bool,
    escapes_to_close: Option<u32>,
    background_visible: bool,
    screen_width: u32,
    last_button: Option<String>,
    clock: Duration,
    host: Option<Sender<String>>,
    events: Vec<PageEvent>,
}

pub struct MockPage {
    epoch: Instant,
    state: Mutex<MockState>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            state: Mutex::new(MockState {
                elements: Vec::new(),
                focused: None,
                player_closed: true,
                ui_closed: true,
                escapes_to_close: None,
                background_visible: true,
                screen_width: 1920,
                last_button: None,
                clock: Duration::ZERO,
                host: None,
                events: Vec::new(),
            }),
        }
    }

    pub fn youtube_tv() -> Self {
        let page = Self::new();
        for binding in ControlMap::default().declared() {
            page.add_element(&binding.selector, binding.kind);
        }
        page
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_element(&self, selector: &str, kind: ButtonKind) -> ElementId {
        let mut s = self.state();
        s.elements.push(MockElement {
            selector: selector.to_string(),
            classes: BTreeSet::new(),
            visible: true,
            kind,
            activations: 0,
        });
        s.elements.len() - 1
    }

    pub fn remove_element(&self, selector: &str) {
        let mut s = self.state();
        for el in s.elements.iter_mut().filter(|e| e.selector == selector) {
            // Keep ids stable; a renamed element no longer matches anything.
            el.selector.clear();
        }
    }

    fn with_element<R>(&self, selector: &str, f: impl FnOnce(&mut MockElement) -> R) -> Option<R> {
        let mut s = self.state();
        s.elements.iter_mut().find(|e| e.selector == selector).map(f)
    }

    pub fn set_selected(&self, selector: &str, selected: bool) {
        self.set_class(selector, SELECTED_CLASS, selected);
    }

    pub fn set_disabled(&self, selector: &str, disabled: bool) {
        self.set_class(selector, DISABLED_CLASS, disabled);
    }

    pub fn set_visible(&self, selector: &str, visible: bool) {
        self.with_element(selector, |el| el.visible = visible);
    }

    fn set_class(&self, selector: &str, class: &str, on: bool) {
        self.with_element(selector, |el| {
            if on {
                el.classes.insert(class.to_string());
            } else {
                el.classes.remove(class);
            }
        });
    }

    pub fn is_selected(&self, selector: &str) -> bool {
        self.with_element(selector, |el| el.classes.contains(SELECTED_CLASS))
            .unwrap_or(false)
    }

    pub fn activations(&self, selector: &str) -> u32 {
        self.with_element(selector, |el| el.activations).unwrap_or(0)
    }

    pub fn focus(&self, selector: &str) -> Option<ElementId> {
        let mut s = self.state();
        let id = s.elements.iter().position(|e| e.selector == selector);
        s.focused = id;
        id
    }

    pub fn set_ui_closed(&self, closed: bool) {
        let mut s = self.state();
        s.ui_closed = closed;
        s.escapes_to_close = None;
    }

    pub fn close_ui_after_escapes(&self, escapes: u32) {
        let mut s = self.state();
        s.ui_closed = escapes == 0;
        s.escapes_to_close = Some(escapes);
    }

    pub fn set_player_closed(&self, closed: bool) {
        self.state().player_closed = closed;
    }

    pub fn set_screen_width(&self, width: u32) {
        self.state().screen_width = width;
    }

    /// What the page's own key handling last recorded as pressed.
    pub fn set_last_button_name(&self, name: Option<&str>) {
        self.state().last_button = name.map(str::to_string);
    }

    pub fn last_button_name(&self) -> Option<String> {
        self.state().last_button.clone()
    }

    pub fn background_visible(&self) -> bool {
        self.state().background_visible
    }

    pub fn advance(&self, by: Duration) {
        self.state().clock += by;
    }

    pub fn connect_host(&self, capacity: usize) -> Receiver<String> {
        let (tx, rx) = bounded(capacity);
        self.state().host = Some(tx);
        rx
    }

    pub fn disconnect_host(&self) {
        self.state().host = None;
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.state().events.clone()
    }

    fn record(&self, event: PageEvent) {
        self.state().events.push(event);
    }
}

impl PageApi for MockPage {
    fn now(&self) -> Instant {
        self.epoch + self.state().clock
    }

    fn query(&self, selector: &str) -> Option<ElementId> {
        let mut s = self.state();
        s.events.push(PageEvent::Query {
            selector: selector.to_string(),
        });
        s.elements.iter().position(|e| e.selector == selector)
    }

    fn has_class(&self, element: ElementId, class: &str) -> bool {
        self.state()
            .elements
            .get(element)
            .is_some_and(|e| e.classes.contains(class))
    }

    fn is_visible(&self, element: ElementId) -> bool {
        self.state().elements.get(element).is_some_and(|e| e.visible)
    }

    fn activate(&self, element: ElementId) -> Result<(), String> {
        let mut s = self.state();
        let Some(el) = s.elements.get_mut(element) else {
            return Err(format!("no element {element}"));
        };
        el.activations += 1;
        let opened_panel = match el.kind {
            ButtonKind::Toggle | ButtonKind::Panel => {
                if !el.classes.remove(SELECTED_CLASS) {
                    el.classes.insert(SELECTED_CLASS.to_string());
                }
                el.kind == ButtonKind::Panel && el.classes.contains(SELECTED_CLASS)
            }
            ButtonKind::Action => false,
        };
        if opened_panel {
            s.ui_closed = false;
            s.player_closed = false;
        }
        s.events.push(PageEvent::Activate { element });
        Ok(())
    }

    fn active_element(&self) -> Option<ElementId> {
        self.state().focused
    }

    fn dispatch_key(
        &self,
        element: ElementId,
        phase: KeyPhase,
        key_code: u32,
    ) -> Result<(), String> {
        let mut s = self.state();
        if element >= s.elements.len() {
            return Err(format!("no element {element}"));
        }
        s.events.push(PageEvent::Key {
            element,
            phase,
            key_code,
        });
        if key_code == KEY_ESCAPE && phase == KeyPhase::Up {
            if let Some(left) = s.escapes_to_close {
                let left = left.saturating_sub(1);
                s.escapes_to_close = Some(left);
                if left == 0 {
                    s.ui_closed = true;
                }
            }
        }
        Ok(())
    }

    fn screen_width(&self) -> u32 {
        self.state().screen_width
    }

    fn hide_player_background(&self) {
        let mut s = self.state();
        s.background_visible = false;
        s.events.push(PageEvent::HideBackground);
    }

    fn show_player_background(&self) {
        let mut s = self.state();
        s.background_visible = true;
        s.events.push(PageEvent::ShowBackground);
    }

    fn is_player_closed(&self) -> bool {
        self.state().player_closed
    }

    fn is_all_player_ui_closed(&self) -> bool {
        self.state().ui_closed
    }

    fn reset_player_options(&self) {
        self.record(PageEvent::ResetPlayerOptions);
    }

    fn close_player_controls(&self) {
        let mut s = self.state();
        for el in s.elements.iter_mut().filter(|e| e.kind == ButtonKind::Panel) {
            el.classes.remove(SELECTED_CLASS);
        }
        s.ui_closed = true;
        s.events.push(PageEvent::ClosePlayerControls);
    }

    fn reset_focus(&self) {
        let mut s = self.state();
        s.focused = None;
        s.events.push(PageEvent::ResetFocus);
    }

    fn init_suggestions_watcher(&self) {
        self.record(PageEvent::InitSuggestionsWatcher);
    }

    fn disable_suggestions_watcher(&self) {
        self.record(PageEvent::DisableSuggestionsWatcher);
    }

    fn disable_overlay_watcher(&self) {
        self.record(PageEvent::DisableOverlayWatcher);
    }

    fn last_button(&self) -> Option<String> {
        self.state().last_button.clone()
    }

    fn clear_last_button(&self) {
        let mut s = self.state();
        s.last_button = None;
        s.events.push(PageEvent::ClearLastButton);
    }

    fn host_available(&self) -> bool {
        self.state().host.is_some()
    }

    fn send_to_host(&self, action: &str) -> Result<(), String> {
        let mut s = self.state();
        let Some(host) = s.host.clone() else {
            return Err("host not connected".to_string());
        };
        match host.try_send(action.to_string()) {
            Ok(()) => {
                s.events.push(PageEvent::HostAction(action.to_string()));
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err("host queue full".to_string()),
            Err(TrySendError::Disconnected(_)) => {
                s.host = None;
                Err("host gone".to_string())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ManualTimers {
    clock: Duration,
    pending: Vec<(TimerTicket, Duration)>,
    cancelled: Vec<TimerTicket>,
}

impl ManualTimers {
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn cancelled(&self) -> &[TimerTicket] {
        &self.cancelled
    }

    /// Moves the clock forward and hands back every ticket that came due, earliest first.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerTicket> {
        self.clock += by;
        let now = self.clock;
        let mut due: Vec<(TimerTicket, Duration)> = Vec::new();
        self.pending.retain(|&(ticket, at)| {
            if at <= now {
                due.push((ticket, at));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(ticket, at)| (at, ticket));
        due.into_iter().map(|(ticket, _)| ticket).collect()
    }

    pub fn fire_next(&mut self) -> Option<TimerTicket> {
        let (idx, &(ticket, at)) = self
            .pending
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| (entry.1, entry.0))?;
        self.pending.remove(idx);
        self.clock = self.clock.max(at);
        Some(ticket)
    }
}

impl Timers for ManualTimers {
    fn schedule(&mut self, ticket: TimerTicket, delay: Duration) {
        self.pending.push((ticket, self.clock + delay));
    }

    fn cancel(&mut self, ticket: TimerTicket) {
        let before = self.pending.len();
        self.pending.retain(|&(t, _)| t != ticket);
        if self.pending.len() != before {
            self.cancelled.push(ticket);
        }
    }
}
