use web_time::Instant;

pub type ElementId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Down,
    Up,
}

impl KeyPhase {
    pub fn event_type(self) -> &'static str {
        match self {
            KeyPhase::Down => "keydown",
            KeyPhase::Up => "keyup",
        }
    }
}

pub trait PageApi {
    fn now(&self) -> Instant;

    fn query(&self, selector: &str) -> Option<ElementId>;
    fn has_class(&self, element: ElementId, class: &str) -> bool;
    fn is_visible(&self, element: ElementId) -> bool;
    fn activate(&self, element: ElementId) -> Result<(), String>;
    fn active_element(&self) -> Option<ElementId>;
    fn dispatch_key(&self, element: ElementId, phase: KeyPhase, key_code: u32)
        -> Result<(), String>;
    fn screen_width(&self) -> u32;

    fn hide_player_background(&self);
    fn show_player_background(&self);
    fn is_player_closed(&self) -> bool;
    fn is_all_player_ui_closed(&self) -> bool;
    fn reset_player_options(&self);
    fn close_player_controls(&self);
    fn reset_focus(&self);

    fn init_suggestions_watcher(&self);
    fn disable_suggestions_watcher(&self);
    fn disable_overlay_watcher(&self);

    fn last_button(&self) -> Option<String>;
    fn clear_last_button(&self);

    fn host_available(&self) -> bool;
    fn send_to_host(&self, action: &str) -> Result<(), String>;
}
