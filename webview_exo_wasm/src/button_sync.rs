use crate::button::ControlButton;
use crate::config::BridgeConfig;
use crate::cooldown::CooldownGuard;
use crate::error::BridgeError;
use crate::page_api::PageApi;
use crate::protocol::{
    ButtonStates, ControlId, HostAction, PressedButton, SkipReason, SyncOutcome, TriState,
};
use crate::resolver::ControlMap;
use crate::ui_reset::{Completion, FinishedClose, TimerTicket, Timers, UiCloseLoop};
use crate::validator;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub expanded_player_open: bool,
    /// Set through `setLastButton`. The page's own global wins when it is set.
    pub last_button: Option<PressedButton>,
}

pub struct ButtonSync {
    controls: ControlMap,
    cooldown: CooldownGuard,
    close_loop: UiCloseLoop,
    session: SessionState,
}

impl ButtonSync {
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Ok(Self {
            controls: ControlMap::with_overrides(&config.selectors)?,
            cooldown: CooldownGuard::new(config.cooldown()),
            close_loop: UiCloseLoop::new(config.close_retries, config.close_retry_delay()),
            session: SessionState::default(),
        })
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn set_last_button(&mut self, button: Option<PressedButton>) {
        self.session.last_button = button;
    }

    /// Stamps an apply whose payload could not be decoded.
    pub fn reject_apply(&mut self, api: &dyn PageApi) {
        self.cooldown.enter_apply(api.now());
    }

    fn last_button(&self, api: &dyn PageApi) -> Option<PressedButton> {
        let from_page = api.last_button().and_then(|name| match PressedButton::from_str(&name) {
            Ok(b) => Some(b),
            Err(e) => {
                debug!("ignoring last button from page: {e}");
                None
            }
        });
        from_page.or(self.session.last_button)
    }

    pub fn get_button_states(&mut self, api: &dyn PageApi) -> Option<ButtonStates> {
        if !self.cooldown.enter_snapshot(api.now()) {
            debug!("getButtonStates: inside cooldown after syncButtons, skipping");
            return None;
        }

        api.hide_player_background();
        api.disable_suggestions_watcher();
        api.init_suggestions_watcher();

        let mut buttons = BTreeMap::new();
        for binding in self.controls.read_order() {
            let state = ControlButton::resolve(api, binding).checked();
            if state == TriState::NotApplicable {
                continue;
            }
            buttons.insert(binding.id, state);
        }

        // The host closes the player on "next" unless it is marked not applicable.
        if self.last_button(api) == Some(PressedButton::TrackEnded) {
            buttons.insert(ControlId::Next, TriState::NotApplicable);
        }

        if api.is_player_closed() {
            api.show_player_background();
        }

        let states = ButtonStates {
            buttons,
            screen_width: Some(api.screen_width()),
            ignored: Vec::new(),
        };
        debug!(states = ?states.buttons, width = ?states.screen_width, "getButtonStates");
        Some(states)
    }

    pub fn sync_buttons(&mut self, api: &dyn PageApi, states: &ButtonStates) -> SyncOutcome {
        if !self.cooldown.enter_apply(api.now()) {
            debug!("syncButtons: inside cooldown after getButtonStates, skipping");
            return SyncOutcome::Skipped {
                reason: SkipReason::Cooldown,
            };
        }

        api.disable_suggestions_watcher();
        api.disable_overlay_watcher();
        api.reset_player_options();
        api.init_suggestions_watcher();

        self.session.last_button = None;
        api.clear_last_button();
        self.session.expanded_player_open = false;

        if !states.ignored.is_empty() {
            debug!(ignored = ?states.ignored, "syncButtons: unknown keys ignored");
        }

        let mut written = Vec::new();
        for binding in self.controls.declared() {
            let Some(checked) = states.get(binding.id).and_then(TriState::as_option) else {
                continue;
            };

            if binding.id.opens_expanded_player() {
                if checked {
                    self.session.expanded_player_open = true;
                }
            } else {
                cleanup_on_close(api);
            }

            let button = ControlButton::resolve(api, binding);
            match button.set_checked(checked) {
                Ok(_) if button.shows(checked) => written.push(binding.id),
                Ok(_) => warn!("syncButtons: {} did not take {checked}", binding.id),
                Err(e) => warn!("syncButtons: {} not written: {e}", binding.id),
            }
        }

        debug!(?written, open = self.session.expanded_player_open, "syncButtons applied");
        SyncOutcome::Applied {
            written,
            ignored: states.ignored.clone(),
        }
    }

    pub fn reset_player_ui(
        &mut self,
        api: &dyn PageApi,
        timers: &mut dyn Timers,
        completion: Completion,
    ) -> Vec<FinishedClose> {
        self.close_loop.start(api, timers, completion)
    }

    pub fn on_close_timer(
        &mut self,
        api: &dyn PageApi,
        timers: &mut dyn Timers,
        ticket: TimerTicket,
    ) -> Option<FinishedClose> {
        self.close_loop.on_timer(api, timers, ticket)
    }

    pub fn send_action(&mut self, api: &dyn PageApi, action: HostAction) -> Result<(), BridgeError> {
        if !api.host_available() {
            debug!("app not found, dropping {}", action.as_str());
            return Err(BridgeError::HostUnavailable);
        }
        info!("sending action to the main app: {}", action.as_str());

        // Stops favorites from pausing playback after the host takes over.
        self.session.expanded_player_open = false;

        if action == HostAction::CloseSuggestions {
            cleanup_on_close(api);
        }

        api.send_to_host(action.as_str()).map_err(|e| {
            warn!("sendAction {} failed: {e}", action.as_str());
            BridgeError::Page(e)
        })
    }

    pub fn mapping_report(&self, api: &dyn PageApi) -> BTreeMap<String, String> {
        validator::validate_control_map(api, &self.controls)
    }
}

pub fn cleanup_on_close(api: &dyn PageApi) {
    api.disable_suggestions_watcher();
    api.disable_overlay_watcher();
    api.close_player_controls();
    api.reset_player_options();
    api.reset_focus();
}
