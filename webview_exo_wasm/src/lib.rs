mod button;
mod button_sync;
mod config;
mod cooldown;
mod error;
pub mod logging;
pub mod mock_page;
mod page_api;
mod protocol;
mod resolver;
mod ui_reset;
mod validator;

#[cfg(target_arch = "wasm32")]
mod web;

pub use crate::button::{ControlButton, DISABLED_CLASS, SELECTED_CLASS};
pub use crate::button_sync::{cleanup_on_close, ButtonSync, SessionState};
pub use crate::config::{BridgeConfig, CONFIG_ENV};
pub use crate::cooldown::CooldownGuard;
pub use crate::error::BridgeError;
pub use crate::page_api::{ElementId, KeyPhase, PageApi};
pub use crate::protocol::*;
pub use crate::resolver::{ButtonKind, ControlBinding, ControlMap};
pub use crate::ui_reset::{Completion, FinishedClose, TimerTicket, Timers, UiCloseLoop};
pub use crate::validator::validate_control_map;

use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Single-slot gate around [`ButtonSync`]. A page callback that fires while a
/// snapshot or apply is still running finds the slot taken and is skipped.
pub struct SharedBridge {
    inner: RefCell<ButtonSync>,
}

impl SharedBridge {
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Ok(Self {
            inner: RefCell::new(ButtonSync::new(config)?),
        })
    }

    pub fn get_button_states(&self, api: &dyn PageApi) -> Option<ButtonStates> {
        let Ok(mut sync) = self.inner.try_borrow_mut() else {
            debug!("getButtonStates: bridge busy");
            return None;
        };
        sync.get_button_states(api)
    }

    pub fn sync_buttons(&self, api: &dyn PageApi, states: &ButtonStates) -> SyncOutcome {
        let Ok(mut sync) = self.inner.try_borrow_mut() else {
            debug!("syncButtons: bridge busy");
            return SyncOutcome::Skipped {
                reason: SkipReason::Busy,
            };
        };
        sync.sync_buttons(api, states)
    }

    /// Completions run after the gate is released, so they may call back in.
    pub fn reset_player_ui(&self, api: &dyn PageApi, timers: &mut dyn Timers, completion: Completion) {
        let finished = match self.inner.try_borrow_mut() {
            Ok(mut sync) => sync.reset_player_ui(api, timers, completion),
            Err(_) => {
                warn!("resetPlayerUI: bridge busy, running callback anyway");
                completion(CloseOutcome::Exhausted { escapes: 0 });
                return;
            }
        };
        for done in finished {
            done.complete();
        }
    }

    pub fn on_close_timer(&self, api: &dyn PageApi, timers: &mut dyn Timers, ticket: TimerTicket) {
        let finished = match self.inner.try_borrow_mut() {
            Ok(mut sync) => sync.on_close_timer(api, timers, ticket),
            Err(_) => {
                warn!(?ticket, "close timer fired while bridge busy");
                None
            }
        };
        if let Some(done) = finished {
            done.complete();
        }
    }

    /// Undecodable payloads still count as an apply for the cooldown.
    pub fn reject_sync(&self, api: &dyn PageApi) {
        match self.inner.try_borrow_mut() {
            Ok(mut sync) => sync.reject_apply(api),
            Err(_) => debug!("syncButtons: bridge busy"),
        }
    }

    pub fn send_action(&self, api: &dyn PageApi, action: HostAction) -> Result<(), BridgeError> {
        let mut sync = self
            .inner
            .try_borrow_mut()
            .map_err(|_| BridgeError::Page("bridge busy".to_string()))?;
        sync.send_action(api, action)
    }

    pub fn set_last_button(&self, button: Option<PressedButton>) {
        match self.inner.try_borrow_mut() {
            Ok(mut sync) => sync.set_last_button(button),
            Err(_) => warn!("setLastButton: bridge busy"),
        }
    }

    pub fn session(&self) -> Option<SessionState> {
        self.inner.try_borrow().ok().map(|s| s.session().clone())
    }

    pub fn mapping_report(&self, api: &dyn PageApi) -> BTreeMap<String, String> {
        self.inner
            .try_borrow()
            .map(|s| s.mapping_report(api))
            .unwrap_or_default()
    }
}
