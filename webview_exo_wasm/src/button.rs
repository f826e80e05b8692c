use crate::page_api::{ElementId, PageApi};
use crate::protocol::TriState;
use crate::resolver::{resolve_control, ButtonKind, ControlBinding};

pub const DISABLED_CLASS: &str = "disabled";
pub const SELECTED_CLASS: &str = "toggle-selected";

pub struct ControlButton<'a> {
    api: &'a dyn PageApi,
    binding: &'a ControlBinding,
    element: Option<ElementId>,
}

impl<'a> ControlButton<'a> {
    pub fn resolve(api: &'a dyn PageApi, binding: &'a ControlBinding) -> Self {
        let element = resolve_control(api, binding);
        Self {
            api,
            binding,
            element,
        }
    }

    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    pub fn is_enabled(&self) -> bool {
        self.element
            .is_some_and(|el| self.api.is_visible(el) && !self.api.has_class(el, DISABLED_CLASS))
    }

    pub fn checked(&self) -> TriState {
        let Some(el) = self.element else {
            return TriState::NotApplicable;
        };
        if !self.is_enabled() {
            return TriState::NotApplicable;
        }
        match self.binding.kind {
            ButtonKind::Toggle | ButtonKind::Panel => {
                TriState::from(self.api.has_class(el, SELECTED_CLASS))
            }
            ButtonKind::Action => TriState::Unchecked,
        }
    }

    pub fn set_checked(&self, checked: bool) -> Result<bool, String> {
        let Some(el) = self.element else {
            return Err(format!("{} not found ({})", self.binding.id, self.binding.selector));
        };
        let press = match self.binding.kind {
            ButtonKind::Toggle | ButtonKind::Panel => {
                self.api.has_class(el, SELECTED_CLASS) != checked
            }
            ButtonKind::Action => checked,
        };
        if press {
            self.api.activate(el)?;
        }
        Ok(press)
    }

    /// Actions keep no state, so any successful write counts.
    pub fn shows(&self, checked: bool) -> bool {
        match (self.binding.kind, self.element) {
            (_, None) => false,
            (ButtonKind::Action, Some(_)) => true,
            (_, Some(el)) => self.api.has_class(el, SELECTED_CLASS) == checked,
        }
    }
}
