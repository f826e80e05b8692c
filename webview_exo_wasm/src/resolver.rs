use crate::error::BridgeError;
use crate::page_api::{ElementId, PageApi};
use crate::protocol::ControlId;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Toggle,
    Action,
    Panel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBinding {
    pub id: ControlId,
    pub selector: String,
    pub kind: ButtonKind,
}

const DEFAULT_BINDINGS: &[(ControlId, &str, ButtonKind)] = &[
    (ControlId::UserPage, ".channel-button", ButtonKind::Panel),
    (ControlId::Like, ".icon-like.toggle-button", ButtonKind::Toggle),
    (ControlId::Dislike, ".icon-dislike.toggle-button", ButtonKind::Toggle),
    (ControlId::Subscribe, ".icon-subscribe.toggle-button", ButtonKind::Toggle),
    (ControlId::Play, ".icon-player-play.toggle-button", ButtonKind::Toggle),
    (ControlId::Prev, ".icon-player-prev", ButtonKind::Action),
    (ControlId::Next, ".icon-player-next", ButtonKind::Action),
    (ControlId::Suggestions, "#transport-more-button", ButtonKind::Panel),
    (ControlId::Favorites, ".icon-playlist-add", ButtonKind::Panel),
];

#[derive(Debug, Clone)]
pub struct ControlMap {
    bindings: Vec<ControlBinding>,
}

impl Default for ControlMap {
    fn default() -> Self {
        Self {
            bindings: DEFAULT_BINDINGS
                .iter()
                .map(|(id, selector, kind)| ControlBinding {
                    id: *id,
                    selector: (*selector).to_string(),
                    kind: *kind,
                })
                .collect(),
        }
    }
}

impl ControlMap {
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, BridgeError> {
        let mut map = Self::default();
        for (name, selector) in overrides {
            let id = ControlId::from_str(name)
                .map_err(|_| BridgeError::Config(format!("unknown control: {name}")))?;
            if let Some(binding) = map.bindings.iter_mut().find(|b| b.id == id) {
                binding.selector = selector.clone();
            }
        }
        Ok(map)
    }

    pub fn get(&self, id: ControlId) -> Option<&ControlBinding> {
        self.bindings.iter().find(|b| b.id == id)
    }

    pub fn declared(&self) -> impl Iterator<Item = &ControlBinding> {
        self.bindings.iter()
    }

    /// Snapshot reads walk the table backwards. Reading forward lets the page's
    /// settling delay after the first reads leak into the later controls.
    pub fn read_order(&self) -> impl Iterator<Item = &ControlBinding> {
        self.bindings.iter().rev()
    }
}

pub fn resolve_control(api: &dyn PageApi, binding: &ControlBinding) -> Option<ElementId> {
    api.query(&binding.selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_every_control_once_in_declaration_order() {
        let map = ControlMap::default();
        let ids: Vec<ControlId> = map.declared().map(|b| b.id).collect();
        assert_eq!(ids, ControlId::ALL.to_vec());
    }

    #[test]
    fn read_order_is_reverse_of_declaration() {
        let map = ControlMap::default();
        let read: Vec<ControlId> = map.read_order().map(|b| b.id).collect();
        let mut expected = ControlId::ALL.to_vec();
        expected.reverse();
        assert_eq!(read, expected);
    }

    #[test]
    fn overrides_replace_selector_only() {
        let mut overrides = BTreeMap::new();
        overrides.insert("button_next".to_string(), "#next".to_string());
        let map = ControlMap::with_overrides(&overrides).unwrap();
        let next = map.get(ControlId::Next).unwrap();
        assert_eq!(next.selector, "#next");
        assert_eq!(next.kind, ButtonKind::Action);
    }
}
