use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const SCREEN_WIDTH_KEY: &str = "screen_width";
pub const TRACK_ENDED: &str = "track_ended";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ControlId {
    #[serde(rename = "button_user_page")]
    UserPage,
    #[serde(rename = "button_like")]
    Like,
    #[serde(rename = "button_dislike")]
    Dislike,
    #[serde(rename = "button_subscribe")]
    Subscribe,
    #[serde(rename = "button_play")]
    Play,
    #[serde(rename = "button_prev")]
    Prev,
    #[serde(rename = "button_next")]
    Next,
    #[serde(rename = "button_suggestions")]
    Suggestions,
    #[serde(rename = "button_favorites")]
    Favorites,
}

impl ControlId {
    /// Declaration order. The native side relies on these names, keep them stable.
    pub const ALL: [ControlId; 9] = [
        ControlId::UserPage,
        ControlId::Like,
        ControlId::Dislike,
        ControlId::Subscribe,
        ControlId::Play,
        ControlId::Prev,
        ControlId::Next,
        ControlId::Suggestions,
        ControlId::Favorites,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ControlId::UserPage => "button_user_page",
            ControlId::Like => "button_like",
            ControlId::Dislike => "button_dislike",
            ControlId::Subscribe => "button_subscribe",
            ControlId::Play => "button_play",
            ControlId::Prev => "button_prev",
            ControlId::Next => "button_next",
            ControlId::Suggestions => "button_suggestions",
            ControlId::Favorites => "button_favorites",
        }
    }

    pub fn opens_expanded_player(self) -> bool {
        matches!(
            self,
            ControlId::Suggestions | ControlId::Favorites | ControlId::UserPage
        )
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlId {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(pub String);

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name: {}", self.0)
    }
}

impl std::error::Error for UnknownName {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    Checked,
    Unchecked,
    NotApplicable,
}

impl TriState {
    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => TriState::Checked,
            Some(false) => TriState::Unchecked,
            None => TriState::NotApplicable,
        }
    }

    pub fn as_option(self) -> Option<bool> {
        match self {
            TriState::Checked => Some(true),
            TriState::Unchecked => Some(false),
            TriState::NotApplicable => None,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        TriState::from_option(Some(value))
    }
}

impl Serialize for TriState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_option().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<bool>::deserialize(deserializer).map(TriState::from_option)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressedButton {
    Control(ControlId),
    TrackEnded,
}

impl PressedButton {
    pub fn as_str(self) -> &'static str {
        match self {
            PressedButton::Control(id) => id.as_str(),
            PressedButton::TrackEnded => TRACK_ENDED,
        }
    }
}

impl FromStr for PressedButton {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == TRACK_ENDED {
            return Ok(PressedButton::TrackEnded);
        }
        ControlId::from_str(s).map(PressedButton::Control)
    }
}

/// Flat JSON object exchanged with the native host:
/// `{"button_like": true, "button_next": null, "screen_width": 1920}`.
///
/// A key that is missing means "leave alone" (apply) or "disabled" (snapshot);
/// a `null` value is kept as [`TriState::NotApplicable`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ButtonStates {
    pub buttons: BTreeMap<ControlId, TriState>,
    pub screen_width: Option<u32>,
    /// Keys the bridge does not know. Never serialized.
    pub ignored: Vec<String>,
}

impl ButtonStates {
    pub fn get(&self, id: ControlId) -> Option<TriState> {
        self.buttons.get(&id).copied()
    }

    pub fn with(mut self, id: ControlId, state: impl Into<TriState>) -> Self {
        self.buttons.insert(id, state.into());
        self
    }
}

impl Serialize for ButtonStates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.buttons.len() + usize::from(self.screen_width.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (id, state) in &self.buttons {
            map.serialize_entry(id.as_str(), state)?;
        }
        if let Some(width) = self.screen_width {
            map.serialize_entry(SCREEN_WIDTH_KEY, &width)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ButtonStates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ButtonStatesVisitor)
    }
}

struct ButtonStatesVisitor;

impl<'de> Visitor<'de> for ButtonStatesVisitor {
    type Value = ButtonStates;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of button names to true/false/null")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = ButtonStates::default();
        while let Some(key) = access.next_key::<String>()? {
            if key == SCREEN_WIDTH_KEY {
                // JS numbers arrive as floats.
                let width: Option<f64> = access.next_value()?;
                out.screen_width = width
                    .filter(|w| w.is_finite() && *w >= 0.0)
                    .map(|w| w.round().min(u32::MAX as f64) as u32);
                continue;
            }
            match ControlId::from_str(&key) {
                Ok(id) => {
                    let state: TriState = access
                        .next_value()
                        .map_err(|e| de::Error::custom(format!("{key}: {e}")))?;
                    out.buttons.insert(id, state);
                }
                Err(_) => {
                    access.next_value::<IgnoredAny>()?;
                    out.ignored.push(key);
                }
            }
        }
        Ok(out)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    #[serde(rename = "action_close_suggestions")]
    CloseSuggestions,
    #[serde(rename = "action_playback_started")]
    PlaybackStarted,
    #[serde(rename = "action_disable_key_events")]
    DisableKeyEvents,
}

impl HostAction {
    pub const ALL: [HostAction; 3] = [
        HostAction::CloseSuggestions,
        HostAction::PlaybackStarted,
        HostAction::DisableKeyEvents,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HostAction::CloseSuggestions => "action_close_suggestions",
            HostAction::PlaybackStarted => "action_playback_started",
            HostAction::DisableKeyEvents => "action_disable_key_events",
        }
    }
}

impl FromStr for HostAction {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HostAction::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Cooldown,
    Busy,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SyncOutcome {
    Applied {
        written: Vec<ControlId>,
        ignored: Vec<String>,
    },
    Skipped { reason: SkipReason },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum CloseOutcome {
    Satisfied { escapes: u32 },
    Exhausted { escapes: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_null_and_false_stay_distinct() {
        let states = ButtonStates::default()
            .with(ControlId::Like, false)
            .with(ControlId::Next, TriState::NotApplicable);
        let json = serde_json::to_value(&states).unwrap();
        assert_eq!(json["button_like"], serde_json::json!(false));
        assert!(json["button_next"].is_null());
        assert!(json.as_object().unwrap().contains_key("button_next"));
        assert!(!json.as_object().unwrap().contains_key("button_dislike"));
    }

    #[test]
    fn unknown_keys_are_collected_not_rejected() {
        let states: ButtonStates = serde_json::from_str(
            r#"{"button_play": true, "button_rewind": true, "video_date": "x", "screen_width": 1280.0}"#,
        )
        .unwrap();
        assert_eq!(states.get(ControlId::Play), Some(TriState::Checked));
        assert_eq!(states.screen_width, Some(1280));
        assert_eq!(states.ignored, vec!["button_rewind", "video_date"]);
    }

    #[test]
    fn non_boolean_value_for_known_control_is_an_error() {
        let err = serde_json::from_str::<ButtonStates>(r#"{"button_like": 3}"#).unwrap_err();
        assert!(err.to_string().contains("button_like"));
    }

    #[test]
    fn pressed_button_parses_track_ended() {
        assert_eq!(
            "track_ended".parse::<PressedButton>().unwrap(),
            PressedButton::TrackEnded
        );
        assert_eq!(
            "button_next".parse::<PressedButton>().unwrap(),
            PressedButton::Control(ControlId::Next)
        );
        assert!("button_rewind".parse::<PressedButton>().is_err());
    }

    #[test]
    fn sync_outcome_is_tagged() {
        let json = serde_json::to_string(&SyncOutcome::Skipped {
            reason: SkipReason::Cooldown,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"skipped","reason":"cooldown"}"#);
    }
}
