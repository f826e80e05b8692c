use std::time::Duration;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);
pub const DEFAULT_CLOSE_RETRIES: u32 = 4;
pub const DEFAULT_CLOSE_RETRY_DELAY: Duration = Duration::from_millis(300);

pub const KEY_ESCAPE: u32 = 27;
pub const KEY_ENTER: u32 = 13;

pub use exo_protocol::{
    ButtonStates, CloseOutcome, ControlId, HostAction, PressedButton, SkipReason, SyncOutcome,
    TriState, SCREEN_WIDTH_KEY, TRACK_ENDED,
};
