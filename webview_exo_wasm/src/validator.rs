use crate::button::{ControlButton, DISABLED_CLASS};
use crate::page_api::PageApi;
use crate::protocol::TriState;
use crate::resolver::ControlMap;
use std::collections::BTreeMap;

pub fn validate_control_map(api: &dyn PageApi, controls: &ControlMap) -> BTreeMap<String, String> {
    let mut report = BTreeMap::new();
    for binding in controls.declared() {
        let button = ControlButton::resolve(api, binding);
        let line = match button.element() {
            None => format!("missing ({})", binding.selector),
            Some(el) if api.has_class(el, DISABLED_CLASS) => {
                format!("present but disabled at {}", binding.selector)
            }
            Some(el) if !api.is_visible(el) => {
                format!("present but hidden at {}", binding.selector)
            }
            Some(_) => match button.checked() {
                TriState::Checked => format!("present at {} (checked)", binding.selector),
                _ => format!("present at {}", binding.selector),
            },
        };
        report.insert(binding.id.as_str().to_string(), line);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_page::MockPage;

    #[test]
    fn reports_missing_disabled_and_checked_controls() {
        let page = MockPage::youtube_tv();
        page.remove_element(".icon-player-prev");
        page.set_disabled(".icon-dislike.toggle-button", true);
        page.set_visible(".icon-subscribe.toggle-button", false);
        page.set_selected(".icon-like.toggle-button", true);

        let report = validate_control_map(&page, &ControlMap::default());
        assert_eq!(report.len(), 9);
        assert_eq!(report["button_prev"], "missing (.icon-player-prev)");
        assert!(report["button_dislike"].starts_with("present but disabled"));
        assert!(report["button_subscribe"].starts_with("present but hidden"));
        assert!(report["button_like"].ends_with("(checked)"));
        assert_eq!(report["button_next"], "present at .icon-player-next");
    }
}
