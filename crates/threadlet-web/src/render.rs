#![forbid(unsafe_code)]

//! JSON views handed to the page's renderer.
//!
//! The page renders markup; the frame only decides what the markup says.

use serde_json::{Value, json};
use threadlet_core::{
    AdminControl, Localizer, VerificationBadge, VoteControl, VoteControls, VoteDirection,
};
use threadlet_runtime::PopoverState;

fn direction_name(direction: VoteDirection) -> &'static str {
    match direction {
        VoteDirection::Up => "up",
        VoteDirection::Down => "down",
    }
}

fn control_json(control: &VoteControl) -> Value {
    json!({
        "direction": direction_name(control.direction),
        "disabled": control.disabled,
        "ariaDisabled": control.aria_disabled(),
        "title": control.title,
    })
}

#[must_use]
pub fn vote_controls_json(controls: &VoteControls) -> Value {
    json!({
        "allowed": controls.decision.allowed(),
        "up": control_json(&controls.up),
        "down": control_json(&controls.down),
    })
}

#[must_use]
pub fn popover_state_json(state: &PopoverState) -> Value {
    match state {
        PopoverState::Loading => json!({ "state": "loading" }),
        PopoverState::Ready(comments) => json!({
            "state": "ready",
            "comments": comments.as_slice(),
        }),
        PopoverState::Errored(message) => json!({
            "state": "error",
            "message": message,
        }),
    }
}

/// Moderation controls with their localized labels, in display order.
#[must_use]
pub fn moderation_json(
    controls: &[AdminControl],
    badge: VerificationBadge,
    localizer: &dyn Localizer,
) -> Value {
    let controls: Vec<Value> = controls
        .iter()
        .map(|control| {
            json!({
                "key": control.label().key(),
                "label": localizer.text(control.label()),
            })
        })
        .collect();
    json!({
        "controls": controls,
        "badge": { "visible": badge.visible, "clickable": badge.clickable },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;
    use threadlet_core::{DefaultLocalizer, DenialReason, VoteDecision};

    fn control(direction: VoteDirection, title: Option<&str>) -> VoteControl {
        VoteControl {
            direction,
            disabled: title.is_some(),
            title: title.map(str::to_owned),
        }
    }

    #[test]
    fn denied_controls_carry_title_and_aria_flag() {
        let controls = VoteControls {
            decision: VoteDecision::deny(DenialReason::SignInRequired),
            up: control(VoteDirection::Up, Some("Sign in to vote")),
            down: control(VoteDirection::Down, Some("Sign in to vote")),
        };
        let value = vote_controls_json(&controls);
        assert_eq!(value["allowed"], json!(false));
        assert_eq!(value["up"]["ariaDisabled"], json!("true"));
        assert_eq!(value["down"]["title"], json!("Sign in to vote"));
        assert_eq!(value["down"]["direction"], json!("down"));
    }

    #[test]
    fn allowed_controls_have_null_title() {
        let controls = VoteControls {
            decision: VoteDecision::ALLOWED,
            up: control(VoteDirection::Up, None),
            down: control(VoteDirection::Down, None),
        };
        let value = vote_controls_json(&controls);
        assert_eq!(value["allowed"], json!(true));
        assert_eq!(value["up"]["title"], Value::Null);
        assert_eq!(value["up"]["ariaDisabled"], json!("false"));
    }

    #[test]
    fn popover_states() {
        assert_eq!(
            popover_state_json(&PopoverState::Loading),
            json!({ "state": "loading" })
        );
        assert_eq!(
            popover_state_json(&PopoverState::Errored("boom".into())),
            json!({ "state": "error", "message": "boom" })
        );
        let ready = popover_state_json(&PopoverState::Ready(Rc::new(Vec::new())));
        assert_eq!(ready, json!({ "state": "ready", "comments": [] }));
    }

    #[test]
    fn moderation_labels_are_localized() {
        let value = moderation_json(
            &[AdminControl::Pin, AdminControl::Delete],
            VerificationBadge {
                visible: true,
                clickable: true,
            },
            &DefaultLocalizer,
        );
        let controls = value["controls"].as_array().unwrap();
        assert_eq!(controls.len(), 2);
        assert_eq!(controls[0]["key"], json!(AdminControl::Pin.label().key()));
        assert_eq!(
            controls[1]["label"],
            json!(AdminControl::Delete.label().default_message())
        );
        assert_eq!(value["badge"]["clickable"], json!(true));
    }
}
