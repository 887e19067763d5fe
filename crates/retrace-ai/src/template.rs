//! Deterministic template generator
//!
//! The fallback code path when no provider is available or a provider call
//! fails: produce driver code by table lookup on the action kind. The output
//! is byte-identical for identical inputs. Recorded values that match a known
//! parameter's value are replaced by the parameter name so the executor can
//! substitute at run time.

use std::collections::HashMap;

use retrace_core::{ActionType, SemanticAction};

fn quote(value: &str) -> String {
    format!("{:?}", value)
}

/// Generate driver code for one action without any remote call.
pub fn generate_action_code(
    action: &SemanticAction,
    parameters: &HashMap<String, String>,
) -> String {
    let selector = quote(&action.target.selector);

    // Substitute the value with a parameter name when it matches a recorded
    // parameter value. Parameter names are emitted unquoted.
    let mut value_expr = quote(&action.value);
    // Deterministic: pick the lexicographically first matching name.
    let mut matching: Vec<&String> = parameters
        .iter()
        .filter(|(_, recorded)| **recorded == action.value)
        .map(|(name, _)| name)
        .collect();
    matching.sort();
    if let Some(name) = matching.first() {
        value_expr = (*name).clone();
    }

    match action.action_type {
        ActionType::Navigate => {
            let url_expr = if value_expr == quote(&action.value) {
                quote(&action.value)
            } else {
                value_expr
            };
            format!(
                "// Navigate to {}\npage.MustNavigate({}).MustWaitLoad()\n",
                action.value, url_expr
            )
        }
        ActionType::Click => {
            let description = if action.target.text.is_empty() {
                &action.target.selector
            } else {
                &action.target.text
            };
            format!(
                "// Click {}\npage.MustElement({}).MustWaitVisible().MustClick()\n",
                description, selector
            )
        }
        ActionType::Input => format!(
            "// Input into {}\nelem := page.MustElement({}).MustWaitVisible()\nelem.MustSelectAllText().MustInput({})\n",
            action.target.selector, selector, value_expr
        ),
        ActionType::Keypress => {
            let key = if action.value.is_empty() {
                "Enter"
            } else {
                &action.value
            };
            format!(
                "// Press {} key\npage.Keyboard.MustType(input.{})\n",
                key, key
            )
        }
        ActionType::DblClick => format!(
            "// Double click {}\npage.MustElement({}).MustWaitVisible().MustDoubleClick()\n",
            action.target.selector, selector
        ),
        ActionType::RightClick => format!(
            "// Right click {}\npage.MustElement({}).MustWaitVisible().MustClick(\"right\")\n",
            action.target.selector, selector
        ),
        ActionType::Select => format!(
            "// Select text {}\npage.MustElement({}).MustWaitVisible().MustSelectAllText()\n",
            action.value, selector
        ),
        ActionType::Scroll => format!(
            "// Scroll {}\npage.MustElement({}).MustWaitVisible().MustScrollIntoView()\n",
            action.target.selector, selector
        ),
        ActionType::Focus => format!(
            "// Focus {}\npage.MustElement({}).MustWaitVisible().MustFocus()\n",
            action.target.selector, selector
        ),
        ActionType::Blur => format!(
            "// Blur {}\npage.MustElement({}).MustWaitVisible().MustBlur()\n",
            action.target.selector, selector
        ),
        ActionType::Copy => {
            "// Copy selection\npage.Keyboard.MustPress(input.ControlLeft, input.KeyC)\n"
                .to_string()
        }
        ActionType::Paste => {
            "// Paste clipboard\npage.Keyboard.MustPress(input.ControlLeft, input.KeyV)\n"
                .to_string()
        }
        other => format!("// Unsupported action type: {}\n", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::{ActionTarget, InteractionRank};

    fn action(action_type: ActionType, selector: &str, value: &str) -> SemanticAction {
        let mut action = SemanticAction::new(action_type, 0);
        action.sequence_id = 1;
        action.value = value.to_string();
        action.interaction_rank = InteractionRank::High;
        action.target = ActionTarget {
            tag: "input".to_string(),
            selector: selector.to_string(),
            ..Default::default()
        };
        action
    }

    #[test]
    fn generation_is_deterministic() {
        let input = action(ActionType::Input, "input[name='q']", "cats");
        let params = HashMap::from([("searchQuery".to_string(), "cats".to_string())]);
        let first = generate_action_code(&input, &params);
        let second = generate_action_code(&input, &params);
        assert_eq!(first, second);
    }

    #[test]
    fn input_value_substitutes_parameter_name() {
        let input = action(ActionType::Input, "input[name='q']", "cats");
        let params = HashMap::from([("searchQuery".to_string(), "cats".to_string())]);
        let code = generate_action_code(&input, &params);
        assert!(code.contains("MustInput(searchQuery)"));
        assert!(!code.contains("MustInput(\"cats\")"));
    }

    #[test]
    fn unmatched_value_stays_quoted() {
        let input = action(ActionType::Input, "input[name='q']", "cats");
        let code = generate_action_code(&input, &HashMap::new());
        assert!(code.contains("MustInput(\"cats\")"));
    }

    #[test]
    fn navigate_embeds_selectorless_code() {
        let nav = action(ActionType::Navigate, "window", "https://x.test/");
        let code = generate_action_code(&nav, &HashMap::new());
        assert!(code.contains("MustNavigate(\"https://x.test/\")"));
        assert!(code.contains("MustWaitLoad"));
    }

    #[test]
    fn click_code_mentions_selector_for_refinement() {
        let click = action(ActionType::Click, "#submit", "");
        let code = generate_action_code(&click, &HashMap::new());
        assert!(code.contains("MustElement(\"#submit\")"));
    }

    #[test]
    fn reserved_kinds_generate_a_marker() {
        let upload = action(ActionType::FileUpload, "#file", "");
        let code = generate_action_code(&upload, &HashMap::new());
        assert!(code.starts_with("// Unsupported action type: file_upload"));
    }
}
