//! Variable-token identification
//!
//! Walks the extracted actions and decides which recorded input values are
//! run-time parameters, naming each one from (in order) a semantic value
//! classifier, the target's form attributes, the target text, or a positional
//! fallback.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use retrace_core::{
    ActionType, ParameterType, SemanticAction, TokenType, WorkflowParameter,
};
use std::collections::HashSet;

use crate::extractor::is_variable_value;

const MAX_PARAM_NAME_LEN: usize = 30;

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("numeric regex"));

/// Determines the semantic category of a recorded value ("email",
/// "searchQuery", ...). Returning "input" means no useful category.
#[async_trait]
pub trait ValueClassifier: Send + Sync {
    async fn classify_value(&self, value: &str) -> String;
}

/// Identify variable tokens in the action sequence, first-seen per value.
pub async fn identify_variables(
    actions: &[SemanticAction],
    classifier: Option<&dyn ValueClassifier>,
) -> Vec<WorkflowParameter> {
    let mut parameters = Vec::new();
    let mut seen_values: HashSet<&str> = HashSet::new();

    for action in actions {
        if action.action_type != ActionType::Input || action.value.is_empty() {
            continue;
        }
        if !seen_values.insert(action.value.as_str()) {
            continue;
        }
        if !is_variable_value(&action.value) {
            continue;
        }

        parameters.push(WorkflowParameter {
            name: parameter_name(action, classifier).await,
            parameter_type: infer_parameter_type(&action.value),
            default_value: action.value.clone(),
            description: String::new(),
            required: true,
            token_type: TokenType::Variable,
            source_action: action.sequence_id,
        });
    }

    parameters
}

async fn parameter_name(
    action: &SemanticAction,
    classifier: Option<&dyn ValueClassifier>,
) -> String {
    if let Some(classifier) = classifier {
        let category = classifier.classify_value(&action.value).await;
        if !category.is_empty() && category != "input" {
            return category;
        }
    }

    for key in ["placeholder", "aria-label", "name"] {
        if let Some(value) = action.target.attr(key) {
            if !value.is_empty() {
                return to_camel_case(value);
            }
        }
    }

    if !action.target.text.is_empty() {
        return to_camel_case(&action.target.text);
    }

    format!("input{}", action.sequence_id)
}

/// Guess the parameter type from the recorded value.
pub fn infer_parameter_type(value: &str) -> ParameterType {
    if value.contains('@') && value.contains('.') {
        return ParameterType::Email;
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return ParameterType::Url;
    }
    if NUMERIC_RE.is_match(value) {
        return ParameterType::Number;
    }
    ParameterType::String
}

/// camelCase a free-form label: strip non-alphanumerics, lower the first
/// word, Title-case the rest, truncate to thirty characters.
pub fn to_camel_case(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.is_empty() {
        return "param".to_string();
    }

    let mut result = String::new();
    for (index, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if index == 0 {
            result.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                result.extend(first.to_uppercase());
                result.push_str(chars.as_str());
            }
        }
    }

    if result.len() > MAX_PARAM_NAME_LEN {
        let mut end = MAX_PARAM_NAME_LEN;
        while end > 0 && !result.is_char_boundary(end) {
            end -= 1;
        }
        result.truncate(end);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::{ActionTarget, InteractionRank};
    use serde_json::json;

    struct StubClassifier(&'static str);

    #[async_trait]
    impl ValueClassifier for StubClassifier {
        async fn classify_value(&self, _value: &str) -> String {
            self.0.to_string()
        }
    }

    fn input_action(sequence_id: u32, value: &str, attrs: &[(&str, &str)]) -> SemanticAction {
        let mut action = SemanticAction::new(ActionType::Input, 0);
        action.sequence_id = sequence_id;
        action.value = value.to_string();
        action.interaction_rank = InteractionRank::High;
        action.target = ActionTarget {
            tag: "input".to_string(),
            selector: "input[name='q']".to_string(),
            attributes: attrs
                .iter()
                .map(|(key, val)| (key.to_string(), json!(val)))
                .collect(),
            ..Default::default()
        };
        action
    }

    #[test]
    fn camel_case_rules() {
        assert_eq!(to_camel_case("Search Reddit"), "searchReddit");
        assert_eq!(to_camel_case("first-name"), "firstName");
        assert_eq!(to_camel_case("  e-mail  address "), "eMailAddress");
        assert_eq!(to_camel_case("!!!"), "param");
        assert!(to_camel_case("a very long label that keeps going and going").len() <= 30);
    }

    #[test]
    fn type_inference() {
        assert_eq!(infer_parameter_type("user@example.com"), ParameterType::Email);
        assert_eq!(infer_parameter_type("https://x.test"), ParameterType::Url);
        assert_eq!(infer_parameter_type("12345"), ParameterType::Number);
        assert_eq!(infer_parameter_type("cats"), ParameterType::String);
    }

    #[tokio::test]
    async fn classifier_category_wins_over_attributes() {
        let action = input_action(1, "cats and dogs", &[("placeholder", "Search")]);
        let classifier = StubClassifier("searchQuery");
        let params = identify_variables(&[action], Some(&classifier)).await;
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "searchQuery");
        assert_eq!(params[0].default_value, "cats and dogs");
        assert_eq!(params[0].source_action, 1);
        assert!(params[0].required);
        assert_eq!(params[0].token_type, TokenType::Variable);
    }

    #[tokio::test]
    async fn classifier_returning_input_falls_back_to_placeholder() {
        let action = input_action(2, "cats and dogs", &[("placeholder", "Search query")]);
        let classifier = StubClassifier("input");
        let params = identify_variables(&[action], Some(&classifier)).await;
        assert_eq!(params[0].name, "searchQuery");
    }

    #[tokio::test]
    async fn positional_fallback_when_nothing_is_known() {
        let action = input_action(7, "cats and dogs", &[]);
        let params = identify_variables(&[action], None).await;
        assert_eq!(params[0].name, "input7");
    }

    #[tokio::test]
    async fn fixed_tokens_and_duplicates_are_skipped() {
        let actions = vec![
            input_action(1, "Enter", &[]),
            input_action(2, "ok", &[]),
            input_action(3, "cats and dogs", &[]),
            input_action(4, "cats and dogs", &[]),
        ];
        let params = identify_variables(&actions, None).await;
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].source_action, 3);
    }
}
