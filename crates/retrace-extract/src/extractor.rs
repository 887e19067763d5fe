//! Semantic extraction
//!
//! Two passes over the sorted event stream: the first rebuilds the DOM
//! registry from snapshots and mutations, the second emits semantic actions.
//! A post-processing pipeline then deduplicates navigations, debounces
//! inputs, repairs stray enter keys, enriches selectors from the registry,
//! filters low-value actions by tolerance, and resequences.

use serde_json::json;

use retrace_core::{
    ActionTarget, ActionType, EventSource, EventTarget, HybridEvent, IncrementalData,
    InteractionRank, MediaData, MetaData, RecorderEventType, SemanticAction, incremental_source,
    mouse_interaction, truncate_text,
};

use crate::registry::DomRegistry;
use crate::selector;

const MAX_TARGET_TEXT: usize = 100;

/// Query-string key prefixes stripped before navigation comparison.
const TRACKING_PARAM_PREFIXES: &[&str] = &[
    "utm_", "fbclid", "gclid", "ref", "source", "sxsrf", "ved", "ei",
];

/// Keypress values treated as structural rather than user data.
const FIXED_KEYS: &[&str] = &["Enter", "Tab", "Escape", "Backspace", "Delete"];

/// Filtering strictness of the extractor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tolerance {
    /// Strict: keep High-rank actions only.
    Low,
    /// Default: keep High and Medium.
    #[default]
    Medium,
    /// Permissive: keep everything that survives the hard drops.
    High,
}

impl std::str::FromStr for Tolerance {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            "medium" | "" => Ok(Self::Medium),
            _ => Err(()),
        }
    }
}

/// Extracts semantic actions from a time-sorted hybrid event stream.
pub struct Extractor {
    registry: DomRegistry,
    tolerance: Tolerance,
    /// Interactable elements that appeared since the last click/input;
    /// flushed into the next emitted action's context.
    mutation_buffer: Vec<ActionTarget>,
    current_url: String,
}

impl Extractor {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            registry: DomRegistry::new(),
            tolerance,
            mutation_buffer: Vec::new(),
            current_url: String::new(),
        }
    }

    pub fn registry(&self) -> &DomRegistry {
        &self.registry
    }

    /// Run the full pipeline: two-pass extraction followed by
    /// post-processing.
    pub fn extract(&mut self, events: &[HybridEvent]) -> Vec<SemanticAction> {
        self.build_registry(events);
        let actions = self.emit_actions(events);
        self.post_process(actions)
    }

    /// The post-processing pipeline on its own; applying it twice yields the
    /// same sequence.
    pub fn post_process(&mut self, actions: Vec<SemanticAction>) -> Vec<SemanticAction> {
        let actions = self.deduplicate_navigations(actions);
        let actions = self.debounce_inputs(actions);
        let actions = self.repair_enter_keys(actions);
        let actions = self.enrich_selectors(actions);
        let actions = self.filter_low_value(actions);
        resequence(actions)
    }

    // ---- pass 1: registry ----

    fn build_registry(&mut self, events: &[HybridEvent]) {
        for event in events {
            if event.source != EventSource::Recorder {
                continue;
            }
            let Some(kind) = event
                .event_type
                .as_recorder()
                .and_then(RecorderEventType::from_code)
            else {
                continue;
            };

            match kind {
                RecorderEventType::FullSnapshot => {
                    if let Some(data) = &event.data {
                        if let Some(node) = data.get("node") {
                            if let Ok(node) = serde_json::from_value(node.clone()) {
                                self.registry.register(&node, 0);
                            }
                        }
                    }
                }
                RecorderEventType::Incremental => {
                    if let Some(incremental) = decode_incremental(event) {
                        if incremental.source == incremental_source::MUTATION {
                            self.apply_mutation(&incremental);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn apply_mutation(&mut self, incremental: &IncrementalData) {
        for addition in &incremental.adds {
            self.registry.register(&addition.node, addition.parent_id);
        }
        for removal in &incremental.removes {
            self.registry.remove(removal);
        }
        for text in &incremental.texts {
            self.registry.apply_text(text);
        }
        for attributes in &incremental.attributes {
            self.registry.apply_attributes(attributes);
        }
    }

    // ---- pass 2: action emission ----

    fn emit_actions(&mut self, events: &[HybridEvent]) -> Vec<SemanticAction> {
        let mut actions = Vec::new();
        self.current_url.clear();
        self.mutation_buffer.clear();

        for event in events {
            match event.source {
                EventSource::Recorder => self.emit_recorder_action(event, &mut actions),
                EventSource::Custom => {
                    if let Some(kind) = event.event_type.as_custom() {
                        let kind = kind.to_string();
                        if let Some(action) = self.custom_event_to_action(event, &kind) {
                            actions.push(action);
                        }
                    }
                }
            }
        }

        actions
    }

    fn emit_recorder_action(&mut self, event: &HybridEvent, actions: &mut Vec<SemanticAction>) {
        let Some(kind) = event
            .event_type
            .as_recorder()
            .and_then(RecorderEventType::from_code)
        else {
            return;
        };

        match kind {
            RecorderEventType::Meta => {
                let Some(data) = &event.data else { return };
                let Ok(meta) = serde_json::from_value::<MetaData>(data.clone()) else {
                    return;
                };
                if meta.href.is_empty() || meta.href == self.current_url {
                    return;
                }
                self.current_url = meta.href.clone();

                let mut action = SemanticAction::new(ActionType::Navigate, event.timestamp)
                    .with_meta("source", json!("recorder_meta"));
                action.value = meta.href;
                action.interaction_rank = InteractionRank::High;
                action.target.selector = "window".to_string();
                actions.push(action);
            }
            RecorderEventType::Incremental => {
                let Some(incremental) = decode_incremental(event) else {
                    return;
                };
                match incremental.source {
                    incremental_source::MUTATION => self.buffer_mutation(&incremental),
                    incremental_source::MOUSE_INTERACTION => {
                        if let Some(action) = self.mouse_interaction_to_action(event, &incremental)
                        {
                            actions.push(action);
                        }
                    }
                    incremental_source::INPUT => {
                        actions.push(self.input_to_action(event, &incremental));
                    }
                    incremental_source::SELECTION => {
                        let mut action = SemanticAction::new(ActionType::Select, event.timestamp)
                            .with_meta("source", json!("recorder_selection"));
                        action.value = incremental.text.clone();
                        action.interaction_rank = InteractionRank::Medium;
                        actions.push(action);
                    }
                    incremental_source::DRAG => {
                        let mut action = SemanticAction::new(ActionType::Drag, event.timestamp)
                            .with_meta("source", json!("recorder_drag"))
                            .with_meta("x", json!(incremental.x))
                            .with_meta("y", json!(incremental.y));
                        action.interaction_rank = InteractionRank::Medium;
                        action.target.node_id = incremental.id;
                        actions.push(action);
                    }
                    incremental_source::MEDIA_INTERACTION => {
                        if let Some(action) = self.media_interaction_to_action(event, &incremental)
                        {
                            actions.push(action);
                        }
                    }
                    // Scrolls and pointer moves are low-value for replay.
                    _ => {}
                }
            }
            _ => {}
        }
    }

    /// Re-apply mutation adds during the second pass and stash freshly added
    /// interactable elements in the mutation buffer. Registration is
    /// idempotent, so touching the registry again here is safe.
    fn buffer_mutation(&mut self, incremental: &IncrementalData) {
        for addition in &incremental.adds {
            self.registry.register(&addition.node, addition.parent_id);

            let Some(node) = self.registry.get(addition.node.id) else {
                continue;
            };
            if self.registry.interaction_rank(node) == InteractionRank::Low {
                continue;
            }
            let entry = ActionTarget {
                tag: node.tag.clone(),
                text: truncate_text(&node.text, MAX_TARGET_TEXT),
                selector: selector::synthesize(&self.registry, addition.node.id)
                    .unwrap_or_default(),
                attributes: node.attributes.clone(),
                node_id: addition.node.id,
            };
            self.mutation_buffer.push(entry);
        }
        for removal in &incremental.removes {
            self.registry.remove(removal);
        }
    }

    fn target_from_registry(&self, node_id: i64) -> ActionTarget {
        let mut target = ActionTarget {
            node_id,
            ..Default::default()
        };
        if let Some(node) = self.registry.get(node_id) {
            target.tag = node.tag.clone();
            target.text = truncate_text(&node.text, MAX_TARGET_TEXT);
            target.attributes = node.attributes.clone();
        }
        target
    }

    fn mouse_interaction_to_action(
        &mut self,
        event: &HybridEvent,
        incremental: &IncrementalData,
    ) -> Option<SemanticAction> {
        let resolved_id = self.registry.clickable_ancestor(incremental.id);
        let target = self.target_from_registry(resolved_id);

        let (action_type, rank) = match incremental.interaction_type {
            mouse_interaction::CLICK => {
                let weak = target.tag.is_empty()
                    || (target.tag == "div" && target.text.is_empty() && target.selector.is_empty());
                let rank = if weak {
                    InteractionRank::Low
                } else {
                    InteractionRank::High
                };
                (ActionType::Click, rank)
            }
            mouse_interaction::DBL_CLICK => (ActionType::DblClick, InteractionRank::High),
            mouse_interaction::CONTEXT_MENU => (ActionType::RightClick, InteractionRank::High),
            mouse_interaction::FOCUS => {
                let rank = if target.tag.is_empty() {
                    InteractionRank::Low
                } else {
                    InteractionRank::Medium
                };
                (ActionType::Focus, rank)
            }
            mouse_interaction::BLUR => (ActionType::Blur, InteractionRank::Low),
            // Mouse up/down are intermediate events.
            _ => return None,
        };

        let mut action = SemanticAction::new(action_type, event.timestamp)
            .with_meta("source", json!("recorder_mouse_interaction"))
            .with_meta("x", json!(incremental.x))
            .with_meta("y", json!(incremental.y));
        action.target = target;
        action.interaction_rank = rank;

        if action_type == ActionType::Click {
            let context = self.flush_mutation_buffer();
            // A low-rank click that surfaced nothing new has no observable
            // effect.
            if rank == InteractionRank::Low && context.is_empty() {
                return None;
            }
            action.context = context;
        }

        Some(action)
    }

    fn input_to_action(&mut self, event: &HybridEvent, incremental: &IncrementalData) -> SemanticAction {
        let mut action = SemanticAction::new(ActionType::Input, event.timestamp)
            .with_meta("source", json!("recorder_input"));
        action.value = incremental.text.clone();
        action.interaction_rank = InteractionRank::High;
        action.target = self.target_from_registry(incremental.id);
        action.context = self.flush_mutation_buffer();
        action
    }

    fn media_interaction_to_action(
        &self,
        event: &HybridEvent,
        incremental: &IncrementalData,
    ) -> Option<SemanticAction> {
        let media: MediaData = event
            .data
            .as_ref()
            .and_then(|data| serde_json::from_value(data.clone()).ok())?;

        let action_type = match media.interaction_type {
            0 => ActionType::MediaPlay,
            1 => ActionType::MediaPause,
            2 => ActionType::MediaSeek,
            _ => return None,
        };

        let mut action = SemanticAction::new(action_type, event.timestamp)
            .with_meta("source", json!("recorder_media"));
        action.interaction_rank = InteractionRank::Medium;
        action.target.node_id = incremental.id;
        Some(action)
    }

    fn custom_event_to_action(
        &mut self,
        event: &HybridEvent,
        kind: &str,
    ) -> Option<SemanticAction> {
        let mut action = SemanticAction::new(ActionType::Click, event.timestamp)
            .with_meta("original_type", json!(kind));
        if let Some(modifiers) = &event.modifiers {
            action
                .metadata
                .insert("modifiers".to_string(), json!(modifiers));
        }

        if let Some(target) = &event.target {
            action.target = ActionTarget {
                tag: target.tag.clone(),
                selector: target.selector.clone(),
                text: truncate_text(&target.text, MAX_TARGET_TEXT),
                ..Default::default()
            };
        }

        match kind {
            "click" => {
                action.action_type = ActionType::Click;
                action.interaction_rank = custom_target_rank(event.target.as_ref());
                action.context = self.flush_mutation_buffer();
                if action.interaction_rank == InteractionRank::Low && action.context.is_empty() {
                    return None;
                }
            }
            "input" => {
                action.action_type = ActionType::Input;
                action.value = event.value.clone();
                action.interaction_rank = InteractionRank::High;
                action.context = self.flush_mutation_buffer();
            }
            "copy" => {
                action.action_type = ActionType::Copy;
                action.interaction_rank = InteractionRank::High;
            }
            "paste" => {
                action.action_type = ActionType::Paste;
                action.interaction_rank = InteractionRank::High;
                action.value = event.value.clone();
            }
            "keydown" | "keypress" => {
                let chorded = event
                    .modifiers
                    .map(|modifiers| modifiers.ctrl || modifiers.meta)
                    .unwrap_or(false);
                if chorded {
                    match event.shortcut.as_str() {
                        "copy" => action.action_type = ActionType::Copy,
                        "paste" => action.action_type = ActionType::Paste,
                        _ => {
                            action.action_type = ActionType::Keypress;
                            action.value = format_key_combo(event);
                        }
                    }
                    action.interaction_rank = InteractionRank::Medium;
                } else {
                    action.action_type = ActionType::Keypress;
                    action.value = event.key.clone();
                    let bare_modifier = matches!(
                        action.value.as_str(),
                        "" | "Shift" | "Control" | "Alt" | "Meta"
                    );
                    action.interaction_rank = if bare_modifier {
                        InteractionRank::Low
                    } else {
                        InteractionRank::Medium
                    };
                }
            }
            "scroll" => {
                action.action_type = ActionType::Scroll;
                action.interaction_rank = InteractionRank::Low;
            }
            _ => return None,
        }

        Some(action)
    }

    fn flush_mutation_buffer(&mut self) -> Vec<ActionTarget> {
        std::mem::take(&mut self.mutation_buffer)
    }

    // ---- post-processing ----

    /// Drop duplicate and consequential navigations.
    fn deduplicate_navigations(&self, actions: Vec<SemanticAction>) -> Vec<SemanticAction> {
        let mut result: Vec<SemanticAction> = Vec::with_capacity(actions.len());
        let mut effective_url = String::new();

        for action in actions {
            if action.action_type == ActionType::Navigate {
                if let Some(previous) = result.last() {
                    // Consecutive navigations: same normalized URL or same
                    // domain is a redirect/continuation.
                    if previous.action_type == ActionType::Navigate {
                        if normalize_url(&action.value) == normalize_url(&previous.value)
                            || is_same_domain(&action.value, &previous.value)
                        {
                            continue;
                        }
                    }

                    // A same-domain navigation right after an interaction is
                    // a consequence of that interaction, not a user step.
                    if previous.action_type.is_interactive()
                        && is_same_domain(&action.value, &effective_url)
                    {
                        continue;
                    }
                }
                effective_url = action.value.clone();
            }

            result.push(action);
        }

        result
    }

    /// Coalesce consecutive inputs on the same selector into the final value.
    fn debounce_inputs(&self, actions: Vec<SemanticAction>) -> Vec<SemanticAction> {
        let mut result: Vec<SemanticAction> = Vec::with_capacity(actions.len());
        let mut index = 0;

        while index < actions.len() {
            let mut current = actions[index].clone();

            if current.action_type == ActionType::Input {
                let mut lookahead = index + 1;
                while lookahead < actions.len() {
                    let next = &actions[lookahead];
                    if next.action_type == ActionType::Input
                        && next.target.selector == current.target.selector
                    {
                        current.value = next.value.clone();
                        current.timestamp = next.timestamp;
                        index = lookahead;
                        lookahead += 1;
                    } else {
                        break;
                    }
                }
            }

            result.push(current);
            index += 1;
        }

        result
    }

    /// An input of exactly "en" against a node the registry never saw is a
    /// half-captured Enter press; turn it into a keypress that inherits the
    /// previous surviving action's selector.
    fn repair_enter_keys(&self, mut actions: Vec<SemanticAction>) -> Vec<SemanticAction> {
        for index in 0..actions.len() {
            let action = &actions[index];
            if action.action_type != ActionType::Input || action.value != "en" {
                continue;
            }
            let node_known =
                action.target.node_id != 0 && self.registry.get(action.target.node_id).is_some();
            if node_known || !action.target.tag.is_empty() {
                continue;
            }

            let inherited = index.checked_sub(1).map(|prev| {
                (
                    actions[prev].target.selector.clone(),
                    actions[prev].target.tag.clone(),
                )
            });

            let action = &mut actions[index];
            action.action_type = ActionType::Keypress;
            action.value = "Enter".to_string();
            if let Some((selector, tag)) = inherited {
                action.target.selector = selector;
                action.target.tag = tag;
            }
        }
        actions
    }

    /// Re-query the registry for each target and regenerate selectors.
    fn enrich_selectors(&self, mut actions: Vec<SemanticAction>) -> Vec<SemanticAction> {
        for action in &mut actions {
            if action.target.node_id != 0 {
                if let Some(node) = self.registry.get(action.target.node_id) {
                    // Only adopt registry data when it is richer than what
                    // the event carried.
                    if !node.tag.is_empty() {
                        action.target.tag = node.tag.clone();
                        action.target.attributes = node.attributes.clone();
                    }
                }
            }

            if action.target.selector == "window" || action.target.selector.is_empty() {
                if !action.target.tag.is_empty() && !action.target.attributes.is_empty() {
                    if let Some(robust) = self.robust_selector(&action.target) {
                        action.target.selector = robust;
                    }
                }
                if action.action_type == ActionType::Input && action.target.tag.is_empty() {
                    action.target.tag = "input".to_string();
                }
                continue;
            }

            if action.target.tag.is_empty() && action.action_type == ActionType::Input {
                action.target.tag = "input".to_string();
            }

            if let Some(robust) = self.robust_selector(&action.target) {
                if !robust.is_empty() && robust != action.target.selector {
                    action.target.selector = robust;
                }
            }
        }
        actions
    }

    fn robust_selector(&self, target: &ActionTarget) -> Option<String> {
        if target.node_id != 0 && self.registry.get(target.node_id).is_some() {
            return selector::synthesize(&self.registry, target.node_id);
        }
        selector::attribute_selector(&target.tag, &target.attributes)
    }

    /// Hard drops first, then the tolerance policy.
    fn filter_low_value(&self, actions: Vec<SemanticAction>) -> Vec<SemanticAction> {
        actions
            .into_iter()
            .filter(|action| {
                if action.action_type == ActionType::Input && action.target.selector.is_empty() {
                    return false;
                }
                if action.target.tag.is_empty() && action.action_type != ActionType::Navigate {
                    return false;
                }
                if action.action_type.is_media() {
                    return false;
                }
                if matches!(action.action_type, ActionType::Focus | ActionType::Blur) {
                    return false;
                }

                match self.tolerance {
                    Tolerance::High => true,
                    Tolerance::Medium => matches!(
                        action.interaction_rank,
                        InteractionRank::High | InteractionRank::Medium
                    ),
                    Tolerance::Low => action.interaction_rank == InteractionRank::High,
                }
            })
            .collect()
    }
}

/// Assign dense 1-based sequence ids.
fn resequence(mut actions: Vec<SemanticAction>) -> Vec<SemanticAction> {
    for (index, action) in actions.iter_mut().enumerate() {
        action.sequence_id = (index + 1) as u32;
    }
    actions
}

fn decode_incremental(event: &HybridEvent) -> Option<IncrementalData> {
    event
        .data
        .as_ref()
        .and_then(|data| serde_json::from_value(data.clone()).ok())
}

/// Rank heuristic for custom click targets, which carry their own selector.
fn custom_target_rank(target: Option<&EventTarget>) -> InteractionRank {
    let Some(target) = target else {
        return InteractionRank::Low;
    };

    let tag = target.tag.to_lowercase();
    if matches!(tag.as_str(), "button" | "a" | "input" | "select" | "textarea") {
        return InteractionRank::High;
    }

    if matches!(tag.as_str(), "div" | "span" | "li" | "label") {
        let selector = target.selector.to_lowercase();
        if selector.contains("button") || selector.contains("btn") || selector.contains("click") {
            return InteractionRank::Medium;
        }
    }

    InteractionRank::Low
}

/// Format a modifier chord like `Ctrl+Shift+K`.
fn format_key_combo(event: &HybridEvent) -> String {
    let mut parts = Vec::new();
    if let Some(modifiers) = &event.modifiers {
        if modifiers.ctrl {
            parts.push("Ctrl".to_string());
        }
        if modifiers.meta {
            parts.push("Cmd".to_string());
        }
        if modifiers.alt {
            parts.push("Alt".to_string());
        }
        if modifiers.shift {
            parts.push("Shift".to_string());
        }
    }
    parts.push(event.key.to_uppercase());
    parts.join("+")
}

/// Strip tracking query parameters; the rest of the URL is preserved.
pub fn normalize_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let surviving: Vec<&str> = query
        .split('&')
        .filter(|param| {
            let key = param.split('=').next().unwrap_or(param);
            !TRACKING_PARAM_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
        })
        .collect();

    if surviving.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, surviving.join("&"))
    }
}

/// Scheme-stripped host portion of a URL.
pub fn extract_domain(url: &str) -> &str {
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    url.split('/').next().unwrap_or(url)
}

pub fn is_same_domain(url_a: &str, url_b: &str) -> bool {
    let domain_a = extract_domain(url_a);
    let domain_b = extract_domain(url_b);
    !domain_a.is_empty() && !domain_b.is_empty() && domain_a == domain_b
}

/// Classify whether a recorded value should become a run-time parameter.
pub fn is_variable_value(value: &str) -> bool {
    if value.chars().count() <= 1 {
        return false;
    }
    if FIXED_KEYS.contains(&value) {
        return false;
    }
    value.len() > 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav(value: &str) -> SemanticAction {
        let mut action = SemanticAction::new(ActionType::Navigate, 0);
        action.value = value.to_string();
        action.interaction_rank = InteractionRank::High;
        action.target.selector = "window".to_string();
        action
    }

    fn input_on(selector: &str, value: &str) -> SemanticAction {
        let mut action = SemanticAction::new(ActionType::Input, 0);
        action.value = value.to_string();
        action.interaction_rank = InteractionRank::High;
        action.target.tag = "input".to_string();
        action.target.selector = selector.to_string();
        action
    }

    fn click_ranked(tag: &str, rank: InteractionRank) -> SemanticAction {
        let mut action = SemanticAction::new(ActionType::Click, 0);
        action.interaction_rank = rank;
        action.target.tag = tag.to_string();
        action.target.selector = format!(".{}", tag);
        action
    }

    #[test]
    fn url_normalization_strips_tracking_params() {
        assert_eq!(
            normalize_url("https://x.test/a?q=cats&utm_source=mail&gclid=123"),
            "https://x.test/a?q=cats"
        );
        assert_eq!(
            normalize_url("https://x.test/a?utm_source=mail"),
            "https://x.test/a"
        );
        assert_eq!(normalize_url("https://x.test/a"), "https://x.test/a");
    }

    #[test]
    fn url_normalization_is_idempotent() {
        let once = normalize_url("https://x.test/a?q=1&ref=z&ved=9");
        assert_eq!(normalize_url(&once), once);
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(extract_domain("https://x.test/a/b?c=1"), "x.test");
        assert_eq!(extract_domain("http://y.test"), "y.test");
        assert!(is_same_domain("https://x.test/a", "http://x.test/b"));
        assert!(!is_same_domain("https://x.test", "https://y.test"));
    }

    #[test]
    fn navigate_dedup_cases() {
        let extractor = Extractor::new(Tolerance::Medium);

        // Duplicate URL.
        let result = extractor.deduplicate_navigations(vec![
            nav("https://g.test"),
            nav("https://g.test"),
        ]);
        assert_eq!(result.len(), 1);

        // Same domain treated as redirect.
        let result = extractor.deduplicate_navigations(vec![
            nav("https://g.test"),
            nav("https://g.test/search"),
        ]);
        assert_eq!(result.len(), 1);

        // Cross-domain navigations both survive.
        let result = extractor.deduplicate_navigations(vec![
            nav("https://g.test"),
            nav("https://e.test"),
        ]);
        assert_eq!(result.len(), 2);

        // Interaction followed by same-domain navigation drops the nav.
        let result = extractor.deduplicate_navigations(vec![
            nav("https://g.test"),
            input_on("input[name='q']", "cats"),
            nav("https://g.test/search?q=cats"),
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].action_type, ActionType::Input);

        // Interaction followed by cross-domain navigation keeps the nav.
        let result = extractor.deduplicate_navigations(vec![
            nav("https://g.test"),
            click_ranked("a", InteractionRank::High),
            nav("https://e.test"),
        ]);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn input_debounce_takes_latest_value() {
        let extractor = Extractor::new(Tolerance::Medium);
        let result = extractor.debounce_inputs(vec![
            input_on("input[name='q']", "c"),
            input_on("input[name='q']", "ca"),
            input_on("input[name='q']", "cat"),
            input_on("input[name='q']", "cats"),
            input_on("#other", "x"),
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].value, "cats");
        assert_eq!(result[1].value, "x");
    }

    #[test]
    fn enter_key_repair_inherits_previous_selector() {
        let extractor = Extractor::new(Tolerance::Medium);
        let mut stray = SemanticAction::new(ActionType::Input, 0);
        stray.value = "en".to_string();
        stray.interaction_rank = InteractionRank::High;

        let result = extractor.repair_enter_keys(vec![input_on("#search", "cats"), stray]);
        assert_eq!(result[1].action_type, ActionType::Keypress);
        assert_eq!(result[1].value, "Enter");
        assert_eq!(result[1].target.selector, "#search");
    }

    #[test]
    fn enter_key_repair_skips_known_targets() {
        let extractor = Extractor::new(Tolerance::Medium);
        // "en" typed into a real input stays an input.
        let result = extractor.repair_enter_keys(vec![input_on("#search", "en")]);
        assert_eq!(result[0].action_type, ActionType::Input);
        assert_eq!(result[0].value, "en");
    }

    #[test]
    fn filter_applies_tolerance_after_hard_drops() {
        let make = |tolerance| {
            let extractor = Extractor::new(tolerance);
            extractor.filter_low_value(vec![
                click_ranked("button", InteractionRank::High),
                click_ranked("div", InteractionRank::Medium),
                click_ranked("div", InteractionRank::Low),
                {
                    let mut media = SemanticAction::new(ActionType::MediaPlay, 0);
                    media.target.tag = "video".to_string();
                    media.interaction_rank = InteractionRank::High;
                    media
                },
                {
                    let mut focus = SemanticAction::new(ActionType::Focus, 0);
                    focus.target.tag = "input".to_string();
                    focus.interaction_rank = InteractionRank::High;
                    focus
                },
            ])
        };

        assert_eq!(make(Tolerance::Low).len(), 1);
        assert_eq!(make(Tolerance::Medium).len(), 2);
        assert_eq!(make(Tolerance::High).len(), 3);
    }

    #[test]
    fn filter_drops_inputs_without_selector_and_empty_tags() {
        let extractor = Extractor::new(Tolerance::High);
        let mut unselectored = input_on("", "text");
        unselectored.target.selector = String::new();
        let mut tagless = click_ranked("", InteractionRank::High);
        tagless.target.tag = String::new();

        let result = extractor.filter_low_value(vec![
            unselectored,
            tagless,
            nav("https://x.test"),
        ]);
        // The navigate survives despite having no tag.
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].action_type, ActionType::Navigate);
    }

    #[test]
    fn resequence_is_dense_and_one_based() {
        let actions = resequence(vec![
            click_ranked("button", InteractionRank::High),
            click_ranked("a", InteractionRank::High),
        ]);
        let ids: Vec<u32> = actions.iter().map(|action| action.sequence_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn post_process_is_idempotent() {
        let mut extractor = Extractor::new(Tolerance::Medium);
        let actions = vec![
            nav("https://x.test/"),
            input_on("input[name='q']", "c"),
            input_on("input[name='q']", "cats"),
            click_ranked("button", InteractionRank::High),
        ];

        let once = extractor.post_process(actions);
        let twice = extractor.post_process(once.clone());
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn variable_value_heuristic() {
        assert!(is_variable_value("cats are great"));
        assert!(!is_variable_value("Enter"));
        assert!(!is_variable_value("x"));
        assert!(!is_variable_value("abc"));
        assert!(is_variable_value("abcd"));
    }
}
