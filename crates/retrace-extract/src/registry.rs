//! DOM registry
//!
//! An arena view of the recorded DOM: node ids map to flattened node data and
//! to their parents. The recording assigns the ids; the registry is rebuilt
//! from full snapshots and kept current by incremental mutations.

use serde_json::Value;

use retrace_core::{
    AttributeMutation, InteractionRank, NodeRemoval, SerializedNode, TextMutation,
};
use std::collections::HashMap;

/// Maximum ancestors visited when resolving the clickable ancestor.
const MAX_ANCESTOR_WALK: usize = 5;

/// Flattened data for one registered node.
#[derive(Debug, Clone, Default)]
pub struct RegisteredNode {
    pub tag: String,
    pub attributes: serde_json::Map<String, Value>,
    pub text: String,
}

impl RegisteredNode {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// An evolving map from recording-assigned node ids to serialized nodes.
#[derive(Debug, Default)]
pub struct DomRegistry {
    nodes: HashMap<i64, RegisteredNode>,
    parents: HashMap<i64, i64>,
    children: HashMap<i64, Vec<i64>>,
}

impl DomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node and, recursively, its children.
    ///
    /// Re-registering an id updates the node data in place but keeps its
    /// original position in the parent's ordered child list.
    pub fn register(&mut self, node: &SerializedNode, parent_id: i64) {
        self.nodes.insert(
            node.id,
            RegisteredNode {
                tag: node.tag_name.clone(),
                attributes: node.attributes.clone(),
                text: node.text_content.clone(),
            },
        );

        if parent_id != 0 {
            self.parents.insert(node.id, parent_id);
            let siblings = self.children.entry(parent_id).or_default();
            if !siblings.contains(&node.id) {
                siblings.push(node.id);
            }
        }

        for child in &node.child_nodes {
            self.register(child, node.id);
        }
    }

    /// Unlink a node from its parent's ordered child list and drop it from
    /// the arena. Children stay addressable for later re-parenting. Unknown
    /// ids are a no-op.
    pub fn remove(&mut self, removal: &NodeRemoval) {
        if self.nodes.remove(&removal.id).is_none() {
            return;
        }
        if let Some(parent_id) = self.parents.remove(&removal.id) {
            if let Some(siblings) = self.children.get_mut(&parent_id) {
                siblings.retain(|id| *id != removal.id);
            }
        }
    }

    /// Apply a text-content mutation in place.
    pub fn apply_text(&mut self, mutation: &TextMutation) {
        if let Some(node) = self.nodes.get_mut(&mutation.id) {
            node.text = mutation.value.clone();
        }
    }

    /// Merge an attribute mutation into the registered node.
    pub fn apply_attributes(&mut self, mutation: &AttributeMutation) {
        if let Some(node) = self.nodes.get_mut(&mutation.id) {
            for (key, value) in &mutation.attributes {
                node.attributes.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn get(&self, id: i64) -> Option<&RegisteredNode> {
        self.nodes.get(&id)
    }

    pub fn parent_of(&self, id: i64) -> Option<i64> {
        self.parents.get(&id).copied()
    }

    /// Ordered children of a node, as fixed at first registration.
    pub fn children_of(&self, id: i64) -> &[i64] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve the clickable ancestor of a node.
    ///
    /// Recordings often report the innermost text node or span under a
    /// button; walk up to five parent links and return the first ancestor
    /// whose interaction rank is not Low, else the original id.
    pub fn clickable_ancestor(&self, id: i64) -> i64 {
        if let Some(node) = self.get(id) {
            if self.interaction_rank(node) != InteractionRank::Low {
                return id;
            }
        }

        let mut current = id;
        for _ in 0..MAX_ANCESTOR_WALK {
            match self.parent_of(current) {
                Some(parent) => current = parent,
                None => break,
            }
            if let Some(node) = self.get(current) {
                if self.interaction_rank(node) != InteractionRank::Low {
                    return current;
                }
            }
        }
        id
    }

    /// Rank how likely a node is to be meaningfully interactive.
    pub fn interaction_rank(&self, node: &RegisteredNode) -> InteractionRank {
        let tag = node.tag.to_lowercase();
        if matches!(tag.as_str(), "button" | "a" | "input" | "select" | "textarea") {
            return InteractionRank::High;
        }

        if let Some(role) = node.attr("role") {
            if matches!(
                role,
                "button" | "link" | "menuitem" | "checkbox" | "combobox"
            ) {
                return InteractionRank::Medium;
            }
        }

        if let Some(style) = node.attr("style") {
            if style.replace(' ', "").contains("cursor:pointer") {
                return InteractionRank::Medium;
            }
        }

        if let Some(class) = node.attr("class") {
            let class = class.to_lowercase();
            if class.contains("btn") || class.contains("button") || class.contains("clickable") {
                return InteractionRank::Medium;
            }
        }

        InteractionRank::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: i64, tag: &str, attrs: &[(&str, &str)]) -> SerializedNode {
        let mut attributes = serde_json::Map::new();
        for (key, value) in attrs {
            attributes.insert(key.to_string(), json!(value));
        }
        SerializedNode {
            id,
            tag_name: tag.to_string(),
            attributes,
            ..Default::default()
        }
    }

    fn node_with_children(
        id: i64,
        tag: &str,
        children: Vec<SerializedNode>,
    ) -> SerializedNode {
        SerializedNode {
            id,
            tag_name: tag.to_string(),
            child_nodes: children,
            ..Default::default()
        }
    }

    #[test]
    fn register_is_recursive_and_tracks_parents() {
        let mut registry = DomRegistry::new();
        let tree = node_with_children(
            1,
            "html",
            vec![node_with_children(2, "body", vec![node(3, "button", &[])])],
        );
        registry.register(&tree, 0);

        assert!(registry.get(1).is_some());
        assert_eq!(registry.parent_of(3), Some(2));
        assert_eq!(registry.parent_of(2), Some(1));
        assert_eq!(registry.parent_of(1), None);
        assert_eq!(registry.children_of(2), &[3]);
    }

    #[test]
    fn reregister_preserves_child_order() {
        let mut registry = DomRegistry::new();
        let parent = node_with_children(
            1,
            "div",
            vec![node(2, "span", &[]), node(3, "span", &[])],
        );
        registry.register(&parent, 0);
        // Re-register the first child; its slot must not move to the end.
        registry.register(&node(2, "span", &[("class", "updated")]), 1);

        assert_eq!(registry.children_of(1), &[2, 3]);
        assert_eq!(registry.get(2).unwrap().attr("class"), Some("updated"));
    }

    #[test]
    fn remove_unlinks_but_keeps_descendants() {
        let mut registry = DomRegistry::new();
        let tree = node_with_children(
            1,
            "div",
            vec![node_with_children(2, "ul", vec![node(3, "li", &[])])],
        );
        registry.register(&tree, 0);

        registry.remove(&NodeRemoval { parent_id: 1, id: 2 });
        assert!(registry.get(2).is_none());
        assert!(registry.children_of(1).is_empty());
        // The removed node's child stays addressable for re-parenting.
        assert!(registry.get(3).is_some());

        // Unknown id removal is a no-op.
        registry.remove(&NodeRemoval { parent_id: 1, id: 99 });
    }

    #[test]
    fn interaction_rank_ladder() {
        let registry = DomRegistry::new();
        let button = RegisteredNode {
            tag: "button".to_string(),
            ..Default::default()
        };
        assert_eq!(registry.interaction_rank(&button), InteractionRank::High);

        let mut role_div = RegisteredNode {
            tag: "div".to_string(),
            ..Default::default()
        };
        role_div
            .attributes
            .insert("role".to_string(), json!("menuitem"));
        assert_eq!(registry.interaction_rank(&role_div), InteractionRank::Medium);

        let mut pointer_div = RegisteredNode {
            tag: "div".to_string(),
            ..Default::default()
        };
        pointer_div
            .attributes
            .insert("style".to_string(), json!("color: red; cursor: pointer"));
        assert_eq!(
            registry.interaction_rank(&pointer_div),
            InteractionRank::Medium
        );

        let mut classy = RegisteredNode {
            tag: "span".to_string(),
            ..Default::default()
        };
        classy
            .attributes
            .insert("class".to_string(), json!("nav Clickable-item"));
        assert_eq!(registry.interaction_rank(&classy), InteractionRank::Medium);

        let plain = RegisteredNode {
            tag: "p".to_string(),
            ..Default::default()
        };
        assert_eq!(registry.interaction_rank(&plain), InteractionRank::Low);
    }

    #[test]
    fn clickable_ancestor_walks_at_most_five_levels() {
        let mut registry = DomRegistry::new();
        // button(1) > div(2) > div(3) > div(4) > div(5) > span(6)
        let mut tree = node(1, "button", &[]);
        let mut current = node(6, "span", &[]);
        for id in (2..=5).rev() {
            let mut wrapper = node(id, "div", &[]);
            wrapper.child_nodes.push(current);
            current = wrapper;
        }
        tree.child_nodes.push(current);
        registry.register(&tree, 0);

        // Five hops from the span reaches the button.
        assert_eq!(registry.clickable_ancestor(6), 1);

        // One level deeper and the walk gives up, returning the original id.
        registry.register(&node(7, "i", &[]), 6);
        assert_eq!(registry.clickable_ancestor(7), 7);
    }
}
