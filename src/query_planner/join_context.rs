//! JoinContext: structured bookkeeping for join emission.
//!
//! Tracks which logical table-paths already have a join node, so one path is
//! never joined twice, while keeping the strict parent-before-child emission
//! order the plan promises downstream.

use std::collections::HashMap;

use super::join_plan::JoinNode;

/// Compose the alias of a nested level from its parent alias and the path
/// segment that reaches it. Aliases are accumulated paths, so alias equality
/// is path equality.
pub fn compose_alias(parent: &str, segment: &str) -> String {
    format!("{parent}{segment}")
}

#[derive(Debug, Default)]
pub struct JoinContext {
    nodes: Vec<JoinNode>,
    by_alias: HashMap<String, usize>,
}

impl JoinContext {
    pub fn new(root: JoinNode) -> Self {
        debug_assert!(root.parent_alias.is_none() && root.predicate.is_none());
        let mut ctx = JoinContext::default();
        ctx.by_alias.insert(root.alias.clone(), 0);
        ctx.nodes.push(root);
        ctx
    }

    /// Whether a join for this logical path was already emitted.
    pub fn contains(&self, alias: &str) -> bool {
        self.by_alias.contains_key(alias)
    }

    /// Append a join node. The parent must already be emitted and the alias
    /// must be fresh; the planner's DFS guarantees both.
    pub fn append(&mut self, node: JoinNode) {
        debug_assert!(!self.contains(&node.alias), "duplicate alias `{}`", node.alias);
        debug_assert!(
            node.parent_alias
                .as_deref()
                .is_some_and(|parent| self.contains(parent)),
            "parent of `{}` not emitted yet",
            node.alias
        );
        self.by_alias.insert(node.alias.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    pub fn into_nodes(self) -> Vec<JoinNode> {
        self.nodes
    }
}
