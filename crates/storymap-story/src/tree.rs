//! Step tree reconstruction
//!
//! Stories store their steps as a flat list where each step names its
//! parent. [`build_tree`] turns a weight-ordered list into a forest in one
//! pass over an arena of nodes; children hold arena indices until the
//! arena is folded into nested [`StoryStepNode`]s.

use crate::error::{StoryError, StoryResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use storymap_model::{StepId, ViewpointConfig};

/// One step of the public story structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryStepNode {
    /// Step id
    pub id: StepId,
    /// Step title
    pub title: String,
    /// Title image URL
    pub title_image: Option<String>,
    /// Title image alternative text
    pub title_image_alt: Option<String>,
    /// Reference to the step's content document
    pub content_ref: Option<String>,
    /// Keys of the layers visible in this step, background first
    pub visible_layer_ids: Vec<String>,
    /// Active tool, if any
    pub active_tool: Option<String>,
    /// Viewpoint of this step
    pub viewpoint: Option<ViewpointConfig>,
    /// Whether the step shows the 3D map
    #[serde(rename = "is3D")]
    pub is_3d: bool,
    /// Nesting depth, `0` for top-level steps
    pub depth: usize,
    /// Child steps in weight order
    pub children: Vec<StoryStepNode>,
}

impl StoryStepNode {
    /// Leaf node with only identity and title set
    pub fn new(id: StepId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            title_image: None,
            title_image_alt: None,
            content_ref: None,
            visible_layer_ids: Vec::new(),
            active_tool: None,
            viewpoint: None,
            is_3d: false,
            depth: 0,
            children: Vec::new(),
        }
    }

    /// Visit this node and all descendants, depth first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a StoryStepNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Tree builder input: a node and its parent reference
#[derive(Debug, Clone, PartialEq)]
pub struct FlatStep {
    /// Parent step, `None` for top-level steps
    pub parent: Option<StepId>,
    /// Node payload; `depth` and `children` are set by the builder
    pub node: StoryStepNode,
}

impl FlatStep {
    /// Create builder input
    #[inline]
    #[must_use]
    pub fn new(parent: Option<StepId>, node: StoryStepNode) -> Self {
        Self { parent, node }
    }
}

struct ArenaNode {
    node: StoryStepNode,
    children: Vec<usize>,
}

/// Build the step forest from a weight-ordered flat list
///
/// A step becomes a root when it has no parent; otherwise its parent must
/// appear earlier in `steps`. Sibling order is input order.
///
/// # Errors
/// - [`StoryError::OrphanedNode`] when a parent was not seen before its child
/// - [`StoryError::DuplicateStep`] when an id repeats
pub fn build_tree(steps: Vec<FlatStep>) -> StoryResult<Vec<StoryStepNode>> {
    let mut arena: Vec<Option<ArenaNode>> = Vec::with_capacity(steps.len());
    let mut by_id: HashMap<StepId, usize> = HashMap::with_capacity(steps.len());
    let mut depths: Vec<usize> = Vec::with_capacity(steps.len());
    let mut roots = Vec::new();

    for FlatStep { parent, mut node } in steps {
        let index = arena.len();
        if by_id.contains_key(&node.id) {
            return Err(StoryError::DuplicateStep { step: node.id });
        }

        let depth = match parent {
            None => {
                roots.push(index);
                0
            }
            Some(parent) => {
                let parent_index = *by_id.get(&parent).ok_or(StoryError::OrphanedNode {
                    step: node.id,
                    parent,
                })?;
                if let Some(parent_node) = arena[parent_index].as_mut() {
                    parent_node.children.push(index);
                }
                depths[parent_index] + 1
            }
        };

        node.depth = depth;
        node.children.clear();
        by_id.insert(node.id, index);
        depths.push(depth);
        arena.push(Some(ArenaNode {
            node,
            children: Vec::new(),
        }));
    }

    Ok(roots
        .into_iter()
        .filter_map(|root| fold(&mut arena, root))
        .collect())
}

fn fold(arena: &mut [Option<ArenaNode>], index: usize) -> Option<StoryStepNode> {
    let ArenaNode { mut node, children } = arena.get_mut(index)?.take()?;
    node.children = children
        .into_iter()
        .filter_map(|child| fold(arena, child))
        .collect();
    Some(node)
}
