//! Tree matching: evaluating a compiled selector against a live UI tree, plus
//! the legacy view-id/text/bounds searches used as rule fallbacks.
//!
//! UI trees can exceed hundreds of levels, so every walk whose depth scales
//! with the tree (the outer scan, any-descendant resolution, the legacy
//! searches) uses an explicit stack. The only recursion is `match_chain`,
//! bounded by the selector chain length.

use crate::types::{Bounds, Relationship, Selector, UiNode, Unit};

/// Find the first node matching `selector` under `root`, in DFS pre-order
/// with children visited in original order.
///
/// Absence of a match is a normal outcome, never an error. The returned node
/// is the one bound to the selector's target unit.
#[must_use]
pub fn find<N: UiNode>(selector: &Selector, root: &N) -> Option<N> {
    if selector.units.is_empty() {
        return None;
    }

    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        let mut bound: Vec<Option<N>> = vec![None; selector.units.len()];
        if match_chain(selector, &node, 0, &mut bound) {
            return bound.into_iter().nth(selector.target).flatten();
        }
        push_children(&node, &mut stack);
    }
    None
}

/// Push children in reverse so the stack pops them in original order.
fn push_children<N: UiNode>(node: &N, stack: &mut Vec<N>) {
    for i in (0..node.child_count()).rev() {
        if let Some(child) = node.child(i) {
            stack.push(child);
        }
    }
}

/// Try to match `units[index..]` with `node` bound to `units[index]`.
///
/// Recursion depth is bounded by the remaining chain length (selectors are
/// typically under ten units), not by the tree.
fn match_chain<N: UiNode>(
    selector: &Selector,
    node: &N,
    index: usize,
    bound: &mut Vec<Option<N>>,
) -> bool {
    let unit = &selector.units[index];
    if !unit_matches(node, unit) {
        return false;
    }
    bound[index] = Some(node.clone());
    if index == selector.units.len() - 1 {
        return true;
    }

    let next = index + 1;
    match selector.relationships[index] {
        Relationship::Child => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    if match_chain(selector, &child, next, bound) {
                        return true;
                    }
                }
            }
            false
        }
        Relationship::AnyDescendant => {
            let mut stack = Vec::new();
            push_children(node, &mut stack);
            while let Some(current) = stack.pop() {
                if match_chain(selector, &current, next, bound) {
                    return true;
                }
                push_children(&current, &mut stack);
            }
            false
        }
        Relationship::Parent => node
            .parent()
            .is_some_and(|parent| match_chain(selector, &parent, next, bound)),
        Relationship::AnyAncestor => {
            let mut current = node.parent();
            while let Some(ancestor) = current {
                if match_chain(selector, &ancestor, next, bound) {
                    return true;
                }
                current = ancestor.parent();
            }
            false
        }
        Relationship::NextSibling => sibling_at(node, 1)
            .is_some_and(|sibling| match_chain(selector, &sibling, next, bound)),
        Relationship::PrevSibling => sibling_at(node, -1)
            .is_some_and(|sibling| match_chain(selector, &sibling, next, bound)),
        Relationship::OtherSibling => {
            let Some(parent) = node.parent() else {
                return false;
            };
            for i in 0..parent.child_count() {
                if let Some(sibling) = parent.child(i) {
                    if sibling.same_node(node) {
                        continue;
                    }
                    if match_chain(selector, &sibling, next, bound) {
                        return true;
                    }
                }
            }
            false
        }
    }
}

/// The sibling `offset` positions away among the parent's children, if any.
fn sibling_at<N: UiNode>(node: &N, offset: isize) -> Option<N> {
    let parent = node.parent()?;
    for i in 0..parent.child_count() {
        let child = parent.child(i)?;
        if child.same_node(node) {
            let target = isize::try_from(i).ok()? + offset;
            let target = usize::try_from(target).ok()?;
            return parent.child(target);
        }
    }
    None
}

fn unit_matches<N: UiNode>(node: &N, unit: &Unit) -> bool {
    if let Some(filter) = &unit.class_filter {
        // Nodes with a missing or blank class name pass the filter.
        if let Some(class) = node.class_name() {
            if !class.trim().is_empty()
                && !class.to_lowercase().contains(&filter.to_lowercase())
            {
                return false;
            }
        }
    }
    unit.condition.as_ref().is_none_or(|tree| tree.eval(node))
}

/// Exact lookup by fully-qualified view id, DFS pre-order.
#[must_use]
pub fn find_by_view_id<N: UiNode>(root: &N, view_id: &str) -> Option<N> {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if node.view_id().as_deref() == Some(view_id) {
            return Some(node);
        }
        push_children(&node, &mut stack);
    }
    None
}

/// Case-insensitive substring search over text, falling back to the content
/// description, DFS pre-order.
#[must_use]
pub fn find_by_text<N: UiNode>(root: &N, needle: &str) -> Option<N> {
    let needle = needle.to_lowercase();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        let label = node.text().or_else(|| node.description());
        if let Some(label) = label {
            if label.to_lowercase().contains(&needle) {
                return Some(node);
            }
        }
        push_children(&node, &mut stack);
    }
    None
}

/// Bounding-box search with a per-edge pixel tolerance, DFS pre-order.
#[must_use]
pub fn find_by_bounds<N: UiNode>(root: &N, target: Bounds, tolerance: i32) -> Option<N> {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if node.bounds().within_tolerance(&target, tolerance) {
            return Some(node);
        }
        push_children(&node, &mut stack);
    }
    None
}
