//! # Category Arena
//!
//! The storefront's category tree, loaded into a flat map keyed by id.
//! Parent and children are stored as ids; nothing holds a reference into
//! another node, so moves are plain list edits.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Exactly one root (parent = none); every node reaches it             │
//! │  2. Sibling ordinals are dense: 0, 1, 2, … n-1                          │
//! │  3. A node is never its own ancestor                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Move Policy
//! ```text
//!   above(ref)  → parent(ref), index(ref)
//!   below(ref)  → parent(ref), index(ref) + 1
//!   append(ref) → ref itself,  last
//!   ref < 1     → the given parent id (root when < 1), first for above/below
//!
//!   1. detach from the old sibling list, resequence it
//!   2. splice into the new sibling list, reparent
//!   3. resequence the new sibling list
//! ```
//!
//! Changes are tracked against the placements the tree was loaded with;
//! [`CategoryTree::dirty_placements`] yields exactly the rows to write back.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Records
// =============================================================================

/// A category row as the storefront stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub position: i64,
}

/// Where a category sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: i64,
    pub parent_id: i64,
    pub position: i64,
}

/// A node in the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub position: i64,
    pub children: Vec<i64>,
}

// =============================================================================
// Actions
// =============================================================================

/// Operations accepted by `category.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryAction {
    Add,
    Delete,
    TextChange,
    Append,
    Above,
    Below,
}

impl CategoryAction {
    /// The move placement for move actions.
    pub fn placement(self) -> Option<MovePlacement> {
        match self {
            CategoryAction::Append => Some(MovePlacement::Append),
            CategoryAction::Above => Some(MovePlacement::Above),
            CategoryAction::Below => Some(MovePlacement::Below),
            _ => None,
        }
    }
}

impl FromStr for CategoryAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(CategoryAction::Add),
            "delete" => Ok(CategoryAction::Delete),
            "textchange" => Ok(CategoryAction::TextChange),
            "append" => Ok(CategoryAction::Append),
            "above" => Ok(CategoryAction::Above),
            "below" => Ok(CategoryAction::Below),
            _ => Err(ValidationError::UnknownCategoryAction(s.to_string())),
        }
    }
}

/// Position relative to a reference category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePlacement {
    Above,
    Below,
    Append,
}

// =============================================================================
// Tree
// =============================================================================

/// The category tree of one storefront.
#[derive(Debug, Clone)]
pub struct CategoryTree {
    root: i64,
    nodes: HashMap<i64, CategoryNode>,
    stored: HashMap<i64, (Option<i64>, i64)>,
}

impl CategoryTree {
    /// Builds the arena from storefront rows.
    ///
    /// Rows whose parent is unknown, or that cannot reach the root, hang
    /// under the root. Siblings are ordered by stored position, ties by id,
    /// and renumbered densely.
    pub fn build(records: impl IntoIterator<Item = CategoryRecord>) -> CoreResult<Self> {
        let records: Vec<CategoryRecord> = records.into_iter().collect();

        let roots: Vec<i64> = records
            .iter()
            .filter(|r| r.parent_id.is_none())
            .map(|r| r.id)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(CoreError::conflict("No Root found!")),
            [root] => *root,
            _ => return Err(CoreError::conflict("Multiple Roots found! Not allowed")),
        };

        let stored = records
            .iter()
            .map(|r| (r.id, (r.parent_id, r.position)))
            .collect();
        let mut nodes: HashMap<i64, CategoryNode> = records
            .into_iter()
            .map(|r| {
                let node = CategoryNode {
                    id: r.id,
                    parent_id: r.parent_id,
                    name: r.name,
                    position: r.position,
                    children: Vec::new(),
                };
                (r.id, node)
            })
            .collect();

        // unknown parents hang under the root
        let ids: Vec<i64> = nodes.keys().copied().collect();
        for id in &ids {
            if *id == root {
                continue;
            }
            let parent = nodes[id].parent_id.unwrap_or(root);
            let parent = if nodes.contains_key(&parent) && parent != *id { parent } else { root };
            if let Some(node) = nodes.get_mut(id) {
                node.parent_id = Some(parent);
            }
        }

        let mut tree = CategoryTree { root, nodes, stored };
        tree.link_children();

        // cycles detached from the root are re-hung under it
        let reachable: HashSet<i64> = tree.subtree(root).into_iter().collect();
        let mut stranded: Vec<i64> = ids.into_iter().filter(|id| !reachable.contains(id)).collect();
        if !stranded.is_empty() {
            stranded.sort_unstable();
            for id in &stranded {
                if let Some(node) = tree.nodes.get_mut(id) {
                    node.parent_id = Some(root);
                }
            }
            tree.link_children();
        }

        Ok(tree)
    }

    fn link_children(&mut self) {
        let mut by_parent: HashMap<i64, Vec<(i64, i64)>> = HashMap::new();
        for node in self.nodes.values() {
            if let Some(parent) = node.parent_id {
                by_parent.entry(parent).or_default().push((node.position, node.id));
            }
        }
        for node in self.nodes.values_mut() {
            node.children.clear();
        }
        for (parent, mut children) in by_parent {
            children.sort_unstable();
            let ordered: Vec<i64> = children.into_iter().map(|(_, id)| id).collect();
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children = ordered;
            }
            self.resequence(parent);
        }
    }

    fn resequence(&mut self, parent: i64) {
        let children = match self.nodes.get(&parent) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for (i, child) in children.into_iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.position = i as i64;
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn root(&self) -> i64 {
        self.root
    }

    pub fn get(&self, id: i64) -> Option<&CategoryNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: i64) -> &[i64] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Depth below the root (root = 0).
    pub fn level(&self, id: i64) -> Option<usize> {
        let mut level = 0;
        let mut current = self.nodes.get(&id)?;
        while let Some(parent) = current.parent_id {
            level += 1;
            current = self.nodes.get(&parent)?;
        }
        Some(level)
    }

    /// True when `ancestor` lies on the path from `id` up to the root.
    pub fn is_descendant(&self, id: i64, ancestor: i64) -> bool {
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(&parent).and_then(|n| n.parent_id);
        }
        false
    }

    /// `id` and everything below it, breadth first.
    pub fn subtree(&self, id: i64) -> Vec<i64> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([id]);
        let mut seen = HashSet::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) || !self.nodes.contains_key(&current) {
                continue;
            }
            out.push(current);
            queue.extend(self.children(current).iter().copied());
        }
        out
    }

    /// Every node below the root in display order (parents before children,
    /// siblings by ordinal).
    pub fn depth_first(&self) -> Vec<i64> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<i64> = self.children(self.root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Placements that differ from what the tree was loaded with.
    pub fn dirty_placements(&self) -> Vec<Placement> {
        let mut dirty: Vec<Placement> = self
            .nodes
            .values()
            .filter_map(|node| {
                let parent = node.parent_id?;
                let unchanged = self.stored.get(&node.id)
                    == Some(&(Some(parent), node.position));
                (!unchanged).then_some(Placement {
                    id: node.id,
                    parent_id: parent,
                    position: node.position,
                })
            })
            .collect();
        dirty.sort_by_key(|p| (p.parent_id, p.position));
        dirty
    }

    /// Records the current placements as persisted.
    pub fn mark_clean(&mut self) {
        self.stored = self
            .nodes
            .values()
            .map(|n| (n.id, (n.parent_id, n.position)))
            .collect();
    }

    /// Checks all structural invariants.
    pub fn is_consistent(&self) -> bool {
        let reachable = self.subtree(self.root);
        if reachable.len() != self.nodes.len() {
            return false;
        }
        self.nodes.values().all(|node| {
            let dense = node
                .children
                .iter()
                .enumerate()
                .all(|(i, c)| self.nodes.get(c).map(|n| n.position) == Some(i as i64));
            let linked = node
                .children
                .iter()
                .all(|c| self.nodes.get(c).and_then(|n| n.parent_id) == Some(node.id));
            dense && linked
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds a new category as the last child of `parent`.
    pub fn insert(&mut self, id: i64, parent: i64, name: impl Into<String>) -> CoreResult<Placement> {
        if self.nodes.contains_key(&id) {
            return Err(CoreError::conflict(format!("category {id} already exists")));
        }
        let siblings = self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| CoreError::not_found("category", parent))?;
        siblings.children.push(id);
        let position = siblings.children.len() as i64 - 1;

        self.nodes.insert(
            id,
            CategoryNode {
                id,
                parent_id: Some(parent),
                name: name.into(),
                position,
                children: Vec::new(),
            },
        );
        self.stored.insert(id, (Some(parent), position));
        Ok(Placement { id, parent_id: parent, position })
    }

    pub fn rename(&mut self, id: i64, name: impl Into<String>) -> CoreResult<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("category", id))?;
        node.name = name.into();
        Ok(())
    }

    /// Removes `id` with its subtree and closes the gap it leaves.
    ///
    /// Returns the removed ids.
    pub fn remove(&mut self, id: i64) -> CoreResult<Vec<i64>> {
        if id == self.root {
            return Err(CoreError::conflict("cannot delete the root category"));
        }
        let parent = self
            .nodes
            .get(&id)
            .ok_or_else(|| CoreError::not_found("category", id))?
            .parent_id
            .unwrap_or(self.root);

        let removed = self.subtree(id);
        for gone in &removed {
            self.nodes.remove(gone);
            self.stored.remove(gone);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|c| *c != id);
        }
        self.resequence(parent);
        Ok(removed)
    }

    /// Moves `id` relative to `reference`.
    ///
    /// `parent_hint` is used for append without a reference, and for
    /// above/below without a reference (placed first under it).
    pub fn move_node(
        &mut self,
        id: i64,
        placement: MovePlacement,
        reference: i64,
        parent_hint: i64,
    ) -> CoreResult<Vec<Placement>> {
        if !self.nodes.contains_key(&id) {
            return Err(CoreError::not_found("category", id));
        }
        if id == self.root {
            return Err(CoreError::conflict("cannot move the root category"));
        }
        let hinted_parent = if parent_hint < 1 { self.root } else { parent_hint };

        let (target, anchor) = if reference < 1 {
            match placement {
                MovePlacement::Append => (hinted_parent, None),
                MovePlacement::Above | MovePlacement::Below => (hinted_parent, Some(0)),
            }
        } else {
            if reference == id {
                return Err(CoreError::conflict(format!(
                    "cannot move category {id} relative to itself"
                )));
            }
            let reference_node = self
                .nodes
                .get(&reference)
                .ok_or_else(|| CoreError::not_found("category", reference))?;
            match placement {
                MovePlacement::Append => (reference, None),
                MovePlacement::Above | MovePlacement::Below => match reference_node.parent_id {
                    Some(parent) => (parent, None),
                    None => {
                        return Err(CoreError::conflict(
                            "cannot place a category next to the root",
                        ))
                    }
                },
            }
        };

        if !self.nodes.contains_key(&target) {
            return Err(CoreError::not_found("category", target));
        }
        if target == id || self.is_descendant(target, id) {
            return Err(CoreError::conflict(format!(
                "cannot move category {id} below its own subtree"
            )));
        }

        // 1. detach
        let old_parent = self.nodes[&id].parent_id.unwrap_or(self.root);
        if let Some(node) = self.nodes.get_mut(&old_parent) {
            node.children.retain(|c| *c != id);
        }
        self.resequence(old_parent);

        // 2. splice + reparent
        let siblings = &self.nodes[&target].children;
        let index = match (anchor, placement) {
            (Some(first), _) => first,
            (None, MovePlacement::Append) => siblings.len(),
            (None, MovePlacement::Above) => siblings
                .iter()
                .position(|c| *c == reference)
                .unwrap_or(0),
            (None, MovePlacement::Below) => siblings
                .iter()
                .position(|c| *c == reference)
                .map(|i| i + 1)
                .unwrap_or(siblings.len()),
        };
        if let Some(node) = self.nodes.get_mut(&target) {
            let index = index.min(node.children.len());
            node.children.insert(index, id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent_id = Some(target);
        }

        // 3. resequence
        self.resequence(target);

        Ok(self.dirty_placements())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, parent: Option<i64>, position: i64) -> CategoryRecord {
        CategoryRecord { id, parent_id: parent, name: format!("cat-{id}"), position }
    }

    /// ```text
    /// 1
    /// ├── 2
    /// │   ├── 4
    /// │   └── 5
    /// └── 3
    /// ```
    fn sample() -> CategoryTree {
        CategoryTree::build(vec![
            record(1, None, 0),
            record(2, Some(1), 0),
            record(3, Some(1), 1),
            record(4, Some(2), 0),
            record(5, Some(2), 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_rejects_missing_and_multiple_roots() {
        let none = CategoryTree::build(vec![record(2, Some(1), 0)]).unwrap_err();
        assert_eq!(none.to_string(), "No Root found!");

        let many = CategoryTree::build(vec![record(1, None, 0), record(2, None, 0)]).unwrap_err();
        assert_eq!(many.to_string(), "Multiple Roots found! Not allowed");
    }

    #[test]
    fn test_build_orders_by_position_then_id_and_densifies() {
        let tree = CategoryTree::build(vec![
            record(1, None, 0),
            record(9, Some(1), 5),
            record(7, Some(1), 5),
            record(8, Some(1), 2),
        ])
        .unwrap();
        assert_eq!(tree.children(1), &[8, 7, 9]);
        assert_eq!(tree.get(9).unwrap().position, 2);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_orphans_and_cycles_hang_under_root() {
        let tree = CategoryTree::build(vec![
            record(1, None, 0),
            record(2, Some(99), 0),
            record(3, Some(4), 0),
            record(4, Some(3), 0),
        ])
        .unwrap();
        assert_eq!(tree.get(2).unwrap().parent_id, Some(1));
        assert!(tree.is_consistent());
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_move_above_and_below_reference() {
        let mut tree = sample();
        tree.move_node(3, MovePlacement::Above, 5, 0).unwrap();
        assert_eq!(tree.children(2), &[4, 3, 5]);
        assert_eq!(tree.children(1), &[2]);

        tree.move_node(4, MovePlacement::Below, 5, 0).unwrap();
        assert_eq!(tree.children(2), &[3, 5, 4]);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_move_append_targets_reference() {
        let mut tree = sample();
        let dirty = tree.move_node(5, MovePlacement::Append, 3, 0).unwrap();
        assert_eq!(tree.children(3), &[5]);
        assert_eq!(tree.level(5), Some(2));
        assert!(dirty.contains(&Placement { id: 5, parent_id: 3, position: 0 }));
    }

    #[test]
    fn test_move_without_reference_uses_parent_hint() {
        let mut tree = sample();
        tree.move_node(5, MovePlacement::Below, 0, 1).unwrap();
        assert_eq!(tree.children(1), &[5, 2, 3]);

        tree.move_node(4, MovePlacement::Append, 0, 3).unwrap();
        assert_eq!(tree.children(3), &[4]);
    }

    #[test]
    fn test_move_into_own_subtree_is_conflict() {
        let mut tree = sample();
        let err = tree.move_node(2, MovePlacement::Append, 4, 0).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let err = tree.move_node(2, MovePlacement::Above, 2, 0).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let err = tree.move_node(1, MovePlacement::Append, 3, 0).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        // failed moves leave the tree untouched
        assert_eq!(tree.children(2), &[4, 5]);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_ordinals_stay_dense_after_move_sequence() {
        let mut tree = sample();
        let moves = [
            (4, MovePlacement::Append, 3),
            (5, MovePlacement::Above, 2),
            (2, MovePlacement::Below, 3),
            (4, MovePlacement::Above, 5),
            (3, MovePlacement::Append, 2),
            (5, MovePlacement::Below, 3),
        ];
        for (id, placement, reference) in moves {
            tree.move_node(id, placement, reference, 0).unwrap();
            assert!(tree.is_consistent(), "after moving {id}");
        }
    }

    #[test]
    fn test_dirty_placements_reset_after_mark_clean() {
        let mut tree = sample();
        assert!(tree.dirty_placements().is_empty());
        tree.move_node(3, MovePlacement::Above, 2, 0).unwrap();
        let dirty = tree.dirty_placements();
        assert_eq!(dirty.len(), 2);
        tree.mark_clean();
        assert!(tree.dirty_placements().is_empty());
    }

    #[test]
    fn test_remove_closes_gap() {
        let mut tree = sample();
        let removed = tree.remove(2).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(tree.children(1), &[3]);
        assert_eq!(tree.get(3).unwrap().position, 0);
        assert!(tree.remove(1).is_err());
    }

    #[test]
    fn test_depth_first_order() {
        let tree = sample();
        assert_eq!(tree.depth_first(), vec![2, 4, 5, 3]);
    }

    #[test]
    fn test_action_parsing_is_case_insensitive() {
        assert_eq!("TextChange".parse::<CategoryAction>().unwrap(), CategoryAction::TextChange);
        assert_eq!("APPEND".parse::<CategoryAction>().unwrap(), CategoryAction::Append);
        let err = "jump".parse::<CategoryAction>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown category action given: jump");
    }
}
