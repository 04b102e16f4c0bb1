//! Read-side transformations over a built forest.
//!
//! Nothing here touches the repository. Filter, search, sort and expansion
//! state are all passed in explicitly through [`TreeFilters`].

use std::cmp::Ordering;
use std::collections::HashSet;

use uuid::Uuid;

use crate::features::categories::dtos::{
    CategoryTreeDto, RenderedTreeDto, SortDirection, SortKey,
};
use crate::features::categories::models::{Category, CategoryNode};
use crate::features::categories::tree::builder::build_forest;
use crate::shared::constants::MAX_CATEGORY_DEPTH;

/// View parameters for rendering the category tree
#[derive(Debug, Clone, Default)]
pub struct TreeFilters {
    /// Keep inactive categories (and their subtrees) in the output
    pub include_inactive: bool,
    /// Subtree-inclusive, case-insensitive search
    pub search: Option<String>,
    pub sort: SortKey,
    pub direction: SortDirection,
    /// Nodes whose children are rendered; `None` renders every level
    pub expanded: Option<HashSet<Uuid>>,
}

/// Stable sort of the flat collection; ties keep their incoming order
pub fn sort_records(records: &mut [Category], key: SortKey, direction: SortDirection) {
    records.sort_by(|a, b| {
        let ordering = compare(a, b, key);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn compare(a: &Category, b: &Category, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
        SortKey::SortOrder => a.sort_order.cmp(&b.sort_order),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

enum Rebuild {
    Enter(CategoryNode),
    /// Children of the node are everything pushed to the output after `mark`
    Exit(CategoryNode, usize),
}

/// Drop inactive nodes. An inactive node takes its whole subtree with it.
pub fn filter_active(forest: Vec<CategoryNode>) -> Vec<CategoryNode> {
    let mut steps: Vec<Rebuild> = forest.into_iter().rev().map(Rebuild::Enter).collect();
    let mut out: Vec<CategoryNode> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Rebuild::Enter(mut node) => {
                if !node.category.is_active {
                    continue;
                }
                let children = std::mem::take(&mut node.children);
                steps.push(Rebuild::Exit(node, out.len()));
                steps.extend(children.into_iter().rev().map(Rebuild::Enter));
            }
            Rebuild::Exit(mut node, mark) => {
                node.children = out.split_off(mark);
                out.push(node);
            }
        }
    }

    out
}

/// Keep every root whose subtree contains a match, unpruned.
///
/// A blank query keeps the forest as is.
pub fn search(forest: Vec<CategoryNode>, query: &str) -> Vec<CategoryNode> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return forest;
    }

    forest
        .into_iter()
        .filter(|root| subtree_matches(root, &needle))
        .collect()
}

fn subtree_matches(root: &CategoryNode, needle: &str) -> bool {
    let mut stack: Vec<&CategoryNode> = vec![root];
    while let Some(node) = stack.pop() {
        if node_matches(&node.category, needle) {
            return true;
        }
        stack.extend(node.children.iter());
    }
    false
}

fn node_matches(category: &Category, needle: &str) -> bool {
    category.name.to_lowercase().contains(needle)
        || category.slug.to_lowercase().contains(needle)
        || category
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
}

enum Render {
    Enter(CategoryNode),
    Exit(CategoryTreeDto, usize),
}

/// Convert to rendered nodes, descending only into expanded nodes.
///
/// Nothing below level `MAX_CATEGORY_DEPTH - 1` is rendered; a node at that
/// level is shown collapsed.
pub fn apply_expansion(
    forest: Vec<CategoryNode>,
    expanded: Option<&HashSet<Uuid>>,
) -> Vec<CategoryTreeDto> {
    let mut steps: Vec<Render> = forest.into_iter().rev().map(Render::Enter).collect();
    let mut out: Vec<CategoryTreeDto> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Render::Enter(mut node) => {
                let children = std::mem::take(&mut node.children);
                let has_children = !children.is_empty();
                let within_depth = node.level + 1 < MAX_CATEGORY_DEPTH;
                if has_children && !within_depth {
                    tracing::warn!(
                        category_id = %node.id(),
                        level = node.level,
                        "Category tree exceeds the maximum depth; rendering collapsed"
                    );
                }
                let is_expanded = has_children
                    && within_depth
                    && expanded.map_or(true, |set| set.contains(&node.id()));

                let dto = tree_dto(&mut node, has_children, is_expanded);
                if is_expanded {
                    steps.push(Render::Exit(dto, out.len()));
                    steps.extend(children.into_iter().rev().map(Render::Enter));
                } else {
                    out.push(dto);
                }
            }
            Render::Exit(mut dto, mark) => {
                dto.children = out.split_off(mark);
                out.push(dto);
            }
        }
    }

    out
}

fn tree_dto(node: &mut CategoryNode, has_children: bool, is_expanded: bool) -> CategoryTreeDto {
    let category = &mut node.category;
    CategoryTreeDto {
        id: category.id,
        parent_id: category.parent_id,
        name: std::mem::take(&mut category.name),
        slug: std::mem::take(&mut category.slug),
        description: category.description.take(),
        sort_order: category.sort_order,
        is_active: category.is_active,
        resource_count: category.resource_count,
        level: node.level,
        has_children,
        is_expanded,
        children: Vec::new(),
    }
}

/// Sort, build, filter, search and expand in one pass
pub fn render(mut records: Vec<Category>, filters: &TreeFilters) -> RenderedTreeDto {
    let total = records.len();

    sort_records(&mut records, filters.sort, filters.direction);
    let mut forest = build_forest(&records);

    if !filters.include_inactive {
        forest = filter_active(forest);
    }
    if let Some(ref query) = filters.search {
        forest = search(forest, query);
    }

    let visible = forest.iter().map(CategoryNode::subtree_len).sum();

    RenderedTreeDto {
        roots: apply_expansion(forest, filters.expanded.as_ref()),
        total,
        visible,
    }
}
