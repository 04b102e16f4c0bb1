//! Flat records to forest.
//!
//! The builder never sorts: siblings keep the order in which they appear in
//! the input, so callers sort the flat list first (see
//! [`sort_records`](super::projection::sort_records)).

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::features::categories::models::{Category, CategoryNode};

/// Build a forest from an unordered, flat collection of categories.
///
/// A record whose `parent_id` does not resolve (or points at itself) becomes
/// an orphan root. Records that sit on a parent loop are unreachable from any
/// root; the first loop member in input order is promoted to a root so that
/// every input record appears exactly once in the output.
pub fn build_forest(records: &[Category]) -> Vec<CategoryNode> {
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        index.entry(record.id).or_insert(i);
    }

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut roots: Vec<usize> = Vec::new();

    for (i, record) in records.iter().enumerate() {
        match record
            .parent_id
            .filter(|parent_id| *parent_id != record.id)
            .and_then(|parent_id| index.get(&parent_id))
        {
            Some(&parent) => children_of[parent].push(i),
            None => roots.push(i),
        }
    }

    let mut placed = vec![false; records.len()];
    let mut forest: Vec<CategoryNode> = Vec::with_capacity(roots.len());
    for root in roots {
        assemble(root, records, &children_of, &mut placed, &mut forest);
    }

    // Anything still unplaced hangs off a parent loop.
    for start in 0..records.len() {
        if placed[start] {
            continue;
        }
        let entry = loop_entry(start, records, &index, &placed);
        assemble(entry, records, &children_of, &mut placed, &mut forest);
    }

    forest
}

enum Step {
    Enter { i: usize, level: u32 },
    /// Children of `i` are everything pushed to the output after `mark`
    Exit { i: usize, level: u32, mark: usize },
}

/// Build the subtree under `root` and push it onto `out`.
///
/// Post-order over an explicit stack, so chain depth is bounded by the heap
/// rather than the thread stack.
fn assemble(
    root: usize,
    records: &[Category],
    children_of: &[Vec<usize>],
    placed: &mut [bool],
    out: &mut Vec<CategoryNode>,
) {
    let mut steps = vec![Step::Enter { i: root, level: 0 }];

    while let Some(step) = steps.pop() {
        match step {
            Step::Enter { i, level } => {
                if placed[i] {
                    continue;
                }
                placed[i] = true;
                steps.push(Step::Exit {
                    i,
                    level,
                    mark: out.len(),
                });
                for &child in children_of[i].iter().rev() {
                    if !placed[child] {
                        steps.push(Step::Enter {
                            i: child,
                            level: level + 1,
                        });
                    }
                }
            }
            Step::Exit { i, level, mark } => {
                let children = out.split_off(mark);
                out.push(CategoryNode {
                    category: records[i].clone(),
                    level,
                    children,
                });
            }
        }
    }
}

/// Walk parent links from `start` until a record repeats, then return the
/// loop member with the lowest input position.
fn loop_entry(
    start: usize,
    records: &[Category],
    index: &HashMap<Uuid, usize>,
    placed: &[bool],
) -> usize {
    let mut path: Vec<usize> = Vec::new();
    let mut seen: HashMap<usize, usize> = HashMap::new();
    let mut current = start;

    loop {
        if let Some(&position) = seen.get(&current) {
            return path[position..]
                .iter()
                .copied()
                .min()
                .unwrap_or(start);
        }
        seen.insert(current, path.len());
        path.push(current);

        match records[current]
            .parent_id
            .and_then(|parent_id| index.get(&parent_id).copied())
        {
            // unplaced records always have an unplaced, resolvable parent
            Some(parent) if !placed[parent] => current = parent,
            _ => return current,
        }
    }
}

/// Depth-first, pre-order listing of every node in the forest
pub fn flatten(forest: &[CategoryNode]) -> Vec<&CategoryNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&CategoryNode> = forest.iter().rev().collect();

    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(node.children.iter().rev());
    }

    out
}

/// Ids of every descendant of `id` in the given records, nearest first.
///
/// Walks the child index downward from `id`; the result never contains `id`
/// itself, even if the stored data already holds a loop through it.
pub fn descendant_ids(records: &[Category], id: Uuid) -> Vec<Uuid> {
    let mut children_of: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for record in records {
        if let Some(parent_id) = record.parent_id {
            children_of.entry(parent_id).or_default().push(record.id);
        }
    }

    let mut seen: HashSet<Uuid> = HashSet::from([id]);
    let mut queue: VecDeque<Uuid> = VecDeque::from([id]);
    let mut out = Vec::new();

    while let Some(current) = queue.pop_front() {
        for &child in children_of.get(&current).into_iter().flatten() {
            if seen.insert(child) {
                out.push(child);
                queue.push_back(child);
            }
        }
    }

    out
}

/// Number of ancestors above `id` (0 for a root).
///
/// Stops at a dangling parent or at the first repeated id, so looping
/// stored data still yields a finite answer.
pub fn ancestor_count(records: &[Category], id: Uuid) -> u32 {
    let parents: HashMap<Uuid, Option<Uuid>> =
        records.iter().map(|c| (c.id, c.parent_id)).collect();

    let mut seen: HashSet<Uuid> = HashSet::from([id]);
    let mut count = 0;
    let mut cursor = parents.get(&id).copied().flatten();

    while let Some(parent_id) = cursor {
        if !parents.contains_key(&parent_id) || !seen.insert(parent_id) {
            break;
        }
        count += 1;
        cursor = parents.get(&parent_id).copied().flatten();
    }

    count
}

/// Levels below `id` in its subtree (0 for a leaf)
pub fn subtree_height(records: &[Category], id: Uuid) -> u32 {
    let mut children_of: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for record in records {
        if let Some(parent_id) = record.parent_id {
            children_of.entry(parent_id).or_default().push(record.id);
        }
    }

    let mut seen: HashSet<Uuid> = HashSet::from([id]);
    let mut frontier = vec![id];
    let mut height = 0;

    loop {
        let next: Vec<Uuid> = frontier
            .iter()
            .flat_map(|current| children_of.get(current).into_iter().flatten())
            .copied()
            .filter(|child| seen.insert(*child))
            .collect();
        if next.is_empty() {
            return height;
        }
        height += 1;
        frontier = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::categories::tree::test_support::{category, ids_of};

    #[test]
    fn test_builds_root_child_grandchild() {
        let root = category("Root", None);
        let child = category("Child", Some(root.id));
        let grandchild = category("Grandchild", Some(child.id));

        let forest = build_forest(&[grandchild.clone(), root.clone(), child.clone()]);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id(), root.id);
        assert_eq!(forest[0].level, 0);
        assert_eq!(forest[0].children[0].id(), child.id);
        assert_eq!(forest[0].children[0].level, 1);
        assert_eq!(forest[0].children[0].children[0].id(), grandchild.id);
        assert_eq!(forest[0].children[0].children[0].level, 2);
    }

    #[test]
    fn test_sibling_order_follows_input_order() {
        let root = category("Root", None);
        let b = category("B", Some(root.id));
        let a = category("A", Some(root.id));
        let c = category("C", Some(root.id));

        let forest = build_forest(&[root.clone(), b.clone(), a.clone(), c.clone()]);
        let order: Vec<Uuid> = forest[0].children.iter().map(CategoryNode::id).collect();

        assert_eq!(order, vec![b.id, a.id, c.id]);
    }

    #[test]
    fn test_dangling_parent_becomes_orphan_root() {
        let root = category("Root", None);
        let orphan = category("Orphan", Some(Uuid::now_v7()));
        let orphan_child = category("Orphan child", Some(orphan.id));

        let forest = build_forest(&[root.clone(), orphan.clone(), orphan_child.clone()]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[1].id(), orphan.id);
        assert_eq!(forest[1].level, 0);
        assert_eq!(forest[1].children[0].level, 1);
    }

    #[test]
    fn test_self_parent_becomes_root() {
        let mut looped = category("Self", None);
        looped.parent_id = Some(looped.id);

        let forest = build_forest(&[looped.clone()]);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id(), looped.id);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn test_stored_loop_is_broken_at_first_member() {
        let mut a = category("A", None);
        let b = category("B", Some(a.id));
        let c = category("C", Some(b.id));
        a.parent_id = Some(c.id);
        let hanging = category("Hanging", Some(b.id));

        let records = vec![hanging.clone(), b.clone(), a.clone(), c.clone()];
        let forest = build_forest(&records);

        // b is the first loop member in input order
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id(), b.id);
        assert_eq!(ids_of(&forest), ids_of_records(&records));
    }

    #[test]
    fn test_round_trip_preserves_ids_and_levels() {
        let root = category("Root", None);
        let left = category("Left", Some(root.id));
        let right = category("Right", Some(root.id));
        let deep = category("Deep", Some(left.id));
        let other = category("Other root", None);
        let records = vec![deep, right, other, left, root];

        let forest = build_forest(&records);
        let flat = flatten(&forest);

        assert_eq!(flat.len(), records.len());
        assert_eq!(ids_of(&forest), ids_of_records(&records));

        let by_id: HashMap<Uuid, &Category> = records.iter().map(|c| (c.id, c)).collect();
        for node in flat {
            let mut ancestors = 0;
            let mut cursor = node.category.parent_id;
            while let Some(parent_id) = cursor {
                ancestors += 1;
                cursor = by_id[&parent_id].parent_id;
            }
            assert_eq!(node.level, ancestors, "level of {}", node.category.name);
        }
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let root = category("Root", None);
        let child = category("Child", Some(root.id));
        let records = vec![child, root];

        assert_eq!(build_forest(&records), build_forest(&records));
    }

    #[test]
    fn test_flatten_is_preorder() {
        let root = category("Root", None);
        let a = category("A", Some(root.id));
        let a1 = category("A1", Some(a.id));
        let b = category("B", Some(root.id));

        let forest = build_forest(&[root.clone(), a.clone(), b.clone(), a1.clone()]);
        let order: Vec<Uuid> = flatten(&forest).iter().map(|n| n.id()).collect();

        assert_eq!(order, vec![root.id, a.id, a1.id, b.id]);
    }

    #[test]
    fn test_descendant_ids() {
        let root = category("Root", None);
        let child = category("Child", Some(root.id));
        let grandchild = category("Grandchild", Some(child.id));
        let sibling = category("Sibling", None);
        let records = vec![root.clone(), child.clone(), grandchild.clone(), sibling];

        assert_eq!(descendant_ids(&records, root.id), vec![child.id, grandchild.id]);
        assert_eq!(descendant_ids(&records, child.id), vec![grandchild.id]);
        assert!(descendant_ids(&records, grandchild.id).is_empty());
    }

    /// Parent chain of `len` records, root first
    fn chain(len: usize) -> Vec<Category> {
        let mut records: Vec<Category> = Vec::with_capacity(len);
        for i in 0..len {
            let parent = records.last().map(|c| c.id);
            records.push(category(&format!("Level {}", i), parent));
        }
        records
    }

    #[test]
    fn test_deep_chain_builds_without_recursion() {
        let mut records = chain(50_000);
        // leaf first so every parent is resolved out of order
        records.reverse();

        let forest = build_forest(&records);
        let flat = flatten(&forest);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].subtree_len(), 50_000);
        assert_eq!(flat.len(), 50_000);
        assert_eq!(flat[49_999].level, 49_999);
        assert_eq!(flat[49_999].id(), records[0].id);
    }

    #[test]
    fn test_deep_loop_is_still_broken() {
        let mut records = chain(20_000);
        let last = records[19_999].id;
        records[0].parent_id = Some(last);

        let forest = build_forest(&records);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id(), records[0].id);
        assert_eq!(forest[0].subtree_len(), 20_000);
    }

    #[test]
    fn test_ancestor_count_and_subtree_height() {
        let records = chain(5);
        let ids: Vec<Uuid> = records.iter().map(|c| c.id).collect();

        assert_eq!(ancestor_count(&records, ids[0]), 0);
        assert_eq!(ancestor_count(&records, ids[4]), 4);
        assert_eq!(subtree_height(&records, ids[0]), 4);
        assert_eq!(subtree_height(&records, ids[3]), 1);
        assert_eq!(subtree_height(&records, ids[4]), 0);
    }

    #[test]
    fn test_ancestor_count_stops_on_loops_and_dangling_parents() {
        let mut a = category("A", None);
        let b = category("B", Some(a.id));
        a.parent_id = Some(b.id);
        let orphan = category("Orphan", Some(Uuid::now_v7()));
        let records = vec![a.clone(), b.clone(), orphan.clone()];

        assert_eq!(ancestor_count(&records, a.id), 1);
        assert_eq!(ancestor_count(&records, orphan.id), 0);
        assert_eq!(subtree_height(&records, a.id), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_forest(&[]).is_empty());
    }

    fn ids_of_records(records: &[Category]) -> HashSet<Uuid> {
        records.iter().map(|c| c.id).collect()
    }
}
