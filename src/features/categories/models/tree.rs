use uuid::Uuid;

use crate::features::categories::models::Category;

/// A category placed in the built forest.
///
/// The node owns its children; the whole structure is a projection of the
/// flat records and is rebuilt on every read.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryNode {
    pub category: Category,
    /// Depth from the root (roots are 0)
    pub level: u32,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn id(&self) -> Uuid {
        self.category.id
    }

    /// Number of nodes in this subtree, including the node itself
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&CategoryNode> = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

// Stored data may hold chains far deeper than the call stack allows, so
// children are released from a heap stack instead of nested drop glue.
impl Drop for CategoryNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}
