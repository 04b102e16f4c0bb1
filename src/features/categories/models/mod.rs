mod category;
mod tree;

pub use category::{Category, CategoryChanges, NewCategory};
pub use tree::CategoryNode;
