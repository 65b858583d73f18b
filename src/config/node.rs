//! The resolved config tree: one [`ConfigNode`] per loaded document (root,
//! or a `uses`-included file/part), carrying its own namespace and
//! parameters plus its resolved children.

use indexmap::IndexMap;

use crate::config::value::ConfigValue;

#[derive(Debug, Clone)]
pub struct ConfigNode {
    /// File stem, multi-part name, or `"root"` for the top-level document.
    pub name: String,
    /// Fully-qualified namespace path (`outer::inner`), or `None` at the root
    /// and for plain (non-aliased) `uses` inclusions.
    pub namespace: Option<String>,
    pub params: IndexMap<String, ConfigValue>,
    pub tasks: Option<Vec<String>>,
    pub excluded_tasks: Option<Vec<String>>,
    pub human_readable_data_name: Option<String>,
    pub children: Vec<ConfigNode>,
}

impl ConfigNode {
    /// Depth-first walk over this node and every descendant, in document order.
    pub fn walk(&self) -> impl Iterator<Item = &ConfigNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}
