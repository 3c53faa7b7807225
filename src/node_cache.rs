//! Node summaries rendered once per node and reused for every document.
//!
//! Entries are never invalidated: a relabelled node keeps its old summary
//! in documents until the process restarts. Once `max_entries` nodes are
//! cached, further nodes are rendered on every use instead of being cached.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::document::NodeDocument;
use crate::model::Node;

#[derive(Debug, Clone)]
pub struct NodeCache {
    nodes: Arc<DashMap<i32, Option<NodeDocument>>>,
    max_entries: usize,
}

impl NodeCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            nodes: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    /// Cached summary for `node`, rendering and caching it on first use.
    pub fn get_or_render(&self, node: &Node) -> NodeDocument {
        if let Some(Some(doc)) = self.nodes.get(&node.id).map(|e| e.value().clone()) {
            return doc;
        }

        let rendered = render(node);
        if self.nodes.len() >= self.max_entries && !self.nodes.contains_key(&node.id) {
            debug!("Node cache full ({} entries), not caching node {}", self.max_entries, node.id);
            return rendered;
        }

        // First writer wins; concurrent renderers of the same node agree anyway.
        self.nodes
            .entry(node.id)
            .or_insert_with(|| Some(rendered.clone()))
            .value()
            .clone()
            .unwrap_or(rendered)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for NodeCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

fn render(node: &Node) -> NodeDocument {
    NodeDocument {
        id: node.id,
        label: node.label.clone(),
        foreign_source: node.foreign_source.clone(),
        foreign_id: node.foreign_id.clone(),
        categories: node.categories.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i32, label: &str) -> Node {
        Node {
            id,
            label: label.to_string(),
            foreign_source: Some("fs".to_string()),
            foreign_id: Some(format!("fid-{id}")),
            categories: vec!["Routers".to_string()],
        }
    }

    #[test]
    fn test_first_render_is_kept() {
        let cache = NodeCache::new(10);
        assert_eq!(cache.get_or_render(&node(1, "router-a")).label, "router-a");

        // Relabelled node still reports the cached label
        assert_eq!(cache.get_or_render(&node(1, "router-b")).label, "router-a");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bound_stops_caching() {
        let cache = NodeCache::new(1);
        cache.get_or_render(&node(1, "a"));

        let second = cache.get_or_render(&node(2, "b"));
        assert_eq!(second.label, "b");
        assert_eq!(cache.len(), 1);

        // Uncached node is rendered fresh every time
        assert_eq!(cache.get_or_render(&node(2, "c")).label, "c");
    }

    #[test]
    fn test_concurrent_population() {
        let cache = NodeCache::new(100);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for id in 0..50 {
                        cache.get_or_render(&node(id, "n"));
                    }
                });
            }
        });
        assert_eq!(cache.len(), 50);
    }
}
