//! Statistics and introspection.
//!
//! Gathers per-fan-out node counts and densities, leaf counts and height for a tree. Useful for
//! checking that growth and shrinking keep nodes reasonably full.

use std::collections::HashMap;

use crate::node::{Node, NodeKind};
use crate::tree::Tree;

pub trait TreeStatsTrait {
    fn get_tree_stats(&self) -> TreeStats;
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeStats {
    pub width: usize,
    pub total_nodes: usize,
    pub total_children: usize,
    pub density: f64,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TreeStats {
    pub node_stats: HashMap<NodeKind, NodeStats>,
    pub num_leaves: usize,
    pub num_inner_nodes: usize,
    pub total_density: f64,
    pub max_height: usize,
}

fn update_tree_stats<V>(tree_stats: &mut TreeStats, node: &Node<V>) {
    let num_children = node.num_children();
    tree_stats
        .node_stats
        .entry(node.kind())
        .and_modify(|e| {
            e.total_nodes += 1;
            e.total_children += num_children;
        })
        .or_insert(NodeStats {
            width: node.capacity(),
            total_nodes: 1,
            total_children: num_children,
            density: 0.0,
        });
}

fn collect_stats<V>(root: &Node<V>) -> TreeStats {
    let mut stats = TreeStats::default();
    let mut stack = vec![(root, 1usize)];
    while let Some((node, height)) = stack.pop() {
        stats.max_height = stats.max_height.max(height);
        if node.is_leaf() {
            stats.num_leaves += 1;
            continue;
        }
        stats.num_inner_nodes += 1;
        update_tree_stats(&mut stats, node);
        stack.extend(node.children().map(|(_, child)| (&**child, height + 1)));
    }

    let mut total_children = 0;
    let mut total_width = 0;
    for ns in stats.node_stats.values_mut() {
        total_children += ns.total_children;
        total_width += ns.width * ns.total_nodes;
        ns.density = ns.total_children as f64 / (ns.width * ns.total_nodes) as f64;
    }
    stats.total_density = if total_width == 0 {
        0.0
    } else {
        total_children as f64 / total_width as f64
    };
    stats
}

impl<V> TreeStatsTrait for Node<V> {
    fn get_tree_stats(&self) -> TreeStats {
        collect_stats(self)
    }
}

impl<V> TreeStatsTrait for Tree<V> {
    fn get_tree_stats(&self) -> TreeStats {
        collect_stats(self.root())
    }
}
