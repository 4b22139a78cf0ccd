// Node placement: columns follow link depth, rows follow insertion order

use crate::tree::{NodeGraph, NodeTree};
use log::debug;

pub const COLUMN_SPACING: f64 = 200.0;
pub const ROW_SPACING: f64 = 150.0;

/// Position the nodes of every tree in the graph
pub fn layout_graph(graph: &mut NodeGraph) {
    for tree in graph.trees_mut() {
        layout_tree(tree);
    }
}

/// Column of each node: length of the longest link path reaching it
pub fn columns(tree: &NodeTree) -> Vec<usize> {
    let mut columns = vec![0; tree.nodes.len()];
    // A path visits each node at most once, so this many passes settle it
    for _ in 0..tree.nodes.len() {
        let mut changed = false;
        for link in &tree.links {
            let depth = columns[link.from_node.0] + 1;
            if depth > columns[link.to_node.0] {
                columns[link.to_node.0] = depth;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    columns
}

pub fn layout_tree(tree: &mut NodeTree) {
    let columns = columns(tree);
    let mut rows = vec![0usize; columns.iter().max().map_or(0, |c| c + 1)];
    for (node, column) in tree.nodes.iter_mut().zip(&columns) {
        let row = rows[*column];
        rows[*column] += 1;
        node.location = [
            *column as f64 * COLUMN_SPACING,
            -(row as f64) * ROW_SPACING,
        ];
    }
    debug!(
        "laid out `{}` in {} columns",
        tree.name,
        rows.len()
    );
}
