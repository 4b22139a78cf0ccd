// Textual exports of a compiled formula

use crate::ir::Op;
use crate::tree::NodeGraph;
use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fmt::Write as _;

pub fn to_json(graph: &NodeGraph) -> Result<String> {
    serde_json::to_string_pretty(graph).context("Failed to serialize node graph")
}

#[derive(Serialize)]
struct NodeRow<'a> {
    tree: &'a str,
    id: usize,
    key: &'a str,
    label: Option<&'a str>,
    x: f64,
    y: f64,
    linked_inputs: usize,
}

/// One row per node of every tree, main tree first
pub fn to_csv(graph: &NodeGraph) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    for tree in graph.trees() {
        for node in &tree.nodes {
            writer
                .serialize(NodeRow {
                    tree: &tree.name,
                    id: node.id.0,
                    key: &node.key,
                    label: node.label.as_deref(),
                    x: node.location[0],
                    y: node.location[1],
                    linked_inputs: tree.incoming(node.id).count(),
                })
                .context("Failed to write CSV record")?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// One op per line, nested bodies indented by two spaces
pub fn ops_listing(ops: &[Op]) -> String {
    fn write_ops(out: &mut String, ops: &[Op], depth: usize) {
        for op in ops {
            let _ = writeln!(out, "{:indent$}{op}", "", indent = depth * 2);
            if let Some(body) = op.body() {
                write_ops(out, body, depth + 1);
            }
        }
    }
    let mut out = String::new();
    write_ops(&mut out, ops, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::TreeType;
    use crate::tree::NodeTree;
    use crate::types::Value;

    fn sample() -> NodeGraph {
        let mut tree = NodeTree::new("main", TreeType::Shader);
        let t = tree.add_node("NodeReroute");
        tree.node_mut(t).label = Some("t".into());
        let sine = tree.add_node("ShaderNodeMath");
        tree.node_mut(sine).location = [200.0, 0.0];
        tree.link(t, 0, sine, 0);
        NodeGraph {
            tree,
            groups: Vec::new(),
        }
    }

    #[test]
    fn test_csv_rows() {
        let csv = to_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "tree,id,key,label,x,y,linked_inputs");
        assert_eq!(lines[1], "main,0,NodeReroute,t,0.0,0.0,0");
        assert_eq!(lines[2], "main,1,ShaderNodeMath,,200.0,0.0,1");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_json_export() {
        let json = to_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tree"]["name"], "main");
        assert_eq!(value["tree"]["links"][0]["to_node"], 1);
        assert!(value.get("groups").is_none());
    }

    #[test]
    fn test_ops_listing_indents_bodies() {
        let ops = vec![
            Op::PushValue(Some(Value::Int(3))),
            Op::Repeat(vec![Op::GetVar("g".into()), Op::BindVar("g".into())]),
            Op::EndOfStatement,
        ];
        assert_eq!(
            ops_listing(&ops),
            "push_value 3\nrepeat\n  get_var g\n  bind_var g\nend_of_statement\n"
        );
    }
}
