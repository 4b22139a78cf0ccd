// In-memory node trees produced by the interpreter

use crate::backends::TreeType;
use crate::types::{DataType, Value};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Item carried through a repeat zone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepeatItem {
    pub name: String,
    pub dtype: DataType,
    /// Item type as the repeat zone spells it
    pub socket_type: &'static str,
}

impl RepeatItem {
    pub fn new(name: &str, dtype: DataType) -> Self {
        RepeatItem {
            name: name.to_string(),
            dtype,
            socket_type: dtype.repeat_item_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, Value>,
    /// Default values of unlinked input sockets
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<usize, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<usize, Value>,
    /// Name of the group tree a group node instantiates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Output node of a repeat zone, set on its input node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paired_with: Option<NodeId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repeat_items: Vec<RepeatItem>,
    pub location: [f64; 2],
}

impl Node {
    /// Text shown for the node in diagrams
    pub fn title(&self) -> &str {
        self.label
            .as_deref()
            .or(self.group.as_deref())
            .unwrap_or(&self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Link {
    pub from_node: NodeId,
    pub from_socket: usize,
    pub to_node: NodeId,
    pub to_socket: usize,
}

/// One socket of a group tree's interface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceSocket {
    pub name: String,
    pub dtype: DataType,
    pub socket_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl InterfaceSocket {
    pub fn new(name: &str, dtype: DataType, default: Option<Value>) -> Self {
        InterfaceSocket {
            name: name.to_string(),
            dtype,
            socket_type: dtype.socket_type(),
            default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTree {
    pub name: String,
    pub tree_type: TreeType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InterfaceSocket>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<InterfaceSocket>,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl NodeTree {
    pub fn new(name: &str, tree_type: TreeType) -> Self {
        NodeTree {
            name: name.to_string(),
            tree_type,
            inputs: Vec::new(),
            outputs: Vec::new(),
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn add_node(&mut self, key: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            key: key.to_string(),
            label: None,
            props: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            group: None,
            paired_with: None,
            repeat_items: Vec::new(),
            location: [0.0, 0.0],
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Connect two sockets. An input socket has at most one link.
    pub fn link(&mut self, from_node: NodeId, from_socket: usize, to_node: NodeId, to_socket: usize) {
        self.links
            .retain(|l| !(l.to_node == to_node && l.to_socket == to_socket));
        self.links.push(Link {
            from_node,
            from_socket,
            to_node,
            to_socket,
        });
    }

    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.to_node == id)
    }
}

/// The main tree plus every group tree it uses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeGraph {
    pub tree: NodeTree,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<NodeTree>,
}

impl NodeGraph {
    pub fn trees(&self) -> impl Iterator<Item = &NodeTree> {
        std::iter::once(&self.tree).chain(&self.groups)
    }

    pub fn trees_mut(&mut self) -> impl Iterator<Item = &mut NodeTree> {
        std::iter::once(&mut self.tree).chain(&mut self.groups)
    }
}
