//! The layout compiler: a parallel walk of the field tree that preserves
//! fieldset and row grouping for renderers. Leaves carry the same compiled
//! keys the schema walk produces, so a layout node resolves to a live field.

use serde::Serialize;

use crate::compiler::key::{field_key, slugify};
use crate::domain::{FormDefinition, FormNode};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayoutNode {
    Fieldset {
        legend: String,
        children: Vec<LayoutNode>,
    },
    Row {
        children: Vec<LayoutNode>,
    },
    Field {
        key: String,
    },
}

/// The presentation tree for one form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormLayout {
    pub nodes: Vec<LayoutNode>,
}

impl FormLayout {
    pub fn compile(definition: &FormDefinition) -> Self {
        Self {
            nodes: definition
                .form_fields
                .iter()
                .map(|node| layout_node(node, ""))
                .collect(),
        }
    }
}

fn layout_node(node: &FormNode, namespace: &str) -> LayoutNode {
    match node {
        FormNode::Field(block) => LayoutNode::Field {
            key: field_key(namespace, &block.label),
        },
        FormNode::Row(row) => LayoutNode::Row {
            children: row
                .form_fields
                .iter()
                .map(|child| layout_node(child, namespace))
                .collect(),
        },
        FormNode::Set(set) => {
            let namespace = slugify(&set.legend);
            LayoutNode::Fieldset {
                legend: set.legend.clone(),
                children: set
                    .form_fields
                    .iter()
                    .map(|child| layout_node(child, &namespace))
                    .collect(),
            }
        }
    }
}
