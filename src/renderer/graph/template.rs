//! Declarative Graph Template
//!
//! The default graph ships as `assets/effect_graph.json`:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "name": "source", "type": "texture", "outputs": { "color": {} } },
//!     {
//!       "name": "coc",
//!       "shader": "dof.coc",
//!       "inputs": { "depth": { "external": "sceneDepth" } },
//!       "outputs": { "color": { "format": "r16float" } },
//!       "parameters": { "focalDistance": 5.0 }
//!     }
//!   ],
//!   "finalChain": ["composite", "edge", "FXAA"]
//! }
//! ```
//!
//! Inputs reference `{ "node": name, "pin": pin }` (pin defaults to `color`),
//! `{ "external": kind }`, or `null` for a slot that starts unconnected.
//! Output pins are bound as attachments in name order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::node::{ExternalTexture, OutputDesc};
use crate::backend::UniformValue;
use crate::errors::{CompositorError, Result};

const DEFAULT_TEMPLATE: &str = include_str!("../../../assets/effect_graph.json");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateNodeKind {
    #[default]
    Pass,
    Texture,
}

/// A reference to an input's source in the template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputRef {
    Node {
        node: String,
        #[serde(default = "default_pin")]
        pin: String,
    },
    External {
        external: ExternalTexture,
    },
}

fn default_pin() -> String {
    super::DEFAULT_PIN.to_string()
}

/// A literal shader parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Flag(bool),
    Number(f32),
    Vector(Vec<f32>),
}

impl TemplateValue {
    /// Vectors of 2 to 4 components become `VecN`, anything else a float array.
    #[must_use]
    pub fn to_uniform(&self) -> UniformValue {
        match self {
            Self::Flag(b) => UniformValue::Bool(*b),
            Self::Number(v) => UniformValue::Float(*v),
            Self::Vector(v) => match v.as_slice() {
                [x, y] => UniformValue::Vec2(glam::Vec2::new(*x, *y)),
                [x, y, z] => UniformValue::Vec3(glam::Vec3::new(*x, *y, *z)),
                [x, y, z, w] => UniformValue::Vec4(glam::Vec4::new(*x, *y, *z, *w)),
                _ => UniformValue::FloatArray(v.clone()),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeTemplate {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: TemplateNodeKind,
    #[serde(default)]
    pub shader: Option<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, Option<InputRef>>,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputDesc>,
    #[serde(default)]
    pub parameters: BTreeMap<String, TemplateValue>,
    /// Fragment-stage macros; `null` defines without a value.
    #[serde(default)]
    pub defines: BTreeMap<String, Option<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTemplate {
    pub nodes: Vec<NodeTemplate>,
    pub final_chain: Vec<String>,
}

impl GraphTemplate {
    /// Parses and validates a template document.
    pub fn from_json(json: &str) -> Result<Self> {
        let template: Self = serde_json::from_str(json)?;
        template.validate()?;
        Ok(template)
    }

    /// The built-in bloom / DOF / composite / edge / FXAA graph.
    pub fn default_template() -> Result<Self> {
        Self::from_json(DEFAULT_TEMPLATE)
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeTemplate> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Checks names, references, shaders, the final chain and acyclicity.
    pub fn validate(&self) -> Result<()> {
        let mut by_name: BTreeMap<&str, &NodeTemplate> = BTreeMap::new();
        for node in &self.nodes {
            if by_name.insert(node.name.as_str(), node).is_some() {
                return Err(CompositorError::DuplicateNode(node.name.clone()));
            }
            if node.kind == TemplateNodeKind::Pass && node.shader.is_none() {
                return Err(CompositorError::MissingShader(node.name.clone()));
            }
        }

        for node in &self.nodes {
            for (slot, input) in &node.inputs {
                let Some(InputRef::Node { node: target, pin }) = input else {
                    continue;
                };
                let Some(upstream) = by_name.get(target.as_str()) else {
                    return Err(CompositorError::UnknownInputNode {
                        node: node.name.clone(),
                        slot: slot.clone(),
                        target: target.clone(),
                    });
                };
                if !upstream.outputs.contains_key(pin) {
                    return Err(CompositorError::UnknownOutputPin {
                        node: node.name.clone(),
                        slot: slot.clone(),
                        target: target.clone(),
                        pin: pin.clone(),
                    });
                }
            }
        }

        if self.final_chain.is_empty() {
            return Err(CompositorError::InvalidChain("final chain is empty".into()));
        }
        let mut seen = BTreeSet::new();
        for name in &self.final_chain {
            if !seen.insert(name.as_str()) {
                return Err(CompositorError::InvalidChain(format!("'{name}' appears twice")));
            }
            let Some(node) = by_name.get(name.as_str()) else {
                return Err(CompositorError::InvalidChain(format!("unknown chain node '{name}'")));
            };
            if node.kind != TemplateNodeKind::Pass {
                return Err(CompositorError::InvalidChain(format!("chain node '{name}' is not a pass")));
            }
            if !node.outputs.contains_key(super::DEFAULT_PIN) {
                return Err(CompositorError::InvalidChain(format!(
                    "chain node '{name}' has no '{}' output",
                    super::DEFAULT_PIN
                )));
            }
        }
        self.check_acyclic(&by_name)
    }

    fn check_acyclic(&self, by_name: &BTreeMap<&str, &NodeTemplate>) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            name: &'a str,
            by_name: &BTreeMap<&str, &'a NodeTemplate>,
            marks: &mut BTreeMap<&'a str, Mark>,
        ) -> Result<()> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => return Err(CompositorError::CyclicGraph(name.to_string())),
                None => {}
            }
            marks.insert(name, Mark::Visiting);
            if let Some(node) = by_name.get(name) {
                for input in node.inputs.values().flatten() {
                    if let InputRef::Node { node: upstream, .. } = input {
                        visit(upstream, by_name, marks)?;
                    }
                }
            }
            marks.insert(name, Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for node in &self.nodes {
            visit(&node.name, by_name, &mut marks)?;
        }
        Ok(())
    }
}
