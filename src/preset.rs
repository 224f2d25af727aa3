//! Presets
//!
//! JSON description of a node tree. An array is a chain; an object with a
//! single key names a leaf or container:
//!
//! ```json
//! [
//!   {"gain": {"gain_db": -3.0}},
//!   {"mix": [
//!     {"delay": {"samples": 441}},
//!     {"reverb": {"room_size": 0.8}}
//!   ]}
//! ]
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::dsp::{Delay, Gain, Plugin, Reverb, ReverbParams};
use crate::error::{PedalError, Result};
use crate::graph::{Chain, Mix, Node, Pedalboard};

const KINDS: [&str; 5] = ["gain", "delay", "reverb", "chain", "mix"];

/// One node of a preset tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    /// Bare array: serial composition
    List(Vec<NodeSpec>),
    Tagged(TaggedSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaggedSpec {
    Gain {
        #[serde(default)]
        gain_db: f32,
    },
    Delay {
        samples: usize,
    },
    Reverb(ReverbParams),
    Chain(Vec<NodeSpec>),
    Mix(Vec<NodeSpec>),
}

/// Fail with `UnknownNode` on objects that name no known node kind
fn check_kinds(value: &Value) -> Result<()> {
    match value {
        Value::Array(items) => items.iter().try_for_each(check_kinds),
        Value::Object(map) => {
            if map.len() != 1 {
                return Err(PedalError::UnknownNode {
                    name: format!("object with keys {:?}", map.keys().collect::<Vec<_>>()),
                });
            }
            for (kind, body) in map {
                if !KINDS.contains(&kind.as_str()) {
                    return Err(PedalError::UnknownNode { name: kind.clone() });
                }
                if kind == "chain" || kind == "mix" {
                    check_kinds(body)?;
                }
            }
            Ok(())
        }
        other => Err(PedalError::UnknownNode {
            name: other.to_string(),
        }),
    }
}

impl NodeSpec {
    /// Parse a preset from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        check_kinds(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Load a preset file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Instantiate the described tree
    pub fn build(&self) -> Result<Node> {
        match self {
            NodeSpec::List(items) => Ok(Chain::new(build_all(items)?).into()),
            NodeSpec::Tagged(tagged) => match tagged {
                TaggedSpec::Gain { gain_db } => Ok(Gain::new(*gain_db).into_node()),
                TaggedSpec::Delay { samples } => Ok(Delay::new(*samples).into_node()),
                TaggedSpec::Reverb(params) => Ok(Reverb::with_params(params.clone())?.into_node()),
                TaggedSpec::Chain(items) => Ok(Chain::new(build_all(items)?).into()),
                TaggedSpec::Mix(items) => Ok(Mix::new(build_all(items)?).into()),
            },
        }
    }

    /// Instantiate the tree as the contents of a pedalboard
    ///
    /// A top-level chain becomes the pedalboard itself; any other node is
    /// its only child.
    pub fn build_pedalboard(&self, config: EngineConfig) -> Result<Pedalboard> {
        let nodes = match self {
            NodeSpec::List(items) | NodeSpec::Tagged(TaggedSpec::Chain(items)) => build_all(items)?,
            other => vec![other.build()?],
        };
        Pedalboard::with_config(nodes, config)
    }
}

fn build_all(items: &[NodeSpec]) -> Result<Vec<Node>> {
    items.iter().map(NodeSpec::build).collect()
}
