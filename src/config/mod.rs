//! Settings for structuring and rendering, read from an optional JSON file.
//!
//! ```json
//! { "structure": { "maxDepth": 64 }, "layout": { "pitch": 180, "origin": [50, 50] } }
//! ```
//!
//! Every field is optional and falls back to its default.

use std::path::Path;

use serde::Deserialize;

use crate::pst::StructureOptions;
use crate::render::LayoutConfig;
use crate::Error;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub structure: StructureOptions,
    pub layout: LayoutConfig,
}

impl Config {
    /// Load a config file, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}
