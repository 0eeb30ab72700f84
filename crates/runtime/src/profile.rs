//! Names and argument keys of the map tools the engine knows about.

use serde::{Deserialize, Serialize};

/// Describes the tool server's geo tools.
///
/// Defaults match the AMap MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolProfile {
    /// Address-to-coordinate tool used for speculative resolution.
    pub geocode_tool: String,
    /// Distance tool whose results can be answered locally.
    pub distance_tool: String,
    /// Driving-direction tool, only used for error hints.
    pub driving_tool: String,
    /// Argument keys that take the origin coordinate.
    pub origin_keys: Vec<String>,
    /// Argument keys that take the destination coordinate.
    pub destination_keys: Vec<String>,
    /// Transport-mode argument of the distance tool.
    pub mode_key: String,
    /// Mode injected when the model leaves it out (`"1"` is driving).
    pub default_mode: String,
}

impl Default for ToolProfile {
    fn default() -> Self {
        Self {
            geocode_tool: "maps_geo".to_string(),
            distance_tool: "maps_distance".to_string(),
            driving_tool: "maps_direction_driving".to_string(),
            origin_keys: vec!["origin".to_string(), "origins".to_string()],
            destination_keys: vec!["destination".to_string()],
            mode_key: "type".to_string(),
            default_mode: "1".to_string(),
        }
    }
}
