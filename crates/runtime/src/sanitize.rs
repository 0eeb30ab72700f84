//! Placeholder substitution for model-produced tool arguments.

use serde_json::{Map, Value};
use tracing::debug;

use crate::locate::LocationCache;
use crate::profile::ToolProfile;

/// Fills `{{…}}` template placeholders the model left in its arguments.
#[derive(Debug, Clone)]
pub struct ArgumentSanitizer {
    profile: ToolProfile,
}

enum Slot {
    Origin,
    Destination,
    Unknown,
}

impl ArgumentSanitizer {
    pub fn new(profile: ToolProfile) -> Self {
        Self { profile }
    }

    /// Rewrite `arguments` for a call to `tool_name`.
    ///
    /// Only top-level string values of an argument object are touched.
    /// Running it twice gives the same result as running it once.
    pub fn sanitize(&self, tool_name: &str, arguments: Value, cache: Option<&LocationCache>) -> Value {
        let Value::Object(mut fields) = arguments else {
            return arguments;
        };

        for (key, value) in fields.iter_mut() {
            let Value::String(text) = value else { continue };
            if !is_placeholder(text) {
                continue;
            }
            let replacement = match (self.slot(key), cache) {
                (Slot::Origin, Some(cache)) => cache.origin.to_string(),
                (Slot::Destination, Some(cache)) => cache.destination.to_string(),
                _ => String::new(),
            };
            debug!(tool = tool_name, key = %key, placeholder = %text, %replacement, "substituted placeholder");
            *text = replacement;
        }

        if tool_name == self.profile.distance_tool {
            self.default_mode(&mut fields);
        }

        Value::Object(fields)
    }

    fn slot(&self, key: &str) -> Slot {
        if self.profile.origin_keys.iter().any(|k| k == key) {
            Slot::Origin
        } else if self.profile.destination_keys.iter().any(|k| k == key) {
            Slot::Destination
        } else {
            Slot::Unknown
        }
    }

    fn default_mode(&self, fields: &mut Map<String, Value>) {
        if !fields.contains_key(&self.profile.mode_key) {
            fields.insert(
                self.profile.mode_key.clone(),
                Value::String(self.profile.default_mode.clone()),
            );
        }
    }
}

impl Default for ArgumentSanitizer {
    fn default() -> Self {
        Self::new(ToolProfile::default())
    }
}

fn is_placeholder(text: &str) -> bool {
    text.contains("{{") && text.contains("}}")
}
