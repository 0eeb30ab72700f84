//! Route-query detection and speculative geocoding.
//!
//! Before a tool batch runs, the latest user utterance is checked for an
//! "A 到 B 的距离" shaped question. When it matches, both places are geocoded
//! up front so the sanitizer can fill coordinates the model left as
//! template placeholders. This is an optimization only: every failure is
//! logged and swallowed.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use mcp::{Connector, ToolTransport};
use regex::Regex;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

static ROUTE_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:从)?([\x{4e00}-\x{9fa5}]+?)\s*(?:到|-|\s+)\s*([\x{4e00}-\x{9fa5}]+?)\s*的?(?:距离|路程|路线|多远|多近)",
    )
    .expect("route query pattern compiles")
});

/// Keys under which geocoders return their candidate list.
const GEOCODE_LISTS: [&str; 3] = ["geocodes", "results", "return"];

/// A longitude/latitude pair, written `"lng,lat"` on the wire.
///
/// A parsed coordinate displays exactly as the provider wrote it, so
/// `"116.400000,39.900000"` is passed on with its trailing zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
    text: String,
}

impl Coordinate {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            text: format!("{longitude},{latitude}"),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid coordinate: {0:?}")]
pub struct InvalidCoordinate(pub String);

impl FromStr for Coordinate {
    type Err = InvalidCoordinate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidCoordinate(s.to_string());
        let (lng, lat) = s.split_once(',').ok_or_else(invalid)?;
        let (lng, lat) = (lng.trim(), lat.trim());
        let longitude = lng.parse::<f64>().map_err(|_| invalid())?;
        let latitude = lat.parse::<f64>().map_err(|_| invalid())?;
        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(invalid());
        }
        Ok(Self {
            longitude,
            latitude,
            text: format!("{lng},{lat}"),
        })
    }
}

/// Resolved endpoints of a route question, scoped to one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCache {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub origin_label: String,
    pub destination_label: String,
}

/// Place labels extracted from a route question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuery {
    pub origin: String,
    pub destination: String,
}

/// Detects route questions and geocodes their endpoints.
#[derive(Debug, Clone)]
pub struct QueryPreprocessor {
    geocode_tool: String,
}

impl QueryPreprocessor {
    pub fn new(geocode_tool: impl Into<String>) -> Self {
        Self {
            geocode_tool: geocode_tool.into(),
        }
    }

    /// Extract origin and destination labels from a route question.
    pub fn detect(&self, utterance: &str) -> Option<RouteQuery> {
        let captures = ROUTE_QUERY.captures(utterance)?;
        Some(RouteQuery {
            origin: captures.get(1)?.as_str().to_string(),
            destination: captures.get(2)?.as_str().to_string(),
        })
    }

    /// Geocode both endpoints of a route question.
    ///
    /// Returns `None` when the utterance is not a route question or when
    /// either endpoint fails to resolve.
    pub async fn resolve<C: Connector>(
        &self,
        transport: &ToolTransport<C>,
        utterance: &str,
    ) -> Option<LocationCache> {
        let query = self.detect(utterance)?;
        info!(origin = %query.origin, destination = %query.destination, "detected route query");

        // Resolve both so each failure is logged.
        let origin = self.geocode(transport, &query.origin).await;
        let destination = self.geocode(transport, &query.destination).await;

        let cache = LocationCache {
            origin: origin?,
            destination: destination?,
            origin_label: query.origin,
            destination_label: query.destination,
        };
        debug!(origin = %cache.origin, destination = %cache.destination, "cached route coordinates");
        Some(cache)
    }

    async fn geocode<C: Connector>(&self, transport: &ToolTransport<C>, label: &str) -> Option<Coordinate> {
        let arguments = json!({ "address": label, "city": label });
        match transport.call_tool(&self.geocode_tool, arguments).await {
            Ok(payload) => {
                let location = extract_location(&payload);
                if location.is_none() {
                    warn!(label, "geocode result carried no usable location");
                }
                location
            }
            Err(err) => {
                warn!(label, error = %err, "geocode failed");
                None
            }
        }
    }
}

/// First `location` of a geocoder payload.
pub fn extract_location(payload: &Value) -> Option<Coordinate> {
    GEOCODE_LISTS.iter().find_map(|key| {
        payload
            .get(key)?
            .as_array()?
            .first()?
            .get("location")?
            .as_str()?
            .parse()
            .ok()
    })
}
