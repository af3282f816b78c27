//! Reverse geocoding of GPS coordinates into address components
//!
//! A [`GeocodeClient`] fetches the raw response body for a coordinate pair.
//! The [`GeocodeResolver`] drives it under a fixed-delay [`RetryPolicy`] and
//! writes the components it finds into a candidate's properties. A response
//! without any address component counts as a failed attempt.

use crate::candidate::{Candidate, keys};
use crate::config::GeocodeConfig;
use crate::error::{Error, Result};
use serde_json::Value;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Default reverse geocoding endpoint
pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Default number of attempts per coordinate pair
pub const DEFAULT_RETRY_COUNT: u32 = 50;

/// Default pause between attempts, in seconds
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 3;

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause after each failed attempt except the last
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_COUNT,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GeocodeConfig) -> Self {
        Self {
            max_attempts: config.retry_count,
            delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

/// Transport for reverse geocoding requests
pub trait GeocodeClient {
    /// Fetch the response body for the given coordinates
    ///
    /// Coordinates are passed exactly as stored on the candidate.
    fn reverse_geocode(&self, latitude: &str, longitude: &str) -> Result<String>;
}

/// Blocking HTTP client for a Google-style geocoding endpoint
#[derive(Debug, Clone)]
pub struct HttpGeocodeClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGeocodeClient {
    pub fn new(config: &GeocodeConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("media-organizer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

impl GeocodeClient for HttpGeocodeClient {
    fn reverse_geocode(&self, latitude: &str, longitude: &str) -> Result<String> {
        let latlng = format!("{latitude},{longitude}");
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("latlng", latlng.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        debug!(endpoint = %self.endpoint, %latlng, "Requesting geocode data");
        let response = request.send()?.error_for_status()?;
        Ok(response.text()?)
    }
}

/// One typed address fragment, e.g. `locality` = `Paris`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressComponent {
    /// First entry of the component's `types` list
    pub kind: String,
    pub long_name: String,
}

/// Extract `(types[0], long_name)` pairs from a geocoding response
///
/// Results and components are visited in response order. Components that
/// do not have both fields are skipped; a body without a `results` array
/// yields no components. A non-`OK` status carrying an `error_message` is
/// reported as [`Error::Geocode`].
pub fn parse_address_components(body: &str) -> Result<Vec<AddressComponent>> {
    let json: Value = serde_json::from_str(body)?;

    if let Some(status) = json.get("status").and_then(Value::as_str)
        && status != "OK"
    {
        if let Some(message) = json.get("error_message").and_then(Value::as_str) {
            return Err(Error::Geocode(format!("{status}: {message}")));
        }
        debug!(%status, "Geocoding service returned non-OK status");
    }

    let Some(results) = json.get("results").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let components = results
        .iter()
        .filter_map(|result| result.get("address_components").and_then(Value::as_array))
        .flatten()
        .filter_map(|component| {
            let kind = component
                .get("types")
                .and_then(Value::as_array)
                .and_then(|types| types.first())
                .and_then(Value::as_str)?;
            let long_name = component.get("long_name").and_then(Value::as_str)?;
            Some(AddressComponent {
                kind: kind.to_string(),
                long_name: long_name.to_string(),
            })
        })
        .collect();

    Ok(components)
}

/// Result of resolving one coordinate pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeOutcome {
    /// An attempt returned at least one component
    Resolved {
        attempts: u32,
        components: Vec<AddressComponent>,
    },
    /// Every attempt failed or came back empty
    Exhausted { attempts: u32 },
}

/// Runs reverse geocoding requests under a retry policy
#[derive(Debug)]
pub struct GeocodeResolver<C> {
    client: C,
    policy: RetryPolicy,
}

impl<C: GeocodeClient> GeocodeResolver<C> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Query the service until it returns components or the policy runs out
    pub fn resolve(&self, latitude: &str, longitude: &str) -> GeocodeOutcome {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            let fetched = self
                .client
                .reverse_geocode(latitude, longitude)
                .and_then(|body| parse_address_components(&body));

            match fetched {
                Ok(components) if !components.is_empty() => {
                    return GeocodeOutcome::Resolved {
                        attempts: attempt,
                        components,
                    };
                }
                Ok(_) => {
                    debug!(attempt, max_attempts, "Geocode response had no address components");
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Error in retrieving geocode data");
                }
            }

            if attempt < max_attempts && !self.policy.delay.is_zero() {
                debug!(delay_ms = self.policy.delay.as_millis(), "Retrying geocode request after delay");
                thread::sleep(self.policy.delay);
            }
        }

        GeocodeOutcome::Exhausted {
            attempts: max_attempts,
        }
    }

    /// Geocode a candidate's coordinates and store the components
    ///
    /// Returns `None` when the candidate has no coordinates. Existing
    /// properties are never overwritten, and within one response the first
    /// component of each type wins.
    pub fn enrich(&self, candidate: &mut Candidate) -> Option<GeocodeOutcome> {
        let latitude = candidate.property(keys::LATITUDE)?.to_string();
        let longitude = candidate.property(keys::LONGITUDE)?.to_string();

        debug!(path = ?candidate.source_path(), %latitude, %longitude, "Adding geocode data");
        let outcome = self.resolve(&latitude, &longitude);

        match &outcome {
            GeocodeOutcome::Resolved { components, .. } => {
                for component in components {
                    candidate.set_property(component.kind.as_str(), component.long_name.as_str());
                }
            }
            GeocodeOutcome::Exhausted { attempts } => {
                warn!(
                    path = ?candidate.source_path(),
                    attempts,
                    "Giving up on geocode data"
                );
            }
        }

        Some(outcome)
    }
}
