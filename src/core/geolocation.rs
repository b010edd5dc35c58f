//! Best-effort location stamping for user turns.
//!
//! Lookups are bounded by a timeout and fail open: a slow or failing
//! provider yields no location instead of holding up the turn.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(8);
pub const MIN_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in metres.
    pub accuracy: f64,
    /// Epoch milliseconds at which the fix was taken.
    pub timestamp: i64,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Option<GeoLocation>;
}

/// A fixed location, typically read from the config file.
#[derive(Debug, Clone)]
pub struct StaticLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_location(&self) -> Option<GeoLocation> {
        Some(GeoLocation {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}

/// Clamp a configured timeout into the supported window.
pub fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.clamp(MIN_LOOKUP_TIMEOUT, MAX_LOOKUP_TIMEOUT)
}

pub async fn locate_with_timeout(
    provider: &dyn LocationProvider,
    timeout: Duration,
) -> Option<GeoLocation> {
    match tokio::time::timeout(timeout, provider.current_location()).await {
        Ok(location) => location,
        Err(_) => {
            tracing::debug!(?timeout, "location lookup timed out");
            None
        }
    }
}

pub fn format_location(location: &GeoLocation) -> String {
    format!(
        "{:.6}, {:.6} (±{:.0}m)",
        location.latitude, location.longitude, location.accuracy
    )
}

pub fn maps_link(location: &GeoLocation) -> String {
    format!(
        "https://www.google.com/maps?q={},{}",
        location.latitude, location.longitude
    )
}
