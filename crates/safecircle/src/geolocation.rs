//! One-shot geolocation.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A position on the earth's surface, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, -90 to 90.
    pub latitude: f64,
    /// Longitude, -180 to 180.
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and in range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// Why a position could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    /// The user denied location access.
    #[error("location permission denied")]
    PermissionDenied,

    /// No position could be obtained.
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),

    /// The query did not finish in time.
    #[error("location request timed out")]
    Timeout,
}

/// Source of the device's current position.
#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    /// Query the current position once.
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Query `geolocator`, treating an overrun of `timeout` as [`GeolocationError::Timeout`].
///
/// # Errors
///
/// Returns the geolocator's error, or `Timeout`.
pub async fn locate(
    geolocator: &dyn Geolocator,
    timeout: Duration,
) -> Result<Coordinates, GeolocationError> {
    tokio::time::timeout(timeout, geolocator.current_position())
        .await
        .map_err(|_| GeolocationError::Timeout)?
}

/// Always reports the same position, optionally after a delay.
#[derive(Debug, Clone)]
pub struct FixedGeolocator {
    position: Coordinates,
    delay: Duration,
}

impl FixedGeolocator {
    /// Report `position` immediately.
    #[must_use]
    pub fn new(position: Coordinates) -> Self {
        Self {
            position,
            delay: Duration::ZERO,
        }
    }

    /// Wait `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.position)
    }
}

/// Always fails with the configured error.
#[derive(Debug, Clone)]
pub struct UnavailableGeolocator {
    error: GeolocationError,
}

impl UnavailableGeolocator {
    /// Fail with [`GeolocationError::PositionUnavailable`].
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            error: GeolocationError::PositionUnavailable(reason.into()),
        }
    }

    /// Fail with the given error.
    #[must_use]
    pub fn with_error(error: GeolocationError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl Geolocator for UnavailableGeolocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Err(self.error.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(28.5272, 77.5711).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_coordinates_display() {
        assert_eq!(Coordinates::new(28.5, -77.25).to_string(), "28.5, -77.25");
    }

    #[tokio::test]
    async fn test_fixed_geolocator() {
        let geo = FixedGeolocator::new(Coordinates::new(1.0, 2.0));
        let pos = locate(&geo, Duration::from_secs(1)).await.unwrap();
        assert_eq!(pos, Coordinates::new(1.0, 2.0));
    }

    #[tokio::test]
    async fn test_unavailable_geolocator() {
        let geo = UnavailableGeolocator::new("no fix configured");
        let err = locate(&geo, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(
            err,
            GeolocationError::PositionUnavailable("no fix configured".to_string())
        );

        let geo = UnavailableGeolocator::with_error(GeolocationError::PermissionDenied);
        assert_eq!(
            geo.current_position().await.unwrap_err(),
            GeolocationError::PermissionDenied
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_locate_times_out() {
        let geo = FixedGeolocator::new(Coordinates::new(1.0, 2.0))
            .with_delay(Duration::from_secs(30));
        let err = locate(&geo, Duration::from_secs(10)).await.unwrap_err();
        assert_eq!(err, GeolocationError::Timeout);
    }
}
