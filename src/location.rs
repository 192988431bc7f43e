// location.rs: Device coordinates and the one-shot geolocation lookup.
//
// The session asks for the position exactly once on start. A denied
// permission leaves the session without coordinates, so uploads still go
// through but never produce map markers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message shown when the location permission was refused.
pub const PERMISSION_DENIED_MESSAGE: &str = "Permission to access location was denied";

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("{field} is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },
    #[error("{field} {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("latitude and longitude must be supplied together")]
    Unpaired,
}

impl Coordinates {
    /// Validate a pair of decimal strings as they arrive in a form body.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self, CoordinateError> {
        let latitude = parse_component("latitude", latitude, 90.0)?;
        let longitude = parse_component("longitude", longitude, 180.0)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Render with exactly five decimal places, e.g. `12.34567, -98.76543`.
    pub fn display(&self) -> String {
        format!("{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

fn parse_component(field: &'static str, raw: &str, bound: f64) -> Result<f64, CoordinateError> {
    let value: f64 = raw
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| CoordinateError::NotANumber {
            field,
            value: raw.to_string(),
        })?;
    if !(-bound..=bound).contains(&value) {
        return Err(CoordinateError::OutOfRange {
            field,
            value,
            min: -bound,
            max: bound,
        });
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("{}", PERMISSION_DENIED_MESSAGE)]
    PermissionDenied,
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Source of the device position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Resolve the position once: permission check first, then the fix.
pub async fn locate_once(provider: &dyn LocationProvider) -> Result<Coordinates, LocationError> {
    if provider.request_permission().await == PermissionStatus::Denied {
        log::warn!("Location permission denied");
        return Err(LocationError::PermissionDenied);
    }
    let coords = provider.current_position().await?;
    log::info!("Location acquired: {}", coords.display());
    Ok(coords)
}

/// A position fixed at startup (configuration or command line).
pub struct FixedLocation {
    coords: Coordinates,
}

impl FixedLocation {
    pub fn new(coords: Coordinates) -> Self {
        Self { coords }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.coords)
    }
}

/// Used when no position source is configured; behaves like a refused permission.
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Denied
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_valid_pair() {
        let c = Coordinates::parse("12.34567", " -98.76543 ").unwrap();
        assert_eq!(c.latitude, 12.34567);
        assert_eq!(c.longitude, -98.76543);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = Coordinates::parse("north", "10").unwrap_err();
        assert!(matches!(err, CoordinateError::NotANumber { field: "latitude", .. }));
        assert!(Coordinates::parse("10", "NaN").is_err());
        assert!(Coordinates::parse("10", "inf").is_err());
    }

    #[test]
    fn parse_rejects_out_of_range() {
        assert!(matches!(
            Coordinates::parse("90.5", "0"),
            Err(CoordinateError::OutOfRange { field: "latitude", .. })
        ));
        assert!(matches!(
            Coordinates::parse("0", "-180.01"),
            Err(CoordinateError::OutOfRange { field: "longitude", .. })
        ));
        assert!(Coordinates::parse("-90", "180").is_ok());
    }

    #[test]
    fn display_uses_five_decimals() {
        let c = Coordinates {
            latitude: 12.34567,
            longitude: -98.76543,
        };
        assert_eq!(c.display(), "12.34567, -98.76543");

        let c = Coordinates {
            latitude: 1.5,
            longitude: 2.0,
        };
        assert_eq!(c.display(), "1.50000, 2.00000");
    }

    #[tokio::test]
    async fn locate_once_with_fixed_position() {
        let coords = Coordinates {
            latitude: -1.28333,
            longitude: 36.81667,
        };
        let found = locate_once(&FixedLocation::new(coords)).await.unwrap();
        assert_eq!(found, coords);
    }

    #[tokio::test]
    async fn locate_once_denied() {
        let err = locate_once(&NoLocation).await.unwrap_err();
        assert_eq!(err.to_string(), PERMISSION_DENIED_MESSAGE);
    }
}
