//! Device location seam and conversion to wire locations

use async_trait::async_trait;
use cloudlet_shared::{now_ms, Loc, Timestamp};

/// A location fix
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    pub altitude: f64,
    /// Bearing in degrees
    pub course: f64,
    /// Meters per second
    pub speed: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }

    /// Coordinates are finite and within range
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Wire form, stamped with the current time
    pub fn to_loc(&self) -> Loc {
        let now = now_ms();
        Loc {
            latitude: self.latitude,
            longitude: self.longitude,
            horizontal_accuracy: self.accuracy,
            vertical_accuracy: 0.0,
            altitude: self.altitude,
            course: self.course,
            speed: self.speed,
            timestamp: Some(Timestamp {
                seconds: (now / 1000) as i64,
                nanos: ((now % 1000) * 1_000_000) as i32,
            }),
        }
    }
}

impl From<&Loc> for GeoLocation {
    fn from(loc: &Loc) -> Self {
        Self {
            latitude: loc.latitude,
            longitude: loc.longitude,
            accuracy: loc.horizontal_accuracy,
            altitude: loc.altitude,
            course: loc.course,
            speed: loc.speed,
        }
    }
}

/// Source of the device's last known location
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn last_known_location(&self) -> Option<GeoLocation>;
}

/// Provider that always reports the same fix (or none)
#[derive(Debug, Clone, Default)]
pub struct FixedLocation(pub Option<GeoLocation>);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn last_known_location(&self) -> Option<GeoLocation> {
        self.0
    }
}
