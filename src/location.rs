use crate::config::CaptureConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Source of the device position attached to detection requests
pub trait LocationProvider: Send + Sync {
    fn current(&self) -> Option<GeoPoint>;

    fn name(&self) -> &str {
        "location"
    }
}

/// Always reports the same position
#[derive(Debug, Clone, Copy)]
pub struct StaticLocation(pub GeoPoint);

impl LocationProvider for StaticLocation {
    fn current(&self) -> Option<GeoPoint> {
        Some(self.0)
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Never knows where it is
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn current(&self) -> Option<GeoPoint> {
        None
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Asks each provider in turn and returns the first fix
pub struct FallbackLocation {
    providers: Vec<Arc<dyn LocationProvider>>,
}

impl FallbackLocation {
    pub fn new(providers: Vec<Arc<dyn LocationProvider>>) -> Self {
        Self { providers }
    }
}

impl LocationProvider for FallbackLocation {
    fn current(&self) -> Option<GeoPoint> {
        for provider in &self.providers {
            if let Some(point) = provider.current() {
                debug!("Location from {} provider", provider.name());
                return Some(point);
            }
        }
        debug!("No location provider has a fix");
        None
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

/// Build the provider described by the capture configuration
pub fn from_config(config: &CaptureConfig) -> Arc<dyn LocationProvider> {
    match (config.latitude, config.longitude) {
        (Some(latitude), Some(longitude)) => {
            Arc::new(StaticLocation(GeoPoint::new(latitude, longitude)))
        }
        _ => Arc::new(NoLocation),
    }
}
