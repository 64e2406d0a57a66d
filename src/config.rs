use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use crate::geofence::{DEFAULT_MAP_PADDING_DEG, Geofence, Zone};
use crate::metrics_store::{DEFAULT_BUCKET_WIDTH_MS, DEFAULT_RETENTION_BUCKETS};
use crate::models::{Position, Vehicle, VehicleProfile};
use crate::simulation::{DEFAULT_JITTER_STEP_DEG, DEFAULT_SCATTER_STEP_DEG};
use crate::tracker::DEFAULT_WARNING_THRESHOLD;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub geofence: GeofenceConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub vehicles: Vec<VehicleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceConfig {
    pub boundary: Vec<Position>,
    #[serde(default)]
    pub parking_zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub non_parking_zones: Vec<ZoneConfig>,
    /// Padding around the boundary for the map viewport.
    #[serde(default = "default_map_padding_deg")]
    pub map_padding_deg: f64,
}

fn default_map_padding_deg() -> f64 {
    DEFAULT_MAP_PADDING_DEG
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    pub id: u32,
    pub coordinates: Vec<Position>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub tick_interval_ms: u64,
    /// Time parked in a non-parking zone before a warning is raised automatically.
    pub warning_threshold_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            warning_threshold_ms: DEFAULT_WARNING_THRESHOLD.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub bucket_width_ms: u64,
    pub retention_buckets: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            bucket_width_ms: DEFAULT_BUCKET_WIDTH_MS,
            retention_buckets: DEFAULT_RETENTION_BUCKETS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// How long a notification stays on screen.
    pub display_ms: u64,
    /// Max notifications buffered for slow consumers (they lag and skip beyond this).
    pub broadcast_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            display_ms: 2500,
            broadcast_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub enabled: bool,
    pub jitter_interval_ms: u64,
    pub jitter_step_deg: f64,
    pub scatter_step_deg: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jitter_interval_ms: 2000,
            jitter_step_deg: DEFAULT_JITTER_STEP_DEG,
            scatter_step_deg: DEFAULT_SCATTER_STEP_DEG,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// How often to log roster stats at INFO level.
    pub stats_log_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub id: u32,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub is_stationary: bool,
    #[serde(default)]
    pub plate_number: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: u16,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub owner_phone: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default)]
    pub registration_date: String,
    #[serde(default)]
    pub last_inspection: String,
}

impl From<&VehicleConfig> for Vehicle {
    fn from(c: &VehicleConfig) -> Self {
        Vehicle::new(
            c.id,
            Position::new(c.latitude, c.longitude),
            c.is_stationary,
        )
        .with_profile(VehicleProfile {
            plate_number: c.plate_number.clone(),
            make: c.make.clone(),
            model: c.model.clone(),
            year: c.year,
            color: c.color.clone(),
            owner_name: c.owner_name.clone(),
            owner_phone: c.owner_phone.clone(),
            owner_email: c.owner_email.clone(),
            registration_date: c.registration_date.clone(),
            last_inspection: c.last_inspection.clone(),
        })
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.tracking.tick_interval_ms > 0,
            "tracking.tick_interval_ms must be > 0, got {}",
            self.tracking.tick_interval_ms
        );
        anyhow::ensure!(
            self.metrics.bucket_width_ms > 0,
            "metrics.bucket_width_ms must be > 0, got {}",
            self.metrics.bucket_width_ms
        );
        anyhow::ensure!(
            self.metrics.retention_buckets > 0,
            "metrics.retention_buckets must be > 0, got {}",
            self.metrics.retention_buckets
        );
        anyhow::ensure!(
            self.notifications.broadcast_capacity > 0,
            "notifications.broadcast_capacity must be > 0, got {}",
            self.notifications.broadcast_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        if self.simulation.enabled {
            anyhow::ensure!(
                self.simulation.jitter_interval_ms > 0,
                "simulation.jitter_interval_ms must be > 0 when simulation is enabled, got {}",
                self.simulation.jitter_interval_ms
            );
        }
        anyhow::ensure!(
            self.geofence.map_padding_deg.is_finite() && self.geofence.map_padding_deg >= 0.0,
            "geofence.map_padding_deg must be a non-negative number, got {}",
            self.geofence.map_padding_deg
        );
        ensure_unique_ids(
            "geofence.parking_zones",
            self.geofence.parking_zones.iter().map(|z| z.id),
        )?;
        ensure_unique_ids(
            "geofence.non_parking_zones",
            self.geofence.non_parking_zones.iter().map(|z| z.id),
        )?;
        ensure_unique_ids("vehicles", self.vehicles.iter().map(|v| v.id))?;
        self.build_geofence()?;
        Ok(())
    }

    /// Builds the geofence, rejecting malformed polygons.
    pub fn build_geofence(&self) -> anyhow::Result<Geofence> {
        let zones = |label: &str, configs: &[ZoneConfig]| -> anyhow::Result<Vec<Zone>> {
            configs
                .iter()
                .map(|z| Zone::try_new(label, z.id, &z.coordinates).map_err(anyhow::Error::from))
                .collect()
        };
        let parking = zones("geofence.parking_zones", &self.geofence.parking_zones)?;
        let non_parking = zones("geofence.non_parking_zones", &self.geofence.non_parking_zones)?;
        let geofence = Geofence::try_new(&self.geofence.boundary, parking, non_parking)
            .map_err(|e| anyhow::anyhow!("geofence.{}", e))?;
        Ok(geofence)
    }

    pub fn roster(&self) -> Vec<Vehicle> {
        self.vehicles.iter().map(Vehicle::from).collect()
    }

    pub fn warning_threshold(&self) -> Duration {
        Duration::from_millis(self.tracking.warning_threshold_ms)
    }
}

fn ensure_unique_ids(what: &str, ids: impl Iterator<Item = u32>) -> anyhow::Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        anyhow::ensure!(seen.insert(id), "{} contains duplicate id {}", what, id);
    }
    Ok(())
}
