// Domain models shared by the geofence, tracker and metrics store

mod metrics;
mod notification;
mod position;
mod vehicle;

pub use metrics::{AnalyticsSnapshot, LiveMetrics};
pub use notification::{Notification, NotificationKind};
pub use position::Position;
pub use vehicle::{Classification, MotionStatus, Vehicle, VehicleId, VehicleProfile, ZoneKind};
