// Transient user-facing notifications (auto-dismissed toasts)

use serde::{Deserialize, Serialize};

use super::VehicleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    ViolationDetected,
    WarningIssued,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub vehicle_id: VehicleId,
    pub kind: NotificationKind,
    pub message: String,
    pub issued_at: u64,
    pub display_for_ms: u64,
}

impl Notification {
    pub fn violation_detected(vehicle_id: VehicleId, issued_at: u64, display_for_ms: u64) -> Self {
        Self {
            vehicle_id,
            kind: NotificationKind::ViolationDetected,
            message: format!("Vehicle {vehicle_id} parked in a non-parking zone"),
            issued_at,
            display_for_ms,
        }
    }

    pub fn warning_issued(vehicle_id: VehicleId, issued_at: u64, display_for_ms: u64) -> Self {
        Self {
            vehicle_id,
            kind: NotificationKind::WarningIssued,
            message: format!("Warning issued to Vehicle {vehicle_id}"),
            issued_at,
            display_for_ms,
        }
    }

    /// Epoch ms after which the notification should no longer be shown.
    pub fn expires_at(&self) -> u64 {
        self.issued_at.saturating_add(self.display_for_ms)
    }

    pub fn is_visible_at(&self, now: u64) -> bool {
        now < self.expires_at()
    }
}
