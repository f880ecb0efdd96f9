//! Health classification for registered services.

use serde::Serialize;

/// Coarse health classification reported by a component probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational with reduced capability (e.g. shared tier unreachable).
    Degraded,
    /// Not operational.
    Unhealthy,
}

/// Result of a single component's health probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Health classification.
    pub status: HealthStatus,
    /// Optional structured details (stats snapshots, error messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl HealthReport {
    /// A healthy report with no details.
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            details: None,
        }
    }

    /// A degraded report with a reason.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            details: Some(serde_json::json!({ "reason": reason.into() })),
        }
    }

    /// An unhealthy report with a reason.
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            details: Some(serde_json::json!({ "reason": reason.into() })),
        }
    }

    /// Attach structured details to the report.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Check if this report is healthy.
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
