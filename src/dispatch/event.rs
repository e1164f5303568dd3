//! Wire format of server-pushed events.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::aggregate::Rates;
use crate::error::{ProgressError, Result};

/// `batch_status` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchStatusEvent {
    /// Completed operations; missing counts as zero.
    #[serde(default)]
    pub completed: Option<u64>,
    /// Total operations; missing or zero counts as one.
    #[serde(default)]
    pub total: Option<u64>,
    /// Batch status label.
    pub status: String,
    /// Percentage of successful operations.
    #[serde(default)]
    pub success_rate: Option<f64>,
    /// Percentage of failed operations.
    #[serde(default)]
    pub failed_rate: Option<f64>,
    /// Percentage of aborted operations.
    #[serde(default)]
    pub aborted_rate: Option<f64>,
    /// Free-text completion report.
    #[serde(default)]
    pub progress_report: Option<String>,
}

impl BatchStatusEvent {
    /// Completed count with its default applied.
    pub fn completed(&self) -> u64 {
        self.completed.unwrap_or(0)
    }

    /// Total count with the division guard applied.
    pub fn total(&self) -> u64 {
        self.total.filter(|total| *total > 0).unwrap_or(1)
    }

    /// Rates carried by the event.
    pub fn rates(&self) -> Rates {
        Rates {
            success: self.success_rate,
            failed: self.failed_rate,
            aborted: self.aborted_rate,
        }
    }
}

/// `operation_progress` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationProgressEvent {
    /// Row identifier; numeric ids are accepted and stringified.
    #[serde(deserialize_with = "operation_id")]
    pub operation_id: String,
    /// Operation status label.
    pub status: String,
    /// Reported progress in percent.
    #[serde(default)]
    pub progress: Option<f64>,
}

impl OperationProgressEvent {
    /// Reported progress rounded to a whole percent.
    pub fn progress(&self) -> Option<i64> {
        self.progress.map(|p| p.round() as i64)
    }
}

fn operation_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let id = match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "operation_id must be a string or number, got {}",
                other
            )))
        }
    };
    if id.is_empty() {
        return Err(serde::de::Error::custom("operation_id must not be empty"));
    }
    Ok(id)
}

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Aggregate batch update.
    BatchStatus(BatchStatusEvent),
    /// Single operation update.
    OperationProgress(OperationProgressEvent),
    /// Any other `type`; accepted and ignored.
    Unknown {
        /// The `type` value, if there was one.
        kind: Option<String>,
    },
}

impl InboundEvent {
    /// Parse a raw text message.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ProgressError::malformed(e.to_string(), raw))?;

        if !value.is_object() {
            return Err(ProgressError::malformed("expected a JSON object", raw));
        }

        let kind = value.get("type").and_then(Value::as_str).map(str::to_string);
        let event = match kind.as_deref() {
            Some("batch_status") => InboundEvent::BatchStatus(
                serde_json::from_value(value)
                    .map_err(|e| ProgressError::malformed(e.to_string(), raw))?,
            ),
            Some("operation_progress") => InboundEvent::OperationProgress(
                serde_json::from_value(value)
                    .map_err(|e| ProgressError::malformed(e.to_string(), raw))?,
            ),
            _ => InboundEvent::Unknown { kind },
        };
        Ok(event)
    }

    /// Event kind for diagnostics.
    pub fn kind(&self) -> &str {
        match self {
            Self::BatchStatus(_) => "batch_status",
            Self::OperationProgress(_) => "operation_progress",
            Self::Unknown { kind } => kind.as_deref().unwrap_or("undefined"),
        }
    }
}
