use std::time::Duration;

use crate::call::CallType;

/// Coarse classification of the last failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AttemptErrorKind {
    /// Connect/IO failure before a response arrived.
    Transport,
    Timeout,
    /// A response arrived with a non-2xx status.
    HttpStatus,
}

/// Terminal result of one logical request, after any retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub index: u64,
    pub gateway: String,
    pub call_type: CallType,
    pub success: bool,
    /// First attempt start to final resolution, retry delays included.
    pub duration: Duration,
    pub retry_count: u32,
    pub status_code: Option<u16>,
    pub error: Option<AttemptErrorKind>,
    pub error_message: Option<String>,
    pub images_saved: usize,
}

impl Outcome {
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn log_line(&self) -> String {
        if self.success {
            let status = self
                .status_code
                .map_or_else(|| "-".to_string(), |s| s.to_string());
            let mut line = format!(
                "request {} to {} {} succeeded in {} ms after {} retries (status {status})",
                self.index,
                self.gateway,
                self.call_type,
                self.duration_ms(),
                self.retry_count,
            );
            if self.call_type == CallType::Image {
                line.push_str(&format!(", images saved: {}", self.images_saved));
            }
            line
        } else {
            let reason = self.error_message.as_deref().unwrap_or("unknown error");
            format!(
                "request {} to {} {} FAILED after {} retries in {} ms ({reason})",
                self.index,
                self.gateway,
                self.call_type,
                self.retry_count,
                self.duration_ms(),
            )
        }
    }
}
