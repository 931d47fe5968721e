//! Error types for the simulation core.

/// Errors raised while constructing simulation components.
///
/// Once constructed, the generator, scheduler and aggregator cannot fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl SimError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Reject NaN and infinities.
pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<f64, SimError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SimError::invalid(name, format!("must be finite, got {value}")))
    }
}
