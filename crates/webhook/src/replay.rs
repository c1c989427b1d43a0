use thiserror::Error;

/// Seconds a timestamp may lie in the future to absorb clock skew.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("missing X-Webhook-Timestamp header")]
    Missing,

    #[error("invalid timestamp format")]
    Invalid,

    #[error("timestamp is in the future")]
    Future,

    #[error("timestamp expired (age: {age}s, max: {max}s)")]
    Expired { age: i64, max: u64 },
}

/// Check `X-Webhook-Timestamp` (unix seconds) against `now`.
pub fn validate_timestamp(
    header: Option<&str>,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), ReplayError> {
    let raw = header.map(str::trim).filter(|h| !h.is_empty()).ok_or(ReplayError::Missing)?;
    let timestamp: i64 = raw.parse().map_err(|_| ReplayError::Invalid)?;

    let age = now.saturating_sub(timestamp);
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(ReplayError::Future);
    }
    if age > 0 && age as u64 > tolerance_secs {
        return Err(ReplayError::Expired {
            age,
            max: tolerance_secs,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn accepts_within_window() {
        assert!(validate_timestamp(Some("1700000000"), 300, NOW).is_ok());
        assert!(validate_timestamp(Some("1699999700"), 300, NOW).is_ok());
        assert!(validate_timestamp(Some("1700000060"), 300, NOW).is_ok());
    }

    #[test]
    fn rejects_outside_window() {
        assert_eq!(validate_timestamp(Some("1700000061"), 300, NOW), Err(ReplayError::Future));
        assert_eq!(
            validate_timestamp(Some("1699999699"), 300, NOW),
            Err(ReplayError::Expired { age: 301, max: 300 })
        );
        assert_eq!(
            ReplayError::Expired { age: 301, max: 300 }.to_string(),
            "timestamp expired (age: 301s, max: 300s)"
        );
    }

    #[test]
    fn rejects_missing_or_malformed() {
        assert_eq!(validate_timestamp(None, 300, NOW), Err(ReplayError::Missing));
        assert_eq!(validate_timestamp(Some(""), 300, NOW), Err(ReplayError::Missing));
        assert_eq!(validate_timestamp(Some("yesterday"), 300, NOW), Err(ReplayError::Invalid));
        assert_eq!(validate_timestamp(Some("1.5"), 300, NOW), Err(ReplayError::Invalid));
    }
}
