//! Utility functions for meetsync

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encoding set for meeting ids embedded in URL paths
const ID_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&');

/// Encode a meeting id for URL usage
pub fn encode_id(id: &str) -> String {
    utf8_percent_encode(id, ID_ENCODE_SET).to_string()
}

/// Decode a percent-encoded meeting id
pub fn decode_id(encoded: &str) -> crate::Result<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.to_string())
        .map_err(|e| crate::Error::Other(format!("Failed to decode id: {}", e)))
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// Parse duration string (e.g., "30s", "5m", "1h", "7d")
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = if s.ends_with("ms") {
        (&s[..s.len() - 2], "ms")
    } else {
        (&s[..s.len() - 1], &s[s.len() - 1..])
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => std::time::Duration::from_millis(num),
        "s" => std::time::Duration::from_secs(num),
        "m" => std::time::Duration::from_secs(num * 60),
        "h" => std::time::Duration::from_secs(num * 3600),
        "d" => std::time::Duration::from_secs(num * 86400),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

/// Get current Unix timestamp (seconds)
pub fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Get current Unix timestamp as f64 seconds (for JSON timestamps)
pub fn timestamp_now_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
}

/// Retry with a fixed inter-attempt delay.
///
/// Heartbeats, polls and bundle downloads all retry a bounded number of
/// times with a constant delay, never indefinitely.
pub async fn retry_fixed<F, Fut, T>(
    mut f: F,
    max_attempts: u32,
    delay: std::time::Duration,
) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = crate::Result<T>>,
{
    let mut last_err = crate::Error::Internal("no attempts made".into());

    for attempt in 1..=max_attempts.max(1) {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    "Attempt {}/{} failed: {}, retrying in {:?}",
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                last_err = e;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err)
}
