#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use time::{Duration, OffsetDateTime};
use time::format_description::well_known::Rfc3339;

/// Wall clock as epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    epoch_ms(OffsetDateTime::now_utc())
}

/// Epoch milliseconds as RFC 3339 UTC. Instants outside the calendar range print as raw ms.
pub(crate) fn format_ms(ts_ms: i64) -> String {
    OffsetDateTime::UNIX_EPOCH
        .checked_add(Duration::milliseconds(ts_ms))
        .and_then(|instant| instant.format(&Rfc3339).ok())
        .unwrap_or_else(|| ts_ms.to_string())
}

fn epoch_ms(instant: OffsetDateTime) -> i64 {
    let ms = instant.unix_timestamp_nanos().div_euclid(1_000_000);
    i64::try_from(ms).unwrap_or(if ms < 0 { i64::MIN } else { i64::MAX })
}

/// Accepts RFC 3339 (`2024-05-01T09:00:00Z`) or raw epoch milliseconds.
pub(crate) fn parse_timestamp(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }
    OffsetDateTime::parse(raw, &Rfc3339)
        .map(epoch_ms)
        .with_context(|| format!("invalid timestamp {raw:?} (expected RFC 3339 or epoch ms)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_and_epoch_ms_agree() {
        let ms = parse_timestamp("2024-05-01T09:00:00Z").expect("rfc3339");
        assert_eq!(ms, 1_714_554_000_000);
        assert_eq!(parse_timestamp("1714554000000").expect("ms"), ms);
        assert_eq!(format_ms(ms), "2024-05-01T09:00:00Z");
    }

    #[test]
    fn sub_second_and_out_of_range_instants_format() {
        assert!(format_ms(1_714_554_000_250).starts_with("2024-05-01T09:00:00.25"));
        assert_eq!(format_ms(i64::MAX), i64::MAX.to_string());
    }

    #[test]
    fn offsets_are_normalized_to_utc_instants() {
        let ms = parse_timestamp("2024-05-01T11:00:00+02:00").expect("offset");
        assert_eq!(ms, 1_714_554_000_000);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_timestamp("next tuesday").is_err());
    }
}
