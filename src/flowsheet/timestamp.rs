use chrono::{DateTime, FixedOffset, Local, NaiveDateTime};

use super::GridError;

/// Naive formats accepted for observation timestamps, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

/// A parsed charting time, with or without a UTC offset.
///
/// Offset times are instants; naive times are wall-clock readings. The two
/// cannot be ordered against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartTime {
    Naive(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl ChartTime {
    pub fn has_offset(&self) -> bool {
        matches!(self, ChartTime::Offset(_))
    }

    /// Comparison key: the wall-clock reading for naive times, UTC for
    /// offset times.
    pub fn instant(&self) -> NaiveDateTime {
        match self {
            ChartTime::Naive(ts) => *ts,
            ChartTime::Offset(dt) => dt.naive_utc(),
        }
    }

    /// Wall-clock time on this host.
    pub fn to_local(&self) -> NaiveDateTime {
        match self {
            ChartTime::Naive(ts) => *ts,
            ChartTime::Offset(dt) => dt.with_timezone(&Local).naive_local(),
        }
    }
}

/// Parse an observation timestamp.
pub fn parse_timestamp(raw: &str) -> Result<ChartTime, GridError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ChartTime::Offset(dt));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(ChartTime::Naive)
        .ok_or_else(|| GridError::MalformedTimestamp {
            raw: raw.to_string(),
        })
}

/// Column header date, e.g. `1/5/24`.
pub fn date_label(ts: &NaiveDateTime) -> String {
    ts.format("%-m/%-d/%y").to_string()
}

/// Column header time, e.g. `0600`.
pub fn time_label(ts: &NaiveDateTime) -> String {
    ts.format("%H%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn accepts_every_naive_format() {
        for raw in [
            "2024-01-01T06:00",
            "2024-01-01T06:00:00",
            "2024-01-01 06:00",
            "2024-01-01 06:00:00",
            "01/01/2024 06:00",
        ] {
            assert_eq!(parse_timestamp(raw).unwrap(), ChartTime::Naive(at(6, 0)), "format {raw}");
        }
    }

    #[test]
    fn offset_times_compare_in_utc() {
        let eastern = parse_timestamp("2024-01-01T06:00:00-05:00").unwrap();
        let utc = parse_timestamp("2024-01-01T11:00:00Z").unwrap();

        assert!(eastern.has_offset());
        assert_eq!(eastern.instant(), at(11, 0));
        assert_eq!(eastern.instant(), utc.instant());
        assert_ne!(
            eastern.instant(),
            parse_timestamp("2024-01-01T06:00:00+00:00").unwrap().instant()
        );
    }

    #[test]
    fn keeps_seconds() {
        let ts = parse_timestamp("2024-01-01T06:00:30").unwrap();
        assert!(ts.instant() > at(6, 0));
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "yesterday", "2024-13-01T06:00", "0600"] {
            match parse_timestamp(raw) {
                Err(GridError::MalformedTimestamp { raw: reported }) => assert_eq!(reported, raw),
                other => panic!("expected MalformedTimestamp for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn header_labels() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(date_label(&ts), "3/7/24");
        assert_eq!(time_label(&ts), "0905");
    }
}
