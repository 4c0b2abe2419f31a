//! Vote history for the topic chart.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeFrame {
    OneHour,
    SixHours,
    OneDay,
    OneWeek,
    OneMonth,
    #[default]
    All,
}

impl TimeFrame {
    pub const ALL: [TimeFrame; 6] = [
        TimeFrame::OneHour,
        TimeFrame::SixHours,
        TimeFrame::OneDay,
        TimeFrame::OneWeek,
        TimeFrame::OneMonth,
        TimeFrame::All,
    ];

    /// Bucket width requested from the server.
    pub fn interval(self) -> &'static str {
        match self {
            TimeFrame::OneHour | TimeFrame::SixHours => "1m",
            TimeFrame::OneDay => "5m",
            TimeFrame::OneWeek => "30m",
            TimeFrame::OneMonth => "3h",
            TimeFrame::All => "12h",
        }
    }

    pub fn time_range(self) -> &'static str {
        match self {
            TimeFrame::OneHour => "1h",
            TimeFrame::SixHours => "6h",
            TimeFrame::OneDay => "1d",
            TimeFrame::OneWeek => "1w",
            TimeFrame::OneMonth => "30d",
            TimeFrame::All => "all",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeFrame::OneHour => "1H",
            TimeFrame::SixHours => "6H",
            TimeFrame::OneDay => "1D",
            TimeFrame::OneWeek => "1W",
            TimeFrame::OneMonth => "1M",
            TimeFrame::All => "ALL",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeFrame {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeFrame::ALL
            .into_iter()
            .find(|tf| tf.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SeriesError::UnknownTimeFrame(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("unknown time frame {0:?} (expected 1H, 6H, 1D, 1W, 1M or ALL)")]
    UnknownTimeFrame(String),
    #[error("unreadable timestamp {0:?}")]
    Timestamp(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionTally {
    pub count: i64,
    #[serde(default)]
    pub percent: f64,
}

/// Body of `GET /votes/topic/{id}`: timestamp → option index → tally.
pub type WireSeries = HashMap<String, HashMap<String, OptionTally>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub at: DateTime<Utc>,
    /// `MM/DD HH:mm`
    pub label: String,
    pub tallies: Vec<OptionTally>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SeriesError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| SeriesError::Timestamp(raw.to_string()))
}

/// Orders the buckets by time and lines tallies up with the topic's options.
pub fn series_from_wire(wire: WireSeries, options: usize) -> Result<Vec<SeriesPoint>, SeriesError> {
    let mut points = wire
        .into_iter()
        .map(|(raw, mut by_option)| {
            let at = parse_timestamp(&raw)?;
            let tallies = (0..options)
                .map(|i| by_option.remove(&i.to_string()).unwrap_or_default())
                .collect();
            Ok(SeriesPoint {
                at,
                label: at.format("%m/%d %H:%M").to_string(),
                tallies,
            })
        })
        .collect::<Result<Vec<_>, SeriesError>>()?;
    points.sort_by_key(|p| p.at);
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn time_frames_map_to_server_params() {
        let params: Vec<(&str, &str)> = TimeFrame::ALL
            .iter()
            .map(|tf| (tf.interval(), tf.time_range()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("1m", "1h"),
                ("1m", "6h"),
                ("5m", "1d"),
                ("30m", "1w"),
                ("3h", "30d"),
                ("12h", "all"),
            ]
        );
    }

    #[test]
    fn time_frame_parses_case_insensitively() {
        assert_eq!("1m".parse::<TimeFrame>(), Ok(TimeFrame::OneMonth));
        assert_eq!("all".parse::<TimeFrame>(), Ok(TimeFrame::All));
        assert!("2D".parse::<TimeFrame>().is_err());
    }

    #[test]
    fn series_is_sorted_and_padded() {
        let wire: WireSeries = serde_json::from_value(serde_json::json!({
            "2025-05-02 09:30:00+00:00": {
                "0": {"count": 2, "percent": 66.67},
                "1": {"count": 1, "percent": 33.33}
            },
            "2025-05-01 21:05:00.250000+00:00": {
                "0": {"count": 1, "percent": 100.0}
            }
        }))
        .unwrap();

        let points = series_from_wire(wire, 2).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].label, "05/01 21:05");
        assert_eq!(points[0].tallies[1], OptionTally::default());
        assert_eq!(points[1].label, "05/02 09:30");
        assert_eq!(points[1].tallies[0].count, 2);
    }

    #[test]
    fn accepts_rfc3339_and_naive_stamps() {
        assert!(parse_timestamp("2025-05-01T10:00:00Z").is_ok());
        assert!(parse_timestamp("2025-05-01 10:00:00").is_ok());
        assert_eq!(
            parse_timestamp("yesterday"),
            Err(SeriesError::Timestamp("yesterday".into()))
        );
    }
}
