//! Value sequences for the sweep axes of an experiment series.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest decade exponent of the logarithmic sweep.
const LOG_SCALE_MAX_DECADE: u32 = 7;

/// In the last decade, only multipliers up to this one are used, so the sweep ends at 2×10^7.
const LOG_SCALE_LAST_DECADE_MAX_MULTIPLIER: u64 = 2;

/// A single value of a scaling axis.
///
/// Most axes are integral (table entries, header counts, ...), but some are fractions (e.g. the
/// offered load as a fraction of the link rate).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleValue {
    Int(u64),
    Float(f64),
}

impl ScaleValue {
    /// Returns the integral value, if this is one.
    pub fn as_int(&self) -> Option<u64> {
        match self {
            ScaleValue::Int(v) => Some(*v),
            ScaleValue::Float(_) => None,
        }
    }
}

impl fmt::Display for ScaleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleValue::Int(v) => write!(f, "{}", v),
            ScaleValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<u64> for ScaleValue {
    fn from(v: u64) -> Self {
        ScaleValue::Int(v)
    }
}

impl From<f64> for ScaleValue {
    fn from(v: f64) -> Self {
        ScaleValue::Float(v)
    }
}

/// Turn a list of integers into axis values.
pub fn ints(values: &[u64]) -> Vec<ScaleValue> {
    values.iter().copied().map(ScaleValue::Int).collect()
}

/// Append `value` to `values` unless it is already there. Keeps axes duplicate-free.
pub fn push_unique(values: &mut Vec<ScaleValue>, value: ScaleValue) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// The logarithmic sweep used for wide-range axes such as the number of table entries:
/// `1, 2, ..., 9, 10, 20, ..., 90, 100, ..., 10^7, 2*10^7`.
///
/// Experiment results are identified by these values, so this sequence must not change.
pub fn log_scale() -> Vec<u64> {
    let mut scale = Vec::new();

    for decade in 0..=LOG_SCALE_MAX_DECADE {
        for multiplier in 1..=9u64 {
            if decade == LOG_SCALE_MAX_DECADE && multiplier > LOG_SCALE_LAST_DECADE_MAX_MULTIPLIER {
                break;
            }

            let value = 10u64.pow(decade) * multiplier;
            if !scale.contains(&value) {
                scale.push(value);
            }
        }
    }

    scale
}

/// Offered load as a fraction of the maximum rate: `0.01, 0.02, ..., 0.10`.
pub fn load_rates() -> Vec<ScaleValue> {
    (1..=10u32)
        .map(|i| ScaleValue::Float(f64::from(i) / 100.0))
        .collect()
}

/// Header counts for the deparser experiments: every value below 10, then steps of 10 below
/// 150, starting at `first`.
pub fn header_counts(first: u64) -> Vec<ScaleValue> {
    (first..10).chain((10..150).step_by(10)).map(ScaleValue::Int).collect()
}

/// Number of tables for the table-count experiments.
pub const TABLES: &[u64] = &[
    1, 2, 3, 4, 6, 8, 10, 16, 20, 32, 50, 64, 100, 128, 150, 200, 256, 300, 400, 512, 700, 900,
    1024,
];

/// Number of applications of the same table.
pub const REPEATED_TABLES: &[u64] = &[1, 2, 3, 4, 6, 8, 10, 16, 20, 32, 64, 128, 256, 512, 1024];

/// Number of action data entries.
pub const ACTION_DATA: &[u64] = &[1, 2, 4, 8, 10, 20, 40, 80, 100, 200, 400, 800, 1000, 2000];

/// Number of match keys.
pub const MATCH_KEYS: &[u64] = &[
    1, 2, 3, 4, 6, 8, 10, 16, 20, 32, 50, 64, 100, 128, 150, 200, 256, 470,
];

/// Number of parsed header fields. Needs large packets, see `PACKET_SIZE_LARGE`.
pub const PARSED_FIELDS: &[u64] = &[
    0, 1, 2, 4, 6, 8, 10, 12, 16, 20, 25, 32, 40, 50, 64, 80, 100, 128, 150, 200, 256, 300, 350,
    400, 470,
];

/// Number of header or metadata field writes.
pub const FIELD_WRITES: &[u64] = &[0, 1, 2, 4, 8, 16, 32, 64, 128, 200, 256, 350, 470];

/// Default packet size sweep, in bytes.
pub const PACKET_SIZES: &[u64] = &[64, 128, 256, 512, 1024, 1500];

/// Packet size large enough to hold 470 one-byte header fields.
pub const PACKET_SIZE_LARGE: u64 = 512;

/// Fixed packet size for the deparser experiments.
pub const PACKET_SIZE_DEPARSER: u64 = 300;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn log_scale_is_strictly_increasing() {
        let scale = log_scale();
        assert!(scale.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(scale.first(), Some(&1));
        assert_eq!(scale.last(), Some(&20_000_000));
    }

    #[test]
    fn log_scale_covers_every_decade() {
        let scale = log_scale();
        // 7 full decades of 9 multipliers, plus 10^7 and 2*10^7.
        assert_eq!(scale.len(), 7 * 9 + 2);
        assert_eq!(&scale[..10], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert!(scale.contains(&900_000));
        assert!(scale.contains(&10_000_000));
        assert!(!scale.contains(&30_000_000));
    }

    #[test]
    fn load_rates_are_percent_steps() {
        let rates = load_rates();
        assert_eq!(rates.len(), 10);
        assert_eq!(rates[0], ScaleValue::Float(0.01));
        assert_eq!(rates[2], ScaleValue::Float(0.03));
        assert_eq!(rates[9], ScaleValue::Float(0.1));
    }

    #[test]
    fn header_counts() {
        let added = super::header_counts(0);
        assert_eq!(added.len(), 10 + 14);
        assert_eq!(added[0], ScaleValue::Int(0));
        assert_eq!(added.last(), Some(&ScaleValue::Int(140)));

        let sized = super::header_counts(1);
        assert_eq!(sized[0], ScaleValue::Int(1));
        assert_eq!(sized.len(), 9 + 14);
    }

    #[test]
    fn push_unique_skips_duplicates() {
        let mut values = ints(&[1, 2, 3, 4]);
        push_unique(&mut values, ScaleValue::Int(2));
        push_unique(&mut values, ScaleValue::Int(8));
        assert_eq!(values, ints(&[1, 2, 3, 4, 8]));
    }

    #[test]
    fn display() {
        assert_eq!(ScaleValue::Int(20_000_000).to_string(), "20000000");
        assert_eq!(ScaleValue::Float(0.05).to_string(), "0.05");
    }
}
