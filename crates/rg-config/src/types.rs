use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// HumanDuration
// ---------------------------------------------------------------------------

/// A duration parsed from a human-readable string like `"30s"`, `"5m"`, `"1h"`, `"2d"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(Duration);

impl HumanDuration {
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<HumanDuration> for Duration {
    fn from(hd: HumanDuration) -> Self {
        hd.0
    }
}

impl From<Duration> for HumanDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl FromStr for HumanDuration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty duration string");
        }

        let (num_part, suffix) = split_number_suffix(s)?;
        let value: u64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid number in duration: {s:?}"))?;

        let secs = match suffix {
            "s" => value,
            "m" => value * 60,
            "h" => value * 3600,
            "d" => value * 86400,
            _ => {
                anyhow::bail!("unsupported duration suffix {suffix:?} in {s:?} (expected s/m/h/d)")
            }
        };

        Ok(Self(Duration::from_secs(secs)))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        if secs == 0 {
            return write!(f, "0s");
        }
        if secs.is_multiple_of(86400) {
            write!(f, "{}d", secs / 86400)
        } else if secs.is_multiple_of(3600) {
            write!(f, "{}h", secs / 3600)
        } else if secs.is_multiple_of(60) {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{secs}s")
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// ErrorThreshold
// ---------------------------------------------------------------------------

/// Error threshold of a rollout group: either a percentage of the group or an
/// absolute number of failed targets.
///
/// Written as `"50%"` (percent) or `"5"` / `5` (count). Range checks are not
/// applied here; an out-of-range percentage parses fine and is reported by the
/// threshold validator against the group it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorThreshold {
    Percent(u32),
    Count(u64),
}

impl FromStr for ErrorThreshold {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty error threshold");
        }
        if let Some(pct) = s.strip_suffix('%') {
            let value: u32 = pct
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid percentage in error threshold: {s:?}"))?;
            return Ok(Self::Percent(value));
        }
        let value: u64 = s
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid error threshold {s:?} (expected \"N%\" or \"N\")"))?;
        Ok(Self::Count(value))
    }
}

impl fmt::Display for ErrorThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Count(c) => write!(f, "{c}"),
        }
    }
}

impl Serialize for ErrorThreshold {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ErrorThreshold {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(c) => Ok(Self::Count(c)),
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// SizeCheckPolicy
// ---------------------------------------------------------------------------

/// How the per-group size quota interacts with the "remaining targets" error
/// on the last group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCheckPolicy {
    /// Skip the size check on the last group when it already carries the
    /// remaining-targets error.
    #[default]
    MaskLastGroup,
    /// Report every violation, including both errors on the last group.
    ReportAll,
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Split a string like `"30s"` into `("30", "s")`.
/// Returns an error if the string is all-digits or all-letters.
fn split_number_suffix(s: &str) -> anyhow::Result<(&str, &str)> {
    let idx = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow::anyhow!("missing suffix in {s:?}"))?;
    if idx == 0 {
        anyhow::bail!("missing numeric part in {s:?}");
    }
    Ok((&s[..idx], &s[idx..]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- HumanDuration --

    #[test]
    fn duration_seconds() {
        let d: HumanDuration = "30s".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::from_secs(30));
        assert_eq!(d.to_string(), "30s");
    }

    #[test]
    fn duration_hours_normalize_to_days() {
        let d: HumanDuration = "48h".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::from_secs(48 * 3600));
        assert_eq!(d.to_string(), "2d");
    }

    #[test]
    fn duration_zero() {
        let d: HumanDuration = "0s".parse().unwrap();
        assert!(d.is_zero());
        assert_eq!(d.to_string(), "0s");
    }

    #[test]
    fn duration_errors() {
        assert!("".parse::<HumanDuration>().is_err());
        assert!("30".parse::<HumanDuration>().is_err());
        assert!("30x".parse::<HumanDuration>().is_err());
        assert!("s".parse::<HumanDuration>().is_err());
    }

    // -- ErrorThreshold --

    #[test]
    fn threshold_percent() {
        let t: ErrorThreshold = "50%".parse().unwrap();
        assert_eq!(t, ErrorThreshold::Percent(50));
        assert_eq!(t.to_string(), "50%");
    }

    #[test]
    fn threshold_count() {
        let t: ErrorThreshold = " 5 ".parse().unwrap();
        assert_eq!(t, ErrorThreshold::Count(5));
        assert_eq!(t.to_string(), "5");
    }

    #[test]
    fn threshold_out_of_range_percent_still_parses() {
        let t: ErrorThreshold = "150%".parse().unwrap();
        assert_eq!(t, ErrorThreshold::Percent(150));
    }

    #[test]
    fn threshold_errors() {
        assert!("".parse::<ErrorThreshold>().is_err());
        assert!("%".parse::<ErrorThreshold>().is_err());
        assert!("-3".parse::<ErrorThreshold>().is_err());
        assert!("ten".parse::<ErrorThreshold>().is_err());
    }

    #[test]
    fn threshold_deserialize_from_integer_or_string() {
        #[derive(Deserialize)]
        struct Holder {
            a: ErrorThreshold,
            b: ErrorThreshold,
        }
        let h: Holder = toml::from_str("a = 7\nb = \"20%\"").unwrap();
        assert_eq!(h.a, ErrorThreshold::Count(7));
        assert_eq!(h.b, ErrorThreshold::Percent(20));
    }

    // -- Serde round-trips --

    #[test]
    fn serde_roundtrip_duration() {
        let d: HumanDuration = "30s".parse().unwrap();
        let json = serde_json::to_string(&d).unwrap();
        let d2: HumanDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(d, d2);
    }

    #[test]
    fn size_check_policy_names() {
        #[derive(Deserialize)]
        struct Holder {
            p: SizeCheckPolicy,
        }
        let h: Holder = toml::from_str("p = \"report_all\"").unwrap();
        assert_eq!(h.p, SizeCheckPolicy::ReportAll);
        let h: Holder = toml::from_str("p = \"mask_last_group\"").unwrap();
        assert_eq!(h.p, SizeCheckPolicy::MaskLastGroup);
    }
}
