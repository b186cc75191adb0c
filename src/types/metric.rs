//! Semantic metric names shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// A semantic environmental metric.
///
/// Declaration order is significant: it is the evaluation order used by the
/// field mapper and the column order of exported CSV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Pm25,
    Pm10,
    Temperature,
    Humidity,
    Noise,
    Co2,
}

impl Metric {
    /// All metrics in evaluation order.
    pub const ALL: [Metric; 6] = [
        Metric::Pm25,
        Metric::Pm10,
        Metric::Temperature,
        Metric::Humidity,
        Metric::Noise,
        Metric::Co2,
    ];

    /// Wire name (`pm25`, `pm10`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Pm25 => "pm25",
            Metric::Pm10 => "pm10",
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Noise => "noise",
            Metric::Co2 => "co2",
        }
    }

    /// Fixed display unit for summaries.
    pub fn unit(self) -> &'static str {
        match self {
            Metric::Pm25 | Metric::Pm10 => "µg/m³",
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
            Metric::Noise => "dB",
            Metric::Co2 => "ppm",
        }
    }

    /// Parse a wire name. Accepts the OpenAQ parameter spelling as well.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "pm25" | "pm2.5" => Some(Metric::Pm25),
            "pm10" => Some(Metric::Pm10),
            "temperature" => Some(Metric::Temperature),
            "humidity" | "relativehumidity" => Some(Metric::Humidity),
            "noise" => Some(Metric::Noise),
            "co2" => Some(Metric::Co2),
            _ => None,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names_match_as_str() {
        for metric in Metric::ALL {
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.as_str()));
        }
    }

    #[test]
    fn test_from_name_accepts_openaq_spelling() {
        assert_eq!(Metric::from_name("PM2.5"), Some(Metric::Pm25));
        assert_eq!(Metric::from_name("relativehumidity"), Some(Metric::Humidity));
        assert_eq!(Metric::from_name("o3"), None);
    }
}
