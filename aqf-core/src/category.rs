use serde::{Deserialize, Serialize};
use std::fmt;

/// OpenWeatherMap reports AQI as an ordinal index from 1 (best) to 5 (worst).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    Hazardous,
    Unknown,
}

impl AqiCategory {
    pub fn from_index(aqi: u32) -> Self {
        match aqi {
            1 => AqiCategory::Good,
            2 => AqiCategory::Moderate,
            3 => AqiCategory::UnhealthyForSensitiveGroups,
            4 => AqiCategory::Unhealthy,
            5 => AqiCategory::Hazardous,
            _ => AqiCategory::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for sensitive groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
            AqiCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::AqiCategory;

    #[test]
    fn test_from_index() {
        assert_eq!(AqiCategory::from_index(1), AqiCategory::Good);
        assert_eq!(AqiCategory::from_index(3), AqiCategory::UnhealthyForSensitiveGroups);
        assert_eq!(AqiCategory::from_index(5), AqiCategory::Hazardous);
        assert_eq!(AqiCategory::from_index(0), AqiCategory::Unknown);
        assert_eq!(AqiCategory::from_index(6), AqiCategory::Unknown);
    }

    #[test]
    fn test_label() {
        assert_eq!(AqiCategory::Unhealthy.to_string(), "Unhealthy");
        assert_eq!(AqiCategory::Unknown.label(), "Unknown");
    }
}
