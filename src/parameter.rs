use serde::Serialize;
use std::fmt;

/// Pollutants published by the monitoring network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    O3,
    Pm10,
    Pm25,
    Nox,
    Co,
    So2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::O3,
        Pollutant::Pm10,
        Pollutant::Pm25,
        Pollutant::Nox,
        Pollutant::Co,
        Pollutant::So2,
    ];

    /// Look up a pollutant by canonical or wire code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "o3" => Some(Pollutant::O3),
            "pm10" => Some(Pollutant::Pm10),
            "pm25" | "pm2" => Some(Pollutant::Pm25),
            "nox" => Some(Pollutant::Nox),
            "co" => Some(Pollutant::Co),
            "so2" => Some(Pollutant::So2),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Pollutant::O3 => "o3",
            Pollutant::Pm10 => "pm10",
            Pollutant::Pm25 => "pm25",
            Pollutant::Nox => "nox",
            Pollutant::Co => "co",
            Pollutant::So2 => "so2",
        }
    }

    /// Code expected by the upstream query string.
    pub fn wire_code(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm2",
            other => other.code(),
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Normalize a requested parameter into the canonical code stored on observations.
pub fn canonical_code(parameter: &str) -> String {
    parameter.trim().to_ascii_lowercase()
}

/// Translate a canonical code into the code sent upstream.
pub fn wire_code(canonical: &str) -> String {
    let trimmed = canonical.trim().to_ascii_lowercase();
    if trimmed == Pollutant::Pm25.code() {
        Pollutant::Pm25.wire_code().to_string()
    } else {
        trimmed
    }
}
