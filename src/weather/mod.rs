//! Weather models and analysis for flight risk assessment.
//!
//! This module defines the observation and forecast records returned by the
//! weather provider, the flight-rules categorization derived from them, and
//! (in [`analysis`]) the pure rules engine that turns raw weather into risk
//! flags. The HTTP client for the provider lives in [`provider`].

pub mod analysis;
pub mod provider;

pub use analysis::{analyze, analyze_with_window, StationSummary, WeatherAnalysis};
pub use provider::{HttpWeatherProvider, WeatherProvider};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visibility at or above this value is reported as unlimited for display.
pub const VISIBILITY_DISPLAY_CAP_SM: f64 = 10.0;

/// A point-in-time weather observation for one station (METAR-like).
///
/// Fields are individually optional so a sparse provider record still
/// deserializes; absent fields simply contribute nothing to analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherObservation {
    /// Reporting station identifier.
    pub station: String,
    /// When the observation was taken.
    pub observed_at: Option<DateTime<Utc>>,
    /// Ceiling in feet AGL; `None` means no ceiling (clear or few/scattered).
    pub ceiling_ft: Option<u32>,
    /// Visibility in statute miles.
    pub visibility_sm: Option<f64>,
    /// Sustained wind speed in knots.
    pub wind_speed_kt: Option<u32>,
    /// Wind gust speed in knots.
    pub wind_gust_kt: Option<u32>,
    /// Wind direction in degrees true.
    pub wind_dir_deg: Option<u32>,
    /// Present-weather codes (e.g. `-RA`, `TSRA`, `BR`).
    pub wx_codes: Vec<String>,
    /// The raw report text.
    pub raw_text: String,
}

/// One validity period of a station forecast (TAF-like).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastPeriod {
    /// Start of the validity window (inclusive).
    pub valid_from: Option<DateTime<Utc>>,
    /// End of the validity window (exclusive).
    pub valid_to: Option<DateTime<Utc>>,
    /// Forecast ceiling in feet AGL; `None` means no ceiling.
    pub ceiling_ft: Option<u32>,
    /// Forecast visibility in statute miles.
    pub visibility_sm: Option<f64>,
    /// Forecast sustained wind speed in knots.
    pub wind_speed_kt: Option<u32>,
    /// Forecast wind gust speed in knots.
    pub wind_gust_kt: Option<u32>,
    /// Forecast wind direction in degrees true.
    pub wind_dir_deg: Option<u32>,
    /// Forecast present-weather codes.
    pub wx_codes: Vec<String>,
    /// Wind shear layer height in feet AGL, when the forecast carries one.
    pub wind_shear_height_ft: Option<u32>,
}

impl ForecastPeriod {
    /// Whether this period's validity window covers the given instant.
    ///
    /// Periods with an incomplete window cover nothing.
    #[must_use]
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        match (self.valid_from, self.valid_to) {
            (Some(from), Some(to)) => from <= instant && instant < to,
            _ => false,
        }
    }
}

/// An ordered forecast document for one station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationForecast {
    /// Forecast station identifier.
    pub station: String,
    /// Validity periods in document order.
    pub periods: Vec<ForecastPeriod>,
}

/// Everything the weather provider returned for one request.
///
/// A station with no data simply has no entries here; that is a valid
/// response, not a fault.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherBundle {
    /// Observations for the requested stations.
    pub observations: Vec<WeatherObservation>,
    /// Forecast documents for the requested stations.
    pub forecasts: Vec<StationForecast>,
}

/// Coarse ceiling/visibility severity bucket.
///
/// Ordered from best to worst, so `max` over a set of categories yields the
/// worst conditions found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlightRules {
    /// Visual flight rules.
    Vfr,
    /// Marginal VFR.
    Mvfr,
    /// Instrument flight rules.
    Ifr,
    /// Low IFR.
    Lifr,
}

impl FlightRules {
    /// Categorize a ceiling/visibility pair.
    ///
    /// A missing ceiling means no ceiling; missing visibility is treated as
    /// unrestricted.
    #[must_use]
    pub fn categorize(ceiling_ft: Option<u32>, visibility_sm: Option<f64>) -> Self {
        let ceiling = f64::from(ceiling_ft.unwrap_or(u32::MAX));
        let visibility = visibility_sm.unwrap_or(f64::MAX);

        if ceiling < 200.0 || visibility < 0.5 {
            Self::Lifr
        } else if ceiling < 500.0 || visibility < 1.0 {
            Self::Ifr
        } else if ceiling < 1000.0 || visibility < 3.0 {
            Self::Mvfr
        } else {
            Self::Vfr
        }
    }
}

impl std::fmt::Display for FlightRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vfr => write!(f, "VFR"),
            Self::Mvfr => write!(f, "MVFR"),
            Self::Ifr => write!(f, "IFR"),
            Self::Lifr => write!(f, "LIFR"),
        }
    }
}
