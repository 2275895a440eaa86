//! Pure weather-to-risk analysis.
//!
//! [`analyze`] turns raw observations and forecasts into risk flags, reasons,
//! and per-station display summaries. It is a pure function of its inputs:
//! no clock, no network, no hidden state.
//!
//! Station roles come from position in the station list: index 0 is the
//! departure station (matched against the departure instant), index 1 the
//! destination (matched against the arrival instant).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::scoring::{
    FACTOR_WX_LOW_CEILING, FACTOR_WX_LOW_VISIBILITY, FACTOR_WX_STRONG_WIND,
    FACTOR_WX_THUNDERSTORM, FACTOR_WX_WIND_SHEAR,
};

use super::{
    FlightRules, ForecastPeriod, StationForecast, WeatherObservation, VISIBILITY_DISPLAY_CAP_SM,
};

/// Ceilings below this height raise the low-ceiling factor.
pub const CEILING_FLAG_FT: u32 = 1000;
/// Visibility below this raises the low-visibility factor.
pub const VISIBILITY_FLAG_SM: f64 = 3.0;
/// Sustained or gust winds above this raise the strong-wind factor.
pub const WIND_FLAG_KT: u32 = 15;
/// Observations further than this from the flight time are not current.
pub const OBSERVATION_WINDOW_MINUTES: i64 = 90;

/// Matches wind shear groups in raw report text (`WS010/27050KT`, `WSCONDS`).
fn wind_shear_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\bWS(\d{3}|CONDS)").expect("invalid wind shear pattern"))
}

/// Everything the analysis produced for one station/source pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSummary {
    /// Station identifier.
    pub station: String,
    /// Where the summarized data came from (`METAR` or `TAF`).
    pub source: String,
    /// Flight-rules category of the summarized conditions.
    pub flight_rules: FlightRules,
    /// Human-readable conditions line.
    pub summary: String,
}

/// Output of a weather analysis pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherAnalysis {
    /// Risk factor ids raised by the analyzed weather.
    pub flags: BTreeSet<String>,
    /// Why each factor was raised, keyed by factor id.
    pub reasons: BTreeMap<String, String>,
    /// Display summaries, one per station per available source.
    pub stations: Vec<StationSummary>,
}

impl WeatherAnalysis {
    fn flag(&mut self, id: &str, reason: String) {
        self.flags.insert(id.to_string());
        self.reasons
            .entry(id.to_string())
            .and_modify(|existing| {
                existing.push_str("; ");
                existing.push_str(&reason);
            })
            .or_insert(reason);
    }
}

/// Meteorological fields shared by observations and forecast periods.
struct Conditions<'a> {
    ceiling_ft: Option<u32>,
    visibility_sm: Option<f64>,
    wind_speed_kt: Option<u32>,
    wind_gust_kt: Option<u32>,
    wx_codes: &'a [String],
}

impl<'a> From<&'a WeatherObservation> for Conditions<'a> {
    fn from(ob: &'a WeatherObservation) -> Self {
        Self {
            ceiling_ft: ob.ceiling_ft,
            visibility_sm: ob.visibility_sm,
            wind_speed_kt: ob.wind_speed_kt,
            wind_gust_kt: ob.wind_gust_kt,
            wx_codes: &ob.wx_codes,
        }
    }
}

impl<'a> From<&'a ForecastPeriod> for Conditions<'a> {
    fn from(p: &'a ForecastPeriod) -> Self {
        Self {
            ceiling_ft: p.ceiling_ft,
            visibility_sm: p.visibility_sm,
            wind_speed_kt: p.wind_speed_kt,
            wind_gust_kt: p.wind_gust_kt,
            wx_codes: &p.wx_codes,
        }
    }
}

impl Conditions<'_> {
    fn flight_rules(&self) -> FlightRules {
        FlightRules::categorize(self.ceiling_ft, self.visibility_sm)
    }

    /// Human-readable conditions line, visibility capped for display.
    fn summary(&self) -> String {
        let sky = match self.ceiling_ft {
            Some(c) => format!("ceiling {c} ft"),
            None => "no ceiling".to_string(),
        };
        let visibility = match self.visibility_sm {
            Some(v) if v >= VISIBILITY_DISPLAY_CAP_SM => {
                format!("visibility {VISIBILITY_DISPLAY_CAP_SM}+ sm")
            }
            Some(v) => format!("visibility {v} sm"),
            None => "visibility unknown".to_string(),
        };
        let wind = match (self.wind_speed_kt, self.wind_gust_kt) {
            (Some(s), Some(g)) => format!("wind {s} kt gusting {g} kt"),
            (Some(0), None) | (None, None) => "wind calm".to_string(),
            (Some(s), None) => format!("wind {s} kt"),
            (None, Some(g)) => format!("gusts {g} kt"),
        };
        format!("{sky}, {visibility}, {wind}")
    }
}

/// Analyze weather with the standard observation currency window.
#[must_use]
pub fn analyze(
    observations: &[WeatherObservation],
    forecasts: &[StationForecast],
    stations: &[String],
    departure: Option<DateTime<Utc>>,
    arrival: Option<DateTime<Utc>>,
) -> WeatherAnalysis {
    analyze_with_window(
        observations,
        forecasts,
        stations,
        departure,
        arrival,
        Duration::minutes(OBSERVATION_WINDOW_MINUTES),
    )
}

/// Analyze weather with an explicit observation currency window.
///
/// Per station: observation rules apply only when the observation is within
/// `window` of that station's relevant instant, or unconditionally when no
/// instant resolved (incomplete scheduling never silently drops data).
/// Forecast rules apply to the period covering the instant, falling back to
/// the latest period; with no instant at all, the single worst period is
/// summarized so unknown timing never under-represents risk.
#[must_use]
pub fn analyze_with_window(
    observations: &[WeatherObservation],
    forecasts: &[StationForecast],
    stations: &[String],
    departure: Option<DateTime<Utc>>,
    arrival: Option<DateTime<Utc>>,
    window: Duration,
) -> WeatherAnalysis {
    let mut out = WeatherAnalysis::default();

    for (index, station) in stations.iter().enumerate() {
        if station.is_empty() {
            continue;
        }
        let relevant = if index == 0 { departure } else { arrival };

        analyze_observation(&mut out, observations, station, relevant, window);
        analyze_forecast(&mut out, forecasts, station, relevant);
    }

    out
}

fn analyze_observation(
    out: &mut WeatherAnalysis,
    observations: &[WeatherObservation],
    station: &str,
    relevant: Option<DateTime<Utc>>,
    window: Duration,
) {
    let Some(ob) = observations
        .iter()
        .filter(|o| o.station == station)
        .max_by_key(|o| o.observed_at)
    else {
        return;
    };

    let current = match (relevant, ob.observed_at) {
        (Some(instant), Some(observed)) => (observed - instant).abs() <= window,
        // No resolved instant, or an undated report: treat as current
        _ => true,
    };

    let conditions = Conditions::from(ob);
    if current {
        apply_rules(out, station, &conditions);
    }
    if wind_shear_token().is_match(&ob.raw_text) {
        out.flag(
            FACTOR_WX_WIND_SHEAR,
            format!("{station}: wind shear reported"),
        );
    }

    out.stations.push(StationSummary {
        station: station.to_string(),
        source: "METAR".to_string(),
        flight_rules: conditions.flight_rules(),
        summary: conditions.summary(),
    });
}

fn analyze_forecast(
    out: &mut WeatherAnalysis,
    forecasts: &[StationForecast],
    station: &str,
    relevant: Option<DateTime<Utc>>,
) {
    let Some(forecast) = forecasts.iter().find(|f| f.station == station) else {
        return;
    };
    if forecast.periods.is_empty() {
        return;
    }

    // Wind shear from any period's shear field, independent of which period
    // is selected below.
    if forecast
        .periods
        .iter()
        .any(|p| p.wind_shear_height_ft.is_some())
    {
        out.flag(
            FACTOR_WX_WIND_SHEAR,
            format!("{station}: wind shear forecast"),
        );
    }

    let period = match relevant {
        Some(instant) => forecast
            .periods
            .iter()
            .find(|p| p.covers(instant))
            .or_else(|| forecast.periods.last()),
        None => forecast
            .periods
            .iter()
            .max_by_key(|p| Conditions::from(*p).flight_rules()),
    };
    let Some(period) = period else {
        return;
    };

    let conditions = Conditions::from(period);
    apply_rules(out, station, &conditions);

    out.stations.push(StationSummary {
        station: station.to_string(),
        source: "TAF".to_string(),
        flight_rules: conditions.flight_rules(),
        summary: conditions.summary(),
    });
}

fn apply_rules(out: &mut WeatherAnalysis, station: &str, conditions: &Conditions<'_>) {
    if let Some(ceiling) = conditions.ceiling_ft {
        if ceiling < CEILING_FLAG_FT {
            out.flag(
                FACTOR_WX_LOW_CEILING,
                format!("{station}: ceiling {ceiling} ft"),
            );
        }
    }

    if let Some(visibility) = conditions.visibility_sm {
        if visibility < VISIBILITY_FLAG_SM {
            out.flag(
                FACTOR_WX_LOW_VISIBILITY,
                format!("{station}: visibility {visibility} sm"),
            );
        }
    }

    let peak_wind = conditions
        .wind_speed_kt
        .max(conditions.wind_gust_kt)
        .unwrap_or(0);
    if peak_wind > WIND_FLAG_KT {
        out.flag(
            FACTOR_WX_STRONG_WIND,
            format!("{station}: wind {peak_wind} kt"),
        );
    }

    if conditions.wx_codes.iter().any(|code| code.contains("TS")) {
        out.flag(
            FACTOR_WX_THUNDERSTORM,
            format!("{station}: thunderstorms present"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    fn observation(station: &str) -> WeatherObservation {
        WeatherObservation {
            station: station.to_string(),
            observed_at: Some(at(12, 0)),
            ceiling_ft: None,
            visibility_sm: Some(10.0),
            wind_speed_kt: Some(5),
            ..WeatherObservation::default()
        }
    }

    fn stations(ids: &[&str]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_low_ceiling_flagged_within_window() {
        let mut ob = observation("KSFF");
        ob.ceiling_ft = Some(800);

        let analysis = analyze(&[ob], &[], &stations(&["KSFF"]), Some(at(12, 30)), None);

        assert!(analysis.flags.contains(FACTOR_WX_LOW_CEILING));
        assert!(!analysis.flags.contains(FACTOR_WX_STRONG_WIND));
        assert!(analysis.reasons[FACTOR_WX_LOW_CEILING].contains("800"));
    }

    #[test]
    fn test_stale_observation_not_flagged() {
        let mut ob = observation("KSFF");
        ob.ceiling_ft = Some(800);

        // Departure four hours after the observation
        let analysis = analyze(&[ob], &[], &stations(&["KSFF"]), Some(at(16, 0)), None);

        assert!(analysis.flags.is_empty());
        // Summary is still shown for the stale report
        assert_eq!(analysis.stations.len(), 1);
    }

    #[test]
    fn test_unscheduled_observation_treated_as_current() {
        let mut ob = observation("KSFF");
        ob.ceiling_ft = Some(800);

        let analysis = analyze(&[ob], &[], &stations(&["KSFF"]), None, None);

        assert!(analysis.flags.contains(FACTOR_WX_LOW_CEILING));
    }

    #[test]
    fn test_visibility_and_wind_flags() {
        let mut ob = observation("KSFF");
        ob.visibility_sm = Some(2.0);
        ob.wind_speed_kt = Some(12);
        ob.wind_gust_kt = Some(22);

        let analysis = analyze(&[ob], &[], &stations(&["KSFF"]), Some(at(12, 0)), None);

        assert!(analysis.flags.contains(FACTOR_WX_LOW_VISIBILITY));
        assert!(analysis.flags.contains(FACTOR_WX_STRONG_WIND));
        assert!(analysis.reasons[FACTOR_WX_STRONG_WIND].contains("22"));
    }

    #[test]
    fn test_thunderstorm_code_flagged() {
        let mut ob = observation("KSFF");
        ob.wx_codes = vec!["+TSRA".to_string()];

        let analysis = analyze(&[ob], &[], &stations(&["KSFF"]), Some(at(12, 0)), None);

        assert!(analysis.flags.contains(FACTOR_WX_THUNDERSTORM));
    }

    #[test]
    fn test_wind_shear_in_raw_text_ignores_window() {
        let mut ob = observation("KSFF");
        ob.raw_text = "TAF KSFF 011130Z 0112/0212 27012KT WS010/27050KT".to_string();

        // Far outside the currency window: shear still flagged
        let analysis = analyze(&[ob], &[], &stations(&["KSFF"]), Some(at(23, 0)), None);

        assert!(analysis.flags.contains(FACTOR_WX_WIND_SHEAR));
        assert!(!analysis.flags.contains(FACTOR_WX_STRONG_WIND));
    }

    #[test]
    fn test_wind_shift_remark_not_shear() {
        let mut ob = observation("KSFF");
        ob.raw_text = "KSFF 121853Z 27005KT 10SM CLR RMK WSHFT 1830".to_string();

        let analysis = analyze(&[ob], &[], &stations(&["KSFF"]), Some(at(12, 0)), None);

        assert!(!analysis.flags.contains(FACTOR_WX_WIND_SHEAR));
    }

    #[test]
    fn test_destination_matched_against_arrival() {
        let mut destination_ob = observation("KGEG");
        destination_ob.ceiling_ft = Some(600);
        destination_ob.observed_at = Some(at(14, 0));

        let analysis = analyze(
            &[observation("KSFF"), destination_ob],
            &[],
            &stations(&["KSFF", "KGEG"]),
            Some(at(12, 0)),
            Some(at(14, 15)),
        );

        assert!(analysis.flags.contains(FACTOR_WX_LOW_CEILING));
        assert!(analysis.reasons[FACTOR_WX_LOW_CEILING].contains("KGEG"));
    }

    #[test]
    fn test_forecast_period_covering_instant_selected() {
        let forecast = StationForecast {
            station: "KSFF".to_string(),
            periods: vec![
                ForecastPeriod {
                    valid_from: Some(at(6, 0)),
                    valid_to: Some(at(12, 0)),
                    ceiling_ft: Some(400),
                    ..ForecastPeriod::default()
                },
                ForecastPeriod {
                    valid_from: Some(at(12, 0)),
                    valid_to: Some(at(18, 0)),
                    ceiling_ft: Some(5000),
                    ..ForecastPeriod::default()
                },
            ],
        };

        let analysis = analyze(&[], &[forecast], &stations(&["KSFF"]), Some(at(13, 0)), None);

        // The 12-18Z period covers departure; its 5,000 ft ceiling is fine
        assert!(!analysis.flags.contains(FACTOR_WX_LOW_CEILING));
        assert_eq!(analysis.stations.len(), 1);
        assert_eq!(analysis.stations[0].source, "TAF");
        assert_eq!(analysis.stations[0].flight_rules, FlightRules::Vfr);
    }

    #[test]
    fn test_forecast_falls_back_to_latest_period() {
        let forecast = StationForecast {
            station: "KSFF".to_string(),
            periods: vec![
                ForecastPeriod {
                    valid_from: Some(at(0, 0)),
                    valid_to: Some(at(6, 0)),
                    ceiling_ft: Some(5000),
                    ..ForecastPeriod::default()
                },
                ForecastPeriod {
                    valid_from: Some(at(6, 0)),
                    valid_to: Some(at(12, 0)),
                    ceiling_ft: Some(700),
                    ..ForecastPeriod::default()
                },
            ],
        };

        // Departure after every period: latest period is used
        let analysis = analyze(&[], &[forecast], &stations(&["KSFF"]), Some(at(20, 0)), None);

        assert!(analysis.flags.contains(FACTOR_WX_LOW_CEILING));
    }

    #[test]
    fn test_forecast_without_instant_summarizes_worst_period() {
        let forecast = StationForecast {
            station: "KSFF".to_string(),
            periods: vec![
                ForecastPeriod {
                    valid_from: Some(at(0, 0)),
                    valid_to: Some(at(6, 0)),
                    ceiling_ft: Some(5000),
                    ..ForecastPeriod::default()
                },
                ForecastPeriod {
                    valid_from: Some(at(6, 0)),
                    valid_to: Some(at(12, 0)),
                    ceiling_ft: Some(300),
                    visibility_sm: Some(0.75),
                    ..ForecastPeriod::default()
                },
            ],
        };

        let analysis = analyze(&[], &[forecast], &stations(&["KSFF"]), None, None);

        assert_eq!(analysis.stations[0].flight_rules, FlightRules::Ifr);
        assert!(analysis.flags.contains(FACTOR_WX_LOW_CEILING));
        assert!(analysis.flags.contains(FACTOR_WX_LOW_VISIBILITY));
    }

    #[test]
    fn test_forecast_wind_shear_field_flagged() {
        let forecast = StationForecast {
            station: "KSFF".to_string(),
            periods: vec![
                ForecastPeriod {
                    valid_from: Some(at(0, 0)),
                    valid_to: Some(at(6, 0)),
                    wind_shear_height_ft: Some(2000),
                    ..ForecastPeriod::default()
                },
                ForecastPeriod {
                    valid_from: Some(at(6, 0)),
                    valid_to: Some(at(12, 0)),
                    ..ForecastPeriod::default()
                },
            ],
        };

        // The selected period (6-12Z) has no shear; the flag still raises
        // from the earlier period's field.
        let analysis = analyze(&[], &[forecast], &stations(&["KSFF"]), Some(at(7, 0)), None);

        assert!(analysis.flags.contains(FACTOR_WX_WIND_SHEAR));
    }

    #[test]
    fn test_no_data_for_station_is_empty_result() {
        let analysis = analyze(&[], &[], &stations(&["KSFF"]), Some(at(12, 0)), None);

        assert!(analysis.flags.is_empty());
        assert!(analysis.stations.is_empty());
    }

    #[test]
    fn test_same_flag_from_both_stations_joins_reasons() {
        let mut a = observation("KSFF");
        a.ceiling_ft = Some(800);
        let mut b = observation("KGEG");
        b.ceiling_ft = Some(900);

        let analysis = analyze(
            &[a, b],
            &[],
            &stations(&["KSFF", "KGEG"]),
            Some(at(12, 0)),
            Some(at(12, 30)),
        );

        let reason = &analysis.reasons[FACTOR_WX_LOW_CEILING];
        assert!(reason.contains("KSFF"));
        assert!(reason.contains("KGEG"));
    }

    #[test]
    fn test_summary_caps_visibility_display() {
        let mut ob = observation("KSFF");
        ob.visibility_sm = Some(30.0);

        let analysis = analyze(&[ob], &[], &stations(&["KSFF"]), Some(at(12, 0)), None);

        assert!(analysis.stations[0].summary.contains("10+ sm"));
    }
}
