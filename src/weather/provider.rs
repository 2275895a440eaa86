//! Weather provider client.
//!
//! One HTTP call fetches observations and forecasts for a set of stations.
//! The provider returning nothing for a station is a valid response ("no
//! weather available"), not a fault; only transport and HTTP-level failures
//! surface as errors, and those are visible and retryable for the caller.

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

use super::WeatherBundle;

/// A source of raw weather data for a set of stations.
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch observations and forecasts for the given station identifiers.
    ///
    /// `cruise_altitude_ft` is a hint some providers use to pick winds-aloft
    /// levels; providers may ignore it.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached or answers with a
    /// failure status. Missing data for a station is not an error.
    async fn fetch(&self, stations: &[String], cruise_altitude_ft: Option<u32>)
        -> Result<WeatherBundle>;
}

/// HTTP-backed weather provider.
#[derive(Debug, Clone)]
pub struct HttpWeatherProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWeatherProvider {
    /// Create a provider against the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::weather_fetch(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait::async_trait]
impl WeatherProvider for HttpWeatherProvider {
    async fn fetch(
        &self,
        stations: &[String],
        cruise_altitude_ft: Option<u32>,
    ) -> Result<WeatherBundle> {
        let ids = stations.join(",");
        debug!("Fetching weather for stations [{}]", ids);

        let mut request = self.client.get(&self.base_url).query(&[("ids", &ids)]);
        if let Some(altitude) = cruise_altitude_ft {
            request = request.query(&[("altitude", altitude.to_string())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::weather_fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::weather_fetch(format!(
                "provider answered HTTP {}",
                response.status()
            )));
        }

        let bundle: WeatherBundle = response
            .json()
            .await
            .map_err(|e| Error::weather_fetch(e.to_string()))?;

        debug!(
            "Weather fetch returned {} observations, {} forecasts",
            bundle.observations.len(),
            bundle.forecasts.len()
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_construction() {
        let provider =
            HttpWeatherProvider::new("https://example.test/api/data", Duration::from_secs(5));
        assert!(provider.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_visible_error() {
        // Reserved TEST-NET address: connection fails fast and predictably
        let provider =
            HttpWeatherProvider::new("http://192.0.2.1:9/api", Duration::from_millis(200))
                .unwrap();

        let err = provider
            .fetch(&["KSFF".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WeatherFetch { .. }));
    }
}
