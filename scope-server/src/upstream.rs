//! Upstream data sources: ADS-B aircraft list and METAR text.
//!
//! Both the proxy routes and the live poller go through the [`Upstream`]
//! trait so tests can swap in a canned source.

use std::time::Duration;

use async_trait::async_trait;

use scope_core::config::UpstreamConfig;
use scope_core::types::{LatLon, Result, ScopeError};

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Raw aircraft-list JSON for a circle around `center`.
    async fn traffic(&self, center: LatLon, dist_nm: f64) -> Result<String>;

    /// Raw METAR text for one station id.
    async fn metar(&self, station: &str) -> Result<String>;
}

/// Station ids go straight into the upstream query string.
pub fn valid_station(ids: &str) -> bool {
    !ids.is_empty()
        && ids.len() <= 64
        && ids.chars().all(|c| c.is_ascii_alphanumeric() || c == ',')
}

fn fill_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut url = template.to_string();
    for (key, val) in vars {
        url = url.replace(&format!("{{{key}}}"), val);
    }
    url
}

/// reqwest-backed upstream using the configured URL templates.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    traffic_url: String,
    metar_url: String,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("scope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScopeError::Transport(e.to_string()))?;
        Ok(HttpUpstream {
            client,
            traffic_url: config.traffic_url.clone(),
            metar_url: config.metar_url.clone(),
        })
    }

    pub fn traffic_url(&self, center: LatLon, dist_nm: f64) -> String {
        fill_template(
            &self.traffic_url,
            &[
                ("lat", center.lat.to_string()),
                ("lon", center.lon.to_string()),
                ("dist", dist_nm.to_string()),
            ],
        )
    }

    pub fn metar_url(&self, station: &str) -> String {
        fill_template(&self.metar_url, &[("ids", station.to_string())])
    }

    async fn fetch(&self, service: &'static str, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScopeError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScopeError::UpstreamStatus {
                service,
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| ScopeError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn traffic(&self, center: LatLon, dist_nm: f64) -> Result<String> {
        let url = self.traffic_url(center, dist_nm);
        self.fetch("traffic", &url).await
    }

    async fn metar(&self, station: &str) -> Result<String> {
        let url = self.metar_url(station);
        self.fetch("metar", &url).await
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Canned replies, consumed in order. An empty queue answers with a
    /// transport failure.
    #[derive(Default)]
    pub struct FakeUpstream {
        pub traffic: Mutex<VecDeque<Result<String>>>,
        pub metar: Mutex<VecDeque<Result<String>>>,
        pub traffic_calls: Mutex<Vec<(LatLon, f64)>>,
        pub metar_calls: Mutex<Vec<String>>,
    }

    impl FakeUpstream {
        pub fn push_traffic(&self, reply: Result<String>) {
            self.traffic.lock().unwrap().push_back(reply);
        }

        pub fn push_metar(&self, reply: Result<String>) {
            self.metar.lock().unwrap().push_back(reply);
        }
    }

    fn exhausted() -> ScopeError {
        ScopeError::Transport("no canned reply".into())
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn traffic(&self, center: LatLon, dist_nm: f64) -> Result<String> {
            self.traffic_calls.lock().unwrap().push((center, dist_nm));
            self.traffic
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(exhausted()))
        }

        async fn metar(&self, station: &str) -> Result<String> {
            self.metar_calls.lock().unwrap().push(station.to_string());
            self.metar
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(exhausted()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scope_core::config::Config;

    fn upstream() -> HttpUpstream {
        HttpUpstream::new(&Config::default().upstream).unwrap()
    }

    #[test]
    fn test_traffic_url() {
        let url = upstream().traffic_url(LatLon::new(40.6413, -73.7781), 50.0);
        assert_eq!(url, "https://api.adsb.lol/v2/point/40.6413/-73.7781/50");
    }

    #[test]
    fn test_metar_url() {
        let url = upstream().metar_url("KLGA");
        assert_eq!(
            url,
            "https://aviationweather.gov/api/data/metar?ids=KLGA&format=raw"
        );
    }

    #[test]
    fn test_fill_template_leaves_unknown() {
        let url = fill_template("http://x/{a}/{b}", &[("a", "1".into())]);
        assert_eq!(url, "http://x/1/{b}");
    }

    #[test]
    fn test_valid_station() {
        assert!(valid_station("KJFK"));
        assert!(valid_station("KJFK,KLGA"));
        assert!(!valid_station(""));
        assert!(!valid_station("KJFK&format=json"));
        assert!(!valid_station("K JFK"));
    }
}
