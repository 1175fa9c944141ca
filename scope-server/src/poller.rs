//! Live polling: one task per session fetching traffic every second and
//! weather every minute.
//!
//! Each tick awaits its own fetch before the interval is serviced again, so
//! two polls never overlap on the store. Results are applied under the
//! generation that was current when the fetch started; the session drops them
//! if the facility changed meanwhile.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scope_core::config::Config;
use scope_core::tracker::MergeReport;
use scope_core::types::{LatLon, Millis, Result};
use scope_core::{parse_feed, Observation, Session};

use crate::upstream::Upstream;

pub type SharedSession = Arc<RwLock<Session>>;

pub fn now_ms() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub traffic_every: Duration,
    pub weather_every: Duration,
    pub radius_nm: f64,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        PollSettings {
            traffic_every: Duration::from_millis(config.scope.poll_ms.max(1)),
            weather_every: Duration::from_millis(config.scope.weather_ms.max(1)),
            radius_nm: config.upstream.radius_nm,
        }
    }
}

pub struct Poller {
    session: SharedSession,
    upstream: Arc<dyn Upstream>,
    settings: PollSettings,
}

impl Poller {
    pub fn new(session: SharedSession, upstream: Arc<dyn Upstream>, settings: PollSettings) -> Self {
        Poller {
            session,
            upstream,
            settings,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Fetch one traffic snapshot and merge it.
    ///
    /// `Ok(None)` means the facility changed while the fetch was in flight.
    /// On any error nothing is merged, but tracks past the TTL still expire.
    pub async fn poll_traffic(&self) -> Result<Option<MergeReport>> {
        let (facility, generation) = {
            let s = self.session.read().unwrap();
            (s.facility(), s.generation())
        };

        let batch = match self.fetch_traffic(facility.center).await {
            Ok(batch) => batch,
            Err(e) => {
                let evicted = self.session.write().unwrap().expire(generation, now_ms());
                if let Some(evicted) = evicted.filter(|n| *n > 0) {
                    debug!(facility = facility.id, evicted, "expired tracks during outage");
                }
                return Err(e);
            }
        };

        let report = self
            .session
            .write()
            .unwrap()
            .apply_traffic(generation, batch, now_ms());

        match &report {
            Some(r) => debug!(
                facility = facility.id,
                received = r.received,
                accepted = r.accepted(),
                created = r.created,
                updated = r.updated,
                evicted = r.evicted,
                "traffic merged"
            ),
            None => debug!(facility = facility.id, "dropped traffic for previous facility"),
        }
        Ok(report)
    }

    async fn fetch_traffic(&self, center: LatLon) -> Result<Vec<Observation>> {
        let body = self
            .upstream
            .traffic(center, self.settings.radius_nm)
            .await?;
        parse_feed(&body)
    }

    /// Fetch the facility METAR. Returns whether it was applied.
    pub async fn poll_weather(&self) -> Result<bool> {
        let (facility, generation) = {
            let s = self.session.read().unwrap();
            (s.facility(), s.generation())
        };

        let text = self.upstream.metar(facility.station).await?;
        Ok(self
            .session
            .write()
            .unwrap()
            .apply_metar(generation, &text, now_ms()))
    }

    /// Poll until `token` is cancelled. Failures are logged and the cycle
    /// is skipped; the next tick is the retry. Cancellation also abandons a
    /// fetch that is still in flight.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut traffic = tokio::time::interval(self.settings.traffic_every);
        traffic.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut weather = tokio::time::interval(self.settings.weather_every);
        weather.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = traffic.tick() => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        res = self.poll_traffic() => {
                            if let Err(e) = res {
                                warn!(error = %e, "traffic poll failed");
                            }
                        }
                    }
                }
                _ = weather.tick() => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        res = self.poll_weather() => {
                            if let Err(e) = res {
                                warn!(error = %e, "weather poll failed");
                            }
                        }
                    }
                }
            }
        }
        debug!("poller stopped");
    }
}

/// Owns the running poll task and restarts it on facility switch.
pub struct Scheduler {
    poller: Arc<Poller>,
    current: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Scheduler {
    pub fn new(poller: Poller) -> Self {
        Scheduler {
            poller: Arc::new(poller),
            current: Mutex::new(None),
        }
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    /// Cancel any running task and start a fresh one. Must be called from
    /// within a tokio runtime.
    pub fn restart(&self) {
        let token = CancellationToken::new();
        let handle = tokio::spawn(self.poller.clone().run(token.clone()));

        let previous = self.current.lock().unwrap().replace((token, handle));
        if let Some((old, _)) = previous {
            old.cancel();
        }
        let facility = self.poller().session().read().unwrap().facility().id;
        info!(facility, "polling started");
    }

    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|(_, h)| !h.is_finished())
    }

    /// Cancel the running task and wait for it to exit.
    pub async fn shutdown(&self) {
        let current = self.current.lock().unwrap().take();
        if let Some((token, handle)) = current {
            token.cancel();
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scope_core::facility;
    use scope_core::types::{LatLon, ScopeError};
    use scope_core::TrackStore;

    use crate::upstream::testing::FakeUpstream;

    const FEED: &str = r#"{"ac":[
        {"hex":"a1","flight":"JBU1","lat":40.7,"lon":-73.8,"alt_baro":3000,"gs":200,"track":90},
        {"hex":"b2","lat":40.6,"lon":-73.9,"alt_baro":"ground"}
    ]}"#;

    fn settings() -> PollSettings {
        PollSettings {
            traffic_every: Duration::from_millis(1000),
            weather_every: Duration::from_millis(60_000),
            radius_nm: 50.0,
        }
    }

    fn poller(fake: Arc<FakeUpstream>) -> Poller {
        let session = Arc::new(RwLock::new(Session::new(
            facility::default_facility(),
            TrackStore::default(),
        )));
        Poller::new(session, fake, settings())
    }

    #[tokio::test]
    async fn test_poll_traffic_merges() {
        let fake = Arc::new(FakeUpstream::default());
        fake.push_traffic(Ok(FEED.into()));
        let p = poller(fake.clone());

        let report = p.poll_traffic().await.unwrap().unwrap();
        assert_eq!(report.received, 2);
        assert_eq!(report.created, 1);
        assert_eq!(report.rejected_altitude, 1);
        assert_eq!(p.session().read().unwrap().store().len(), 1);

        let calls = fake.traffic_calls.lock().unwrap();
        assert_eq!(calls[0], (LatLon::new(40.6413, -73.7781), 50.0));
    }

    #[tokio::test]
    async fn test_failed_poll_leaves_store_unchanged() {
        let fake = Arc::new(FakeUpstream::default());
        fake.push_traffic(Ok(FEED.into()));
        fake.push_traffic(Err(ScopeError::UpstreamStatus {
            service: "traffic",
            status: 503,
        }));
        fake.push_traffic(Err(ScopeError::Transport("connection reset".into())));
        fake.push_traffic(Ok("<html>bad gateway</html>".into()));
        let p = poller(fake);

        p.poll_traffic().await.unwrap();
        let before: Vec<_> = p
            .session()
            .read()
            .unwrap()
            .store()
            .snapshot()
            .into_iter()
            .cloned()
            .collect();

        assert!(p.poll_traffic().await.is_err());
        assert!(p.poll_traffic().await.is_err());
        assert!(matches!(p.poll_traffic().await, Err(ScopeError::Decode(_))));

        let session = p.session().read().unwrap();
        let after: Vec<_> = session.store().snapshot().into_iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_failed_polls_still_expire_tracks() {
        let fake = Arc::new(FakeUpstream::default());
        fake.push_traffic(Ok(FEED.into()));
        fake.push_traffic(Err(ScopeError::Transport("connection refused".into())));
        let session = Arc::new(RwLock::new(Session::new(
            facility::default_facility(),
            TrackStore::new(50, 100.0),
        )));
        let p = Poller::new(session, fake, settings());

        p.poll_traffic().await.unwrap();
        assert_eq!(p.session().read().unwrap().store().len(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(p.poll_traffic().await.is_err());
        assert!(p.session().read().unwrap().store().is_empty());
    }

    /// Switches facility from inside the fetch, like a user clicking while
    /// the request is in flight.
    struct SwitchingUpstream {
        session: SharedSession,
    }

    #[async_trait::async_trait]
    impl Upstream for SwitchingUpstream {
        async fn traffic(&self, _center: LatLon, _dist_nm: f64) -> Result<String> {
            let lga = facility::find("LGA").unwrap();
            self.session.write().unwrap().switch_facility(lga);
            Ok(FEED.into())
        }

        async fn metar(&self, _station: &str) -> Result<String> {
            Ok("KJFK 141251Z 31012KT".into())
        }
    }

    #[tokio::test]
    async fn test_switch_during_fetch_discards_result() {
        let session = Arc::new(RwLock::new(Session::new(
            facility::default_facility(),
            TrackStore::default(),
        )));
        let upstream = Arc::new(SwitchingUpstream {
            session: session.clone(),
        });
        let p = Poller::new(session.clone(), upstream, settings());

        assert!(p.poll_traffic().await.unwrap().is_none());
        let s = session.read().unwrap();
        assert_eq!(s.facility().id, "LGA");
        assert!(s.store().is_empty());
    }

    #[tokio::test]
    async fn test_poll_weather() {
        let fake = Arc::new(FakeUpstream::default());
        fake.push_metar(Ok("KJFK 141251Z 31012KT 10SM FEW250 18/06 A3012\n".into()));
        let p = poller(fake.clone());

        assert!(p.poll_weather().await.unwrap());
        assert_eq!(fake.metar_calls.lock().unwrap()[0], "KJFK");
        let s = p.session().read().unwrap();
        assert!(s.metar().unwrap().text.ends_with("A3012"));
    }

    #[tokio::test]
    async fn test_weather_failure_keeps_previous() {
        let fake = Arc::new(FakeUpstream::default());
        fake.push_metar(Ok("KJFK 141251Z".into()));
        let p = poller(fake);

        p.poll_weather().await.unwrap();
        assert!(p.poll_weather().await.is_err());
        assert_eq!(p.session().read().unwrap().metar().unwrap().text, "KJFK 141251Z");
    }

    #[tokio::test]
    async fn test_scheduler_polls_immediately_and_stops() {
        let fake = Arc::new(FakeUpstream::default());
        fake.push_traffic(Ok(FEED.into()));
        fake.push_metar(Ok("KJFK 141251Z".into()));
        let scheduler = Scheduler::new(poller(fake.clone()));

        scheduler.restart();
        assert!(scheduler.is_running());
        tokio::time::sleep(Duration::from_millis(100)).await;

        {
            let s = scheduler.poller().session().read().unwrap();
            assert_eq!(s.store().len(), 1);
            assert!(s.metar().is_some());
        }

        scheduler.shutdown().await;
        assert!(!scheduler.is_running());
    }

    /// Never answers, like an upstream that has stopped responding.
    struct StalledUpstream;

    #[async_trait::async_trait]
    impl Upstream for StalledUpstream {
        async fn traffic(&self, _center: LatLon, _dist_nm: f64) -> Result<String> {
            std::future::pending().await
        }

        async fn metar(&self, _station: &str) -> Result<String> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_fetch() {
        let session = Arc::new(RwLock::new(Session::new(
            facility::default_facility(),
            TrackStore::default(),
        )));
        let scheduler = Scheduler::new(Poller::new(session, Arc::new(StalledUpstream), settings()));

        scheduler.restart();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(1), scheduler.shutdown()).await;
        assert!(stopped.is_ok());
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_scheduler_restart_replaces_task() {
        let fake = Arc::new(FakeUpstream::default());
        let scheduler = Scheduler::new(poller(fake));
        scheduler.restart();
        scheduler.restart();
        assert!(scheduler.is_running());
        scheduler.shutdown().await;
        assert!(!scheduler.is_running());
    }
}
