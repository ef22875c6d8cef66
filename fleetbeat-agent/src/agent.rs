//! The report loop and its two reporting paths.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetbeat_common::{
    HeartbeatReport, NodePaths, Property, current_unix_secs, encode_fraction, encode_integer,
};
use fleetbeat_sync::{
    CoordinationClient, CreateMode, DeviceRegistry, PropertySync, UpsertReport, Version,
};
use reqwest::StatusCode;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::role::DeviceRole;
use crate::stats::StatProvider;

/// One reporting path.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Startup cycle, run on the first tick.
    async fn bootstrap(&self) -> Result<()>;

    /// Steady-state cycle, run on every later tick.
    async fn report(&self) -> Result<()>;

    /// Device this reporter speaks for.
    fn device(&self) -> &str;
}

/// Writes directly to the coordination store.
///
/// Property nodes are created ephemeral and every write uses
/// [`Version::Any`].
pub struct EdgeReporter {
    device: String,
    stats: Arc<dyn StatProvider>,
    registry: DeviceRegistry,
    sync: PropertySync,
}

impl EdgeReporter {
    pub fn new(
        device: impl Into<String>,
        stats: Arc<dyn StatProvider>,
        store: Arc<dyn CoordinationClient>,
        paths: NodePaths,
    ) -> Self {
        Self {
            device: device.into(),
            stats,
            registry: DeviceRegistry::new(store.clone(), paths.clone()),
            sync: PropertySync::new(store, paths).with_create_mode(CreateMode::Ephemeral),
        }
    }

    /// Every property of the device. Readings that fail are left out.
    pub fn full_snapshot(&self) -> Vec<(Property, String)> {
        let hw = self.stats.hardware_type();
        let mut props = vec![
            (Property::DeviceType, hw.as_str().to_string()),
            (Property::DeviceRole, DeviceRole::Edge.to_string()),
            (Property::CpuCores, encode_integer(self.stats.cpu_cores())),
        ];

        match self.stats.memory() {
            Ok(mem) => props.push((Property::MemCap, encode_integer(mem.total as u64))),
            Err(e) => warn!(device = %self.device, error = %e, "Failed to read memory capacity"),
        }

        props.extend(self.usage_properties());

        if hw.is_gpu_capable() {
            props.push((Property::GpuCores, encode_integer(hw.gpu_cores())));
            if let Some(gpu) = self.gpu_property() {
                props.push(gpu);
            }
        }
        props
    }

    /// The properties refreshed every cycle.
    pub fn usage_snapshot(&self) -> Vec<(Property, String)> {
        let mut props = self.usage_properties();
        if self.stats.hardware_type().is_gpu_capable() {
            if let Some(gpu) = self.gpu_property() {
                props.push(gpu);
            }
        }
        props.push((Property::Heartbeat, encode_integer(current_unix_secs())));
        props
    }

    fn usage_properties(&self) -> Vec<(Property, String)> {
        let mut props = Vec::with_capacity(2);
        match self.stats.cpu_usage() {
            Ok(cpu) => props.push((Property::Cpu, encode_fraction(cpu.fraction()))),
            Err(e) => warn!(device = %self.device, error = %e, "Failed to read CPU usage"),
        }
        match self.stats.memory() {
            Ok(mem) => props.push((Property::Mem, encode_fraction(mem.fraction()))),
            Err(e) => warn!(device = %self.device, error = %e, "Failed to read memory usage"),
        }
        props
    }

    fn gpu_property(&self) -> Option<(Property, String)> {
        match self.stats.gpu_usage() {
            Ok(gpu) => Some((Property::Gpu, encode_fraction(gpu.fraction()))),
            Err(e) => {
                warn!(device = %self.device, error = %e, "Failed to read GPU usage");
                None
            }
        }
    }

    fn log_report(&self, cycle: &str, report: UpsertReport) {
        if report.failed > 0 {
            warn!(
                device = %self.device,
                cycle,
                created = report.created,
                updated = report.updated,
                failed = report.failed,
                "Some property writes failed"
            );
        } else {
            debug!(
                device = %self.device,
                cycle,
                created = report.created,
                updated = report.updated,
                "Properties written"
            );
        }
    }
}

#[async_trait]
impl Reporter for EdgeReporter {
    /// Fails unless the device node is confirmed and every snapshot write
    /// landed, so the next tick runs the startup cycle again.
    async fn bootstrap(&self) -> Result<()> {
        self.registry.try_register(&self.device).await?;

        let report = self
            .sync
            .upsert_all(&self.device, &self.full_snapshot(), Version::Any)
            .await;
        self.log_report("bootstrap", report);
        if report.failed > 0 {
            return Err(AgentError::Incomplete {
                failed: report.failed,
                total: report.total(),
            });
        }
        Ok(())
    }

    async fn report(&self) -> Result<()> {
        let report = self
            .sync
            .upsert_all(&self.device, &self.usage_snapshot(), Version::Any)
            .await;
        self.log_report("report", report);
        Ok(())
    }

    fn device(&self) -> &str {
        &self.device
    }
}

/// Posts snapshots to the ingestion server.
pub struct SensorReporter {
    device: String,
    url: String,
    stats: Arc<dyn StatProvider>,
    client: reqwest::Client,
}

impl SensorReporter {
    pub fn new(
        device: impl Into<String>,
        url: impl Into<String>,
        stats: Arc<dyn StatProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            device: device.into(),
            url: url.into(),
            stats,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current readings. Any failed read fails the whole snapshot.
    pub fn snapshot(&self) -> Result<HeartbeatReport> {
        let cpu = self.stats.cpu_usage()?;
        let mem = self.stats.memory()?;
        Ok(HeartbeatReport {
            device_type: self.stats.hardware_type().as_str().to_string(),
            device_role: DeviceRole::Sensor.to_string(),
            cpu: cpu.fraction(),
            mem: mem.fraction(),
            cpu_cores: self.stats.cpu_cores(),
            mem_cap: mem.total as u64,
            last_heartbeat: current_unix_secs(),
        })
    }

    /// POST one snapshot. Anything but `200 OK` is an error.
    pub async fn post(&self, report: &HeartbeatReport) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("device_name", self.device.as_str())])
            .json(report)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AgentError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        debug!(device = %self.device, url = %self.url, "Heartbeat posted");
        Ok(())
    }
}

#[async_trait]
impl Reporter for SensorReporter {
    async fn bootstrap(&self) -> Result<()> {
        info!(device = %self.device, url = %self.url, "Posting first heartbeat");
        self.report().await
    }

    async fn report(&self) -> Result<()> {
        let snapshot = self.snapshot()?;
        self.post(&snapshot).await
    }

    fn device(&self) -> &str {
        &self.device
    }
}

/// Runs a [`Reporter`] at a fixed interval.
///
/// Missed ticks are skipped, not caught up. Cycle failures are logged and the
/// next tick is the retry.
pub struct HeartbeatAgent {
    reporter: Box<dyn Reporter>,
    interval: Duration,
    bootstrapped: bool,
}

impl HeartbeatAgent {
    pub fn new(reporter: Box<dyn Reporter>, interval: Duration) -> Self {
        Self {
            reporter,
            interval,
            bootstrapped: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one cycle: the startup cycle until it succeeds, a report afterwards.
    pub async fn cycle(&mut self) -> Result<()> {
        if self.bootstrapped {
            return self.reporter.report().await;
        }
        self.reporter.bootstrap().await?;
        self.bootstrapped = true;
        Ok(())
    }

    /// Tick forever.
    pub async fn run(mut self) {
        info!(
            device = %self.reporter.device(),
            interval_secs = self.interval.as_secs(),
            "Starting heartbeat loop"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.cycle().await {
                warn!(device = %self.reporter.device(), error = %e, "Heartbeat cycle failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{HardwareType, StatError, Usage};
    use fleetbeat_sync::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Pi4;

    impl StatProvider for Pi4 {
        fn cpu_usage(&self) -> std::result::Result<Usage, StatError> {
            Ok(Usage::new(1.0, 4.0))
        }
        fn memory(&self) -> std::result::Result<Usage, StatError> {
            Err(StatError::Unsupported("memory usage"))
        }
        fn gpu_usage(&self) -> std::result::Result<Usage, StatError> {
            Ok(Usage::new(500.0, 1000.0))
        }
        fn cpu_cores(&self) -> u32 {
            4
        }
        fn hardware_type(&self) -> HardwareType {
            HardwareType::Pi4
        }
        fn device_role(&self) -> String {
            "edge".to_string()
        }
        fn gateway(&self) -> String {
            "127.0.0.1".to_string()
        }
        fn device_name(&self) -> String {
            "pi-01".to_string()
        }
    }

    #[test]
    fn test_failed_reads_are_omitted() {
        let reporter = EdgeReporter::new(
            "pi-01",
            Arc::new(Pi4),
            Arc::new(MemoryStore::new()),
            NodePaths::default(),
        );

        let props: Vec<Property> = reporter.full_snapshot().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            props,
            vec![
                Property::DeviceType,
                Property::DeviceRole,
                Property::CpuCores,
                Property::Cpu
            ]
        );

        let props: Vec<Property> = reporter.usage_snapshot().into_iter().map(|(p, _)| p).collect();
        assert_eq!(props, vec![Property::Cpu, Property::Heartbeat]);
    }

    #[test]
    fn test_sensor_snapshot_fails_on_read_error() {
        let reporter = SensorReporter::new(
            "pi-01",
            "http://127.0.0.1:1/heartbeat",
            Arc::new(Pi4),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(matches!(reporter.snapshot(), Err(AgentError::Stat(_))));
    }

    struct Counting {
        bootstraps: Arc<AtomicUsize>,
        reports: Arc<AtomicUsize>,
        failing_bootstraps: usize,
    }

    #[async_trait]
    impl Reporter for Counting {
        async fn bootstrap(&self) -> Result<()> {
            let attempt = self.bootstraps.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failing_bootstraps {
                return Err(AgentError::Status {
                    url: "http://gateway/heartbeat".to_string(),
                    status: 503,
                });
            }
            Ok(())
        }

        async fn report(&self) -> Result<()> {
            self.reports.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn device(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_first_cycle_bootstraps_once() {
        let bootstraps = Arc::new(AtomicUsize::new(0));
        let reports = Arc::new(AtomicUsize::new(0));
        let mut agent = HeartbeatAgent::new(
            Box::new(Counting {
                bootstraps: bootstraps.clone(),
                reports: reports.clone(),
                failing_bootstraps: 0,
            }),
            Duration::from_secs(10),
        );

        agent.cycle().await.unwrap();
        agent.cycle().await.unwrap();
        agent.cycle().await.unwrap();

        assert_eq!(bootstraps.load(Ordering::SeqCst), 1);
        assert_eq!(reports.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_bootstrap_is_retried() {
        let bootstraps = Arc::new(AtomicUsize::new(0));
        let reports = Arc::new(AtomicUsize::new(0));
        let mut agent = HeartbeatAgent::new(
            Box::new(Counting {
                bootstraps: bootstraps.clone(),
                reports: reports.clone(),
                failing_bootstraps: 2,
            }),
            Duration::from_secs(10),
        );

        assert!(agent.cycle().await.is_err());
        assert!(agent.cycle().await.is_err());
        agent.cycle().await.unwrap();
        agent.cycle().await.unwrap();

        assert_eq!(bootstraps.load(Ordering::SeqCst), 3);
        assert_eq!(reports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_at_interval() {
        let bootstraps = Arc::new(AtomicUsize::new(0));
        let reports = Arc::new(AtomicUsize::new(0));
        let agent = HeartbeatAgent::new(
            Box::new(Counting {
                bootstraps: bootstraps.clone(),
                reports: reports.clone(),
                failing_bootstraps: 0,
            }),
            Duration::from_secs(10),
        );

        let handle = tokio::spawn(agent.run());
        tokio::time::sleep(Duration::from_secs(25)).await;
        handle.abort();

        // Ticks at 0s, 10s and 20s.
        assert_eq!(bootstraps.load(Ordering::SeqCst), 1);
        assert_eq!(reports.load(Ordering::SeqCst), 2);
    }
}
