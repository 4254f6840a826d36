use std::net::SocketAddr;
use std::time::Duration;

use crate::jobs::JobKind;

/// Latency and success odds of one simulated attack kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationProfile {
    /// How long the fake evaluation takes before reporting
    pub latency: Duration,
    /// Probability in `[0, 1]` that the simulated attack succeeds
    pub success_rate: f64,
}

impl SimulationProfile {
    pub fn new(latency: Duration, success_rate: f64) -> Self {
        Self {
            latency,
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }

    /// Same odds, latency multiplied by `factor`.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            latency: Duration::try_from_secs_f64(self.latency.as_secs_f64() * factor)
                .unwrap_or(self.latency),
            ..self
        }
    }
}

/// Per-kind profiles for the built-in simulated evaluators.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub xss: SimulationProfile,
    pub ssrf: SimulationProfile,
    pub combined: SimulationProfile,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            xss: SimulationProfile::new(Duration::from_millis(2000), 0.7),
            ssrf: SimulationProfile::new(Duration::from_millis(2500), 0.6),
            combined: SimulationProfile::new(Duration::from_millis(3000), 0.5),
        }
    }
}

impl SimulationConfig {
    pub fn profile(&self, kind: JobKind) -> SimulationProfile {
        match kind {
            JobKind::Xss => self.xss,
            JobKind::Ssrf => self.ssrf,
            JobKind::Combined => self.combined,
        }
    }

    /// Scale every latency, e.g. `0.0` for instant simulations in demos.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            xss: self.xss.scaled(factor),
            ssrf: self.ssrf.scaled(factor),
            combined: self.combined.scaled(factor),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabConfig {
    pub listen_addr: SocketAddr,
    /// Hard limit on a single evaluator call; the job fails with a timeout after it.
    pub evaluator_deadline: Duration,
    /// Record limit for the store. `None` keeps every record.
    pub store_capacity: Option<usize>,
    pub simulation: SimulationConfig,
    /// Buffered lifecycle events per subscriber before slow ones start lagging.
    pub event_buffer: usize,
    /// Allowed CORS origin. `None` allows any origin.
    pub cors_origin: Option<String>,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            evaluator_deadline: Duration::from_secs(10),
            store_capacity: None,
            simulation: SimulationConfig::default(),
            event_buffer: 256,
            cors_origin: None,
        }
    }
}

impl LabConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.evaluator_deadline = deadline;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.store_capacity = Some(capacity);
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = Some(origin.into());
        self
    }
}
