//! Connectivity probes

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Bernoulli, Distribution};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use super::ConnectivityProbe;

/// Random outcomes with a fixed success probability.
pub struct SimulatedProbe {
    rng: StdRng,
    outcome: Bernoulli,
}

impl SimulatedProbe {
    pub fn new(success_rate: f64) -> Result<Self> {
        Self::with_rng(success_rate, StdRng::from_entropy())
    }

    pub fn seeded(success_rate: f64, seed: u64) -> Result<Self> {
        Self::with_rng(success_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(success_rate: f64, rng: StdRng) -> Result<Self> {
        let outcome = Bernoulli::new(success_rate)
            .context("connectivity.simulated_success_rate must be within [0, 1]")?;
        Ok(Self { rng, outcome })
    }
}

#[async_trait]
impl ConnectivityProbe for SimulatedProbe {
    async fn probe(&mut self) -> bool {
        self.outcome.sample(&mut self.rng)
    }

    fn probe_name(&self) -> &str {
        "simulated"
    }
}

/// TCP connect against `host:port`; success means the handshake finished
/// inside the timeout.
pub struct TcpProbe {
    target: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn probe(&mut self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(target_addr = %self.target, error = %e, "Probe connect failed");
                false
            }
            Err(_) => {
                debug!(target_addr = %self.target, "Probe timed out");
                false
            }
        }
    }

    fn probe_name(&self) -> &str {
        "tcp"
    }
}
