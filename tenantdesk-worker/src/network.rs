/// Simulated network for webhook delivery
///
/// Simulated webhooks never leave the process. Each delivery attempt goes
/// through a [`NetworkSimulator`], which waits out some latency and then
/// either succeeds or fails with a timeout.
///
/// # Behaviour of `RandomNetwork`
///
/// 1. Sleep a uniformly random latency (default 200-1200 ms)
/// 2. Fail with `NetworkError::Timeout` with a fixed probability (default 5%)
///
/// # Configuration
///
/// ```json
/// {
///   "min_latency_ms": 200,
///   "max_latency_ms": 1200,
///   "failure_rate": 0.05
/// }
/// ```
///
/// # Example
///
/// ```no_run
/// use tenantdesk_worker::network::{NetworkSimulator, RandomNetwork};
///
/// # async fn example() {
/// let network = RandomNetwork::new();
/// match network.transmit(1).await {
///     Ok(()) => println!("delivered"),
///     Err(e) => println!("attempt failed: {}", e),
/// }
/// # }
/// ```

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Why a simulated transmission failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The receiver did not answer in time
    #[error("Network timeout")]
    Timeout,
}

/// A network that delivery attempts travel over
#[async_trait]
pub trait NetworkSimulator: Send + Sync {
    /// Transmits one delivery attempt (1-based)
    async fn transmit(&self, attempt: u32) -> Result<(), NetworkError>;
}

/// Sleeps a random number of milliseconds from `range`
pub async fn random_delay(range: RangeInclusive<u64>) {
    let millis = rand::thread_rng().gen_range(range);
    sleep(Duration::from_millis(millis)).await;
}

/// Latency and failure settings for [`RandomNetwork`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_min_latency")]
    pub min_latency_ms: u64,

    #[serde(default = "default_max_latency")]
    pub max_latency_ms: u64,

    /// Probability in `0.0..=1.0` that an attempt times out
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
}

fn default_min_latency() -> u64 {
    200
}

fn default_max_latency() -> u64 {
    1200
}

fn default_failure_rate() -> f64 {
    0.05
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            min_latency_ms: default_min_latency(),
            max_latency_ms: default_max_latency(),
            failure_rate: default_failure_rate(),
        }
    }
}

impl NetworkConfig {
    fn latency_range(&self) -> RangeInclusive<u64> {
        let low = self.min_latency_ms.min(self.max_latency_ms);
        let high = self.min_latency_ms.max(self.max_latency_ms);
        low..=high
    }

    fn clamped_failure_rate(&self) -> f64 {
        if self.failure_rate.is_nan() {
            return 0.0;
        }
        self.failure_rate.clamp(0.0, 1.0)
    }
}

/// Network with random latency and random timeouts
#[derive(Debug, Clone, Default)]
pub struct RandomNetwork {
    config: NetworkConfig,
}

impl RandomNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: NetworkConfig) -> Self {
        RandomNetwork { config }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

#[async_trait]
impl NetworkSimulator for RandomNetwork {
    async fn transmit(&self, attempt: u32) -> Result<(), NetworkError> {
        // The rng is not Send, so draw both values before awaiting
        let (latency, fails) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(self.config.latency_range()),
                rng.gen_bool(self.config.clamped_failure_rate()),
            )
        };

        tracing::trace!(attempt, latency_ms = latency, "Simulating network latency");
        sleep(Duration::from_millis(latency)).await;

        if fails {
            Err(NetworkError::Timeout)
        } else {
            Ok(())
        }
    }
}

/// Network that follows a fixed script of outcomes
///
/// Each transmission pops the next outcome; once the script runs out every
/// further attempt succeeds. Transmission times are recorded for
/// assertions on backoff.
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    outcomes: Mutex<VecDeque<Result<(), NetworkError>>>,
    transmissions: Mutex<Vec<(u32, Instant)>>,
}

impl ScriptedNetwork {
    /// Fails the first `failures` attempts, then succeeds
    pub fn fail_first(failures: usize) -> Self {
        Self::from_outcomes(std::iter::repeat(Err(NetworkError::Timeout)).take(failures))
    }

    /// Fails every attempt
    pub fn always_fail(attempts: usize) -> Self {
        Self::fail_first(attempts)
    }

    pub fn from_outcomes(outcomes: impl IntoIterator<Item = Result<(), NetworkError>>) -> Self {
        ScriptedNetwork {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            transmissions: Mutex::new(Vec::new()),
        }
    }

    /// Attempt numbers and times of every transmission so far
    pub fn transmissions(&self) -> Vec<(u32, Instant)> {
        self.transmissions
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl NetworkSimulator for ScriptedNetwork {
    async fn transmit(&self, attempt: u32) -> Result<(), NetworkError> {
        self.transmissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((attempt, Instant::now()));

        self.outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
