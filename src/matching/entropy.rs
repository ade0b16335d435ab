//! Integer entropy with a remote primary and a local fallback.
//!
//! [`EntropySource::draw`] asks the configured [`IntegerSource`] first and
//! validates the answer. Any failure (transport, timeout, bad status,
//! malformed or out-of-range payload, service-reported error) is logged and
//! replaced by draws from a local PRNG seeded from the current time, so the
//! caller always gets `count` integers in `[min, max]`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Why a remote draw could not be used. Never leaves this module's callers.
#[derive(Debug, thiserror::Error)]
pub enum EntropyError {
    /// Connection or request failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with a non-success HTTP status.
    #[error("unexpected status {0}")]
    Status(u16),
    /// The service reported an error in its payload.
    #[error("service error {code}: {message}")]
    Service {
        /// Service error code.
        code: i64,
        /// Service error message.
        message: String,
    },
    /// The payload could not be decoded or violated the request bounds.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The call did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Requested range is empty (`min > max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid range: min {min} > max {max}")]
pub struct InvalidRange {
    /// Lower bound as requested.
    pub min: u64,
    /// Upper bound as requested.
    pub max: u64,
}

/// A provider of uniformly distributed integers, drawn with replacement.
#[async_trait]
pub trait IntegerSource: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns `count` integers in `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns an [`EntropyError`] describing why no usable draw was made.
    async fn integers(&self, count: usize, min: u64, max: u64) -> Result<Vec<u64>, EntropyError>;
}

/// Failure-oblivious integer supplier used by the shuffler.
#[derive(Debug)]
pub struct EntropySource {
    remote: Option<Arc<dyn IntegerSource>>,
    timeout: Duration,
    fallback: Mutex<StdRng>,
}

impl EntropySource {
    /// Creates a source that tries `remote` first, bounded by `timeout`.
    #[must_use]
    pub fn new(remote: Arc<dyn IntegerSource>, timeout: Duration) -> Self {
        Self {
            remote: Some(remote),
            timeout,
            fallback: Mutex::new(time_seeded_rng()),
        }
    }

    /// Creates a source that only uses the local generator.
    #[must_use]
    pub fn local() -> Self {
        Self {
            remote: None,
            timeout: Duration::ZERO,
            fallback: Mutex::new(time_seeded_rng()),
        }
    }

    /// Draws `count` integers in `[min, max]` (inclusive, with replacement).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRange`] when `min > max`. Remote failures are never
    /// surfaced.
    pub async fn draw(&self, count: usize, min: u64, max: u64) -> Result<Vec<u64>, InvalidRange> {
        if min > max {
            return Err(InvalidRange { min, max });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        if let Some(remote) = &self.remote {
            match self.draw_remote(remote.as_ref(), count, min, max).await {
                Ok(values) => {
                    tracing::debug!(source = remote.name(), count, "drew remote integers");
                    return Ok(values);
                }
                Err(err) => {
                    tracing::warn!(
                        source = remote.name(),
                        error = %err,
                        "remote entropy unavailable, using local generator"
                    );
                }
            }
        }

        Ok(self.draw_local(count, min, max))
    }

    async fn draw_remote(
        &self,
        remote: &dyn IntegerSource,
        count: usize,
        min: u64,
        max: u64,
    ) -> Result<Vec<u64>, EntropyError> {
        let values = tokio::time::timeout(self.timeout, remote.integers(count, min, max))
            .await
            .map_err(|_| EntropyError::Timeout(self.timeout))??;

        if values.len() != count {
            return Err(EntropyError::Malformed(format!(
                "expected {count} integers, got {}",
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| !(min..=max).contains(*v)) {
            return Err(EntropyError::Malformed(format!(
                "{bad} outside [{min}, {max}]"
            )));
        }
        Ok(values)
    }

    fn draw_local(&self, count: usize, min: u64, max: u64) -> Vec<u64> {
        let mut rng = self.fallback.lock();
        (0..count).map(|_| rng.gen_range(min..=max)).collect()
    }
}

fn time_seeded_rng() -> StdRng {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    StdRng::seed_from_u64(nanos.unsigned_abs())
}
