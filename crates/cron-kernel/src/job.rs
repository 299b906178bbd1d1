//! Job registration types: limits, retry policy, backoff, rate limits.

use crate::context::JobHandler;
use crate::error::CronError;
use std::sync::Arc;

/// A registered job, immutable after registration.
///
/// Exactly one of `handler` or `worker` should be set; the runner fails
/// with `E_CONFIGURATION` if neither is present when a run is launched.
#[derive(Clone)]
pub struct JobDefinition {
    /// Globally unique job name. Duplicate registration fails `E_DUPLICATE`.
    pub name: String,
    /// The async handler invoked on each run, if this job runs in-process.
    pub handler: Option<Arc<dyn JobHandler>>,
    /// A worker descriptor resolved by an external `WorkerFactory`, for
    /// jobs whose work happens out-of-process (e.g. the shell-command
    /// worker, out of scope for this crate).
    pub worker: Option<String>,
    /// Maximum concurrent runs of this job. Defaults to 1.
    pub concurrency: usize,
    /// Optional per-job token-bucket rate limit.
    pub rate_limit: Option<RateLimitConfig>,
    /// Optional handler timeout in milliseconds. `0` or `None` means no
    /// timeout — a handler that never resolves blocks its concurrency slot
    /// indefinitely; this is documented behavior, not a bug.
    pub timeout_ms: Option<u64>,
    /// Optional retry policy applied to handler failures and timeouts.
    pub retry: Option<RetryPolicy>,
}

impl JobDefinition {
    /// Start building a job definition with an in-process handler.
    pub fn new(name: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            name: name.into(),
            handler: Some(handler),
            worker: None,
            concurrency: 1,
            rate_limit: None,
            timeout_ms: None,
            retry: None,
        }
    }

    /// Start building a job definition that delegates to an external worker.
    pub fn new_worker(name: impl Into<String>, worker: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
            worker: Some(worker.into()),
            concurrency: 1,
            rate_limit: None,
            timeout_ms: None,
            retry: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Validate invariants that must hold before a job can be registered.
    ///
    /// Checked here (synchronously, at registration time) rather than
    /// deferred to first dispatch, per spec §4.6: "Limiter misconfiguration
    /// ... → `E_CONFIGURATION` at registration."
    pub fn validate(&self) -> Result<(), CronError> {
        if self.name.trim().is_empty() {
            return Err(CronError::configuration("job name must not be empty"));
        }
        if self.handler.is_none() && self.worker.is_none() {
            return Err(CronError::configuration(format!(
                "job '{}' has neither a handler nor a worker descriptor",
                self.name
            )));
        }
        if self.concurrency == 0 {
            return Err(CronError::configuration(format!(
                "job '{}' concurrency must be >= 1",
                self.name
            )));
        }
        if let Some(rl) = &self.rate_limit {
            rl.validate()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("name", &self.name)
            .field("has_handler", &self.handler.is_some())
            .field("worker", &self.worker)
            .field("concurrency", &self.concurrency)
            .field("rate_limit", &self.rate_limit)
            .field("timeout_ms", &self.timeout_ms)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Token-bucket configuration for a per-job or global rate limit.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RateLimitConfig {
    /// Maximum tokens the bucket can hold. `0` disables acquisition forever
    /// (explicit disable), which is a valid configuration on its own.
    pub capacity: f64,
    /// Tokens added per `refill_interval_ms`.
    pub refill_rate: f64,
    /// Refill interval in milliseconds.
    pub refill_interval_ms: u64,
}

impl RateLimitConfig {
    pub fn new(capacity: f64, refill_rate: f64, refill_interval_ms: u64) -> Self {
        Self {
            capacity,
            refill_rate,
            refill_interval_ms,
        }
    }

    /// Reject the one combination spec §4.3 calls out as almost certainly a
    /// mistake: a bucket that can never hold a token but is told to refill.
    pub fn validate(&self) -> Result<(), CronError> {
        if self.capacity < 0.0 {
            return Err(CronError::configuration("rate limit capacity must be >= 0"));
        }
        if self.capacity == 0.0 && self.refill_rate > 0.0 {
            return Err(CronError::configuration(
                "rate limit capacity=0 with refill_rate>0 can never admit a request",
            ));
        }
        if self.refill_interval_ms == 0 && self.refill_rate > 0.0 {
            return Err(CronError::configuration(
                "rate limit refill_interval_ms must be > 0 when refill_rate > 0",
            ));
        }
        Ok(())
    }
}

/// Retry policy applied when a run fails or times out.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first), >= 1.
    pub max_attempts: u32,
    /// Backoff strategy computing the delay before each retry.
    pub backoff: BackoffStrategy,
    /// Predicate deciding whether a given error is worth retrying. Defaults
    /// to "always retry" when not set via [`RetryPolicy::with_should_retry`].
    pub should_retry: Option<Arc<dyn Fn(&CronError) -> bool + Send + Sync>>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            should_retry: None,
        }
    }

    pub fn with_should_retry(
        mut self,
        predicate: impl Fn(&CronError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    pub fn should_retry(&self, error: &CronError) -> bool {
        match &self.should_retry {
            Some(pred) => pred(error),
            None => true,
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("has_should_retry", &self.should_retry.is_some())
            .finish()
    }
}

/// Delay computation strategy between retry attempts.
///
/// `attempt` is 0-based: the delay before the *second* overall attempt is
/// `next_delay(0)`, before the third is `next_delay(1)`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BackoffStrategy {
    /// A constant delay between every retry.
    Fixed { delay_ms: u64 },
    /// `base_delay_ms * factor.powi(attempt)`, uncapped unless `max_delay_ms`
    /// is set.
    Exponential {
        base_delay_ms: u64,
        factor: f64,
        max_delay_ms: Option<u64>,
    },
}

impl BackoffStrategy {
    /// Compute the delay in milliseconds before the given 0-based retry
    /// attempt. Jitter, if any, is applied by the caller (the dispatcher),
    /// since it needs the injected `Clock`/RNG rather than a hidden one
    /// here — see spec design note on injected clocks.
    pub fn next_delay_ms(&self, attempt: u32) -> u64 {
        match self {
            BackoffStrategy::Fixed { delay_ms } => *delay_ms,
            BackoffStrategy::Exponential {
                base_delay_ms,
                factor,
                max_delay_ms,
            } => {
                let raw = (*base_delay_ms as f64) * factor.powi(attempt as i32);
                let capped = match max_delay_ms {
                    Some(max) => raw.min(*max as f64),
                    None => raw,
                };
                capped.max(0.0) as u64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_is_constant() {
        let b = BackoffStrategy::Fixed { delay_ms: 250 };
        assert_eq!(b.next_delay_ms(0), 250);
        assert_eq!(b.next_delay_ms(5), 250);
    }

    #[test]
    fn exponential_backoff_doubles() {
        let b = BackoffStrategy::Exponential {
            base_delay_ms: 10,
            factor: 2.0,
            max_delay_ms: None,
        };
        assert_eq!(b.next_delay_ms(0), 10);
        assert_eq!(b.next_delay_ms(1), 20);
        assert_eq!(b.next_delay_ms(2), 40);
    }

    #[test]
    fn exponential_backoff_caps_at_max() {
        let b = BackoffStrategy::Exponential {
            base_delay_ms: 10,
            factor: 2.0,
            max_delay_ms: Some(25),
        };
        assert_eq!(b.next_delay_ms(0), 10);
        assert_eq!(b.next_delay_ms(1), 20);
        assert_eq!(b.next_delay_ms(2), 25);
        assert_eq!(b.next_delay_ms(10), 25);
    }

    #[test]
    fn rate_limit_rejects_zero_capacity_with_positive_refill() {
        let rl = RateLimitConfig::new(0.0, 1.0, 100);
        assert!(rl.validate().is_err());
    }

    #[test]
    fn rate_limit_allows_explicit_disable() {
        let rl = RateLimitConfig::new(0.0, 0.0, 100);
        assert!(rl.validate().is_ok());
    }

    #[test]
    fn job_definition_requires_handler_or_worker() {
        let job = JobDefinition {
            name: "broken".into(),
            handler: None,
            worker: None,
            concurrency: 1,
            rate_limit: None,
            timeout_ms: None,
            retry: None,
        };
        assert!(job.validate().is_err());
    }

    #[test]
    fn job_definition_rejects_zero_concurrency() {
        let job = JobDefinition::new_worker("w", "shell").with_concurrency(0);
        assert!(job.validate().is_err());
    }

    #[test]
    fn retry_policy_defaults_to_always_retry() {
        let policy = RetryPolicy::new(3, BackoffStrategy::Fixed { delay_ms: 10 });
        assert!(policy.should_retry(&CronError::internal("boom")));
    }

    #[test]
    fn retry_policy_honors_custom_predicate() {
        let policy = RetryPolicy::new(3, BackoffStrategy::Fixed { delay_ms: 10 })
            .with_should_retry(|e| e.code != crate::error::CronErrorCode::EConfiguration);
        assert!(!policy.should_retry(&CronError::configuration("nope")));
        assert!(policy.should_retry(&CronError::internal("transient")));
    }
}
