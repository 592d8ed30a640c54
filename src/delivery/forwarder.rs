//! Summary forwarder: serialize once, deliver with bounded retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::delivery::transport::{SinkTransport, TransportError};
use crate::events::Summary;
use crate::observability::LatencyObserver;
use crate::resilience::{with_deadline, Elapsed, RetryPolicy};

/// What happened to one summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The writer answered 200 on attempt `attempts`.
    Delivered { attempts: u32 },
    /// Every attempt failed; the summary is gone.
    Dropped { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts } | DeliveryOutcome::Dropped { attempts } => {
                *attempts
            }
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Delivers summaries to the writer service.
pub struct Forwarder<T> {
    transport: T,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    observer: Arc<dyn LatencyObserver>,
}

impl<T: SinkTransport> Forwarder<T> {
    pub fn new(
        transport: T,
        policy: RetryPolicy,
        attempt_timeout: Duration,
        observer: Arc<dyn LatencyObserver>,
    ) -> Self {
        Self {
            transport,
            policy,
            attempt_timeout,
            observer,
        }
    }

    /// Deliver `summary`, retrying at a fixed cadence.
    ///
    /// Never fails: exhausted retries are logged and reported as
    /// [`DeliveryOutcome::Dropped`].
    pub async fn deliver(&self, summary: &Summary) -> DeliveryOutcome {
        let body = match serde_json::to_vec(summary) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(vehicle = %summary.vehicle_id, error = %e, "Failed to serialize summary");
                self.observer.record_outcome(false);
                return DeliveryOutcome::Dropped { attempts: 0 };
            }
        };

        let max_attempts = self.policy.max_attempts();
        for attempt in 1..=max_attempts {
            let start = Instant::now();
            let result = with_deadline(self.attempt_timeout, self.transport.post(body.clone()))
                .await
                .unwrap_or_else(|Elapsed(limit)| Err(TransportError::Timeout(limit)));
            self.observer.observe(start.elapsed());

            match result {
                Ok(200) => {
                    tracing::info!(vehicle = %summary.vehicle_id, attempt, "Summary delivered");
                    self.observer.record_outcome(true);
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Ok(status) => {
                    tracing::warn!(vehicle = %summary.vehicle_id, attempt, status, "Writer rejected summary");
                }
                Err(e) => {
                    tracing::warn!(vehicle = %summary.vehicle_id, attempt, error = %e, "Failed to send summary");
                }
            }

            sleep(self.policy.interval()).await;
        }

        tracing::error!(
            vehicle = %summary.vehicle_id,
            attempts = max_attempts,
            "Giving up on summary, dropping it"
        );
        self.observer.record_outcome(false);
        DeliveryOutcome::Dropped { attempts: max_attempts }
    }
}
