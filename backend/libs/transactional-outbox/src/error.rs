use quota_events::Destination;
use thiserror::Error;
use uuid::Uuid;

pub type OutboxResult<T> = Result<T, OutboxError>;

/// Failures while recording or delivering outbox records.
///
/// Delivery failures never poison the processor: the record's `retry_count` is bumped and it is
/// retried on a later poll until it is parked.
#[derive(Error, Debug)]
pub enum OutboxError {
    #[error("outbox storage failed: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("outbox record {0} does not exist")]
    RecordNotFound(Uuid),

    #[error("unknown destination '{0}' in outbox record")]
    UnknownDestination(String),

    /// The consumer could not be reached or timed out.
    #[error("{destination} unreachable at {url}: {reason}")]
    Unreachable {
        destination: Destination,
        url: String,
        reason: String,
    },

    /// The consumer answered with a non-2xx status.
    #[error("{destination} rejected delivery with {status}: {body}")]
    Rejected {
        destination: Destination,
        status: u16,
        body: String,
    },

    /// In-process delivery failed inside the consumer.
    #[error("delivery failed: {0}")]
    PublishFailed(String),

    #[error("payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OutboxError {
    /// Whether the failure came from the consumer side rather than the outbox itself.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            OutboxError::Unreachable { .. }
                | OutboxError::Rejected { .. }
                | OutboxError::PublishFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_failures_are_classified() {
        let rejected = OutboxError::Rejected {
            destination: Destination::Storage,
            status: 503,
            body: "busy".into(),
        };
        assert!(rejected.is_delivery_failure());
        assert_eq!(rejected.to_string(), "storage rejected delivery with 503: busy");

        assert!(!OutboxError::RecordNotFound(Uuid::nil()).is_delivery_failure());
        assert!(!OutboxError::UnknownDestination("mail".into()).is_delivery_failure());
    }
}
