use crate::crawler::FetchError;
use crate::queue::BrokerError;
use crawler_redis::DedupError;
use thiserror::Error;

/// What to do with a consumed job after processing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done (crawled or already seen)
    Ack,
    /// Nack with requeue; the broker redelivers the job
    Requeue,
    /// Reject without requeue; the job can never succeed
    Drop,
}

/// Failure while processing one crawl job
#[derive(Error, Debug)]
pub enum ProcessError {
    // ===== Job Errors =====
    #[error("invalid crawl job: {0}")]
    InvalidJob(String),

    // ===== Dependency Errors =====
    #[error("dedup store error: {0}")]
    Dedup(#[from] DedupError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
}

impl ProcessError {
    /// Get error code for logs and metrics labels
    pub fn error_code(&self) -> &'static str {
        match self {
            ProcessError::InvalidJob(_) => "INVALID_JOB",
            ProcessError::Dedup(e) => e.error_code(),
            ProcessError::Broker(e) => e.error_code(),
            ProcessError::Fetch(FetchError::Status { .. }) => "FETCH_STATUS",
            ProcessError::Fetch(_) => "FETCH_ERROR",
        }
    }

    /// Requeue anything that may succeed on redelivery; drop the rest.
    ///
    /// Requeue has no attempt limit.
    pub fn disposition(&self) -> Disposition {
        match self {
            ProcessError::InvalidJob(_) => Disposition::Drop,
            ProcessError::Fetch(e) if e.is_client_error() => Disposition::Drop,
            ProcessError::Fetch(_) => Disposition::Requeue,
            ProcessError::Dedup(DedupError::Protocol(_)) => Disposition::Drop,
            ProcessError::Dedup(_) => Disposition::Requeue,
            ProcessError::Broker(BrokerError::Protocol(_)) => Disposition::Drop,
            ProcessError::Broker(_) => Disposition::Requeue,
        }
    }
}
