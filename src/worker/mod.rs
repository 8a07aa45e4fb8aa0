// ============================================================================
// Crawl Worker
// ============================================================================
//
// Glue between the broker and the dedup store.
//
// - state.rs - WorkerState shared by every in-flight job
// - processor.rs - one job: dedup check, fetch, extract, publish, mark seen
// - runner.rs - consume loop with bounded concurrency and ack/nack/reject
//
// A job is acked only after every discovered link has been confirmed by the
// broker and the page has been recorded as seen. Anything that may succeed
// on redelivery is nacked with requeue.
//
// ============================================================================

pub mod processor;
pub mod runner;
pub mod state;

pub use processor::{ProcessResult, parse_job, process_delivery};
pub use runner::{run, seed_root};
pub use state::WorkerState;
