//! Per-queue job handlers.
//!
//! A worker dispatches each claimed queue job to the handler registered
//! for its queue. Handlers must tolerate re-delivery: the broker is
//! at-least-once, so the same payload can arrive twice after a crash.
//! The ingestion handler is idempotent at the row level by construction;
//! it records a fresh job plus raw rows per invocation, accepting
//! duplicate raw rows rather than silently dropping data.

use std::collections::HashMap;

use dealforge_common::{
    config::Config,
    ingest::{process_ingestion_job, IngestionRequest},
    prelude::*,
    queue::queues,
};

/// A handler for one named queue.
pub trait JobHandler: Send + Sync {
    /// The queue this handler serves.
    fn queue(&self) -> &'static str;

    /// Process one claimed job. An `Err` return requeues the job (with
    /// backoff) until its attempts run out.
    fn run(&self, job: &QueueJob, conn: &mut PgConnection) -> Result<()>;
}

/// The set of handlers a worker process serves, keyed by queue name.
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Box<dyn JobHandler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        HandlerRegistry { handlers: HashMap::new() }
    }

    /// Register a handler. Panics on a duplicate queue, which is a
    /// programming error worth failing loudly over at startup.
    pub fn register(&mut self, handler: Box<dyn JobHandler>) {
        let queue = handler.queue();
        if self.handlers.insert(queue, handler).is_some() {
            panic!("two handlers registered for queue {:?}", queue);
        }
    }

    /// The queues this registry can serve. Workers only reserve jobs on
    /// these queues; everything else is left for other processes.
    pub fn queues(&self) -> Vec<&'static str> {
        let mut queues: Vec<&'static str> = self.handlers.keys().copied().collect();
        queues.sort_unstable();
        queues
    }

    /// Dispatch one claimed job.
    pub fn dispatch(&self, job: &QueueJob, conn: &mut PgConnection) -> Result<()> {
        match self.handlers.get(job.queue.as_str()) {
            Some(handler) => handler.run(job, conn),
            // Shouldn't happen, since we only reserve handled queues.
            None => bail!("no handler registered for queue {:?}", job.queue),
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        HandlerRegistry::new()
    }
}

/// Thin adapter from the ingestion queue to the ingestion recorder.
pub struct IngestionHandler {
    config: Config,
}

impl IngestionHandler {
    /// Build an ingestion handler with the given pipeline config.
    pub fn new(config: Config) -> Self {
        IngestionHandler { config }
    }
}

impl JobHandler for IngestionHandler {
    fn queue(&self) -> &'static str {
        queues::INGESTION
    }

    fn run(&self, job: &QueueJob, conn: &mut PgConnection) -> Result<()> {
        let request: IngestionRequest = serde_json::from_value(job.payload.clone())
            .context("ingestion job payload is not an ingestion request")?;
        let report = process_ingestion_job(&request, &self.config, conn)?;
        info!(
            queue_job = %job.id,
            ingestion_job = %report.job_id,
            recorded = report.stats.recorded,
            errors = report.stats.errors,
            "ingestion batch processed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHandler(&'static str);

    impl JobHandler for NullHandler {
        fn queue(&self) -> &'static str {
            self.0
        }
        fn run(&self, _job: &QueueJob, _conn: &mut PgConnection) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn registry_serves_only_registered_queues() {
        let mut registry = HandlerRegistry::new();
        registry.register(Box::new(NullHandler(queues::INGESTION)));
        registry.register(Box::new(NullHandler(queues::REWARDS)));
        assert_eq!(registry.queues(), vec![queues::INGESTION, queues::REWARDS]);
    }

    #[test]
    #[should_panic(expected = "two handlers registered")]
    fn duplicate_registration_panics() {
        let mut registry = HandlerRegistry::new();
        registry.register(Box::new(NullHandler(queues::INGESTION)));
        registry.register(Box::new(NullHandler(queues::INGESTION)));
    }
}
