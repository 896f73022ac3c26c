//! The dealforge worker pool.
//!
//! Spawns a bounded number of worker threads, each pulling jobs from the
//! durable queues and dispatching them through the handler registry.
//! State lives only in Postgres; any worker can die at any time and
//! another (here or in a different process) picks up the queue.

use std::{env, process, sync::Arc, thread, time::Duration};

use dealforge_common::{
    config::Config, db, dealforge_version, prelude::*, tracing_support,
};
use rand::Rng;

mod handlers;
mod scheduler;

use handlers::{HandlerRegistry, IngestionHandler};

/// Instructions on how to use this program.
const USAGE: &str = "Usage: dealforge-worker";

fn main() -> Result<()> {
    tracing_support::initialize_tracing();

    let args = env::args().collect::<Vec<_>>();
    if args.len() > 1 {
        if args[1] == "--version" {
            println!("{} {}", env!("CARGO_PKG_NAME"), dealforge_version());
            process::exit(0);
        }
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    let config = Config::load()?;

    // Make sure the schema is current before any worker touches it.
    let mut conn = db::connect()?;
    db::run_pending_migrations(&mut conn)?;
    drop(conn);

    // One pooled connection per worker thread. The pool re-establishes
    // broken connections on the next checkout, so a database restart
    // costs a poll interval, not a worker.
    let pool = db::pool(config.worker.concurrency as u32)?;

    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(IngestionHandler::new(config.clone())));
    let registry = Arc::new(registry);

    scheduler::start_scheduler()?;

    info!(
        concurrency = config.worker.concurrency,
        queues = ?registry.queues(),
        "worker pool starting"
    );
    let mut joins = Vec::new();
    for n in 0..config.worker.concurrency {
        let registry = registry.clone();
        let config = config.clone();
        let pool = pool.clone();
        let builder = thread::Builder::new().name(format!("worker-{}", n));
        let handle = builder
            .spawn(move || worker_loop(n, &registry, &config, &pool))
            .context("could not create worker thread")?;
        joins.push(handle);
    }

    // The loops never return; if one does, the pool is wedged and the
    // process should die noisily so the supervisor restarts it.
    for handle in joins {
        if handle.join().is_err() {
            error!("worker thread panicked, aborting");
            process::abort();
        }
    }
    bail!("worker pool exited unexpectedly");
}

/// One worker: claim, dispatch, report, repeat.
fn worker_loop(n: usize, registry: &HandlerRegistry, config: &Config, pool: &db::Pool) {
    let worker_id = format!("{}/worker-{}", hostname(), n);
    let queues = registry.queues();

    // Outer loop checks out the connection so a database failure falls
    // back to the pool instead of killing the worker.
    loop {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(err) => {
                error!(worker = %worker_id, "cannot connect (will retry): {:#}", err);
                thread::sleep(config.worker.poll_interval);
                continue;
            }
        };

        loop {
            match QueueJob::reserve_next(&queues, &worker_id, &mut conn) {
                Ok(Some(mut job)) => {
                    trace!(worker = %worker_id, job = %job.id, "claimed");
                    let result = registry.dispatch(&job, &mut conn);
                    let report = match result {
                        Ok(()) => job.complete(&mut conn),
                        Err(err) => {
                            warn!(
                                worker = %worker_id,
                                job = %job.id,
                                queue = %job.queue,
                                "job failed: {:#}",
                                err
                            );
                            job.fail(&err, &mut conn)
                        }
                    };
                    if let Err(err) = report {
                        // Reporting failed, most likely a dropped
                        // connection. The job stays `running` until a
                        // babysitting pass or operator requeues it.
                        error!(worker = %worker_id, job = %job.id, "cannot report: {:#}", err);
                        thread::sleep(config.worker.poll_interval);
                        break;
                    }
                }
                Ok(None) => {
                    // Idle. Jittered sleep so a fleet of workers doesn't
                    // poll in lockstep.
                    let jitter = rand::thread_rng().gen_range(0..=1000);
                    thread::sleep(config.worker.poll_interval + Duration::from_millis(jitter));
                }
                Err(err) => {
                    // Sleep first: if the error isn't a dead connection,
                    // the pool hands back a live one immediately and this
                    // would otherwise spin hot.
                    error!(worker = %worker_id, "cannot reserve (reconnecting): {:#}", err);
                    thread::sleep(config.worker.poll_interval);
                    break;
                }
            }
        }
    }
}

fn hostname() -> String {
    env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_owned())
}
