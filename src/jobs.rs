use crate::modules::{auth, delivery, notification};
use crate::types::{self, Context, SchedulableJob};
use apalis::cron::CronStream;
use apalis::prelude::*;
use apalis::utils::TokioExecutor;
use std::sync::Arc;

fn list(ctx: Arc<Context>) -> Vec<SchedulableJob> {
    let mut jobs = auth::job::list(ctx.clone());
    jobs.extend(notification::job::list(ctx.clone()));
    jobs.extend(delivery::job::list(ctx));
    jobs
}

pub fn monitor(ctx: Arc<Context>) -> Monitor<TokioExecutor> {
    let mut monitor = Monitor::<TokioExecutor>::new();

    for job in list(ctx) {
        tracing::debug!("Scheduling {}", job.name);

        let run = job.job.clone();
        let worker = WorkerBuilder::new(job.name)
            .stream(CronStream::new(job.schedule).into_stream())
            .build_fn(move |_: types::Job| {
                let run = run.clone();
                async move { run().await }
            });

        monitor = monitor.register_with_count(1, worker);
    }

    monitor
}
