use super::service;
use crate::types::{Context, JobFn, SchedulableJob};
use std::str::FromStr;
use std::sync::Arc;

async fn dispatch_scheduled_job(ctx: Arc<Context>) -> Result<(), apalis::prelude::Error> {
    match service::scheduled::dispatch_due(ctx).await {
        Ok(0) => (),
        Ok(count) => tracing::info!("Dispatched {} scheduled notifications", count),
        Err(err) => tracing::error!("Failed to dispatch scheduled notifications: {:?}", err),
    };

    Ok(())
}

fn setup_dispatch_scheduled_job(ctx: Arc<Context>) -> JobFn {
    Arc::new(move || {
        let ctx = ctx.clone();
        Box::pin(async move { dispatch_scheduled_job(ctx).await })
    })
}

pub fn list(ctx: Arc<Context>) -> Vec<SchedulableJob> {
    match apalis::cron::Schedule::from_str("0 * * * * *") {
        Ok(schedule) => vec![SchedulableJob {
            name: "nightbite::notification::dispatch_scheduled",
            schedule,
            job: setup_dispatch_scheduled_job(ctx),
        }],
        Err(err) => {
            tracing::error!("Invalid scheduled notification schedule: {}", err);
            vec![]
        }
    }
}
