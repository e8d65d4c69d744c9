use super::service;
use crate::types::{Context, JobFn, SchedulableJob};
use std::str::FromStr;
use std::sync::Arc;

async fn retry_dispatch_job(ctx: Arc<Context>) -> Result<(), apalis::prelude::Error> {
    match service::dispatch_open_orders(ctx).await {
        Ok(0) => (),
        Ok(count) => tracing::info!("Dispatched {} waiting orders", count),
        Err(err) => tracing::error!("Failed to retry order dispatch: {:?}", err),
    };

    Ok(())
}

fn setup_retry_dispatch_job(ctx: Arc<Context>) -> JobFn {
    Arc::new(move || {
        let ctx = ctx.clone();
        Box::pin(async move { retry_dispatch_job(ctx).await })
    })
}

pub fn list(ctx: Arc<Context>) -> Vec<SchedulableJob> {
    match apalis::cron::Schedule::from_str("30 * * * * *") {
        Ok(schedule) => vec![SchedulableJob {
            name: "nightbite::delivery::retry_dispatch",
            schedule,
            job: setup_retry_dispatch_job(ctx),
        }],
        Err(err) => {
            tracing::error!("Invalid dispatch retry schedule: {}", err);
            vec![]
        }
    }
}
