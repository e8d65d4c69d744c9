use super::repository;
use crate::types::{Context, JobFn, SchedulableJob};
use std::str::FromStr;
use std::sync::Arc;

async fn clean_sessions_job(ctx: Arc<Context>) -> Result<(), apalis::prelude::Error> {
    if let Ok(deleted) = repository::delete_expired(&ctx.db_conn.pool).await {
        tracing::info!("Removed {} expired sessions", deleted);
    }

    Ok(())
}

fn setup_clean_sessions_job(ctx: Arc<Context>) -> JobFn {
    Arc::new(move || {
        let ctx = ctx.clone();
        Box::pin(async move { clean_sessions_job(ctx).await })
    })
}

pub fn list(ctx: Arc<Context>) -> Vec<SchedulableJob> {
    match apalis::cron::Schedule::from_str("0 0 * * * *") {
        Ok(schedule) => vec![SchedulableJob {
            name: "nightbite::auth::clean_sessions",
            schedule,
            job: setup_clean_sessions_job(ctx),
        }],
        Err(err) => {
            tracing::error!("Invalid session cleanup schedule: {}", err);
            vec![]
        }
    }
}
