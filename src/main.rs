use nightbite_backend_rs::{
    app::App,
    jobs,
    types::{Config, Context, ToContext},
};
use std::sync::Arc;
use tracing_subscriber::prelude::*;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let ctx = match Config::from_env() {
        Ok(config) => config.to_context().await,
        Err(err) => Err(err),
    };

    let ctx: Arc<Context> = match ctx {
        Ok(ctx) => Arc::new(ctx),
        Err(err) => {
            tracing::error!("Failed to start: {}", err);
            std::process::exit(1);
        }
    };

    let app = App::new(ctx.clone());

    let http = async {
        if let Err(err) = app.serve().await {
            tracing::error!("HTTP server stopped: {}", err);
        }
    };
    let job_monitor = async {
        if let Err(err) = jobs::monitor(ctx.clone()).run().await {
            tracing::error!("Job monitor stopped: {}", err);
        }
    };

    tokio::join!(http, job_monitor);
}
