mod app;
mod config;
mod handlers;
mod steps;
mod store;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{app::App, steps::Step};

#[derive(Parser, Debug)]
#[command(about = "Drives the sample Counter and Todos slices through their facades")]
struct Args {
    /// TOML settings file; `slice_demo.toml` in the working directory is used when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dispatch every operation directly instead of on the deferred path.
    #[arg(long, conflicts_with = "deferred_by_default")]
    pure_by_default: bool,
    #[arg(long)]
    deferred_by_default: bool,
    /// Steps such as `Counter.setCount=5` or `Todos.add={"title":"milk"}`.
    steps: Vec<Step>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = config::load_settings(args.config.as_deref())?;
    if args.pure_by_default {
        settings.pure_by_default = true;
    }
    if args.deferred_by_default {
        settings.pure_by_default = false;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let app = App::bootstrap(&settings)?;

    let mut events = app.runner().subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => info!(event = %line, "effect event"),
                Err(err) => warn!(error = %err, "failed to encode effect event"),
            }
        }
    });

    let mut actions = app.store().subscribe();
    let action_task = tokio::spawn(async move {
        while let Ok(action) = actions.recv().await {
            debug!(tag = action.tag(), payload = %action.payload(), "action dispatched");
        }
    });

    if args.steps.is_empty() {
        app.run_script().await?;
    } else {
        for step in &args.steps {
            app.apply(step)?;
            // Each step observes the effects of the previous ones.
            app.runner().wait_idle().await;
        }
    }

    let state = app.shutdown().await;
    event_task.abort();
    action_task.abort();
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
