use crate::config::types::{Config, WatchMode};
use crate::config::{load_config, ConfigError};
use crate::pipeline::{dispatch, sink_for, Coordinator, DispatchError};
use crate::rule::load_rules;
use crate::source::WatchTargets;
use crate::watch::{NativeWatcher, PollWatcher, WatchError, Watcher};
use std::path::Path;
use thiserror::Error;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

pub async fn run(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;
    run_with_config(&config).await
}

/// Build the pipeline from `config` and run it until Ctrl+C or a watcher
/// failure.
pub async fn run_with_config(config: &Config) -> Result<(), RunError> {
    let filter = config.input.include_filter();

    let loaded = load_rules(&config.events);
    info!(
        rules = loaded.rules.len(),
        dropped = loaded.rejected.len(),
        "Rules loaded"
    );
    if loaded.rules.is_empty() {
        warn!("No usable rules, file changes will be read but produce no events");
    }

    let targets = WatchTargets::from_input(&config.input, filter.as_ref());
    for path in targets.paths() {
        info!(path = %path.display(), "Tailing file");
    }
    if targets.is_empty() {
        warn!("No files to tail");
    }

    let mut watcher = create_watcher(config);
    watcher.set_filter(filter);
    for path in config.input.files.iter().chain(&config.input.directories) {
        if let Err(e) = watcher.watch(path) {
            warn!(path = %path.display(), error = %e, "Could not register watch");
        }
    }
    let streams = watcher.start()?;

    let mut coordinator = Coordinator::new(targets, loaded.rules, sink_for(config.output.format))
        .with_partial_lines(config.input.hold_partial_lines);

    info!("Pipeline started, press Ctrl+C to shutdown");

    let result = {
        let dispatcher = dispatch(streams, &mut coordinator);
        tokio::pin!(dispatcher);

        tokio::select! {
            result = &mut dispatcher => result,
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                watcher.stop();
                dispatcher.await
            }
        }
    };

    watcher.stop();
    coordinator.shutdown();

    match result {
        Ok(stats) => {
            info!(
                steps = stats.steps,
                events = stats.events,
                untracked = stats.untracked,
                read_failures = stats.read_failures,
                "Pipeline shutdown complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Pipeline stopped on watcher failure");
            Err(e.into())
        }
    }
}

fn create_watcher(config: &Config) -> Box<dyn Watcher> {
    match config.watch.mode {
        WatchMode::Poll => {
            info!(interval = ?config.watch.poll_interval, "Using poll watcher");
            Box::new(PollWatcher::new(config.watch.poll_interval))
        }
        WatchMode::Native => {
            info!("Using native watcher");
            Box::new(NativeWatcher::new())
        }
    }
}
