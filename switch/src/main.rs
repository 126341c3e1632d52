use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use sunswitch_core::config::{CommandConfig, Config};
use sunswitch_core::context::ScheduleContext;
use sunswitch_core::device::{apply, Action, DeviceController, DryRunController, ShellController};
use sunswitch_core::report::format_utc;
use sunswitch_core::schedule::{disposition, Schedule};
use tracing::{debug, info};

mod logging;

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn a device on or off according to a sun-aware schedule", long_about = None)]
struct Args {
    /// File to read schedule data from
    #[arg(long, default_value = "/etc/sunswitch/schedule.conf")]
    schedule: PathBuf,

    /// File to read latitude/longitude and commands from
    #[arg(long, default_value = "/etc/sunswitch/global.conf")]
    config: PathBuf,

    /// Command to run when the schedule says the system should be ON
    #[arg(long)]
    start: Option<String>,

    /// Command to run when the schedule says the system should be OFF
    #[arg(long)]
    stop: Option<String>,

    /// Command that exits 1 when the system is ON and 0 when it is OFF
    #[arg(long)]
    status: Option<String>,

    /// Evaluate at this Unix timestamp instead of now
    #[arg(long)]
    unixtime: Option<f64>,

    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    debug: bool,
}

fn merge_commands(args: &Args, configured: &CommandConfig) -> CommandConfig {
    CommandConfig {
        start: args.start.clone().or_else(|| configured.start.clone()),
        stop: args.stop.clone().or_else(|| configured.stop.clone()),
        status: args.status.clone().or_else(|| configured.status.clone()),
        timeout_secs: configured.timeout_secs,
    }
}

/// Runs the controller off the async threads. Each command it spawns is
/// killed once the controller's own deadline passes, so the task always ends.
async fn switch<C>(mut controller: C, should_be_on: bool) -> Result<Action>
where
    C: DeviceController + Send + 'static,
{
    let action = tokio::task::spawn_blocking(move || apply(&mut controller, should_be_on))
        .await
        .context("Device task panicked")??;
    Ok(action)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_from_file(&args.config)
        .with_context(|| format!("Cannot read config file {:?}", args.config))?;

    logging::init(logging::resolve_level(args.debug, &config.general.log_level))?;
    info!("Starting sunswitch...");

    let ctx = ScheduleContext::from_config(&config).context("Invalid configuration")?;
    let schedule = Schedule::load(&args.schedule)
        .with_context(|| format!("Cannot read schedule file {:?}", args.schedule))?;

    let now = args
        .unixtime
        .unwrap_or_else(|| chrono::Utc::now().timestamp() as f64);
    let today = ctx.local_date(now)?;
    let intervals = schedule
        .intervals(&ctx, today)
        .context("Failed to resolve schedule")?;

    for interval in &intervals {
        debug!(
            "START {}  STOP {}",
            format_utc(interval.start),
            format_utc(interval.end)
        );
    }

    let should_be_on = disposition(&intervals, now);
    info!(
        "At {} the system should be {}",
        format_utc(now),
        if should_be_on { "ON" } else { "OFF" }
    );

    let commands = merge_commands(&args, &config.commands);
    let shell = ShellController::from_config(&commands)
        .context("Start and stop commands are required")?;
    debug!("Commands are killed after {:?}", shell.timeout());

    let action = if args.dry_run {
        switch(DryRunController::new(shell), should_be_on).await?
    } else {
        switch(shell, should_be_on).await?
    };

    info!("Done: {:?}", action);
    Ok(())
}
