use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use sunswitch_core::astro::{calc_jd, julian_century};
use sunswitch_core::config::Config;
use sunswitch_core::context::ScheduleContext;
use sunswitch_core::report::{NoonReport, ScheduleReport, SunReport};
use sunswitch_core::schedule::Schedule;
use sunswitch_core::solar::{calc_next_sun_at, calc_sun, solar_noon_utc, GeoCoordinate};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about = "Sunrise, sunset and schedule calculations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Args, Clone)]
struct Location {
    #[arg(long = "lat", default_value_t = 37.451688, allow_hyphen_values = true)]
    latitude: f64,

    /// Positive WEST of the meridian
    #[arg(long = "long", default_value_t = 122.18305, allow_hyphen_values = true)]
    longitude: f64,

    /// UTC calendar date, YYYY-MM-DD (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl Location {
    fn coord(&self) -> GeoCoordinate {
        GeoCoordinate::new(self.latitude, self.longitude)
    }

    fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sunrise and sunset for a date
    Sun {
        #[command(flatten)]
        location: Location,
    },
    /// Solar noon for a date
    Noon {
        #[command(flatten)]
        location: Location,
    },
    /// The next sunrise/sunset pair after now
    Next {
        #[command(flatten)]
        location: Location,

        #[arg(long)]
        unixtime: Option<f64>,
    },
    /// Resolve a schedule file and report whether it says ON right now
    Schedule {
        #[arg(long, default_value = "/etc/sunswitch/schedule.conf")]
        schedule: PathBuf,

        #[arg(long, default_value = "/etc/sunswitch/global.conf")]
        config: PathBuf,

        #[arg(long)]
        unixtime: Option<f64>,
    },
}

fn now_or(unixtime: Option<f64>) -> f64 {
    unixtime.unwrap_or_else(|| Utc::now().timestamp() as f64)
}

fn emit<T: Serialize>(json: bool, report: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        text(report);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Sun { location } => {
            let coord = location.coord();
            let date = location.date();
            let times = calc_sun(&coord, date)?;
            emit(cli.json, &SunReport::new(&coord, date, times), |r| {
                println!("Lat: {}  Long: {}  Date: {}", r.latitude, r.longitude, r.date);
                println!("Sunrise: {}  Sunset: {}", r.sunrise_utc, r.sunset_utc);
            })
        }
        Commands::Noon { location } => {
            let date = location.date();
            let t = julian_century(calc_jd(date.year(), date.month(), date.day()));
            let minutes = solar_noon_utc(t, location.longitude);
            emit(cli.json, &NoonReport::new(location.longitude, date, minutes), |r| {
                println!("Solar noon on {}: {} UTC", r.date, r.solar_noon_utc);
            })
        }
        Commands::Next { location, unixtime } => {
            let coord = location.coord();
            let date = location.date();
            let times = calc_next_sun_at(&coord, date, now_or(unixtime))
                .context("No upcoming sunrise/sunset pair in the three-day window")?;
            emit(cli.json, &SunReport::new(&coord, date, times), |r| {
                println!("Next sunrise: {}  Next sunset: {}", r.sunrise_utc, r.sunset_utc);
            })
        }
        Commands::Schedule { schedule, config, unixtime } => {
            let config = Config::load_from_file(&config)
                .with_context(|| format!("Cannot read config file {:?}", config))?;
            let ctx = ScheduleContext::from_config(&config)?;
            let schedule = Schedule::load(&schedule)
                .with_context(|| format!("Cannot read schedule file {:?}", schedule))?;

            let now = now_or(unixtime);
            let intervals = schedule.intervals(&ctx, ctx.local_date(now)?)?;
            emit(cli.json, &ScheduleReport::new(&intervals, now), |r| {
                for interval in &r.intervals {
                    let marker = if interval.active { "*" } else { " " };
                    println!("{} START {}  STOP {}", marker, interval.start_utc, interval.end_utc);
                }
                println!("System should be {}", if r.should_be_on { "ON" } else { "OFF" });
            })
        }
    }
}
