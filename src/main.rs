use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::de::DeserializeOwned;
use tokio::task::block_in_place;
use tokio::time::{sleep, Duration, Instant};

use ride_tracker_rs::advisory::session_feedback;
use ride_tracker_rs::replay::load_log;
use ride_tracker_rs::summary::MPS_TO_MPH;
use ride_tracker_rs::{
    AccelSample, Engine, EngineHandle, GpsReading, SensorEvent, Session, SessionContext,
    SessionResult, SessionSummary, TrackerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "ride_tracker")]
#[command(about = "Replay a recorded ride through the GPS/accelerometer tracker", long_about = None)]
struct Args {
    /// Path to ride log (.json or .json.gz)
    #[arg(long)]
    log: PathBuf,

    /// Tracker thresholds as JSON (missing keys keep defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bike details JSON
    #[arg(long)]
    bike: Option<PathBuf>,

    /// Weather JSON
    #[arg(long)]
    weather: Option<PathBuf>,

    /// Track conditions JSON
    #[arg(long)]
    track: Option<PathBuf>,

    /// Pace the sensor streams by their recorded timestamps
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Pause the session at this log time (seconds)
    #[arg(long)]
    pause_at: Option<f64>,

    /// Resume the session at this log time (seconds)
    #[arg(long, requires = "pause_at")]
    resume_at: Option<f64>,

    /// Write the session summary JSON here
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Maps log timestamps onto wall time for `--realtime`
#[derive(Clone, Copy)]
struct Pacer {
    origin: f64,
    started: Instant,
}

impl Pacer {
    async fn wait_until(&self, timestamp: f64) {
        let target = Duration::from_secs_f64((timestamp - self.origin).max(0.0));
        let elapsed = self.started.elapsed();
        if target > elapsed {
            sleep(target - elapsed).await;
        }
    }
}

/// `--pause-at` / `--resume-at`, applied once each as log time passes them
#[derive(Clone, Copy)]
struct PauseSchedule {
    pause_at: Option<f64>,
    resume_at: Option<f64>,
    paused: bool,
    resumed: bool,
}

impl PauseSchedule {
    fn new(pause_at: Option<f64>, resume_at: Option<f64>) -> Self {
        Self {
            pause_at,
            resume_at,
            paused: false,
            resumed: false,
        }
    }

    fn apply(&mut self, handle: &EngineHandle, timestamp: f64) -> SessionResult<()> {
        if !self.paused && self.pause_at.is_some_and(|t| timestamp >= t) {
            block_in_place(|| handle.pause())?;
            println!("[{}] Paused at t={:.2}s", ts_now(), timestamp);
            self.paused = true;
        }
        if self.paused && !self.resumed && self.resume_at.is_some_and(|t| timestamp >= t) {
            block_in_place(|| handle.resume())?;
            println!("[{}] Resumed at t={:.2}s", ts_now(), timestamp);
            self.resumed = true;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let (Some(pause), Some(resume)) = (args.pause_at, args.resume_at) {
        if resume <= pause {
            bail!("--resume-at ({}) must be after --pause-at ({})", resume, pause);
        }
    }

    let config = match &args.config {
        Some(path) => TrackerConfig::from_json_file(path)?,
        None => TrackerConfig::default(),
    };

    let mut context = SessionContext::default();
    if let Some(path) = &args.bike {
        context.bike = load_json(path)?;
    }
    if let Some(path) = &args.weather {
        context.weather = load_json(path)?;
    }
    if let Some(path) = &args.track {
        context.track = load_json(path)?;
    }

    let log = load_log(&args.log)?;
    let events = log.events();
    let gps_count = events
        .iter()
        .filter(|e| matches!(e, SensorEvent::Gps(_)))
        .count();

    println!("[{}] Ride Tracker Starting", ts_now());
    println!("  Log: {}", args.log.display());
    println!("  GPS readings: {}", gps_count);
    println!("  Accel samples: {}", events.len() - gps_count);
    println!("  Realtime: {}", args.realtime);

    let engine = Engine::spawn(Session::new(context, config));
    let handle = engine.handle();

    // Everything up to the first fix goes in before start so laps have an anchor
    let first_fix = events
        .iter()
        .position(|e| matches!(e, SensorEvent::Gps(GpsReading::Fix(_))));
    let split_at = first_fix.map_or(0, |i| i + 1);
    let (leading, rest) = events.split_at(split_at);
    for event in leading {
        handle.submit(event.clone())?;
    }
    if first_fix.is_none() {
        log::warn!("Log has no GPS fix, running on accelerometer only");
    }
    block_in_place(|| handle.start())?;

    let schedule = PauseSchedule::new(args.pause_at, args.resume_at);
    let sent = if args.realtime {
        let origin = leading
            .iter()
            .rev()
            .chain(rest.iter())
            .find_map(SensorEvent::timestamp)
            .unwrap_or(0.0);
        let pacer = Pacer {
            origin,
            started: Instant::now(),
        };

        let mut gps = Vec::new();
        let mut accel = Vec::new();
        for event in rest {
            match event {
                SensorEvent::Gps(reading) => gps.push(reading.clone()),
                SensorEvent::Accel(sample) => accel.push(*sample),
            }
        }
        let gps_task = tokio::spawn(produce_gps(handle.clone(), gps, pacer));
        let accel_task = tokio::spawn(produce_accel(handle.clone(), accel, pacer, schedule));
        gps_task.await?? + accel_task.await??
    } else {
        // Unpaced producers would race; one producer keeps sensor time order
        tokio::spawn(produce_merged(handle.clone(), rest.to_vec(), schedule)).await??
    };
    log::info!("Replayed {} events", sent + leading.len());

    let snapshot = block_in_place(|| handle.snapshot())?;
    println!(
        "[{}] Final live state: {:?}, {} path points, advisory \"{}\"",
        ts_now(),
        snapshot.state,
        snapshot.path.len(),
        snapshot.advisory
    );

    let summary = block_in_place(|| handle.stop())?;
    block_in_place(|| engine.shutdown());

    print_summary(&summary);

    if let Some(path) = &args.output {
        std::fs::write(path, summary.to_json()?)
            .with_context(|| format!("writing summary to {}", path.display()))?;
        println!("[{}] Summary saved to {}", ts_now(), path.display());
    }

    Ok(())
}

async fn produce_merged(
    handle: EngineHandle,
    events: Vec<SensorEvent>,
    mut schedule: PauseSchedule,
) -> SessionResult<usize> {
    let count = events.len();
    for event in events {
        if let Some(ts) = event.timestamp() {
            schedule.apply(&handle, ts)?;
        }
        handle.submit(event)?;
    }
    Ok(count)
}

async fn produce_gps(
    handle: EngineHandle,
    readings: Vec<GpsReading>,
    pacer: Pacer,
) -> SessionResult<usize> {
    let count = readings.len();
    for reading in readings {
        if let GpsReading::Fix(fix) = &reading {
            pacer.wait_until(fix.timestamp).await;
        }
        handle.submit_gps(reading)?;
    }
    Ok(count)
}

async fn produce_accel(
    handle: EngineHandle,
    samples: Vec<AccelSample>,
    pacer: Pacer,
    mut schedule: PauseSchedule,
) -> SessionResult<usize> {
    let count = samples.len();
    for sample in samples {
        pacer.wait_until(sample.timestamp).await;
        schedule.apply(&handle, sample.timestamp)?;
        handle.submit_accel(sample)?;
    }
    Ok(count)
}

fn print_summary(summary: &SessionSummary) {
    let metrics = summary.metrics();
    let feedback = session_feedback(summary);

    println!("\n=== Session Summary ===");
    println!("  Session: {} (started {})", summary.session_id, summary.started_at);
    println!(
        "  Bike: {} {} @ {}",
        summary.bike_details.make, summary.bike_details.model, summary.bike_details.track
    );
    println!(
        "  Weather: {} / {} humidity",
        summary.weather.temp, summary.weather.humidity
    );
    println!("  Duration: {:.2} min", summary.test_duration_minutes);
    println!("  Distance: {:.1} m", summary.total_distance);
    println!(
        "  Time: {:.1} s total, {:.1} s moving",
        summary.total_time, summary.moving_time
    );
    println!(
        "  Speed: max {:.1} mph, avg {:.1} mph, moving avg {:.1} mph",
        metrics.max_speed_mph(),
        metrics.avg_speed_mph(),
        metrics.avg_moving_speed_mph()
    );
    println!("  Laps: {} ({})", summary.laps, summary.lap_consistency());
    if summary.laps > 0 {
        println!(
            "  Lap times: best {:.1} s, avg {:.1} s",
            metrics.best_lap_time, metrics.avg_lap_time
        );
    }
    println!(
        "  Jumps: {} (air time {:.2} s, avg {:.2} s, max {:.2} s)",
        summary.jump_count, summary.air_time, metrics.avg_air_time, metrics.max_air_time
    );
    println!(
        "  Cornering: score {:.2} g, avg corner speed {:.1} mph",
        summary.avg_cornering_score,
        metrics.avg_corner_speed_mph()
    );
    println!(
        "  Braking {:.2} m/s², acceleration {:.2} m/s²",
        metrics.braking_efficiency, metrics.accel_efficiency
    );
    println!("  Avg HPE: {:.2} m", summary.avg_hpe);
    println!(
        "  Session score: {} (progress {}%)",
        summary.session_score(),
        summary.progress_percent()
    );

    println!("\n=== Feedback ===");
    println!("  Tracking: {}", feedback.tracking);
    println!("  Cornering: {}", feedback.cornering);
    println!(
        "  Throttle: {} ({:.1} mph)",
        feedback.throttle,
        feedback.throttle_consistency * MPS_TO_MPH
    );
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
