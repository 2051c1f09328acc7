use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use parking_lot::Mutex;
use tracing::{error, info};

use conveyor::config::Config;
use conveyor::{AdaptiveRingBuffer, ControllableWorker, WorkerStatus};

/// conveyor - producer/consumer byte pipeline demo
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Pumps synthetic capture data through an adaptive ring buffer into a file",
    long_about = "Pumps synthetic capture data through an adaptive ring buffer into a file.\n\n\
                  A producer thread plays the role of a capture callback and writes fixed-size \
                  chunks into the buffer; a controllable worker drains the buffer to disk. \
                  Configuration is loaded from conveyor.yaml by default, or use --config to \
                  specify a different file."
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", default_value = "conveyor.yaml")]
    config: String,

    /// How long to run the pipeline, in seconds
    #[arg(short, long, default_value_t = 5)]
    duration: u64,

    /// Directory for the captured output file
    #[arg(short, long, default_value = "./captures")]
    output: String,
}

/// Load configuration from file or use defaults
fn load_config(config_path: &str) -> Result<Config> {
    let path = Path::new(config_path);

    // If explicit config path provided and file doesn't exist, error
    if config_path != "conveyor.yaml" && !path.exists() {
        anyhow::bail!("Config file not found: {}", config_path);
    }

    // If default path and file doesn't exist, use defaults
    if config_path == "conveyor.yaml" && !path.exists() {
        return Ok(Config::default());
    }

    Config::from_file(path)
}

/// Generate a timestamp for file naming
fn generate_timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conveyor=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    let output_dir = PathBuf::from(&args.output);
    std::fs::create_dir_all(&output_dir).context("Failed to create output directory")?;
    let filepath = output_dir.join(format!("capture-{}.bin", generate_timestamp()));
    let file = File::create(&filepath)
        .with_context(|| format!("Failed to create output file: {}", filepath.display()))?;
    let mut sink = BufWriter::new(file);

    // The buffer is single-producer/single-consumer and unsynchronized; the
    // two threads share it behind this mutex.
    let buffer = Arc::new(Mutex::new(AdaptiveRingBuffer::new(
        config.buffer.capacity,
        config.buffer.auto_grow,
    )));

    // Producer thread: stands in for a capture callback
    let producing = Arc::new(AtomicBool::new(true));
    let bytes_produced = Arc::new(AtomicU64::new(0));
    let producer = {
        let buffer = Arc::clone(&buffer);
        let producing = Arc::clone(&producing);
        let produced = Arc::clone(&bytes_produced);
        let chunk_bytes = config.producer.chunk_bytes;
        let interval = Duration::from_millis(config.producer.interval_ms);
        thread::spawn(move || {
            let mut chunk = vec![0u8; chunk_bytes];
            let mut next_byte = 0u8;
            while producing.load(Ordering::Relaxed) {
                for byte in chunk.iter_mut() {
                    *byte = next_byte;
                    next_byte = next_byte.wrapping_add(1);
                }
                buffer.lock().write(&chunk);
                produced.fetch_add(chunk_bytes as u64, Ordering::Relaxed);
                thread::sleep(interval);
            }
        })
    };

    // Consumer worker: drains the buffer into the output file
    let bytes_drained = Arc::new(AtomicU64::new(0));
    let worker = {
        let buffer = Arc::clone(&buffer);
        let drained = Arc::clone(&bytes_drained);
        let mut scratch = vec![0u8; config.producer.chunk_bytes * 4];
        let mut last_flush = Instant::now();
        let flush_interval = Duration::from_secs(2);
        ControllableWorker::new(config.worker.name.as_str(), config.worker.priority, move || {
            let n = buffer.lock().read(&mut scratch);
            if n > 0 {
                if let Err(e) = sink.write_all(&scratch[..n]) {
                    error!("Failed to write captured bytes: {}", e);
                    return false;
                }
                drained.fetch_add(n as u64, Ordering::Relaxed);
            } else {
                thread::sleep(Duration::from_millis(1));
            }

            // Periodically flush to disk for crash safety
            if last_flush.elapsed() > flush_interval {
                if let Err(e) = sink.flush() {
                    error!("Failed to flush output file: {}", e);
                    return false;
                }
                last_flush = Instant::now();
            }
            true
        })
    };
    worker.set_work_finished_hook(|| info!("Drain loop finished"));

    info!("Pipeline starting, writing to {}", filepath.display());
    let status = worker.start();
    anyhow::ensure!(
        status == WorkerStatus::Running,
        "Worker failed to start: {:?}",
        status
    );

    // First half: free-running drain
    thread::sleep(Duration::from_secs(args.duration / 2));

    // Second half: pause the drain until the producer has built up a backlog,
    // then let the worker resume on its own via the predicate
    let backlog = config.producer.chunk_bytes * 8;
    let status = {
        let buffer = Arc::clone(&buffer);
        worker.suspend_until(
            Duration::from_millis(config.worker.poll_interval_ms),
            move || buffer.lock().current_size() >= backlog,
        )
    };
    info!("Drain suspended until {} bytes of backlog: {:?}", backlog, status);
    thread::sleep(Duration::from_secs(args.duration - args.duration / 2));

    // Shut the producer down, give the worker a moment to drain the tail
    producing.store(false, Ordering::Relaxed);
    producer
        .join()
        .map_err(|_| anyhow::anyhow!("Producer thread panicked"))?;

    let deadline = Instant::now() + Duration::from_secs(2);
    while buffer.lock().current_size() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    let leftover = buffer.lock().current_size();
    worker.stop();

    info!(
        produced = bytes_produced.load(Ordering::Relaxed),
        drained = bytes_drained.load(Ordering::Relaxed),
        leftover,
        "Pipeline stopped"
    );
    Ok(())
}
