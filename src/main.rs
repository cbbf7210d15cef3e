// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::Level;

use midicap::midi::{list_devices, print_devices, MidirBackend, OutputSelection};
use midicap::{convert_log_file, Notification, RecorderHandle, RecorderSettings, TickUnit};

/// How long to wait for the worker to acknowledge a command
const ACK_TIMEOUT: Duration = Duration::from_secs(5);

fn print_usage() {
    println!("midicap - MIDI capture and log conversion");
    println!();
    println!("Usage: midicap [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --list-devices                 List MIDI inputs and outputs");
    println!("  --record <IN> <OUT>            Record from input IN, forwarding to output OUT");
    println!("                                 (OUT = -1 records without forwarding)");
    println!("      --bpm <N>                  Tempo written to the file (default 120)");
    println!("      --resolution <N>           Ticks per beat (default 480)");
    println!("      --dir <PATH>               Directory to save into (default ~/Desktop)");
    println!("      --file <NAME>              File name (default recording_<timestamp>.mid)");
    println!("      --ticks <ms|beats>         Delta-time unit (default ms)");
    println!("      --config <FILE>            Load defaults from a YAML or TOML settings file");
    println!("  --convert <LOG> <OUT.mid>      Convert a text MIDI log to a MIDI file");
    println!("  --verbose                      Enable debug logging");
    println!("  --help                         Show this help message");
}

fn print_notification(notification: &Notification) {
    match notification {
        Notification::Status(msg) => println!("{}", msg),
        Notification::Error(msg) => eprintln!("Error: {}", msg),
    }
}

/// Value following an option flag
fn option_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn build_settings(args: &[String]) -> Result<RecorderSettings> {
    let mut settings = match option_value(args, "--config") {
        Some(path) => RecorderSettings::load(path)?,
        None => RecorderSettings::default(),
    };

    let session = &mut settings.session;
    if let Some(bpm) = option_value(args, "--bpm") {
        session.bpm = bpm.parse().map_err(|_| anyhow!("Invalid BPM: {}", bpm))?;
    }
    if let Some(resolution) = option_value(args, "--resolution") {
        session.resolution = resolution
            .parse()
            .map_err(|_| anyhow!("Invalid resolution: {}", resolution))?;
    }
    if let Some(dir) = option_value(args, "--dir") {
        session.save_path = PathBuf::from(dir);
    }
    if let Some(file) = option_value(args, "--file") {
        session.filename = file.to_string();
    }
    if let Some(unit) = option_value(args, "--ticks") {
        session.tick_unit =
            TickUnit::parse(unit).ok_or_else(|| anyhow!("Invalid tick unit: {} (use ms or beats)", unit))?;
    }
    session.validate()?;

    Ok(settings)
}

/// Wait for the reply to a command; errors abort the session
fn expect_status(recorder: &RecorderHandle) -> Result<()> {
    match recorder.recv_notification_timeout(ACK_TIMEOUT) {
        Some(Notification::Status(msg)) => {
            println!("{}", msg);
            Ok(())
        }
        Some(Notification::Error(msg)) => bail!(msg),
        None => bail!("No response from capture worker"),
    }
}

fn record(input: usize, output: OutputSelection, settings: RecorderSettings) -> Result<()> {
    let recorder = RecorderHandle::spawn(MidirBackend::new(), settings.poll_interval())?;

    recorder.connect(input, output)?;
    expect_status(&recorder)?;

    let target = settings.session.target_path();
    recorder.start_record(settings.session)?;
    expect_status(&recorder)?;

    println!("Recording to {:?} (press Enter to stop)...", target);
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;

    recorder.stop_record()?;
    let notifications = recorder.join();
    if notifications.is_empty() {
        println!("Nothing was recorded.");
    }
    for notification in &notifications {
        print_notification(notification);
    }
    if notifications.iter().any(Notification::is_error) {
        bail!("Recording finished with errors");
    }
    Ok(())
}

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();

    let verbose = args.iter().any(|arg| arg == "--verbose" || arg == "-v");
    args.retain(|arg| arg != "--verbose" && arg != "-v");
    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    if args.len() < 2 {
        println!("midicap - MIDI capture and log conversion");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--list-devices" => {
            let devices = list_devices(&MidirBackend::new())?;
            print_devices(&devices);
        }
        "--record" => {
            if args.len() < 4 {
                eprintln!("Error: --record requires an input and an output number");
                eprintln!("Use --list-devices to see available ports");
                std::process::exit(1);
            }
            let input: usize = args[2]
                .parse()
                .map_err(|_| anyhow!("Invalid input number: {}", args[2]))?;
            let output: i32 = args[3]
                .parse()
                .map_err(|_| anyhow!("Invalid output number: {}", args[3]))?;
            let settings = build_settings(&args[4..])?;
            record(input, OutputSelection::from_index(output)?, settings)?;
        }
        "--convert" => {
            if args.len() < 4 {
                eprintln!("Error: --convert requires a log file and an output file");
                std::process::exit(1);
            }
            let path = convert_log_file(&args[2], &args[3])
                .with_context(|| format!("Failed to convert {}", args[2]))?;
            println!("File saved: {}", path.display());
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
