use anyhow::Result;
use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use gaze_keys::app::{App, Outcome};
use gaze_keys::args::Args;
use gaze_keys::calibration::compute_calibration;
use gaze_keys::config::AppConfig;
use gaze_keys::layout::Variant;

/// Capture calibration samples by blinking at the keyboard corners, and
/// store them in the configuration file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CalibrateArgs {
    /// Camera Index (default 0)
    #[arg(short, long, default_value_t = 0)]
    cam_index: u32,

    /// Configuration file to update
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Mirror the camera image
    #[arg(long)]
    mirror: bool,

    /// Use the synthetic eye instead of the camera
    #[arg(long)]
    simulate: bool,

    /// Print the stored calibration and exit
    #[arg(long)]
    show: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = CalibrateArgs::parse();
    let config = AppConfig::load_from(&cli.config)?;

    if cli.show {
        print_calibration(&config);
        return Ok(());
    }

    let args = Args {
        cam_index: cli.cam_index,
        config: cli.config.clone(),
        variant: Some(Variant::Typing),
        calibrate: true,
        simulate: cli.simulate,
        mirror: cli.mirror,
        list: false,
    };
    let mut app = App::new(&args, config)?;
    match app.calibrate()? {
        Outcome::Calibrated(region) => {
            println!("{}", format!("Saved calibration to {}", cli.config).green());
            println!("Region: x {}..{}, y {}..{}", region.x_min, region.x_max, region.y_min, region.y_max);
        }
        Outcome::Quit => println!("{}", "Calibration aborted, configuration unchanged".yellow()),
    }
    Ok(())
}

fn print_calibration(config: &AppConfig) {
    let samples = &config.tracking.calibration_samples;
    println!("{}", "Calibration samples:".bold());
    for (i, p) in samples.iter().enumerate() {
        println!("  {:>2}: {}", i, p);
    }
    match compute_calibration(samples) {
        Ok(region) => {
            println!("Region: x {}..{}, y {}..{} ({})", region.x_min, region.x_max, region.y_min, region.y_max, region.extent());
            for variant in [Variant::Typing, Variant::Phrases, Variant::HomeAutomation] {
                println!("  {:?} canvas: {}", variant, config.canvas(variant));
            }
        }
        Err(e) => println!("{}", e.to_string().red()),
    }
}
