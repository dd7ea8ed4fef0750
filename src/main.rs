use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gaze_keys::app::{App, Outcome};
use gaze_keys::args::Args;
use gaze_keys::camera::list_cameras;
use gaze_keys::config::AppConfig;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.list {
        return list_cameras();
    }

    let config = AppConfig::load_from(&args.config)?;
    let variant = args.variant.unwrap_or(config.session.variant);

    // Configuration errors abort here, before any device is opened
    let configured = if args.calibrate {
        None
    } else {
        Some(config.validate(variant).context("Invalid configuration")?)
    };

    let mut app = App::new(&args, config)?;
    let region = match configured {
        Some(region) => region,
        None => match app.calibrate()? {
            Outcome::Calibrated(region) => region,
            Outcome::Quit => return Ok(()),
        },
    };

    info!("Calibrated region {:?}", region);
    app.run(region)?;
    info!("Session ended");
    Ok(())
}
