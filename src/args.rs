use clap::Parser;

use crate::layout::Variant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera Index (default 0)
    #[arg(short, long, default_value_t = 0)]
    pub cam_index: u32,

    /// Configuration file
    #[arg(long, default_value = "config.json")]
    pub config: String,

    /// Keyboard to run (overrides the configured variant)
    #[arg(short, long, value_enum)]
    pub variant: Option<Variant>,

    /// Capture calibration samples before starting the session
    #[arg(long)]
    pub calibrate: bool,

    /// Drive the keyboard with a synthetic eye instead of the camera
    #[arg(long)]
    pub simulate: bool,

    /// Mirror the camera image
    #[arg(long, default_value_t = false)]
    pub mirror: bool,

    /// List available cameras
    #[arg(long)]
    pub list: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_variant_and_flags() {
        let args = Args::parse_from(["gaze-keys", "--variant", "home-automation", "--simulate"]);
        assert_eq!(args.variant, Some(Variant::HomeAutomation));
        assert!(args.simulate);
        assert_eq!(args.config, "config.json");
        assert_eq!(args.cam_index, 0);
    }
}
