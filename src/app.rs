//! Owns the camera, landmark models, window and voice worker for one run.
//!
//! Everything is acquired in [`App::new`] and released when the `App` is
//! dropped, so every exit path (quit key, closed window, `?` on an error)
//! stops the camera stream and joins the voice thread.

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use std::time::Instant;
use tracing::{info, warn};

use crate::args::Args;
use crate::blink::BlinkDetector;
use crate::calibration::{CalibrationCapture, CalibrationRegion, CaptureInput, CaptureProgress};
use crate::camera::CameraSource;
use crate::config::AppConfig;
use crate::landmarks::{detect_or_skip, pupil, LandmarkSource, OnnxLandmarkSource, SimulatedLandmarks};
use crate::layout::Variant;
use crate::output::WindowOutput;
use crate::pipeline::GazeMapper;
use crate::render::{stroke_circle, Renderer, PANEL_HEIGHT};
use crate::session::Session;
use crate::suggest::Vocabulary;
use crate::ttf::FontRenderer;
use crate::voice::{CommandSpeaker, LogSpeaker, Speaker, VoiceQueue};

const SIM_FRAME: (u32, u32) = (640, 480);

enum FrameSource {
    Camera(CameraSource),
    Blank(RgbImage),
}

impl FrameSource {
    fn next(&mut self) -> Result<RgbImage> {
        match self {
            FrameSource::Camera(cam) => cam.capture(),
            FrameSource::Blank(img) => Ok(img.clone()),
        }
    }
}

pub enum Outcome {
    Quit,
    Calibrated(CalibrationRegion),
}

pub struct App {
    config: AppConfig,
    config_path: String,
    variant: Variant,
    frames: FrameSource,
    landmarks: Box<dyn LandmarkSource>,
    window: WindowOutput,
    voice: VoiceQueue,
    renderer: Renderer,
}

impl App {
    pub fn new(args: &Args, config: AppConfig) -> Result<Self> {
        let variant = args.variant.unwrap_or(config.session.variant);
        let canvas = config.canvas(variant);

        let (frames, landmarks): (FrameSource, Box<dyn LandmarkSource>) = if args.simulate {
            // Simulated eye stays inside the configured region, even if it is degenerate
            let region = config.validate(variant).unwrap_or(CalibrationRegion {
                x_min: 229,
                x_max: 373,
                y_min: 305,
                y_max: 379,
            });
            let blank = RgbImage::from_pixel(SIM_FRAME.0, SIM_FRAME.1, Rgb([0, 0, 0]));
            (FrameSource::Blank(blank), Box::new(SimulatedLandmarks::new(region)))
        } else {
            let camera = CameraSource::new(args.cam_index, args.mirror || config.tracking.mirror)?;
            let source = OnnxLandmarkSource::new(
                &config.models.face_detection,
                &config.models.face_mesh,
                config.tracking.detector_score,
            )
            .context("Failed to load landmark models")?;
            (FrameSource::Camera(camera), Box::new(source))
        };
        info!("Landmark source: {}", landmarks.name());

        let speaker: Box<dyn Speaker> = if config.voice.enabled && !args.simulate {
            Box::new(CommandSpeaker::new(config.voice.command.clone(), config.voice.args.clone()))
        } else {
            Box::new(LogSpeaker)
        };

        let renderer = Renderer::new(
            FontRenderer::try_load(&config.ui.font_family),
            config.ui.font_size_pt as f32,
            config.ui.bitmap_scale as usize,
        );

        let window = WindowOutput::new(
            "Gaze Keys - Esc to quit",
            canvas.width.max(1) as usize,
            canvas.height.max(1) as usize + PANEL_HEIGHT as usize,
        )?;

        Ok(Self {
            config,
            config_path: args.config.clone(),
            variant,
            frames,
            landmarks,
            window,
            voice: VoiceQueue::spawn(speaker),
            renderer,
        })
    }

    /// Blink at each keyboard corner; stores the samples in the config file.
    pub fn calibrate(&mut self) -> Result<Outcome> {
        let geo = self.config.keyboard_geometry();
        let targets = CalibrationCapture::keyboard_corners(geo.offset, geo.width, geo.height);
        let mut capture = CalibrationCapture::new(targets, self.config.settle_delay());
        let blink = BlinkDetector::new(self.config.tracking.blink_ratio);
        let side = self.config.tracking.eye;
        let canvas = self.config.canvas(Variant::Typing);
        info!("Calibration started: blink while looking at each circle");

        while self.window.is_open() {
            if self.window.quit_requested() {
                return Ok(Outcome::Quit);
            }
            let frame = self.frames.next()?;
            let faces = detect_or_skip(self.landmarks.as_mut(), &frame);
            let input = match faces.as_slice() {
                [face] => face.eye(side).map(|eye| CaptureInput {
                    pupil: pupil(&eye),
                    blinking: blink.is_blinking(&eye),
                }),
                _ => None,
            };

            let progress = capture.observe(input, Instant::now())?;
            if let CaptureProgress::Complete(region) = progress {
                info!("Calibration complete: {:?}", region);
                self.config.tracking.calibration_samples = capture.samples().to_vec();
                self.config
                    .save_to(&self.config_path)
                    .with_context(|| format!("Failed to save calibration to {}", self.config_path))?;
                return Ok(Outcome::Calibrated(region));
            }

            let mut img = RgbImage::from_pixel(
                canvas.width.max(1) as u32,
                canvas.height.max(1) as u32 + PANEL_HEIGHT,
                Rgb([24, 24, 28]),
            );
            if let Some(target) = capture.current_target() {
                stroke_circle(&mut img, target, 20, Rgb([255, 60, 60]));
            }
            let done = capture.samples().len();
            let total = capture.targets().len();
            let status = match progress {
                CaptureProgress::Settling => "HOLD ON".to_string(),
                _ if input.is_none() => "NO FACE".to_string(),
                _ => format!("BLINK AT THE CIRCLE {}/{}", done + 1, total),
            };
            self.renderer.caption(&mut img, canvas, &status);
            self.window.show(&img)?;
        }
        Ok(Outcome::Quit)
    }

    /// Per-frame session loop until Escape/Q or the window closes.
    pub fn run(&mut self, region: CalibrationRegion) -> Result<()> {
        let canvas = self.config.canvas(self.variant);
        let mapper = GazeMapper::new(
            region,
            canvas,
            BlinkDetector::new(self.config.tracking.blink_ratio),
            self.config.tracking.eye,
        )?;
        let mut session = Session::new(
            mapper,
            self.config.layout(self.variant),
            self.config.session_settings(self.variant),
        );
        if self.variant == Variant::Typing {
            session = session
                .with_suggester(Box::new(self.vocabulary()))
                .with_initial_suggestions(&self.config.session.initial_suggestions);
        }
        info!("Running {:?} keyboard on a {} canvas", self.variant, canvas);

        while self.window.is_open() {
            if self.window.quit_requested() {
                info!("Quit requested");
                break;
            }
            let frame = self.frames.next()?;
            let faces = detect_or_skip(self.landmarks.as_mut(), &frame);
            let report = session.step(&faces, Instant::now());

            if let Some(text) = &report.utterance {
                if !self.voice.request(text) {
                    info!("Voice busy, skipped {:?}", text);
                }
            }

            let preview = self
                .config
                .ui
                .show_camera
                .then_some((&frame, session.mapper().region()));
            let img = self
                .renderer
                .compose(canvas, session.layout(), &report, session.text(), preview);
            self.window.show(&img)?;
        }
        Ok(())
    }

    fn vocabulary(&self) -> Vocabulary {
        match &self.config.session.word_list {
            Some(path) => Vocabulary::from_file(path).unwrap_or_else(|e| {
                warn!("{:#}. Using the built-in word list.", e);
                Vocabulary::default()
            }),
            None => Vocabulary::default(),
        }
    }
}
