pub mod app;
pub mod args;
pub mod blink;
pub mod calibration;
pub mod camera;
pub mod config;
pub mod detector;
pub mod error;
pub mod font;
pub mod geometry;
pub mod landmarks;
pub mod layout;
pub mod mesh;
pub mod output;
pub mod pipeline;
pub mod projection;
pub mod render;
pub mod resolver;
pub mod session;
pub mod suggest;
pub mod ttf;
pub mod types;
pub mod voice;
