//! Draws the key canvas, gaze marker, typed text and status line into one RGB frame.

use image::{imageops, Rgb, RgbImage};

use crate::calibration::CalibrationRegion;
use crate::font;
use crate::layout::{KeyAction, KeyDefinition, KeyLayout};
use crate::session::{FrameReport, FrameStatus};
use crate::ttf::FontRenderer;
use crate::types::{Extent, Point, Rect};

pub const PANEL_HEIGHT: u32 = 220;
const PREVIEW_WIDTH: u32 = 260;

const BACKGROUND: Rgb<u8> = Rgb([24, 24, 28]);
const PANEL: Rgb<u8> = Rgb([240, 240, 240]);
const KEY_EDGE: Rgb<u8> = Rgb([200, 200, 200]);
const KEY_HOVER: Rgb<u8> = Rgb([60, 90, 140]);
const KEY_DISABLED: Rgb<u8> = Rgb([90, 90, 90]);
const PUPIL: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL: (u8, u8, u8) = (255, 255, 255);
const INK: (u8, u8, u8) = (0, 0, 0);
const ALERT: (u8, u8, u8) = (200, 30, 30);

pub struct Renderer {
    font: Option<FontRenderer>,
    font_size: f32,
    bitmap_scale: usize,
}

impl Renderer {
    pub fn new(font: Option<FontRenderer>, font_size: f32, bitmap_scale: usize) -> Self {
        Self {
            font,
            font_size,
            bitmap_scale: bitmap_scale.max(1),
        }
    }

    /// Bitmap-only renderer, no font lookup.
    pub fn bitmap(scale: usize) -> Self {
        Self::new(None, 0.0, scale)
    }

    fn line_height(&self) -> u32 {
        match &self.font {
            Some(f) => f.measure_height(self.font_size) as u32,
            None => (font::GLYPH_HEIGHT * self.bitmap_scale + 2 * self.bitmap_scale) as u32,
        }
    }

    fn text_width(&self, text: &str) -> u32 {
        match &self.font {
            Some(f) => f.measure_width(text, self.font_size) as u32,
            None => font::measure_text_width(text, self.bitmap_scale) as u32,
        }
    }

    fn text(&self, img: &mut RgbImage, x: i32, y: i32, text: &str, color: (u8, u8, u8)) {
        if x < 0 || y < 0 {
            return;
        }
        let (w, h) = (img.width() as usize, img.height() as usize);
        let buf: &mut [u8] = img;
        match &self.font {
            Some(f) => f.draw_text(buf, w, h, x as usize, y as usize, text, color, self.font_size),
            None => font::draw_text_line(buf, w, h, x as usize, y as usize, text, color, self.bitmap_scale),
        }
    }

    /// Full frame: key canvas on top, text panel below.
    pub fn compose(
        &self,
        canvas: Extent,
        layout: &KeyLayout,
        report: &FrameReport,
        text: &str,
        preview: Option<(&RgbImage, &CalibrationRegion)>,
    ) -> RgbImage {
        let width = canvas.width.max(1) as u32;
        let height = canvas.height.max(1) as u32;
        let mut img = RgbImage::from_pixel(width, height + PANEL_HEIGHT, BACKGROUND);

        self.draw_layout(&mut img, layout, report.hovered.as_ref());
        if let Some(p) = report.keyboard_point() {
            stroke_circle(&mut img, p, 20, PUPIL);
        }

        let panel = Rect::from_corners(0, height as i32, width as i32, (height + PANEL_HEIGHT) as i32);
        fill_rect(&mut img, &panel, PANEL);
        self.draw_text_panel(&mut img, panel, text);
        self.draw_status(&mut img, panel, report.status);

        if let Some((frame, region)) = preview {
            draw_preview(&mut img, panel, frame, region, report);
        }
        img
    }

    /// One line of text in the panel under `canvas`.
    pub fn caption(&self, img: &mut RgbImage, canvas: Extent, text: &str) {
        let x = (canvas.width - self.text_width(text) as i32) / 2;
        let y = canvas.height + (PANEL_HEIGHT as i32 - self.line_height() as i32) / 2;
        self.text(img, x.max(0), y, text, LABEL);
    }

    pub fn draw_layout(&self, img: &mut RgbImage, layout: &KeyLayout, hovered: Option<&KeyDefinition>) {
        for key in layout.keys() {
            let is_hovered = hovered.is_some_and(|h| h.bounds == key.bounds && h.label == key.label);
            if is_hovered {
                fill_rect(img, &key.bounds, KEY_HOVER);
            }
            let edge = if key.action == KeyAction::Disabled { KEY_DISABLED } else { KEY_EDGE };
            stroke_rect(img, &key.bounds, edge);

            if key.label.is_empty() {
                continue;
            }
            // Spaces render as an underscore so the key is not blank
            let label = if key.action == KeyAction::Space { "_" } else { key.label.as_str() };
            let tw = self.text_width(label) as i32;
            let th = self.line_height() as i32;
            let (x, y) = match key.action {
                // Board and suggestion labels start at their anchor
                KeyAction::Announce { .. } | KeyAction::Suggestion => (key.center.x, key.center.y - th / 2),
                _ => (key.center.x - tw / 2, key.center.y - th / 2),
            };
            self.text(img, x, y, label, LABEL);
        }
    }

    fn draw_text_panel(&self, img: &mut RgbImage, panel: Rect, text: &str) {
        let lh = self.line_height() as i32 + 6;
        let max_lines = ((panel.height() - 40) / lh).max(1) as usize;
        let lines: Vec<&str> = text.split('\n').collect();
        let start = lines.len().saturating_sub(max_lines);
        for (i, line) in lines[start..].iter().enumerate() {
            let y = panel.top_left.y + 10 + i as i32 * lh;
            self.text(img, 10, y, line, INK);
        }
    }

    fn draw_status(&self, img: &mut RgbImage, panel: Rect, status: FrameStatus) {
        let (msg, color) = match status {
            FrameStatus::Tracking => return,
            FrameStatus::Cooldown => ("...", INK),
            FrameStatus::NoFace => ("NO FACE", ALERT),
            FrameStatus::MultipleFaces(_) => ("ONE FACE ONLY", ALERT),
            FrameStatus::OutOfBounds => ("LOOK AT THE KEYS", ALERT),
        };
        let y = panel.bottom_right.y - self.line_height() as i32 - 8;
        self.text(img, 10, y, msg, color);
    }
}

/// Camera crop around the calibrated region, with the pupil marked, in the
/// panel's right corner.
fn draw_preview(img: &mut RgbImage, panel: Rect, frame: &RgbImage, region: &CalibrationRegion, report: &FrameReport) {
    let extent = region.extent();
    if extent.is_degenerate() {
        return;
    }
    let margin = extent.width.max(extent.height) / 2;
    let x0 = (region.x_min - margin).max(0) as u32;
    let y0 = (region.y_min - margin).max(0) as u32;
    let x1 = ((region.x_max + margin) as u32).min(frame.width());
    let y1 = ((region.y_max + margin) as u32).min(frame.height());
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    let mut crop = imageops::crop_imm(frame, x0, y0, x1 - x0, y1 - y0).to_image();
    let offset = Point::new(x0 as i32, y0 as i32);
    let local = |p: Point| Point::new(p.x - offset.x, p.y - offset.y);
    stroke_rect(
        &mut crop,
        &Rect::new(local(Point::new(region.x_min, region.y_min)), local(Point::new(region.x_max, region.y_max))),
        KEY_HOVER,
    );
    if let Some(gaze) = &report.gaze {
        stroke_circle(&mut crop, local(gaze.pupil), 3, PUPIL);
    }

    let target_h = (panel.height() as u32).saturating_sub(20).max(1);
    let target_w = (crop.width() * target_h / crop.height().max(1)).clamp(1, PREVIEW_WIDTH);
    let thumb = imageops::resize(&crop, target_w, target_h, imageops::FilterType::Triangle);
    let px = (panel.bottom_right.x as i64 - target_w as i64 - 10).max(0);
    let py = panel.top_left.y as i64 + 10;
    imageops::overlay(img, &thumb, px, py);
}

fn put(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

pub fn fill_rect(img: &mut RgbImage, rect: &Rect, color: Rgb<u8>) {
    for y in rect.top_left.y..rect.bottom_right.y {
        for x in rect.top_left.x..rect.bottom_right.x {
            put(img, x, y, color);
        }
    }
}

pub fn stroke_rect(img: &mut RgbImage, rect: &Rect, color: Rgb<u8>) {
    let (l, t) = (rect.top_left.x, rect.top_left.y);
    let (r, b) = (rect.bottom_right.x - 1, rect.bottom_right.y - 1);
    for x in l..=r {
        put(img, x, t, color);
        put(img, x, b, color);
    }
    for y in t..=b {
        put(img, l, y, color);
        put(img, r, y, color);
    }
}

/// Two-pixel ring.
pub fn stroke_circle(img: &mut RgbImage, center: Point, radius: i32, color: Rgb<u8>) {
    let outer = radius * radius;
    let inner = (radius - 2).max(0).pow(2);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d = dx * dx + dy * dy;
            if d <= outer && d >= inner {
                put(img, center.x + dx, center.y + dy, color);
            }
        }
    }
}
