//! Per-frame loop state: blink edge, cooldown, text buffer and key effects.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::blink::RisingEdge;
use crate::error::GazeError;
use crate::landmarks::FaceLandmarks;
use crate::layout::{KeyAction, KeyDefinition, KeyLayout};
use crate::pipeline::{GazeMapper, GazeSample};
use crate::resolver::resolve_key;
use crate::suggest::SuggestionSource;
use crate::types::Point;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Commit lockout after a blink inside the cut region.
    pub cooldown: Duration,
    /// Buffer length (in chars) at which suggestions are requested.
    pub suggestion_min_len: usize,
    /// Speak the name of every typed key.
    pub echo_keys: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(100),
            suggestion_min_len: 3,
            echo_keys: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debounce {
    Idle,
    Cooldown { until: Instant },
}

/// Everything a committed key can change.
#[derive(Debug, Clone)]
struct SessionState {
    text: String,
    layout: KeyLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Tracking,
    NoFace,
    MultipleFaces(usize),
    OutOfBounds,
    Cooldown,
}

/// Result of one frame, for rendering and voice dispatch.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub status: FrameStatus,
    pub gaze: Option<GazeSample>,
    pub hovered: Option<KeyDefinition>,
    pub committed: Option<KeyDefinition>,
    /// Sentence to hand to the voice queue.
    pub utterance: Option<String>,
}

impl FrameReport {
    fn skipped(status: FrameStatus) -> Self {
        Self {
            status,
            gaze: None,
            hovered: None,
            committed: None,
            utterance: None,
        }
    }

    pub fn keyboard_point(&self) -> Option<Point> {
        self.gaze.and_then(|g| g.keyboard_point)
    }
}

pub struct Session {
    mapper: GazeMapper,
    settings: SessionSettings,
    state: SessionState,
    debounce: Debounce,
    edge: RisingEdge,
    suggester: Option<Box<dyn SuggestionSource>>,
}

impl Session {
    pub fn new(mapper: GazeMapper, layout: KeyLayout, settings: SessionSettings) -> Self {
        Self {
            mapper,
            settings,
            state: SessionState {
                text: String::new(),
                layout,
            },
            debounce: Debounce::Idle,
            edge: RisingEdge::new(),
            suggester: None,
        }
    }

    pub fn with_suggester(mut self, suggester: Box<dyn SuggestionSource>) -> Self {
        self.suggester = Some(suggester);
        self
    }

    /// Seed the suggestion strip before anything is typed.
    pub fn with_initial_suggestions(mut self, words: &[String]) -> Self {
        self.state.layout.set_suggestions(words);
        self
    }

    pub fn text(&self) -> &str {
        &self.state.text
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.state.layout
    }

    pub fn mapper(&self) -> &GazeMapper {
        &self.mapper
    }

    pub fn debounce(&self) -> Debounce {
        self.debounce
    }

    /// Advance one frame with the faces found in it.
    pub fn step(&mut self, faces: &[FaceLandmarks], now: Instant) -> FrameReport {
        if let Debounce::Cooldown { until } = self.debounce {
            if now >= until {
                self.debounce = Debounce::Idle;
            }
        }

        let sample = match self.mapper.locate(faces) {
            Ok(sample) => sample,
            Err(e) => {
                // Blink edge keeps its last level across skipped frames
                debug!("Skipping frame: {}", e);
                return FrameReport::skipped(match e {
                    GazeError::MultiFace(n) => FrameStatus::MultipleFaces(n),
                    _ => FrameStatus::NoFace,
                });
            }
        };

        let blink_edge = self.edge.update(sample.blinking);
        let hovered = sample
            .keyboard_point
            .and_then(|p| resolve_key(&self.state.layout, p))
            .cloned();

        let mut report = FrameReport {
            status: FrameStatus::Tracking,
            gaze: Some(sample),
            hovered: hovered.clone(),
            committed: None,
            utterance: None,
        };

        let point = match sample.require_keyboard_point() {
            Ok(p) => p,
            Err(e) => {
                if blink_edge {
                    debug!("Blink ignored: {}", e);
                }
                report.status = FrameStatus::OutOfBounds;
                return report;
            }
        };

        if matches!(self.debounce, Debounce::Cooldown { .. }) {
            report.status = FrameStatus::Cooldown;
            return report;
        }
        if !blink_edge {
            return report;
        }

        self.debounce = Debounce::Cooldown {
            until: now + self.settings.cooldown,
        };
        report.status = FrameStatus::Cooldown;

        match hovered {
            Some(key) if key.action != KeyAction::Disabled => {
                info!("Committed {:?} at {}", key.label, point);
                report.utterance = self.apply(&key);
                report.committed = Some(key);
            }
            _ => debug!("Blink at {} hit no key", point),
        }
        report
    }

    /// Apply a committed key to the buffer and layout. Returns what to say.
    fn apply(&mut self, key: &KeyDefinition) -> Option<String> {
        let echo = self.settings.echo_keys.then(|| key.spoken());
        match &key.action {
            KeyAction::Text | KeyAction::Suggestion => {
                self.state.text.push_str(&key.label);
                self.refresh_suggestions();
                echo
            }
            KeyAction::Space => {
                self.state.text.push(' ');
                echo
            }
            KeyAction::Delete => {
                self.state.text.pop();
                echo
            }
            KeyAction::Newline => {
                let segment = current_segment(&self.state.text).trim().to_string();
                self.state.text.push('\n');
                (!segment.is_empty()).then_some(segment)
            }
            KeyAction::Announce { utterance } => {
                self.state.text = key.label.clone();
                Some(utterance.clone())
            }
            KeyAction::Disabled => None,
        }
    }

    fn refresh_suggestions(&mut self) {
        if !self.state.layout.has_suggestion_slots()
            || self.state.text.chars().count() < self.settings.suggestion_min_len
        {
            return;
        }
        let Some(suggester) = self.suggester.as_mut() else {
            return;
        };
        match suggester.suggest(&self.state.text) {
            Ok(words) => {
                debug!("Suggestions for {:?}: {:?}", self.state.text, words);
                self.state.layout.set_suggestions(&words);
            }
            Err(e) => {
                warn!("{}", e);
                self.state.layout.clear_suggestions();
            }
        }
    }
}

/// Text after the last newline.
pub fn current_segment(text: &str) -> &str {
    text.rsplit('\n').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blink::BlinkDetector;
    use crate::calibration::CalibrationRegion;
    use crate::landmarks::{synthetic_face, EyeSide};
    use crate::layout::{default_phrases, phrase_board, typing_layout, KeyboardGeometry, KeySlot};
    use crate::suggest::Vocabulary;
    use crate::types::{Extent, Rect};

    // Region (10..90, 10..90) projected 1:1 onto an 80x80 canvas after the offset.
    fn mapper(canvas: Extent) -> GazeMapper {
        let region = CalibrationRegion { x_min: 10, x_max: 90, y_min: 10, y_max: 90 };
        GazeMapper::new(region, canvas, BlinkDetector::default(), EyeSide::Right).unwrap()
    }

    fn text_key(label: &str, l: i32, t: i32, r: i32, b: i32) -> KeyDefinition {
        let bounds = Rect::from_corners(l, t, r, b);
        KeyDefinition::new(label, bounds.center(), bounds, KeyAction::Text)
    }

    fn action_key(label: &str, action: KeyAction, l: i32, t: i32, r: i32, b: i32) -> KeyDefinition {
        let bounds = Rect::from_corners(l, t, r, b);
        KeyDefinition::new(label, bounds.center(), bounds, action)
    }

    /// Open then closed eye at `frame_point`, both at time `t`.
    fn blink_at(session: &mut Session, frame_point: Point, t: Instant) -> FrameReport {
        session.step(&[synthetic_face(frame_point, false)], t);
        session.step(&[synthetic_face(frame_point, true)], t)
    }

    #[test]
    fn single_blink_commits_once_and_cooldown_blocks_the_next() {
        let layout = KeyLayout::new(vec![text_key("A", 0, 0, 100, 100)]);
        let mut session = Session::new(mapper(Extent::new(80, 80)), layout, SessionSettings::default());
        let t0 = Instant::now();

        let r = blink_at(&mut session, Point::new(50, 50), t0);
        assert_eq!(r.committed.map(|k| k.label), Some("A".to_string()));
        assert_eq!(session.text(), "A");

        // Held closed: no new edge.
        session.step(&[synthetic_face(Point::new(50, 50), true)], t0 + Duration::from_millis(20));
        // A fresh blink inside the cooldown window.
        let r = blink_at(&mut session, Point::new(50, 50), t0 + Duration::from_millis(50));
        assert!(r.committed.is_none());
        assert_eq!(r.status, FrameStatus::Cooldown);
        assert_eq!(session.text(), "A");

        let r = blink_at(&mut session, Point::new(50, 50), t0 + Duration::from_millis(150));
        assert!(r.committed.is_some());
        assert_eq!(session.text(), "AA");
    }

    #[test]
    fn blink_outside_region_commits_nothing() {
        let layout = KeyLayout::new(vec![text_key("A", 0, 0, 100, 100)]);
        let mut session = Session::new(mapper(Extent::new(80, 80)), layout, SessionSettings::default());
        let r = blink_at(&mut session, Point::new(10, 50), Instant::now());
        assert_eq!(r.status, FrameStatus::OutOfBounds);
        assert!(r.committed.is_none());
        assert_eq!(session.debounce(), Debounce::Idle);
    }

    #[test]
    fn blink_on_empty_canvas_area_still_starts_cooldown() {
        let layout = KeyLayout::new(vec![text_key("A", 0, 0, 10, 10)]);
        let mut session = Session::new(mapper(Extent::new(80, 80)), layout, SessionSettings::default());
        let r = blink_at(&mut session, Point::new(50, 50), Instant::now());
        assert!(r.committed.is_none());
        assert!(matches!(session.debounce(), Debounce::Cooldown { .. }));
    }

    #[test]
    fn face_errors_are_reported_and_skipped() {
        let layout = KeyLayout::new(vec![text_key("A", 0, 0, 100, 100)]);
        let mut session = Session::new(mapper(Extent::new(80, 80)), layout, SessionSettings::default());
        let t = Instant::now();
        assert_eq!(session.step(&[], t).status, FrameStatus::NoFace);
        let two = [synthetic_face(Point::new(50, 50), true), synthetic_face(Point::new(40, 40), true)];
        assert_eq!(session.step(&two, t).status, FrameStatus::MultipleFaces(2));
        assert_eq!(session.text(), "");

        // The loop keeps going once one face is back.
        let r = blink_at(&mut session, Point::new(50, 50), t);
        assert!(r.committed.is_some());
    }

    #[test]
    fn blink_held_while_the_face_drops_out_commits_once() {
        let layout = KeyLayout::new(vec![text_key("A", 0, 0, 100, 100)]);
        let mut session = Session::new(mapper(Extent::new(80, 80)), layout, SessionSettings::default());
        let eye = Point::new(50, 50);
        let t0 = Instant::now();

        blink_at(&mut session, eye, t0);
        assert_eq!(session.text(), "A");

        for n in 1..=4 {
            let r = session.step(&[], t0 + Duration::from_millis(33 * n));
            assert_eq!(r.status, FrameStatus::NoFace);
        }
        // Past the cooldown, same eye still closed.
        let r = session.step(&[synthetic_face(eye, true)], t0 + Duration::from_millis(170));
        assert!(r.committed.is_none());
        assert_eq!(session.text(), "A");

        let r = blink_at(&mut session, eye, t0 + Duration::from_millis(300));
        assert!(r.committed.is_some());
        assert_eq!(session.text(), "AA");
    }

    #[test]
    fn space_delete_and_newline_effects() {
        let keys = vec![
            text_key("H", 0, 0, 20, 20),
            text_key("I", 20, 0, 40, 20),
            action_key(" ", KeyAction::Space, 40, 0, 60, 20),
            action_key("del", KeyAction::Delete, 60, 0, 80, 20),
            action_key("##", KeyAction::Newline, 0, 40, 80, 80),
        ];
        let mut session = Session::new(mapper(Extent::new(80, 80)), KeyLayout::new(keys), SessionSettings::default());
        let mut t = Instant::now();
        let mut press = |session: &mut Session, canvas_x: i32, canvas_y: i32| {
            t += Duration::from_secs(1);
            blink_at(session, Point::new(10 + canvas_x, 10 + canvas_y), t)
        };

        press(&mut session, 10, 10);
        press(&mut session, 30, 10);
        press(&mut session, 50, 10);
        assert_eq!(session.text(), "HI ");
        press(&mut session, 70, 10);
        assert_eq!(session.text(), "HI");

        let r = press(&mut session, 40, 60);
        assert_eq!(r.utterance.as_deref(), Some("HI"));
        assert_eq!(session.text(), "HI\n");

        press(&mut session, 30, 10);
        let r = press(&mut session, 40, 60);
        assert_eq!(r.utterance.as_deref(), Some("I"));
        assert_eq!(session.text(), "HI\nI\n");

        // Empty segment says nothing.
        let r = press(&mut session, 40, 60);
        assert_eq!(r.utterance, None);
    }

    #[test]
    fn typing_requests_and_applies_suggestions() {
        let geo = KeyboardGeometry { width: 1000, height: 500, offset: Point::new(100, 80) };
        let layout = typing_layout(&geo);
        let mapper = GazeMapper::new(
            CalibrationRegion { x_min: 0, x_max: 1300, y_min: 0, y_max: 1000 },
            Extent::new(1300, 1000),
            BlinkDetector::default(),
            EyeSide::Right,
        )
        .unwrap();
        let mut session = Session::new(mapper, layout, SessionSettings::default())
            .with_suggester(Box::new(Vocabulary::new(["water", "wait", "want", "hello"])));

        let centers: Vec<(String, Point)> =
            session.layout().fixed().iter().map(|k| (k.label.clone(), k.center)).collect();
        let at = |label: &str| centers.iter().find(|(l, _)| l == label).map(|(_, c)| *c).unwrap();

        let mut t = Instant::now();
        for label in ["W", "A"] {
            t += Duration::from_secs(1);
            blink_at(&mut session, at(label), t);
        }
        assert_eq!(session.text(), "WA");
        assert!(session.layout().dynamic().iter().all(|k| k.action == KeyAction::Disabled));

        t += Duration::from_secs(1);
        blink_at(&mut session, at("I"), t);
        assert_eq!(session.text(), "WAI");
        let words: Vec<&str> = session.layout().dynamic().iter().map(|k| k.label.as_str()).collect();
        assert_eq!(words, vec!["wait", "", "", ""]);

        let slot = session.layout().dynamic()[0].bounds.center();
        t += Duration::from_secs(1);
        let r = blink_at(&mut session, slot, t);
        assert_eq!(r.committed.unwrap().action, KeyAction::Suggestion);
        assert_eq!(session.text(), "WAIwait");
        // The strip is refreshed for the new buffer; nothing completes "WAIwait".
        assert!(session.layout().dynamic().iter().all(|k| k.action == KeyAction::Disabled));
    }

    struct Offline;

    impl SuggestionSource for Offline {
        fn suggest(&mut self, _partial: &str) -> Result<Vec<String>, GazeError> {
            Err(GazeError::SuggestionUnavailable("offline".to_string()))
        }
    }

    #[test]
    fn failing_suggester_clears_dynamic_keys() {
        let slot = KeySlot { center: Point::new(10, 70), bounds: Rect::from_corners(0, 60, 80, 80) };
        let layout = KeyLayout::new(vec![text_key("A", 0, 0, 80, 40)]).with_suggestion_slots(vec![slot]);
        let mut session = Session::new(mapper(Extent::new(80, 80)), layout, SessionSettings { suggestion_min_len: 1, ..Default::default() })
            .with_suggester(Box::new(Offline))
            .with_initial_suggestions(&["hi".to_string()]);
        assert_eq!(session.layout().dynamic()[0].label, "hi");

        blink_at(&mut session, Point::new(30, 30), Instant::now());
        assert_eq!(session.text(), "A");
        assert_eq!(session.layout().dynamic()[0].action, KeyAction::Disabled);
    }

    #[test]
    fn phrase_board_replaces_buffer_and_speaks() {
        let canvas = Extent::new(900, 600);
        let layout = phrase_board(&default_phrases(), canvas);
        let mapper = GazeMapper::new(
            CalibrationRegion { x_min: 0, x_max: 900, y_min: 0, y_max: 600 },
            canvas,
            BlinkDetector::default(),
            EyeSide::Right,
        )
        .unwrap();
        let settings = SessionSettings { cooldown: Duration::from_millis(300), ..Default::default() };
        let mut session = Session::new(mapper, layout, settings);
        let t = Instant::now();

        let r = blink_at(&mut session, Point::new(450, 150), t);
        assert_eq!(r.utterance.as_deref(), Some("I need water"));
        assert_eq!(session.text(), "Water");

        let r = blink_at(&mut session, Point::new(450, 450), t + Duration::from_millis(400));
        assert_eq!(r.utterance.as_deref(), Some("I need help"));
        assert_eq!(session.text(), "Help");
    }

    #[test]
    fn echo_speaks_key_names() {
        let layout = KeyLayout::new(vec![text_key("?", 0, 0, 100, 100)]);
        let settings = SessionSettings { echo_keys: true, ..Default::default() };
        let mut session = Session::new(mapper(Extent::new(80, 80)), layout, settings);
        let r = blink_at(&mut session, Point::new(50, 50), Instant::now());
        assert_eq!(r.utterance.as_deref(), Some("question mark"));
    }

    #[test]
    fn segment_is_text_after_last_newline() {
        assert_eq!(current_segment("one\ntwo"), "two");
        assert_eq!(current_segment("one\n"), "");
        assert_eq!(current_segment("solo"), "solo");
    }
}
