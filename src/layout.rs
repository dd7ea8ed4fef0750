//! Key layouts: labelled rectangles on a render surface, each bound to an action.
//!
//! Every layout variant is plain data handed to the same resolver. The
//! typing keyboard additionally reserves a strip of suggestion slots whose
//! keys are rebuilt from scratch whenever new candidates arrive.

use serde::{Deserialize, Serialize};

use crate::geometry::rescale;
use crate::types::{Extent, Point, Rect};

pub const SUGGESTION_SLOTS: usize = 4;
pub const NEWLINE_LABEL: &str = "##";
pub const DELETE_LABEL: &str = "del";

/// Which keyboard the session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Alphanumeric keyboard that accumulates text.
    Typing,
    /// Caregiver phrase board; each key speaks a fixed sentence.
    Phrases,
    /// Device toggles announced by voice.
    HomeAutomation,
}

/// What committing a key does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Append the key label to the buffer.
    Text,
    Space,
    Delete,
    /// End the current line and speak it.
    Newline,
    /// Complete the word being typed with the key label.
    Suggestion,
    /// Replace the buffer with the label and speak `utterance`.
    Announce { utterance: String },
    /// Empty suggestion slot.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    pub label: String,
    /// Anchor for drawing the label.
    pub center: Point,
    /// Hit-test rectangle.
    pub bounds: Rect,
    pub action: KeyAction,
}

impl KeyDefinition {
    pub fn new(label: impl Into<String>, center: Point, bounds: Rect, action: KeyAction) -> Self {
        Self {
            label: label.into(),
            center,
            bounds,
            action,
        }
    }

    /// Key with an explicit action chosen from its label.
    fn typed(label: &str, center: Point, bounds: Rect) -> Self {
        let action = match label {
            " " => KeyAction::Space,
            DELETE_LABEL => KeyAction::Delete,
            NEWLINE_LABEL => KeyAction::Newline,
            _ => KeyAction::Text,
        };
        Self::new(label, center, bounds, action)
    }

    /// What to say when the key is echoed by voice.
    pub fn spoken(&self) -> String {
        match &self.action {
            KeyAction::Space => "space".to_string(),
            KeyAction::Delete => "delete".to_string(),
            KeyAction::Newline => "new line".to_string(),
            KeyAction::Announce { utterance } => utterance.clone(),
            KeyAction::Disabled => String::new(),
            KeyAction::Text | KeyAction::Suggestion => match self.label.as_str() {
                "." => "dot".to_string(),
                "?" => "question mark".to_string(),
                "!" => "exclamation mark".to_string(),
                "'" => "apostrophe".to_string(),
                other => other.to_string(),
            },
        }
    }
}

/// Rectangle reserved for a runtime-generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlot {
    pub center: Point,
    pub bounds: Rect,
}

/// Ordered keys. Earlier keys win when rectangles overlap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyLayout {
    fixed: Vec<KeyDefinition>,
    slots: Vec<KeySlot>,
    dynamic: Vec<KeyDefinition>,
}

impl KeyLayout {
    pub fn new(fixed: Vec<KeyDefinition>) -> Self {
        Self {
            fixed,
            slots: Vec::new(),
            dynamic: Vec::new(),
        }
    }

    pub fn with_suggestion_slots(mut self, slots: Vec<KeySlot>) -> Self {
        self.slots = slots;
        self.set_suggestions(&[]);
        self
    }

    /// Fixed keys followed by the current dynamic keys.
    pub fn keys(&self) -> impl Iterator<Item = &KeyDefinition> {
        self.fixed.iter().chain(self.dynamic.iter())
    }

    pub fn fixed(&self) -> &[KeyDefinition] {
        &self.fixed
    }

    pub fn dynamic(&self) -> &[KeyDefinition] {
        &self.dynamic
    }

    pub fn has_suggestion_slots(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fixed.len() + self.dynamic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild the dynamic keys from `words`. Slots without a word become
    /// disabled keys; words beyond the slot count are dropped.
    pub fn set_suggestions(&mut self, words: &[String]) {
        self.dynamic = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| match words.get(i) {
                Some(word) if !word.trim().is_empty() => {
                    KeyDefinition::new(word.trim(), slot.center, slot.bounds, KeyAction::Suggestion)
                }
                _ => KeyDefinition::new("", slot.center, slot.bounds, KeyAction::Disabled),
            })
            .collect();
    }

    pub fn clear_suggestions(&mut self) {
        self.set_suggestions(&[]);
    }
}

/// Placement of the typing keyboard on its canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardGeometry {
    pub width: i32,
    pub height: i32,
    pub offset: Point,
}

impl KeyboardGeometry {
    fn box_side(&self) -> i32 {
        self.width / 10
    }

    fn column(&self, i: i32) -> i32 {
        self.offset.x + i * self.width / 10
    }

    fn row(&self, j: i32) -> i32 {
        self.offset.y + j * self.height / 5
    }

    fn square(&self, label: &str, cx: i32, cy: i32) -> KeyDefinition {
        let half = self.box_side() / 2;
        KeyDefinition::typed(
            label,
            Point::new(cx, cy),
            Rect::from_corners(cx - half, cy - half, cx + half, cy + half),
        )
    }
}

/// 10 x 5 keyboard: digits, three staggered letter rows, punctuation, and a
/// bottom row with wide delete and space keys.
pub fn qwerty(geo: &KeyboardGeometry) -> Vec<KeyDefinition> {
    let side = geo.box_side();
    let half = side / 2;
    let mut keys = Vec::with_capacity(44);

    let grid_row = |keys: &mut Vec<KeyDefinition>, labels: &str, row: i32, shift: i32| {
        for (i, c) in labels.chars().enumerate() {
            let label = c.to_string();
            keys.push(geo.square(&label, geo.column(i as i32) + shift, geo.row(row)));
        }
    };

    grid_row(&mut keys, "1234567890", 0, 0);
    grid_row(&mut keys, "QWERTYUIOP", 1, 0);
    grid_row(&mut keys, "ASDFGHJKL", 2, side / 3);
    grid_row(&mut keys, "ZXCVBNM", 3, side * 2 / 3);

    keys.push(geo.square(".", geo.column(8), geo.row(3)));
    keys.push(geo.square("'", geo.column(9), geo.row(3)));

    let bottom = geo.row(4);
    keys.push(KeyDefinition::typed(
        DELETE_LABEL,
        Point::new(geo.column(0), bottom),
        Rect::from_corners(geo.column(0) - half, bottom - half, geo.column(1) + half, bottom + half),
    ));
    keys.push(KeyDefinition::typed(
        " ",
        Point::new(geo.column(4), bottom),
        Rect::from_corners(geo.column(3) - half, bottom - half, geo.column(6) + half, bottom + half),
    ));
    keys.push(geo.square(NEWLINE_LABEL, geo.column(7), bottom));
    keys.push(geo.square("?", geo.column(8), bottom));
    keys.push(geo.square("!", geo.column(9), bottom));
    keys
}

/// Suggestion strip below the keyboard, split into equal slots.
pub fn suggestion_slots(geo: &KeyboardGeometry) -> Vec<KeySlot> {
    let side = geo.box_side();
    let top = geo.row(4) + side / 2 + 20;
    let bottom = top + side * 3 / 2;
    let left = geo.offset.x - side * 2 / 5;
    let slot_width = geo.width * 6 / 25;

    (0..SUGGESTION_SLOTS as i32)
        .map(|i| {
            let x0 = left + i * slot_width;
            KeySlot {
                center: Point::new(x0 + side * 3 / 10, top + side * 7 / 10),
                bounds: Rect::from_corners(x0, top, x0 + slot_width, bottom),
            }
        })
        .collect()
}

/// Typing layout: keyboard plus suggestion strip.
pub fn typing_layout(geo: &KeyboardGeometry) -> KeyLayout {
    KeyLayout::new(qwerty(geo)).with_suggestion_slots(suggestion_slots(geo))
}

/// Board cells designed for a 900 x 600 canvas: (label anchor, bounds).
const BOARD_DESIGN: Extent = Extent::new(900, 600);
const BOARD_CELLS: [((i32, i32), (i32, i32, i32, i32)); 6] = [
    ((130, 190), (5, 5, 300, 300)),
    ((400, 210), (300, 5, 600, 300)),
    ((720, 230), (600, 5, 900, 300)),
    ((130, 490), (5, 300, 300, 600)),
    ((400, 510), (300, 300, 600, 600)),
    ((720, 530), (600, 300, 900, 600)),
];

/// Label/utterance pair for a board key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseEntry {
    pub label: String,
    pub utterance: String,
}

impl PhraseEntry {
    pub fn new(label: &str, utterance: &str) -> Self {
        Self {
            label: label.to_string(),
            utterance: utterance.to_string(),
        }
    }
}

pub fn default_phrases() -> Vec<PhraseEntry> {
    vec![
        PhraseEntry::new("Hungry", "I am hungry"),
        PhraseEntry::new("Water", "I need water"),
        PhraseEntry::new("Emergency", "It's an emergency"),
        PhraseEntry::new("Uncomfortable", "I am feeling uncomfortable"),
        PhraseEntry::new("Help", "I need help"),
        PhraseEntry::new("Medicine", "It's my medicine time"),
    ]
}

pub fn default_home_controls() -> Vec<PhraseEntry> {
    vec![
        PhraseEntry::new("Light On", "Turning the light on"),
        PhraseEntry::new("Door Open", "Opening the door"),
        PhraseEntry::new("Fan On", "Turning the fan on"),
        PhraseEntry::new("Light Off", "Turning the light off"),
        PhraseEntry::new("Door Close", "Closing the door"),
        PhraseEntry::new("Fan Off", "Turning the fan off"),
    ]
}

/// 3 x 2 grid of announce keys scaled onto `canvas`. Entries past six are ignored.
pub fn board_layout(entries: &[PhraseEntry], canvas: Extent) -> KeyLayout {
    let keys = entries
        .iter()
        .zip(BOARD_CELLS.iter())
        .map(|(entry, &((cx, cy), (l, t, r, b)))| {
            let scale = |x, y| rescale(Point::new(x, y), BOARD_DESIGN, canvas);
            KeyDefinition::new(
                entry.label.clone(),
                scale(cx, cy),
                Rect::new(scale(l, t), scale(r, b)),
                KeyAction::Announce {
                    utterance: entry.utterance.clone(),
                },
            )
        })
        .collect();
    KeyLayout::new(keys)
}

/// Caregiver phrase board.
pub fn phrase_board(phrases: &[PhraseEntry], canvas: Extent) -> KeyLayout {
    board_layout(phrases, canvas)
}

/// Device toggles with their default announcements.
pub fn home_automation(canvas: Extent) -> KeyLayout {
    board_layout(&default_home_controls(), canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_contains;

    fn geo() -> KeyboardGeometry {
        KeyboardGeometry {
            width: 1000,
            height: 500,
            offset: Point::new(100, 80),
        }
    }

    fn find<'a>(keys: &'a [KeyDefinition], label: &str) -> &'a KeyDefinition {
        keys.iter().find(|k| k.label == label).unwrap()
    }

    #[test]
    fn qwerty_has_every_key_once() {
        let keys = qwerty(&geo());
        assert_eq!(keys.len(), 10 + 10 + 9 + 7 + 2 + 5);
        let mut labels: Vec<&str> = keys.iter().map(|k| k.label.as_str()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), keys.len());
    }

    #[test]
    fn qwerty_geometry_matches_grid() {
        let keys = qwerty(&geo());
        let one = find(&keys, "1");
        assert_eq!(one.center, Point::new(100, 80));
        assert_eq!(one.bounds, Rect::from_corners(50, 30, 150, 130));

        // Third row is shifted a third of a key.
        assert_eq!(find(&keys, "A").center, Point::new(133, 280));
        assert_eq!(find(&keys, "Z").center, Point::new(166, 380));

        let space = find(&keys, " ");
        assert_eq!(space.action, KeyAction::Space);
        assert_eq!(space.bounds, Rect::from_corners(350, 430, 750, 530));
        assert_eq!(find(&keys, "del").action, KeyAction::Delete);
        assert_eq!(find(&keys, "##").action, KeyAction::Newline);
        assert_eq!(find(&keys, "Q").action, KeyAction::Text);
    }

    #[test]
    fn qwerty_keys_do_not_overlap() {
        let keys = qwerty(&geo());
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert!(
                    !rect_contains(&a.bounds, b.center) && !rect_contains(&b.bounds, a.center),
                    "{:?} overlaps {:?}",
                    a.label,
                    b.label
                );
            }
        }
    }

    #[test]
    fn suggestion_strip_sits_below_the_keyboard() {
        let slots = suggestion_slots(&geo());
        assert_eq!(slots.len(), SUGGESTION_SLOTS);
        assert_eq!(slots[0].bounds, Rect::from_corners(60, 550, 300, 700));
        assert_eq!(slots[0].center, Point::new(90, 620));
        assert_eq!(slots[3].bounds, Rect::from_corners(780, 550, 1020, 700));
    }

    #[test]
    fn suggestions_replace_previous_dynamic_keys() {
        let mut layout = typing_layout(&geo());
        let fixed = layout.fixed().len();
        assert_eq!(layout.dynamic().len(), SUGGESTION_SLOTS);
        assert!(layout.dynamic().iter().all(|k| k.action == KeyAction::Disabled));

        layout.set_suggestions(&["hello".to_string(), "help".to_string()]);
        layout.set_suggestions(&["water".to_string()]);
        assert_eq!(layout.len(), fixed + SUGGESTION_SLOTS);
        assert_eq!(layout.dynamic()[0].label, "water");
        assert_eq!(layout.dynamic()[0].action, KeyAction::Suggestion);
        assert_eq!(layout.dynamic()[1].action, KeyAction::Disabled);

        let too_many: Vec<String> = (0..9).map(|i| format!("w{}", i)).collect();
        layout.set_suggestions(&too_many);
        assert_eq!(layout.dynamic().len(), SUGGESTION_SLOTS);
        assert_eq!(layout.keys().last().unwrap().label, "w3");
    }

    #[test]
    fn board_matches_design_canvas() {
        let layout = phrase_board(&default_phrases(), Extent::new(900, 600));
        let keys = layout.fixed();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[0].bounds, Rect::from_corners(5, 5, 300, 300));
        assert_eq!(keys[5].bounds, Rect::from_corners(600, 300, 900, 600));
        assert_eq!(
            keys[1].action,
            KeyAction::Announce { utterance: "I need water".to_string() }
        );
    }

    #[test]
    fn board_scales_to_other_canvases() {
        let layout = home_automation(Extent::new(1800, 1200));
        assert_eq!(layout.fixed()[4].bounds, Rect::from_corners(600, 600, 1200, 1200));
    }

    #[test]
    fn punctuation_has_spoken_names() {
        let keys = qwerty(&geo());
        assert_eq!(find(&keys, ".").spoken(), "dot");
        assert_eq!(find(&keys, "?").spoken(), "question mark");
        assert_eq!(find(&keys, " ").spoken(), "space");
        assert_eq!(find(&keys, "K").spoken(), "K");
    }
}
