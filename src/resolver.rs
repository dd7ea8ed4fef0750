use crate::geometry::rect_contains;
use crate::layout::{KeyDefinition, KeyLayout};
use crate::types::Point;

/// First key, in layout order, whose bounds contain `point`.
pub fn resolve_key(layout: &KeyLayout, point: Point) -> Option<&KeyDefinition> {
    resolve_in(layout.keys(), point)
}

/// Same as [`resolve_key`] over any ordered key sequence.
pub fn resolve_in<'a, I>(keys: I, point: Point) -> Option<&'a KeyDefinition>
where
    I: IntoIterator<Item = &'a KeyDefinition>,
{
    keys.into_iter().find(|key| rect_contains(&key.bounds, point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{typing_layout, KeyAction, KeyboardGeometry};
    use crate::types::Rect;

    fn key(label: &str, l: i32, t: i32, r: i32, b: i32) -> KeyDefinition {
        let bounds = Rect::from_corners(l, t, r, b);
        KeyDefinition::new(label, bounds.center(), bounds, KeyAction::Text)
    }

    #[test]
    fn overlapping_keys_resolve_to_the_earlier_one() {
        let layout = KeyLayout::new(vec![key("first", 0, 0, 100, 100), key("second", 50, 50, 150, 150)]);
        assert_eq!(resolve_key(&layout, Point::new(75, 75)).unwrap().label, "first");
        assert_eq!(resolve_key(&layout, Point::new(120, 120)).unwrap().label, "second");

        let swapped = KeyLayout::new(vec![key("second", 50, 50, 150, 150), key("first", 0, 0, 100, 100)]);
        assert_eq!(resolve_key(&swapped, Point::new(75, 75)).unwrap().label, "second");
    }

    #[test]
    fn edges_follow_half_open_containment() {
        let layout = KeyLayout::new(vec![key("A", 0, 0, 100, 100), key("B", 100, 0, 200, 100)]);
        assert_eq!(resolve_key(&layout, Point::new(0, 0)).unwrap().label, "A");
        assert_eq!(resolve_key(&layout, Point::new(100, 10)).unwrap().label, "B");
        assert!(resolve_key(&layout, Point::new(200, 10)).is_none());
        assert!(resolve_key(&layout, Point::new(10, 100)).is_none());
    }

    #[test]
    fn empty_layout_has_no_match() {
        assert!(resolve_key(&KeyLayout::default(), Point::new(1, 1)).is_none());
    }

    #[test]
    fn suggestion_slots_resolve_after_fixed_keys() {
        let geo = KeyboardGeometry { width: 1000, height: 500, offset: Point::new(100, 80) };
        let mut layout = typing_layout(&geo);
        assert_eq!(resolve_key(&layout, Point::new(110, 90)).unwrap().label, "1");

        let slot_point = Point::new(100, 600);
        assert_eq!(resolve_key(&layout, slot_point).unwrap().action, KeyAction::Disabled);
        layout.set_suggestions(&["hello".to_string()]);
        let hit = resolve_key(&layout, slot_point).unwrap();
        assert_eq!(hit.label, "hello");
        assert_eq!(hit.action, KeyAction::Suggestion);
    }
}
