//! Spoken phrasing for formatting and marker transitions.

use crate::tree::{AttributeSnapshot, Color, MarkerKind};

const NAMED_COLORS: &[(&str, Color)] = &[
    ("Black", Color::rgb(0, 0, 0)),
    ("White", Color::rgb(255, 255, 255)),
    ("Red", Color::rgb(255, 0, 0)),
    ("Lime", Color::rgb(0, 255, 0)),
    ("Green", Color::rgb(0, 128, 0)),
    ("Blue", Color::rgb(0, 0, 255)),
    ("Yellow", Color::rgb(255, 255, 0)),
    ("Cyan", Color::rgb(0, 255, 255)),
    ("Magenta", Color::rgb(255, 0, 255)),
    ("Gray", Color::rgb(128, 128, 128)),
    ("Silver", Color::rgb(192, 192, 192)),
    ("Maroon", Color::rgb(128, 0, 0)),
    ("Olive", Color::rgb(128, 128, 0)),
    ("Purple", Color::rgb(128, 0, 128)),
    ("Teal", Color::rgb(0, 128, 128)),
    ("Navy", Color::rgb(0, 0, 128)),
];

/// Closest named color by RGB distance; alpha is ignored.
pub fn color_name(color: Color) -> &'static str {
    let distance = |other: &Color| {
        let d = |a: u8, b: u8| (i32::from(a) - i32::from(b)).pow(2);
        d(color.r, other.r) + d(color.g, other.g) + d(color.b, other.b)
    };
    NAMED_COLORS
        .iter()
        .min_by_key(|(_, named)| distance(named))
        .map_or("Black", |(name, _)| *name)
}

pub fn describe_color(color: Color) -> String {
    format!("{}, {}% opacity.", color_name(color), color.opacity_percent())
}

fn toggle(on: bool, name: &str) -> String {
    if on {
        name.to_string()
    } else {
        format!("Not {}", name.to_lowercase())
    }
}

/// Phrases for every attribute that differs, in a fixed order.
pub fn describe_changes(before: &AttributeSnapshot, after: &AttributeSnapshot) -> Vec<String> {
    let mut changes = Vec::new();
    if before.color != after.color {
        changes.push(describe_color(after.color));
    }
    if before.bold != after.bold {
        changes.push(toggle(after.bold, "Bold"));
    }
    if before.italic != after.italic {
        changes.push(toggle(after.italic, "Italic"));
    }
    if before.underline != after.underline {
        changes.push(toggle(after.underline, "Underline"));
    }
    if before.strikethrough != after.strikethrough {
        changes.push(toggle(after.strikethrough, "Line through"));
    }
    if before.font_family != after.font_family {
        changes.push(format!("Font {}", after.font_family));
    }
    if before.font_size != after.font_size {
        changes.push(format!("Size {}", after.font_size));
    }
    if before.link != after.link {
        changes.push(toggle(after.link, "Link"));
    }
    changes
}

fn capitalized(kind: MarkerKind) -> String {
    let name = kind.name();
    let mut chars = name.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

pub fn entering_marker(kind: MarkerKind) -> String {
    format!("{} error", capitalized(kind))
}

pub fn leaving_marker(kind: MarkerKind) -> String {
    format!("Leaving {} error", kind.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Color::RED, "Red")]
    #[case(Color::BLUE, "Blue")]
    #[case(Color::rgb(250, 10, 5), "Red")]
    #[case(Color::rgb(20, 20, 20), "Black")]
    #[case(Color::rgb(0, 120, 0), "Green")]
    fn names_nearest_color(#[case] color: Color, #[case] expected: &str) {
        assert_eq!(color_name(color), expected);
    }

    #[test]
    fn color_phrase_includes_opacity() {
        assert_eq!(describe_color(Color::RED), "Red, 100% opacity.");
        assert_eq!(describe_color(Color::rgba(0, 0, 0, 128)), "Black, 50% opacity.");
    }

    #[test]
    fn changes_come_out_in_fixed_order() {
        let before = AttributeSnapshot::default();
        let after = AttributeSnapshot {
            link: true,
            font_size: 12,
            font_family: "Gelasio".to_string(),
            strikethrough: true,
            underline: true,
            italic: true,
            bold: true,
            color: Color::BLUE,
            ..AttributeSnapshot::default()
        };

        assert_eq!(
            describe_changes(&before, &after),
            vec![
                "Blue, 100% opacity.",
                "Bold",
                "Italic",
                "Underline",
                "Line through",
                "Font Gelasio",
                "Size 12",
                "Link",
            ]
        );
        assert_eq!(
            describe_changes(&after, &before),
            vec![
                "Black, 100% opacity.",
                "Not bold",
                "Not italic",
                "Not underline",
                "Not line through",
                "Font Tinos",
                "Size 16",
                "Not link",
            ]
        );
    }

    #[test]
    fn unchanged_attributes_say_nothing() {
        let attrs = AttributeSnapshot::default();
        assert!(describe_changes(&attrs, &attrs.clone()).is_empty());
    }

    #[test]
    fn marker_phrases() {
        assert_eq!(entering_marker(MarkerKind::Grammar), "Grammar error");
        assert_eq!(leaving_marker(MarkerKind::Grammar), "Leaving grammar error");
        assert_eq!(entering_marker(MarkerKind::Spelling), "Spelling error");
    }
}
