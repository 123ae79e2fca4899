//! Formatting facts read from host nodes.

use std::ops::Range;

/// An sRGB color with alpha, as exposed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Alpha as a whole percentage.
    pub fn opacity_percent(&self) -> u32 {
        (u32::from(self.a) * 100 + 127) / 255
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Grammar,
    Spelling,
}

impl MarkerKind {
    pub fn name(&self) -> &'static str {
        match self {
            MarkerKind::Grammar => "grammar",
            MarkerKind::Spelling => "spelling",
        }
    }
}

/// A grammar or spelling annotation over node-local offsets `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    pub kind: MarkerKind,
    pub start: usize,
    pub end: usize,
}

impl Marker {
    pub fn new(kind: MarkerKind, range: Range<usize>) -> Self {
        Self {
            kind,
            start: range.start,
            end: range.end,
        }
    }

    /// Hosts occasionally report inverted ranges; those never produce events.
    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }
}

/// Closed set of formatting facts for one node, populated eagerly on read.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSnapshot {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub color: Color,
    pub font_family: String,
    pub font_size: u32,
    pub link: bool,
    pub heading_level: Option<u8>,
    pub markers: Vec<Marker>,
    pub embedded: bool,
}

impl Default for AttributeSnapshot {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            color: Color::BLACK,
            font_family: "Tinos".to_string(),
            font_size: 16,
            link: false,
            heading_level: None,
            markers: Vec::new(),
            embedded: false,
        }
    }
}

impl AttributeSnapshot {
    /// Well-formed markers overlapping the node-local `window`.
    pub fn markers_in(&self, window: Range<usize>) -> impl Iterator<Item = &Marker> + '_ {
        self.markers
            .iter()
            .filter(|m| m.is_well_formed())
            .filter(move |m| m.start < window.end && m.end > window.start)
    }
}
