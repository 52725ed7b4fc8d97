//! Map value objects
//!
//! Value objects are immutable types that represent concepts in the map
//! domain. They are compared by value rather than identity and encapsulate
//! domain validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a position on the board in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position2D {
    pub x: f64,
    pub y: f64,
}

impl Position2D {
    /// Create a new position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Get the distance to another position
    pub fn distance_to(&self, other: &Position2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation between two positions; `t` in `[0, 1]`
    pub fn lerp(&self, other: &Position2D, t: f64) -> Position2D {
        Position2D::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Angle of the vector from this position to `other`, in radians
    pub fn angle_to(&self, other: &Position2D) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Rotate this position around `center` by `angle` radians
    pub fn rotated_around(&self, center: &Position2D, angle: f64) -> Position2D {
        let (sin, cos) = angle.sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Position2D::new(
            center.x + dx * cos - dy * sin,
            center.y + dx * sin + dy * cos,
        )
    }
}

impl Default for Position2D {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl std::ops::Add for Position2D {
    type Output = Position2D;

    fn add(self, other: Position2D) -> Position2D {
        Position2D::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Position2D {
    type Output = Position2D;

    fn sub(self, other: Position2D) -> Position2D {
        Position2D::new(self.x - other.x, self.y - other.y)
    }
}

impl std::ops::Mul<f64> for Position2D {
    type Output = Position2D;

    fn mul(self, scalar: f64) -> Position2D {
        Position2D::new(self.x * scalar, self.y * scalar)
    }
}

/// Position and orientation of a single rail-car segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentPose {
    /// Center of the segment in map coordinates
    pub position: Position2D,
    /// Rotation in radians, zero pointing along positive x
    pub rotation: f64,
}

impl SegmentPose {
    /// Create a new segment pose
    pub fn new(position: Position2D, rotation: f64) -> Self {
        Self { position, rotation }
    }

    /// Corners of the segment's bounding box in counter-clockwise order
    pub fn corners(&self, size: Size) -> [Position2D; 4] {
        let half_w = size.width / 2.0;
        let half_h = size.height / 2.0;
        let local = [
            Position2D::new(half_w, half_h),
            Position2D::new(half_w, -half_h),
            Position2D::new(-half_w, -half_h),
            Position2D::new(-half_w, half_h),
        ];
        let origin = Position2D::default();
        local.map(|corner| corner.rotated_around(&origin, self.rotation) + self.position)
    }
}

impl Default for SegmentPose {
    fn default() -> Self {
        Self::new(Position2D::default(), 0.0)
    }
}

/// Represents the size of a map element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Create a new size
    pub fn new(width: f64, height: f64) -> Result<Self, String> {
        if width <= 0.0 || height <= 0.0 {
            return Err("Size dimensions must be positive".to_string());
        }
        Ok(Self { width, height })
    }

    /// Get the area
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl Default for Size {
    fn default() -> Self {
        // Proportions of a single rail car
        Self {
            width: 3.2,
            height: 0.8,
        }
    }
}

/// Represents an RGBA color value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a new color
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create a new opaque color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Parse a `#rrggbb` or `#rrggbbaa` hex string
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !digits.is_ascii() {
            return Err(format!("Invalid hex color: {hex}"));
        }
        let parse = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| format!("Invalid hex color: {hex}"))
        };
        match digits.len() {
            6 => Ok(Self::rgb(parse(0..2)?, parse(2..4)?, parse(4..6)?)),
            8 => Ok(Self::new(
                parse(0..2)?,
                parse(2..4)?,
                parse(4..6)?,
                parse(6..8)?,
            )),
            _ => Err(format!("Invalid hex color: {hex}")),
        }
    }

    /// Format as a `#rrggbb` hex string (alpha included only when not opaque)
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Common color constants
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// The color of a rail connection
///
/// The named variants are the standard board colors; arbitrary hex colors from
/// imported path files are preserved as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RailColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Black,
    White,
    /// Neutral color usable by any player
    Gray,
    /// A custom color, stored as written in the source file
    Custom(String),
}

impl RailColor {
    /// Parse a color name or hex string from a path file
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "red" => RailColor::Red,
            "orange" => RailColor::Orange,
            "yellow" => RailColor::Yellow,
            "green" => RailColor::Green,
            "blue" => RailColor::Blue,
            "purple" | "violet" => RailColor::Purple,
            "black" => RailColor::Black,
            "white" => RailColor::White,
            "gray" | "grey" | "neutral" => RailColor::Gray,
            _ => RailColor::Custom(s.to_string()),
        }
    }

    /// Get the string representation used in path files
    pub fn as_str(&self) -> &str {
        match self {
            RailColor::Red => "red",
            RailColor::Orange => "orange",
            RailColor::Yellow => "yellow",
            RailColor::Green => "green",
            RailColor::Blue => "blue",
            RailColor::Purple => "purple",
            RailColor::Black => "black",
            RailColor::White => "white",
            RailColor::Gray => "gray",
            RailColor::Custom(s) => s,
        }
    }

    /// Resolve to a drawable RGBA color
    pub fn to_color(&self) -> Color {
        match self {
            RailColor::Red => Color::rgb(0xcc, 0x22, 0x22),
            RailColor::Orange => Color::rgb(0xe6, 0x7e, 0x22),
            RailColor::Yellow => Color::rgb(0xe6, 0xc8, 0x22),
            RailColor::Green => Color::rgb(0x22, 0x99, 0x44),
            RailColor::Blue => Color::rgb(0x22, 0x55, 0xcc),
            RailColor::Purple => Color::rgb(0x88, 0x22, 0xaa),
            RailColor::Black => Color::rgb(0x22, 0x22, 0x22),
            RailColor::White => Color::rgb(0xee, 0xee, 0xee),
            RailColor::Gray => Color::rgb(0x99, 0x99, 0x99),
            RailColor::Custom(s) => Color::from_hex(s).unwrap_or(Color::rgb(0x99, 0x99, 0x99)),
        }
    }

    /// All named board colors, in drawing order
    pub fn named() -> [RailColor; 9] {
        [
            RailColor::Red,
            RailColor::Orange,
            RailColor::Yellow,
            RailColor::Green,
            RailColor::Blue,
            RailColor::Purple,
            RailColor::Black,
            RailColor::White,
            RailColor::Gray,
        ]
    }
}

impl fmt::Display for RailColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for RailColor {
    fn default() -> Self {
        RailColor::Gray
    }
}
