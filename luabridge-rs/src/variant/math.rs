//! Structured math kinds carried by [`Variant`](super::Variant).
//!
//! Components are `f64` so that every value survives a trip through a Lua
//! number unchanged.  Operators follow host semantics: component-wise for
//! same-kind operands, uniform scaling for scalars.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Tolerance used by the `is_equal_approx` builtins.
pub const CMP_EPSILON: f64 = 0.00001;

fn approx_eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let tolerance = (CMP_EPSILON * a.abs()).max(CMP_EPSILON);
    (a - b).abs() < tolerance
}

/// Formats a component the way the host does: integral values keep no
/// fractional part.
fn fmt_component(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        write!(f, "{}", x as i64)
    } else {
        write!(f, "{x}")
    }
}

// ── Vector2 ───────────────────────────────────────────────────────────────────

/// 2D vector.  Ordering is lexicographic (`x` first, then `y`).
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            self
        } else {
            self / len
        }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn distance_to(self, other: Self) -> f64 {
        (other - self).length()
    }

    /// Angle to the positive x axis, in radians.
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    pub fn floor(self) -> Self {
        Self::new(self.x.floor(), self.y.floor())
    }

    pub fn ceil(self) -> Self {
        Self::new(self.x.ceil(), self.y.ceil())
    }

    pub fn round(self) -> Self {
        Self::new(self.x.round(), self.y.round())
    }

    pub fn lerp(self, to: Self, weight: f64) -> Self {
        self + (to - self) * weight
    }

    pub fn is_equal_approx(self, other: Self) -> bool {
        approx_eq(self.x, other.x) && approx_eq(self.y, other.y)
    }
}

impl Add for Vector2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul for Vector2 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div for Vector2 {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self::new(self.x / rhs.x, self.y / rhs.y)
    }
}

impl Div<f64> for Vector2 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vector2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        fmt_component(f, self.x)?;
        f.write_str(", ")?;
        fmt_component(f, self.y)?;
        f.write_str(")")
    }
}

// ── Vector3 ───────────────────────────────────────────────────────────────────

/// 3D vector.  Only equality is exposed to scripts; no ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn normalized(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            self
        } else {
            self / len
        }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn distance_to(self, other: Self) -> f64 {
        (other - self).length()
    }

    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    pub fn floor(self) -> Self {
        Self::new(self.x.floor(), self.y.floor(), self.z.floor())
    }

    pub fn ceil(self) -> Self {
        Self::new(self.x.ceil(), self.y.ceil(), self.z.ceil())
    }

    pub fn round(self) -> Self {
        Self::new(self.x.round(), self.y.round(), self.z.round())
    }

    pub fn lerp(self, to: Self, weight: f64) -> Self {
        self + (to - self) * weight
    }

    pub fn is_equal_approx(self, other: Self) -> bool {
        approx_eq(self.x, other.x) && approx_eq(self.y, other.y) && approx_eq(self.z, other.z)
    }
}

impl Add for Vector3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul for Vector3 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div for Vector3 {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self::new(self.x / rhs.x, self.y / rhs.y, self.z / rhs.z)
    }
}

impl Div<f64> for Vector3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vector3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        fmt_component(f, self.x)?;
        f.write_str(", ")?;
        fmt_component(f, self.y)?;
        f.write_str(", ")?;
        fmt_component(f, self.z)?;
        f.write_str(")")
    }
}

// ── Color ─────────────────────────────────────────────────────────────────────

/// RGBA color.  Components are not clamped, so negative or >1 values are
/// preserved.  Ordering is lexicographic over `r, g, b, a`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Default for Color {
    /// Opaque black.
    fn default() -> Self {
        Self::rgba(0.0, 0.0, 0.0, 1.0)
    }
}

impl Color {
    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn inverted(self) -> Self {
        Self::rgba(1.0 - self.r, 1.0 - self.g, 1.0 - self.b, self.a)
    }

    pub fn lerp(self, to: Self, weight: f64) -> Self {
        self + (to - self) * weight
    }

    /// Relative luminance (Rec. 709 weights).
    pub fn luminance(self) -> f64 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    pub fn is_equal_approx(self, other: Self) -> bool {
        approx_eq(self.r, other.r)
            && approx_eq(self.g, other.g)
            && approx_eq(self.b, other.b)
            && approx_eq(self.a, other.a)
    }
}

impl Add for Color {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::rgba(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b, self.a + rhs.a)
    }
}

impl Sub for Color {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::rgba(self.r - rhs.r, self.g - rhs.g, self.b - rhs.b, self.a - rhs.a)
    }
}

impl Mul for Color {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::rgba(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b, self.a * rhs.a)
    }
}

impl Mul<f64> for Color {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::rgba(self.r * rhs, self.g * rhs, self.b * rhs, self.a * rhs)
    }
}

impl Div for Color {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self::rgba(self.r / rhs.r, self.g / rhs.g, self.b / rhs.b, self.a / rhs.a)
    }
}

impl Div<f64> for Color {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self::rgba(self.r / rhs, self.g / rhs, self.b / rhs, self.a / rhs)
    }
}

impl Neg for Color {
    type Output = Self;
    fn neg(self) -> Self {
        Self::rgba(1.0 - self.r, 1.0 - self.g, 1.0 - self.b, 1.0 - self.a)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, c) in [self.r, self.g, self.b, self.a].into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt_component(f, c)?;
        }
        f.write_str(")")
    }
}

// ── Rect2 ─────────────────────────────────────────────────────────────────────

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect2 {
    pub position: Vector2,
    pub size: Vector2,
}

impl Rect2 {
    pub const fn new(position: Vector2, size: Vector2) -> Self {
        Self { position, size }
    }

    pub const fn from_components(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Vector2::new(x, y), Vector2::new(width, height))
    }

    pub fn end(self) -> Vector2 {
        self.position + self.size
    }

    pub fn set_end(&mut self, end: Vector2) {
        self.size = end - self.position;
    }

    pub fn area(self) -> f64 {
        self.size.x * self.size.y
    }

    pub fn center(self) -> Vector2 {
        self.position + self.size * 0.5
    }

    pub fn has_area(self) -> bool {
        self.size.x > 0.0 && self.size.y > 0.0
    }

    /// Half-open containment: the far edges are outside.
    pub fn has_point(self, point: Vector2) -> bool {
        let end = self.end();
        point.x >= self.position.x && point.y >= self.position.y && point.x < end.x && point.y < end.y
    }

    pub fn intersects(self, other: Self) -> bool {
        let (a_end, b_end) = (self.end(), other.end());
        self.position.x < b_end.x
            && a_end.x > other.position.x
            && self.position.y < b_end.y
            && a_end.y > other.position.y
    }

    pub fn encloses(self, other: Self) -> bool {
        let (a_end, b_end) = (self.end(), other.end());
        other.position.x >= self.position.x
            && other.position.y >= self.position.y
            && b_end.x <= a_end.x
            && b_end.y <= a_end.y
    }

    pub fn merge(self, other: Self) -> Self {
        let position = Vector2::new(
            self.position.x.min(other.position.x),
            self.position.y.min(other.position.y),
        );
        let (a_end, b_end) = (self.end(), other.end());
        let end = Vector2::new(a_end.x.max(b_end.x), a_end.y.max(b_end.y));
        Self::new(position, end - position)
    }

    pub fn grow(self, by: f64) -> Self {
        Self::new(
            self.position - Vector2::new(by, by),
            self.size + Vector2::new(by * 2.0, by * 2.0),
        )
    }

    /// Equivalent rectangle with a non-negative size.
    pub fn abs(self) -> Self {
        Self::new(
            Vector2::new(
                self.position.x + self.size.x.min(0.0),
                self.position.y + self.size.y.min(0.0),
            ),
            self.size.abs(),
        )
    }
}

impl fmt::Display for Rect2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[P: {}, S: {}]", self.position, self.size)
    }
}

// ── Plane ─────────────────────────────────────────────────────────────────────

/// Plane in Hessian normal form: points `p` with `normal.dot(p) == d`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Plane {
    pub normal: Vector3,
    pub d: f64,
}

impl Plane {
    pub const fn new(normal: Vector3, d: f64) -> Self {
        Self { normal, d }
    }

    pub const fn from_components(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self::new(Vector3::new(a, b, c), d)
    }

    /// Plane through three points, wound clockwise.
    pub fn from_points(p1: Vector3, p2: Vector3, p3: Vector3) -> Self {
        let normal = (p1 - p3).cross(p1 - p2).normalized();
        Self::new(normal, normal.dot(p1))
    }

    pub fn distance_to(self, point: Vector3) -> f64 {
        self.normal.dot(point) - self.d
    }

    pub fn is_point_over(self, point: Vector3) -> bool {
        self.distance_to(point) > 0.0
    }

    pub fn has_point(self, point: Vector3, tolerance: f64) -> bool {
        self.distance_to(point).abs() <= tolerance
    }

    pub fn project(self, point: Vector3) -> Vector3 {
        point - self.normal * self.distance_to(point)
    }

    pub fn normalized(self) -> Self {
        let len = self.normal.length();
        if len == 0.0 {
            return Self::default();
        }
        Self::new(self.normal / len, self.d / len)
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[N: {}, D: ", self.normal)?;
        fmt_component(f, self.d)?;
        f.write_str("]")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
