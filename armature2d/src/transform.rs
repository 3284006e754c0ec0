//! 2D affine math shared by bones and slots.
//!
//! Angles are radians. Matrices map `(x, y)` to `(a * x + c * y + tx, b * x + d * y + ty)`.

use std::f32::consts::{FRAC_PI_4, PI, TAU};
use std::ops::Add;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub const fn from_translation(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    /// Returns the matrix that applies `self` first and `next` second.
    #[must_use]
    pub fn concat(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Degenerate matrices invert to the zero matrix, collapsing every point onto the origin.
    #[must_use]
    pub fn invert(&self) -> Matrix {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Matrix::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        }
        let inv = 1.0 / det;
        Matrix {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.c * self.ty - self.d * self.tx) * inv,
            ty: (self.b * self.tx - self.a * self.ty) * inv,
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> Point {
        Point {
            x: self.a * x + self.c * y + self.tx,
            y: self.b * x + self.d * y + self.ty,
        }
    }

    /// Like [`Matrix::transform_point`] without the translation part.
    pub fn transform_vector(&self, x: f32, y: f32) -> Point {
        Point {
            x: self.a * x + self.c * y,
            y: self.b * x + self.d * y,
        }
    }
}

#[cfg(feature = "glam")]
impl From<Matrix> for glam::Affine2 {
    fn from(m: Matrix) -> Self {
        glam::Affine2::from_cols_array(&[m.a, m.b, m.c, m.d, m.tx, m.ty])
    }
}

#[cfg(feature = "glam")]
impl From<glam::Affine2> for Matrix {
    fn from(value: glam::Affine2) -> Self {
        let [a, b, c, d, tx, ty] = value.to_cols_array();
        Matrix { a, b, c, d, tx, ty }
    }
}

/// Decomposed transform. `skew` is the extra rotation of the y axis relative to `rotation`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub skew: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        skew: 0.0,
        rotation: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    pub const fn from_translation(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::IDENTITY
        }
    }

    /// Wraps an angle into `(-PI, PI]`.
    pub fn normalize_radian(value: f32) -> f32 {
        let mut value = (value + PI) % TAU;
        if value <= 0.0 {
            value += TAU;
        }
        value - PI
    }

    pub fn to_matrix(&self) -> Matrix {
        let (mut a, mut b) = if self.rotation == 0.0 {
            (1.0, 0.0)
        } else {
            (self.rotation.cos(), self.rotation.sin())
        };
        let (mut c, mut d) = if self.skew == 0.0 {
            (-b, a)
        } else {
            let angle = self.skew + self.rotation;
            (-angle.sin(), angle.cos())
        };
        if self.scale_x != 1.0 {
            a *= self.scale_x;
            b *= self.scale_x;
        }
        if self.scale_y != 1.0 {
            c *= self.scale_y;
            d *= self.scale_y;
        }
        Matrix {
            a,
            b,
            c,
            d,
            tx: self.x,
            ty: self.y,
        }
    }

    /// Decomposes `matrix` into `self`. A non-negative scale on `self` stays non-negative;
    /// reflections are folded into the angles instead.
    pub fn set_from_matrix(&mut self, matrix: &Matrix) {
        let backup_scale_x = self.scale_x;
        let backup_scale_y = self.scale_y;

        self.x = matrix.tx;
        self.y = matrix.ty;
        self.rotation = (matrix.b / matrix.a).atan();
        let mut skew_x = (-matrix.c / matrix.d).atan();

        self.scale_x = if self.rotation > -FRAC_PI_4 && self.rotation < FRAC_PI_4 {
            matrix.a / self.rotation.cos()
        } else {
            matrix.b / self.rotation.sin()
        };
        self.scale_y = if skew_x > -FRAC_PI_4 && skew_x < FRAC_PI_4 {
            matrix.d / skew_x.cos()
        } else {
            -matrix.c / skew_x.sin()
        };

        if backup_scale_x >= 0.0 && self.scale_x < 0.0 {
            self.scale_x = -self.scale_x;
            self.rotation -= PI;
        }
        if backup_scale_y >= 0.0 && self.scale_y < 0.0 {
            self.scale_y = -self.scale_y;
            skew_x -= PI;
        }

        self.skew = skew_x - self.rotation;
    }

    pub fn from_matrix(matrix: &Matrix) -> Self {
        let mut out = Self::IDENTITY;
        out.set_from_matrix(matrix);
        out
    }
}

/// Layers `rhs` over `self`: translations and angles add, scales multiply.
impl Add for Transform {
    type Output = Transform;

    fn add(self, rhs: Transform) -> Transform {
        Transform {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            skew: self.skew + rhs.skew,
            rotation: self.rotation + rhs.rotation,
            scale_x: self.scale_x * rhs.scale_x,
            scale_y: self.scale_y * rhs.scale_y,
        }
    }
}
