// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Affine transforms in PDF row-vector convention.

use lopdf::Object;
use unmark_core::Rect;

/// A PDF transformation matrix `[a b c d e f]`.
///
/// Points are row vectors, so `p' = p × M` and `m1.then(&m2)` means "apply
/// `m1` first, then `m2`", which is how `cm` and the text matrices compose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Read six numeric operands (as given to `cm` or `Tm`).
    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let mut v = [0.0f32; 6];
        for (slot, operand) in v.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Self::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }

    /// The six values as PDF operands.
    pub fn to_operands(&self) -> Vec<Object> {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .into_iter()
            .map(Object::Real)
            .collect()
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box of a transformed rectangle.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.apply(rect.x0, rect.y0),
            self.apply(rect.x1, rect.y0),
            self.apply(rect.x0, rect.y1),
            self.apply(rect.x1, rect.y1),
        ];
        let mut out = Rect::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1);
        for (x, y) in &corners[1..] {
            out = out.union(&Rect::new(*x, *y, *x, *y));
        }
        out
    }

    pub fn inverse(&self) -> Option<Matrix> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-9 {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Matrix {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }
}

/// The unit square every image XObject is painted into.
pub const UNIT_SQUARE: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 1.0,
    y1: 1.0,
};

/// Numeric value of an integer or real operand.
pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Map a user-space rectangle to display space: origin at the top-left of
/// the page as a viewer shows it (`/Rotate` applied), y growing downward.
pub fn to_display(rect: &Rect, page_box: &Rect, rotation: i32) -> Rect {
    match rotation {
        90 => Rect::new(
            rect.y0 - page_box.y0,
            rect.x0 - page_box.x0,
            rect.y1 - page_box.y0,
            rect.x1 - page_box.x0,
        ),
        180 => Rect::new(
            page_box.x1 - rect.x1,
            rect.y0 - page_box.y0,
            page_box.x1 - rect.x0,
            rect.y1 - page_box.y0,
        ),
        270 => Rect::new(
            page_box.y1 - rect.y1,
            page_box.x1 - rect.x1,
            page_box.y1 - rect.y0,
            page_box.x1 - rect.x0,
        ),
        _ => Rect::new(
            rect.x0 - page_box.x0,
            page_box.y1 - rect.y1,
            rect.x1 - page_box.x0,
            page_box.y1 - rect.y0,
        ),
    }
}
