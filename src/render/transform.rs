//! 2D affine transforms in canvas convention

/// Affine map `x' = a*x + c*y + e`, `y' = b*x + d*y + f`
///
/// Y grows downward, so a positive angle turns clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    #[must_use]
    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn rotate_degrees(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self` applied after `inner`, like a canvas call sequence
    /// `translate(self) ... draw(inner)`
    #[must_use]
    pub fn then(&self, inner: &Affine) -> Self {
        Self {
            a: self.a * inner.a + self.c * inner.b,
            b: self.b * inner.a + self.d * inner.b,
            c: self.a * inner.c + self.c * inner.d,
            d: self.b * inner.c + self.d * inner.d,
            e: self.a * inner.e + self.c * inner.f + self.e,
            f: self.b * inner.e + self.d * inner.f + self.f,
        }
    }

    #[must_use]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Inverse transform, `None` for a degenerate matrix
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Self {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3
    }

    #[test]
    fn test_translate_then_rotate_pivots_on_anchor() {
        let transform = Affine::translate(100.0, 50.0).then(&Affine::rotate_degrees(90.0));
        assert!(close(transform.apply(0.0, 0.0), (100.0, 50.0)));
        assert!(close(transform.apply(10.0, 0.0), (100.0, 60.0)));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let transform = Affine::translate(12.0, -7.0)
            .then(&Affine::rotate_degrees(-30.0))
            .then(&Affine::translate(-40.0, 3.0));
        let inverse = transform.inverse().unwrap();
        let (x, y) = transform.apply(5.0, 9.0);
        assert!(close(inverse.apply(x, y), (5.0, 9.0)));
    }

    #[test]
    fn test_degenerate_has_no_inverse() {
        let flat = Affine {
            a: 0.0,
            d: 0.0,
            ..Affine::IDENTITY
        };
        assert!(flat.inverse().is_none());
    }
}
