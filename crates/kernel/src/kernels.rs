//! Radial smoothing kernels for the density and force passes.
//!
//! All kernels have compact support `r` (the smoothing radius) and depend only
//! on the separation distance, so the contribution of `j` to `i` equals the
//! contribution of `i` to `j`.
//!
//! ```text
//! spiky_pow2(d)  = 15 / (2 pi r^5) * (r - d)^2          density
//! spiky_pow3(d)  = 15 / (pi r^6)   * (r - d)^3          near density
//! poly6(d)       = 315 / (64 pi r^9) * (r^2 - d^2)^3    viscosity weight
//! ```
//!
//! Normalization constants depend only on `r`, so they are computed once per
//! step in [`KernelCoefficients`] instead of per neighbor pair.

use std::f32::consts::PI;

/// Distances and densities below this are treated as zero to keep divisions
/// finite.
pub const EPSILON: f32 = 1.0e-6;

/// Precomputed normalization factors for a fixed smoothing radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelCoefficients {
    /// Smoothing radius.
    pub radius: f32,
    /// `radius^2`
    pub radius_sq: f32,
    spiky_pow2: f32,
    spiky_pow3: f32,
    spiky_pow2_derivative: f32,
    spiky_pow3_derivative: f32,
    poly6: f32,
}

impl KernelCoefficients {
    /// Compute the coefficients for `radius` (must be positive).
    pub fn new(radius: f32) -> Self {
        let r2 = radius * radius;
        let r4 = r2 * r2;
        let r5 = r4 * radius;
        let r6 = r5 * radius;
        let r9 = r6 * r2 * radius;
        Self {
            radius,
            radius_sq: r2,
            spiky_pow2: 15.0 / (2.0 * PI * r5),
            spiky_pow3: 15.0 / (PI * r6),
            spiky_pow2_derivative: 15.0 / (PI * r5),
            spiky_pow3_derivative: 45.0 / (PI * r6),
            poly6: 315.0 / (64.0 * PI * r9),
        }
    }

    /// Density kernel.
    #[inline]
    pub fn spiky_pow2(&self, dst: f32) -> f32 {
        if dst < self.radius {
            let v = self.radius - dst;
            v * v * self.spiky_pow2
        } else {
            0.0
        }
    }

    /// Near-density kernel; falls off faster than [`spiky_pow2`](Self::spiky_pow2).
    #[inline]
    pub fn spiky_pow3(&self, dst: f32) -> f32 {
        if dst < self.radius {
            let v = self.radius - dst;
            v * v * v * self.spiky_pow3
        } else {
            0.0
        }
    }

    /// d/dd of [`spiky_pow2`](Self::spiky_pow2). Non-positive.
    #[inline]
    pub fn spiky_pow2_derivative(&self, dst: f32) -> f32 {
        if dst <= self.radius {
            let v = self.radius - dst;
            -v * self.spiky_pow2_derivative
        } else {
            0.0
        }
    }

    /// d/dd of [`spiky_pow3`](Self::spiky_pow3). Non-positive.
    #[inline]
    pub fn spiky_pow3_derivative(&self, dst: f32) -> f32 {
        if dst <= self.radius {
            let v = self.radius - dst;
            -v * v * self.spiky_pow3_derivative
        } else {
            0.0
        }
    }

    /// Smooth bell kernel used to weight velocity differences.
    #[inline]
    pub fn poly6(&self, dst: f32) -> f32 {
        if dst < self.radius {
            let v = self.radius_sq - dst * dst;
            v * v * v * self.poly6
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Riemann sum of a radial kernel over the cube enclosing its support.
    fn integrate(coeffs: &KernelCoefficients, kernel: fn(&KernelCoefficients, f32) -> f32) -> f64 {
        let n = 80;
        let r = coeffs.radius;
        let cell = 2.0 * r / n as f32;
        let dv = (cell * cell * cell) as f64;
        let mut sum = 0.0_f64;
        for ix in 0..n {
            let x = -r + (ix as f32 + 0.5) * cell;
            for iy in 0..n {
                let y = -r + (iy as f32 + 0.5) * cell;
                for iz in 0..n {
                    let z = -r + (iz as f32 + 0.5) * cell;
                    let d = (x * x + y * y + z * z).sqrt();
                    sum += kernel(coeffs, d) as f64 * dv;
                }
            }
        }
        sum
    }

    #[test]
    fn kernels_vanish_outside_support() {
        let k = KernelCoefficients::new(0.2);
        assert_eq!(k.spiky_pow2(0.2), 0.0);
        assert_eq!(k.spiky_pow3(0.25), 0.0);
        assert_eq!(k.poly6(0.2), 0.0);
        assert_eq!(k.spiky_pow2_derivative(0.3), 0.0);
        assert_eq!(k.spiky_pow3_derivative(0.3), 0.0);
    }

    #[test]
    fn kernels_decrease_monotonically() {
        let k = KernelCoefficients::new(0.2);
        let mut prev = (f32::INFINITY, f32::INFINITY, f32::INFINITY);
        for i in 0..20 {
            let d = i as f32 * 0.01;
            let cur = (k.spiky_pow2(d), k.spiky_pow3(d), k.poly6(d));
            assert!(cur.0 < prev.0 && cur.1 < prev.1 && cur.2 < prev.2, "not decreasing at d={d}");
            prev = cur;
        }
    }

    #[test]
    fn near_kernel_is_steeper() {
        let k = KernelCoefficients::new(1.0);
        let ratio_density = k.spiky_pow2(0.5) / k.spiky_pow2(0.0);
        let ratio_near = k.spiky_pow3(0.5) / k.spiky_pow3(0.0);
        assert!(ratio_near < ratio_density);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let k = KernelCoefficients::new(0.5);
        let h = 1.0e-3;
        for &d in &[0.05_f32, 0.2, 0.4] {
            let fd2 = (k.spiky_pow2(d + h) - k.spiky_pow2(d - h)) / (2.0 * h);
            let fd3 = (k.spiky_pow3(d + h) - k.spiky_pow3(d - h)) / (2.0 * h);
            assert!((fd2 - k.spiky_pow2_derivative(d)).abs() / fd2.abs() < 1.0e-2, "pow2 at {d}");
            assert!((fd3 - k.spiky_pow3_derivative(d)).abs() / fd3.abs() < 1.0e-2, "pow3 at {d}");
        }
    }

    #[test]
    fn kernels_are_normalized() {
        let k = KernelCoefficients::new(0.2);
        for (name, f) in [
            ("spiky_pow2", KernelCoefficients::spiky_pow2 as fn(&KernelCoefficients, f32) -> f32),
            ("spiky_pow3", KernelCoefficients::spiky_pow3),
            ("poly6", KernelCoefficients::poly6),
        ] {
            let integral = integrate(&k, f);
            assert!((integral - 1.0).abs() < 0.03, "{name} integrates to {integral}");
        }
    }
}
