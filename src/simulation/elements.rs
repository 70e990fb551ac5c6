//! Keplerian orbital elements
//!
//! Conversion between `(a, e, i, ν, ω, Ω)` and a relative position and
//! velocity about a central mass. Used for random initial conditions, init
//! files and snapshots written in elliptic elements.

use std::f64::consts::TAU;

use crate::simulation::states::NVec3;

/// Elliptic elements of a bound orbit. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    pub a: f64, // semi-major axis
    pub e: f64, // eccentricity, < 1
    pub i: f64, // inclination
    pub nu: f64, // true anomaly
    pub omega: f64, // argument of periapsis
    pub big_omega: f64, // longitude of the ascending node
}

impl OrbitalElements {
    /// Position and velocity relative to the central mass, `mu = G (M + m)`
    pub fn to_cartesian(&self, mu: f64) -> (NVec3, NVec3) {
        let p = self.a * (1.0 - self.e * self.e);
        let r = p / (1.0 + self.e * self.nu.cos());
        let h = (mu * p).sqrt();

        // perifocal frame
        let (sn, cn) = self.nu.sin_cos();
        let x_pf = NVec3::new(r * cn, r * sn, 0.0);
        let v_pf = NVec3::new(-mu / h * sn, mu / h * (self.e + cn), 0.0);

        let (so, co) = self.omega.sin_cos();
        let (sw, cw) = self.big_omega.sin_cos();
        let (si, ci) = self.i.sin_cos();

        // columns: perifocal axes in the reference frame
        let px = NVec3::new(cw * co - sw * so * ci, sw * co + cw * so * ci, so * si);
        let qx = NVec3::new(-cw * so - sw * co * ci, -sw * so + cw * co * ci, co * si);

        (px * x_pf.x + qx * x_pf.y, px * v_pf.x + qx * v_pf.y)
    }

    /// Elements of the orbit through `r` with velocity `v`, `mu = G (M + m)`.
    ///
    /// For circular orbits `ω = 0` and `ν` is measured from the node; for
    /// equatorial orbits the node is taken along `x`.
    pub fn from_cartesian(r: &NVec3, v: &NVec3, mu: f64) -> Self {
        let h = r.cross(v);
        let rn = r.norm();
        let h_hat = h.normalize();

        let node = NVec3::z().cross(&h);
        let node_hat = if node.norm() > 1e-14 * h.norm() { node.normalize() } else { NVec3::x() };

        let e_vec = ((v.norm_squared() - mu / rn) * r - r.dot(v) * v) / mu;
        let e = e_vec.norm();
        let energy = 0.5 * v.norm_squared() - mu / rn;

        let i = (h.z / h.norm()).clamp(-1.0, 1.0).acos();
        let big_omega = node_hat.y.atan2(node_hat.x).rem_euclid(TAU);

        let (omega, nu) = if e > 1e-12 {
            let e_hat = e_vec / e;
            let omega = node_hat.cross(&e_hat).dot(&h_hat).atan2(node_hat.dot(&e_hat));
            let nu = e_hat.cross(r).dot(&h_hat).atan2(e_hat.dot(r));
            (omega.rem_euclid(TAU), nu.rem_euclid(TAU))
        } else {
            let nu = node_hat.cross(r).dot(&h_hat).atan2(node_hat.dot(r));
            (0.0, nu.rem_euclid(TAU))
        };

        Self {
            a: -mu / (2.0 * energy),
            e,
            i,
            nu,
            omega,
            big_omega,
        }
    }
}
