//! Central-body perturbations
//!
//! Accelerations that do not come from the mutual gravity of the bodies:
//! the central body's Keplerian pull, its oblateness (J2), the tides the
//! bodies raise on it and a distant star the whole system orbits.
//!
//! Every term implements [`Perturbation`] and their contributions are summed
//! into one acceleration per body by a [`PerturbationSet`]. Terms also report
//! their back reaction on the central body (acceleration and spin rate), so
//! that the central body is integrated with the bodies and total momentum is
//! conserved.

use crate::configuration::config::PerturbationFlags;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, CentralBody, NVec3};

/// State of the central body seen by every term during one evaluation
pub struct CentralFrame<'a> {
    pub t: f64,
    pub central: &'a CentralBody,
    pub disk_mass: f64, // inner fluid disk, co-moving with the central body
}

impl CentralFrame<'_> {
    /// Mass attracting the bodies: central body plus inner disk
    pub fn gravitational_mass(&self) -> f64 {
        self.central.m + self.disk_mass
    }
}

/// Back reaction of the bodies on the central body
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CentralResponse {
    pub acceleration: NVec3,
    pub spin_rate: NVec3,
}

/// Trait for perturbation sources.
/// Implementations add their contribution into `out[i]` for each body
pub trait Perturbation {
    fn name(&self) -> &'static str;

    fn acceleration(&self, frame: &CentralFrame, bodies: &[Body], out: &mut [NVec3], response: &mut CentralResponse);
}

/// Collection of perturbation terms
pub struct PerturbationSet {
    terms: Vec<Box<dyn Perturbation + Send + Sync>>,
}

impl Default for PerturbationSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PerturbationSet {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Add a perturbation term
    pub fn with(mut self, term: impl Perturbation + Send + Sync + 'static) -> Self {
        self.terms.push(Box::new(term));
        self
    }

    /// Terms switched on by the engine flags.
    ///
    /// The Keplerian term is always present when there is a central mass.
    pub fn from_flags(central_mass: bool, flags: &PerturbationFlags, params: &Parameters) -> Self {
        let mut set = Self::new();
        if central_mass {
            set = set.with(Kepler { G: params.G });
            if flags.j2 {
                set = set.with(Oblateness {
                    G: params.G,
                    j2_value: params.central.j2_value,
                    critical_frequency: params.surface_frequency(),
                });
            }
            if flags.central_tides {
                set = set.with(Tides {
                    G: params.G,
                    k2: params.central.k2,
                    time_lag: params.central.delta_t * params.surface_period(),
                    dimensionless_moi: params.central.dimensionless_moi,
                });
            }
        }
        if flags.sun {
            set = set.with(DistantStar::new(params));
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.terms.iter().map(|t| t.name()).collect()
    }

    /// Sum the contributions of all terms.
    /// - `out[i]` is set (not added to) for every body
    pub fn accumulate_accels(&self, frame: &CentralFrame, bodies: &[Body], out: &mut [NVec3]) -> CentralResponse {
        for a in out.iter_mut() {
            *a = NVec3::zeros();
        }
        let mut response = CentralResponse::default();
        for term in &self.terms {
            term.acceleration(frame, bodies, out, &mut response);
        }
        response
    }
}

// terms ==================================================================================

/// Point-mass gravity of the central body and its inner disk, with the
/// bodies' pull back on the central body
pub struct Kepler {
    pub G: f64,
}

impl Perturbation for Kepler {
    fn name(&self) -> &'static str {
        "kepler"
    }

    fn acceleration(&self, frame: &CentralFrame, bodies: &[Body], out: &mut [NVec3], response: &mut CentralResponse) {
        let gm = self.G * frame.gravitational_mass();
        for (b, a) in bodies.iter().zip(out.iter_mut()) {
            let r = b.x - frame.central.x;
            let r2 = r.norm_squared();
            if r2 == 0.0 {
                continue;
            }
            let inv_r3 = r2.sqrt().recip() / r2;
            *a -= gm * inv_r3 * r;
            response.acceleration += self.G * b.m * inv_r3 * r;
        }
    }
}

/// Oblateness of the central body, about its spin axis.
///
/// `J2 = j2_value`, or for a fluid body `½ |Ω|² / Ω_crit²` with `Ω_crit` the
/// surface orbital frequency, re-evaluated as the spin evolves.
pub struct Oblateness {
    pub G: f64,
    pub j2_value: f64,
    pub critical_frequency: f64,
}

impl Oblateness {
    pub fn j2(&self, central: &CentralBody) -> f64 {
        if self.j2_value > 0.0 {
            self.j2_value
        } else {
            0.5 * central.spin.norm_squared() / (self.critical_frequency * self.critical_frequency)
        }
    }
}

impl Perturbation for Oblateness {
    fn name(&self) -> &'static str {
        "J2"
    }

    fn acceleration(&self, frame: &CentralFrame, bodies: &[Body], out: &mut [NVec3], response: &mut CentralResponse) {
        let central = frame.central;
        let axis = if central.spin.norm() > 0.0 { central.spin.normalize() } else { NVec3::z() };
        let coef = -1.5 * self.j2(central) * self.G * central.m * central.radius * central.radius;

        for (b, a) in bodies.iter().zip(out.iter_mut()) {
            let r = b.x - central.x;
            let r2 = r.norm_squared();
            if r2 == 0.0 {
                continue;
            }
            let z = r.dot(&axis);
            let r5 = r2 * r2 * r2.sqrt();
            let acc = coef / r5 * (r * (1.0 - 5.0 * z * z / r2) + 2.0 * z * axis);
            *a += acc;
            response.acceleration -= b.m * acc / frame.gravitational_mass();
        }
    }
}

/// Constant time-lag tides raised on the central body (Mignard 1979).
///
/// The force on a body of mass `m` at `r` with velocity `v` reads
///
/// ```text
/// F = -(3 k₂ G m² R⁵ / r⁸) [ r + (Δt / r²) (2 r (r·v) + r² (r × Ω + v)) ]
/// ```
///
/// The central body gets `-F` and the torque `-r × F` on its spin. Forces on
/// the central body are shared with the inner disk that moves along with it.
pub struct Tides {
    pub G: f64,
    pub k2: f64,
    pub time_lag: f64,
    pub dimensionless_moi: f64,
}

impl Perturbation for Tides {
    fn name(&self) -> &'static str {
        "tides"
    }

    fn acceleration(&self, frame: &CentralFrame, bodies: &[Body], out: &mut [NVec3], response: &mut CentralResponse) {
        let central = frame.central;
        let r5 = central.radius.powi(5);
        let inertia = self.dimensionless_moi * central.m * central.radius * central.radius;

        for (b, a) in bodies.iter().zip(out.iter_mut()) {
            let r = b.x - central.x;
            let v = b.v - central.v;
            let r2 = r.norm_squared();
            if r2 == 0.0 {
                continue;
            }
            let r8 = r2 * r2 * r2 * r2;
            let lagged = r + self.time_lag / r2 * (2.0 * r * r.dot(&v) + r2 * (r.cross(&central.spin) + v));
            let force = -3.0 * self.k2 * self.G * b.m * b.m * r5 / r8 * lagged;

            *a += force / b.m;
            response.acceleration -= force / frame.gravitational_mass();
            response.spin_rate -= r.cross(&force) / inertia;
        }
    }
}

/// A distant star on a circular orbit around the central body, inclined by
/// the obliquity on the reference plane. Direct minus indirect term.
pub struct DistantStar {
    pub G: f64,
    pub mass: f64,
    pub semi_major: f64,
    pub mean_motion: f64,
    pub obliquity: f64,
}

impl DistantStar {
    pub fn new(params: &Parameters) -> Self {
        let c = &params.central;
        Self {
            G: params.G,
            mass: c.star_mass,
            semi_major: c.star_semi_major,
            mean_motion: (params.G * (c.star_mass + c.m_unit) / c.star_semi_major.powi(3)).sqrt(),
            obliquity: c.obliquity,
        }
    }

    /// Position of the star relative to the central body at time `t`
    pub fn position(&self, t: f64) -> NVec3 {
        let (s, c) = (self.mean_motion * t).sin_cos();
        let (si, ci) = self.obliquity.sin_cos();
        self.semi_major * NVec3::new(c, s * ci, s * si)
    }
}

impl Perturbation for DistantStar {
    fn name(&self) -> &'static str {
        "distant star"
    }

    fn acceleration(&self, frame: &CentralFrame, bodies: &[Body], out: &mut [NVec3], _response: &mut CentralResponse) {
        let star = self.position(frame.t);
        let gm = self.G * self.mass;
        let indirect = gm * star / star.norm().powi(3);
        for (b, a) in bodies.iter().zip(out.iter_mut()) {
            let d = star - (b.x - frame.central.x);
            *a += gm * d / d.norm().powi(3) - indirect;
        }
    }
}
