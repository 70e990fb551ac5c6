//! # Fragmentation model
//!
//! The more massive body is the target, the other the impactor, and
//! `M = m_t + m_i` is the total mass. The mass ejected by the impact follows
//! the crater scaling law
//!
//! ```text
//! m̃ = (3k / 4π) m_i (ρ_t / ρ_i)^(1 - 3μν) (C₁ v_imp / v_esc)^(3μ),
//! v_esc = sqrt(2 G M / (R_t + R_i))
//! ```
//!
//! - `m̃ / M < 0.9`: cratering, the largest remnant keeps `m_lr = M - m̃`
//! - `m̃ / M ≥ 0.9`: super-catastrophic (disruption),
//!   `m_lr = 0.1 M (m̃ / 0.9 M)^(-3/2)`
//!
//! The rest `M - m_lr` goes into a tail. With `Ñ` tail fragments, the second
//! largest fragment has mass `m_slr = (M - m_lr) / Ñ`, and
//!
//! - `M - m_lr < frag_threshold`: the impact is treated as a merger
//! - `m_slr < frag_threshold`: partial fragmentation, the tail is one body
//! - otherwise full fragmentation: largest remnant, second largest and `Ñ`
//!   tail fragments laid on the integer grid `[p_min, p_max] × [q_min, q_max]`
//!
//! Fragments are placed outward along the impact normal, the tail grid
//! spreading tangentially in the direction of the impactor's relative
//! velocity. Their ejection speed is capped so that the kinetic energy in the
//! centre-of-mass frame never increases, and the largest remnant absorbs the
//! recoil so that the centre of mass and the momentum are conserved exactly.

use log::warn;

use crate::configuration::config::CollisionConfig;
use crate::simulation::collision::{merge, Outcome, OutcomeKind};
use crate::simulation::states::{radius_from_mass, sphere_volume, Body, NVec3};

const DISRUPTION_RATIO: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct FragmentationModel {
    pub n_tilde: usize,
    pub mu: f64,
    pub nu: f64,
    pub c1: f64,
    pub k: f64,
    pub threshold: f64,
    pub pq: [i32; 4],
    pub G: f64,
}

/// Masses decided by the ejecta law, before placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentMasses {
    pub ejected: f64, // m̃
    pub largest: f64, // m_lr
    pub second: f64, // m_slr
    pub disruption: bool,
}

impl FragmentationModel {
    pub fn new(cfg: &CollisionConfig, G: f64) -> Self {
        Self {
            n_tilde: cfg.n_tilde,
            mu: cfg.mu_parameter,
            nu: cfg.nu_parameter,
            c1: cfg.c1_parameter,
            k: cfg.k_parameter,
            threshold: cfg.frag_threshold,
            pq: cfg.pq_min_max,
            G,
        }
    }

    /// Ejected mass and remnant masses for a target / impactor pair
    pub fn masses(&self, target: &Body, impactor: &Body) -> FragmentMasses {
        let total = target.m + impactor.m;
        let v_esc = (2.0 * self.G * total / (target.radius + impactor.radius)).sqrt();
        let v_imp = (impactor.v - target.v).norm();

        let density_ratio = target.density() / impactor.density();
        let ejected = 3.0 * self.k / (4.0 * std::f64::consts::PI)
            * impactor.m
            * density_ratio.powf(1.0 - 3.0 * self.mu * self.nu)
            * (self.c1 * v_imp / v_esc).powf(3.0 * self.mu);

        let disruption = ejected / total >= DISRUPTION_RATIO;
        let largest = if disruption {
            0.1 * total * (ejected / (DISRUPTION_RATIO * total)).powf(-1.5)
        } else {
            total - ejected
        };
        let second = (total - largest) / self.n_tilde as f64;

        FragmentMasses { ejected, largest, second, disruption }
    }

    pub fn resolve(&self, b1: &Body, b2: &Body) -> Outcome {
        let (target, impactor) = if b1.m >= b2.m { (b1, b2) } else { (b2, b1) };
        let total = b1.m + b2.m;
        let masses = self.masses(target, impactor);

        let valid = [masses.ejected, masses.largest, masses.second]
            .iter()
            .all(|m| m.is_finite())
            && masses.largest > 0.0
            && masses.largest <= total;
        if !valid {
            warn!(
                "fragmentation produced invalid masses (ejected {:e}, largest {:e}) for a total of {:e}; merging instead",
                masses.ejected, masses.largest, total
            );
            return merger(b1, b2, masses.disruption);
        }

        let tail = total - masses.largest;
        if tail < self.threshold {
            return merger(b1, b2, masses.disruption);
        }

        let kind;
        let mut fragments: Vec<(f64, NVec3)> = Vec::new(); // mass and offset from the largest remnant
        let density = total / (sphere_volume(b1.radius) + sphere_volume(b2.radius));
        let r_lr = radius_from_mass(masses.largest, density);
        let normal = unit_or(impactor.x - target.x, NVec3::x());
        let tangent = tangent_to(&normal, &(impactor.v - target.v));

        if masses.second < self.threshold || self.n_tilde == 0 {
            kind = OutcomeKind::PartialFragmentation;
            let r_tail = radius_from_mass(tail, density);
            fragments.push((tail, normal * 1.01 * (r_lr + r_tail)));
        } else {
            kind = OutcomeKind::FullFragmentation;
            let r_slr = radius_from_mass(masses.second, density);
            fragments.push((masses.second, normal * 1.01 * (r_lr + r_slr)));

            let m_tail = (tail - masses.second) / self.n_tilde as f64;
            let r_tail = radius_from_mass(m_tail, density);
            let spacing = 2.02 * r_tail;
            let base = 1.01 * (r_lr + 2.0 * r_slr + r_tail);
            let [p_min, p_max, q_min, q_max] = self.pq;
            for p in p_min..=p_max {
                for q in q_min..=q_max {
                    let along = base + spacing * (p - p_min) as f64;
                    fragments.push((m_tail, normal * along + tangent * spacing * q as f64));
                }
            }
        }

        if fragments.iter().any(|(m, _)| !m.is_finite() || *m <= 0.0) {
            warn!("fragmentation produced a non-positive fragment mass; merging instead");
            return merger(b1, b2, masses.disruption);
        }

        let bodies = self.place(b1, b2, masses.largest, r_lr, density, &fragments);
        Outcome {
            kind,
            disruption: masses.disruption,
            bodies,
        }
    }

    /// Positions and velocities of the largest remnant and the fragments.
    ///
    /// Fragments leave the largest remnant along their offset at a common
    /// speed `u`; the largest remnant is placed and kicked so that the centre
    /// of mass and the momentum of the pair are unchanged.
    fn place(&self, b1: &Body, b2: &Body, m_lr: f64, r_lr: f64, density: f64, fragments: &[(f64, NVec3)]) -> Vec<Body> {
        let total = b1.m + b2.m;
        let x_cm = (b1.m * b1.x + b2.m * b2.x) / total;
        let v_cm = (b1.m * b1.v + b2.m * b2.v) / total;
        let a_cm = (b1.m * b1.a + b2.m * b2.a) / total;

        let dirs: Vec<NVec3> = fragments.iter().map(|(_, ofs)| unit_or(*ofs, NVec3::x())).collect();

        let weighted_ofs: NVec3 = fragments.iter().map(|(m, ofs)| *m * ofs).sum();
        let weighted_dir: NVec3 = fragments.iter().zip(&dirs).map(|((m, _), d)| *m * d).sum();

        // velocities relative to the centre of mass, per unit ejection speed
        let w_lr = -weighted_dir / total;
        let mut k1 = 0.5 * m_lr * w_lr.norm_squared();
        for ((m, _), d) in fragments.iter().zip(&dirs) {
            k1 += 0.5 * m * (d + w_lr).norm_squared();
        }

        let reduced = b1.m * b2.m / total;
        let ke_before = 0.5 * reduced * (b1.v - b2.v).norm_squared();
        let v_esc = (2.0 * self.G * total / (b1.radius + b2.radius)).sqrt();
        let u = if k1 > 0.0 { v_esc.min((ke_before / k1).sqrt()) } else { 0.0 };

        let x_lr = x_cm - weighted_ofs / total;
        let v_lr = v_cm + u * w_lr;

        let mut largest = Body::new(x_lr, v_lr, m_lr, r_lr);
        largest.a = a_cm;
        let mut bodies = Vec::with_capacity(1 + fragments.len());
        bodies.push(largest);
        for ((m, ofs), d) in fragments.iter().zip(&dirs) {
            let mut b = Body::new(x_lr + ofs, v_lr + u * d, *m, radius_from_mass(*m, density));
            b.a = a_cm;
            bodies.push(b);
        }
        bodies
    }
}

fn merger(b1: &Body, b2: &Body, disruption: bool) -> Outcome {
    Outcome {
        kind: OutcomeKind::Merger,
        disruption,
        bodies: vec![merge(b1, b2)],
    }
}

fn unit_or(v: NVec3, fallback: NVec3) -> NVec3 {
    let n = v.norm();
    if n > 0.0 && n.is_finite() { v / n } else { fallback }
}

/// Unit vector orthogonal to `normal`, in the direction of the tangential
/// part of `v` when there is one
fn tangent_to(normal: &NVec3, v: &NVec3) -> NVec3 {
    let t = v - normal * normal.dot(v);
    if t.norm() > 1e-12 * v.norm() && t.norm() > 0.0 {
        return t.normalize();
    }
    let helper = if normal.x.abs() < 0.9 { NVec3::x() } else { NVec3::y() };
    normal.cross(&helper).normalize()
}
