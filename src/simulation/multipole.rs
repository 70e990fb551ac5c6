//! # Cartesian multipole expansions
//!
//! Far-field gravity in the tree codes is carried by Cartesian Taylor
//! expansions of the Green's function `1/r`, indexed by multi-indices
//! `n = (a, b, c)` with `|n| = a + b + c`.
//!
//! - multipole of a cell about its expansion center `z`:
//!   `M_n = Σ m_i (x_i - z)^n / n!`
//! - derivative tensor of the Green's function: `D_n(R) = ∂^n (1 / |R|)`
//! - local (Taylor) coefficients of the potential about a center `z`:
//!   `Φ(z + y) = Σ L_n y^n`
//!
//! With `Φ(x) = -G Σ m_i / |x - x_i|`, the interaction of a source cell A with
//! a sink cell B reads
//!
//! ```text
//! L_B,β = -G / β! Σ_{|α| ≤ p - |β|} (-1)^|α| M_A,α D_{α+β}(z_B - z_A)
//! ```
//!
//! The truncation `|α| + |β| ≤ p` makes the interaction symmetric in A and B,
//! so the same derivative tensor serves both directions and the pair exerts
//! equal and opposite forces (Dehnen 2002).
//!
//! The derivative tensors come from the recurrence
//!
//! ```text
//! |n| R² D_n = -(2|n| - 1) Σ_i n_i R_i D_{n - e_i} - (|n| - 1) Σ_i n_i (n_i - 1) D_{n - 2e_i}
//! ```

use crate::simulation::states::NVec3;

/// Enumeration of all multi-indices up to a maximal order.
///
/// Terms are sorted by order, so the terms of order `≤ k` form the prefix
/// `0..len_for_order(k)` of every coefficient array.
#[derive(Debug, Clone)]
pub struct MultiIndexTable {
    max_order: usize,
    terms: Vec<[usize; 3]>,
    orders: Vec<usize>,
    lookup: Vec<usize>,
    fact: Vec<f64>, // a! b! c!
    inv_fact: Vec<f64>, // 1 / (a! b! c!)
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

impl MultiIndexTable {
    pub fn new(max_order: usize) -> Self {
        let k = max_order + 1;
        let mut terms = Vec::with_capacity(Self::len_for_order(max_order));
        let mut lookup = vec![usize::MAX; k * k * k];

        for n in 0..=max_order {
            for a in (0..=n).rev() {
                for b in (0..=(n - a)).rev() {
                    let c = n - a - b;
                    lookup[(a * k + b) * k + c] = terms.len();
                    terms.push([a, b, c]);
                }
            }
        }

        let orders = terms.iter().map(|t| t[0] + t[1] + t[2]).collect();
        let fact: Vec<f64> = terms
            .iter()
            .map(|t| factorial(t[0]) * factorial(t[1]) * factorial(t[2]))
            .collect();
        let inv_fact = fact.iter().map(|f| 1.0 / f).collect();

        Self { max_order, terms, orders, lookup, fact, inv_fact }
    }

    /// Number of multi-indices of order at most `order`
    pub const fn len_for_order(order: usize) -> usize {
        (order + 1) * (order + 2) * (order + 3) / 6
    }

    pub fn max_order(&self) -> usize {
        self.max_order
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term(&self, k: usize) -> [usize; 3] {
        self.terms[k]
    }

    pub fn order_of(&self, k: usize) -> usize {
        self.orders[k]
    }

    #[inline]
    pub fn index(&self, a: usize, b: usize, c: usize) -> usize {
        let k = self.max_order + 1;
        self.lookup[(a * k + b) * k + c]
    }

    /// Monomials `d^n` for every term of order `≤ order`
    pub fn monomials(&self, d: &NVec3, order: usize, out: &mut [f64]) {
        let mut px = [1.0; 16];
        let mut py = [1.0; 16];
        let mut pz = [1.0; 16];
        for i in 1..=order {
            px[i] = px[i - 1] * d.x;
            py[i] = py[i - 1] * d.y;
            pz[i] = pz[i - 1] * d.z;
        }
        for k in 0..Self::len_for_order(order) {
            let [a, b, c] = self.terms[k];
            out[k] = px[a] * py[b] * pz[c];
        }
    }

    /// Derivative tensor `D_n(r) = ∂^n (1/|r|)` for every term of order `≤ order`
    pub fn derivatives(&self, r: &NVec3, order: usize, out: &mut [f64]) {
        let inv_r2 = 1.0 / r.norm_squared();
        out[0] = inv_r2.sqrt();
        let comps = [r.x, r.y, r.z];

        for k in 1..Self::len_for_order(order) {
            let t = self.terms[k];
            let n = self.orders[k] as f64;
            let mut first = 0.0;
            let mut second = 0.0;
            for axis in 0..3 {
                let ni = t[axis];
                if ni == 0 {
                    continue;
                }
                let mut lower = t;
                lower[axis] -= 1;
                first += ni as f64 * comps[axis] * out[self.index(lower[0], lower[1], lower[2])];
                if ni > 1 {
                    lower[axis] -= 1;
                    second += (ni * (ni - 1)) as f64 * out[self.index(lower[0], lower[1], lower[2])];
                }
            }
            out[k] = -((2.0 * n - 1.0) * first + (n - 1.0) * second) * inv_r2 / n;
        }
    }

    /// Add the multipole of a point mass `m` at offset `d` from the center
    pub fn add_point_mass(&self, m: f64, d: &NVec3, order: usize, scratch: &mut [f64], moments: &mut [f64]) {
        self.monomials(d, order, scratch);
        for k in 0..Self::len_for_order(order) {
            moments[k] += m * scratch[k] * self.inv_fact[k];
        }
    }

    /// Shift a multipole from a child center to a parent center (M2M)
    ///
    /// `d = z_child - z_parent`.
    pub fn translate_multipole(&self, child: &[f64], d: &NVec3, order: usize, scratch: &mut [f64], parent: &mut [f64]) {
        self.monomials(d, order, scratch);
        for k in 0..Self::len_for_order(order) {
            let [a, b, c] = self.terms[k];
            let mut sum = 0.0;
            for ga in 0..=a {
                for gb in 0..=b {
                    for gc in 0..=c {
                        let g = self.index(ga, gb, gc);
                        let rest = self.index(a - ga, b - gb, c - gc);
                        sum += child[g] * scratch[rest] * self.inv_fact[rest];
                    }
                }
            }
            parent[k] += sum;
        }
    }

    /// Shift local coefficients from a parent center to a child center (L2L)
    ///
    /// `s = z_child - z_parent`.
    pub fn translate_local(&self, parent: &[f64], s: &NVec3, order: usize, scratch: &mut [f64], child: &mut [f64]) {
        self.monomials(s, order, scratch);
        for k in 0..Self::len_for_order(order) {
            let [a, b, c] = self.terms[k];
            let lb = parent[k] * self.fact[k];
            if lb == 0.0 {
                continue;
            }
            for ga in 0..=a {
                for gb in 0..=b {
                    for gc in 0..=c {
                        let g = self.index(ga, gb, gc);
                        let rest = self.index(a - ga, b - gb, c - gc);
                        child[g] += lb * self.inv_fact[g] * scratch[rest] * self.inv_fact[rest];
                    }
                }
            }
        }
    }

    /// Mutual multipole-multipole interaction of two well-separated cells (M2L).
    ///
    /// `r = z_b - z_a`. Local coefficients are accumulated into both `la` and
    /// `lb` from a single derivative tensor.
    #[allow(clippy::too_many_arguments)]
    pub fn interact_mutual(
        &self,
        order: usize,
        ma: &[f64],
        mb: &[f64],
        r: &NVec3,
        G: f64,
        d: &mut [f64],
        la: &mut [f64],
        lb: &mut [f64],
    ) {
        self.derivatives(r, order, d);
        for kb in 0..Self::len_for_order(order) {
            let [ba, bb, bc] = self.terms[kb];
            let beta_order = self.orders[kb];
            let mut into_b = 0.0;
            let mut into_a = 0.0;
            for ka in 0..Self::len_for_order(order - beta_order) {
                let [aa, ab, ac] = self.terms[ka];
                let dab = d[self.index(aa + ba, ab + bb, ac + bc)];
                if self.orders[ka] % 2 == 0 {
                    into_b += ma[ka] * dab;
                } else {
                    into_b -= ma[ka] * dab;
                }
                into_a += mb[ka] * dab;
            }
            let sign_beta = if beta_order % 2 == 0 { 1.0 } else { -1.0 };
            lb[kb] -= G * self.inv_fact[kb] * into_b;
            la[kb] -= G * sign_beta * self.inv_fact[kb] * into_a;
        }
    }

    /// Acceleration `-∇Φ` at offset `y` from the center of a local expansion
    pub fn local_acceleration(&self, local: &[f64], y: &NVec3, order: usize, scratch: &mut [f64]) -> NVec3 {
        self.monomials(y, order.saturating_sub(1), scratch);
        let mut acc = NVec3::zeros();
        for k in 1..Self::len_for_order(order) {
            let [a, b, c] = self.terms[k];
            let l = local[k];
            if a > 0 {
                acc.x -= l * a as f64 * scratch[self.index(a - 1, b, c)];
            }
            if b > 0 {
                acc.y -= l * b as f64 * scratch[self.index(a, b - 1, c)];
            }
            if c > 0 {
                acc.z -= l * c as f64 * scratch[self.index(a, b, c - 1)];
            }
        }
        acc
    }

    /// Acceleration at offset `r = x - z` from a multipole of order `order`.
    ///
    /// Needs a table built for at least `order + 1`.
    pub fn multipole_acceleration(&self, moments: &[f64], r: &NVec3, order: usize, G: f64, d: &mut [f64]) -> NVec3 {
        self.derivatives(r, order + 1, d);
        let mut acc = NVec3::zeros();
        for k in 0..Self::len_for_order(order) {
            let [a, b, c] = self.terms[k];
            let m = if self.orders[k] % 2 == 0 { moments[k] } else { -moments[k] };
            if m == 0.0 {
                continue;
            }
            acc.x += m * d[self.index(a + 1, b, c)];
            acc.y += m * d[self.index(a, b + 1, c)];
            acc.z += m * d[self.index(a, b, c + 1)];
        }
        acc * G
    }
}
