use crate::core::constants::{GAS_CONSTANT, ZERO_CELSIUS};
use serde::Deserialize;

const T_REF: f32 = ZERO_CELSIUS + 25.0;

// Bernacchi et al. (2001) kinetic constants at 25 °C and activation energies (kJ mol⁻¹).
const KC_25: f32 = 404.9;
const KC_HA: f32 = 79.43;
const KO_25: f32 = 278.4;
const KO_HA: f32 = 36.38;
const GAMMA_25: f32 = 42.75;
const GAMMA_HA: f32 = 37.83;
const JMAX_HA: f32 = 43.9;
const RD_HA: f32 = 46.39;

const CI_MAX: f32 = 2000.0;

/// Arrhenius scaling of a rate from 25 °C to `t_kelvin`.
fn arrhenius(activation_kj: f32, t_kelvin: f32) -> f32 {
    (activation_kj * 1000.0 / GAS_CONSTANT * (1.0 / T_REF - 1.0 / t_kelvin)).exp()
}

/// Coefficients of the Farquhar–von Caemmerer–Berry model at 25 °C.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FarquharCoefficients {
    pub vcmax: f32,
    pub jmax: f32,
    pub rd: f32,
    pub alpha: f32,
    pub theta: f32,
    pub o2: f32,
    /// Triose-phosphate utilization rate; zero disables the limitation.
    pub tpu: f32,
    pub ha_vcmax: f32,
}

impl Default for FarquharCoefficients {
    fn default() -> Self {
        Self {
            vcmax: 100.0,
            jmax: 180.0,
            rd: 1.5,
            alpha: 0.36,
            theta: 0.7,
            o2: 213.5,
            tpu: 0.0,
            ha_vcmax: 65.33,
        }
    }
}

impl FarquharCoefficients {
    pub const LEN: usize = 8;

    pub fn from_array(v: [f32; Self::LEN]) -> Self {
        Self {
            vcmax: v[0],
            jmax: v[1],
            rd: v[2],
            alpha: v[3],
            theta: v[4],
            o2: v[5],
            tpu: v[6],
            ha_vcmax: v[7],
        }
    }

    pub fn to_array(&self) -> [f32; Self::LEN] {
        [
            self.vcmax,
            self.jmax,
            self.rd,
            self.alpha,
            self.theta,
            self.o2,
            self.tpu,
            self.ha_vcmax,
        ]
    }
}

/// Coefficients of the empirical light/temperature/CO₂ response model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmpiricalCoefficients {
    pub t_ref: f32,
    pub ci_ref: f32,
    pub asat: f32,
    /// Half-saturation PAR, µmol m⁻² s⁻¹.
    pub theta: f32,
    pub t_min: f32,
    pub t_opt: f32,
    pub q: f32,
    /// Respiration at `t_ref`.
    pub r: f32,
    /// Respiration activation energy, kJ mol⁻¹.
    pub er: f32,
    pub k_c: f32,
}

impl Default for EmpiricalCoefficients {
    fn default() -> Self {
        Self {
            t_ref: 298.0,
            ci_ref: 290.0,
            asat: 18.18,
            theta: 62.03,
            t_min: 290.0,
            t_opt: 303.0,
            q: 0.344,
            r: 1.0,
            er: 46.39,
            k_c: 0.0,
        }
    }
}

impl EmpiricalCoefficients {
    pub const LEN: usize = 10;

    pub fn from_array(v: [f32; Self::LEN]) -> Self {
        Self {
            t_ref: v[0],
            ci_ref: v[1],
            asat: v[2],
            theta: v[3],
            t_min: v[4],
            t_opt: v[5],
            q: v[6],
            r: v[7],
            er: v[8],
            k_c: v[9],
        }
    }

    pub fn to_array(&self) -> [f32; Self::LEN] {
        [
            self.t_ref,
            self.ci_ref,
            self.asat,
            self.theta,
            self.t_min,
            self.t_opt,
            self.q,
            self.r,
            self.er,
            self.k_c,
        ]
    }
}

/// Leaf environment seen by the photosynthesis models.
#[derive(Debug, Clone, Copy)]
pub struct LeafState {
    /// Absorbed PAR, µmol m⁻² s⁻¹.
    pub par: f32,
    pub temperature: f32,
    /// Ambient CO₂, µmol mol⁻¹.
    pub co2: f32,
    /// Stomatal conductance to water vapour, mol m⁻² s⁻¹.
    pub gs: f32,
    /// Boundary-layer conductance to heat, mol m⁻² s⁻¹.
    pub gb: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assimilation {
    pub net: f32,
    pub ci: f32,
    /// 0 Rubisco-limited, 1 electron-transport-limited, 2 TPU-limited.
    pub limitation: i32,
    pub gamma_star: f32,
}

fn electron_transport(c: &FarquharCoefficients, par: f32, jmax: f32) -> f32 {
    let i = c.alpha * par.max(0.0);
    if c.theta <= 0.0 {
        return i.min(jmax);
    }
    let b = i + jmax;
    (b - (b * b - 4.0 * c.theta * i * jmax).max(0.0).sqrt()) / (2.0 * c.theta)
}

/// Net assimilation at a given intercellular CO₂.
pub fn farquhar_at_ci(c: &FarquharCoefficients, leaf: &LeafState, ci: f32) -> Assimilation {
    let t = leaf.temperature;
    let kc = KC_25 * arrhenius(KC_HA, t);
    let ko = KO_25 * arrhenius(KO_HA, t);
    let gamma_star = GAMMA_25 * arrhenius(GAMMA_HA, t);
    let vcmax = c.vcmax * arrhenius(c.ha_vcmax, t);
    let jmax = c.jmax * arrhenius(JMAX_HA, t);
    let rd = c.rd * arrhenius(RD_HA, t);

    let wc = vcmax * (ci - gamma_star) / (ci + kc * (1.0 + c.o2 / ko));
    let j = electron_transport(c, leaf.par, jmax);
    let wj = j * (ci - gamma_star) / (4.0 * ci + 8.0 * gamma_star);
    let wp = if c.tpu > 0.0 { 3.0 * c.tpu } else { f32::INFINITY };

    let (gross, limitation) = [(wc, 0), (wj, 1), (wp, 2)]
        .into_iter()
        .fold((f32::INFINITY, 0), |best, cur| if cur.0 < best.0 { cur } else { best });
    Assimilation {
        net: gross - rd,
        ci,
        limitation,
        gamma_star,
    }
}

/// Total CO₂ conductance from stomatal and boundary-layer conductances.
fn co2_conductance(leaf: &LeafState) -> f32 {
    let mut resistance = 0.0;
    if leaf.gs > 0.0 {
        resistance += 1.6 / leaf.gs;
    } else {
        return 0.0;
    }
    if leaf.gb > 0.0 {
        resistance += 1.37 / leaf.gb;
    }
    1.0 / resistance
}

/// Solves `A(Ci) = g (Ca − Ci)` for Ci by bisection and returns the assimilation there.
pub fn farquhar(c: &FarquharCoefficients, leaf: &LeafState) -> Assimilation {
    let g = co2_conductance(leaf);
    let residual = |ci: f32| farquhar_at_ci(c, leaf, ci).net - g * (leaf.co2 - ci);
    let (mut lo, mut hi) = (0.0f32, leaf.co2.max(0.0) + CI_MAX);
    if residual(hi) < 0.0 {
        return farquhar_at_ci(c, leaf, hi);
    }
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if residual(mid) > 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
        if hi - lo < 1e-3 {
            break;
        }
    }
    farquhar_at_ci(c, leaf, 0.5 * (lo + hi))
}

/// Empirical model `A = Asat fL fT fC − Rd` with Ci fixed at 70 % of ambient.
pub fn empirical(c: &EmpiricalCoefficients, leaf: &LeafState) -> Assimilation {
    let par = leaf.par.max(0.0);
    let f_light = par / (c.theta + par);
    let x = (leaf.temperature - c.t_min) / (c.t_opt - c.t_min);
    let f_temp = if x > 0.0 {
        x.powf(c.q) * (c.q * (1.0 - x)).exp()
    } else {
        0.0
    };
    let ci = 0.7 * leaf.co2;
    let f_co2 = if c.k_c > 0.0 && c.ci_ref > 0.0 {
        (ci / c.ci_ref).max(0.0).powf(c.k_c)
    } else {
        1.0
    };
    let rd = c.r * (c.er * 1000.0 / GAS_CONSTANT * (1.0 / c.t_ref - 1.0 / leaf.temperature)).exp();
    Assimilation {
        net: c.asat * f_light * f_temp * f_co2 - rd,
        ci,
        limitation: 0,
        gamma_star: GAMMA_25 * arrhenius(GAMMA_HA, leaf.temperature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(par: f32) -> LeafState {
        LeafState {
            par,
            temperature: 298.15,
            co2: 400.0,
            gs: 0.3,
            gb: 1.0,
        }
    }

    #[test]
    fn farquhar_increases_with_light_and_saturates() {
        let c = FarquharCoefficients::default();
        let dark = farquhar(&c, &leaf(0.0));
        let dim = farquhar(&c, &leaf(200.0));
        let bright = farquhar(&c, &leaf(1500.0));
        assert!(dark.net < 0.0);
        assert!(dim.net > dark.net);
        assert!(bright.net > dim.net);
        assert!(bright.net < c.vcmax);
    }

    #[test]
    fn farquhar_solution_satisfies_the_supply_equation() {
        let c = FarquharCoefficients::default();
        let l = leaf(1000.0);
        let a = farquhar(&c, &l);
        let g = 1.0 / (1.6 / l.gs + 1.37 / l.gb);
        assert!((a.net - g * (l.co2 - a.ci)).abs() < 0.05);
        assert!(a.ci > a.gamma_star && a.ci < l.co2);
    }

    #[test]
    fn tpu_limitation_is_reported() {
        let c = FarquharCoefficients {
            tpu: 2.0,
            ..FarquharCoefficients::default()
        };
        let a = farquhar(&c, &leaf(2000.0));
        assert_eq!(a.limitation, 2);
    }

    #[test]
    fn empirical_peaks_at_optimum_temperature() {
        let c = EmpiricalCoefficients::default();
        let mut l = leaf(1000.0);
        l.temperature = c.t_opt;
        let at_opt = empirical(&c, &l);
        l.temperature = c.t_opt + 8.0;
        let hot = empirical(&c, &l);
        assert!(at_opt.net > hot.net);
        l.temperature = c.t_min - 1.0;
        assert!(empirical(&c, &l).net < 0.0);
    }

    #[test]
    fn coefficient_arrays_round_trip() {
        let c = FarquharCoefficients::default();
        assert_eq!(FarquharCoefficients::from_array(c.to_array()), c);
        let e = EmpiricalCoefficients::default();
        assert_eq!(EmpiricalCoefficients::from_array(e.to_array()), e);
    }
}
