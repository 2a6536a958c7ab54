/// Stefan-Boltzmann constant (W m⁻² K⁻⁴).
pub const STEFAN_BOLTZMANN: f32 = 5.670_374e-8;

/// Molar heat capacity of air at constant pressure (J mol⁻¹ K⁻¹).
pub const CP_AIR_MOLAR: f32 = 29.25;

/// Latent heat of vaporization of water (J mol⁻¹).
pub const LAMBDA_WATER_MOLAR: f32 = 44_000.0;

/// Universal gas constant (J mol⁻¹ K⁻¹).
pub const GAS_CONSTANT: f32 = 8.314_46;

/// Conversion factor from PAR energy flux (W m⁻²) to photon flux (µmol m⁻² s⁻¹).
pub const PAR_W_TO_UMOL: f32 = 4.57;

/// Solar constant at mean Earth-Sun distance (W m⁻²).
pub const SOLAR_CONSTANT: f32 = 1360.8;

/// Standard sea-level atmospheric pressure (Pa).
pub const STANDARD_PRESSURE: f32 = 101_325.0;

/// 0 °C in Kelvin.
pub const ZERO_CELSIUS: f32 = 273.15;

/// Saturation vapor pressure over water (Pa) at temperature `t_kelvin` (Tetens formula).
pub fn saturation_vapor_pressure(t_kelvin: f32) -> f32 {
    let t_c = t_kelvin - ZERO_CELSIUS;
    611.0 * (17.502 * t_c / (t_c + 240.97)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_approx_equal(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn saturation_vapor_pressure_matches_reference_points() {
        assert!(f32_approx_equal(saturation_vapor_pressure(ZERO_CELSIUS), 611.0, 1e-3));
        assert!(f32_approx_equal(
            saturation_vapor_pressure(ZERO_CELSIUS + 25.0),
            3167.0,
            30.0
        ));
    }
}
