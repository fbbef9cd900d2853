//! Sheet material presets and gauge thicknesses.
//!
//! Elastic constants are in the units the solver decks use (modulus in
//! mN/mm², density in g/mm³ scaled so that frequencies come out in Hz for
//! millimetre geometry).

use super::types::MaterialParams;

/// All available material keys.
pub const MATERIAL_KEYS: &[&str] = &[
    "carbon_steel",
    "aluminum",
    "stainless_steel",
    "galvanized_steel",
];

/// Gauge used when a caller picks a material without a thickness.
pub const DEFAULT_GAUGE: u32 = 8;

const CARBON_STEEL_GAUGES: &[(u32, f64)] = &[
    (7, 4.554),
    (8, 4.175),
    (9, 3.797),
    (10, 3.416),
    (11, 3.038),
    (12, 2.656),
    (14, 1.897),
    (16, 1.518),
    (18, 1.214),
    (20, 0.911),
    (22, 0.759),
    (24, 0.607),
    (26, 0.454),
    (28, 0.378),
];

const ALUMINUM_GAUGES: &[(u32, f64)] = &[
    (7, 3.665),
    (8, 3.264),
    (9, 2.906),
    (10, 2.588),
    (11, 2.305),
    (12, 2.053),
    (14, 1.628),
    (16, 1.291),
    (18, 1.024),
    (20, 0.812),
    (22, 0.644),
    (24, 0.511),
    (26, 0.405),
    (28, 0.321),
    (30, 0.255),
];

const STAINLESS_STEEL_GAUGES: &[(u32, f64)] = &[
    (8, 4.365),
    (9, 3.968),
    (10, 3.571),
    (11, 3.175),
    (12, 2.778),
    (14, 1.984),
    (16, 1.587),
    (18, 1.27),
    (20, 0.952),
    (22, 0.794),
    (24, 0.635),
    (26, 0.476),
    (28, 0.396),
    (30, 0.318),
];

const GALVANIZED_STEEL_GAUGES: &[(u32, f64)] = &[
    (8, 4.269),
    (9, 3.891),
    (10, 3.51),
    (11, 3.132),
    (12, 2.753),
    (14, 1.994),
    (16, 1.613),
    (18, 1.31),
    (20, 1.005),
    (22, 0.853),
    (24, 0.701),
    (26, 0.551),
    (28, 0.474),
    (30, 0.398),
];

fn gauge_table(key: &str) -> Option<&'static [(u32, f64)]> {
    match key {
        "carbon_steel" => Some(CARBON_STEEL_GAUGES),
        "aluminum" => Some(ALUMINUM_GAUGES),
        "stainless_steel" => Some(STAINLESS_STEEL_GAUGES),
        "galvanized_steel" => Some(GALVANIZED_STEEL_GAUGES),
        _ => None,
    }
}

/// Sheet thickness (mm) of `gauge` for the material `key`.
///
/// # Example
/// ```
/// use bellshape::optimization::materials::gauge_thickness;
///
/// assert_eq!(gauge_thickness("galvanized_steel", 10), Some(3.51));
/// assert_eq!(gauge_thickness("galvanized_steel", 7), None);
/// ```
pub fn gauge_thickness(key: &str, gauge: u32) -> Option<f64> {
    gauge_table(key)?
        .iter()
        .find(|(g, _)| *g == gauge)
        .map(|&(_, t)| t)
}

/// Gauges listed for the material `key`, thickest first.
pub fn available_gauges(key: &str) -> Vec<u32> {
    gauge_table(key)
        .map(|table| table.iter().map(|&(g, _)| g).collect())
        .unwrap_or_default()
}

/// Get material by key, at the default gauge's thickness.
///
/// # Example
/// ```
/// use bellshape::optimization::materials::get_material;
///
/// let steel = get_material("galvanized_steel").unwrap();
/// assert_eq!(steel.name, "Galvanized Steel");
/// assert!((steel.thickness - 4.269).abs() < 1e-12);
/// ```
pub fn get_material(key: &str) -> Option<MaterialParams> {
    let (name, e, nu, rho) = match key {
        "carbon_steel" => ("Carbon Steel", 200000e6, 0.29, 0.007850),
        "aluminum" => ("Aluminum", 69000e6, 0.33, 0.002712),
        "stainless_steel" => ("Stainless Steel", 193000e6, 0.29, 0.008000),
        "galvanized_steel" => ("Galvanized Steel", 200000e6, 0.3, 0.007850),
        _ => return None,
    };
    let thickness = gauge_thickness(key, DEFAULT_GAUGE)?;
    Some(MaterialParams::new(name, e, nu, rho, thickness))
}

/// Material `key` cut from sheet of the given gauge.
pub fn sheet_material(key: &str, gauge: u32) -> Option<MaterialParams> {
    let thickness = gauge_thickness(key, gauge)?;
    get_material(key).map(|m| m.with_thickness(thickness))
}

/// Get all available materials as (key, material) pairs.
pub fn get_all_materials() -> Vec<(&'static str, MaterialParams)> {
    MATERIAL_KEYS
        .iter()
        .filter_map(|&key| get_material(key).map(|m| (key, m)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_material_galvanized() {
        let material = get_material("galvanized_steel").unwrap();
        assert!((material.e - 200000e6).abs() < 1.0);
        assert!((material.nu - 0.3).abs() < 1e-12);
        assert!((material.rho - 0.007850).abs() < 1e-12);
    }

    #[test]
    fn test_get_material_invalid() {
        assert!(get_material("sapele").is_none());
        assert!(get_material("").is_none());
    }

    #[test]
    fn test_all_material_keys_valid() {
        for &key in MATERIAL_KEYS {
            assert!(
                get_material(key).is_some(),
                "Material key '{}' should be valid",
                key
            );
        }
        assert_eq!(get_all_materials().len(), MATERIAL_KEYS.len());
    }

    #[test]
    fn test_gauges_get_thinner() {
        for &key in MATERIAL_KEYS {
            let gauges = available_gauges(key);
            let thicknesses: Vec<f64> = gauges
                .iter()
                .filter_map(|&g| gauge_thickness(key, g))
                .collect();
            assert_eq!(thicknesses.len(), gauges.len());
            assert!(thicknesses.windows(2).all(|w| w[0] > w[1]), "{}", key);
        }
    }

    #[test]
    fn test_sheet_material() {
        let al = sheet_material("aluminum", 30).unwrap();
        assert!((al.thickness - 0.255).abs() < 1e-12);
        assert!(sheet_material("carbon_steel", 30).is_none());
        assert!(available_gauges("unobtainium").is_empty());
    }
}
