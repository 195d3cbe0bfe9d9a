//! Canonical variable names shared across modules and data sources.
//!
//! Coupling happens by name, so sources and module configurations map their
//! native spellings onto this vocabulary. The names follow the CSDMS standard
//! name convention.

pub const PRECIP_RATE: &str = "atmosphere_water__liquid_equivalent_precipitation_rate";
pub const RAIN_VOLUME_FLUX: &str = "atmosphere_water__rainfall_volume_flux";
pub const SHORTWAVE_FLUX: &str = "land_surface_radiation~incoming~shortwave__energy_flux";
pub const LONGWAVE_FLUX: &str = "land_surface_radiation~incoming~longwave__energy_flux";
pub const SURFACE_PRESSURE: &str = "land_surface_air__pressure";
pub const SPECIFIC_HUMIDITY: &str = "atmosphere_air_water~vapor__mass_fraction";
pub const SURFACE_TEMPERATURE: &str = "land_surface_air__temperature";
pub const WIND_U: &str = "land_surface_wind__x_component_of_velocity";
pub const WIND_V: &str = "land_surface_wind__y_component_of_velocity";
pub const POTENTIAL_ET: &str = "land_surface_water__potential_evaporation_volume_flux";
pub const SURFACE_RUNOFF: &str = "land_surface_water__runoff_volume_flux";
pub const CHANNEL_DISCHARGE: &str = "channel_water__volume_flow_rate";

/// Raw column spellings that tabular sources recognise without an explicit
/// alias map: `(raw name, canonical name, native units)`.
pub const WELL_KNOWN_FIELDS: &[(&str, &str, &str)] = &[
    ("precip_rate", PRECIP_RATE, "mm s^-1"),
    ("RAINRATE", PRECIP_RATE, "mm s^-1"),
    ("APCP_surface", RAIN_VOLUME_FLUX, "kg m^-2"),
    ("DSWRF_surface", SHORTWAVE_FLUX, "W m^-2"),
    ("SWDOWN", SHORTWAVE_FLUX, "W m^-2"),
    ("DLWRF_surface", LONGWAVE_FLUX, "W m^-2"),
    ("LWDOWN", LONGWAVE_FLUX, "W m^-2"),
    ("PRES_surface", SURFACE_PRESSURE, "Pa"),
    ("PSFC", SURFACE_PRESSURE, "Pa"),
    ("SPFH_2maboveground", SPECIFIC_HUMIDITY, "kg kg^-1"),
    ("Q2D", SPECIFIC_HUMIDITY, "kg kg^-1"),
    ("TMP_2maboveground", SURFACE_TEMPERATURE, "K"),
    ("T2D", SURFACE_TEMPERATURE, "K"),
    ("UGRD_10maboveground", WIND_U, "m s^-1"),
    ("U2D", WIND_U, "m s^-1"),
    ("VGRD_10maboveground", WIND_V, "m s^-1"),
    ("V2D", WIND_V, "m s^-1"),
];

/// Whether a canonical variable is a quantity summed over the source's native
/// step (precipitation and radiative fluxes) rather than an instantaneous
/// sample. Drives the resampling weights.
pub fn is_summed_quantity(canonical_name: &str) -> bool {
    matches!(
        canonical_name,
        PRECIP_RATE | RAIN_VOLUME_FLUX | SHORTWAVE_FLUX | LONGWAVE_FLUX
    )
}

/// Canonical name for a raw column spelling, if it is well known.
pub fn canonical_for(raw_name: &str) -> Option<&'static str> {
    WELL_KNOWN_FIELDS
        .iter()
        .find(|(raw, _, _)| *raw == raw_name)
        .map(|(_, canonical, _)| *canonical)
}

/// Native units recorded for a well-known raw column spelling.
pub fn well_known_units(raw_name: &str) -> Option<&'static str> {
    WELL_KNOWN_FIELDS
        .iter()
        .find(|(raw, _, _)| *raw == raw_name)
        .map(|(_, _, units)| *units)
}
