//! GCMD science keywords keyed by CF standard name (or normalised name).

const GCMD_KEYWORDS: &[(&str, &str)] = &[
    ("air_pressure", "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC PRESSURE > SURFACE PRESSURE"),
    (
        "air_temperature",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC TEMPERATURE > SURFACE TEMPERATURE > AIR TEMPERATURE",
    ),
    ("wind_speed", "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC WINDS > SURFACE WINDS > WIND SPEED"),
    (
        "wind_speed_of_gust",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC WINDS > SURFACE WINDS > WIND SPEED",
    ),
    (
        "wind_direction",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC WINDS > SURFACE WINDS > WIND DIRECTION",
    ),
    (
        "wind_from_direction",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC WINDS > SURFACE WINDS > WIND DIRECTION",
    ),
    (
        "relative_humidity",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC WATER VAPOR > WATER VAPOR INDICATORS > HUMIDITY > RELATIVE HUMIDITY",
    ),
    (
        "dew_point_temperature",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC WATER VAPOR > WATER VAPOR INDICATORS > DEW POINT TEMPERATURE",
    ),
    (
        "radiation",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC RADIATION > LONGWAVE RADIATION > DOWNWELLING LONGWAVE RADIATION",
    ),
    (
        "surface_downwelling_longwave_flux_in_air",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC RADIATION > LONGWAVE RADIATION > DOWNWELLING LONGWAVE RADIATION",
    ),
    (
        "surface_upwelling_longwave_flux_in_air",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC RADIATION > LONGWAVE RADIATION > UPWELLING LONGWAVE RADIATION",
    ),
    (
        "surface_downwelling_shortwave_flux_in_air",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC RADIATION > SHORTWAVE RADIATION > DOWNWELLING SHORTWAVE RADIATION",
    ),
    (
        "surface_upwelling_shortwave_flux_in_air",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC RADIATION > SHORTWAVE RADIATION",
    ),
    ("surface_albedo", "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC RADIATION > ALBEDO"),
    (
        "surface_downwelling_photosynthetic_radiative_flux_in_air",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC RADIATION > RADIATIVE FLUX",
    ),
    ("surface_net_downward_radiative_flux", "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC RADIATION"),
    (
        "height_of_station_ground_above_mean_sea_level",
        "EARTH SCIENCE > ATMOSPHERE > ALTITUDE > STATION HEIGHT",
    ),
    (
        "pressure_reduced_to_mean_sea_level",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC PRESSURE > SEA LEVEL PRESSURE",
    ),
    (
        "air_pressure_at_mean_sea_level",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC PRESSURE > SEA LEVEL PRESSURE",
    ),
    (
        "characteristic_of_pressure_tendency",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC PRESSURE > PRESSURE TENDENCY",
    ),
    (
        "dewpoint_temperature",
        "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC TEMPERATURE > SURFACE TEMPERATURE > DEW POINT TEMPERATURE",
    ),
];

pub fn keyword_for(name: &str) -> Option<&'static str> {
    GCMD_KEYWORDS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, keyword)| *keyword)
}

/// Distinct keywords for a set of names, in first-seen order
pub fn collect_keywords<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'static str> {
    let mut keywords: Vec<&'static str> = Vec::new();
    for keyword in names.into_iter().filter_map(keyword_for) {
        if !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_distinct_and_ordered() {
        let keywords = collect_keywords([
            "wind_speed",
            "air_temperature",
            "wind_speed_of_gust",
            "present_weather",
        ]);
        assert_eq!(
            keywords,
            vec![
                "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC WINDS > SURFACE WINDS > WIND SPEED",
                "EARTH SCIENCE > ATMOSPHERE > ATMOSPHERIC TEMPERATURE > SURFACE TEMPERATURE > AIR TEMPERATURE",
            ]
        );
    }

    #[test]
    fn test_unknown_name_has_no_keyword() {
        assert_eq!(keyword_for("total_snow_depth"), None);
    }
}
