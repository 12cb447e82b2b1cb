use std::sync::LazyLock;

use regex::Regex;

use crate::kml::Placemark;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const NAUTICAL_MILES_PER_KM: f64 = 0.539957;

/// Trip-log descriptions start with the local date of the fix.
static LEADING_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<year>[0-9]{4})-[0-9]{2}-[0-9]{2}").unwrap());

/// Distance travelled within one calendar year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlyDistance {
    pub year: String,
    pub kilometers: f64,
}

/// Great-circle distance in kilometers between two (latitude, longitude)
/// pairs in degrees.
pub fn haversine_km(origin: (f64, f64), destination: (f64, f64)) -> f64 {
    let (lat1, lon1) = origin;
    let (lat2, lon2) = destination;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Kilometers to nautical miles.
pub fn km_to_nautical_miles(km: f64) -> f64 {
    km * NAUTICAL_MILES_PER_KM
}

/// Year at the start of a description, when there is one.
pub fn extract_year(description: &str) -> Option<&str> {
    LEADING_DATE
        .captures(description)
        .and_then(|c| c.name("year"))
        .map(|m| m.as_str())
}

/// Group placemark points by the year their description starts with
/// (keeping first-seen year order) and sum the consecutive great-circle
/// legs within each group. Placemarks without a point or without a dated
/// description do not count.
pub fn travelled_by_year(placemarks: &[Placemark]) -> Vec<YearlyDistance> {
    let mut groups: Vec<(String, Vec<(f64, f64)>)> = Vec::new();

    for placemark in placemarks {
        let Some(point) = placemark.coordinates else {
            continue;
        };
        let Some(year) = placemark.description.as_deref().and_then(extract_year) else {
            continue;
        };
        match groups.iter_mut().find(|(y, _)| y.as_str() == year) {
            Some((_, points)) => points.push(point),
            None => groups.push((year.to_string(), vec![point])),
        }
    }

    groups
        .into_iter()
        .map(|(year, points)| YearlyDistance {
            year,
            kilometers: points.windows(2).map(|w| haversine_km(w[0], w[1])).sum(),
        })
        .collect()
}

/// Total over per-year distances.
pub fn total_km(years: &[YearlyDistance]) -> f64 {
    years.iter().map(|y| y.kilometers).sum()
}
