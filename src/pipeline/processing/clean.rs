use serde::Serialize;

use crate::pipeline::processing::RejectReason;
use crate::types::{CleanRecord, RawRecord};

/// Named areas of the geographic acceptance policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    NorthAmerica,
    SouthAmerica,
    Europe,
    Africa,
    Asia,
    Oceania,
    Remote,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "north_america",
            Region::SouthAmerica => "south_america",
            Region::Europe => "europe",
            Region::Africa => "africa",
            Region::Asia => "asia",
            Region::Oceania => "oceania",
            Region::Remote => "remote",
        }
    }

    /// Only landings in Europe pass the acceptance policy
    pub fn is_accepted(&self) -> bool {
        matches!(self, Region::Europe)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub region: Region,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

const fn bbox(region: Region, lat: (f64, f64), lon: (f64, f64)) -> BoundingBox {
    BoundingBox {
        region,
        min_lat: lat.0,
        max_lat: lat.1,
        min_lon: lon.0,
        max_lon: lon.1,
    }
}

// Ordered: the first box containing the point decides. Boxes overlap (Europe/Africa, Europe/Asia).
// Anything outside every box is Remote.
pub const REGIONS: &[BoundingBox] = &[
    bbox(Region::NorthAmerica, (15.0, 75.0), (-168.0, -52.0)),
    bbox(Region::SouthAmerica, (-55.0, 12.0), (-82.0, -34.0)),
    bbox(Region::Europe, (36.0, 71.0), (-10.0, 40.0)),
    bbox(Region::Africa, (-35.0, 38.0), (-18.0, 52.0)),
    bbox(Region::Asia, (-10.0, 81.0), (26.0, 180.0)),
    bbox(Region::Oceania, (-50.0, -10.0), (110.0, 180.0)),
];

pub fn region_of(lat: f64, lon: f64) -> Region {
    REGIONS
        .iter()
        .find(|b| b.contains(lat, lon))
        .map(|b| b.region)
        .unwrap_or(Region::Remote)
}

/// Geographic acceptance policy, applied to the unrounded coordinate
pub fn check_coordinate(lat: f64, lon: f64) -> Result<(), RejectReason> {
    if lat.abs() < f64::EPSILON && lon.abs() < f64::EPSILON {
        return Err(RejectReason::DegenerateCoordinate);
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(RejectReason::CoordinateOutOfRange);
    }
    match region_of(lat, lon) {
        region if region.is_accepted() => Ok(()),
        region => Err(RejectReason::OutsideAcceptedRegion(region)),
    }
}

/// Rounds to one decimal place, exact ties going to the even digit (50.25 -> 50.2)
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

fn non_empty(raw: &RawRecord, name: &str) -> Option<String> {
    raw.field(name).filter(|v| !v.trim().is_empty())
}

/// Validates one raw record. Checks run in order and stop at the first failure.
pub fn clean_record(raw: &RawRecord) -> Result<CleanRecord, RejectReason> {
    let recclass = non_empty(raw, "recclass").ok_or(RejectReason::MissingClassification)?;

    let mass = non_empty(raw, "mass")
        .and_then(|m| m.trim().parse::<f64>().ok())
        .filter(|m| m.is_finite() && *m > 0.0)
        .ok_or(RejectReason::InvalidMass)?;

    let year = non_empty(raw, "year").ok_or(RejectReason::MissingYear)?;

    let lat = non_empty(raw, "reclat").ok_or(RejectReason::MissingCoordinates)?;
    let lon = non_empty(raw, "reclong").ok_or(RejectReason::MissingCoordinates)?;
    let (lat, lon) = match (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
        (Ok(lat), Ok(lon)) if lat.is_finite() && lon.is_finite() => (lat, lon),
        _ => return Err(RejectReason::MissingCoordinates),
    };

    check_coordinate(lat, lon)?;

    Ok(CleanRecord {
        recclass,
        mass,
        year,
        latitude: round_one_decimal(lat),
        longitude: round_one_decimal(lon),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LocationKey;

    fn aachen() -> RawRecord {
        RawRecord::from([
            ("name", "Aachen"),
            ("recclass", "L6"),
            ("mass", "15.2"),
            ("year", "1998-01-01T00:00:00.000"),
            ("reclat", "50.775"),
            ("reclong", "6.083"),
        ])
    }

    fn with(field: &str, value: &str) -> RawRecord {
        let mut raw = aachen();
        raw.0.insert(field.to_string(), serde_json::Value::String(value.to_string()));
        raw
    }

    fn without(field: &str) -> RawRecord {
        let mut raw = aachen();
        raw.0.remove(field);
        raw
    }

    #[test]
    fn test_clean_valid_european_record() {
        let clean = clean_record(&aachen()).unwrap();
        assert_eq!(clean.recclass, "L6");
        assert_eq!(clean.mass, 15.2);
        assert_eq!(clean.year, "1998-01-01T00:00:00.000");
        assert_eq!(clean.latitude, 50.8);
        assert_eq!(clean.longitude, 6.1);
    }

    #[test]
    fn test_zero_mass_is_rejected() {
        assert_eq!(clean_record(&with("mass", "0")), Err(RejectReason::InvalidMass));
        assert_eq!(clean_record(&with("mass", "0.0")), Err(RejectReason::InvalidMass));
        assert_eq!(clean_record(&with("mass", "heavy")), Err(RejectReason::InvalidMass));
        assert_eq!(clean_record(&without("mass")), Err(RejectReason::InvalidMass));
    }

    #[test]
    fn test_first_failing_check_wins() {
        let mut raw = aachen();
        raw.0.remove("recclass");
        raw.0.remove("year");
        assert_eq!(clean_record(&raw), Err(RejectReason::MissingClassification));

        assert_eq!(clean_record(&with("recclass", "")), Err(RejectReason::MissingClassification));
        assert_eq!(clean_record(&with("year", "")), Err(RejectReason::MissingYear));
        assert_eq!(clean_record(&without("reclong")), Err(RejectReason::MissingCoordinates));
        assert_eq!(clean_record(&with("reclat", "")), Err(RejectReason::MissingCoordinates));
    }

    #[test]
    fn test_north_america_is_rejected() {
        let mut raw = with("reclat", "40.0");
        raw.0.insert("reclong".into(), serde_json::Value::String("-100.0".into()));
        assert_eq!(
            clean_record(&raw),
            Err(RejectReason::OutsideAcceptedRegion(Region::NorthAmerica))
        );
        assert!(check_coordinate(40.0, -100.0).is_err());
    }

    #[test]
    fn test_degenerate_and_out_of_range_coordinates() {
        assert_eq!(check_coordinate(0.0, 0.0), Err(RejectReason::DegenerateCoordinate));
        assert_eq!(check_coordinate(91.0, 10.0), Err(RejectReason::CoordinateOutOfRange));
        assert_eq!(check_coordinate(45.0, -180.5), Err(RejectReason::CoordinateOutOfRange));
    }

    #[test]
    fn test_region_order_and_remote_fallback() {
        // Inside both the Europe and Africa boxes; Europe comes first
        assert_eq!(region_of(37.0, 10.0), Region::Europe);
        assert_eq!(region_of(30.0, 10.0), Region::Africa);
        assert_eq!(region_of(35.7, 139.7), Region::Asia);
        assert_eq!(region_of(-33.9, 151.2), Region::Oceania);
        assert_eq!(region_of(-45.0, 170.0), Region::Oceania);
        assert_eq!(region_of(-15.8, -47.9), Region::SouthAmerica);
        assert_eq!(region_of(-80.0, 0.0), Region::Remote);
        assert_eq!(
            check_coordinate(-80.0, 0.0),
            Err(RejectReason::OutsideAcceptedRegion(Region::Remote))
        );
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_one_decimal(50.775), 50.8);
        assert_eq!(round_one_decimal(6.083), 6.1);
        assert_eq!(round_one_decimal(-1.25), -1.2);
        assert_eq!(round_one_decimal(0.25), 0.2);
        assert_eq!(round_one_decimal(0.75), 0.8);
    }

    #[test]
    fn test_clean_rounds_exact_ties_to_even() {
        let mut raw = with("reclat", "50.25");
        raw.0.insert("reclong".to_string(), serde_json::Value::String("6.75".to_string()));
        let clean = clean_record(&raw).unwrap();
        assert_eq!(clean.latitude, 50.2);
        assert_eq!(clean.longitude, 6.8);
        assert_eq!(clean.location_key(), LocationKey::from_coordinates(50.2, 6.8));
    }

    #[test]
    fn test_only_europe_is_accepted() {
        assert!(Region::Europe.is_accepted());
        assert_eq!(
            check_coordinate(30.0, 10.0),
            Err(RejectReason::OutsideAcceptedRegion(Region::Africa))
        );
        assert_eq!(check_coordinate(37.0, 10.0), Ok(()));
    }
}
