use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Timestamp layout used by the NASA dataset, e.g. `1880-01-01T00:00:00.000`
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Untyped field bag exactly as the remote catalog returns it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub serde_json::Map<String, serde_json::Value>);

impl RawRecord {
    /// Returns a field as text. Numbers are rendered, `null` and other shapes are absent.
    pub fn field(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for RawRecord {
    fn from(fields: [(&str, &str); N]) -> Self {
        RawRecord(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                .collect(),
        )
    }
}

/// A validated record whose coordinates passed the acceptance policy
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub recclass: String,
    /// Grams, always positive
    pub mass: f64,
    pub year: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl CleanRecord {
    pub fn location_key(&self) -> LocationKey {
        LocationKey::from_coordinates(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChemicalComposition {
    PrimitiveAchondrites,
    Chondrites,
    Achondrites,
}

impl ChemicalComposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChemicalComposition::PrimitiveAchondrites => "PRIMITIVE_ACHONDRITES",
            ChemicalComposition::Chondrites => "CHONDRITES",
            ChemicalComposition::Achondrites => "ACHONDRITES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialType {
    #[serde(rename = "STONY")]
    Stony,
    #[serde(rename = "IRON")]
    Iron,
    #[serde(rename = "STONY-IRON")]
    StonyIron,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Stony => "STONY",
            MaterialType::Iron => "IRON",
            MaterialType::StonyIron => "STONY-IRON",
        }
    }
}

/// Structured taxonomy produced by exactly one classification rule family
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassificationTaxonomy {
    pub group: String,
    pub clan: Option<String>,
    pub clazz: Option<String>,
    pub chemical_composition: ChemicalComposition,
    pub material_type: MaterialType,
}

/// Calendar breakdown of a landing timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub epoch_seconds: i64,
}

impl DateParts {
    /// Parses a source timestamp (interpreted as UTC). Returns `None` when it does not parse.
    pub fn parse(timestamp: &str) -> Option<Self> {
        let parsed = NaiveDateTime::parse_from_str(timestamp.trim(), SOURCE_TIMESTAMP_FORMAT).ok()?;
        Some(Self::from_datetime(parsed))
    }

    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        let month = datetime.month();
        DateParts {
            year: datetime.year(),
            month,
            quarter: (month - 1) / 3 + 1,
            epoch_seconds: datetime.and_utc().timestamp(),
        }
    }

    pub fn full_date(&self) -> Option<NaiveDateTime> {
        chrono::DateTime::from_timestamp(self.epoch_seconds, 0).map(|dt| dt.naive_utc())
    }
}

/// A coordinate rounded to one decimal place, stored as tenths of a degree so it can key maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationKey {
    lat_tenths: i32,
    lon_tenths: i32,
}

impl LocationKey {
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        LocationKey {
            lat_tenths: (latitude * 10.0).round() as i32,
            lon_tenths: (longitude * 10.0).round() as i32,
        }
    }

    pub fn latitude(&self) -> f64 {
        f64::from(self.lat_tenths) / 10.0
    }

    pub fn longitude(&self) -> f64 {
        f64::from(self.lon_tenths) / 10.0
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.latitude(), self.longitude())
    }
}

/// Reverse-geocoded location. Two locations are the same entity when their
/// rounded coordinates match, whatever names were resolved for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl ResolvedLocation {
    pub fn unnamed(key: LocationKey) -> Self {
        ResolvedLocation {
            latitude: key.latitude(),
            longitude: key.longitude(),
            city: None,
            state: None,
            country: None,
        }
    }

    pub fn key(&self) -> LocationKey {
        LocationKey::from_coordinates(self.latitude, self.longitude)
    }
}

impl PartialEq for ResolvedLocation {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ResolvedLocation {}

impl Hash for ResolvedLocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// The unit handed to the load collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAggregate {
    pub date: DateParts,
    /// Grams
    pub mass: f64,
    pub location: ResolvedLocation,
    pub classification: ClassificationTaxonomy,
}

/// An extraction sub-range that could not be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FailedRange {
    pub start_offset: u64,
    pub end_offset: u64,
}

impl fmt::Display for FailedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start_offset, self.end_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_date_parts_from_source_timestamp() {
        let parts = DateParts::parse("1998-08-15T00:00:00.000").unwrap();
        assert_eq!(parts.year, 1998);
        assert_eq!(parts.month, 8);
        assert_eq!(parts.quarter, 3);
        assert_eq!(parts.epoch_seconds, 903_139_200);
        assert_eq!(
            parts.full_date().unwrap().format("%Y-%m-%d").to_string(),
            "1998-08-15"
        );
    }

    #[test]
    fn test_date_parts_rejects_other_layouts() {
        assert!(DateParts::parse("1998").is_none());
        assert!(DateParts::parse("15/08/1998").is_none());
    }

    #[test]
    fn test_quarter_boundaries() {
        let q = |m: &str| DateParts::parse(&format!("2000-{m}-01T00:00:00.000")).unwrap().quarter;
        assert_eq!(q("01"), 1);
        assert_eq!(q("03"), 1);
        assert_eq!(q("04"), 2);
        assert_eq!(q("09"), 3);
        assert_eq!(q("12"), 4);
    }

    #[test]
    fn test_resolved_location_identity_ignores_names() {
        let a = ResolvedLocation {
            latitude: 50.8,
            longitude: 6.1,
            city: Some("Aachen".to_string()),
            state: None,
            country: Some("Germany".to_string()),
        };
        let b = ResolvedLocation::unnamed(LocationKey::from_coordinates(50.8, 6.1));
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn test_raw_record_field_access() {
        let record: RawRecord = serde_json::from_value(json!({
            "recclass": "L5",
            "mass": 21,
            "reclat": null,
            "geolocation": {"type": "Point"}
        }))
        .unwrap();
        assert_eq!(record.field("recclass").as_deref(), Some("L5"));
        assert_eq!(record.field("mass").as_deref(), Some("21"));
        assert_eq!(record.field("reclat"), None);
        assert_eq!(record.field("geolocation"), None);
        assert_eq!(record.field("year"), None);
    }
}
