// Transform stage: cleaning, classification and location enrichment

pub mod classify;
pub mod clean;
pub mod locate;

use serde::Serialize;
use std::fmt;

use self::clean::Region;

/// Why a single record was dropped during transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RejectReason {
    MissingClassification,
    /// Missing, unparseable, zero or negative
    InvalidMass,
    MissingYear,
    /// Missing or unparseable latitude/longitude
    MissingCoordinates,
    DegenerateCoordinate,
    CoordinateOutOfRange,
    OutsideAcceptedRegion(Region),
    UnparseableDate,
    Unclassifiable,
    NoLocation,
}

impl RejectReason {
    /// Stable label for metrics and reports
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::MissingClassification => "missing_classification",
            RejectReason::InvalidMass => "invalid_mass",
            RejectReason::MissingYear => "missing_year",
            RejectReason::MissingCoordinates => "missing_coordinates",
            RejectReason::DegenerateCoordinate => "degenerate_coordinate",
            RejectReason::CoordinateOutOfRange => "coordinate_out_of_range",
            RejectReason::OutsideAcceptedRegion(_) => "outside_accepted_region",
            RejectReason::UnparseableDate => "unparseable_date",
            RejectReason::Unclassifiable => "unclassifiable",
            RejectReason::NoLocation => "no_location",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OutsideAcceptedRegion(region) => {
                write!(f, "outside_accepted_region ({})", region.as_str())
            }
            other => f.write_str(other.label()),
        }
    }
}
