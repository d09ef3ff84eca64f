//! Core types describing the building elements found in a dataset.

use serde::Deserialize;
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::ParseError;

pub const ELEMENT_TYPE: &str = "ElementType";
pub const MATERIAL: &str = "Material";
pub const TOTAL_COST: &str = "TotalCost_ETB";
pub const PREDICTED_COST: &str = "TotalCost_ETB_pred";
pub const IS_HIGH_VALUE: &str = "IsHighValue";
pub const CLASH_STATUS: &str = "ClashStatus";
pub const ROOM_NAME: &str = "RoomName";
pub const AREA: &str = "Area_m2";
pub const VOLUME: &str = "Volume_m3";

/// A boolean cell. Upstream tooling writes these in several spellings (`True`, `true`, `1`...),
/// all of which are accepted case-insensitively.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    DeserializeFromStr,
    SerializeDisplay,
)]
pub struct Flag(pub bool);

impl std::str::FromStr for Flag {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(Self(true)),
            "false" | "0" | "no" | "n" => Ok(Self(false)),
            _ => Err(ParseError::InvalidFlag(s.to_owned())),
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The typed view of one row. Every field is optional: a column may be absent from the dataset,
/// and a present cell that is empty or malformed is coerced to `None`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Element {
    #[serde(rename = "ElementType", default)]
    pub element_type: Option<String>,
    #[serde(rename = "Material", default)]
    pub material: Option<String>,
    #[serde(
        rename = "TotalCost_ETB",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub total_cost: Option<f64>,
    #[serde(
        rename = "TotalCost_ETB_pred",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub predicted_cost: Option<f64>,
    #[serde(rename = "IsHighValue", default, deserialize_with = "csv::invalid_option")]
    pub is_high_value: Option<Flag>,
    #[serde(rename = "ClashStatus", default)]
    pub clash_status: Option<String>,
    #[serde(rename = "RoomName", default)]
    pub room_name: Option<String>,
    #[serde(rename = "Area_m2", default, deserialize_with = "csv::invalid_option")]
    pub area: Option<f64>,
    #[serde(rename = "Volume_m3", default, deserialize_with = "csv::invalid_option")]
    pub volume: Option<f64>,
}

impl Element {
    /// Deserialize the typed view of a raw record.
    pub fn from_record(record: &csv::StringRecord, headers: &csv::StringRecord) -> csv::Result<Self> {
        let element: Self = record.deserialize(Some(headers))?;
        Ok(element.finite_only())
    }

    // `nan` and `inf` parse as valid floats, but carry no usable measurement.
    fn finite_only(self) -> Self {
        let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
        Self {
            total_cost: finite(self.total_cost),
            predicted_cost: finite(self.predicted_cost),
            area: finite(self.area),
            volume: finite(self.volume),
            ..self
        }
    }

    /// Missing flags count as "not high value".
    pub fn is_high_value(&self) -> bool {
        matches!(self.is_high_value, Some(Flag(true)))
    }

    /// Whether the clash status mentions a clash, ignoring case.
    pub fn is_flagged_clash(&self) -> bool {
        self.clash_status
            .as_deref()
            .map_or(false, |status| status.to_lowercase().contains("clash"))
    }
}

/// Which of the known columns a dataset carries, and where. Computed once from the header row and
/// consulted by every feature that depends on a column.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Columns {
    pub element_type: Option<usize>,
    pub material: Option<usize>,
    pub total_cost: Option<usize>,
    pub predicted_cost: Option<usize>,
    pub is_high_value: Option<usize>,
    pub clash_status: Option<usize>,
    pub room_name: Option<usize>,
    pub area: Option<usize>,
    pub volume: Option<usize>,
}

impl Columns {
    pub fn from_headers(headers: &csv::StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|header| header == name);
        Self {
            element_type: find(ELEMENT_TYPE),
            material: find(MATERIAL),
            total_cost: find(TOTAL_COST),
            predicted_cost: find(PREDICTED_COST),
            is_high_value: find(IS_HIGH_VALUE),
            clash_status: find(CLASH_STATUS),
            room_name: find(ROOM_NAME),
            area: find(AREA),
            volume: find(VOLUME),
        }
    }

    /// Index of a column by name, restricted to the known columns.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        match name {
            ELEMENT_TYPE => self.element_type,
            MATERIAL => self.material,
            TOTAL_COST => self.total_cost,
            PREDICTED_COST => self.predicted_cost,
            IS_HIGH_VALUE => self.is_high_value,
            CLASH_STATUS => self.clash_status,
            ROOM_NAME => self.room_name,
            AREA => self.area,
            VOLUME => self.volume,
            _ => None,
        }
    }
}
