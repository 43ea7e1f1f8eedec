//! Entity records
//!
//! Raw glacier attributes as provided by the inventory, and the decoded
//! classification fields derived from them.

pub mod id;

pub use id::EntityId;

use crate::error::WorkflowError;
use crate::store::shapefile::{Feature, FeatureCollection};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw inventory attributes of one glacier
///
/// Field names follow the inventory's attribute table so that the record
/// round-trips through the `outlines` artifact's feature properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAttributes {
    #[serde(rename = "RGIId")]
    pub rgi_id: EntityId,
    #[serde(rename = "GLIMSId", default)]
    pub glims_id: String,
    #[serde(rename = "CenLon")]
    pub cen_lon: f64,
    #[serde(rename = "CenLat")]
    pub cen_lat: f64,
    #[serde(rename = "O1Region")]
    pub o1_region: String,
    #[serde(rename = "O2Region")]
    pub o2_region: String,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "BgnDate", default)]
    pub bgn_date: Option<String>,
    /// Glacier form code
    #[serde(rename = "Form")]
    pub form: String,
    /// Terminus type code
    #[serde(rename = "TermType")]
    pub term_type: String,
    /// Status code
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Area")]
    pub area_km2: f64,
}

impl EntityAttributes {
    /// Single-feature collection carrying these attributes as properties.
    ///
    /// `geometry` is an opaque GeoJSON-like value owned by the caller.
    pub fn to_feature_collection(
        &self,
        geometry: Option<serde_json::Value>,
        crs: Option<String>,
    ) -> Result<FeatureCollection, WorkflowError> {
        let properties = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(WorkflowError::Serialization(
                    "entity attributes did not serialize to an object".to_string(),
                ))
            }
        };
        Ok(FeatureCollection {
            crs,
            features: vec![Feature {
                properties,
                geometry,
            }],
        })
    }

    /// Rebuild attributes from the first feature of an outlines collection.
    pub fn from_feature_collection(collection: &FeatureCollection) -> Result<Self, WorkflowError> {
        let feature = collection.features.first().ok_or_else(|| {
            WorkflowError::InvalidEntity("outlines artifact contains no feature".to_string())
        })?;
        let value = serde_json::Value::Object(feature.properties.clone());
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlacierType {
    Glacier,
    IceCap,
    PerennialSnowfield,
    SeasonalSnowfield,
    NotAssigned,
}

impl GlacierType {
    pub fn from_code(code: &str) -> Result<Self, WorkflowError> {
        match code.trim() {
            "0" => Ok(GlacierType::Glacier),
            "1" => Ok(GlacierType::IceCap),
            "2" => Ok(GlacierType::PerennialSnowfield),
            "3" => Ok(GlacierType::SeasonalSnowfield),
            "9" => Ok(GlacierType::NotAssigned),
            other => Err(WorkflowError::InvalidEntity(format!("unknown glacier form code {:?}", other))),
        }
    }
}

impl fmt::Display for GlacierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GlacierType::Glacier => "Glacier",
            GlacierType::IceCap => "Ice cap",
            GlacierType::PerennialSnowfield => "Perennial snowfield",
            GlacierType::SeasonalSnowfield => "Seasonal snowfield",
            GlacierType::NotAssigned => "Not assigned",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminusType {
    LandTerminating,
    MarineTerminating,
    LakeTerminating,
    DryCalving,
    Regenerated,
    ShelfTerminating,
    NotAssigned,
}

impl TerminusType {
    pub fn from_code(code: &str) -> Result<Self, WorkflowError> {
        match code.trim() {
            "0" => Ok(TerminusType::LandTerminating),
            "1" => Ok(TerminusType::MarineTerminating),
            "2" => Ok(TerminusType::LakeTerminating),
            "3" => Ok(TerminusType::DryCalving),
            "4" => Ok(TerminusType::Regenerated),
            "5" => Ok(TerminusType::ShelfTerminating),
            "9" => Ok(TerminusType::NotAssigned),
            other => Err(WorkflowError::InvalidEntity(format!("unknown terminus code {:?}", other))),
        }
    }

    pub fn is_tidewater(&self) -> bool {
        matches!(self, TerminusType::MarineTerminating | TerminusType::LakeTerminating)
    }
}

impl fmt::Display for TerminusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminusType::LandTerminating => "Land-terminating",
            TerminusType::MarineTerminating => "Marine-terminating",
            TerminusType::LakeTerminating => "Lake-terminating",
            TerminusType::DryCalving => "Dry calving",
            TerminusType::Regenerated => "Regenerated",
            TerminusType::ShelfTerminating => "Shelf-terminating",
            TerminusType::NotAssigned => "Not assigned",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlacierStatus {
    GlacierOrIceCap,
    GlacierComplex,
    Nominal,
    NotAssigned,
}

impl GlacierStatus {
    pub fn from_code(code: &str) -> Result<Self, WorkflowError> {
        match code.trim() {
            "0" => Ok(GlacierStatus::GlacierOrIceCap),
            "1" => Ok(GlacierStatus::GlacierComplex),
            "2" => Ok(GlacierStatus::Nominal),
            "9" => Ok(GlacierStatus::NotAssigned),
            other => Err(WorkflowError::InvalidEntity(format!("unknown status code {:?}", other))),
        }
    }
}

impl fmt::Display for GlacierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GlacierStatus::GlacierOrIceCap => "Glacier or ice cap",
            GlacierStatus::GlacierComplex => "Glacier complex",
            GlacierStatus::Nominal => "Nominal glacier",
            GlacierStatus::NotAssigned => "Not assigned",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hemisphere {
    North,
    South,
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hemisphere::North => "nh",
            Hemisphere::South => "sh",
        })
    }
}

/// Classification decoded from the raw attribute codes
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub glacier_type: GlacierType,
    pub terminus_type: TerminusType,
    pub status: GlacierStatus,
    /// Two-digit first-order region, e.g. `11`
    pub region: String,
    /// Region plus two-digit second-order region, e.g. `11-01`
    pub subregion: String,
    pub hemisphere: Hemisphere,
    /// Year of the outline date, when parseable
    pub date_year: Option<i32>,
}

impl Classification {
    pub fn decode(attrs: &EntityAttributes) -> Result<Self, WorkflowError> {
        let region = two_digit(&attrs.o1_region, "O1Region")?;
        let subregion = format!("{}-{}", region, two_digit(&attrs.o2_region, "O2Region")?);
        let date_year = attrs
            .bgn_date
            .as_deref()
            .and_then(|d| d.get(0..4))
            .and_then(|y| y.parse::<i32>().ok())
            .filter(|y| *y > 0);
        Ok(Self {
            glacier_type: GlacierType::from_code(&attrs.form)?,
            terminus_type: TerminusType::from_code(&attrs.term_type)?,
            status: GlacierStatus::from_code(&attrs.status)?,
            region,
            subregion,
            hemisphere: if attrs.cen_lat < 0.0 {
                Hemisphere::South
            } else {
                Hemisphere::North
            },
            date_year,
        })
    }

    pub fn is_tidewater(&self) -> bool {
        self.terminus_type.is_tidewater()
    }

    pub fn is_nominal(&self) -> bool {
        self.status == GlacierStatus::Nominal
    }

    pub fn is_icecap(&self) -> bool {
        self.glacier_type == GlacierType::IceCap
    }
}

fn two_digit(raw: &str, field: &str) -> Result<String, WorkflowError> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| WorkflowError::InvalidEntity(format!("{} is not a number: {:?}", field, raw)))?;
    Ok(format!("{:02}", value))
}

/// Cleans up inventory names: drops non-printable characters and trailing blanks.
pub fn filter_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim_end()
        .to_string()
}
