// MRV Registry
// Copyright (C) 2019 Monadic GmbH <radicle@monadic.xyz>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as
// published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Drone-derived project evidence.
//!
//! Evidence is turned into a metadata document whose [canonical] reference is submitted to the
//! ledger together with the estimated amount of sequestered carbon.
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::{canonical, Tons};

/// Lower bound of the biomass factor per area unit.
pub const MIN_BIOMASS_FACTOR: f64 = 0.1;
/// Upper bound of the biomass factor per area unit.
pub const MAX_BIOMASS_FACTOR: f64 = 10.0;

/// Evidence record as produced by the drone survey tooling.
///
/// Missing fields take the defaults of the survey tooling: an index of `0.5`, an area of `1.0`
/// and no images.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "SurveyFile")]
pub struct Evidence {
    /// Normalized vegetation index, between `0.0` and `1.0`.
    pub normalized_index: f64,
    /// Surveyed area in hectares.
    pub area_units: f64,
    pub image_refs: Vec<String>,
    /// Measurements exactly as the survey file wrote them. `3` and `3.0` hash differently.
    written: Written,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Written {
    avg_ndvi: Option<Number>,
    area_ha: Option<Number>,
}

#[derive(Deserialize)]
struct SurveyFile {
    #[serde(default)]
    avg_ndvi: Option<Number>,
    #[serde(default)]
    area_ha: Option<Number>,
    #[serde(default)]
    images: Vec<String>,
}

impl From<SurveyFile> for Evidence {
    fn from(file: SurveyFile) -> Self {
        let value = |number: &Option<Number>, default: f64| {
            number.as_ref().and_then(Number::as_f64).unwrap_or(default)
        };
        Evidence {
            normalized_index: value(&file.avg_ndvi, DEFAULT_INDEX),
            area_units: value(&file.area_ha, DEFAULT_AREA),
            image_refs: file.images,
            written: Written {
                avg_ndvi: file.avg_ndvi,
                area_ha: file.area_ha,
            },
        }
    }
}

const DEFAULT_INDEX: f64 = 0.5;
const DEFAULT_AREA: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvidenceError {
    #[error("malformed evidence: {0}")]
    Malformed(String),

    #[error("normalized index must be between 0.0 and 1.0, got {0}")]
    IndexOutOfRange(f64),

    #[error("area must be a positive number, got {0}")]
    InvalidArea(f64),

    #[error("cannot encode metadata: {0}")]
    Encoding(String),
}

/// The document a metadata reference is computed from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metadata<'a> {
    pub area_ha: Value,
    pub avg_ndvi: Value,
    pub estimated_biomass_tons: Tons,
    pub images: &'a [String],
    pub source: &'static str,
}

/// `trunc(clamp(normalized_index * 10, 0.1, 10.0) * area_units)`
pub fn estimate_biomass(normalized_index: f64, area_units: f64) -> Tons {
    let factor = (normalized_index * 10.0).clamp(MIN_BIOMASS_FACTOR, MAX_BIOMASS_FACTOR);
    (factor * area_units) as Tons
}

impl Evidence {
    pub fn new(normalized_index: f64, area_units: f64, image_refs: Vec<String>) -> Self {
        Evidence {
            normalized_index,
            area_units,
            image_refs,
            written: Written::default(),
        }
    }

    /// Parse and validate evidence from the JSON produced by a drone survey.
    pub fn from_json(json: &str) -> Result<Self, EvidenceError> {
        let evidence: Evidence =
            serde_json::from_str(json).map_err(|e| EvidenceError::Malformed(e.to_string()))?;
        evidence.validate()?;
        Ok(evidence)
    }

    pub fn validate(&self) -> Result<(), EvidenceError> {
        if !self.normalized_index.is_finite() || !(0.0..=1.0).contains(&self.normalized_index) {
            return Err(EvidenceError::IndexOutOfRange(self.normalized_index));
        }
        if !self.area_units.is_finite() || self.area_units <= 0.0 {
            return Err(EvidenceError::InvalidArea(self.area_units));
        }
        Ok(())
    }

    pub fn estimated_biomass(&self) -> Tons {
        estimate_biomass(self.normalized_index, self.area_units)
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            area_ha: measurement(&self.written.area_ha, self.area_units),
            avg_ndvi: measurement(&self.written.avg_ndvi, self.normalized_index),
            estimated_biomass_tons: self.estimated_biomass(),
            images: &self.image_refs,
            source: "drone",
        }
    }

    /// Validate the evidence and compute the reference of its metadata document.
    pub fn metadata_ref(&self) -> Result<String, EvidenceError> {
        self.validate()?;
        canonical::content_ref(&self.metadata()).map_err(|e| EvidenceError::Encoding(e.to_string()))
    }
}

/// The number as written if it still matches `value`, otherwise `value` itself.
fn measurement(written: &Option<Number>, value: f64) -> Value {
    match written {
        Some(number) if number.as_f64() == Some(value) => Value::Number(number.clone()),
        _ => Value::from(value),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sample_survey() {
        let evidence =
            Evidence::from_json(r#"{"avg_ndvi": 0.6, "area_ha": 2.5, "images": ["img1.jpg"]}"#)
                .unwrap();
        assert_eq!(evidence.estimated_biomass(), 15);
        assert_eq!(
            canonical::to_bytes(&evidence.metadata()).unwrap(),
            br#"{"area_ha": 2.5, "avg_ndvi": 0.6, "estimated_biomass_tons": 15, "images": ["img1.jpg"], "source": "drone"}"#.to_vec()
        );
        assert_eq!(
            evidence.metadata_ref().unwrap(),
            "sha256:702efb84d778407f237e98242f3137c620e952bf5d55a9a6cf42f11f4f8a8541"
        );
    }

    #[test]
    fn numbers_are_hashed_as_written() {
        let integral = Evidence::from_json(r#"{"avg_ndvi": 0.6, "area_ha": 3}"#).unwrap();
        assert_eq!(integral.estimated_biomass(), 18);
        assert_eq!(
            canonical::to_bytes(&integral.metadata()).unwrap(),
            br#"{"area_ha": 3, "avg_ndvi": 0.6, "estimated_biomass_tons": 18, "images": [], "source": "drone"}"#.to_vec()
        );

        let fractional = Evidence::from_json(r#"{"avg_ndvi": 0.6, "area_ha": 3.0}"#).unwrap();
        assert_eq!(fractional.area_units, integral.area_units);
        assert_ne!(
            fractional.metadata_ref().unwrap(),
            integral.metadata_ref().unwrap()
        );
        assert_eq!(
            fractional.metadata_ref().unwrap(),
            Evidence::new(0.6, 3.0, vec![]).metadata_ref().unwrap()
        );
    }

    #[test]
    fn field_order_does_not_matter() {
        let a = Evidence::from_json(r#"{"images": ["a", "b"], "area_ha": 4.0, "avg_ndvi": 0.25}"#)
            .unwrap();
        let b = Evidence::from_json(r#"{"avg_ndvi": 0.25, "images": ["a", "b"], "area_ha": 4.0}"#)
            .unwrap();
        assert_eq!(a.metadata_ref().unwrap(), b.metadata_ref().unwrap());
    }

    #[test]
    fn defaults() {
        let evidence = Evidence::from_json("{}").unwrap();
        assert_eq!(evidence, Evidence::new(0.5, 1.0, vec![]));
        assert_eq!(evidence.estimated_biomass(), 5);
    }

    #[test]
    fn biomass_factor_is_clamped() {
        assert_eq!(estimate_biomass(0.0, 100.0), 10);
        assert_eq!(estimate_biomass(1.0, 3.0), 30);
        assert_eq!(estimate_biomass(0.33, 1.0), 3);
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(
            Evidence::new(1.2, 1.0, vec![]).metadata_ref(),
            Err(EvidenceError::IndexOutOfRange(1.2))
        );
        assert_eq!(
            Evidence::new(0.4, 0.0, vec![]).validate(),
            Err(EvidenceError::InvalidArea(0.0))
        );
        assert!(matches!(
            Evidence::new(f64::NAN, 1.0, vec![]).validate(),
            Err(EvidenceError::IndexOutOfRange(_))
        ));
        assert!(matches!(
            Evidence::from_json(r#"{"area_ha": "large"}"#),
            Err(EvidenceError::Malformed(_))
        ));
    }
}
