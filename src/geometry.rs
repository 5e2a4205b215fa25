//! GeoJSON geometries carried by Locations and FeaturesOfInterest.
//!
//! A geometry is validated as a unit: `type` and `coordinates` must both be
//! present, and the nesting depth of `coordinates` must match the type.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Document, InvalidError};

/// The GeoJSON geometry types a location may be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

impl GeometryType {
    /// How many array levels wrap a single position.
    fn position_depth(self) -> usize {
        match self {
            GeometryType::Point => 0,
            GeometryType::MultiPoint | GeometryType::LineString => 1,
            GeometryType::MultiLineString | GeometryType::Polygon => 2,
            GeometryType::MultiPolygon => 3,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::LineString => "LineString",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPolygon => "MultiPolygon",
        }
    }
}

impl Display for GeometryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GeometryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Point" => Ok(GeometryType::Point),
            "MultiPoint" => Ok(GeometryType::MultiPoint),
            "LineString" => Ok(GeometryType::LineString),
            "MultiLineString" => Ok(GeometryType::MultiLineString),
            "Polygon" => Ok(GeometryType::Polygon),
            "MultiPolygon" => Ok(GeometryType::MultiPolygon),
            _ => Err(format!("unsupported geometry type {:?}", s)),
        }
    }
}

/// A validated GeoJSON geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryType,
    pub coordinates: Value,
}

impl Geometry {
    /// A two-dimensional point.
    pub fn point(x: f64, y: f64) -> Self {
        Geometry {
            kind: GeometryType::Point,
            coordinates: serde_json::json!([x, y]),
        }
    }

    /// Reads the geometry stored under `field`, if present.
    pub fn from_field(doc: &Document<'_>, field: &str) -> Result<Option<Self>, InvalidError> {
        let Some(geometry) = doc.object(field)? else {
            return Ok(None);
        };
        let type_field = format!("{}/type", field);
        let coordinates_field = format!("{}/coordinates", field);
        let kind: GeometryType = geometry
            .parse("type")
            .map_err(|e| InvalidError::field(&type_field, e.reason, doc))?
            .ok_or_else(|| InvalidError::missing(&type_field, doc))?;
        let coordinates = geometry
            .get("coordinates")
            .ok_or_else(|| InvalidError::missing(&coordinates_field, doc))?;
        if !has_depth(coordinates, kind.position_depth()) {
            return Err(InvalidError::field(
                coordinates_field,
                format!("coordinates do not form a {}", kind),
                doc,
            ));
        }
        Ok(Some(Geometry {
            kind,
            coordinates: coordinates.clone(),
        }))
    }
}

fn has_depth(value: &Value, depth: usize) -> bool {
    match (depth, value) {
        (0, value) => is_position(value),
        (_, Value::Array(items)) => {
            !items.is_empty() && items.iter().all(|item| has_depth(item, depth - 1))
        }
        _ => false,
    }
}

fn is_position(value: &Value) -> bool {
    match value {
        Value::Array(items) => (2..=3).contains(&items.len()) && items.iter().all(Value::is_number),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read(value: Value) -> Result<Option<Geometry>, InvalidError> {
        let doc = Document::new(&value).unwrap();
        Geometry::from_field(&doc, "location")
    }

    #[test]
    fn point() {
        let g = read(json!({"location": {"type": "Point", "coordinates": [-117.1, 51.05]}}))
            .unwrap()
            .unwrap();
        assert_eq!(g, Geometry::point(-117.1, 51.05));
    }

    #[test]
    fn absent() {
        assert_eq!(read(json!({})).unwrap(), None);
    }

    #[test]
    fn polygon_depth() {
        let ring = json!([[0, 0], [1, 0], [1, 1], [0, 0]]);
        assert!(read(json!({"location": {"type": "Polygon", "coordinates": [ring]}})).is_ok());
        let err = read(json!({"location": {"type": "Polygon", "coordinates": ring}})).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("location/coordinates"));
    }

    #[test]
    fn partial_composite_rejected() {
        let err = read(json!({"location": {"type": "Point"}})).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("location/coordinates"));
        let err = read(json!({"location": {"coordinates": [1, 2]}})).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("location/type"));
    }

    #[test]
    fn unknown_type_rejected() {
        let err =
            read(json!({"location": {"type": "Circle", "coordinates": [1, 2]}})).unwrap_err();
        assert!(err.reason.contains("Circle"));
    }

    #[test]
    fn position_arity() {
        assert!(read(json!({"location": {"type": "Point", "coordinates": [1]}})).is_err());
        assert!(read(json!({"location": {"type": "Point", "coordinates": [1, 2, 3]}})).is_ok());
        assert!(read(json!({"location": {"type": "Point", "coordinates": [1, "2"]}})).is_err());
    }
}
