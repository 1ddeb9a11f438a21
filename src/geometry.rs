//! Labelled geometry collections.
//!
//! A [`GeometrySet`] is an ordered list of points, polygons and multipolygons, each with
//! a label that becomes its column name in sampled tables, plus one optional CRS shared
//! by all members.

use geo::{BoundingRect, MapCoords};
use geo_types::{Coord, Geometry};
use geojson::GeoJson;

use crate::crs::Crs;
use crate::error::{Result, WiwbError};
use crate::extent::Bounds;

/// An ordered, labelled collection of geometries sharing one CRS
#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySet {
    labels: Vec<String>,
    geometries: Vec<Geometry<f64>>,
    crs: Option<Crs>,
}

impl GeometrySet {
    /// Create a set labelled by position: `"0"`, `"1"`, ...
    pub fn new(geometries: Vec<Geometry<f64>>) -> Result<Self> {
        Self::with_labels(
            geometries
                .into_iter()
                .enumerate()
                .map(|(i, geometry)| (i.to_string(), geometry)),
        )
    }

    /// Create a set from `(label, geometry)` pairs
    pub fn with_labels<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Geometry<f64>)>,
        S: Into<String>,
    {
        let mut labels = Vec::new();
        let mut geometries = Vec::new();
        for (label, geometry) in entries {
            validate_kind(&geometry)?;
            let label = label.into();
            if labels.contains(&label) {
                return Err(WiwbError::validation(format!(
                    "Duplicate geometry label '{}'",
                    label
                )));
            }
            labels.push(label);
            geometries.push(geometry);
        }

        if geometries.is_empty() {
            return Err(WiwbError::validation("Geometry set is empty"));
        }

        Ok(Self {
            labels,
            geometries,
            crs: None,
        })
    }

    /// Parse a GeoJSON FeatureCollection, Feature or bare Geometry.
    ///
    /// Labels come from the feature id, then a `name` or `id` property, then the
    /// position. A legacy `crs` member is honoured; otherwise the set has no CRS.
    pub fn from_geojson(text: &str) -> Result<Self> {
        let geojson: GeoJson = text.parse()?;

        let (set, members) = match geojson {
            GeoJson::FeatureCollection(collection) => {
                let mut entries = Vec::with_capacity(collection.features.len());
                for (i, feature) in collection.features.into_iter().enumerate() {
                    entries.push(feature_entry(i, feature)?);
                }
                (Self::with_labels(entries)?, collection.foreign_members)
            }
            GeoJson::Feature(mut feature) => {
                let members = feature.foreign_members.take();
                (Self::with_labels([feature_entry(0, feature)?])?, members)
            }
            GeoJson::Geometry(mut geometry) => {
                let members = geometry.foreign_members.take();
                (Self::new(vec![Geometry::<f64>::try_from(geometry)?])?, members)
            }
        };

        let crs = match &members {
            Some(members) => members.get("crs").map(parse_legacy_crs).transpose()?,
            None => None,
        };
        Ok(match crs {
            Some(crs) => set.with_crs(crs),
            None => set,
        })
    }

    /// Label the set with a CRS without touching coordinates
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn geometries(&self) -> &[Geometry<f64>] {
        &self.geometries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Geometry<f64>)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.geometries.iter())
    }

    /// Bounding box of all members, `None` if every member is empty
    pub fn total_bounds(&self) -> Option<Bounds> {
        self.geometries
            .iter()
            .filter_map(|geometry| geometry.bounding_rect())
            .map(|rect| Bounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
            .reduce(|acc, bounds| acc.union(&bounds))
    }

    /// Transform all coordinates into `to`.
    ///
    /// Fails when the set has no CRS to transform from.
    pub fn reproject(&self, to: Crs) -> Result<Self> {
        let from = self.crs.ok_or_else(|| {
            WiwbError::configuration("Cannot reproject a geometry set without a CRS")
        })?;

        if from == to {
            return Ok(self.clone());
        }

        let geometries = self
            .geometries
            .iter()
            .map(|geometry| {
                geometry.map_coords(move |c: Coord<f64>| {
                    let (x, y) = from.transform(to, c.x, c.y);
                    Coord { x, y }
                })
            })
            .collect();

        Ok(Self {
            labels: self.labels.clone(),
            geometries,
            crs: Some(to),
        })
    }
}

fn validate_kind(geometry: &Geometry<f64>) -> Result<()> {
    let kind = match geometry {
        Geometry::Point(_) | Geometry::Polygon(_) | Geometry::MultiPolygon(_) => return Ok(()),
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    };
    Err(WiwbError::validation(format!(
        "Geometries must be Point, Polygon, or MultiPolygon, got {}",
        kind
    )))
}

fn feature_entry(position: usize, feature: geojson::Feature) -> Result<(String, Geometry<f64>)> {
    let label = match &feature.id {
        Some(geojson::feature::Id::String(id)) => id.clone(),
        Some(geojson::feature::Id::Number(id)) => id.to_string(),
        None => ["name", "id"]
            .iter()
            .find_map(|key| feature.property(key))
            .map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| position.to_string()),
    };

    let geometry = feature.geometry.ok_or_else(|| {
        WiwbError::validation(format!("Feature '{}' has no geometry", label))
    })?;

    Ok((label, Geometry::<f64>::try_from(geometry)?))
}

fn parse_legacy_crs(value: &serde_json::Value) -> Result<Crs> {
    let name = value
        .pointer("/properties/name")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| WiwbError::validation(format!("Unreadable GeoJSON crs member: {}", value)))?;

    if name.ends_with("CRS84") {
        return Ok(Crs::WGS84);
    }
    name.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon, Rect};

    fn rd_geometries() -> GeometrySet {
        GeometrySet::new(vec![
            Geometry::Point(point!(x: 119865.0, y: 449665.0)),
            Geometry::Polygon(Rect::new((119865.0, 449665.0), (127325.0, 453565.0)).to_polygon()),
        ])
        .unwrap()
        .with_crs(Crs::RD_NEW)
    }

    #[test]
    fn test_labels_default_to_position() {
        let set = rd_geometries();
        assert_eq!(set.labels(), &["0".to_string(), "1".to_string()]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.crs(), Some(Crs::RD_NEW));
    }

    #[test]
    fn test_unsupported_kind_fails() {
        let result = GeometrySet::new(vec![Geometry::LineString(
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
        )]);
        match result {
            Err(WiwbError::Validation { message }) => assert!(message.contains("LineString")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_set_fails() {
        assert!(GeometrySet::new(Vec::new()).is_err());
    }

    #[test]
    fn test_total_bounds() {
        let bounds = rd_geometries().total_bounds().unwrap();
        assert_eq!(bounds, Bounds::new(119865.0, 449665.0, 127325.0, 453565.0));
    }

    #[test]
    fn test_reproject_to_same_crs_is_noop() {
        let set = rd_geometries();
        assert_eq!(set.reproject(Crs::RD_NEW).unwrap(), set);
    }

    #[test]
    fn test_reproject_changes_coordinates_and_crs() {
        let set = rd_geometries();
        let wgs84 = set.reproject(Crs::WGS84).unwrap();
        assert_eq!(wgs84.crs(), Some(Crs::WGS84));
        let bounds = wgs84.total_bounds().unwrap();
        assert!(bounds.xll > 4.0 && bounds.xur < 6.0);
        assert!(bounds.yll > 51.5 && bounds.yur < 52.5);
    }

    #[test]
    fn test_reproject_without_crs_fails() {
        let set = GeometrySet::new(vec![Geometry::Point(point!(x: 1.0, y: 2.0))]).unwrap();
        assert!(matches!(
            set.reproject(Crs::WGS84),
            Err(WiwbError::Configuration { .. })
        ));
    }

    #[test]
    fn test_from_geojson_feature_collection() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::28992"}},
            "features": [
                {"type": "Feature", "id": "gauge", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [120000.0, 450000.0]}},
                {"type": "Feature", "properties": {"name": "polder"},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}},
                {"type": "Feature", "properties": null,
                 "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}
            ]
        }"#;
        let set = GeometrySet::from_geojson(text).unwrap();
        assert_eq!(
            set.labels(),
            &["gauge".to_string(), "polder".to_string(), "2".to_string()]
        );
        assert_eq!(set.crs(), Some(Crs::RD_NEW));
    }

    #[test]
    fn test_from_geojson_feature_keeps_legacy_crs() {
        let text = r#"{
            "type": "Feature",
            "crs": {"type": "name", "properties": {"name": "EPSG:4326"}},
            "properties": {},
            "geometry": {"type": "Point", "coordinates": [5.0, 52.0]}
        }"#;
        let set = GeometrySet::from_geojson(text).unwrap();
        assert_eq!(set.crs(), Some(Crs::WGS84));
        assert_eq!(set.labels(), &["0".to_string()]);
    }

    #[test]
    fn test_from_geojson_geometry_keeps_legacy_crs() {
        let text = r#"{
            "type": "Point",
            "coordinates": [5.0, 52.0],
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}}
        }"#;
        let set = GeometrySet::from_geojson(text).unwrap();
        assert_eq!(set.crs(), Some(Crs::WGS84));
    }

    #[test]
    fn test_from_geojson_geometry_without_crs() {
        let text = r#"{"type": "Point", "coordinates": [120000.0, 450000.0]}"#;
        assert_eq!(GeometrySet::from_geojson(text).unwrap().crs(), None);
    }

    #[test]
    fn test_duplicate_labels_fail() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "gauge", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [120000.0, 450000.0]}},
                {"type": "Feature", "id": "gauge", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [121000.0, 450000.0]}}
            ]
        }"#;
        match GeometrySet::from_geojson(text) {
            Err(WiwbError::Validation { message }) => assert!(message.contains("gauge")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_geojson_rejects_lines() {
        let text = r#"{"type": "LineString", "coordinates": [[0,0],[1,1]]}"#;
        assert!(GeometrySet::from_geojson(text).is_err());
    }

    #[test]
    fn test_polygon_macro_set() {
        let set = GeometrySet::with_labels([(
            "square",
            Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)]),
        )])
        .unwrap();
        assert_eq!(set.iter().next().map(|(label, _)| label), Some("square"));
    }
}
