//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::error::{OwsError, OwsResult};
use crate::namespaces::OWS_1_1;
use crate::xml::Element;

/// An OWS bounding box: optional CRS plus lower and upper corners.
///
/// Corners are ordered coordinate tuples in the axis order of the CRS and
/// must have the same dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub crs: Option<String>,
    pub lower_corner: Vec<f64>,
    pub upper_corner: Vec<f64>,
}

impl BoundingBox {
    /// Create a two-dimensional bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            crs: None,
            lower_corner: vec![min_x, min_y],
            upper_corner: vec![max_x, max_y],
        }
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Create from explicit corners, rejecting mismatched dimensions.
    pub fn from_corners(crs: Option<&str>, lower: Vec<f64>, upper: Vec<f64>) -> OwsResult<Self> {
        let bbox = Self {
            crs: crs.map(str::to_string),
            lower_corner: lower,
            upper_corner: upper,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Parse an element holding `LowerCorner`/`UpperCorner` children and an
    /// optional `crs` attribute (`ows:BoundingBox`, `wps:BoundingBoxData`).
    pub fn from_element(element: &Element) -> OwsResult<Self> {
        let corner = |name: &str| -> OwsResult<Vec<f64>> {
            let text = element
                .child_local(name)
                .map(Element::text)
                .ok_or_else(|| OwsError::MissingElement(format!("ows:{}", name)))?;
            parse_corner(&text)
        };
        Self::from_corners(element.attr("crs"), corner("LowerCorner")?, corner("UpperCorner")?)
    }

    /// Render as `<namespace:local crs=".." dimensions="..">` with OWS corners.
    pub fn to_element(&self, namespace: &str, local: &str) -> Element {
        let mut element = Element::new(namespace, local);
        if let Some(crs) = &self.crs {
            element = element.with_attr("crs", crs.as_str());
        }
        element
            .with_attr("dimensions", self.dimensions().to_string())
            .with_child(Element::new(OWS_1_1, "LowerCorner").with_text(format_corner(&self.lower_corner)))
            .with_child(Element::new(OWS_1_1, "UpperCorner").with_text(format_corner(&self.upper_corner)))
    }

    pub fn dimensions(&self) -> usize {
        self.lower_corner.len()
    }

    /// Corners must be non-empty, of equal dimension and finite.
    pub fn validate(&self) -> OwsResult<()> {
        if self.lower_corner.is_empty() {
            return Err(OwsError::InvalidBbox("corners have no coordinates".to_string()));
        }
        if self.lower_corner.len() != self.upper_corner.len() {
            return Err(OwsError::InvalidBbox(format!(
                "lower corner has {} coordinates, upper corner has {}",
                self.lower_corner.len(),
                self.upper_corner.len()
            )));
        }
        if let Some(v) = self
            .lower_corner
            .iter()
            .chain(&self.upper_corner)
            .find(|v| !v.is_finite())
        {
            return Err(OwsError::InvalidNumber(v.to_string()));
        }
        Ok(())
    }
}

fn parse_corner(text: &str) -> OwsResult<Vec<f64>> {
    text.split_whitespace()
        .map(|v| v.parse().map_err(|_| OwsError::InvalidNumber(v.to_string())))
        .collect()
}

fn format_corner(coords: &[f64]) -> String {
    coords
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::{Namespaces, WPS_1_0_0};
    use crate::xml::parse;

    #[test]
    fn test_corners_accept_scientific_notation() {
        let element = parse(b"<BoundingBox><LowerCorner>1e-6 -2E3</LowerCorner><UpperCorner>1e6 2e6</UpperCorner></BoundingBox>").unwrap();
        let bbox = BoundingBox::from_element(&element).unwrap();
        assert_eq!(bbox.lower_corner, vec![1e-6, -2000.0]);
        assert_eq!(bbox.upper_corner, vec![1e6, 2e6]);
        assert_eq!(bbox.crs, None);
    }

    #[test]
    fn test_element_roundtrip() {
        let bbox = BoundingBox::new(-10.5, 40.0, 12.25, 60.0).with_crs("EPSG:4326");
        let element = bbox.to_element(WPS_1_0_0, "BoundingBoxData");
        assert_eq!(element.attr("dimensions"), Some("2"));

        let bytes = element.to_bytes(Namespaces::ogc()).unwrap();
        let parsed = BoundingBox::from_element(&parse(&bytes).unwrap()).unwrap();
        assert_eq!(parsed, bbox);
    }

    #[test]
    fn test_validate_mismatched_corners() {
        let result = BoundingBox::from_corners(None, vec![0.0, 0.0, 0.0], vec![1.0, 1.0]);
        assert!(matches!(result, Err(OwsError::InvalidBbox(_))));
    }

    #[test]
    fn test_from_element_missing_corner() {
        let element = parse(b"<BoundingBox><LowerCorner>0 0</LowerCorner></BoundingBox>").unwrap();
        assert!(matches!(
            BoundingBox::from_element(&element),
            Err(OwsError::MissingElement(_))
        ));
    }
}
