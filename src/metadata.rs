//! Metadata handle - resolved axes and survey-level information for one cube

use crate::axis::{Axis, AxisName};
use crate::coords::CoordinateTransformer;
use crate::error::Result;
use crate::layout::{CubeLayout, CROSSLINE_DIM, INLINE_DIM, SAMPLE_DIM};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The survey's horizontal extent, as the four corner points
/// `[min,min], [max,min], [max,max], [min,max]` in each coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub cdp: Vec<[f64; 2]>,
    pub ilxl: Vec<[f64; 2]>,
    pub ij: Vec<[f64; 2]>,
}

/// Resolves logical axes to physical dimensions and exposes the cube's
/// survey metadata.
#[derive(Clone)]
pub struct MetadataHandle {
    layout: Arc<CubeLayout>,
    transformer: CoordinateTransformer,
}

impl MetadataHandle {
    pub fn new(layout: Arc<CubeLayout>) -> Result<Self> {
        let transformer = CoordinateTransformer::new(&layout)?;
        Ok(Self {
            layout,
            transformer,
        })
    }

    pub fn layout(&self) -> &CubeLayout {
        &self.layout
    }

    pub fn iline(&self) -> Axis {
        self.layout.axis(INLINE_DIM)
    }

    pub fn xline(&self) -> Axis {
        self.layout.axis(CROSSLINE_DIM)
    }

    pub fn sample(&self) -> Axis {
        self.layout.axis(SAMPLE_DIM)
    }

    /// Resolve a request axis name to the physical axis it addresses
    pub fn axis(&self, name: AxisName) -> Axis {
        if name.is_inline() {
            self.iline()
        } else if name.is_crossline() {
            self.xline()
        } else {
            self.sample()
        }
    }

    pub fn transformer(&self) -> &CoordinateTransformer {
        &self.transformer
    }

    pub fn crs(&self) -> &str {
        self.layout.crs()
    }

    pub fn input_filename(&self) -> &str {
        self.layout.input_filename()
    }

    pub fn import_time_stamp(&self) -> DateTime<Utc> {
        self.layout.import_time_stamp()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let last_inline = (self.iline().nsamples() - 1) as f64;
        let last_crossline = (self.xline().nsamples() - 1) as f64;
        let corners = [
            [0.0, 0.0],
            [last_inline, 0.0],
            [last_inline, last_crossline],
            [0.0, last_crossline],
        ];

        let mut bounding_box = BoundingBox {
            cdp: Vec::with_capacity(4),
            ilxl: Vec::with_capacity(4),
            ij: Vec::with_capacity(4),
        };
        for [i, j] in corners {
            let world = self.transformer.index_to_world(i, j);
            bounding_box.cdp.push([world.x, world.y]);
            bounding_box.ilxl.push(self.transformer.index_to_annotation(i, j));
            bounding_box.ij.push([i, j]);
        }
        bounding_box
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::well_known_layout;

    fn handle() -> MetadataHandle {
        MetadataHandle::new(Arc::new(well_known_layout())).unwrap()
    }

    #[test]
    fn test_axis_resolution() {
        let meta = handle();
        assert_eq!(meta.axis(AxisName::I).annotation(), "Inline");
        assert_eq!(meta.axis(AxisName::Inline).annotation(), "Inline");
        assert_eq!(meta.axis(AxisName::J).annotation(), "Crossline");
        assert_eq!(meta.axis(AxisName::K).annotation(), "Sample");
        assert_eq!(meta.axis(AxisName::Time).annotation(), "Sample");
        assert_eq!(meta.axis(AxisName::Sample).dimension(), 0);
    }

    #[test]
    fn test_bounding_box() {
        let bounding_box = handle().bounding_box();
        assert_eq!(
            bounding_box.ij,
            vec![[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [0.0, 1.0]]
        );
        assert_eq!(
            bounding_box.ilxl,
            vec![[1.0, 10.0], [5.0, 10.0], [5.0, 11.0], [1.0, 11.0]]
        );

        let expected_cdp = [[2.0, 0.0], [14.0, 8.0], [12.0, 11.0], [0.0, 3.0]];
        for (actual, expected) in bounding_box.cdp.iter().zip(expected_cdp) {
            assert!((actual[0] - expected[0]).abs() < 1e-2);
            assert!((actual[1] - expected[1]).abs() < 1e-2);
        }
    }

    #[test]
    fn test_survey_metadata() {
        let meta = handle();
        assert_eq!(meta.crs(), "utmXX");
        assert_eq!(meta.input_filename(), "well_known.segy");
    }
}
