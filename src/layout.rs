//! Cube layout - the static description of one seismic cube

use crate::axis::Axis;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage dimension of the vertical axis (fastest varying)
pub const SAMPLE_DIM: usize = 0;
/// Storage dimension of the crossline axis
pub const CROSSLINE_DIM: usize = 1;
/// Storage dimension of the inline axis (slowest varying)
pub const INLINE_DIM: usize = 2;

/// Descriptor for one cube dimension as stored in the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDescriptor {
    /// Annotation name, e.g. "Inline", "Crossline", "Sample", "Time", "Depth"
    pub name: String,
    /// Unit of measurement, e.g. "ms", "m", "unitless"
    pub unit: String,
    /// Annotation value of the first sample
    pub min: f64,
    /// Annotation value of the last sample
    pub max: f64,
    /// Number of samples along this axis
    pub nsamples: usize,
}

impl AxisDescriptor {
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        min: f64,
        max: f64,
        nsamples: usize,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            min,
            max,
            nsamples,
        }
    }

    pub fn stepsize(&self) -> f64 {
        if self.nsamples <= 1 {
            1.0
        } else {
            (self.max - self.min) / (self.nsamples - 1) as f64
        }
    }
}

/// The survey bin grid: maps (inline index, crossline index) to world (CDP)
/// coordinates through scaling by the increments, counterclockwise rotation
/// and translation to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinGrid {
    /// World X of voxel (0, 0)
    pub xori: f64,
    /// World Y of voxel (0, 0)
    pub yori: f64,
    /// World distance between neighbouring inlines
    pub xinc: f64,
    /// World distance between neighbouring crosslines
    pub yinc: f64,
    /// Rotation of the inline direction, degrees counterclockwise from East
    pub rotation: f64,
}

/// Value range of the cube samples. Consumed by angular interpolation, which
/// treats sample values as a periodic phase over this range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self {
            min: -1.0,
            max: 1.0,
        }
    }
}

/// Complete static description of one cube: three annotated axes in storage
/// order, the bin grid, and import provenance.
///
/// Storage order is fixed: dimension 0 is the vertical axis (Sample, Time or
/// Depth), dimension 1 is Crossline, dimension 2 is Inline. Sample values at
/// increasing vertical index are contiguous in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeLayout {
    axes: [AxisDescriptor; 3],
    bingrid: BinGrid,
    crs: String,
    input_filename: String,
    import_time_stamp: DateTime<Utc>,
    value_range: ValueRange,
}

impl CubeLayout {
    pub fn new(
        axes: Vec<AxisDescriptor>,
        bingrid: BinGrid,
        crs: impl Into<String>,
        input_filename: impl Into<String>,
        import_time_stamp: DateTime<Utc>,
        value_range: ValueRange,
    ) -> Result<Self> {
        if axes.len() != 3 {
            return Err(Error::runtime(format!(
                "Unsupported cube, expected 3 dimensions, got {}",
                axes.len()
            )));
        }

        let axes: [AxisDescriptor; 3] = axes.try_into().expect("length checked above");

        let vertical_names = ["Sample", "Time", "Depth"];
        if !vertical_names.contains(&axes[SAMPLE_DIM].name.as_str())
            || axes[CROSSLINE_DIM].name != "Crossline"
            || axes[INLINE_DIM].name != "Inline"
        {
            return Err(Error::runtime(format!(
                "Unsupported axis order in cube, expected \
                 (Sample|Time|Depth, Crossline, Inline), got ({}, {}, {})",
                axes[SAMPLE_DIM].name, axes[CROSSLINE_DIM].name, axes[INLINE_DIM].name
            )));
        }

        for axis in &axes {
            if axis.nsamples < 1 {
                return Err(Error::runtime(format!(
                    "Axis {} has no samples",
                    axis.name
                )));
            }
            if axis.nsamples > 1 && axis.stepsize() <= 0.0 {
                return Err(Error::runtime(format!(
                    "Axis {} has non-positive stepsize",
                    axis.name
                )));
            }
        }

        Ok(Self {
            axes,
            bingrid,
            crs: crs.into(),
            input_filename: input_filename.into(),
            import_time_stamp,
            value_range,
        })
    }

    pub fn axis_descriptor(&self, dimension: usize) -> &AxisDescriptor {
        &self.axes[dimension]
    }

    /// Resolved axis for a storage dimension
    pub fn axis(&self, dimension: usize) -> Axis {
        let descriptor = &self.axes[dimension];
        Axis::new(
            descriptor.name.clone(),
            descriptor.min,
            descriptor.max,
            descriptor.nsamples,
            descriptor.unit.clone(),
            dimension,
        )
    }

    /// Number of samples per storage dimension
    pub fn shape(&self) -> [usize; 3] {
        [
            self.axes[0].nsamples,
            self.axes[1].nsamples,
            self.axes[2].nsamples,
        ]
    }

    pub fn total_samples(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn bingrid(&self) -> &BinGrid {
        &self.bingrid
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn input_filename(&self) -> &str {
        &self.input_filename
    }

    pub fn import_time_stamp(&self) -> DateTime<Utc> {
        self.import_time_stamp
    }

    pub fn value_range(&self) -> ValueRange {
        self.value_range
    }
}

/// Layout of the well-known 3x2x4 cube used across the test suite
#[cfg(test)]
pub(crate) fn well_known_layout() -> CubeLayout {
    use crate::axis::units;
    use chrono::TimeZone;

    CubeLayout::new(
        vec![
            AxisDescriptor::new("Sample", units::MILLISECOND, 4.0, 16.0, 4),
            AxisDescriptor::new("Crossline", units::UNITLESS, 10.0, 11.0, 2),
            AxisDescriptor::new("Inline", units::UNITLESS, 1.0, 5.0, 3),
        ],
        BinGrid {
            xori: 2.0,
            yori: 0.0,
            xinc: 7.2111,
            yinc: 3.6056,
            rotation: 33.69,
        },
        "utmXX",
        "well_known.segy",
        Utc.with_ymd_and_hms(2021, 2, 18, 21, 54, 42).unwrap(),
        ValueRange::new(100.0, 123.0),
    )
    .expect("valid layout")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::units;
    use chrono::TimeZone;

    fn grid() -> BinGrid {
        BinGrid {
            xori: 0.0,
            yori: 0.0,
            xinc: 1.0,
            yinc: 1.0,
            rotation: 0.0,
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 2, 18, 21, 54, 42).unwrap()
    }

    #[test]
    fn test_layout_requires_three_dimensions() {
        let err = CubeLayout::new(
            vec![
                AxisDescriptor::new("Sample", units::MILLISECOND, 0.0, 100.0, 11),
                AxisDescriptor::new("Crossline", units::UNITLESS, 0.0, 9.0, 10),
            ],
            grid(),
            "utmXX",
            "two_dims.segy",
            stamp(),
            ValueRange::default(),
        )
        .unwrap_err();

        assert!(err
            .to_string()
            .contains("expected 3 dimensions, got 2"));
    }

    #[test]
    fn test_layout_requires_known_axis_order() {
        let err = CubeLayout::new(
            vec![
                AxisDescriptor::new("Inline", units::UNITLESS, 1.0, 5.0, 3),
                AxisDescriptor::new("Crossline", units::UNITLESS, 10.0, 11.0, 2),
                AxisDescriptor::new("Sample", units::MILLISECOND, 4.0, 16.0, 4),
            ],
            grid(),
            "utmXX",
            "shuffled.segy",
            stamp(),
            ValueRange::default(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("Unsupported axis order"));
    }

    #[test]
    fn test_resolved_axis() {
        let layout = well_known_layout();
        let sample = layout.axis(SAMPLE_DIM);
        assert_eq!(sample.annotation(), "Sample");
        assert_eq!(sample.stepsize(), 4.0);
        assert_eq!(sample.dimension(), 0);

        let inline = layout.axis(INLINE_DIM);
        assert_eq!(inline.annotation(), "Inline");
        assert_eq!(inline.nsamples(), 3);
        assert_eq!(layout.shape(), [4, 2, 3]);
        assert_eq!(layout.total_samples(), 24);
    }
}
