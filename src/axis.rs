//! Axis model and request token grammars

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known vertical axis units
pub mod units {
    pub const MILLISECOND: &str = "ms";
    pub const SECOND: &str = "s";
    pub const METER: &str = "m";
    pub const FOOT: &str = "ft";
    pub const US_SURVEY_FOOT: &str = "usft";
    pub const UNITLESS: &str = "unitless";
}

/// Axis names accepted by slice and bound requests.
///
/// `I`, `J` and `K` address the cube by voxel index, the rest by annotation
/// value. `K`, `Depth`, `Time` and `Sample` all resolve to the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisName {
    I,
    J,
    K,
    Inline,
    Crossline,
    Depth,
    Time,
    Sample,
}

/// Which of the three parallel coordinate systems a value lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    Index,
    Annotation,
    Cdp,
}

/// Interpolation methods understood by the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Nearest,
    Linear,
    Cubic,
    Angular,
    Triangular,
}

impl AxisName {
    pub fn parse(direction: &str) -> Result<Self> {
        match direction.to_lowercase().as_str() {
            "i" => Ok(AxisName::I),
            "j" => Ok(AxisName::J),
            "k" => Ok(AxisName::K),
            "inline" => Ok(AxisName::Inline),
            "crossline" => Ok(AxisName::Crossline),
            "depth" => Ok(AxisName::Depth),
            "time" => Ok(AxisName::Time),
            "sample" => Ok(AxisName::Sample),
            _ => Err(Error::bad_request(format!(
                "invalid direction '{}', valid options are: \
                 i, j, k, inline, crossline or depth/time/sample",
                direction
            ))),
        }
    }

    /// Coordinate system linenos for this axis name are expressed in
    pub fn coordinate_system(&self) -> CoordinateSystem {
        match self {
            AxisName::I | AxisName::J | AxisName::K => CoordinateSystem::Index,
            _ => CoordinateSystem::Annotation,
        }
    }

    /// True for names resolving to the vertical axis
    pub fn is_vertical(&self) -> bool {
        matches!(
            self,
            AxisName::K | AxisName::Depth | AxisName::Time | AxisName::Sample
        )
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, AxisName::I | AxisName::Inline)
    }

    pub fn is_crossline(&self) -> bool {
        matches!(self, AxisName::J | AxisName::Crossline)
    }
}

impl fmt::Display for AxisName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AxisName::I => "i",
            AxisName::J => "j",
            AxisName::K => "k",
            AxisName::Inline => "inline",
            AxisName::Crossline => "crossline",
            AxisName::Depth => "depth",
            AxisName::Time => "time",
            AxisName::Sample => "sample",
        };
        write!(f, "{}", name)
    }
}

impl CoordinateSystem {
    pub fn parse(token: &str) -> Result<Self> {
        match token.to_lowercase().as_str() {
            "ij" => Ok(CoordinateSystem::Index),
            "ilxl" => Ok(CoordinateSystem::Annotation),
            "cdp" => Ok(CoordinateSystem::Cdp),
            _ => Err(Error::bad_request(format!(
                "coordinate system not recognized: '{}', valid options are: ij, ilxl, cdp",
                token
            ))),
        }
    }
}

impl Interpolation {
    /// Empty string selects the default (nearest).
    pub fn parse(token: &str) -> Result<Self> {
        match token.to_lowercase().as_str() {
            "" | "nearest" => Ok(Interpolation::Nearest),
            "linear" => Ok(Interpolation::Linear),
            "cubic" => Ok(Interpolation::Cubic),
            "angular" => Ok(Interpolation::Angular),
            "triangular" => Ok(Interpolation::Triangular),
            _ => Err(Error::bad_request(format!(
                "invalid interpolation method '{}', valid options are: \
                 nearest, linear, cubic, angular or triangular",
                token
            ))),
        }
    }
}

/// One resolved cube dimension.
///
/// `dimension` is the physical storage index: 0 is the vertical axis (fastest
/// varying), 1 is crossline, 2 is inline. Annotation values run
/// `min + k * stepsize` for `k` in `0..nsamples`.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    annotation: String,
    min: f64,
    max: f64,
    nsamples: usize,
    unit: String,
    dimension: usize,
}

impl Axis {
    pub fn new(
        annotation: impl Into<String>,
        min: f64,
        max: f64,
        nsamples: usize,
        unit: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            annotation: annotation.into(),
            min,
            max,
            nsamples,
            unit: unit.into(),
            dimension,
        }
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn nsamples(&self) -> usize {
        self.nsamples
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn stepsize(&self) -> f64 {
        if self.nsamples <= 1 {
            1.0
        } else {
            (self.max - self.min) / (self.nsamples - 1) as f64
        }
    }

    /// Annotation value of a voxel index
    pub fn value_at(&self, voxel: usize) -> f64 {
        self.min + voxel as f64 * self.stepsize()
    }

    /// Annotation value -> voxel corner coordinate (0 is the first sample
    /// corner; sampling positions add the half-voxel shift)
    pub fn to_voxel(&self, annotation: f64) -> f64 {
        (annotation - self.min) / self.stepsize()
    }

    /// Annotation value -> voxel center position, ready for the data fetch
    pub fn to_sample_position(&self, annotation: f64) -> f64 {
        self.to_voxel(annotation) + 0.5
    }

    /// Half-open in-range check around voxel centers. `voxel` is a corner
    /// coordinate as produced by [`Axis::to_voxel`].
    pub fn in_range(&self, voxel: f64) -> bool {
        voxel >= -0.5 && voxel < self.nsamples as f64 - 0.5
    }

    pub fn in_range_annotation(&self, annotation: f64) -> bool {
        self.in_range(self.to_voxel(annotation))
    }

    /// Validate a lineno in the given coordinate system and convert it to a
    /// voxel index. Annotation linenos must lie exactly on the axis grid.
    pub fn lineno_to_voxel(&self, lineno: i32, system: CoordinateSystem) -> Result<usize> {
        match system {
            CoordinateSystem::Index => {
                if lineno < 0 || lineno as usize >= self.nsamples {
                    return Err(self.invalid_lineno(lineno, 0.0, (self.nsamples - 1) as f64, 1.0));
                }
                Ok(lineno as usize)
            }
            CoordinateSystem::Annotation => {
                let step = self.stepsize();
                let k = (lineno as f64 - self.min) / step;
                let rounded = k.round();
                let on_grid = (k - rounded).abs() < 1e-6;
                if !on_grid || rounded < 0.0 || rounded >= self.nsamples as f64 {
                    return Err(self.invalid_lineno(lineno, self.min, self.max, step));
                }
                Ok(rounded as usize)
            }
            CoordinateSystem::Cdp => Err(Error::internal(
                "lineno cannot be expressed in world coordinates",
            )),
        }
    }

    fn invalid_lineno(&self, lineno: i32, min: f64, max: f64, step: f64) -> Error {
        Error::bad_request(format!(
            "Invalid lineno: {}, valid range: [{}:{}:{}]",
            lineno, min, max, step
        ))
    }
}

/// Check a vertical-domain request name against the cube's vertical unit.
///
/// Time requires a time unit, Depth a length unit and Sample an unitless
/// axis; index names and the horizontal annotations ignore the unit.
pub fn validate_vertical_domain(name: AxisName, sample_axis: &Axis) -> Result<()> {
    let unit = sample_axis.unit();
    let valid = match name {
        AxisName::Time => matches!(unit, units::MILLISECOND | units::SECOND),
        AxisName::Depth => {
            matches!(unit, units::METER | units::FOOT | units::US_SURVEY_FOOT)
        }
        AxisName::Sample => unit == units::UNITLESS,
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::bad_request(format!(
            "Cannot fetch {} slice for cube with vertical axis unit: {}",
            name, unit
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_axis() -> Axis {
        Axis::new("Sample", 4.0, 16.0, 4, units::MILLISECOND, 0)
    }

    fn inline_axis() -> Axis {
        Axis::new("Inline", 1.0, 5.0, 3, units::UNITLESS, 2)
    }

    #[test]
    fn test_parse_direction() {
        assert_eq!(AxisName::parse("inline").unwrap(), AxisName::Inline);
        assert_eq!(AxisName::parse("K").unwrap(), AxisName::K);
        let err = AxisName::parse("sand").unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("invalid direction 'sand'"));
    }

    #[test]
    fn test_parse_coordinate_system() {
        assert_eq!(
            CoordinateSystem::parse("ILXL").unwrap(),
            CoordinateSystem::Annotation
        );
        assert!(CoordinateSystem::parse("utm").is_err());
    }

    #[test]
    fn test_parse_interpolation() {
        assert_eq!(Interpolation::parse("").unwrap(), Interpolation::Nearest);
        assert_eq!(Interpolation::parse("CuBiC").unwrap(), Interpolation::Cubic);
        let err = Interpolation::parse("sand").unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid interpolation method 'sand'"));
    }

    #[test]
    fn test_annotation_voxel_roundtrip() {
        let axis = time_axis();
        for voxel in 0..axis.nsamples() {
            let annotation = axis.value_at(voxel);
            assert!((axis.to_voxel(annotation) - voxel as f64).abs() < 1e-9);
        }
        assert_eq!(axis.stepsize(), 4.0);
        assert_eq!(axis.to_sample_position(8.0), 1.5);
    }

    #[test]
    fn test_in_range_is_half_open_around_centers() {
        let axis = inline_axis();
        assert!(axis.in_range(-0.5));
        assert!(axis.in_range(2.4999));
        assert!(!axis.in_range(2.5));
        assert!(!axis.in_range(-0.5001));
    }

    #[test]
    fn test_lineno_annotation_grid() {
        let axis = time_axis();
        assert_eq!(
            axis.lineno_to_voxel(8, CoordinateSystem::Annotation).unwrap(),
            1
        );
        let err = axis
            .lineno_to_voxel(5, CoordinateSystem::Annotation)
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid lineno: 5, valid range: [4:16:4]");
        assert!(axis.lineno_to_voxel(20, CoordinateSystem::Annotation).is_err());
    }

    #[test]
    fn test_lineno_index_domain() {
        let axis = inline_axis();
        assert_eq!(axis.lineno_to_voxel(2, CoordinateSystem::Index).unwrap(), 2);
        let err = axis.lineno_to_voxel(3, CoordinateSystem::Index).unwrap_err();
        assert_eq!(err.to_string(), "Invalid lineno: 3, valid range: [0:2:1]");
        assert!(axis.lineno_to_voxel(-1, CoordinateSystem::Index).is_err());
    }

    #[test]
    fn test_vertical_domain_validation() {
        let axis = time_axis();
        validate_vertical_domain(AxisName::Time, &axis).unwrap();
        validate_vertical_domain(AxisName::Inline, &axis).unwrap();
        validate_vertical_domain(AxisName::K, &axis).unwrap();

        let err = validate_vertical_domain(AxisName::Depth, &axis).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot fetch depth slice for cube with vertical axis unit: ms"
        );
        assert!(validate_vertical_domain(AxisName::Sample, &axis).is_err());
    }
}
