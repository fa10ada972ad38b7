//! Voxel-space request rectangles for slice queries

use crate::axis::{validate_vertical_domain, Axis, AxisName, CoordinateSystem};
use crate::error::{Error, Result};
use crate::metadata::MetadataHandle;

/// A half-open constraint on one axis of a slice request, expressed in the
/// lineno domain of the named axis (annotation values for annotation names,
/// voxel indices for i/j/k). Lower and upper are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub direction: AxisName,
    pub lower: i32,
    pub upper: i32,
}

/// A voxel-space rectangle `[lower, upper)` per storage dimension
#[derive(Debug, Clone, PartialEq)]
pub struct SubVolume {
    lower: [usize; 3],
    upper: [usize; 3],
}

impl SubVolume {
    /// The full extent of the cube
    pub fn full(metadata: &MetadataHandle) -> Self {
        let shape = metadata.layout().shape();
        Self {
            lower: [0; 3],
            upper: shape,
        }
    }

    /// Apply bounds in order. Later bounds for the same axis override
    /// earlier ones; bounds on the slice axis are overridden afterwards by
    /// [`SubVolume::set_slice`]. Bounds naming a vertical domain that does
    /// not match the cube, or extents off the axis grid, fail.
    pub fn constrain(&mut self, metadata: &MetadataHandle, bounds: &[Bound]) -> Result<()> {
        for bound in bounds {
            validate_vertical_domain(bound.direction, &metadata.sample())?;

            let axis = metadata.axis(bound.direction);
            let system = bound.direction.coordinate_system();

            let lower = axis.lineno_to_voxel(bound.lower, system)?;
            let upper = axis.lineno_to_voxel(bound.upper, system)?;
            if lower > upper {
                return Err(Error::bad_request(format!(
                    "Invalid bound on {}: lower {} is above upper {}",
                    bound.direction, bound.lower, bound.upper
                )));
            }

            self.lower[axis.dimension()] = lower;
            self.upper[axis.dimension()] = upper + 1;
        }
        Ok(())
    }

    /// Pin the slice axis to a single voxel after lineno validation
    pub fn set_slice(
        &mut self,
        axis: &Axis,
        lineno: i32,
        system: CoordinateSystem,
    ) -> Result<()> {
        let voxel = axis.lineno_to_voxel(lineno, system)?;
        self.lower[axis.dimension()] = voxel;
        self.upper[axis.dimension()] = voxel + 1;
        Ok(())
    }

    pub fn lower(&self) -> [usize; 3] {
        self.lower
    }

    pub fn upper(&self) -> [usize; 3] {
        self.upper
    }

    pub fn range(&self, dimension: usize) -> (usize, usize) {
        (self.lower[dimension], self.upper[dimension])
    }

    pub fn nsamples(&self) -> usize {
        (0..3).map(|d| self.upper[d] - self.lower[d]).product()
    }

    /// The annotation extent of this rectangle along one axis:
    /// (min, max, samples)
    pub fn annotation_range(&self, axis: &Axis) -> (f64, f64, usize) {
        let (lower, upper) = self.range(axis.dimension());
        (
            axis.value_at(lower),
            axis.value_at(upper - 1),
            upper - lower,
        )
    }
}
