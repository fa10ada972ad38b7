//! Conversions between the three parallel coordinate systems

use crate::axis::Axis;
use crate::error::{Error, Result};
use crate::layout::{CubeLayout, CROSSLINE_DIM, INLINE_DIM};

/// A 2-D world (CDP) position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Pure conversions over one cube between voxel index, annotation and world
/// coordinates.
///
/// Index conversions return voxel *corner* coordinates; sampling positions
/// are voxel centers, so callers go through [`CoordinateTransformer::to_sample_position`]
/// (or [`Axis::to_sample_position`]) before handing coordinates to the data
/// fetch. Transforms are their own inverses modulo floating point rounding.
#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    iline: Axis,
    xline: Axis,
    origin: Point,
    inline_spacing: (f64, f64),
    crossline_spacing: (f64, f64),
    det: f64,
}

impl CoordinateTransformer {
    pub fn new(layout: &CubeLayout) -> Result<Self> {
        let grid = layout.bingrid();
        let rad = grid.rotation.to_radians();
        let (sin, cos) = rad.sin_cos();

        let inline_spacing = (grid.xinc * cos, grid.xinc * sin);
        let crossline_spacing = (-grid.yinc * sin, grid.yinc * cos);
        let det = inline_spacing.0 * crossline_spacing.1 - inline_spacing.1 * crossline_spacing.0;
        if det.abs() < 1e-12 {
            return Err(Error::runtime(
                "Degenerate bin grid, inline and crossline directions are parallel",
            ));
        }

        Ok(Self {
            iline: layout.axis(INLINE_DIM),
            xline: layout.axis(CROSSLINE_DIM),
            origin: Point {
                x: grid.xori,
                y: grid.yori,
            },
            inline_spacing,
            crossline_spacing,
            det,
        })
    }

    /// (inline, crossline) annotation -> voxel corner coordinates
    pub fn annotation_to_index(&self, inline: f64, crossline: f64) -> [f64; 2] {
        [self.iline.to_voxel(inline), self.xline.to_voxel(crossline)]
    }

    /// Voxel corner coordinates -> (inline, crossline) annotation
    pub fn index_to_annotation(&self, i: f64, j: f64) -> [f64; 2] {
        [
            self.iline.min() + i * self.iline.stepsize(),
            self.xline.min() + j * self.xline.stepsize(),
        ]
    }

    /// Voxel corner coordinates -> world position
    pub fn index_to_world(&self, i: f64, j: f64) -> Point {
        Point {
            x: self.origin.x + i * self.inline_spacing.0 + j * self.crossline_spacing.0,
            y: self.origin.y + i * self.inline_spacing.1 + j * self.crossline_spacing.1,
        }
    }

    /// World position -> voxel corner coordinates
    pub fn world_to_index(&self, point: Point) -> [f64; 2] {
        let dx = point.x - self.origin.x;
        let dy = point.y - self.origin.y;
        [
            (dx * self.crossline_spacing.1 - dy * self.crossline_spacing.0) / self.det,
            (self.inline_spacing.0 * dy - self.inline_spacing.1 * dx) / self.det,
        ]
    }

    /// (inline, crossline) annotation -> world position
    pub fn annotation_to_world(&self, inline: f64, crossline: f64) -> Point {
        let [i, j] = self.annotation_to_index(inline, crossline);
        self.index_to_world(i, j)
    }

    /// World position -> (inline, crossline) annotation
    pub fn world_to_annotation(&self, point: Point) -> [f64; 2] {
        let [i, j] = self.world_to_index(point);
        self.index_to_annotation(i, j)
    }

    /// Voxel corner coordinates -> voxel center sampling positions.
    ///
    /// The single site for the half-voxel shift between the corner origin
    /// reported by the coordinate model and the centers the data fetch
    /// samples at.
    pub fn to_sample_position(&self, corner: [f64; 2]) -> [f64; 2] {
        [corner[0] + 0.5, corner[1] + 0.5]
    }

    pub fn iline(&self) -> &Axis {
        &self.iline
    }

    pub fn xline(&self) -> &Axis {
        &self.xline
    }
}
