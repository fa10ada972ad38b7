//! Regular surfaces - rotated, translated height maps over the cube

use crate::coords::Point;
use crate::error::{Error, Result};

/// Geometry of a surface grid: origin, column/row increments and rotation
/// (degrees counterclockwise from East).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub xori: f64,
    pub yori: f64,
    pub xinc: f64,
    pub yinc: f64,
    pub rotation: f64,
}

impl Plane {
    /// Column direction unit step in world coordinates
    fn column_step(&self) -> (f64, f64) {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        (self.xinc * cos, self.xinc * sin)
    }

    /// Row direction unit step in world coordinates
    fn row_step(&self) -> (f64, f64) {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        (-self.yinc * sin, self.yinc * cos)
    }
}

/// A 2-D grid of vertical positions located in world space.
///
/// `value(row, col)` is a vertical coordinate or the fill sentinel. Grid
/// position to world is the rotated affine
/// `(x, y) = origin + col * xinc * (cos r, sin r) + row * yinc * (-sin r, cos r)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularSurface {
    values: Vec<f32>,
    nrows: usize,
    ncols: usize,
    plane: Plane,
    fillvalue: f32,
}

impl RegularSurface {
    /// Build a surface from row vectors. All rows must have the same length.
    pub fn new(values: Vec<Vec<f32>>, plane: Plane, fillvalue: f32) -> Result<Self> {
        if values.is_empty() || values[0].is_empty() {
            return Err(Error::bad_request("Surface must have at least one cell"));
        }

        let ncols = values[0].len();
        for (row, data) in values.iter().enumerate() {
            if data.len() != ncols {
                return Err(Error::bad_request(format!(
                    "Surface rows are not of the same length. \
                     Row 0 has {} elements. Row {} has {} elements",
                    ncols,
                    row,
                    data.len()
                )));
            }
        }

        let nrows = values.len();
        Ok(Self {
            values: values.into_iter().flatten().collect(),
            nrows,
            ncols,
            plane,
            fillvalue,
        })
    }

    /// Build a surface over an existing flat row-major buffer
    pub fn from_flat(
        values: Vec<f32>,
        nrows: usize,
        ncols: usize,
        plane: Plane,
        fillvalue: f32,
    ) -> Result<Self> {
        if nrows == 0 || ncols == 0 || values.len() != nrows * ncols {
            return Err(Error::internal(format!(
                "Surface buffer of {} values does not match {}x{} grid",
                values.len(),
                nrows,
                ncols
            )));
        }
        Ok(Self {
            values,
            nrows,
            ncols,
            plane,
            fillvalue,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of cells in the horizontal plane
    pub fn size(&self) -> usize {
        self.nrows * self.ncols
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    pub fn fillvalue(&self) -> f32 {
        self.fillvalue
    }

    pub fn is_fill(&self, value: f32) -> bool {
        value == self.fillvalue
    }

    pub fn value(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.ncols + col]
    }

    /// Value at a row-major cell index
    pub fn value_at(&self, cell: usize) -> f32 {
        self.values[cell]
    }

    pub fn set_value_at(&mut self, cell: usize, value: f32) {
        self.values[cell] = value;
    }

    /// World position of a row-major cell index
    pub fn to_cdp(&self, cell: usize) -> Point {
        let row = (cell / self.ncols) as f64;
        let col = (cell % self.ncols) as f64;
        let column_step = self.plane.column_step();
        let row_step = self.plane.row_step();
        Point {
            x: self.plane.xori + col * column_step.0 + row * row_step.0,
            y: self.plane.yori + col * column_step.1 + row * row_step.1,
        }
    }

    /// Fractional (row, col) grid position of a world point
    pub fn from_cdp(&self, point: Point) -> (f64, f64) {
        let column_step = self.plane.column_step();
        let row_step = self.plane.row_step();
        let det = column_step.0 * row_step.1 - column_step.1 * row_step.0;
        let dx = point.x - self.plane.xori;
        let dy = point.y - self.plane.yori;
        let col = (dx * row_step.1 - dy * row_step.0) / det;
        let row = (column_step.0 * dy - column_step.1 * dx) / det;
        (row, col)
    }

    /// A copy with every non-fill cell shifted by `offset`; fill cells stay
    /// fill.
    pub fn shifted(&self, offset: f32) -> Self {
        let values = self
            .values
            .iter()
            .map(|&v| if self.is_fill(v) { v } else { v + offset })
            .collect();
        Self {
            values,
            nrows: self.nrows,
            ncols: self.ncols,
            plane: self.plane,
            fillvalue: self.fillvalue,
        }
    }

    /// An all-fill copy on the same grid
    pub fn filled_like(&self) -> Self {
        Self {
            values: vec![self.fillvalue; self.size()],
            nrows: self.nrows,
            ncols: self.ncols,
            plane: self.plane,
            fillvalue: self.fillvalue,
        }
    }
}
