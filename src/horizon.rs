//! Windowed horizons - per-cell vertical sample windows over a surface
//!
//! A windowed horizon holds multiple vertical samples for each horizontal
//! position of a surface. Samples for one cell are contiguous; cells are
//! packed back to back and located through a prefix-sum offset table, so a
//! fill or out-of-range cell occupies no buffer space at all.

use crate::axis::Interpolation;
use crate::error::{Error, Result};
use crate::handle::DataHandle;
use crate::metadata::MetadataHandle;
use crate::surface::RegularSurface;
use crate::volume::VoxelPosition;
use crate::window::{VerticalWindow, INTERPOLATION_MARGIN};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Packed per-cell vertical windows plus the offset table locating them
#[derive(Debug)]
pub struct Horizon {
    buffer: Vec<f32>,
    offsets: Arc<Vec<usize>>,
    fillvalue: f32,
}

impl Horizon {
    /// Number of cells in the horizontal plane
    pub fn hsize(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Bytes of one attribute map calculated from this horizon
    pub fn mapsize(&self) -> usize {
        self.hsize() * std::mem::size_of::<f32>()
    }

    pub fn fillvalue(&self) -> f32 {
        self.fillvalue
    }

    /// The vertical window of one cell; empty for fill and out-of-range
    /// cells
    pub fn window(&self, cell: usize) -> &[f32] {
        &self.buffer[self.offsets[cell]..self.offsets[cell + 1]]
    }
}

/// Surfaces framing one attribute request: the reference horizon and the
/// top/bottom extent of the vertical window at every cell. All three share
/// the same grid; `top <= reference <= bottom` holds at every populated
/// cell.
pub struct SurfaceTriple {
    pub reference: RegularSurface,
    pub top: RegularSurface,
    pub bottom: RegularSurface,
}

impl SurfaceTriple {
    fn validate(&self) -> Result<()> {
        let same_size = self.reference.size() == self.top.size()
            && self.reference.size() == self.bottom.size();
        let same_plane = self.reference.plane() == self.top.plane()
            && self.reference.plane() == self.bottom.plane();
        if !same_size || !same_plane {
            return Err(Error::internal(
                "Expected reference, top and bottom surfaces to share one grid",
            ));
        }
        Ok(())
    }

    /// True when any of the three surfaces marks this cell as fill
    fn is_fill(&self, cell: usize) -> bool {
        self.reference.is_fill(self.reference.value_at(cell))
            || self.top.is_fill(self.top.value_at(cell))
            || self.bottom.is_fill(self.bottom.value_at(cell))
    }
}

/// Squeezed source window for this cube's vertical axis
fn source_window(metadata: &MetadataHandle, margin: usize) -> VerticalWindow {
    let sample = metadata.sample();
    VerticalWindow::squeezed(sample.stepsize(), margin, sample.min())
}

/// Compute the offset table for a horizon over `surfaces`.
///
/// `offsets[k + 1] - offsets[k]` is the number of vertical samples cell `k`
/// will occupy: zero for cells that are fill on any surface or fall outside
/// the horizontal extent of the cube, the squeezed window size otherwise.
pub fn buffer_offsets(
    metadata: &MetadataHandle,
    surfaces: &SurfaceTriple,
) -> Result<Vec<usize>> {
    surfaces.validate()?;

    let transformer = metadata.transformer();
    let iline = metadata.iline();
    let xline = metadata.xline();
    let mut window = source_window(metadata, INTERPOLATION_MARGIN);

    let hsize = surfaces.reference.size();
    let mut offsets = vec![0; hsize + 1];

    for cell in 0..hsize {
        if surfaces.is_fill(cell) {
            offsets[cell + 1] = offsets[cell];
            continue;
        }

        let reference = surfaces.reference.value_at(cell) as f64;
        let top = surfaces.top.value_at(cell) as f64;
        let bottom = surfaces.bottom.value_at(cell) as f64;
        if reference < top || reference > bottom {
            return Err(Error::internal(
                "Surfaces are not ordered as top <= reference <= bottom",
            ));
        }

        let [i, j] = transformer.world_to_index(surfaces.reference.to_cdp(cell));
        if !iline.in_range(i) || !xline.in_range(j) {
            offsets[cell + 1] = offsets[cell];
            continue;
        }

        window.fit(reference - top, bottom - reference);
        offsets[cell + 1] = offsets[cell] + window.size();
    }

    Ok(offsets)
}

/// Sample coordinates for the populated cells of `[from, to)`, in offset
/// order
fn chunk_coordinates(
    metadata: &MetadataHandle,
    surfaces: &SurfaceTriple,
    offsets: &[usize],
    from: usize,
    to: usize,
) -> Result<Vec<VoxelPosition>> {
    let transformer = metadata.transformer();
    let iline = metadata.iline();
    let xline = metadata.xline();
    let sample = metadata.sample();
    let mut window = source_window(metadata, INTERPOLATION_MARGIN);

    let mut coordinates = Vec::with_capacity(offsets[to] - offsets[from]);
    for cell in from..to {
        if offsets[cell] == offsets[cell + 1] {
            continue;
        }

        let reference = surfaces.reference.value_at(cell) as f64;
        let top = surfaces.top.value_at(cell) as f64;
        let bottom = surfaces.bottom.value_at(cell) as f64;
        window.fit(reference - top, bottom - reference);

        let nearest_reference = window.nearest(reference);
        let nearest_top =
            nearest_reference - window.nsamples_above() as f64 * window.stepsize();
        let nearest_bottom =
            nearest_reference + window.nsamples_below() as f64 * window.stepsize();

        if !sample.in_range_annotation(nearest_top) || !sample.in_range_annotation(nearest_bottom)
        {
            let row = cell / surfaces.reference.ncols();
            let col = cell % surfaces.reference.ncols();
            return Err(Error::bad_request(format!(
                "Vertical window is out of vertical bounds at row: {} col: {}. \
                 Request: [{}, {}]. Seismic bounds: [{}, {}]",
                row,
                col,
                nearest_top,
                nearest_bottom,
                sample.min(),
                sample.max()
            )));
        }

        let [i, j] = transformer.world_to_index(surfaces.reference.to_cdp(cell));
        let [i, j] = transformer.to_sample_position([i, j]);
        let top_position = sample.to_sample_position(nearest_top);

        for index in 0..window.size() {
            coordinates.push([top_position + index as f64, j, i]);
        }
    }

    if coordinates.len() != offsets[to] - offsets[from] {
        return Err(Error::internal(format!(
            "Horizon chunk emitted {} samples, offset table expects {}",
            coordinates.len(),
            offsets[to] - offsets[from]
        )));
    }

    Ok(coordinates)
}

/// Fetch the packed horizon buffer for `surfaces`.
///
/// Cells are processed in contiguous bands; a bounded pool of workers each
/// issues one samples read and returns its slice of the buffer. Workers
/// write disjoint regions determined by the offset table; the orchestrator
/// joins every worker and surfaces the first error.
pub async fn fetch_horizon(
    handle: Arc<DataHandle>,
    surfaces: Arc<SurfaceTriple>,
    offsets: Arc<Vec<usize>>,
    interpolation: Interpolation,
) -> Result<Horizon> {
    let hsize = offsets.len() - 1;
    let nrows = surfaces.reference.nrows();
    let total_samples = offsets[hsize];

    let fillvalue = surfaces.reference.fillvalue();
    if total_samples == 0 {
        // an empty buffer cannot be referenced, keep one sentinel element
        return Ok(Horizon {
            buffer: vec![fillvalue; 1],
            offsets,
            fillvalue,
        });
    }

    let chunk_size = nrows.max(1);
    let max_workers = (nrows / 2).max(1);
    let semaphore = Arc::new(Semaphore::new(max_workers));
    debug!(
        hsize,
        total_samples, chunk_size, max_workers, "fetching horizon"
    );

    let mut tasks = Vec::new();
    let mut from = 0;
    while from < hsize {
        let to = (from + chunk_size).min(hsize);
        let handle = Arc::clone(&handle);
        let surfaces = Arc::clone(&surfaces);
        let offsets = Arc::clone(&offsets);
        let semaphore = Arc::clone(&semaphore);

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| Error::internal("Worker semaphore closed"))?;

            let coordinates =
                chunk_coordinates(handle.metadata(), &surfaces, &offsets, from, to)?;
            if coordinates.is_empty() {
                return Ok((offsets[from], Vec::new()));
            }

            let data = handle.read_samples(&coordinates, interpolation).await?;
            Ok::<_, Error>((offsets[from], data))
        }));

        from = to;
    }

    let mut buffer = vec![0.0_f32; total_samples];
    let mut first_error = None;
    for task in futures::future::join_all(tasks).await {
        match task {
            Ok(Ok((start, data))) => {
                buffer[start..start + data.len()].copy_from_slice(&data);
            }
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
            }
            Err(join_err) => {
                first_error.get_or_insert(Error::internal(format!(
                    "Horizon worker panicked: {}",
                    join_err
                )));
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    Ok(Horizon {
        buffer,
        offsets,
        fillvalue,
    })
}

/// Sample a horizon with a uniform window and return it densely.
///
/// Every cell occupies `window size` output positions; fill and
/// out-of-range cells are overwritten with the surface's fill value after
/// the read. Returns the data and the per-cell window size.
pub async fn sample_horizon(
    handle: &DataHandle,
    surface: &RegularSurface,
    above: f64,
    below: f64,
    interpolation: Interpolation,
) -> Result<(Vec<f32>, usize)> {
    let metadata = handle.metadata();
    let transformer = metadata.transformer();
    let iline = metadata.iline();
    let xline = metadata.xline();
    let sample = metadata.sample();

    let mut window = source_window(metadata, 0);
    window.fit(above, below);
    let vsize = window.size();
    let hsize = surface.size();

    let mut coordinates = Vec::new();
    let mut populated = Vec::with_capacity(hsize);
    for cell in 0..hsize {
        let depth = surface.value_at(cell);
        if surface.is_fill(depth) {
            populated.push(false);
            continue;
        }

        let [i, j] = transformer.world_to_index(surface.to_cdp(cell));
        if !iline.in_range(i) || !xline.in_range(j) {
            populated.push(false);
            continue;
        }

        let nearest = window.nearest(depth as f64);
        let top = nearest - window.nsamples_above() as f64 * window.stepsize();
        let bottom = nearest + window.nsamples_below() as f64 * window.stepsize();
        if !sample.in_range_annotation(top) || !sample.in_range_annotation(bottom) {
            return Err(Error::bad_request(format!(
                "Vertical window is out of vertical bounds at row: {} col: {}. \
                 Request: [{}, {}]. Seismic bounds: [{}, {}]",
                cell / surface.ncols(),
                cell % surface.ncols(),
                top,
                bottom,
                sample.min(),
                sample.max()
            )));
        }

        let [i, j] = transformer.to_sample_position([i, j]);
        let top_position = sample.to_sample_position(top);
        for index in 0..vsize {
            coordinates.push([top_position + index as f64, j, i]);
        }
        populated.push(true);
    }

    let samples = if coordinates.is_empty() {
        Vec::new()
    } else {
        handle.read_samples(&coordinates, interpolation).await?
    };

    let mut out = vec![surface.fillvalue(); hsize * vsize];
    let mut cursor = 0;
    for (cell, is_populated) in populated.iter().enumerate() {
        if *is_populated {
            out[cell * vsize..(cell + 1) * vsize]
                .copy_from_slice(&samples[cursor..cursor + vsize]);
            cursor += vsize;
        }
    }

    Ok((out, vsize))
}
