//! Planar slice queries

use crate::axis::{validate_vertical_domain, AxisName};
use crate::error::Result;
use crate::handle::DataHandle;
use crate::layout::{CROSSLINE_DIM, INLINE_DIM, SAMPLE_DIM};
use crate::metadata::MetadataHandle;
use crate::response::{AxisMetadata, SliceMetadata, FORMAT_F32_LE};
use crate::subvolume::{Bound, SubVolume};
use tracing::debug;

/// Fetch a slice through the cube perpendicular to `direction` at `lineno`,
/// optionally reduced by bounds on the other axes. Returns the dense plane
/// and its metadata.
pub async fn slice(
    handle: &DataHandle,
    direction: AxisName,
    lineno: i32,
    bounds: &[Bound],
) -> Result<(Vec<f32>, SliceMetadata)> {
    let metadata = handle.metadata();
    validate_vertical_domain(direction, &metadata.sample())?;

    let axis = metadata.axis(direction);
    let mut subvolume = SubVolume::full(metadata);
    subvolume.constrain(metadata, bounds)?;
    subvolume.set_slice(&axis, lineno, direction.coordinate_system())?;

    debug!(%direction, lineno, nsamples = subvolume.nsamples(), "reading slice");
    let data = handle.read_subvolume(&subvolume).await?;
    let slice_metadata = build_metadata(metadata, direction, &subvolume);

    Ok((data, slice_metadata))
}

/// Slice metadata without fetching data
pub fn slice_metadata(
    handle: &DataHandle,
    direction: AxisName,
    lineno: i32,
    bounds: &[Bound],
) -> Result<SliceMetadata> {
    let metadata = handle.metadata();
    validate_vertical_domain(direction, &metadata.sample())?;

    let axis = metadata.axis(direction);
    let mut subvolume = SubVolume::full(metadata);
    subvolume.constrain(metadata, bounds)?;
    subvolume.set_slice(&axis, lineno, direction.coordinate_system())?;

    Ok(build_metadata(metadata, direction, &subvolume))
}

/// Assemble the response metadata for a slice request.
///
/// The X/Y axes follow the direction's plane: inline slices are
/// (Sample, Crossline), crossline slices (Sample, Inline) and vertical
/// slices (Crossline, Inline). The geospatial footprint is the CDP
/// linestring of the reduced rectangle for line slices, and its four
/// corners for vertical slices.
fn build_metadata(
    metadata: &MetadataHandle,
    direction: AxisName,
    subvolume: &SubVolume,
) -> SliceMetadata {
    let reduced = |dimension: usize| {
        let axis = metadata.layout().axis(dimension);
        let (min, max, samples) = subvolume.annotation_range(&axis);
        AxisMetadata::reduced(&axis, min, max, samples)
    };

    let (x, y) = if direction.is_inline() {
        (reduced(SAMPLE_DIM), reduced(CROSSLINE_DIM))
    } else if direction.is_crossline() {
        (reduced(SAMPLE_DIM), reduced(INLINE_DIM))
    } else {
        (reduced(CROSSLINE_DIM), reduced(INLINE_DIM))
    };

    let (inline_lower, inline_upper) = subvolume.range(INLINE_DIM);
    let (crossline_lower, crossline_upper) = subvolume.range(CROSSLINE_DIM);
    let inline_last = (inline_upper - 1) as f64;
    let crossline_last = (crossline_upper - 1) as f64;
    let inline_lower = inline_lower as f64;
    let crossline_lower = crossline_lower as f64;

    let footprint: Vec<[f64; 2]> = if direction.is_inline() {
        // a linestring along the reduced crossline range
        vec![
            [inline_lower, crossline_lower],
            [inline_lower, crossline_last],
        ]
    } else if direction.is_crossline() {
        vec![
            [inline_lower, crossline_lower],
            [inline_last, crossline_lower],
        ]
    } else {
        // the four corners of the reduced horizontal rectangle
        vec![
            [inline_lower, crossline_lower],
            [inline_last, crossline_lower],
            [inline_last, crossline_last],
            [inline_lower, crossline_last],
        ]
    };

    let transformer = metadata.transformer();
    let geospatial = footprint
        .into_iter()
        .map(|[i, j]| {
            let point = transformer.index_to_world(i, j);
            [point.x, point.y]
        })
        .collect();

    SliceMetadata {
        format: FORMAT_F32_LE.to_string(),
        shape: vec![y.samples, x.samples],
        x,
        y,
        geospatial,
    }
}
