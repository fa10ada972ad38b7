//! Fence queries - one vertical trace per polyline point

use crate::axis::{CoordinateSystem, Interpolation};
use crate::coords::Point;
use crate::error::{Error, Result};
use crate::handle::DataHandle;
use crate::response::ArrayMetadata;
use crate::volume::VoxelPosition;
use tracing::debug;

/// Fetch one full vertical trace for every (x, y) point of a fence.
///
/// Points outside the horizontal extent of the cube fail the request,
/// unless `fill_value` is given, in which case the offending trace is
/// fill-filled and the remaining points are unaffected.
pub async fn fence(
    handle: &DataHandle,
    coordinate_system: CoordinateSystem,
    coordinates: &[Vec<f32>],
    interpolation: Interpolation,
    fill_value: Option<f32>,
) -> Result<(Vec<f32>, ArrayMetadata)> {
    let metadata = handle.metadata();
    let transformer = metadata.transformer();
    let iline = metadata.iline();
    let xline = metadata.xline();
    let nsamples = metadata.sample().nsamples();

    let mut positions: Vec<VoxelPosition> = Vec::with_capacity(coordinates.len());
    let mut fill_traces: Vec<usize> = Vec::new();

    for (index, pair) in coordinates.iter().enumerate() {
        if pair.len() != 2 {
            return Err(Error::bad_request(format!(
                "invalid coordinate {:?} at position {}, expected [x y] pair",
                pair, index
            )));
        }
        let (x, y) = (pair[0], pair[1]);

        let [i, j] = match coordinate_system {
            CoordinateSystem::Index => [x as f64, y as f64],
            CoordinateSystem::Annotation => {
                transformer.annotation_to_index(x as f64, y as f64)
            }
            CoordinateSystem::Cdp => transformer.world_to_index(Point {
                x: x as f64,
                y: y as f64,
            }),
        };

        let out_of_range = if !iline.in_range(i) {
            Some(0)
        } else if !xline.in_range(j) {
            Some(1)
        } else {
            None
        };

        if let Some(dimension) = out_of_range {
            if fill_value.is_none() {
                return Err(Error::bad_request(format!(
                    "Coordinate ({},{}) is out of boundaries in dimension {}.",
                    x, y, dimension
                )));
            }
            fill_traces.push(index);
            positions.push([0.0, 0.5, 0.5]);
            continue;
        }

        let [i, j] = transformer.to_sample_position([i, j]);
        positions.push([0.0, j, i]);
    }

    debug!(
        npoints = positions.len(),
        nfill = fill_traces.len(),
        "reading fence traces"
    );
    let mut data = handle.read_traces(&positions, interpolation).await?;

    if let Some(fill) = fill_value {
        for trace in fill_traces {
            data[trace * nsamples..(trace + 1) * nsamples].fill(fill);
        }
    }

    let metadata = ArrayMetadata::f32_le(vec![coordinates.len(), nsamples]);
    Ok((data, metadata))
}

/// Fence metadata without fetching data
pub fn fence_metadata(handle: &DataHandle, npoints: usize) -> ArrayMetadata {
    ArrayMetadata::f32_le(vec![npoints, handle.metadata().sample().nsamples()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::well_known_volume;
    use std::sync::Arc;

    const FILL: f32 = -999.25;

    fn handle() -> DataHandle {
        DataHandle::from_source(Arc::new(well_known_volume())).unwrap()
    }

    fn pairs(points: &[(f32, f32)]) -> Vec<Vec<f32>> {
        points.iter().map(|&(x, y)| vec![x, y]).collect()
    }

    #[tokio::test]
    async fn test_fence_same_result_in_all_coordinate_systems() {
        let handle = handle();
        let expected = vec![
            108.0, 109.0, 110.0, 111.0, // il 3, xl 10
            112.0, 113.0, 114.0, 115.0, // il 3, xl 11
            100.0, 101.0, 102.0, 103.0, // il 1, xl 10
            108.0, 109.0, 110.0, 111.0, // il 3, xl 10
            116.0, 117.0, 118.0, 119.0, // il 5, xl 10
        ];

        let cases = [
            (
                CoordinateSystem::Index,
                pairs(&[(1.0, 0.0), (1.0, 1.0), (0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            ),
            (
                CoordinateSystem::Annotation,
                pairs(&[(3.0, 10.0), (3.0, 11.0), (1.0, 10.0), (3.0, 10.0), (5.0, 10.0)]),
            ),
            (
                CoordinateSystem::Cdp,
                pairs(&[(8.0, 4.0), (6.0, 7.0), (2.0, 0.0), (8.0, 4.0), (14.0, 8.0)]),
            ),
        ];

        for (system, coordinates) in cases {
            let (data, meta) = fence(
                &handle,
                system,
                &coordinates,
                Interpolation::Nearest,
                None,
            )
            .await
            .unwrap();
            assert_eq!(data, expected, "{system:?}");
            assert_eq!(meta.shape, vec![5, 4]);
        }
    }

    #[tokio::test]
    async fn test_fence_nearest_snaps_towards_higher_index() {
        let handle = handle();
        let cases: Vec<((f32, f32), [f32; 4])> = vec![
            ((3.5, 10.25), [108.0, 109.0, 110.0, 111.0]),
            ((3.9999, 10.4999), [108.0, 109.0, 110.0, 111.0]),
            ((4.0, 10.5), [120.0, 121.0, 122.0, 123.0]),
            ((5.0, 11.0), [120.0, 121.0, 122.0, 123.0]),
        ];

        for ((x, y), expected) in cases {
            let (data, _) = fence(
                &handle,
                CoordinateSystem::Annotation,
                &pairs(&[(x, y)]),
                Interpolation::Nearest,
                None,
            )
            .await
            .unwrap();
            assert_eq!(data, expected.to_vec(), "({x}, {y})");
        }
    }

    #[tokio::test]
    async fn test_fence_boundary_corner_is_in_range() {
        let handle = handle();
        let (data, _) = fence(
            &handle,
            CoordinateSystem::Index,
            &pairs(&[(-0.5, -0.5)]),
            Interpolation::Nearest,
            None,
        )
        .await
        .unwrap();
        assert_eq!(data, vec![100.0, 101.0, 102.0, 103.0]);
    }

    #[tokio::test]
    async fn test_fence_out_of_bounds_fails_without_fill() {
        let handle = handle();
        let cases = [
            (pairs(&[(5.0, 9.5), (6.0, 11.25)]), 0),
            (pairs(&[(5.5, 11.5), (3.0, 10.0)]), 1),
            (pairs(&[(0.0001, 9.4999)]), 1),
        ];

        for (coordinates, dimension) in cases {
            let err = fence(
                &handle,
                CoordinateSystem::Annotation,
                &coordinates,
                Interpolation::Linear,
                None,
            )
            .await
            .unwrap_err();
            assert!(err.is_bad_request());
            assert!(
                err.to_string()
                    .contains(&format!("is out of boundaries in dimension {}.", dimension)),
                "{err}"
            );
        }
    }

    #[tokio::test]
    async fn test_fence_out_of_bounds_with_fill_value() {
        let handle = handle();
        let (data, _) = fence(
            &handle,
            CoordinateSystem::Annotation,
            &pairs(&[(5.0, 9.5), (6.0, 11.25)]),
            Interpolation::Linear,
            Some(FILL),
        )
        .await
        .unwrap();

        assert_eq!(&data[..4], &[116.0, 117.0, 118.0, 119.0]);
        assert_eq!(&data[4..], &[FILL, FILL, FILL, FILL]);
    }

    #[tokio::test]
    async fn test_fence_malformed_point() {
        let handle = handle();
        let coordinates = vec![vec![1.0, 0.0], vec![1.0, 1.0, 0.0]];
        let err = fence(
            &handle,
            CoordinateSystem::Index,
            &coordinates,
            Interpolation::Nearest,
            Some(FILL),
        )
        .await
        .unwrap_err();

        assert!(err.is_bad_request());
        assert!(err
            .to_string()
            .contains("at position 1, expected [x y] pair"));
    }

    #[tokio::test]
    async fn test_fence_metadata_shape() {
        let handle = handle();
        let meta = fence_metadata(&handle, 7);
        assert_eq!(meta.shape, vec![7, 4]);
        assert_eq!(meta.format, "<f4");
    }
}
