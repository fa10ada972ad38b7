//! Attribute kernels and the parallel attribute pass

use crate::axis::Interpolation;
use crate::error::{Error, Result};
use crate::handle::DataHandle;
use crate::horizon::{buffer_offsets, fetch_horizon, Horizon, SurfaceTriple};
use crate::surface::RegularSurface;
use crate::window::{resample, VerticalWindow, INTERPOLATION_MARGIN};
use std::sync::Arc;
use tracing::debug;

/// Default cap on concurrent attribute workers
pub const MAX_ATTRIBUTE_WORKERS: usize = 32;

/// Pointwise reductions over a vertical window.
///
/// Requests name kernels by string; unknown names fail at request
/// validation, before any data is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    SampleValue,
    Min,
    Max,
    MaxAbs,
    Mean,
    MeanAbs,
    MeanPos,
    MeanNeg,
    Median,
    Rms,
    Var,
    Sd,
    SumPos,
    SumNeg,
}

impl Attribute {
    pub fn parse(attribute: &str) -> Result<Self> {
        match attribute.to_lowercase().as_str() {
            "samplevalue" => Ok(Attribute::SampleValue),
            "min" => Ok(Attribute::Min),
            "max" => Ok(Attribute::Max),
            "maxabs" => Ok(Attribute::MaxAbs),
            "mean" => Ok(Attribute::Mean),
            "meanabs" => Ok(Attribute::MeanAbs),
            "meanpos" => Ok(Attribute::MeanPos),
            "meanneg" => Ok(Attribute::MeanNeg),
            "median" => Ok(Attribute::Median),
            "rms" => Ok(Attribute::Rms),
            "var" => Ok(Attribute::Var),
            "sd" => Ok(Attribute::Sd),
            "sumpos" => Ok(Attribute::SumPos),
            "sumneg" => Ok(Attribute::SumNeg),
            _ => Err(Error::bad_request(format!(
                "invalid attribute '{}', valid options are: \
                 samplevalue, min, max, maxabs, mean, meanabs, meanpos, \
                 meanneg, median, rms, var, sd, sumpos, sumneg",
                attribute
            ))),
        }
    }

    /// Parse a list of attribute names, rejecting the whole request on the
    /// first unknown name
    pub fn parse_all(attributes: &[String]) -> Result<Vec<Self>> {
        attributes.iter().map(|name| Self::parse(name)).collect()
    }

    /// Reduce one dense window to a single value. Computation happens on
    /// doubles to not lose precision in intermediate steps; the output is
    /// narrowed to f32.
    pub fn compute(&self, window: &[f64], reference_index: usize) -> f32 {
        let n = window.len() as f64;
        let value = match self {
            Attribute::SampleValue => window[reference_index],
            Attribute::Min => window.iter().cloned().fold(f64::INFINITY, f64::min),
            Attribute::Max => window.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            Attribute::MaxAbs => window.iter().fold(0.0, |acc: f64, x| acc.max(x.abs())),
            Attribute::Mean => window.iter().sum::<f64>() / n,
            Attribute::MeanAbs => window.iter().map(|x| x.abs()).sum::<f64>() / n,
            Attribute::MeanPos => subset_mean(window, |x| x > 0.0),
            Attribute::MeanNeg => subset_mean(window, |x| x < 0.0),
            Attribute::Median => {
                let mut sorted = window.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).expect("windows are finite"));
                // lower median keeps even-sized windows deterministic
                sorted[(sorted.len() - 1) / 2]
            }
            Attribute::Rms => (window.iter().map(|x| x * x).sum::<f64>() / n).sqrt(),
            Attribute::Var => population_variance(window),
            Attribute::Sd => population_variance(window).sqrt(),
            Attribute::SumPos => window.iter().filter(|&&x| x > 0.0).sum::<f64>(),
            Attribute::SumNeg => window.iter().filter(|&&x| x < 0.0).sum::<f64>(),
        };
        value as f32
    }
}

fn subset_mean(window: &[f64], predicate: impl Fn(f64) -> bool) -> f64 {
    let mut sum = 0.0;
    let mut count = 0;
    for &x in window {
        if predicate(x) {
            sum += x;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Population variance: strictly the data defined by the window, no sample
/// correction
fn population_variance(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    window.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n
}

/// Secondary surface resampled onto the primary grid, with the majority
/// orientation of the pair
pub struct AlignedSurfaces {
    pub aligned: RegularSurface,
    pub primary_is_top: bool,
}

/// Resample `secondary` onto the grid of `primary` by nearest cell.
///
/// Cells become fill when the primary is fill, the primary position falls
/// outside the secondary grid, or the secondary cell is fill. The pair's
/// orientation is decided by majority vote over strictly ordered cells;
/// cells voting against the majority are marked fill afterwards by
/// [`between_surfaces`], so a locally crossing pair degrades to fill output
/// instead of failing the request.
pub fn align_surfaces(primary: &RegularSurface, secondary: &RegularSurface) -> AlignedSurfaces {
    let mut aligned = primary.filled_like();
    let mut top_votes = 0_usize;
    let mut bottom_votes = 0_usize;

    for cell in 0..primary.size() {
        let primary_value = primary.value_at(cell);
        if primary.is_fill(primary_value) {
            continue;
        }

        let (row, col) = secondary.from_cdp(primary.to_cdp(cell));
        let row = row.round();
        let col = col.round();
        if row < 0.0
            || row >= secondary.nrows() as f64
            || col < 0.0
            || col >= secondary.ncols() as f64
        {
            continue;
        }

        let secondary_value = secondary.value(row as usize, col as usize);
        if secondary.is_fill(secondary_value) {
            continue;
        }

        aligned.set_value_at(cell, secondary_value);
        if primary_value < secondary_value {
            top_votes += 1;
        } else if primary_value > secondary_value {
            bottom_votes += 1;
        }
    }

    AlignedSurfaces {
        aligned,
        primary_is_top: top_votes >= bottom_votes,
    }
}

/// Build the reference/top/bottom triple for a between-surfaces request.
/// The primary is the reference; the window at each cell spans from the
/// shallower to the deeper of the pair. Cells ordered against the majority
/// orientation become fill.
fn between_surfaces(primary: &RegularSurface, secondary: &RegularSurface) -> SurfaceTriple {
    let AlignedSurfaces {
        aligned,
        primary_is_top,
    } = align_surfaces(primary, secondary);

    let mut top = primary.filled_like();
    let mut bottom = primary.filled_like();
    for cell in 0..primary.size() {
        let primary_value = primary.value_at(cell);
        let secondary_value = aligned.value_at(cell);
        if primary.is_fill(primary_value) || aligned.is_fill(secondary_value) {
            continue;
        }

        let mismatched = if primary_value < secondary_value {
            !primary_is_top
        } else if primary_value > secondary_value {
            primary_is_top
        } else {
            false
        };
        if mismatched {
            continue;
        }

        top.set_value_at(cell, primary_value.min(secondary_value));
        bottom.set_value_at(cell, primary_value.max(secondary_value));
    }

    SurfaceTriple {
        reference: primary.clone(),
        top,
        bottom,
    }
}

/// Attribute maps along a single surface: the window at every cell spans
/// `above` over and `below` under the surface.
#[allow(clippy::too_many_arguments)]
pub async fn attributes_along_surface(
    handle: Arc<DataHandle>,
    surface: RegularSurface,
    above: f64,
    below: f64,
    stepsize: f64,
    attributes: &[Attribute],
    interpolation: Interpolation,
    max_concurrency: usize,
) -> Result<Vec<Vec<f32>>> {
    validate_window_extent(above, below)?;

    let surfaces = SurfaceTriple {
        top: surface.shifted(-above as f32),
        bottom: surface.shifted(below as f32),
        reference: surface,
    };

    run_attribute_query(
        handle,
        surfaces,
        stepsize,
        attributes,
        interpolation,
        max_concurrency,
    )
    .await
}

/// Attribute maps between two surfaces: the window at every cell spans from
/// the shallower to the deeper of the pair, with the primary as reference.
#[allow(clippy::too_many_arguments)]
pub async fn attributes_between_surfaces(
    handle: Arc<DataHandle>,
    primary: RegularSurface,
    secondary: RegularSurface,
    stepsize: f64,
    attributes: &[Attribute],
    interpolation: Interpolation,
    max_concurrency: usize,
) -> Result<Vec<Vec<f32>>> {
    let surfaces = between_surfaces(&primary, &secondary);

    run_attribute_query(
        handle,
        surfaces,
        stepsize,
        attributes,
        interpolation,
        max_concurrency,
    )
    .await
}

fn validate_window_extent(above: f64, below: f64) -> Result<()> {
    if above < 0.0 || below < 0.0 {
        return Err(Error::bad_request(format!(
            "Above and below must be positive. Above was {}, below was {}",
            above, below
        )));
    }
    Ok(())
}

async fn run_attribute_query(
    handle: Arc<DataHandle>,
    surfaces: SurfaceTriple,
    stepsize: f64,
    attributes: &[Attribute],
    interpolation: Interpolation,
    max_concurrency: usize,
) -> Result<Vec<Vec<f32>>> {
    let metadata = handle.metadata();
    let sample = metadata.sample();
    let source_stepsize = sample.stepsize();
    let dst_stepsize = if stepsize == 0.0 {
        source_stepsize
    } else {
        stepsize
    };

    let surfaces = Arc::new(surfaces);
    let offsets = Arc::new(buffer_offsets(metadata, &surfaces)?);
    let horizon = Arc::new(
        fetch_horizon(
            Arc::clone(&handle),
            Arc::clone(&surfaces),
            Arc::clone(&offsets),
            interpolation,
        )
        .await?,
    );

    compute_attributes(
        horizon,
        surfaces,
        source_stepsize,
        sample.min(),
        dst_stepsize,
        attributes,
        max_concurrency,
    )
    .await
}

/// The attribute pass: partition the horizon cells over a bounded set of
/// workers, each reducing its range for every requested attribute. Workers
/// operate on disjoint cell ranges and own their output; the orchestrator
/// stitches the per-attribute maps back together after joining everyone.
async fn compute_attributes(
    horizon: Arc<Horizon>,
    surfaces: Arc<SurfaceTriple>,
    source_stepsize: f64,
    source_min: f64,
    dst_stepsize: f64,
    attributes: &[Attribute],
    max_concurrency: usize,
) -> Result<Vec<Vec<f32>>> {
    if attributes.is_empty() {
        return Ok(Vec::new());
    }

    let hsize = horizon.hsize();
    let max_concurrency = max_concurrency.max(1);
    let cells_per_worker = hsize.div_ceil(max_concurrency).max(1);
    debug!(hsize, cells_per_worker, "computing attributes");

    let mut tasks = Vec::new();
    let mut from = 0;
    while from < hsize {
        let to = (from + cells_per_worker).min(hsize);
        let horizon = Arc::clone(&horizon);
        let surfaces = Arc::clone(&surfaces);
        let attributes = attributes.to_vec();

        tasks.push(tokio::spawn(async move {
            attribute_chunk(
                &horizon,
                &surfaces,
                source_stepsize,
                source_min,
                dst_stepsize,
                &attributes,
                from,
                to,
            )
        }));

        from = to;
    }

    let mut maps = vec![vec![0.0_f32; hsize]; attributes.len()];
    let mut cursor = 0;
    let mut first_error = None;
    for task in futures::future::join_all(tasks).await {
        match task {
            Ok(Ok(chunk)) => {
                let len = chunk[0].len();
                for (map, part) in maps.iter_mut().zip(&chunk) {
                    map[cursor..cursor + len].copy_from_slice(part);
                }
                cursor += len;
            }
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
            }
            Err(join_err) => {
                first_error.get_or_insert(Error::internal(format!(
                    "Attribute worker panicked: {}",
                    join_err
                )));
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    Ok(maps)
}

/// Reduce cells `[from, to)` for every attribute
#[allow(clippy::too_many_arguments)]
fn attribute_chunk(
    horizon: &Horizon,
    surfaces: &SurfaceTriple,
    source_stepsize: f64,
    source_min: f64,
    dst_stepsize: f64,
    attributes: &[Attribute],
    from: usize,
    to: usize,
) -> Result<Vec<Vec<f32>>> {
    let fillvalue = horizon.fillvalue();
    let mut out = vec![Vec::with_capacity(to - from); attributes.len()];

    let mut src_window =
        VerticalWindow::squeezed(source_stepsize, INTERPOLATION_MARGIN, source_min);

    for cell in from..to {
        let window = horizon.window(cell);
        if window.is_empty() {
            for map in out.iter_mut() {
                map.push(fillvalue);
            }
            continue;
        }

        let reference = surfaces.reference.value_at(cell) as f64;
        let above = reference - surfaces.top.value_at(cell) as f64;
        let below = surfaces.bottom.value_at(cell) as f64 - reference;

        src_window.fit(above, below);
        if window.len() != src_window.size() {
            return Err(Error::internal(format!(
                "Horizon window of {} samples does not match source window of {}",
                window.len(),
                src_window.size()
            )));
        }

        let nearest_reference = src_window.nearest(reference);
        let src_start =
            nearest_reference - src_window.nsamples_above() as f64 * src_window.stepsize();

        let dst_window = VerticalWindow::with_stepsize(dst_stepsize, above, below);
        let positions: Vec<f64> = (0..dst_window.size())
            .map(|index| dst_window.at(index, reference))
            .collect();

        let source: Vec<f64> = window.iter().map(|&v| v as f64).collect();
        let resampled = resample(&source, src_start, source_stepsize, &positions);

        for (attribute, map) in attributes.iter().zip(out.iter_mut()) {
            map.push(attribute.compute(&resampled, dst_window.reference_offset()));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Plane;
    use crate::volume::ramp_volume;

    const FILL: f32 = -999.25;

    fn handle() -> Arc<DataHandle> {
        Arc::new(DataHandle::from_source(Arc::new(ramp_volume())).unwrap())
    }

    /// Surface on the ramp cube's bin grid; columns run along inlines. The
    /// trace under cell (row, col) is `100*col + 50*row + (z - 4) / 4`.
    fn cube_aligned_surface(values: Vec<Vec<f32>>) -> RegularSurface {
        RegularSurface::new(
            values,
            Plane {
                xori: 2.0,
                yori: 0.0,
                xinc: 7.2111,
                yinc: 3.6056,
                rotation: 33.69,
            },
            FILL,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_rejects_unknown_kernel() {
        let err = Attribute::parse("upper_quartile").unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("invalid attribute 'upper_quartile'"));
        assert_eq!(Attribute::parse("SampleValue").unwrap(), Attribute::SampleValue);
    }

    #[test]
    fn test_kernels_on_symmetric_window() {
        let window = [-2.5, -1.5, -0.5, 0.5, 1.5];
        let cases = [
            (Attribute::SampleValue, -0.5),
            (Attribute::Min, -2.5),
            (Attribute::Max, 1.5),
            (Attribute::MaxAbs, 2.5),
            (Attribute::Mean, -0.5),
            (Attribute::MeanAbs, 1.3),
            (Attribute::MeanPos, 1.0),
            (Attribute::MeanNeg, -1.5),
            (Attribute::Median, -0.5),
            (Attribute::Rms, 1.5),
            (Attribute::Var, 2.0),
            (Attribute::Sd, std::f64::consts::SQRT_2),
            (Attribute::SumPos, 2.0),
            (Attribute::SumNeg, -4.5),
        ];
        for (attribute, expected) in cases {
            let actual = attribute.compute(&window, 2);
            assert!(
                (actual - expected as f32).abs() < 1e-6,
                "{:?}: {} vs {}",
                attribute,
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_median_takes_lower_of_even_windows() {
        let window = [3.0, -2.0, 1.0, -1.0];
        assert_eq!(Attribute::Median.compute(&window, 0), -1.0);
    }

    #[test]
    fn test_positive_subset_kernels_on_empty_subset() {
        let window = [-3.0, -1.0];
        assert_eq!(Attribute::MeanPos.compute(&window, 0), 0.0);
        assert_eq!(Attribute::SumPos.compute(&window, 0), 0.0);
    }

    #[test]
    fn test_align_majority_vote_and_mismatch() {
        let primary = cube_aligned_surface(vec![vec![10.0, 20.0, 30.0]]);
        let secondary = cube_aligned_surface(vec![vec![12.0, 18.0, 32.0]]);

        let AlignedSurfaces {
            aligned,
            primary_is_top,
        } = align_surfaces(&primary, &secondary);
        assert!(primary_is_top);
        assert_eq!(aligned.value_at(0), 12.0);
        assert_eq!(aligned.value_at(1), 18.0);

        let triple = between_surfaces(&primary, &secondary);
        // cell 1 votes against the majority and becomes fill
        assert_eq!(triple.top.value_at(0), 10.0);
        assert_eq!(triple.bottom.value_at(0), 12.0);
        assert!(triple.top.is_fill(triple.top.value_at(1)));
        assert!(triple.bottom.is_fill(triple.bottom.value_at(1)));
        assert_eq!(triple.top.value_at(2), 30.0);
        assert_eq!(triple.bottom.value_at(2), 32.0);
    }

    #[test]
    fn test_align_fill_propagation() {
        let primary = cube_aligned_surface(vec![vec![FILL, 20.0]]);
        let secondary = cube_aligned_surface(vec![vec![24.0, FILL]]);
        let triple = between_surfaces(&primary, &secondary);
        for cell in 0..2 {
            assert!(triple.top.is_fill(triple.top.value_at(cell)));
            assert!(triple.bottom.is_fill(triple.bottom.value_at(cell)));
        }
    }

    #[tokio::test]
    async fn test_attributes_along_surface() {
        let handle = handle();
        // windows span [12, 28]ms, sample indices 2..=6 of each trace
        let surface = cube_aligned_surface(vec![
            vec![20.0, 20.0, FILL],
            vec![20.0, 20.0, 20.0],
        ]);
        let attributes = [Attribute::Min, Attribute::Max, Attribute::Mean];

        let maps = attributes_along_surface(
            handle,
            surface,
            8.0,
            8.0,
            4.0,
            &attributes,
            Interpolation::Nearest,
            MAX_ATTRIBUTE_WORKERS,
        )
        .await
        .unwrap();

        let bases = [0.0_f32, 100.0, f32::NAN, 50.0, 150.0, 250.0];
        for (cell, base) in bases.iter().enumerate() {
            if cell == 2 {
                assert_eq!(maps[0][cell], FILL);
                assert_eq!(maps[1][cell], FILL);
                assert_eq!(maps[2][cell], FILL);
            } else {
                assert_eq!(maps[0][cell], base + 2.0, "min at {cell}");
                assert_eq!(maps[1][cell], base + 6.0, "max at {cell}");
                assert_eq!(maps[2][cell], base + 4.0, "mean at {cell}");
            }
        }
    }

    #[tokio::test]
    async fn test_attributes_with_subsampled_window() {
        let handle = handle();
        // destination stepsize 2ms: positions 12, 14, .., 28; the ramp
        // trace interpolates linearly between samples
        let surface = cube_aligned_surface(vec![vec![20.0]]);
        let maps = attributes_along_surface(
            handle,
            surface,
            8.0,
            8.0,
            2.0,
            &[Attribute::Min, Attribute::Max, Attribute::Mean],
            Interpolation::Nearest,
            MAX_ATTRIBUTE_WORKERS,
        )
        .await
        .unwrap();

        assert!((maps[0][0] - 2.0).abs() < 1e-5);
        assert!((maps[1][0] - 6.0).abs() < 1e-5);
        assert!((maps[2][0] - 4.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_attributes_with_unaligned_reference() {
        let handle = handle();
        // reference 22ms sits between samples; the linear trace makes the
        // resampled window exact: positions 14, 18, 22, 26, 30
        let surface = cube_aligned_surface(vec![vec![22.0]]);
        let maps = attributes_along_surface(
            handle,
            surface,
            8.0,
            8.0,
            4.0,
            &[Attribute::SampleValue, Attribute::Min, Attribute::Max],
            Interpolation::Nearest,
            MAX_ATTRIBUTE_WORKERS,
        )
        .await
        .unwrap();

        assert!((maps[0][0] - 4.5).abs() < 1e-5);
        assert!((maps[1][0] - 2.5).abs() < 1e-5);
        assert!((maps[2][0] - 6.5).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_samplevalue_with_single_sample_window() {
        let handle = handle();
        // zero extent, source stepsize: the window is the single sample at
        // the reference, here exactly on the grid at 24ms (index 5)
        let surface = cube_aligned_surface(vec![vec![24.0]]);
        let maps = attributes_along_surface(
            handle,
            surface,
            0.0,
            0.0,
            0.0,
            &[Attribute::SampleValue],
            Interpolation::Nearest,
            MAX_ATTRIBUTE_WORKERS,
        )
        .await
        .unwrap();

        assert_eq!(maps[0][0], 5.0);
    }

    #[tokio::test]
    async fn test_attributes_between_surfaces() {
        let handle = handle();
        let primary = cube_aligned_surface(vec![vec![16.0, 20.0, 24.0]]);
        let secondary = cube_aligned_surface(vec![vec![24.0, 24.0, 16.0]]);

        let maps = attributes_between_surfaces(
            handle,
            primary,
            secondary,
            4.0,
            &[Attribute::SampleValue, Attribute::Min, Attribute::Max],
            Interpolation::Nearest,
            MAX_ATTRIBUTE_WORKERS,
        )
        .await
        .unwrap();

        // cell 0: window [16, 24], reference 16, trace base 0
        assert_eq!(maps[0][0], 3.0);
        assert_eq!(maps[1][0], 3.0);
        assert_eq!(maps[2][0], 5.0);
        // cell 1: window [20, 24], reference 20, trace base 100
        assert_eq!(maps[0][1], 104.0);
        assert_eq!(maps[1][1], 104.0);
        assert_eq!(maps[2][1], 105.0);
        // cell 2 is ordered against the majority: fill everywhere
        assert_eq!(maps[0][2], FILL);
        assert_eq!(maps[1][2], FILL);
        assert_eq!(maps[2][2], FILL);
    }

    #[tokio::test]
    async fn test_all_fill_surface_yields_all_fill_maps() {
        let handle = handle();
        let surface = cube_aligned_surface(vec![vec![FILL, FILL], vec![FILL, FILL]]);
        let maps = attributes_along_surface(
            handle,
            surface,
            0.0,
            0.0,
            4.0,
            &[Attribute::SampleValue, Attribute::Min],
            Interpolation::Nearest,
            MAX_ATTRIBUTE_WORKERS,
        )
        .await
        .unwrap();

        for map in &maps {
            assert!(map.iter().all(|&v| v == FILL));
        }
    }

    #[tokio::test]
    async fn test_negative_extent_rejected() {
        let handle = handle();
        let surface = cube_aligned_surface(vec![vec![20.0]]);
        let err = attributes_along_surface(
            handle,
            surface,
            -4.0,
            1.11,
            4.0,
            &[Attribute::Min],
            Interpolation::Nearest,
            MAX_ATTRIBUTE_WORKERS,
        )
        .await
        .unwrap_err();

        assert!(err.is_bad_request());
        assert!(err.to_string().contains("Above and below must be positive"));
    }
}
