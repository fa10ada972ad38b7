//! Volume sources - the voxel fetch primitive the query engine consumes

use crate::axis::Interpolation;
use crate::error::{Error, Result};
use crate::layout::CubeLayout;
use async_trait::async_trait;

/// A 3-D voxel-center sampling position in storage order
/// (sample, crossline, inline)
pub type VoxelPosition = [f64; 3];

/// Read access to one cube at level-of-detail 0.
///
/// All coordinates handed to a source are voxel *center* positions: the
/// first sample sits at 0.5 along each dimension. All reads return dense
/// 32-bit floats. Implementations for remote object stores wrap their I/O
/// failures as [`Error::Runtime`].
#[async_trait]
pub trait VolumeSource: Send + Sync {
    /// Static description of the cube
    fn layout(&self) -> &CubeLayout;

    /// Dense block `[lower, upper)` per storage dimension, returned in
    /// storage order (dimension 0 varies fastest).
    async fn read_subset(&self, lower: [usize; 3], upper: [usize; 3]) -> Result<Vec<f32>>;

    /// One full vertical trace per position, interpolated horizontally. The
    /// vertical component of each position is ignored. Output is
    /// `coordinates.len() * vertical nsamples` floats, trace by trace.
    async fn read_traces(
        &self,
        coordinates: &[VoxelPosition],
        interpolation: Interpolation,
    ) -> Result<Vec<f32>>;

    /// One interpolated value per 3-D position
    async fn read_samples(
        &self,
        coordinates: &[VoxelPosition],
        interpolation: Interpolation,
    ) -> Result<Vec<f32>>;
}

/// A cube held as a dense in-memory array.
///
/// Backs the `file://` container and the test suite, and defines the
/// observable interpolation semantics: nearest snaps exact half-voxel
/// boundaries towards higher indices, linear and triangular are tent
/// filters, cubic is a separable Catmull-Rom, and angular interpolates
/// sample values as a periodic phase over the layout's value range.
#[derive(Debug)]
pub struct InMemoryVolume {
    layout: CubeLayout,
    data: Vec<f32>,
}

impl InMemoryVolume {
    pub fn new(layout: CubeLayout, data: Vec<f32>) -> Result<Self> {
        if data.len() != layout.total_samples() {
            return Err(Error::runtime(format!(
                "Cube data has {} samples, layout requires {}",
                data.len(),
                layout.total_samples()
            )));
        }
        Ok(Self { layout, data })
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn value(&self, index: [usize; 3]) -> f64 {
        let [n0, n1, _] = self.layout.shape();
        self.data[(index[2] * n1 + index[1]) * n0 + index[0]] as f64
    }

    /// Per-dimension taps and weights for a voxel-center position
    fn dimension_taps(n: usize, position: f64, interpolation: Interpolation) -> Vec<(usize, f64)> {
        let last = (n - 1) as f64;
        match interpolation {
            Interpolation::Nearest => {
                // floor() on center coordinates snaps exact half-voxel
                // boundaries towards the higher index
                let index = position.floor().clamp(0.0, last) as usize;
                vec![(index, 1.0)]
            }
            Interpolation::Linear | Interpolation::Triangular | Interpolation::Angular => {
                let t = (position - 0.5).clamp(0.0, last);
                let lower = t.floor() as usize;
                let upper = (lower + 1).min(n - 1);
                let fraction = t - lower as f64;
                vec![(lower, 1.0 - fraction), (upper, fraction)]
            }
            Interpolation::Cubic => {
                let t = (position - 0.5).clamp(0.0, last);
                let base = t.floor() as isize;
                let f = t - base as f64;
                let f2 = f * f;
                let f3 = f2 * f;
                let weights = [
                    0.5 * (-f3 + 2.0 * f2 - f),
                    0.5 * (3.0 * f3 - 5.0 * f2 + 2.0),
                    0.5 * (-3.0 * f3 + 4.0 * f2 + f),
                    0.5 * (f3 - f2),
                ];
                (0..4)
                    .map(|k| {
                        let index = (base - 1 + k as isize).clamp(0, n as isize - 1) as usize;
                        (index, weights[k])
                    })
                    .collect()
            }
        }
    }

    /// Interpolated value at one voxel-center position
    fn sample_at(&self, position: VoxelPosition, interpolation: Interpolation) -> f64 {
        let shape = self.layout.shape();
        let taps: [Vec<(usize, f64)>; 3] = [
            Self::dimension_taps(shape[0], position[0], interpolation),
            Self::dimension_taps(shape[1], position[1], interpolation),
            Self::dimension_taps(shape[2], position[2], interpolation),
        ];

        if interpolation == Interpolation::Angular {
            return self.circular_mean(&taps);
        }

        let mut acc = 0.0;
        for &(i2, w2) in &taps[2] {
            for &(i1, w1) in &taps[1] {
                for &(i0, w0) in &taps[0] {
                    acc += w2 * w1 * w0 * self.value([i0, i1, i2]);
                }
            }
        }
        acc
    }

    /// Weighted circular mean over the tap set, with sample values mapped to
    /// a phase over the layout's value range. Values that wrap around the
    /// range are averaged along the shorter arc.
    fn circular_mean(&self, taps: &[Vec<(usize, f64)>; 3]) -> f64 {
        let range = self.layout.value_range();
        let span = range.max - range.min;
        let mut sum_cos = 0.0;
        let mut sum_sin = 0.0;
        for &(i2, w2) in &taps[2] {
            for &(i1, w1) in &taps[1] {
                for &(i0, w0) in &taps[0] {
                    let weight = w2 * w1 * w0;
                    let phase =
                        (self.value([i0, i1, i2]) - range.min) / span * std::f64::consts::TAU;
                    sum_cos += weight * phase.cos();
                    sum_sin += weight * phase.sin();
                }
            }
        }
        let phase = sum_sin.atan2(sum_cos).rem_euclid(std::f64::consts::TAU);
        range.min + phase / std::f64::consts::TAU * span
    }
}

#[async_trait]
impl VolumeSource for InMemoryVolume {
    fn layout(&self) -> &CubeLayout {
        &self.layout
    }

    async fn read_subset(&self, lower: [usize; 3], upper: [usize; 3]) -> Result<Vec<f32>> {
        let shape = self.layout.shape();
        for dim in 0..3 {
            if lower[dim] >= upper[dim] || upper[dim] > shape[dim] {
                return Err(Error::internal(format!(
                    "Subvolume [{:?}, {:?}) outside cube shape {:?}",
                    lower, upper, shape
                )));
            }
        }

        let mut out =
            Vec::with_capacity((0..3).map(|d| upper[d] - lower[d]).product::<usize>());
        for i2 in lower[2]..upper[2] {
            for i1 in lower[1]..upper[1] {
                for i0 in lower[0]..upper[0] {
                    out.push(self.value([i0, i1, i2]) as f32);
                }
            }
        }
        Ok(out)
    }

    async fn read_traces(
        &self,
        coordinates: &[VoxelPosition],
        interpolation: Interpolation,
    ) -> Result<Vec<f32>> {
        let nsamples = self.layout.shape()[0];
        let mut out = Vec::with_capacity(coordinates.len() * nsamples);
        for position in coordinates {
            for k in 0..nsamples {
                let at = [k as f64 + 0.5, position[1], position[2]];
                out.push(self.sample_at(at, interpolation) as f32);
            }
        }
        Ok(out)
    }

    async fn read_samples(
        &self,
        coordinates: &[VoxelPosition],
        interpolation: Interpolation,
    ) -> Result<Vec<f32>> {
        Ok(coordinates
            .iter()
            .map(|&position| self.sample_at(position, interpolation) as f32)
            .collect())
    }
}

/// The well-known 3x2x4 cube: value = 100 + 8*i + 4*j + k over
/// (inline index, crossline index, sample index)
#[cfg(test)]
pub(crate) fn well_known_volume() -> InMemoryVolume {
    let layout = crate::layout::well_known_layout();
    let mut data = Vec::with_capacity(layout.total_samples());
    for i in 0..3 {
        for j in 0..2 {
            for k in 0..4 {
                data.push((100 + 8 * i + 4 * j + k) as f32);
            }
        }
    }
    InMemoryVolume::new(layout, data).unwrap()
}

/// A 3x2x10 cube tall enough for windowed-horizon tests: samples at
/// 4..40 ms, value = 100*i + 50*j + k. Every trace is linear in depth with
/// slope 1 per sample.
#[cfg(test)]
pub(crate) fn ramp_volume() -> InMemoryVolume {
    use crate::axis::units;
    use crate::layout::{AxisDescriptor, BinGrid, CubeLayout, ValueRange};
    use chrono::TimeZone;

    let layout = CubeLayout::new(
        vec![
            AxisDescriptor::new("Sample", units::MILLISECOND, 4.0, 40.0, 10),
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
        "ramp.segy",
        chrono::Utc.with_ymd_and_hms(2021, 2, 18, 21, 54, 42).unwrap(),
        ValueRange::new(0.0, 260.0),
    )
    .unwrap();

    let mut data = Vec::with_capacity(layout.total_samples());
    for i in 0..3 {
        for j in 0..2 {
            for k in 0..10 {
                data.push((100 * i + 50 * j + k) as f32);
            }
        }
    }
    InMemoryVolume::new(layout, data).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_subset_storage_order() {
        let volume = well_known_volume();
        // inline slice at index 1: crossline rows, samples fastest
        let slice = volume.read_subset([0, 0, 1], [4, 2, 2]).await.unwrap();
        assert_eq!(
            slice,
            vec![108.0, 109.0, 110.0, 111.0, 112.0, 113.0, 114.0, 115.0]
        );
    }

    #[tokio::test]
    async fn test_read_subset_rejects_out_of_bounds() {
        let volume = well_known_volume();
        assert!(volume.read_subset([0, 0, 0], [5, 2, 3]).await.is_err());
        assert!(volume.read_subset([1, 0, 0], [1, 2, 3]).await.is_err());
    }

    #[tokio::test]
    async fn test_trace_at_voxel_center_is_exact_column() {
        let volume = well_known_volume();
        let expected = vec![108.0, 109.0, 110.0, 111.0];
        for interpolation in [
            Interpolation::Nearest,
            Interpolation::Linear,
            Interpolation::Cubic,
            Interpolation::Triangular,
        ] {
            let trace = volume
                .read_traces(&[[0.0, 0.5, 1.5]], interpolation)
                .await
                .unwrap();
            assert_eq!(trace, expected, "{:?}", interpolation);
        }
    }

    #[tokio::test]
    async fn test_nearest_snaps_half_voxel_towards_higher_index() {
        let volume = well_known_volume();
        // center 1.5 is voxel 1; center 2.0 sits on the boundary and snaps up
        let traces = volume
            .read_traces(&[[0.0, 0.5, 1.9999], [0.0, 0.5, 2.0]], Interpolation::Nearest)
            .await
            .unwrap();
        assert_eq!(&traces[..4], &[108.0, 109.0, 110.0, 111.0]);
        assert_eq!(&traces[4..], &[116.0, 117.0, 118.0, 119.0]);
    }

    #[tokio::test]
    async fn test_linear_midpoint() {
        let volume = well_known_volume();
        // midway between inline voxels 0 and 1 at crossline 0
        let value = volume
            .read_samples(&[[0.5, 0.5, 1.0]], Interpolation::Linear)
            .await
            .unwrap();
        assert_eq!(value, vec![104.0]);
    }

    #[tokio::test]
    async fn test_linear_clamps_at_edges() {
        let volume = well_known_volume();
        // half a voxel outside the first inline still reads the edge value
        let value = volume
            .read_samples(&[[0.5, 0.5, 0.0]], Interpolation::Linear)
            .await
            .unwrap();
        assert_eq!(value, vec![100.0]);
    }

    #[tokio::test]
    async fn test_cubic_exact_at_samples() {
        let volume = well_known_volume();
        let value = volume
            .read_samples(&[[2.5, 1.5, 1.5]], Interpolation::Cubic)
            .await
            .unwrap();
        assert_eq!(value, vec![114.0]);
    }
}
