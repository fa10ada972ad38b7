//! Data handle - an opened cube ready for reads

use crate::axis::Interpolation;
use crate::error::{Error, Result};
use crate::io;
use crate::metadata::MetadataHandle;
use crate::subvolume::SubVolume;
use crate::volume::{VolumeSource, VoxelPosition};
use std::sync::Arc;

/// Size in bytes of one stored sample (32-bit float)
pub const SAMPLE_SIZE: usize = 4;

/// An opened cube: the volume source plus its resolved metadata.
///
/// Shared read-only across worker tasks within a request; all reads are
/// synchronous from the caller's perspective.
pub struct DataHandle {
    source: Arc<dyn VolumeSource>,
    metadata: MetadataHandle,
}

impl DataHandle {
    /// Open a cube from a storage URL
    pub async fn open(url: &str, credentials: &str) -> Result<Self> {
        let volume = io::open_volume(url, credentials).await?;
        Self::from_source(Arc::new(volume))
    }

    /// Wrap an already-constructed volume source
    pub fn from_source(source: Arc<dyn VolumeSource>) -> Result<Self> {
        let metadata = MetadataHandle::new(Arc::new(source.layout().clone()))?;
        Ok(Self { source, metadata })
    }

    pub fn metadata(&self) -> &MetadataHandle {
        &self.metadata
    }

    /// Bytes required for a subvolume read
    pub fn subvolume_buffer_size(&self, subvolume: &SubVolume) -> usize {
        subvolume.nsamples() * SAMPLE_SIZE
    }

    /// Bytes required for a trace read
    pub fn traces_buffer_size(&self, ntraces: usize) -> usize {
        ntraces * self.metadata.sample().nsamples() * SAMPLE_SIZE
    }

    /// Bytes required for a samples read
    pub fn samples_buffer_size(&self, nsamples: usize) -> usize {
        nsamples * SAMPLE_SIZE
    }

    pub async fn read_subvolume(&self, subvolume: &SubVolume) -> Result<Vec<f32>> {
        self.source
            .read_subset(subvolume.lower(), subvolume.upper())
            .await
            .map_err(read_failure)
    }

    pub async fn read_traces(
        &self,
        coordinates: &[VoxelPosition],
        interpolation: Interpolation,
    ) -> Result<Vec<f32>> {
        self.source
            .read_traces(coordinates, interpolation)
            .await
            .map_err(read_failure)
    }

    pub async fn read_samples(
        &self,
        coordinates: &[VoxelPosition],
        interpolation: Interpolation,
    ) -> Result<Vec<f32>> {
        self.source
            .read_samples(coordinates, interpolation)
            .await
            .map_err(read_failure)
    }
}

/// Backing-store failures surface as runtime errors; request and invariant
/// errors pass through untouched.
fn read_failure(err: Error) -> Error {
    match err {
        Error::Runtime(msg) => {
            Error::runtime(format!("Failed to read from volume source: {}", msg))
        }
        Error::Io(io_err) => Error::runtime(format!(
            "Failed to read from volume source: {}",
            io_err
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::well_known_volume;

    fn handle() -> DataHandle {
        DataHandle::from_source(Arc::new(well_known_volume())).unwrap()
    }

    #[test]
    fn test_buffer_sizes() {
        let handle = handle();
        let full = SubVolume::full(handle.metadata());
        assert_eq!(handle.subvolume_buffer_size(&full), 24 * 4);
        assert_eq!(handle.traces_buffer_size(5), 5 * 4 * 4);
        assert_eq!(handle.samples_buffer_size(7), 28);
    }

    #[tokio::test]
    async fn test_read_full_subvolume() {
        let handle = handle();
        let full = SubVolume::full(handle.metadata());
        let data = handle.read_subvolume(&full).await.unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(data[0], 100.0);
        assert_eq!(data[23], 123.0);
    }
}
