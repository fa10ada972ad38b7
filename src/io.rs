//! Opening cubes from storage URLs

use crate::error::{Error, Result};
use crate::layout::CubeLayout;
use crate::volume::InMemoryVolume;
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tokio::fs;

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScheme {
    /// Local file system
    FileSystem,
    /// AWS S3
    S3,
    /// Azure Blob Storage
    Azure,
    /// Google Cloud Storage
    Gcs,
}

impl StorageScheme {
    /// Parse the storage scheme from a URL
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end];
            match scheme {
                "file" => Ok(StorageScheme::FileSystem),
                "s3" => Ok(StorageScheme::S3),
                "azure" | "azureSAS" => Ok(StorageScheme::Azure),
                "gs" => Ok(StorageScheme::Gcs),
                _ => Err(Error::bad_request(format!("Unknown scheme: {}", scheme))),
            }
        } else {
            // Assume file system if no scheme
            Ok(StorageScheme::FileSystem)
        }
    }
}

/// Compression codecs supported by the cube container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    None,
    Deflate,
    Zstd,
}

impl Codec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Codec::None => Ok(data.to_vec()),
            Codec::Deflate => {
                let mut encoder = DeflateEncoder::new(data, FlateCompression::default());
                let mut compressed = Vec::new();
                encoder
                    .read_to_end(&mut compressed)
                    .map_err(|e| Error::runtime(format!("Compression failed: {}", e)))?;
                Ok(compressed)
            }
            Codec::Zstd => zstd::encode_all(data, 0)
                .map_err(|e| Error::runtime(format!("Compression failed: {}", e))),
        }
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        match self {
            Codec::None => Ok(data.to_vec()),
            Codec::Deflate => {
                let mut decoder = DeflateDecoder::new(data);
                let mut decompressed = Vec::with_capacity(expected_size);
                decoder
                    .read_to_end(&mut decompressed)
                    .map_err(|e| Error::runtime(format!("Decompression failed: {}", e)))?;
                Ok(decompressed)
            }
            Codec::Zstd => zstd::decode_all(data)
                .map_err(|e| Error::runtime(format!("Decompression failed: {}", e))),
        }
    }
}

/// Container format version
const FORMAT_VERSION: u16 = 1;

/// On-disk cube container: a bincode header followed by the codec-compressed
/// little-endian f32 sample block.
#[derive(Serialize, Deserialize)]
struct CubeFile {
    version: u16,
    layout: CubeLayout,
    codec: Codec,
    samples: Vec<u8>,
}

/// Convert little-endian bytes into f32 samples
pub fn le_bytes_to_floats(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::runtime(
            "Sample block length is not a multiple of the sample size",
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Convert f32 samples into little-endian bytes
pub fn floats_to_le_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Write a cube container to disk. Used by import tooling and tests; the
/// query service itself never writes cube data.
pub async fn write_cube_file(
    path: impl AsRef<Path>,
    layout: &CubeLayout,
    samples: &[f32],
    codec: Codec,
) -> Result<()> {
    if samples.len() != layout.total_samples() {
        return Err(Error::runtime(format!(
            "Cube data has {} samples, layout requires {}",
            samples.len(),
            layout.total_samples()
        )));
    }

    let file = CubeFile {
        version: FORMAT_VERSION,
        layout: layout.clone(),
        codec,
        samples: codec.compress(&floats_to_le_bytes(samples))?,
    };
    fs::write(path, bincode::serialize(&file)?).await?;
    Ok(())
}

async fn open_cube_file(path: &str) -> Result<InMemoryVolume> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| Error::runtime(format!("Failed to open cube {}: {}", path, e)))?;

    let file: CubeFile = bincode::deserialize(&bytes)
        .map_err(|e| Error::runtime(format!("Invalid cube container {}: {}", path, e)))?;

    if file.version != FORMAT_VERSION {
        return Err(Error::runtime(format!(
            "Unsupported cube container version: {}",
            file.version
        )));
    }

    let expected = file.layout.total_samples() * 4;
    let raw = file.codec.decompress(&file.samples, expected)?;
    InMemoryVolume::new(file.layout, le_bytes_to_floats(&raw)?)
}

/// Open a cube from a URL.
///
/// Only `file://` URLs are resolved here. Cloud schemes require a
/// [`crate::volume::VolumeSource`] implementation in the consuming service,
/// which owns the credentials and the object-store SDK; `credentials` is
/// accepted so the call shape matches that path.
pub async fn open_volume(url: &str, _credentials: &str) -> Result<InMemoryVolume> {
    let scheme = StorageScheme::from_url(url)?;

    match scheme {
        StorageScheme::FileSystem => {
            let path = url.strip_prefix("file://").unwrap_or(url);
            open_cube_file(path).await
        }
        StorageScheme::S3 | StorageScheme::Azure | StorageScheme::Gcs => {
            Err(Error::runtime(format!(
                "Cloud scheme {:?} is not resolved by seislice. \
                 Provide a VolumeSource implementation backed by your object store.",
                scheme
            )))
        }
    }
}
