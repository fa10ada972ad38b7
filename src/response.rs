//! Wire metadata contracts and response assembly

use crate::axis::Axis;
use crate::error::Result;
use crate::io::floats_to_le_bytes;
use crate::metadata::MetadataHandle;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Numpy-style format code for the only payload format served: 4-byte
/// little-endian floats
pub const FORMAT_F32_LE: &str = "<f4";

/// Axis description as it appears in response metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisMetadata {
    /// Name/Annotation of the axis
    pub annotation: String,
    /// Minimum axis value
    pub min: f64,
    /// Maximum axis value
    pub max: f64,
    /// Number of samples along the axis
    pub samples: usize,
    /// Distance between axis values
    pub step_size: f64,
    /// Axis units
    pub unit: String,
}

impl AxisMetadata {
    /// Describe the full extent of an axis
    pub fn full(axis: &Axis) -> Self {
        Self::reduced(axis, axis.min(), axis.max(), axis.nsamples())
    }

    /// Describe a reduced extent of an axis, e.g. after slice bounds
    pub fn reduced(axis: &Axis, min: f64, max: f64, samples: usize) -> Self {
        Self {
            annotation: axis.annotation().to_string(),
            min,
            max,
            samples,
            step_size: axis.stepsize(),
            unit: axis.unit().to_string(),
        }
    }
}

/// The bounding box of the survey, defined by its 4 corner coordinates in
/// three coordinate systems. Points are sorted in the same order for each
/// system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxMetadata {
    pub cdp: Vec<[f64; 2]>,
    pub ilxl: Vec<[f64; 2]>,
    pub ij: Vec<[f64; 2]>,
}

/// Survey-level metadata for one cube
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeMetadata {
    /// Coordinate reference system
    pub crs: String,
    /// The original input file name
    pub input_file_name: String,
    /// Import time stamp in ISO8601 format
    pub import_time_stamp: String,
    pub bounding_box: BoundingBoxMetadata,
    /// Axis descriptions, ordered inline, crossline, sample
    pub axis: Vec<AxisMetadata>,
}

impl CubeMetadata {
    pub fn from_handle(metadata: &MetadataHandle) -> Self {
        let bounding_box = metadata.bounding_box();
        Self {
            crs: metadata.crs().to_string(),
            input_file_name: metadata.input_filename().to_string(),
            import_time_stamp: metadata
                .import_time_stamp()
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
            bounding_box: BoundingBoxMetadata {
                cdp: bounding_box.cdp,
                ilxl: bounding_box.ilxl,
                ij: bounding_box.ij,
            },
            axis: vec![
                AxisMetadata::full(&metadata.iline()),
                AxisMetadata::full(&metadata.xline()),
                AxisMetadata::full(&metadata.sample()),
            ],
        }
    }
}

/// Slice metadata: the two axes of the returned plane and its geospatial
/// footprint. Shape equals `[y.samples, x.samples]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceMetadata {
    pub format: String,
    pub shape: Vec<usize>,
    pub x: AxisMetadata,
    pub y: AxisMetadata,
    pub geospatial: Vec<[f64; 2]>,
}

/// Metadata for dense array responses (fence, horizon, attributes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub format: String,
    pub shape: Vec<usize>,
}

impl ArrayMetadata {
    pub fn f32_le(shape: Vec<usize>) -> Self {
        Self {
            format: FORMAT_F32_LE.to_string(),
            shape,
        }
    }
}

/// An assembled query response: the metadata part followed by the data
/// parts, ready for the multipart writer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub metadata: Bytes,
    pub data: Vec<Bytes>,
}

impl QueryResponse {
    pub fn new(metadata: &impl Serialize, parts: Vec<Vec<f32>>) -> Result<Self> {
        Ok(Self {
            metadata: Bytes::from(serde_json::to_vec(metadata)?),
            data: parts
                .into_iter()
                .map(|part| Bytes::from(floats_to_le_bytes(&part)))
                .collect(),
        })
    }

    /// Total payload size in bytes
    pub fn size(&self) -> usize {
        self.metadata.len() + self.data.iter().map(Bytes::len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::well_known_layout;
    use std::sync::Arc;

    #[test]
    fn test_cube_metadata_json_shape() {
        let handle = MetadataHandle::new(Arc::new(well_known_layout())).unwrap();
        let metadata = CubeMetadata::from_handle(&handle);
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["crs"], "utmXX");
        assert_eq!(json["inputFileName"], "well_known.segy");
        assert_eq!(json["importTimeStamp"], "2021-02-18T21:54:42.000Z");
        assert_eq!(json["axis"][0]["annotation"], "Inline");
        assert_eq!(json["axis"][0]["stepSize"], 2.0);
        assert_eq!(json["axis"][2]["unit"], "ms");
        assert_eq!(json["boundingBox"]["ij"][2], serde_json::json!([2.0, 1.0]));
    }

    #[test]
    fn test_array_metadata_json() {
        let metadata = ArrayMetadata::f32_le(vec![5, 4]);
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"format":"<f4","shape":[5,4]}"#);
    }

    #[test]
    fn test_response_assembly() {
        let metadata = ArrayMetadata::f32_le(vec![1, 2]);
        let response =
            QueryResponse::new(&metadata, vec![vec![1.0_f32, 2.0]]).unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].len(), 8);
        assert_eq!(&response.data[0][..4], &1.0_f32.to_le_bytes());
        assert!(response.size() > 8);
    }
}
