//! Request types - the canonical form queries arrive in

use crate::axis::AxisName;
use crate::cache::CacheKey;
use crate::error::Result;
use crate::subvolume::Bound;
use crate::surface::{Plane, RegularSurface};
use serde::{Deserialize, Serialize};

/// Compute the cache fingerprint of a request from its normative fields
pub trait Fingerprint: Serialize {
    fn fingerprint(&self) -> Result<CacheKey>
    where
        Self: Sized,
    {
        CacheKey::of(self)
    }
}

/// Request for survey-level metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRequest {
    /// Cube identifier
    pub cube: String,
}

/// A half-open constraint on one axis of a slice request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundRequest {
    pub direction: String,
    pub lower: i32,
    pub upper: i32,
}

impl BoundRequest {
    pub fn to_bound(&self) -> Result<Bound> {
        Ok(Bound {
            direction: AxisName::parse(&self.direction)?,
            lower: self.lower,
            upper: self.upper,
        })
    }
}

/// Request for a planar slice
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceRequest {
    pub cube: String,
    pub direction: String,
    pub lineno: i32,
    #[serde(default)]
    pub bounds: Vec<BoundRequest>,
}

/// Request for traces along a polyline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FenceRequest {
    pub cube: String,
    pub coordinate_system: String,
    pub coordinates: Vec<Vec<f32>>,
    #[serde(default)]
    pub interpolation: String,
    #[serde(default)]
    pub fill_value: Option<f32>,
}

/// A regular surface as supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceRequest {
    /// Vertical values / height map; cells equal to `fill_value` are
    /// ignored and propagate as fill into every output
    pub values: Vec<Vec<f32>>,
    /// Rotation of the X-axis (East), counterclockwise, in degrees
    pub rotation: f32,
    /// X-coordinate of the origin
    pub xori: f32,
    /// Y-coordinate of the origin
    pub yori: f32,
    /// The physical distance between height-map columns
    pub xinc: f32,
    /// The physical distance between height-map rows
    pub yinc: f32,
    pub fill_value: f32,
}

impl SurfaceRequest {
    pub fn to_surface(&self) -> Result<RegularSurface> {
        RegularSurface::new(
            self.values.clone(),
            Plane {
                xori: self.xori as f64,
                yori: self.yori as f64,
                xinc: self.xinc as f64,
                yinc: self.yinc as f64,
                rotation: self.rotation as f64,
            },
            self.fill_value,
        )
    }
}

/// Request for raw horizon samples around a surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizonRequest {
    pub cube: String,
    pub surface: SurfaceRequest,
    pub above: f32,
    pub below: f32,
    #[serde(default)]
    pub interpolation: String,
}

/// Request for attributes computed in a window along one surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeAlongRequest {
    pub cube: String,
    pub surface: SurfaceRequest,
    pub above: f32,
    pub below: f32,
    /// Output window stepsize; 0 selects the cube's sample stepsize
    #[serde(default)]
    pub stepsize: f32,
    pub attributes: Vec<String>,
    #[serde(default)]
    pub interpolation: String,
}

/// Request for attributes computed between two surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeBetweenRequest {
    pub cube: String,
    pub primary: SurfaceRequest,
    pub secondary: SurfaceRequest,
    /// Output window stepsize; 0 selects the cube's sample stepsize
    #[serde(default)]
    pub stepsize: f32,
    pub attributes: Vec<String>,
    #[serde(default)]
    pub interpolation: String,
}

impl Fingerprint for MetadataRequest {}
impl Fingerprint for SliceRequest {}
impl Fingerprint for FenceRequest {}
impl Fingerprint for HorizonRequest {}
impl Fingerprint for AttributeAlongRequest {}
impl Fingerprint for AttributeBetweenRequest {}
