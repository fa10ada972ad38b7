//! seislice - geometric queries against 3-D seismic cubes
//!
//! A query engine for regularly sampled seismic volumes with annotated
//! axes (Inline, Crossline and a vertical axis in time, depth or sample
//! units). Clients address a cube by URL and ask for one of four shapes:
//!
//! - a planar slice perpendicular to one axis, optionally bounded
//! - a fence of vertical traces along an arbitrary polyline
//! - raw horizon samples in a vertical window around a surface
//! - attribute maps (min, max, mean, rms, median, ...) computed over
//!   vertical windows along or between surfaces
//!
//! Results are dense little-endian f32 arrays plus JSON metadata
//! describing their shape and geospatial footprint. An in-process LRU
//! response cache sits in front of the engine.
//!
//! # Coordinates
//!
//! Three parallel coordinate systems address the same cube: voxel index,
//! annotation (inline/crossline numbers, time/depth) and world (CDP).
//! Conversions return voxel *corner* coordinates; all sampling positions
//! are voxel *centers*, shifted half a voxel before they reach the data
//! fetch.
//!
//! # Example
//!
//! ```rust,ignore
//! use seislice::{Connection, QueryEngine, SliceRequest};
//!
//! # async fn example() -> seislice::Result<()> {
//! let engine = QueryEngine::new();
//! let connection = Connection::new("file:///data/survey.cube", "");
//! let request = SliceRequest {
//!     cube: "file:///data/survey.cube".to_string(),
//!     direction: "inline".to_string(),
//!     lineno: 3,
//!     bounds: Vec::new(),
//! };
//! let response = engine.slice(&connection, &request).await?;
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod axis;
pub mod cache;
pub mod coords;
pub mod error;
pub mod fence;
pub mod handle;
pub mod horizon;
pub mod io;
pub mod layout;
pub mod metadata;
pub mod query;
pub mod request;
pub mod response;
pub mod slice;
pub mod subvolume;
pub mod surface;
pub mod volume;
pub mod window;

// Re-exports
pub use attribute::Attribute;
pub use axis::{Axis, AxisName, CoordinateSystem, Interpolation};
pub use cache::{CacheKey, ResponseCache};
pub use error::{Error, Result};
pub use handle::DataHandle;
pub use layout::{AxisDescriptor, BinGrid, CubeLayout, ValueRange};
pub use metadata::MetadataHandle;
pub use query::{Connection, EngineConfig, QueryEngine};
pub use request::{
    AttributeAlongRequest, AttributeBetweenRequest, BoundRequest, FenceRequest, HorizonRequest,
    MetadataRequest, SliceRequest, SurfaceRequest,
};
pub use response::QueryResponse;
pub use subvolume::{Bound, SubVolume};
pub use surface::{Plane, RegularSurface};
pub use volume::{InMemoryVolume, VolumeSource};

/// Version of the seislice crate
pub const SEISLICE_VERSION: &str = env!("CARGO_PKG_VERSION");
