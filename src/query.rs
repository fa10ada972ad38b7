//! Query engine - orchestration, caching and response assembly

use crate::attribute::{
    attributes_along_surface, attributes_between_surfaces, Attribute, MAX_ATTRIBUTE_WORKERS,
};
use crate::axis::{AxisName, CoordinateSystem, Interpolation};
use crate::cache::ResponseCache;
use crate::error::{Error, Result};
use crate::fence::fence;
use crate::handle::DataHandle;
use crate::horizon::sample_horizon;
use crate::request::{
    AttributeAlongRequest, AttributeBetweenRequest, FenceRequest, Fingerprint, HorizonRequest,
    MetadataRequest, SliceRequest,
};
use crate::response::{ArrayMetadata, CubeMetadata, QueryResponse};
use crate::slice::slice;
use crate::subvolume::Bound;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

/// The connection abstraction handed down from the surrounding service:
/// where the cube lives, how to authenticate against it, and whether the
/// presented credentials were verified to grant read access.
#[derive(Debug, Clone)]
pub struct Connection {
    url: String,
    connection_string: String,
    authorized_to_read: bool,
}

impl Connection {
    pub fn new(url: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_string: connection_string.into(),
            authorized_to_read: true,
        }
    }

    pub fn with_authorization(mut self, authorized_to_read: bool) -> Self {
        self.authorized_to_read = authorized_to_read;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Whether cached responses may be served to this connection. Guards
    /// against a hot cache leaking data to an unauthorised key-holder.
    pub fn is_authorized_to_read(&self) -> bool {
        self.authorized_to_read
    }
}

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Response cache capacity in megabytes; 0 disables the cache
    pub cache_size_mb: usize,
    /// Cap on concurrent attribute workers per request
    pub max_attribute_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_size_mb: 0,
            max_attribute_workers: MAX_ATTRIBUTE_WORKERS,
        }
    }
}

/// Entry point for all cube queries. Owns the response cache; everything
/// else is request-scoped.
pub struct QueryEngine {
    cache: ResponseCache,
    config: EngineConfig,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            cache: ResponseCache::new(config.cache_size_mb),
            config,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    async fn open(&self, connection: &Connection) -> Result<Arc<DataHandle>> {
        Ok(Arc::new(
            DataHandle::open(connection.url(), connection.connection_string()).await?,
        ))
    }

    fn cached(&self, request: &impl Fingerprint, connection: &Connection) -> Option<QueryResponse> {
        let key = request.fingerprint().ok()?;
        let hit = self.cache.get(&key)?;
        if !connection.is_authorized_to_read() {
            return None;
        }
        debug!(%key, "cache hit");
        Some(hit)
    }

    /// Survey-level metadata for a cube
    pub async fn metadata(&self, connection: &Connection, request: &MetadataRequest) -> Result<Bytes> {
        info!(cube = %request.cube, "metadata query");
        let handle = self.open(connection).await?;
        let metadata = CubeMetadata::from_handle(handle.metadata());
        Ok(Bytes::from(serde_json::to_vec(&metadata)?))
    }

    /// A planar slice through the cube
    pub async fn slice(&self, connection: &Connection, request: &SliceRequest) -> Result<QueryResponse> {
        if let Some(hit) = self.cached(request, connection) {
            return Ok(hit);
        }

        let direction = AxisName::parse(&request.direction)?;
        let bounds: Vec<Bound> = request
            .bounds
            .iter()
            .map(|bound| bound.to_bound())
            .collect::<Result<_>>()?;

        info!(cube = %request.cube, %direction, lineno = request.lineno, "slice query");
        let handle = self.open(connection).await?;
        let (data, metadata) = slice(&handle, direction, request.lineno, &bounds).await?;

        self.finish(request, QueryResponse::new(&metadata, vec![data])?)
    }

    /// Traces along an arbitrary polyline
    pub async fn fence(&self, connection: &Connection, request: &FenceRequest) -> Result<QueryResponse> {
        if let Some(hit) = self.cached(request, connection) {
            return Ok(hit);
        }

        let coordinate_system = CoordinateSystem::parse(&request.coordinate_system)?;
        let interpolation = Interpolation::parse(&request.interpolation)?;

        info!(
            cube = %request.cube,
            npoints = request.coordinates.len(),
            "fence query"
        );
        let handle = self.open(connection).await?;
        let (data, metadata) = fence(
            &handle,
            coordinate_system,
            &request.coordinates,
            interpolation,
            request.fill_value,
        )
        .await?;

        self.finish(request, QueryResponse::new(&metadata, vec![data])?)
    }

    /// Raw horizon samples in a vertical window around a surface
    pub async fn horizon(&self, connection: &Connection, request: &HorizonRequest) -> Result<QueryResponse> {
        if let Some(hit) = self.cached(request, connection) {
            return Ok(hit);
        }

        let interpolation = Interpolation::parse(&request.interpolation)?;
        validate_vertical_window(request.above, request.below, 0.0)?;
        let surface = request.surface.to_surface()?;

        info!(
            cube = %request.cube,
            nrows = surface.nrows(),
            ncols = surface.ncols(),
            "horizon query"
        );
        let handle = self.open(connection).await?;
        let (data, vsize) = sample_horizon(
            &handle,
            &surface,
            request.above as f64,
            request.below as f64,
            interpolation,
        )
        .await?;

        let metadata = ArrayMetadata::f32_le(vec![surface.nrows(), surface.ncols(), vsize]);
        self.finish(request, QueryResponse::new(&metadata, vec![data])?)
    }

    /// Attribute maps in a window along one surface
    pub async fn attributes_along_surface(
        &self,
        connection: &Connection,
        request: &AttributeAlongRequest,
    ) -> Result<QueryResponse> {
        if let Some(hit) = self.cached(request, connection) {
            return Ok(hit);
        }

        let attributes = Attribute::parse_all(&request.attributes)?;
        let interpolation = Interpolation::parse(&request.interpolation)?;
        validate_vertical_window(request.above, request.below, request.stepsize)?;
        let surface = request.surface.to_surface()?;

        info!(
            cube = %request.cube,
            nattributes = attributes.len(),
            hsize = surface.size(),
            "attributes along surface"
        );
        let handle = self.open(connection).await?;
        let shape = vec![surface.nrows(), surface.ncols()];
        let maps = attributes_along_surface(
            handle,
            surface,
            request.above as f64,
            request.below as f64,
            request.stepsize as f64,
            &attributes,
            interpolation,
            self.config.max_attribute_workers,
        )
        .await?;

        let metadata = ArrayMetadata::f32_le(shape);
        self.finish(request, QueryResponse::new(&metadata, maps)?)
    }

    /// Attribute maps between two surfaces
    pub async fn attributes_between_surfaces(
        &self,
        connection: &Connection,
        request: &AttributeBetweenRequest,
    ) -> Result<QueryResponse> {
        if let Some(hit) = self.cached(request, connection) {
            return Ok(hit);
        }

        let attributes = Attribute::parse_all(&request.attributes)?;
        let interpolation = Interpolation::parse(&request.interpolation)?;
        validate_vertical_window(0.0, 0.0, request.stepsize)?;
        let primary = request.primary.to_surface()?;
        let secondary = request.secondary.to_surface()?;

        info!(
            cube = %request.cube,
            nattributes = attributes.len(),
            hsize = primary.size(),
            "attributes between surfaces"
        );
        let handle = self.open(connection).await?;
        let shape = vec![primary.nrows(), primary.ncols()];
        let maps = attributes_between_surfaces(
            handle,
            primary,
            secondary,
            request.stepsize as f64,
            &attributes,
            interpolation,
            self.config.max_attribute_workers,
        )
        .await?;

        let metadata = ArrayMetadata::f32_le(shape);
        self.finish(request, QueryResponse::new(&metadata, maps)?)
    }

    fn finish(&self, request: &impl Fingerprint, response: QueryResponse) -> Result<QueryResponse> {
        if let Ok(key) = request.fingerprint() {
            self.cache.set(key, response.clone());
        }
        Ok(response)
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_vertical_window(above: f32, below: f32, stepsize: f32) -> Result<()> {
    if above < 0.0 || below < 0.0 {
        return Err(Error::bad_request(format!(
            "Above and below must be positive. Above was {}, below was {}",
            above, below
        )));
    }
    if stepsize < 0.0 {
        return Err(Error::bad_request(format!(
            "'stepsize' must not be negative, was {}",
            stepsize
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_validation() {
        validate_vertical_window(0.0, 0.0, 0.0).unwrap();
        validate_vertical_window(8.0, 4.0, 2.0).unwrap();

        let err = validate_vertical_window(-4.0, 1.11, 0.0).unwrap_err();
        assert!(err
            .to_string()
            .contains("Above and below must be positive"));

        let err = validate_vertical_window(0.0, 0.0, -1.0).unwrap_err();
        assert!(err.to_string().contains("'stepsize'"));
    }

    #[test]
    fn test_connection_authorization_flag() {
        let connection = Connection::new("file://cube", "");
        assert!(connection.is_authorized_to_read());
        let connection = connection.with_authorization(false);
        assert!(!connection.is_authorized_to_read());
    }
}
