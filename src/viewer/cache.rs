//! LRU cache for painted page surfaces
//!
//! Keyed by everything that changes pixels: page, committed scale, pixel
//! density, container size, and fit policy. An unchanged repaint is a cache
//! hit and therefore pixel-identical by construction.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::pipeline::PaintParams;
use super::types::{FitPolicy, RenderedPage};

fn millionths(value: f32) -> u32 {
    (value * 1_000_000.0) as u32
}

/// Cache key for painted surfaces.
///
/// Scales are stored as millionths for stable hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceKey {
    pub page: usize,
    pub committed_scale_millionths: u32,
    pub dpr_millionths: u32,
    pub container_width: u32,
    pub container_height: u32,
    pub fit: FitKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FitKey {
    Width,
    Page,
    Custom(u32),
}

impl SurfaceKey {
    #[must_use]
    pub fn from_params(page: usize, params: &PaintParams) -> Self {
        Self {
            page,
            committed_scale_millionths: millionths(params.committed_scale),
            dpr_millionths: millionths(params.device_pixel_ratio),
            container_width: params.container.width as u32,
            container_height: params.container.height as u32,
            fit: match params.fit {
                FitPolicy::Width => FitKey::Width,
                FitPolicy::Page => FitKey::Page,
                FitPolicy::Custom(scale) => FitKey::Custom(millionths(scale)),
            },
        }
    }
}

/// LRU cache of painted surfaces, owned by the worker thread
pub struct SurfaceCache {
    cache: LruCache<SurfaceKey, Arc<RenderedPage>>,
}

impl SurfaceCache {
    /// Create a cache holding up to `capacity` surfaces
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).expect("1 is non-zero")),
            ),
        }
    }

    /// Get a cached surface, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &SurfaceKey) -> Option<Arc<RenderedPage>> {
        self.cache.get(key).cloned()
    }

    /// Insert a surface, returning a shared handle to it
    pub fn insert(&mut self, key: SurfaceKey, page: RenderedPage) -> Arc<RenderedPage> {
        let arc = Arc::new(page);
        self.cache.put(key, arc.clone());
        arc
    }

    /// Drop every cached surface (document changed)
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
