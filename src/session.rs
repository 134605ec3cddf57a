//! Viewer session: composes the managers, layout, and caches into one
//! document/viewer coordinate mapping

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use crate::cache::{CacheManager, CacheStats, ManagedCache, PointCache, PointCacheConfig};
use crate::controller::ViewController;
use crate::error::{ValidationError, ViewerError};
use crate::geometry::{Point, Rectangle};
use crate::pages::{PageLayout, ScrollAnchor};
use crate::pan::{PanConfig, PanManager};
use crate::rotation::{RotationConfig, RotationManager};
use crate::transform::AffineTransform;
use crate::zoom::{millionths, ZoomConfig, ZoomManager};

/// Aggregate cache memory treated as pressure, absent other configuration.
const DEFAULT_MEMORY_PRESSURE_BYTES: usize = 4 * 1024 * 1024;

/// Per-manager and cache configuration for a [`ViewerSession`].
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub zoom: ZoomConfig,
    pub pan: PanConfig,
    pub rotation: RotationConfig,
    pub point_cache: PointCacheConfig,
    /// Aggregate cache memory above which cleanup kicks in; `None` uses
    /// the built-in default.
    pub memory_pressure_bytes: Option<usize>,
}

/// One open document view.
///
/// Owns the zoom, pan, and rotation managers, the page layout, and the
/// point cache, and exposes the composed document-to-viewer mapping. The
/// composite applies zoom first, then rotation, then pan.
pub struct ViewerSession {
    zoom: ZoomManager,
    pan: PanManager,
    rotation: RotationManager,
    layout: PageLayout,
    point_cache: Arc<PointCache>,
    cache_manager: CacheManager,
    viewport: Rectangle,
}

impl ViewerSession {
    pub fn new(config: SessionConfig) -> Result<Self, ValidationError> {
        let zoom = ZoomManager::new(config.zoom)?;
        let pan = PanManager::new(config.pan)?;
        let rotation = RotationManager::new(config.rotation)?;
        let point_cache = Arc::new(PointCache::new("points", config.point_cache));

        let cache_manager = CacheManager::new(
            config
                .memory_pressure_bytes
                .unwrap_or(DEFAULT_MEMORY_PRESSURE_BYTES),
        );
        cache_manager.register(zoom.cache_handle());
        cache_manager.register(pan.cache_handle());
        cache_manager.register(rotation.cache_handle());
        cache_manager.register(Arc::clone(&point_cache) as Arc<dyn ManagedCache>);

        Ok(Self {
            zoom,
            pan,
            rotation,
            layout: PageLayout::new(),
            point_cache,
            cache_manager,
            viewport: Rectangle::new(0.0, 0.0, 800.0, 600.0),
        })
    }

    #[must_use]
    pub fn zoom(&self) -> &ZoomManager {
        &self.zoom
    }

    pub fn zoom_mut(&mut self) -> &mut ZoomManager {
        &mut self.zoom
    }

    #[must_use]
    pub fn pan(&self) -> &PanManager {
        &self.pan
    }

    pub fn pan_mut(&mut self) -> &mut PanManager {
        &mut self.pan
    }

    #[must_use]
    pub fn rotation(&self) -> &RotationManager {
        &self.rotation
    }

    pub fn rotation_mut(&mut self) -> &mut RotationManager {
        &mut self.rotation
    }

    #[must_use]
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut PageLayout {
        &mut self.layout
    }

    #[must_use]
    pub fn point_cache(&self) -> &PointCache {
        &self.point_cache
    }

    #[must_use]
    pub fn viewport(&self) -> Rectangle {
        self.viewport
    }

    /// Replace the viewport rectangle (viewer-space).
    pub fn set_viewport(&mut self, viewport: Rectangle) -> Result<(), ValidationError> {
        if !(viewport.x.is_finite()
            && viewport.y.is_finite()
            && viewport.width.is_finite()
            && viewport.height.is_finite())
        {
            return Err(ValidationError::NonFinite { field: "viewport" });
        }
        if !viewport.is_valid() {
            return Err(ValidationError::InvalidConfig {
                reason: "viewport dimensions must be non-negative".to_string(),
            });
        }
        self.viewport = viewport;
        Ok(())
    }

    /// The composed document-to-viewer transform: zoom, then rotation,
    /// then pan.
    pub fn composite_transform(&mut self) -> AffineTransform {
        let zoom = self.zoom.transform();
        let rotation = self.rotation.transform();
        let pan = self.pan.transform();
        pan.compose(&rotation).compose(&zoom)
    }

    /// Stable key for the current composite, quantized per component and
    /// tied to the layout revision so relayouts age cached points out.
    #[must_use]
    pub fn composite_key(&self) -> String {
        let z = self.zoom.state();
        let p = self.pan.state();
        let r = self.rotation.state();
        format!(
            "view:{}:{}:{}:{}:{}:{}:{}:{}:r{}",
            millionths(z.level),
            millionths(z.center.x),
            millionths(z.center.y),
            millionths(p.offset.x),
            millionths(p.offset.y),
            millionths(r.angle),
            millionths(r.center.x),
            millionths(r.center.y),
            self.layout.revision()
        )
    }

    /// Map a page-local point to viewer space, through the point cache.
    pub fn document_to_viewer(&mut self, point: Point, page: usize) -> Result<Point, ViewerError> {
        if !point.is_finite() {
            return Err(ValidationError::NonFinite { field: "point" }.into());
        }
        let page_transform = self.layout.page_transform(page)?;
        let key = format!("{}:page{page}", self.composite_key());

        if let Some(cached) = self.point_cache.get(point.x, point.y, &key) {
            return Ok(cached);
        }
        let transformed = self
            .composite_transform()
            .apply(page_transform.apply(point));
        self.point_cache.set(point.x, point.y, &key, transformed);
        Ok(transformed)
    }

    /// Map a viewer-space point back to page-local coordinates.
    ///
    /// Fails when the composite is singular (zoom level of zero cannot
    /// arise through the manager API, but external bounds changes can
    /// produce one transiently).
    pub fn viewer_to_document(&mut self, point: Point, page: usize) -> Result<Point, ViewerError> {
        if !point.is_finite() {
            return Err(ValidationError::NonFinite { field: "point" }.into());
        }
        let page_transform = self.layout.page_transform(page)?;
        let inverse = self.composite_transform().inverse()?;
        let document = inverse.apply(point);
        Ok(page_transform.inverse()?.apply(document))
    }

    /// Page numbers intersecting the viewport under the current composite.
    pub fn visible_pages(&mut self) -> Result<Vec<usize>, ViewerError> {
        let inverse = self.composite_transform().inverse()?;
        let corners = self.viewport.corners().map(|c| inverse.apply(c));

        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min = Point::new(min.x.min(c.x), min.y.min(c.y));
            max = Point::new(max.x.max(c.x), max.y.max(c.y));
        }
        Ok(self.layout.visible_pages(Rectangle::from_points(min, max)))
    }

    /// Pan so the given page anchor lands on the matching viewport edge
    /// (top anchor to the viewport top, center to center, bottom to
    /// bottom), then make that page current.
    pub fn scroll_to_page(&mut self, page: usize, anchor: ScrollAnchor) -> Result<(), ViewerError> {
        let anchor_point = self.layout.scroll_anchor_point(page, anchor)?;
        let target = match anchor {
            ScrollAnchor::Top => Point::new(self.viewport.center().x, self.viewport.min_y()),
            ScrollAnchor::Center => self.viewport.center(),
            ScrollAnchor::Bottom => Point::new(self.viewport.center().x, self.viewport.max_y()),
        };

        // viewer = rotation(zoom(doc)) + pan; solve for the pan offset that
        // puts the anchor at the target.
        let zoom = self.zoom.transform();
        let rotation = self.rotation.transform();
        let mapped = rotation.compose(&zoom).apply(anchor_point);
        let offset = target - mapped;

        self.layout.set_current_page(page)?;
        debug!("session: scrolling to page {page} ({anchor:?})");
        self.pan.pan_to_offset(offset)?;
        Ok(())
    }

    /// Scroll to the top of the first page.
    pub fn scroll_to_top(&mut self) -> Result<(), ViewerError> {
        self.scroll_to_page(0, ScrollAnchor::Top)
    }

    /// Scroll to the bottom of the last page.
    pub fn scroll_to_bottom(&mut self) -> Result<(), ViewerError> {
        let last = self
            .layout
            .page_count()
            .checked_sub(1)
            .ok_or(ValidationError::UnknownPage { page: 0 })?;
        self.scroll_to_page(last, ScrollAnchor::Bottom)
    }

    /// Advance every manager's animation clock.
    pub fn tick(&mut self, now: Instant) {
        self.zoom.tick(now);
        self.pan.tick(now);
        self.rotation.tick(now);
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.zoom.is_animating() || self.pan.is_animating() || self.rotation.is_animating()
    }

    /// Cancel every in-flight animation and momentum run.
    pub fn cancel_all(&mut self) {
        self.zoom.cancel();
        self.pan.cancel();
        self.rotation.cancel();
    }

    /// Counters summed across every cache this session owns.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache_manager.aggregate_stats()
    }

    /// Blended health score across the managers and caches, in `[0, 1]`.
    /// Debugging signal only.
    #[must_use]
    pub fn overall_score(&self) -> f64 {
        let hit_rate = self.cache_stats().hit_rate();
        (self.zoom.metrics().overall_score(hit_rate)
            + self.pan.metrics().overall_score(hit_rate)
            + self.rotation.metrics().overall_score(hit_rate))
            / 3.0
    }

    /// One synchronous cleanup pass over the session's caches.
    pub fn run_cache_cleanup(&self) -> usize {
        self.cache_manager.run_cleanup()
    }

    /// Start periodic background cache cleanup.
    pub fn start_background_cleanup(&mut self, interval: Duration) {
        self.cache_manager.start_background_cleanup(interval);
    }

    pub fn stop_background_cleanup(&mut self) {
        self.cache_manager.stop_background_cleanup();
    }
}
