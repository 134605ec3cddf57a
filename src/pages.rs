//! Multi-page layout: page placement, hit-testing, and scroll anchors

use log::debug;

use crate::error::ValidationError;
use crate::geometry::{Point, Rectangle, Size};
use crate::transform::AffineTransform;

/// How pages are arranged in document space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayoutMode {
    /// Only the current page occupies the document; others take no space.
    #[default]
    Single,
    /// Pages stacked vertically with spacing between them.
    Continuous,
    /// Two pages side by side per row, rows stacked vertically.
    Spread,
}

/// Vertical reference point on a page used when scrolling to it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrollAnchor {
    #[default]
    Top,
    Center,
    Bottom,
}

/// One laid-out page: its index, intrinsic size, and document-space offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageInfo {
    /// Zero-based page index.
    pub page_number: usize,
    pub size: Size,
    /// Top-left corner of the page in document space.
    pub offset: Point,
}

impl PageInfo {
    #[must_use]
    pub fn bounds(&self) -> Rectangle {
        Rectangle::new(self.offset.x, self.offset.y, self.size.width, self.size.height)
    }
}

/// Owns the page list and the currently active layout.
///
/// Layout is recomputed eagerly on every mutation; queries read the cached
/// placement. The revision counter feeds downstream cache keys so stale
/// layout-dependent transforms age out after any relayout.
#[derive(Clone, Debug)]
pub struct PageLayout {
    pages: Vec<PageInfo>,
    mode: LayoutMode,
    page_spacing: f64,
    current_page: usize,
    total_size: Size,
    revision: u64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl PageLayout {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            mode: LayoutMode::default(),
            page_spacing: 10.0,
            current_page: 0,
            total_size: Size::ZERO,
            revision: 0,
        }
    }

    /// Replace the page list. Resets the current page to 0 when it falls
    /// out of range.
    pub fn set_pages(&mut self, sizes: Vec<Size>) {
        self.pages = sizes
            .into_iter()
            .enumerate()
            .map(|(page_number, size)| PageInfo {
                page_number,
                size,
                offset: Point::ZERO,
            })
            .collect();
        if self.current_page >= self.pages.len() {
            self.current_page = 0;
        }
        self.relayout();
    }

    pub fn set_layout_mode(&mut self, mode: LayoutMode) {
        if self.mode != mode {
            debug!("layout: switching to {mode:?}");
            self.mode = mode;
            self.relayout();
        }
    }

    pub fn set_page_spacing(&mut self, spacing: f64) -> Result<(), ValidationError> {
        if !spacing.is_finite() || spacing < 0.0 {
            return Err(ValidationError::InvalidConfig {
                reason: "page spacing must be finite and non-negative".to_string(),
            });
        }
        self.page_spacing = spacing;
        self.relayout();
        Ok(())
    }

    pub fn set_current_page(&mut self, page: usize) -> Result<(), ValidationError> {
        if page >= self.pages.len() {
            return Err(ValidationError::UnknownPage { page });
        }
        if self.current_page != page {
            self.current_page = page;
            if self.mode == LayoutMode::Single {
                self.relayout();
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn page_spacing(&self) -> f64 {
        self.page_spacing
    }

    /// Bounding size of the whole laid-out document.
    #[must_use]
    pub fn total_size(&self) -> Size {
        self.total_size
    }

    /// Monotonic counter bumped on every relayout.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn page(&self, page: usize) -> Option<&PageInfo> {
        self.pages.get(page)
    }

    #[must_use]
    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    /// Transform from page-local coordinates to document coordinates.
    pub fn page_transform(&self, page: usize) -> Result<AffineTransform, ValidationError> {
        let info = self.pages.get(page).ok_or(ValidationError::UnknownPage { page })?;
        Ok(AffineTransform::translation(info.offset.x, info.offset.y))
    }

    /// Topmost page whose bounds contain the document-space point.
    ///
    /// In single mode only the current page is hit-testable.
    #[must_use]
    pub fn find_page_at_point(&self, point: Point) -> Option<usize> {
        if self.mode == LayoutMode::Single {
            let info = self.pages.get(self.current_page)?;
            return info.bounds().contains_point(point).then_some(info.page_number);
        }
        self.pages
            .iter()
            .find(|info| info.bounds().contains_point(point))
            .map(|info| info.page_number)
    }

    /// Pages whose bounds intersect the document-space rectangle, ascending.
    #[must_use]
    pub fn visible_pages(&self, region: Rectangle) -> Vec<usize> {
        if self.mode == LayoutMode::Single {
            return match self.pages.get(self.current_page) {
                Some(info) if info.bounds().intersects(region) => vec![info.page_number],
                _ => Vec::new(),
            };
        }
        self.pages
            .iter()
            .filter(|info| info.bounds().intersects(region))
            .map(|info| info.page_number)
            .collect()
    }

    /// Document-space point to bring into view for the given page and
    /// anchor: top, center, or bottom of the page, horizontally centered.
    pub fn scroll_anchor_point(
        &self,
        page: usize,
        anchor: ScrollAnchor,
    ) -> Result<Point, ValidationError> {
        let info = self.pages.get(page).ok_or(ValidationError::UnknownPage { page })?;
        let x = info.offset.x + info.size.width / 2.0;
        let y = match anchor {
            ScrollAnchor::Top => info.offset.y,
            ScrollAnchor::Center => info.offset.y + info.size.height / 2.0,
            ScrollAnchor::Bottom => info.offset.y + info.size.height,
        };
        Ok(Point::new(x, y))
    }

    fn relayout(&mut self) {
        self.revision += 1;
        match self.mode {
            LayoutMode::Single => self.layout_single(),
            LayoutMode::Continuous => self.layout_continuous(),
            LayoutMode::Spread => self.layout_spread(),
        }
    }

    fn layout_single(&mut self) {
        for info in &mut self.pages {
            info.offset = Point::ZERO;
        }
        self.total_size = self
            .pages
            .get(self.current_page)
            .map(|info| info.size)
            .unwrap_or(Size::ZERO);
    }

    fn layout_continuous(&mut self) {
        let mut y = 0.0;
        let mut max_width: f64 = 0.0;
        for info in &mut self.pages {
            info.offset = Point::new(0.0, y);
            y += info.size.height + self.page_spacing;
            max_width = max_width.max(info.size.width);
        }
        let heights: f64 = self.pages.iter().map(|p| p.size.height).sum();
        let spacing = if self.pages.len() > 1 { self.page_spacing } else { 0.0 };
        self.total_size = Size::new(max_width, heights + spacing);
    }

    fn layout_spread(&mut self) {
        let mut y = 0.0;
        let mut max_width: f64 = 0.0;
        let mut row_heights = Vec::with_capacity(self.pages.len().div_ceil(2));

        let mut i = 0;
        while i < self.pages.len() {
            let left_size = self.pages[i].size;
            let right_size = self.pages.get(i + 1).map(|p| p.size);

            self.pages[i].offset = Point::new(0.0, y);
            let mut row_width = left_size.width;
            let mut row_height = left_size.height;
            if let Some(right) = right_size {
                self.pages[i + 1].offset =
                    Point::new(left_size.width + self.page_spacing, y);
                row_width += self.page_spacing + right.width;
                row_height = row_height.max(right.height);
            }

            max_width = max_width.max(row_width);
            row_heights.push(row_height);
            y += row_height + self.page_spacing;
            i += 2;
        }

        let heights: f64 = row_heights.iter().sum();
        let spacing = if row_heights.len() > 1 { self.page_spacing } else { 0.0 };
        self.total_size = Size::new(max_width, heights + spacing);
    }
}
