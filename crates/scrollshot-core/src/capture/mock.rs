//! Simulated host page for testing and development
//!
//! [`SimulatedPage`] implements [`ScrollPort`], [`SnapshotPort`] and
//! [`IsolationPort`] over an in-memory page raster. A scroll container sits
//! inside a viewport; scrolling slides the container's window over the page
//! and every snapshot renders the whole viewport at device resolution.
//!
//! # Features
//!
//! - **Device scale:** The page raster is in physical pixels; geometry is
//!   reported in CSS pixels
//! - **Fixed header:** An optional sticky bar painted over the top of the
//!   container in every snapshot, hidden while isolated
//! - **Rate limiting:** Scripted snapshot errors and a periodic throttle
//! - **Layout shift:** Move the container after a number of scrolls
//! - **Failure injection:** Make scrolling fail after a number of calls
//! - **Recording:** Scroll history, snapshot count, isolation events and the
//!   highest number of concurrent snapshot requests
//!
//! # Examples
//!
//! ```
//! use scrollshot_core::capture::{ScrollPort, SnapshotPort, mock::SimulatedPage};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let page = SimulatedPage::generated(200, 1200, 400, 1);
//!
//!     assert_eq!(page.client_extent().await.unwrap(), 400);
//!     assert_eq!(page.scroll_extent().await.unwrap(), 1200);
//!
//!     page.set_scroll_offset(300).await.unwrap();
//!     let snapshot = page.capture_viewport().await.unwrap();
//!     assert_eq!(snapshot.dimensions(), (200, 500));
//!     assert_eq!(page.scroll_history(), vec![300]);
//! }
//! ```

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tokio::time::sleep;

use super::{
    ImageBuffer, IsolationHandle, IsolationPort, ScrollPort, SnapshotPort,
    geometry::compute_crop_rect,
};
use crate::{
    error::{CaptureResult, IsolationError, ScrollError, SnapshotError},
    model::{CaptureTarget, ScrollMetrics, Viewport, ViewportRect, to_pixels},
};

/// Viewport area outside the container
const BACKGROUND: [u8; 4] = [32, 32, 40, 255];

/// Chrome above the container in [`SimulatedPage::generated`], in CSS px
const GENERATED_TOP_CHROME: f64 = 50.0;

/// Chrome below the container in [`SimulatedPage::generated`], in CSS px
const GENERATED_BOTTOM_CHROME: f64 = 50.0;

/// Isolation call recorded by [`SimulatedPage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationEvent {
    Isolated,
    Restored,
}

#[derive(Debug, Clone, Copy)]
struct FixedHeader {
    height: f64,
    color:  [u8; 4],
}

#[derive(Debug, Clone, Copy)]
struct LayoutShift {
    after_scrolls: usize,
    dy:            f64,
}

#[derive(Debug, Default)]
struct PageState {
    offset:            u32,
    scroll_calls:      usize,
    scroll_history:    Vec<u32>,
    snapshot_requests: usize,
    script:            VecDeque<SnapshotError>,
    isolated:          bool,
    isolation_events:  Vec<IsolationEvent>,
    frames_waited:     u64,
    in_flight:         usize,
    max_in_flight:     usize,
}

/// In-memory page behind a scroll container
#[derive(Debug)]
pub struct SimulatedPage {
    /// Page content in physical pixels
    page:              ImageBuffer,
    viewport:          Viewport,
    /// Container rectangle in viewport coordinates
    container:         ViewportRect,
    header:            Option<FixedHeader>,
    rate_limit_every:  Option<usize>,
    snapshot_delay:    Option<Duration>,
    layout_shift:      Option<LayoutShift>,
    fail_scroll_after: Option<usize>,
    fail_isolation:    bool,
    fail_restore:      bool,
    state:             Mutex<PageState>,
}

impl SimulatedPage {
    /// Creates a page shown through `container`
    ///
    /// `page` is in physical pixels: its width should be
    /// `container.width * viewport.device_scale`.
    pub fn new(page: ImageBuffer, viewport: Viewport, container: ViewportRect) -> Self {
        Self {
            page,
            viewport,
            container,
            header: None,
            rate_limit_every: None,
            snapshot_delay: None,
            layout_shift: None,
            fail_scroll_after: None,
            fail_isolation: false,
            fail_restore: false,
            state: Mutex::new(PageState::default()),
        }
    }

    /// Creates a `width` x `page_height` noise page behind a container
    /// `client_height` tall, at device scale 1
    ///
    /// The viewport adds 50px of chrome above and below the container so
    /// snapshots are larger than the target.
    pub fn generated(width: u32, page_height: u32, client_height: u32, seed: u64) -> Self {
        let page = ImageBuffer::from_test_pattern(width, page_height, seed);
        let viewport = Viewport::new(
            f64::from(width),
            GENERATED_TOP_CHROME + f64::from(client_height) + GENERATED_BOTTOM_CHROME,
            1.0,
        );
        let container = ViewportRect::new(
            0.0,
            GENERATED_TOP_CHROME,
            f64::from(width),
            f64::from(client_height),
        );
        Self::new(page, viewport, container)
    }

    /// Starts the page scrolled to `offset`
    pub fn with_initial_offset(self, offset: u32) -> Self {
        let offset = offset.min(self.scrollable());
        self.state.lock().offset = offset;
        self
    }

    /// Paints a fixed header `height` CSS px tall over the top of the
    /// container while not isolated
    pub fn with_header(mut self, height: f64, color: [u8; 4]) -> Self {
        self.header = Some(FixedHeader { height, color });
        self
    }

    /// Rate-limits every `n`th snapshot request
    pub fn with_rate_limit_every(mut self, n: usize) -> Self {
        self.rate_limit_every = (n > 0).then_some(n);
        self
    }

    /// Delays every snapshot by `delay`
    pub fn with_snapshot_delay(mut self, delay: Duration) -> Self {
        self.snapshot_delay = Some(delay);
        self
    }

    /// Moves the container by `dy` CSS px once `after_scrolls` scrolls have
    /// happened
    pub fn with_layout_shift(mut self, after_scrolls: usize, dy: f64) -> Self {
        self.layout_shift = Some(LayoutShift { after_scrolls, dy });
        self
    }

    /// Fails every scroll call after the first `calls`
    pub fn fail_scroll_after(mut self, calls: usize) -> Self {
        self.fail_scroll_after = Some(calls);
        self
    }

    /// Makes `isolate` fail without hiding anything
    pub fn fail_isolation(mut self) -> Self {
        self.fail_isolation = true;
        self
    }

    /// Makes `restore` fail, leaving overlays hidden
    pub fn fail_restore(mut self) -> Self {
        self.fail_restore = true;
        self
    }

    /// Queues errors returned by the next snapshot requests, in order
    pub fn script_snapshots(&self, errors: impl IntoIterator<Item = SnapshotError>) {
        self.state.lock().script.extend(errors);
    }

    /// The page raster
    pub fn page(&self) -> &ImageBuffer {
        &self.page
    }

    /// Offsets passed to successful scroll calls, in order
    pub fn scroll_history(&self) -> Vec<u32> {
        self.state.lock().scroll_history.clone()
    }

    /// Snapshot requests received, including refused ones
    pub fn snapshot_count(&self) -> usize {
        self.state.lock().snapshot_requests
    }

    pub fn isolation_events(&self) -> Vec<IsolationEvent> {
        self.state.lock().isolation_events.clone()
    }

    pub fn is_isolated(&self) -> bool {
        self.state.lock().isolated
    }

    /// Total composited frames waited for
    pub fn frames_waited(&self) -> u64 {
        self.state.lock().frames_waited
    }

    /// Highest number of snapshot requests in flight at once
    pub fn max_concurrent_snapshots(&self) -> usize {
        self.state.lock().max_in_flight
    }

    /// The capture target as the host currently reports it
    pub fn capture_target(&self) -> CaptureResult<CaptureTarget> {
        let state = self.state.lock();
        CaptureTarget::new(
            self.bounds_for(&state),
            self.viewport,
            ScrollMetrics::new(self.client_height(), self.scroll_height(), state.offset),
        )
    }

    fn client_height(&self) -> u32 {
        to_pixels(self.container.height.round())
    }

    fn scroll_height(&self) -> u32 {
        let css = to_pixels((f64::from(self.page.height()) / self.viewport.device_scale).floor());
        css.max(self.client_height())
    }

    fn scrollable(&self) -> u32 {
        self.scroll_height() - self.client_height()
    }

    fn bounds_for(&self, state: &PageState) -> ViewportRect {
        let mut bounds = self.container;
        match self.layout_shift {
            Some(shift) if state.scroll_calls > shift.after_scrolls => bounds.top += shift.dy,
            _ => {}
        }
        bounds
    }

    fn check_scroll_allowed(&self, state: &PageState) -> Result<(), ScrollError> {
        match self.fail_scroll_after {
            Some(limit) if state.scroll_calls >= limit => {
                Err(ScrollError::new("scroll container detached"))
            }
            _ => Ok(()),
        }
    }

    /// Renders the viewport for the current state
    fn render(&self, state: &PageState) -> ImageBuffer {
        let (width, height) = self.viewport.pixel_size();
        let mut raster = RgbaImage::from_pixel(width, height, Rgba(BACKGROUND));

        let bounds = self.bounds_for(state);
        let visible = compute_crop_rect(bounds, &self.viewport);
        if visible.is_empty() {
            return ImageBuffer::new(raster);
        }

        let d = self.viewport.device_scale;
        let origin_x = (bounds.left * d).floor() as i64;
        let origin_y = (bounds.top * d).floor() as i64;
        let scroll_px = (f64::from(state.offset) * d).round() as i64;
        let header_px = match self.header {
            Some(header) if !state.isolated => (header.height * d).round() as i64,
            _ => 0,
        };

        for y in visible.y..visible.y + visible.height {
            let container_row = i64::from(y) - origin_y;
            let header_color = self
                .header
                .filter(|_| container_row < header_px)
                .map(|h| Rgba(h.color));
            let page_y = scroll_px + container_row;

            for x in visible.x..visible.x + visible.width {
                let pixel = match header_color {
                    Some(color) => color,
                    None => {
                        let page_x = i64::from(x) - origin_x;
                        match (u32::try_from(page_x), u32::try_from(page_y)) {
                            (Ok(px), Ok(py))
                                if px < self.page.width() && py < self.page.height() =>
                            {
                                Rgba(self.page.pixel(px, py))
                            }
                            _ => Rgba(BACKGROUND),
                        }
                    }
                };
                raster.put_pixel(x, y, pixel);
            }
        }

        ImageBuffer::new(raster)
    }

    fn take_snapshot(&self) -> Result<ImageBuffer, SnapshotError> {
        let mut state = self.state.lock();
        state.snapshot_requests += 1;

        if let Some(error) = state.script.pop_front() {
            return Err(error);
        }

        if self
            .rate_limit_every
            .is_some_and(|n| state.snapshot_requests % n == 0)
        {
            return Err(SnapshotError::RateLimited);
        }

        Ok(self.render(&state))
    }
}

#[async_trait]
impl ScrollPort for SimulatedPage {
    async fn set_scroll_offset(&self, offset: u32) -> Result<(), ScrollError> {
        let mut state = self.state.lock();
        self.check_scroll_allowed(&state)?;

        let offset = offset.min(self.scrollable());
        state.offset = offset;
        state.scroll_calls += 1;
        state.scroll_history.push(offset);
        Ok(())
    }

    async fn current_offset(&self) -> Result<u32, ScrollError> {
        Ok(self.state.lock().offset)
    }

    async fn client_extent(&self) -> Result<u32, ScrollError> {
        Ok(self.client_height())
    }

    async fn scroll_extent(&self) -> Result<u32, ScrollError> {
        Ok(self.scroll_height())
    }

    async fn target_bounds(&self) -> Result<ViewportRect, ScrollError> {
        let state = self.state.lock();
        Ok(self.bounds_for(&state))
    }

    async fn viewport(&self) -> Result<Viewport, ScrollError> {
        Ok(self.viewport)
    }

    async fn wait_for_frames(&self, frames: u32) {
        self.state.lock().frames_waited += u64::from(frames);
        tokio::task::yield_now().await;
    }
}

#[async_trait]
impl SnapshotPort for SimulatedPage {
    async fn capture_viewport(&self) -> Result<ImageBuffer, SnapshotError> {
        {
            let mut state = self.state.lock();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }

        if let Some(delay) = self.snapshot_delay {
            sleep(delay).await;
        }

        let result = self.take_snapshot();
        self.state.lock().in_flight -= 1;
        result
    }
}

#[async_trait]
impl IsolationPort for SimulatedPage {
    async fn isolate(&self) -> Result<IsolationHandle, IsolationError> {
        if self.fail_isolation {
            return Err(IsolationError::new("overlay stylesheet rejected"));
        }
        let mut state = self.state.lock();
        let was_isolated = state.isolated;
        state.isolated = true;
        state.isolation_events.push(IsolationEvent::Isolated);
        Ok(IsolationHandle::new(was_isolated))
    }

    async fn restore(&self, handle: IsolationHandle) -> Result<(), IsolationError> {
        let was_isolated = handle
            .downcast::<bool>()
            .map_err(|_| IsolationError::new("isolation handle from another port"))?;
        if self.fail_restore {
            return Err(IsolationError::new("overlay stylesheet could not be removed"));
        }
        let mut state = self.state.lock();
        state.isolated = *was_isolated;
        state.isolation_events.push(IsolationEvent::Restored);
        Ok(())
    }
}
