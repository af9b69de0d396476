//! Host capability traits for long capture
//!
//! The core never touches a real page. Everything it needs from the host is
//! expressed as a small async trait that the embedding application
//! implements:
//!
//! - [`ScrollPort`]: Scroll the target container and report its geometry
//! - [`SnapshotPort`]: Capture the visible viewport as a raw raster
//! - [`IsolationPort`]: Hide overlays around the capture and restore them
//!
//! All traits are object safe and used as `Arc<dyn Trait>`.

use std::any::Any;

use async_trait::async_trait;

use super::ImageBuffer;
use crate::{
    error::{IsolationError, ScrollError, SnapshotError},
    model::{Viewport, ViewportRect},
};

// ============================================================================
// Scrolling
// ============================================================================

/// Capability: Host can scroll the target container and measure it.
///
/// Offsets and extents are in CSS pixels along the scroll axis. Geometry
/// queries reflect the state after the most recent
/// [`set_scroll_offset`](ScrollPort::set_scroll_offset).
#[async_trait]
pub trait ScrollPort: Send + Sync {
    /// Scrolls the container to `offset`
    async fn set_scroll_offset(&self, offset: u32) -> Result<(), ScrollError>;

    /// Current scroll offset of the container
    async fn current_offset(&self) -> Result<u32, ScrollError>;

    /// Visible height of the container
    async fn client_extent(&self) -> Result<u32, ScrollError>;

    /// Full scrollable height of the container's content
    async fn scroll_extent(&self) -> Result<u32, ScrollError>;

    /// Target bounds in viewport coordinates at the current offset
    async fn target_bounds(&self) -> Result<ViewportRect, ScrollError>;

    /// Viewport size and device pixel scale
    async fn viewport(&self) -> Result<Viewport, ScrollError>;

    /// Waits for `frames` composited frame boundaries
    ///
    /// Hosts without a compositor signal keep the default, which returns
    /// immediately; the scheduler's fixed settle delay still applies.
    async fn wait_for_frames(&self, _frames: u32) {}
}

// ============================================================================
// Snapshots
// ============================================================================

/// Capability: Host can capture the visible viewport.
///
/// Hosts typically rate-limit this call. A throttled request must be
/// reported as [`SnapshotError::RateLimited`] so the scheduler can back off
/// and retry; any other failure aborts the capture.
#[async_trait]
pub trait SnapshotPort: Send + Sync {
    /// Captures the whole viewport at device resolution
    async fn capture_viewport(&self) -> Result<ImageBuffer, SnapshotError>;
}

// ============================================================================
// Isolation
// ============================================================================

/// Opaque state returned by [`IsolationPort::isolate`]
///
/// The pipeline hands it back to [`IsolationPort::restore`] untouched.
pub struct IsolationHandle(Box<dyn Any + Send + Sync>);

impl IsolationHandle {
    pub fn new<T: Any + Send + Sync>(state: T) -> Self {
        Self(Box::new(state))
    }

    /// An empty handle for ports with nothing to restore
    pub fn empty() -> Self {
        Self::new(())
    }

    /// Borrows the state if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Recovers the state if it has type `T`
    pub fn downcast<T: Any>(self) -> Result<Box<T>, Self> {
        match self.0.downcast::<T>() {
            Ok(state) => Ok(state),
            Err(other) => Err(Self(other)),
        }
    }
}

impl std::fmt::Debug for IsolationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IsolationHandle(..)")
    }
}

/// Capability: Host can hide fixed overlays and sticky elements that would
/// otherwise repeat in every frame.
#[async_trait]
pub trait IsolationPort: Send + Sync {
    /// Hides everything but the target
    async fn isolate(&self) -> Result<IsolationHandle, IsolationError>;

    /// Reverts what [`isolate`](IsolationPort::isolate) changed
    async fn restore(&self, handle: IsolationHandle) -> Result<(), IsolationError>;
}

/// Isolation port that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIsolation;

#[async_trait]
impl IsolationPort for NoIsolation {
    async fn isolate(&self) -> Result<IsolationHandle, IsolationError> {
        Ok(IsolationHandle::empty())
    }

    async fn restore(&self, _handle: IsolationHandle) -> Result<(), IsolationError> {
        Ok(())
    }
}
