//! scrollshot-core: Scrolling long-screenshot capture and stitching
//!
//! This library captures a scrollable region that is taller than the visible
//! viewport. It scrolls the region through a sequence of positions, snapshots
//! the viewport at each one through a rate-limited host primitive, and
//! stitches the cropped frames into one composite image with the duplicated
//! rows between neighbours removed.
//!
//! The host (a browser, an emulator, a remote desktop) is reached only
//! through the port traits in [`capture`], so the whole pipeline runs
//! against [`capture::mock::SimulatedPage`] in tests.

pub mod capture;
pub mod error;
pub mod model;
pub mod util;
