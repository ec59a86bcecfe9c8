//! fiberio - Distributed Acoustic Sensing file ingestion
//!
//! A pure Rust library for reading DAS recordings from several vendor file
//! formats into one in-memory representation.
//!
//! # Features
//!
//! - Pluggable backends behind one identify / scan / read contract
//! - A format registry that resolves any file to exactly one backend
//! - Windowed reads in coordinate space on time and distance
//! - Bundled DASF (little-endian, multi-stream, compressed) and TDAS
//!   (big-endian, fixed header) backends
//! - Velocity to strain-rate conversion
//!
//! # Example
//!
//! ```rust,no_run
//! use fiberio::{FormatRegistry, ReadWindow};
//! use std::path::Path;
//!
//! # fn example() -> fiberio::Result<()> {
//! let registry = FormatRegistry::with_defaults();
//! let path = Path::new("/data/das/shot_0001.dasf");
//!
//! for summary in registry.scan(path)? {
//!     println!("{}", summary);
//! }
//!
//! let window = ReadWindow::full().with_distance(100.0, 500.0);
//! let spool = registry.read(path, &window)?;
//! let strain = fiberio::velocity_to_strain_rate(&spool[0], 1, 2, true)?;
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod error;
pub mod formats;
pub mod io;
pub mod layout;
pub mod metadata;
pub mod patch;
pub mod registry;
pub mod transform;
pub mod types;
pub mod utils;
pub mod window;

// Re-exports
pub use compression::{CompressionLevel, CompressionMethod, Compressor};
pub use error::{FiberError, Result};
pub use formats::{DasfFormat, FiberFormat, FormatId, TdasFormat};
pub use layout::{LayoutWindow, StreamLayout};
pub use metadata::{AttrValue, FileSummary, PatchAttrs};
pub use patch::{Coords, Patch, Spool};
pub use registry::FormatRegistry;
pub use transform::{velocity_to_strain_rate, velocity_to_strain_rate_with, StrainRateOptions};
pub use types::{AxisDescriptor, CoordRange, Dimension, SampleType};
pub use window::ReadWindow;

/// Version of the fiberio implementation
pub const FIBERIO_VERSION: &str = env!("CARGO_PKG_VERSION");
