//! Document module
//!
//! The text-tree abstraction the anchoring engine works against, plus an
//! in-memory XHTML host.
//!
//! - `HostDocument`: capability-based trait implemented by hosts
//! - `XhtmlDocument`: arena-backed document parsed with quick-xml
//! - Error types for wrapping, observation and parsing failures

mod error;
mod traits;
mod types;
mod xhtml;

pub use error::{DocumentError, ObserverError, Result, WrapError};
pub use traits::HostDocument;
pub use types::{
    Capabilities, FindOptions, Marker, MarkerId, MutationFeed, NodeId, ScrollTarget, TextPoint,
    TextRange,
};
pub use xhtml::{MarkerConfig, XhtmlDocument};
