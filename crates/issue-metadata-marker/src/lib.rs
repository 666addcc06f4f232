//! Tenant-keyed metadata hidden inside issue body text.
//!
//! An issue body can carry a machine-owned marker at its end:
//!
//! ```text
//! Human-written description.
//!
//! <!-- probot = {"1":{"hello":"world"}} -->
//! ```
//!
//! The payload is a JSON object mapping tenant (installation) ids to
//! per-tenant records. This crate locates that marker, decodes it into a
//! [`MetadataTable`], and renders an updated table back into a body. It
//! performs no I/O.
//!
//! # Examples
//!
//! ```
//! use issue_metadata_marker::{decode, encode};
//! use serde_json::{json, Map};
//!
//! let mut decoded = decode(Some("original post")).unwrap();
//! let mut partial = Map::new();
//! partial.insert("hello".to_string(), json!("world"));
//! decoded.table.merge("1", partial).unwrap();
//!
//! let body = encode(&decoded.prose, &decoded.table).unwrap();
//! assert_eq!(body, "original post\n\n<!-- probot = {\"1\":{\"hello\":\"world\"}} -->");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod region;
pub mod table;

pub use codec::{Decoded, decode, encode};
pub use error::{Error, Result};
pub use region::{MARKER_CLOSE, MARKER_OPEN, MarkerRegion, locate};
pub use table::{MetadataRecord, MetadataTable};
