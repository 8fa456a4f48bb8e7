//! # VendorSync Protocol
//!
//! Record, manifest and conflict types shared by the VendorSync engine and
//! its hosts, together with their CBOR codecs.
//!
//! This crate provides:
//! - `Record`, a named key/value configuration profile
//! - `SyncManifest`, the list of synced record ids plus the enabled flag
//! - `Conflict` for local/remote divergence of one record
//! - The remote key scheme (`MANIFEST_KEY`, `record_key`)
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Encoding
//!
//! Records and manifests are encoded as CBOR maps. Record fields are kept in
//! a sorted map, so two structurally equal records always encode to the same
//! bytes.
//!
//! ```
//! use vendorsync_protocol::Record;
//!
//! let record = Record::new("openai", "OpenAI").with_field("BASE_URL", "https://api.openai.com");
//! let bytes = record.encode().unwrap();
//! assert_eq!(Record::decode(&bytes).unwrap(), record);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod conflict;
mod error;
mod keys;
mod manifest;
mod record;

pub use conflict::{Conflict, ConflictResolution};
pub use error::{ProtocolError, ProtocolResult};
pub use keys::{record_id_from_key, record_key, MANIFEST_KEY, RECORD_KEY_PREFIX};
pub use manifest::SyncManifest;
pub use record::Record;
