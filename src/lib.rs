//! Decoder for QuickTime / MP4 atom trees.
//!
//! A [`Parser`] walks a byte buffer into a forest of [`AtomBox`] nodes,
//! descending into container types and decoding leaf payloads with the
//! declarative schemas of a [`SchemaRegistry`]. Results are addressed by
//! dotted paths:
//!
//! ```no_run
//! let data = std::fs::read("movie.mov").unwrap();
//! let tree = qtatoms::parse(&data).unwrap();
//! let scale = tree.field("moov.mvhd", "time_scale");
//! ```

pub mod boxes;
pub mod decode;
pub mod error;
pub mod expr;
pub mod json_api;
pub mod known_boxes;
pub mod parser;
pub mod reader;
pub mod registry;
pub mod schema;
pub mod template;
pub mod tree;

pub use boxes::{AtomBox, BoxId, FourCC};
pub use decode::{Decoded, Timestamp};
pub use error::{ParseError, ParseFailure, Warning};
pub use json_api::to_json;
pub use known_boxes::KnownBox;
pub use parser::{Parser, parse};
pub use reader::{ByteReader, Endian};
pub use registry::{SchemaRegistry, default_registry};
pub use schema::{FieldDescriptor, FieldValue, Payload, RawValue, Value};
pub use tree::ParseResult;
