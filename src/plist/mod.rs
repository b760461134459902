//! Streaming reader for the XML property-list dialect iPhoto writes.
//!
//! Only what AlbumData.xml needs is understood: `dict`, `array`, `key`,
//! `string`, `integer`, `real`, `true`, `false`, `date` and `data`.

mod decode;
mod events;
mod filter;
mod nul;
pub(crate) mod projector;

pub use decode::decode_fragment;
pub use filter::{is_identifier, FieldFilter};
pub use nul::NulStripper;
pub use projector::{SUPPORTED_MAJOR_VERSION, SUPPORTED_MINOR_VERSION};
