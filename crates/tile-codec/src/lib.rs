//! Tile encoding and decoding.
//!
//! A tile is stored as an "odd" blob holding the pixel plane and, when the
//! raster carries a mask, an "even" blob holding the transparency or alpha
//! plane. Both blobs share the framing in [`header`].

pub mod backend;
pub mod codec;
pub mod error;
pub mod header;
pub mod image_codec;
pub mod pack;
pub mod png_codec;

pub use backend::{ByteCompressor, CodecRegistry, ImageCodec, Plane};
pub use codec::{EncodedTile, TileCodec};
pub use error::{CodecError, Result};
pub use header::{BlobHeader, BlobKind, MaskKind};
