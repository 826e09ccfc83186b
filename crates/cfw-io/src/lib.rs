//! # cfw-io
//!
//! The Pixel Extractor's transport layer: the tile-service and
//! direct-COG `PixelSource` implementations, the shared retry policy,
//! the compressed Pixel Cache archive format, and the narrow client
//! traits to the object store and STAC catalog that live outside this
//! workspace.

pub mod cache;
pub mod cog;
pub mod extractor;
pub mod object_store;
pub mod retry;
pub mod stac;
pub mod tile_service;

pub use cog::DirectCogSource;
pub use extractor::{MosaicRef, PixelExtractor, PixelSource, RawPixel};
pub use object_store::{HttpObjectStore, ObjectStore};
pub use stac::{HttpStacCatalog, StacCatalog};
pub use tile_service::TileServiceSource;
