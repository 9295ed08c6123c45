pub mod loader;
pub mod mbtiles;
pub mod server;
pub mod source;
pub mod web_map_service;

// Re-exports for convenience
pub use loader::TileLoader;
pub use mbtiles::{LayerType, MbtilesError, MbtilesFile, TileSetMetadata, VectorLayer};
pub use server::TileHttpServer;
pub use source::{TileSource, TileUrlSource};
pub use web_map_service::{OnlineTileSource, WebMapService};
