use crate::core::geo::TileCoord;

/// Trait representing anything that can produce tile URLs for a given coordinate.
pub trait TileUrlSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;
}

/// Trait representing anything that can hand over raw tile bytes directly.
pub trait TileSource: Send + Sync {
    /// Bytes of the tile at `coord` (slippy-map convention), or `None` if the
    /// tile is missing or could not be read.
    fn tile_blob(&self, coord: TileCoord) -> Option<Vec<u8>>;

    /// MIME type of every tile this source produces.
    fn content_type(&self) -> &str;

    /// HTTP content encoding of the stored bytes (`identity` when unencoded).
    fn content_encoding(&self) -> &str;
}
