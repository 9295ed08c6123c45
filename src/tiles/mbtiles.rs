//! Read-only access to `.mbtiles` tile archives
//!
//! An mbtiles archive is a SQLite database with a `metadata(name, value)`
//! table and a `tiles(zoom_level, tile_column, tile_row, tile_data)` table
//! whose rows follow the TMS convention (row 0 is the southernmost row).

use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::geo::TileCoord;
use crate::tiles::source::TileSource;

/// Whether an archive holds images or vector geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerType {
    Raster,
    Vector,
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerType::Raster => write!(f, "raster"),
            LayerType::Vector => write!(f, "vector"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MbtilesError {
    #[error("not a file: {0}")]
    NotFile(PathBuf),

    #[error("unsupported filename: {0}")]
    UnsupportedFilename(PathBuf),

    #[error("unsupported tile format {format:?} in {path}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// One layer named in a vector archive's `json` metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorLayer {
    pub name: String,
}

/// Parsed view of the archive's metadata table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileSetMetadata {
    pub name: Option<String>,
    pub format: String,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
    /// `[lon, lat, zoom]`
    pub center: Option<[f64; 3]>,
    /// `[west, south, east, north]`
    pub bounds: Option<[f64; 4]>,
    pub attribution: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct TileFormat {
    layer_type: LayerType,
    content_type: &'static str,
    content_encoding: &'static str,
}

impl TileFormat {
    fn parse(format: &str) -> Option<Self> {
        let (layer_type, content_type, content_encoding) = match format {
            "pbf" | "mvt" => (LayerType::Vector, "application/protobuf", "gzip"),
            "jpg" | "jpeg" => (LayerType::Raster, "image/jpeg", "identity"),
            "png" => (LayerType::Raster, "image/png", "identity"),
            _ => return None,
        };
        Some(Self {
            layer_type,
            content_type,
            content_encoding,
        })
    }
}

#[derive(Deserialize)]
struct TileJson {
    #[serde(default)]
    vector_layers: Vec<TileJsonLayer>,
}

#[derive(Deserialize)]
struct TileJsonLayer {
    id: String,
}

/// An open mbtiles archive.
pub struct MbtilesFile {
    path: PathBuf,
    connection: Mutex<Connection>,
    format: TileFormat,
}

impl std::fmt::Debug for MbtilesFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MbtilesFile")
            .field("path", &self.path)
            .field("layer_type", &self.format.layer_type)
            .finish()
    }
}

impl MbtilesFile {
    /// Opens the archive at `path` and validates its `format` metadata.
    ///
    /// Names ending in `-journal` or `.corrupt` are refused without touching
    /// them: SQLite leaves such files behind when it fails on a bad archive,
    /// and opening them again would only add more.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MbtilesError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(MbtilesError::NotFile(path));
        }

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if filename.ends_with("-journal") || filename.ends_with(".corrupt") {
            return Err(MbtilesError::UnsupportedFilename(path));
        }

        let connection = Self::open_connection(&path)?;
        let format_value = query_metadata(&connection, "format")?
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        let format = TileFormat::parse(&format_value).ok_or_else(|| {
            MbtilesError::UnsupportedFormat {
                path: path.clone(),
                format: format_value.clone(),
            }
        })?;

        log::debug!(
            "opened {} ({} tiles, {})",
            path.display(),
            format.layer_type,
            format.content_type
        );

        Ok(Self {
            path,
            connection: Mutex::new(connection),
            format,
        })
    }

    fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layer_type(&self) -> LayerType {
        self.format.layer_type
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type
    }

    pub fn content_encoding(&self) -> &'static str {
        self.format.content_encoding
    }

    /// Value of a metadata key, or an empty string if it is absent or unreadable.
    pub fn get_metadata(&self, key: &str) -> String {
        match query_metadata(&self.lock(), key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                log::warn!("could not read metadata {} from {}: {}", key, self.path.display(), e);
                String::new()
            }
        }
    }

    /// All metadata parsed into typed fields.
    pub fn metadata(&self) -> TileSetMetadata {
        let values = match read_all_metadata(&self.lock()) {
            Ok(values) => values,
            Err(e) => {
                log::warn!("could not read metadata from {}: {}", self.path.display(), e);
                HashMap::new()
            }
        };

        let non_empty = |key: &str| values.get(key).filter(|v| !v.is_empty()).cloned();
        let numbers = |key: &str| -> Vec<f64> {
            values
                .get(key)
                .map(|v| v.split(',').filter_map(|p| p.trim().parse().ok()).collect())
                .unwrap_or_default()
        };

        TileSetMetadata {
            name: non_empty("name"),
            format: values.get("format").cloned().unwrap_or_default(),
            min_zoom: values.get("minzoom").and_then(|v| v.trim().parse().ok()),
            max_zoom: values.get("maxzoom").and_then(|v| v.trim().parse().ok()),
            center: <[f64; 3]>::try_from(numbers("center")).ok(),
            bounds: <[f64; 4]>::try_from(numbers("bounds")).ok(),
            attribution: non_empty("attribution"),
            description: non_empty("description"),
        }
    }

    /// Tile bytes for a slippy-map (XYZ) coordinate, or `None`.
    ///
    /// If SQLite reports the row as too large, the connection is no longer
    /// usable; it is closed and reopened before giving up on this tile.
    pub fn get_tile_blob(&self, zoom: u8, x: u32, y: u32) -> Option<Vec<u8>> {
        let coord = TileCoord::new(x, y, zoom);
        let tms_row = coord.tms_row()?;

        let mut connection = self.lock();
        let result = connection
            .query_row(
                "SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
                params![zoom, x, tms_row],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional();

        match result {
            Ok(blob) => blob,
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::TooBig => {
                log::warn!(
                    "tile {:?} in {} is too large; reopening database",
                    coord,
                    self.path.display()
                );
                match Self::open_connection(&self.path) {
                    Ok(fresh) => {
                        let stale = std::mem::replace(&mut *connection, fresh);
                        if let Err((_, e)) = stale.close() {
                            log::warn!("closing stale connection failed: {}", e);
                        }
                    }
                    Err(e) => log::warn!("reopening {} failed: {}", self.path.display(), e),
                }
                None
            }
            Err(e) => {
                log::warn!("reading tile {:?} from {} failed: {}", coord, self.path.display(), e);
                None
            }
        }
    }

    /// Layers listed under `vector_layers` in the `json` metadata. Missing or
    /// malformed JSON yields an empty list.
    pub fn vector_layers(&self) -> Vec<VectorLayer> {
        let json = self.get_metadata("json");
        if json.is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<TileJson>(&json) {
            Ok(parsed) => parsed
                .vector_layers
                .into_iter()
                .map(|layer| VectorLayer { name: layer.id })
                .collect(),
            Err(e) => {
                log::debug!("ignoring malformed json metadata in {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// The archive's `name` metadata, or `None` if it is empty or the file
    /// cannot be opened. The archive is closed again before returning.
    pub fn read_name(path: impl AsRef<Path>) -> Option<String> {
        let file = Self::open(path).ok()?;
        let name = file.get_metadata("name");
        (!name.is_empty()).then_some(name)
    }

    /// The archive's layer type, or `None` if the file cannot be opened.
    pub fn read_layer_type(path: impl AsRef<Path>) -> Option<LayerType> {
        Self::open(path).ok().map(|file| file.layer_type())
    }
}

impl TileSource for MbtilesFile {
    fn tile_blob(&self, coord: TileCoord) -> Option<Vec<u8>> {
        self.get_tile_blob(coord.z, coord.x, coord.y)
    }

    fn content_type(&self) -> &str {
        self.format.content_type
    }

    fn content_encoding(&self) -> &str {
        self.format.content_encoding
    }
}

fn query_metadata(connection: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    connection
        .query_row(
            "SELECT value FROM metadata WHERE name = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
}

fn read_all_metadata(connection: &Connection) -> rusqlite::Result<HashMap<String, String>> {
    let mut stmt = connection.prepare("SELECT name, value FROM metadata")?;
    let mut rows = stmt.query([])?;

    let mut values = HashMap::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let value: Option<String> = row.get(1).ok();
        if let Some(value) = value {
            values.insert(name, value);
        }
    }
    Ok(values)
}
