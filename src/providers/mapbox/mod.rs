pub mod configurator;
pub mod fragment;
pub mod scene;

pub use configurator::{MapboxMapConfigurator, MapboxUrlOption};
pub use fragment::{MapboxMapFragment, DEFAULT_STYLE_URL, KEY_STYLE_URL};
pub use scene::{LayerKind, LineId, MapboxMap, MapboxMapEvent, SourceKind, SymbolId};
