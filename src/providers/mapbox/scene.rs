//! Mapbox-style scene model
//!
//! A style (sources and layers) loads asynchronously from a URL. Annotations
//! live in symbol and line managers and keep GeoJSON geometry, so positions
//! are `[lon, lat]` pairs and each symbol carries a free-form JSON `data`
//! value.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::bounds::LatLngBounds;
use crate::core::constants::{INITIAL_CENTER, INITIAL_ZOOM, MAX_ZOOM};
use crate::core::geo::LatLng;
use crate::map::MarkerIcon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineId(u64);

/// GeoJSON position, longitude first.
pub type Position = [f64; 2];

pub fn to_position(lat_lng: LatLng) -> Position {
    [lat_lng.lng, lat_lng.lat]
}

pub fn from_position(position: Position) -> LatLng {
    LatLng::new(position[1], position[0])
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub geometry: Position,
    pub data: Value,
    pub draggable: bool,
    /// `"center"` or `"bottom"`
    pub icon_anchor: &'static str,
    pub icon_image: MarkerIcon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub geometry: Vec<Position>,
    pub color: &'static str,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Raster,
    Vector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleSource {
    pub id: String,
    pub kind: SourceKind,
    /// Tile URL templates
    pub tiles: Vec<String>,
    pub tile_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Raster,
    Line { source_layer: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleLayer {
    pub id: String,
    pub source: String,
    pub kind: LayerKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    url: String,
    sources: Vec<StyleSource>,
    layers: Vec<StyleLayer>,
}

impl Style {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sources: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn add_source(&mut self, source: StyleSource) {
        self.remove_source(&source.id);
        self.sources.push(source);
    }

    /// Removes a source together with every layer drawing from it.
    pub fn remove_source(&mut self, id: &str) -> bool {
        self.layers.retain(|layer| layer.source != id);
        let before = self.sources.len();
        self.sources.retain(|source| source.id != id);
        self.sources.len() != before
    }

    pub fn source(&self, id: &str) -> Option<&StyleSource> {
        self.sources.iter().find(|source| source.id == id)
    }

    pub fn sources(&self) -> &[StyleSource] {
        &self.sources
    }

    pub fn add_layer(&mut self, layer: StyleLayer) {
        self.layers.retain(|existing| existing.id != layer.id);
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[StyleLayer] {
        &self.layers
    }
}

/// Vendor-level interaction events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapboxMapEvent {
    Click(LatLng),
    LongClick(LatLng),
    SymbolClick(SymbolId),
    LineClick(LineId),
    SymbolDragStarted(SymbolId, LatLng),
    SymbolDrag(SymbolId, LatLng),
    SymbolDragFinished(SymbolId, LatLng),
}

#[derive(Debug)]
pub struct MapboxMap {
    style: Option<Style>,
    loading_style: Option<String>,
    target: LatLng,
    zoom: f64,
    viewport: (f64, f64),
    symbols: BTreeMap<SymbolId, Symbol>,
    lines: BTreeMap<LineId, Line>,
    location_indicator: Option<LatLng>,
    next_object_id: u64,
}

impl MapboxMap {
    pub fn new(viewport: (f64, f64)) -> Self {
        Self {
            style: None,
            loading_style: None,
            target: LatLng::from(INITIAL_CENTER),
            zoom: INITIAL_ZOOM,
            viewport,
            symbols: BTreeMap::new(),
            lines: BTreeMap::new(),
            location_indicator: None,
            next_object_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    /// The loaded style. The previous style stays in place while a new one
    /// is loading.
    pub fn style(&self) -> Option<&Style> {
        self.style.as_ref()
    }

    pub fn style_mut(&mut self) -> Option<&mut Style> {
        self.style.as_mut()
    }

    pub fn loading_style(&self) -> Option<&str> {
        self.loading_style.as_deref()
    }

    /// Starts loading `url`, superseding any load still in flight.
    pub fn set_style_url(&mut self, url: &str) {
        self.loading_style = Some(url.to_string());
    }

    /// Completes the load of `url`. Returns false for a load that has been
    /// superseded by a later `set_style_url`.
    pub fn finish_style_load(&mut self, url: &str) -> bool {
        if self.loading_style.as_deref() != Some(url) {
            return false;
        }
        self.loading_style = None;
        self.style = Some(Style::new(url));
        true
    }

    pub fn camera_target(&self) -> LatLng {
        self.target
    }

    pub fn camera_zoom(&self) -> f64 {
        self.zoom
    }

    /// Moves the camera; a `None` zoom keeps the current one.
    pub fn move_camera(&mut self, target: LatLng, zoom: Option<f64>, animate: bool) {
        self.target = target;
        if let Some(zoom) = zoom {
            self.zoom = zoom.clamp(0.0, MAX_ZOOM);
        }
        log::debug!(
            "{} camera to {:?} zoom {:.2}",
            if animate { "easing" } else { "moving" },
            self.target,
            self.zoom
        );
    }

    pub fn fit_bounds(&mut self, bounds: LatLngBounds, animate: bool) {
        let zoom = bounds.zoom_to_fit(self.viewport);
        self.move_camera(bounds.center(), Some(zoom), animate);
    }

    pub fn create_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.next_id());
        self.symbols.insert(id, symbol);
        id
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(&id)
    }

    pub fn delete_symbol(&mut self, id: SymbolId) -> Option<Symbol> {
        self.symbols.remove(&id)
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().map(|(id, symbol)| (*id, symbol))
    }

    pub fn create_line(&mut self, line: Line) -> LineId {
        let id = LineId(self.next_id());
        self.lines.insert(id, line);
        id
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(&id)
    }

    pub fn set_line_geometry(&mut self, id: LineId, geometry: Vec<Position>) {
        if let Some(line) = self.lines.get_mut(&id) {
            line.geometry = geometry;
        }
    }

    pub fn delete_line(&mut self, id: LineId) -> Option<Line> {
        self.lines.remove(&id)
    }

    pub fn lines(&self) -> impl Iterator<Item = (LineId, &Line)> {
        self.lines.iter().map(|(id, line)| (*id, line))
    }

    pub fn location_indicator(&self) -> Option<LatLng> {
        self.location_indicator
    }

    pub fn set_location_indicator(&mut self, position: Option<LatLng>) {
        self.location_indicator = position;
    }
}
