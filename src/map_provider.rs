//! Basemap source selection and the settings-to-fragment wiring
//!
//! `MapProvider` reads the active basemap source from settings, creates the
//! matching fragment, and while a fragment is started keeps it in sync with
//! the configurator's settings keys.

use fxhash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::context::MapContext;
use crate::map::MapFragment;
use crate::providers::google::GoogleMapConfigurator;
use crate::providers::mapbox::MapboxMapConfigurator;
use crate::providers::osm::OsmDroidMapConfigurator;
use crate::providers::MapConfigurator;
use crate::settings::{self, ListenerId, Settings};

/// One entry of the basemap source list.
#[derive(Clone)]
pub struct SourceOption {
    pub id: String,
    pub label: String,
    pub configurator: Rc<dyn MapConfigurator>,
}

impl SourceOption {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        configurator: impl MapConfigurator + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            configurator: Rc::new(configurator),
        }
    }
}

impl std::fmt::Debug for SourceOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceOption")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

/// The built-in sources, in preference-list order. The first is the fallback.
pub fn standard_sources() -> Vec<SourceOption> {
    vec![
        SourceOption::new("google", "Google", GoogleMapConfigurator::standard()),
        SourceOption::new("mapbox", "Mapbox", MapboxMapConfigurator::standard()),
        SourceOption::new("osm", "OpenStreetMap", OsmDroidMapConfigurator::openstreetmap()),
        SourceOption::new("usgs", "USGS", OsmDroidMapConfigurator::usgs()),
        SourceOption::new("stamen", "Stamen", OsmDroidMapConfigurator::stamen()),
        SourceOption::new("carto", "Carto", OsmDroidMapConfigurator::carto()),
    ]
}

pub struct MapProvider {
    settings: Rc<dyn Settings>,
    sources: Vec<SourceOption>,
    /// Change listeners of started fragments, by fragment instance id
    subscriptions: RefCell<FxHashMap<u64, ListenerId>>,
}

impl MapProvider {
    pub fn new(settings: Rc<dyn Settings>) -> Self {
        Self::with_sources(settings, standard_sources())
    }

    pub fn with_sources(settings: Rc<dyn Settings>, sources: Vec<SourceOption>) -> Self {
        Self {
            settings,
            sources,
            subscriptions: RefCell::default(),
        }
    }

    pub fn settings(&self) -> &Rc<dyn Settings> {
        &self.settings
    }

    pub fn source_options(&self) -> &[SourceOption] {
        &self.sources
    }

    /// The stored basemap source, or the first source when the stored id is
    /// absent or unknown.
    pub fn active_source(&self) -> Option<&SourceOption> {
        let stored = self.settings.get_string(settings::KEY_BASEMAP_SOURCE);
        stored
            .as_deref()
            .and_then(|id| self.sources.iter().find(|source| source.id == id))
            .or_else(|| self.sources.first())
    }

    pub fn configurator(&self) -> Option<Rc<dyn MapConfigurator>> {
        self.active_source()
            .map(|source| source.configurator.clone())
    }

    pub fn configurator_for(&self, id: &str) -> Option<Rc<dyn MapConfigurator>> {
        self.sources
            .iter()
            .find(|source| source.id == id)
            .map(|source| source.configurator.clone())
    }

    /// Creates a fragment for the active source. When the source cannot
    /// provide one, its unavailable message is shown and `None` returned.
    pub fn create_map_fragment(&self, context: &Rc<dyn MapContext>) -> Option<Rc<dyn MapFragment>> {
        let source = self.active_source()?;
        match source.configurator.create_map_fragment(context) {
            Some(fragment) => {
                log::info!(
                    "created {} map fragment {}",
                    source.label,
                    fragment.instance_id()
                );
                Some(fragment)
            }
            None => {
                log::info!("{} maps are unavailable", source.label);
                source.configurator.show_unavailable_message(context.as_ref());
                None
            }
        }
    }

    /// Applies the current config to `fragment` and re-applies it whenever
    /// one of the active configurator's keys changes, until
    /// `on_map_fragment_stop`.
    pub fn on_map_fragment_start(&self, fragment: &Rc<dyn MapFragment>) {
        let Some(configurator) = self.configurator() else {
            return;
        };
        fragment.apply_config(&configurator.build_config(self.settings.as_ref()));

        let keys = configurator.pref_keys();
        let weak_fragment = Rc::downgrade(fragment);
        let weak_settings = Rc::downgrade(&self.settings);
        let listener = Rc::new(move |key: &str| {
            if !keys.contains(key) {
                return;
            }
            let (Some(fragment), Some(settings)) = (weak_fragment.upgrade(), weak_settings.upgrade())
            else {
                return;
            };
            log::debug!("setting {} changed, reconfiguring map", key);
            fragment.apply_config(&configurator.build_config(settings.as_ref()));
        });

        let id = self.settings.register_change_listener(listener);
        let previous = self
            .subscriptions
            .borrow_mut()
            .insert(fragment.instance_id(), id);
        if let Some(previous) = previous {
            self.settings.unregister_change_listener(previous);
        }
    }

    pub fn on_map_fragment_stop(&self, fragment: &dyn MapFragment) {
        let id = self
            .subscriptions
            .borrow_mut()
            .remove(&fragment.instance_id());
        if let Some(id) = id {
            self.settings.unregister_change_listener(id);
        }
    }
}
