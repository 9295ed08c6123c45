//! Offline `.mbtiles` archives available as reference layers

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::providers::MapConfigurator;

/// A reference layer candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLayer {
    pub path: PathBuf,
    pub name: String,
}

/// Finds `.mbtiles` archives under a set of layer directories.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLayerRepository {
    dirs: Vec<PathBuf>,
}

impl ReferenceLayerRepository {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Every `.mbtiles` file under the layer directories. Missing or
    /// unreadable directories are skipped.
    pub fn layer_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .dirs
            .iter()
            .flat_map(|dir| WalkDir::new(dir).follow_links(true))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::debug!("skipping layer directory entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_mbtiles(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files.dedup();
        files
    }

    /// Layers `configurator` can draw, sorted by display name.
    pub fn supported_layers(&self, configurator: &dyn MapConfigurator) -> Vec<ReferenceLayer> {
        let mut layers: Vec<ReferenceLayer> = self
            .layer_files()
            .into_iter()
            .filter(|path| configurator.supports_layer(path))
            .map(|path| ReferenceLayer {
                name: configurator.display_name(&path),
                path,
            })
            .collect();
        layers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        layers
    }

    /// The supported layer at `path`, if it is one.
    pub fn get(&self, configurator: &dyn MapConfigurator, path: &Path) -> Option<ReferenceLayer> {
        self.supported_layers(configurator)
            .into_iter()
            .find(|layer| layer.path == path)
    }
}

fn is_mbtiles(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("mbtiles"))
}
