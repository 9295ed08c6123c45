//! fieldmap developer tool
//!
//! Inspects and serves offline `.mbtiles` archives, lists the basemap sources
//! a settings file selects, and downloads single tiles from online sources.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use fieldmap::providers::osm::KEY_WEB_MAP_SERVICE;
use fieldmap::settings::InMemorySettings;
use fieldmap::tiles::{LayerType, TileLoader};
use fieldmap::{
    MapError, MapProvider, MbtilesFile, Preference, Result, TileCoord, TileHttpServer,
    WebMapService,
};

#[derive(Debug, Parser)]
#[command(name = "fieldmap", version, about = "Basemap and tile archive tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print an archive's metadata and tile format
    Inspect {
        file: PathBuf,
    },
    /// Serve an archive over local HTTP until Ctrl-C
    Serve {
        file: PathBuf,
        /// Source id used in tile URLs
        #[arg(long, default_value = "reference")]
        id: String,
    },
    /// List basemap sources and the config of the active one
    Sources {
        /// JSON settings file
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Download one tile from an online basemap source
    Fetch {
        #[arg(long)]
        source: String,
        #[arg(long)]
        z: u8,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        /// Write the tile here instead of printing its size
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Inspect { file } => inspect(&file),
        Command::Serve { file, id } => serve(&file, &id),
        Command::Sources { settings } => sources(settings),
        Command::Fetch {
            source,
            z,
            x,
            y,
            output,
        } => fetch(&source, TileCoord::new(x, y, z), output),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn inspect(file: &PathBuf) -> Result<()> {
    let archive = MbtilesFile::open(file).map_err(MapError::Mbtiles)?;
    let metadata = archive.metadata();

    println!("file:         {}", archive.path().display());
    println!("name:         {}", metadata.name.as_deref().unwrap_or("-"));
    println!("format:       {}", metadata.format);
    println!("layer type:   {}", archive.layer_type());
    println!("content type: {}", archive.content_type());
    println!("encoding:     {}", archive.content_encoding());
    if let (Some(min), Some(max)) = (metadata.min_zoom, metadata.max_zoom) {
        println!("zoom:         {}-{}", min, max);
    }
    if let Some([west, south, east, north]) = metadata.bounds {
        println!("bounds:       {}, {}, {}, {}", west, south, east, north);
    }
    if archive.layer_type() == LayerType::Vector {
        let layers = archive.vector_layers();
        println!("vector layers ({}):", layers.len());
        for layer in layers {
            println!("  {}", layer.name);
        }
    }
    Ok(())
}

fn serve(file: &PathBuf, id: &str) -> Result<()> {
    let archive = Arc::new(MbtilesFile::open(file).map_err(MapError::Mbtiles)?);
    let server = TileHttpServer::start()?;
    let template = server.add_source(id, archive);
    println!("serving {} at {}", file.display(), template);
    println!("press Ctrl-C to stop");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(MapError::Io)?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .map_err(MapError::Io)?;

    log::info!("stopping tile server on port {}", server.port());
    Ok(())
}

fn sources(settings_path: Option<PathBuf>) -> Result<()> {
    let settings = match settings_path {
        Some(path) => InMemorySettings::load(&path)?,
        None => InMemorySettings::new(),
    };
    let provider = MapProvider::new(Rc::new(settings));
    let active = provider.active_source().map(|source| source.id.clone());

    for source in provider.source_options() {
        let marker = if Some(&source.id) == active.as_ref() { "*" } else { " " };
        println!("{} {:<8} {}", marker, source.id, source.label);
    }

    let Some(configurator) = provider.configurator() else {
        return Ok(());
    };
    let profile = fieldmap::DeviceProfile::default();
    for pref in configurator.create_prefs(&profile) {
        let Preference::List { key, title, entries, default_value } = pref;
        println!();
        println!("{} ({}, default {})", title, key, default_value);
        for entry in entries {
            println!("  {:<24} {}", entry.value, entry.label);
        }
    }

    let bundle = configurator.build_config(provider.settings().as_ref());
    println!();
    println!("{}", serde_json::to_string_pretty(&bundle).map_err(MapError::Serialization)?);
    Ok(())
}

fn fetch(source_id: &str, coord: TileCoord, output: Option<PathBuf>) -> Result<()> {
    let provider = MapProvider::new(Rc::new(InMemorySettings::new()));
    let configurator = provider
        .configurator_for(source_id)
        .ok_or_else(|| MapError::Settings(format!("unknown basemap source {}", source_id)))?;
    let service: WebMapService = configurator
        .build_config(provider.settings().as_ref())
        .get_value(KEY_WEB_MAP_SERVICE)
        .ok_or_else(|| {
            MapError::Settings(format!("source {} has no web map service", source_id))
        })?;

    let tile_source = service.as_online_tile_source();
    if !tile_source.covers_zoom(coord.z) {
        return Err(MapError::Settings(format!(
            "{} serves zoom {}-{}, not {}",
            service.name, service.min_zoom, service.max_zoom, coord.z
        ))
        .into());
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let loader = TileLoader::new(tx);
    loader.start_download(&*tile_source, coord);

    let (_, data) = rx
        .recv_timeout(Duration::from_secs(90))
        .map_err(|_| MapError::Server(format!("no tile from {} for {:?}", service.name, coord)))?;

    match output {
        Some(path) => {
            std::fs::write(&path, &data).map_err(MapError::Io)?;
            println!("wrote {} bytes to {}", data.len(), path.display());
        }
        None => println!("{} bytes from {}", data.len(), service.name),
    }
    Ok(())
}
