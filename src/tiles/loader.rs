use crossbeam_channel::Sender;
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use std::thread;
use std::time::Duration;

use super::source::TileUrlSource;
use crate::core::geo::TileCoord;
use crate::{MapError, Result};

/// Shared blocking HTTP client. Public tile servers such as OpenStreetMap
/// reject requests without a User-Agent.
pub(crate) static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("fieldmap/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build reqwest blocking client")
});

const MAX_ATTEMPTS: usize = 2;

/// Downloads one URL with the shared client.
pub fn fetch(url: &str) -> Result<Vec<u8>> {
    let resp = HTTP_CLIENT.get(url).send().map_err(MapError::Network)?;
    if !resp.status().is_success() {
        return Err(MapError::Server(format!("HTTP {} for {}", resp.status(), url)).into());
    }
    let bytes = resp.bytes().map_err(MapError::Network)?;
    Ok(bytes.to_vec())
}

/// Simple tile loader that fetches tiles in background threads and sends the
/// resulting bytes back over a channel.
pub struct TileLoader {
    tx: Sender<(TileCoord, Vec<u8>)>,
}

impl TileLoader {
    /// Create a new tile loader given a sender to report completed downloads.
    pub fn new(tx: Sender<(TileCoord, Vec<u8>)>) -> Self {
        Self { tx }
    }

    /// Start downloading the specified tile. The download occurs on a detached
    /// thread so that it does not block the caller. Only successful downloads
    /// are reported; failures are logged after the last attempt.
    pub fn start_download(&self, source: &dyn TileUrlSource, coord: TileCoord) {
        let url = source.url(coord);
        let tx = self.tx.clone();

        thread::spawn(move || {
            for attempt in 1..=MAX_ATTEMPTS {
                log::debug!("fetch tile {:?} attempt {}", coord, attempt);
                match fetch(&url) {
                    Ok(data) => {
                        log::info!("downloaded tile {:?} ({} bytes)", coord, data.len());
                        let _ = tx.send((coord, data));
                        return;
                    }
                    Err(e) => {
                        log::warn!("tile {:?} download failed on attempt {}: {}", coord, attempt, e);
                        if attempt == MAX_ATTEMPTS {
                            log::error!("giving up on tile {:?}", coord);
                        } else {
                            thread::sleep(Duration::from_millis(100));
                        }
                    }
                }
            }
        });
    }
}
