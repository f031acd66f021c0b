use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use image::RgbaImage;

use crate::error::RenderError;
use crate::types::ImageSource;

/// Identifies one decode request; later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct LoadedImage {
    pub ticket: Ticket,
    pub source: String,
    pub result: Result<Arc<RgbaImage>, RenderError>,
}

/// Decodes images on worker threads and hands results back over a channel.
///
/// Only the newest request is ever reported; results for superseded tickets
/// are discarded when drained. Dropping the loader drops the receiver, so a
/// worker that finishes afterwards just fails to send.
#[derive(Debug)]
pub struct ImageLoader {
    sender: Sender<LoadedImage>,
    receiver: Receiver<LoadedImage>,
    next_ticket: u64,
    latest: Option<Ticket>,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            next_ticket: 0,
            latest: None,
        }
    }

    pub fn request(&mut self, source: ImageSource) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.latest = Some(ticket);

        let sender = self.sender.clone();
        let label = source.describe();
        tracing::debug!(ticket = ticket.0, source = %label, "queued image decode");
        let spawned = thread::Builder::new()
            .name("shadefx-decode".into())
            .spawn({
                let label = label.clone();
                move || {
                    let result = decode(&source).map(Arc::new);
                    let _ = sender.send(LoadedImage {
                        ticket,
                        source: label,
                        result,
                    });
                }
            });
        if let Err(error) = spawned {
            let _ = self.sender.send(LoadedImage {
                ticket,
                source: label,
                result: Err(RenderError::ImageDecode {
                    message: format!("failed to spawn decode thread: {error}"),
                }),
            });
        }
        ticket
    }

    /// Returns the result for the newest request if it has arrived.
    pub fn try_take_latest(&mut self) -> Option<LoadedImage> {
        let mut found = None;
        for loaded in self.receiver.try_iter() {
            if Some(loaded.ticket) == self.latest {
                found = Some(loaded);
            } else {
                tracing::debug!(ticket = loaded.ticket.0, "discarding stale image decode");
            }
        }
        if found.is_some() {
            self.latest = None;
        }
        found
    }

    /// Blocks up to `timeout` for the newest request.
    pub fn wait_latest(&mut self, timeout: std::time::Duration) -> Option<LoadedImage> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(loaded) = self.try_take_latest() {
                return Some(loaded);
            }
            self.latest?;
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(loaded) if Some(loaded.ticket) == self.latest => {
                    self.latest = None;
                    return Some(loaded);
                }
                Ok(loaded) => {
                    tracing::debug!(ticket = loaded.ticket.0, "discarding stale image decode");
                }
                Err(_) => return None,
            }
        }
    }
}

/// Decodes any supported raster format into RGBA8.
pub fn decode(source: &ImageSource) -> Result<RgbaImage, RenderError> {
    let decoded = match source {
        ImageSource::Path(path) => image::open(path),
        ImageSource::Bytes(bytes) => image::load_from_memory(bytes),
    }
    .map_err(|error| RenderError::ImageDecode {
        message: format!("{}: {error}", source.describe()),
    })?;
    Ok(decoded.to_rgba8())
}
