use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};

use assetbox::config::Config;
use assetbox::handle::Payload;
use assetbox::handle::location::is_absolute;
use assetbox::humanize::ByteSize;
use assetbox::loader::{FileId, LoadSummary, Loader, LoaderError, LoaderEvent};
use assetbox::manifest::{Manifest, ManifestError};
use assetbox::object_url::{BlobRegistry, ObjectUrlError, ObjectUrlFacility};
use assetbox::processors::ProcessorRegistry;
use assetbox::transfer::{HttpTransport, TransferError};

use crate::cli::FetchArgs;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("failed to build transport: {0}")]
    Transport(#[from] TransferError),

    #[error(transparent)]
    ObjectUrl(#[from] ObjectUrlError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("refusing to write {file}: {segment:?} is not a plain file name")]
    UnsafePath { file: FileId, segment: String },
}

/// Fetch a manifest. Must run inside a `LocalSet`.
pub async fn run(mut config: Config, args: FetchArgs) -> Result<LoadSummary, FetchError> {
    if let Some(base_url) = args.base_url {
        config.loader.base_url = Some(base_url);
    }
    if let Some(max_parallel) = args.max_parallel {
        config.loader.max_parallel = max_parallel.max(1);
    }

    let manifest = Manifest::from_path(&args.manifest).await?;
    info!(manifest = %args.manifest.display(), files = manifest.files.len(), "Manifest loaded");

    let transport = Rc::new(HttpTransport::new(config.transport.http_config())?);
    let blobs = Rc::new(BlobRegistry::new());
    let facility: Rc<dyn ObjectUrlFacility> = blobs.clone();

    let mut loader = Loader::new(
        config.loader.clone(),
        transport,
        ProcessorRegistry::with_facility(Some(facility)),
    )
    .with_transport_defaults(config.transport.request_defaults());

    if let Some(events) = loader.events() {
        tokio::task::spawn_local(report_events(events));
    }

    manifest.apply(&mut loader)?;
    let summary = loader.run().await?;

    if let Some(out) = &args.out {
        write_payloads(&loader, &blobs, out).await?;
    }

    let metrics = loader.metrics().snapshot();
    info!(
        files_completed = metrics.files_completed,
        files_failed = metrics.files_failed,
        received = %ByteSize(metrics.bytes_received),
        "Fetch finished"
    );

    Ok(summary)
}

async fn report_events(mut events: tokio::sync::mpsc::UnboundedReceiver<LoaderEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            LoaderEvent::FileProgress { file, fraction } => {
                debug!(%file, percent = (fraction * 100.0).round(), "Progress");
            }
            LoaderEvent::FileLoaded { file, bytes } => {
                debug!(%file, size = %ByteSize(bytes), "Transfer finished");
            }
            LoaderEvent::FileFailed { file, reason } => {
                warn!(%file, %reason, "Resource failed");
            }
            LoaderEvent::FileComplete { .. } => {}
            LoaderEvent::Complete(_) => break,
        }
    }
}

async fn write_payloads(loader: &Loader, blobs: &BlobRegistry, out: &Path) -> Result<(), FetchError> {
    for (file, payload) in loader.store().iter() {
        let location = loader
            .handle(&file.kind, &file.key)
            .map(|h| {
                let h = h.borrow();
                h.location().to_string()
            })
            .unwrap_or_default();

        let bytes = match payload {
            Payload::Bytes(bytes) => bytes.clone(),
            Payload::Text(text) => Bytes::from(text.clone()),
            Payload::Json(value) => Bytes::from(serde_json::to_vec_pretty(value)?),
            Payload::Reference(reference) if reference.starts_with("blob:") => {
                blobs.resolve(reference)?.read_all().await?
            }
            Payload::Reference(reference) => Bytes::from(reference.clone()),
        };

        let path = output_path(out, file, &location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        info!(%file, path = %path.display(), size = %ByteSize(bytes.len() as u64), "Payload written");
    }

    Ok(())
}

/// `<out>/<kind>/<key>[.<extension of the location>]`
///
/// Kind and file name must each be one normal path component, so nothing is
/// written outside `out`.
fn output_path(out: &Path, file: &FileId, location: &str) -> Result<PathBuf, FetchError> {
    let extension = if location.starts_with("data:") || location.starts_with("blob:") {
        None
    } else {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        let path = if is_absolute(path) {
            path.rsplit('/').next().unwrap_or(path)
        } else {
            path
        };
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
    };

    let name = match extension {
        Some(extension) => format!("{}.{}", file.key, extension),
        None => file.key.clone(),
    };

    let kind = plain_segment(file, &file.kind)?;
    let name = plain_segment(file, &name)?;
    Ok(out.join(kind).join(name))
}

fn plain_segment<'a>(file: &FileId, segment: &'a str) -> Result<&'a str, FetchError> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !segment.contains(['/', '\\']) => Ok(segment),
        _ => Err(FetchError::UnsafePath {
            file: file.clone(),
            segment: segment.to_string(),
        }),
    }
}
