//! In-memory references to binary payloads
//!
//! [`create_object_reference`] assigns a reference to a blob onto a target
//! (typically an image source). With an [`ObjectUrlFacility`] the reference is
//! a registered `blob:` URL; without one the blob is read in full and
//! assigned as a base64 `data:` URL instead. Read failures in that fallback
//! are delivered through [`ObjectUrlTarget::fail`], the same channel a direct
//! load failure uses.

use base64::Engine;
use bytes::Bytes;
use mime::Mime;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::transfer::CrossOrigin;

const REFERENCE_PREFIX: &str = "blob:assetbox/";

#[derive(Debug, Error)]
pub enum ObjectUrlError {
    #[error("failed to read blob: {0}")]
    Read(#[from] std::io::Error),

    #[error("unknown object reference: {0}")]
    UnknownReference(String),
}

#[derive(Debug, Clone)]
pub enum BlobSource {
    Memory(Bytes),
    File(PathBuf),
}

/// Binary payload with an optional media type
#[derive(Debug, Clone)]
pub struct Blob {
    pub source: BlobSource,
    pub media_type: Option<Mime>,
}

impl Blob {
    pub fn from_bytes(bytes: impl Into<Bytes>, media_type: Option<Mime>) -> Self {
        Self {
            source: BlobSource::Memory(bytes.into()),
            media_type,
        }
    }

    pub fn from_file(path: impl Into<PathBuf>, media_type: Option<Mime>) -> Self {
        Self {
            source: BlobSource::File(path.into()),
            media_type,
        }
    }

    pub async fn read_all(&self) -> std::io::Result<Bytes> {
        match &self.source {
            BlobSource::Memory(bytes) => Ok(bytes.clone()),
            BlobSource::File(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}

/// Something that consumes an object reference as its source
pub trait ObjectUrlTarget {
    fn set_source(&mut self, source: String);
    fn source(&self) -> Option<&str>;
    fn clear_cross_origin(&mut self);
    /// Error channel for load failures
    fn fail(&mut self, error: ObjectUrlError);
}

/// Capability to mint and revoke direct `blob:` references
pub trait ObjectUrlFacility {
    fn create(&self, blob: &Blob) -> String;
    fn revoke(&self, reference: &str);
}

/// In-memory facility: references map back to the registered blobs
#[derive(Debug, Default)]
pub struct BlobRegistry {
    blobs: RefCell<HashMap<String, Blob>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, reference: &str) -> Result<Blob, ObjectUrlError> {
        self.blobs
            .borrow()
            .get(reference)
            .cloned()
            .ok_or_else(|| ObjectUrlError::UnknownReference(reference.to_string()))
    }

    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }
}

impl ObjectUrlFacility for BlobRegistry {
    fn create(&self, blob: &Blob) -> String {
        let reference = format!("{}{}", REFERENCE_PREFIX, Uuid::new_v4());
        self.blobs
            .borrow_mut()
            .insert(reference.clone(), blob.clone());
        debug!(%reference, "Object reference created");
        reference
    }

    fn revoke(&self, reference: &str) {
        if self.blobs.borrow_mut().remove(reference).is_some() {
            debug!(%reference, "Object reference revoked");
        }
    }
}

/// Image-like target: a source attribute, a cross-origin attribute and an
/// error slot
#[derive(Debug, Default)]
pub struct ImageSource {
    src: Option<String>,
    cross_origin: Option<CrossOrigin>,
    error: Option<ObjectUrlError>,
}

impl ImageSource {
    pub fn new(cross_origin: Option<CrossOrigin>) -> Self {
        Self {
            src: None,
            cross_origin,
            error: None,
        }
    }

    pub fn cross_origin(&self) -> Option<CrossOrigin> {
        self.cross_origin
    }

    pub fn error(&self) -> Option<&ObjectUrlError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<ObjectUrlError> {
        self.error.take()
    }
}

impl ObjectUrlTarget for ImageSource {
    fn set_source(&mut self, source: String) {
        self.src = Some(source);
    }

    fn source(&self) -> Option<&str> {
        self.src.as_deref()
    }

    fn clear_cross_origin(&mut self) {
        self.cross_origin = None;
    }

    fn fail(&mut self, error: ObjectUrlError) {
        self.error = Some(error);
    }
}

/// Assign a reference to `blob` onto `target`
pub async fn create_object_reference<T>(
    target: &mut T,
    blob: &Blob,
    default_media_type: &Mime,
    facility: Option<&dyn ObjectUrlFacility>,
) where
    T: ObjectUrlTarget + ?Sized,
{
    if let Some(facility) = facility {
        target.set_source(facility.create(blob));
        return;
    }

    match blob.read_all().await {
        Ok(bytes) => {
            let media_type = blob.media_type.as_ref().unwrap_or(default_media_type);
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            target.clear_cross_origin();
            target.set_source(format!("data:{};base64,{}", media_type, encoded));
        }
        Err(e) => {
            warn!(error = %e, "Failed to read blob for data URL");
            target.fail(ObjectUrlError::Read(e));
        }
    }
}

/// Release the reference previously assigned to `target`; no-op without a facility
pub fn release_object_reference<T>(target: &T, facility: Option<&dyn ObjectUrlFacility>)
where
    T: ObjectUrlTarget + ?Sized,
{
    if let (Some(facility), Some(source)) = (facility, target.source()) {
        facility.revoke(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_facility_registers_blob() {
        let registry = BlobRegistry::new();
        let mut image = ImageSource::new(Some(CrossOrigin::Anonymous));
        let blob = Blob::from_bytes(&b"\x89PNG"[..], Some(mime::IMAGE_PNG));

        create_object_reference(&mut image, &blob, &mime::IMAGE_PNG, Some(&registry)).await;

        let reference = image.source().unwrap().to_string();
        assert!(reference.starts_with(REFERENCE_PREFIX));
        assert_eq!(image.cross_origin(), Some(CrossOrigin::Anonymous));
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.resolve(&reference).unwrap().source,
            BlobSource::Memory(ref bytes) if &bytes[..] == b"\x89PNG"
        ));

        release_object_reference(&image, Some(&registry));
        assert!(registry.is_empty());
        assert!(matches!(
            registry.resolve(&reference),
            Err(ObjectUrlError::UnknownReference(_))
        ));
    }

    #[tokio::test]
    async fn test_fallback_encodes_base64() {
        let mut image = ImageSource::new(Some(CrossOrigin::UseCredentials));
        let blob = Blob::from_bytes(&b"hello"[..], None);

        create_object_reference(&mut image, &blob, &mime::IMAGE_PNG, None).await;

        assert_eq!(image.source(), Some("data:image/png;base64,aGVsbG8="));
        assert!(image.cross_origin().is_none());
        assert!(image.error().is_none());
    }

    #[tokio::test]
    async fn test_fallback_prefers_blob_media_type() {
        let mut image = ImageSource::default();
        let blob = Blob::from_bytes(&b"hi"[..], Some(mime::IMAGE_JPEG));

        create_object_reference(&mut image, &blob, &mime::IMAGE_PNG, None).await;

        assert_eq!(image.source(), Some("data:image/jpeg;base64,aGk="));
    }

    #[tokio::test]
    async fn test_fallback_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("icon.png");
        std::fs::write(&path, b"hello").unwrap();

        let mut image = ImageSource::default();
        create_object_reference(&mut image, &Blob::from_file(&path, None), &mime::IMAGE_PNG, None)
            .await;

        assert_eq!(image.source(), Some("data:image/png;base64,aGVsbG8="));
    }

    #[tokio::test]
    async fn test_fallback_read_error_goes_to_target() {
        let temp_dir = TempDir::new().unwrap();
        let blob = Blob::from_file(temp_dir.path().join("missing.png"), None);

        let mut image = ImageSource::default();
        create_object_reference(&mut image, &blob, &mime::IMAGE_PNG, None).await;

        assert!(image.source().is_none());
        assert!(matches!(image.take_error(), Some(ObjectUrlError::Read(_))));
    }

    #[test]
    fn test_release_without_facility_is_noop() {
        let mut image = ImageSource::default();
        image.set_source("data:image/png;base64,AA==".to_string());

        release_object_reference(&image, None);

        assert_eq!(image.source(), Some("data:image/png;base64,AA=="));
    }
}
