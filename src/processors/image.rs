use async_trait::async_trait;
use mime::Mime;
use std::rc::Rc;

use super::traits::{ProcessError, Processor};
use crate::handle::{Payload, SharedHandle};
use crate::object_url::{Blob, ImageSource, ObjectUrlFacility, ObjectUrlTarget, create_object_reference};

/// Turns a downloaded image body into an object reference
pub struct ImageProcessor {
    facility: Option<Rc<dyn ObjectUrlFacility>>,
    default_media_type: Mime,
}

impl ImageProcessor {
    pub fn new(facility: Option<Rc<dyn ObjectUrlFacility>>) -> Self {
        Self {
            facility,
            default_media_type: mime::IMAGE_PNG,
        }
    }
}

#[async_trait(?Send)]
impl Processor for ImageProcessor {
    async fn decode(&self, handle: &SharedHandle) -> Result<(), ProcessError> {
        let (blob, cross_origin) = {
            let handle = handle.borrow();
            let body = handle.raw_body().ok_or_else(|| ProcessError::MissingBody {
                kind: handle.kind().to_string(),
                key: handle.key().to_string(),
            })?;
            let media_type = handle
                .response_media_type()
                .and_then(|m| m.parse::<Mime>().ok());
            (Blob::from_bytes(body, media_type), handle.cross_origin_policy())
        };

        let mut image = ImageSource::new(cross_origin);
        create_object_reference(
            &mut image,
            &blob,
            &self.default_media_type,
            self.facility.as_deref(),
        )
        .await;

        if let Some(error) = image.take_error() {
            return Err(error.into());
        }

        if let Some(source) = image.source() {
            handle
                .borrow_mut()
                .set_payload(Payload::Reference(source.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{HandleConfig, ResourceHandle};
    use crate::object_url::BlobRegistry;

    #[tokio::test]
    async fn test_missing_body_is_an_error() {
        let handle = ResourceHandle::new(HandleConfig::new("image", "hero"))
            .unwrap()
            .into_shared();

        let result = ImageProcessor::new(None).decode(&handle).await;
        assert!(matches!(result, Err(ProcessError::MissingBody { .. })));
    }

    #[test]
    fn test_uses_png_by_default() {
        let registry: Rc<dyn ObjectUrlFacility> = Rc::new(BlobRegistry::new());
        let processor = ImageProcessor::new(Some(registry));
        assert_eq!(processor.default_media_type, mime::IMAGE_PNG);
        assert!(processor.facility.is_some());
    }
}
