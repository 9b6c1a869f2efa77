//! Per-kind decode step run between `Loaded` and `Processing`
//!
//! ```rust,ignore
//! use assetbox::processors::ProcessorRegistry;
//!
//! let registry = ProcessorRegistry::with_defaults();
//! registry.resolve("json").decode(&handle).await?;
//! ```

pub mod default;
pub mod image;
pub mod registry;
pub mod traits;

pub use default::DefaultProcessor;
pub use image::ImageProcessor;
pub use registry::{ProcessorRegistry, RegistryError};
pub use traits::{ProcessError, Processor};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{HandleConfig, Payload, ResourceHandle, SharedHandle};
    use crate::mock::{MockReply, MockTransport, RecordingOrchestrator};
    use crate::object_url::{BlobRegistry, ObjectUrlFacility};
    use crate::transfer::ResponseKind;
    use serde_json::json;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    #[test]
    fn test_registry_defaults() {
        let registry = ProcessorRegistry::with_defaults();
        assert!(registry.has_processor("binary"));
        assert!(registry.has_processor("text"));
        assert!(registry.has_processor("json"));
        assert!(registry.has_processor("image"));
        assert!(!registry.has_processor("audio"));
        assert_eq!(
            registry.kinds().collect::<Vec<_>>(),
            vec!["binary", "image", "json", "text"]
        );
    }

    #[test]
    fn test_registry_get_unknown() {
        let registry = ProcessorRegistry::new();
        assert!(matches!(
            registry.get("audio"),
            Err(RegistryError::NotFound(ref kind)) if kind == "audio"
        ));
    }

    /// Load `config` through a mock transport until it reaches `Loaded`
    async fn loaded(config: HandleConfig, reply: MockReply) -> SharedHandle {
        let url = config.url.clone().unwrap_or_default();
        let transport = Rc::new(MockTransport::new().with_reply(url, reply));
        let orchestrator = Rc::new(RecordingOrchestrator::new(transport));

        let handle = ResourceHandle::new(config).unwrap().into_shared();
        ResourceHandle::begin_load(&handle, orchestrator.clone()).unwrap();
        orchestrator.wait_for_advances(1).await;
        handle.borrow_mut().mark_loaded().unwrap();
        handle
    }

    #[tokio::test]
    async fn test_json_decoded_by_kind_lookup() {
        LocalSet::new()
            .run_until(async {
                let config = HandleConfig::new("json", "level")
                    .with_url("http://assets/level.json")
                    .with_response_kind(ResponseKind::Json);
                let handle = loaded(config, MockReply::ok(&br#"{"width":32}"#[..])).await;

                let registry = ProcessorRegistry::with_defaults();
                registry.resolve("json").decode(&handle).await.unwrap();

                assert_eq!(
                    handle.borrow().payload(),
                    Some(&Payload::Json(json!({ "width": 32 })))
                );
            })
            .await;
    }

    #[tokio::test]
    async fn test_unknown_kind_falls_back_to_default() {
        LocalSet::new()
            .run_until(async {
                let config = HandleConfig::new("shader", "water")
                    .with_url("http://assets/water.glsl")
                    .with_response_kind(ResponseKind::Text);
                let handle = loaded(config, MockReply::ok(&b"void main() {}"[..])).await;

                ProcessorRegistry::with_defaults()
                    .resolve("shader")
                    .decode(&handle)
                    .await
                    .unwrap();

                assert_eq!(
                    handle.borrow().payload(),
                    Some(&Payload::Text("void main() {}".to_string()))
                );
            })
            .await;
    }

    #[tokio::test]
    async fn test_image_reference_through_facility() {
        LocalSet::new()
            .run_until(async {
                let config = HandleConfig::new("image", "hero").with_url("http://assets/hero.png");
                let handle = loaded(config, MockReply::ok(&b"\x89PNG"[..])).await;

                let blobs = Rc::new(BlobRegistry::new());
                let facility: Rc<dyn ObjectUrlFacility> = blobs.clone();
                ProcessorRegistry::with_facility(Some(facility))
                    .resolve("image")
                    .decode(&handle)
                    .await
                    .unwrap();

                let handle = handle.borrow();
                let Some(Payload::Reference(reference)) = handle.payload() else {
                    panic!("expected a reference payload");
                };
                assert!(reference.starts_with("blob:assetbox/"));
                assert_eq!(blobs.len(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_image_reference_without_facility() {
        LocalSet::new()
            .run_until(async {
                let config = HandleConfig::new("image", "dot").with_url("http://assets/dot.png");
                let handle = loaded(config, MockReply::ok(&b"hello"[..])).await;

                ProcessorRegistry::with_defaults()
                    .resolve("image")
                    .decode(&handle)
                    .await
                    .unwrap();

                assert_eq!(
                    handle.borrow().payload(),
                    Some(&Payload::Reference("data:image/png;base64,aGVsbG8=".to_string()))
                );
            })
            .await;
    }
}
