//! Local presence checks

use addonpack_core::ImageReference;

use crate::backend::ImageBackend;

/// Whether `image` is already in the backend's local store.
///
/// Never fails: a tool that cannot answer counts as "absent", so the image
/// is pulled.
pub async fn image_exists(backend: &dyn ImageBackend, image: &ImageReference) -> bool {
    match backend.inspect(image).await {
        Ok(present) => present,
        Err(e) => {
            tracing::debug!(image = %image, backend = backend.name(), error = %e, "inspect failed, treating as absent");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    #[tokio::test]
    async fn test_present_and_absent() {
        let backend = MockBackend::new().with_present(["busybox:1.36"]);
        let busybox = ImageReference::parse("busybox:1.36").unwrap();
        let nginx = ImageReference::parse("nginx:1.25").unwrap();

        assert!(image_exists(&backend, &busybox).await);
        assert!(!image_exists(&backend, &nginx).await);
    }

    #[tokio::test]
    async fn test_inspect_error_is_absent() {
        let backend = MockBackend::new()
            .with_present(["busybox:1.36"])
            .with_broken_inspect();
        let busybox = ImageReference::parse("busybox:1.36").unwrap();

        assert!(!image_exists(&backend, &busybox).await);
        assert_eq!(backend.operation_counts().inspects, 1);
    }
}
