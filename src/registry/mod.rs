//! Client seam for the API Registry service.
//!
//! Commands are written against the [`Registry`] trait. [`http::HttpRegistry`]
//! talks to a live service. With the `testing` feature, `memory::MemoryRegistry`
//! keeps everything in process and backs the integration tests.

pub mod error;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod models;

use async_trait::async_trait;

pub use error::{RegistryError, Result};
pub use models::{
    gunzip, Api, ApiDeployment, ApiSpec, ApiVersion, Artifact, Contents, Labeled, Metadata,
    Page, Project, RegistryResource, Resource,
};

#[async_trait]
pub trait Registry: Send + Sync + 'static {
    /// Fetches one page of resources of type `T` under `parent`.
    ///
    /// `parent` may contain `-` wildcard segments. An empty `page_token`
    /// requests the first page.
    async fn list_page<T: RegistryResource>(
        &self,
        parent: &str,
        filter: &str,
        page_size: i32,
        page_token: &str,
    ) -> Result<Page<T>>;

    async fn get<T: RegistryResource>(&self, name: &str) -> Result<T>;

    async fn create<T: RegistryResource>(&self, parent: &str, id: &str, resource: &T) -> Result<T>;

    /// Updates the fields named in `mask` (all fields when empty).
    ///
    /// With `allow_missing`, a resource that does not exist is created.
    async fn update<T: RegistryResource>(
        &self,
        resource: &T,
        mask: &[&str],
        allow_missing: bool,
    ) -> Result<T>;

    /// Deletes a resource; `force` also deletes its children.
    async fn delete(&self, name: &str, force: bool) -> Result<()>;

    /// Raw contents of a spec or artifact.
    ///
    /// The service decompresses `+gzip` specs and strips the marker from the
    /// returned type unless `accept_gzip` asks for the stored bytes.
    async fn get_contents(&self, name: &str, accept_gzip: bool) -> Result<Contents>;

    async fn replace_artifact(&self, artifact: &Artifact) -> Result<Artifact>;
}
