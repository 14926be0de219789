//! Resolves a parsed [`Pattern`] into registry calls.
//!
//! Collections are listed page by page and every resource is handed to a
//! [`Handler`] in server order; singletons are fetched with one get.
//! Handlers usually turn each resource into a pool task.

use crate::cancel::Cancellation;
use crate::constants::DEFAULT_PAGE_SIZE;
use crate::names::{Kind, Pattern, WILDCARD};
use crate::registry::{
    Api, ApiDeployment, ApiSpec, ApiVersion, Artifact, Project, Registry, RegistryResource,
    Resource,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;

/// Receives each visited resource.
#[async_trait]
pub trait Handler: Send {
    async fn handle(&mut self, resource: Resource) -> Result<()>;
}

/// Gathers every visited resource.
#[derive(Debug, Default)]
pub struct Collector {
    pub resources: Vec<Resource>,
}

#[async_trait]
impl Handler for Collector {
    async fn handle(&mut self, resource: Resource) -> Result<()> {
        self.resources.push(resource);
        Ok(())
    }
}

/// Adds `<kind>_id == '<id>'` to `filter` unless `id` is empty or a wildcard.
pub fn id_filter(kind: Kind, id: &str, filter: &str) -> String {
    let mut clauses = Vec::new();
    if !filter.is_empty() {
        clauses.push(filter.to_string());
    }
    if !id.is_empty() && id != WILDCARD {
        clauses.push(format!("{} == '{}'", kind.id_field(), id));
    }
    clauses.join(" && ")
}

/// Lists every `T` under `parent`, following page tokens to the end.
///
/// Returns the number of resources handed to `handler`. A failing page stops
/// the enumeration; resources already handled are not revisited.
pub async fn list<C, T, H>(
    client: &C,
    parent: &str,
    id: &str,
    filter: &str,
    cancellation: &Cancellation,
    handler: &mut H,
) -> Result<usize>
where
    C: Registry,
    T: RegistryResource,
    H: Handler + ?Sized,
{
    let filter = id_filter(T::KIND, id, filter);
    let mut page_token = String::new();
    let mut count = 0;
    loop {
        if cancellation.is_cancelled() {
            bail!("listing {} cancelled", T::KIND.collection());
        }
        let page = client
            .list_page::<T>(parent, &filter, DEFAULT_PAGE_SIZE, &page_token)
            .await
            .with_context(|| {
                format!("failed to list {} under {:?}", T::KIND.collection(), parent)
            })?;
        for item in page.items {
            handler.handle(item.into_resource()).await?;
            count += 1;
        }
        if page.next_page_token.is_empty() {
            break;
        }
        page_token = page.next_page_token;
    }
    tracing::debug!(parent, filter = %filter, count, "listed {}", T::KIND.collection());
    Ok(count)
}

/// Fetches a single `T` and hands it to `handler`.
pub async fn get<C, T, H>(client: &C, name: &str, handler: &mut H) -> Result<usize>
where
    C: Registry,
    T: RegistryResource,
    H: Handler + ?Sized,
{
    let item = client
        .get::<T>(name)
        .await
        .with_context(|| format!("failed to get {name}"))?;
    handler.handle(item.into_resource()).await?;
    Ok(1)
}

/// Lists or gets whatever `pattern` names, calling `handler` per resource.
pub async fn visit<C, H>(
    client: &C,
    pattern: &Pattern,
    filter: &str,
    cancellation: &Cancellation,
    handler: &mut H,
) -> Result<usize>
where
    C: Registry,
    H: Handler + ?Sized,
{
    let name = &pattern.name;
    if pattern.collection {
        let parent = name.parent();
        let id = name.id();
        return match name.kind() {
            Kind::Project => {
                list::<C, Project, H>(client, &parent, id, filter, cancellation, handler).await
            }
            Kind::Api => {
                list::<C, Api, H>(client, &parent, id, filter, cancellation, handler).await
            }
            Kind::Version => {
                list::<C, ApiVersion, H>(client, &parent, id, filter, cancellation, handler).await
            }
            Kind::Spec => {
                list::<C, ApiSpec, H>(client, &parent, id, filter, cancellation, handler).await
            }
            Kind::Deployment => {
                list::<C, ApiDeployment, H>(client, &parent, id, filter, cancellation, handler)
                    .await
            }
            Kind::Artifact => {
                list::<C, Artifact, H>(client, &parent, id, filter, cancellation, handler).await
            }
        };
    }

    if !filter.is_empty() {
        bail!("--filter must not be specified for a non-collection resource");
    }
    let name = name.to_string();
    match pattern.kind() {
        Kind::Project => get::<C, Project, H>(client, &name, handler).await,
        Kind::Api => get::<C, Api, H>(client, &name, handler).await,
        Kind::Version => get::<C, ApiVersion, H>(client, &name, handler).await,
        Kind::Spec => get::<C, ApiSpec, H>(client, &name, handler).await,
        Kind::Deployment => get::<C, ApiDeployment, H>(client, &name, handler).await,
        Kind::Artifact => get::<C, Artifact, H>(client, &name, handler).await,
    }
}

/// Spec bytes with any gzip compression removed.
#[derive(Debug, Clone)]
pub struct SpecContents {
    /// MIME type of `data`, without `+gzip`.
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Fetches the contents of `spec`, decompressing them when gzip-marked.
///
/// The type the service returns decides whether the bytes are compressed;
/// the spec's own type is only a fallback for responses without one.
pub async fn fetch_spec_contents<C: Registry>(
    client: &C,
    spec: &ApiSpec,
) -> Result<SpecContents> {
    let mut contents = client
        .get_contents(&spec.name, true)
        .await
        .with_context(|| format!("failed to get contents of {}", spec.name))?;
    if contents.mime_type.is_empty() {
        contents.mime_type = spec.mime_type.clone();
    }
    let contents = contents
        .uncompressed()
        .with_context(|| format!("failed to decompress {}", spec.name))?;
    Ok(SpecContents {
        mime_type: contents.mime_type,
        data: contents.data.to_vec(),
    })
}

/// Stores `artifact`, replacing any artifact already stored under its name.
pub async fn set_artifact<C: Registry>(client: &C, artifact: &Artifact) -> Result<()> {
    let Some((parent, id)) = artifact.name.rsplit_once("/artifacts/") else {
        bail!("invalid artifact name {}", artifact.name);
    };
    match client.create(parent, id, artifact).await {
        Ok(_) => Ok(()),
        Err(err) if err.is_already_exists() => {
            client
                .replace_artifact(artifact)
                .await
                .with_context(|| format!("failed to replace {}", artifact.name))?;
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("failed to create {}", artifact.name)),
    }
}
