//! In-process registry with the same observable behavior as the service.
//!
//! Resources are stored as JSON keyed by canonical name, so every resource
//! type shares one code path. Listing honours `-` wildcards in the parent,
//! `==`/`!=` filter clauses on identifier fields and `mime_type`, and pages
//! through results with opaque offset tokens. Like the service, it measures
//! and hashes `+gzip` contents after decompressing them, and serves them
//! decompressed unless the caller accepts gzip.

use super::error::{RegistryError, Result};
use super::models::{gunzip, Artifact, Contents, Page, RegistryResource};
use super::Registry;
use crate::mime;
use crate::names::{Kind, WILDCARD};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Default)]
pub struct MemoryRegistry {
    resources: Mutex<BTreeMap<String, Value>>,
    page_size: Option<usize>,
    fail_after_pages: Option<usize>,
    pages_served: AtomicUsize,
    mutations: Mutex<Vec<String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of items per page regardless of the requested size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Fails every list call after `pages` pages have been served.
    pub fn fail_listing_after(mut self, pages: usize) -> Self {
        self.fail_after_pages = Some(pages);
        self
    }

    /// Mutating calls seen so far, as `"<verb> <name>"`.
    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().clone()
    }

    /// Names of every stored resource, in order.
    pub fn names(&self) -> Vec<String> {
        self.resources.lock().keys().cloned().collect()
    }

    fn record(&self, verb: &str, name: &str) {
        self.mutations.lock().push(format!("{verb} {name}"));
    }

    fn parent_exists(resources: &BTreeMap<String, Value>, parent: &str) -> bool {
        if parent.is_empty() {
            return true;
        }
        // A location exists whenever its project does.
        let segments: Vec<&str> = parent.split('/').collect();
        if segments.len() == 4 && segments[2] == "locations" {
            return resources.contains_key(&segments[..2].join("/"));
        }
        resources.contains_key(parent)
    }
}

/// Splits `.../<collection>/<id>` into its parent and collection segment.
fn parent_of(name: &str) -> (&str, &str) {
    let mut parts = name.rsplitn(3, '/');
    let _id = parts.next();
    let collection = parts.next().unwrap_or_default();
    let parent = parts.next().unwrap_or_default();
    (parent, collection)
}

fn parent_matches(pattern: &str, parent: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').collect();
    let parent: Vec<&str> = parent.split('/').collect();
    pattern.len() == parent.len()
        && pattern
            .iter()
            .zip(&parent)
            .all(|(p, s)| *p == WILDCARD || p == s)
}

/// Field values a filter may refer to, derived from the name and resource body.
fn field_value(name: &str, value: &Value, field: &str) -> Option<String> {
    if field == "mime_type" {
        return Some(
            value
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        );
    }
    let segments: Vec<&str> = name.split('/').collect();
    segments.chunks(2).find_map(|pair| match pair {
        [collection, id] => {
            let field_name = match *collection {
                "projects" => "project_id",
                "apis" => "api_id",
                "versions" => "version_id",
                "specs" => "spec_id",
                "deployments" => "deployment_id",
                "artifacts" => "artifact_id",
                _ => return None,
            };
            (field_name == field).then(|| id.to_string())
        }
        _ => None,
    })
}

#[derive(Debug)]
struct Clause {
    field: String,
    negate: bool,
    value: String,
}

fn parse_filter(filter: &str) -> Result<Vec<Clause>> {
    let mut clauses = Vec::new();
    for raw in filter.split("&&").map(str::trim).filter(|c| !c.is_empty()) {
        let (field, negate, value) = if let Some((f, v)) = raw.split_once("!=") {
            (f, true, v)
        } else if let Some((f, v)) = raw.split_once("==") {
            (f, false, v)
        } else {
            return Err(RegistryError::InvalidArgument(format!(
                "unsupported filter clause {raw:?}"
            )));
        };
        let field = field.trim();
        if field != "mime_type" && !field.ends_with("_id") {
            return Err(RegistryError::InvalidArgument(format!(
                "unsupported filter field {field:?}"
            )));
        }
        let value = value.trim().trim_matches(|c: char| c == '\'' || c == '"');
        clauses.push(Clause {
            field: field.to_string(),
            negate,
            value: value.to_string(),
        });
    }
    Ok(clauses)
}

fn matches_filter(name: &str, value: &Value, clauses: &[Clause]) -> bool {
    clauses.iter().all(|clause| {
        let actual = field_value(name, value, &clause.field).unwrap_or_default();
        (actual == clause.value) != clause.negate
    })
}

/// Reads never carry contents; those come from `get_contents`.
fn summarize(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.remove("contents");
    }
    value
}

fn stamp_contents(value: &mut Value) -> Result<()> {
    let Some(obj) = value.as_object_mut() else {
        return Ok(());
    };
    let Some(encoded) = obj.get("contents").and_then(Value::as_str) else {
        return Ok(());
    };
    let mut data = base64::decode(encoded)
        .map_err(|e| RegistryError::InvalidArgument(format!("invalid contents: {e}")))?;
    let gzipped = obj
        .get("mimeType")
        .and_then(Value::as_str)
        .is_some_and(mime::is_gzip);
    if gzipped {
        data = gunzip(&data)
            .map_err(|e| RegistryError::InvalidArgument(format!("invalid gzip contents: {e}")))?;
    }
    obj.insert("sizeBytes".into(), Value::from(data.len()));
    obj.insert("hash".into(), Value::from(hex::encode(Sha256::digest(&data))));
    Ok(())
}

fn snake_to_camel(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn list_page<T: RegistryResource>(
        &self,
        parent: &str,
        filter: &str,
        page_size: i32,
        page_token: &str,
    ) -> Result<Page<T>> {
        let served = self.pages_served.fetch_add(1, Ordering::SeqCst);
        if self.fail_after_pages.is_some_and(|limit| served >= limit) {
            return Err(RegistryError::Status {
                status: 503,
                message: "listing unavailable".to_string(),
            });
        }

        let clauses = parse_filter(filter)?;
        let offset: usize = if page_token.is_empty() {
            0
        } else {
            page_token.parse().map_err(|_| {
                RegistryError::InvalidArgument(format!("invalid page token {page_token:?}"))
            })?
        };
        let requested = usize::try_from(page_size).ok().filter(|n| *n > 0);
        let size = match (self.page_size, requested) {
            (Some(cap), Some(n)) => cap.min(n),
            (Some(cap), None) => cap,
            (None, Some(n)) => n,
            (None, None) => DEFAULT_PAGE_SIZE,
        };

        let resources = self.resources.lock();
        let matched: Vec<&Value> = resources
            .iter()
            .filter(|(name, value)| {
                let (item_parent, collection) = parent_of(name);
                collection == T::KIND.collection()
                    && (T::KIND == Kind::Project || parent_matches(parent, item_parent))
                    && matches_filter(name, value, &clauses)
            })
            .map(|(_, value)| value)
            .collect();

        let items = matched
            .iter()
            .skip(offset)
            .take(size)
            .map(|v| serde_json::from_value(summarize((*v).clone())))
            .collect::<std::result::Result<Vec<T>, _>>()?;
        let next = offset + items.len();
        let next_page_token = if next < matched.len() {
            next.to_string()
        } else {
            String::new()
        };
        Ok(Page {
            items,
            next_page_token,
        })
    }

    async fn get<T: RegistryResource>(&self, name: &str) -> Result<T> {
        let resources = self.resources.lock();
        let value = resources
            .get(name)
            .filter(|_| parent_of(name).1 == T::KIND.collection())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        Ok(serde_json::from_value(summarize(value.clone()))?)
    }

    async fn create<T: RegistryResource>(&self, parent: &str, id: &str, resource: &T) -> Result<T> {
        crate::names::validate_id(id).map_err(|e| RegistryError::InvalidArgument(e.to_string()))?;
        let name = if parent.is_empty() {
            format!("{}/{}", T::KIND.collection(), id)
        } else {
            format!("{}/{}/{}", parent, T::KIND.collection(), id)
        };

        let mut resources = self.resources.lock();
        if !Self::parent_exists(&resources, parent) {
            return Err(RegistryError::NotFound(parent.to_string()));
        }
        if resources.contains_key(&name) {
            return Err(RegistryError::AlreadyExists(name));
        }
        let mut value = serde_json::to_value(resource)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("name".into(), Value::from(name.clone()));
            obj.insert("createTime".into(), Value::from(Utc::now().to_rfc3339()));
        }
        stamp_contents(&mut value)?;
        resources.insert(name.clone(), value.clone());
        drop(resources);

        self.record("create", &name);
        Ok(serde_json::from_value(summarize(value))?)
    }

    async fn update<T: RegistryResource>(
        &self,
        resource: &T,
        mask: &[&str],
        allow_missing: bool,
    ) -> Result<T> {
        let name = resource.name().to_string();
        let incoming = serde_json::to_value(resource)?;

        let mut resources = self.resources.lock();
        let value = match resources.get(&name) {
            Some(existing) => {
                let mut merged = existing.clone();
                let (Some(target), Some(source)) = (merged.as_object_mut(), incoming.as_object())
                else {
                    return Err(RegistryError::InvalidArgument(name));
                };
                if mask.is_empty() || mask == ["*"] {
                    for (key, field) in source {
                        if key != "name" && key != "createTime" {
                            target.insert(key.clone(), field.clone());
                        }
                    }
                } else {
                    for field in mask {
                        let key = snake_to_camel(field);
                        match source.get(&key) {
                            Some(v) => target.insert(key, v.clone()),
                            None => target.remove(&key),
                        };
                    }
                }
                target.insert("updateTime".into(), Value::from(Utc::now().to_rfc3339()));
                merged
            }
            None if allow_missing => {
                let (parent, _) = parent_of(&name);
                if !Self::parent_exists(&resources, parent) {
                    return Err(RegistryError::NotFound(parent.to_string()));
                }
                let mut created = incoming;
                if let Some(obj) = created.as_object_mut() {
                    obj.insert("createTime".into(), Value::from(Utc::now().to_rfc3339()));
                }
                created
            }
            None => return Err(RegistryError::NotFound(name)),
        };
        let mut value = value;
        stamp_contents(&mut value)?;
        resources.insert(name.clone(), value.clone());
        drop(resources);

        self.record("update", &name);
        Ok(serde_json::from_value(summarize(value))?)
    }

    async fn delete(&self, name: &str, force: bool) -> Result<()> {
        let mut resources = self.resources.lock();
        if !resources.contains_key(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        let prefix = format!("{name}/");
        let children: Vec<String> = resources
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        if !children.is_empty() && !force {
            return Err(RegistryError::FailedPrecondition(format!(
                "{name} has children; use force to delete them"
            )));
        }
        for child in &children {
            resources.remove(child);
        }
        resources.remove(name);
        drop(resources);

        self.record("delete", name);
        Ok(())
    }

    async fn get_contents(&self, name: &str, accept_gzip: bool) -> Result<Contents> {
        let resources = self.resources.lock();
        let value = resources
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let mime_type = value
            .get("mimeType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let data = match value.get("contents").and_then(Value::as_str) {
            Some(encoded) => base64::decode(encoded)
                .map_err(|e| RegistryError::InvalidArgument(format!("invalid contents: {e}")))?,
            None => Vec::new(),
        };
        let contents = Contents {
            mime_type,
            data: data.into(),
        };
        if accept_gzip {
            return Ok(contents);
        }
        contents
            .uncompressed()
            .map_err(|e| RegistryError::InvalidArgument(format!("invalid gzip contents: {e}")))
    }

    async fn replace_artifact(&self, artifact: &Artifact) -> Result<Artifact> {
        let mut value = serde_json::to_value(artifact)?;
        let mut resources = self.resources.lock();
        let existing = resources
            .get(&artifact.name)
            .ok_or_else(|| RegistryError::NotFound(artifact.name.clone()))?;
        let create_time = existing.get("createTime");
        if let (Some(obj), Some(create_time)) = (value.as_object_mut(), create_time) {
            obj.insert("createTime".into(), create_time.clone());
            obj.insert("updateTime".into(), Value::from(Utc::now().to_rfc3339()));
        }
        stamp_contents(&mut value)?;
        resources.insert(artifact.name.clone(), value.clone());
        drop(resources);

        self.record("replace", &artifact.name);
        Ok(serde_json::from_value(summarize(value))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Api, ApiSpec, ApiVersion, Project};

    async fn seeded() -> MemoryRegistry {
        let registry = MemoryRegistry::new().with_page_size(2);
        registry
            .create("", "p", &Project::default())
            .await
            .unwrap();
        for api in ["a", "b"] {
            registry
                .create("projects/p/locations/global", api, &Api::default())
                .await
                .unwrap();
            for version in ["v1", "v2"] {
                registry
                    .create(
                        &format!("projects/p/locations/global/apis/{api}"),
                        version,
                        &ApiVersion::default(),
                    )
                    .await
                    .unwrap();
            }
        }
        registry
    }

    #[tokio::test]
    async fn test_wildcard_listing_pages() {
        let registry = seeded().await;
        let mut names = Vec::new();
        let mut token = String::new();
        loop {
            let page: Page<ApiVersion> = registry
                .list_page("projects/p/locations/global/apis/-", "", 0, &token)
                .await
                .unwrap();
            assert!(page.items.len() <= 2);
            names.extend(page.items.into_iter().map(|v| v.name));
            if page.next_page_token.is_empty() {
                break;
            }
            token = page.next_page_token;
        }
        assert_eq!(names.len(), 4);
        assert_eq!(names[0], "projects/p/locations/global/apis/a/versions/v1");
    }

    #[tokio::test]
    async fn test_filter_on_identifier() {
        let registry = seeded().await;
        let page: Page<ApiVersion> = registry
            .list_page("projects/p/locations/global/apis/-", "version_id == 'v2'", 10, "")
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "projects/p/locations/global/apis/a/versions/v2",
                "projects/p/locations/global/apis/b/versions/v2",
            ]
        );

        let err = registry
            .list_page::<ApiVersion>("projects/p/locations/global/apis/-", "labels.x = 1", 10, "")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_contents_are_hashed_and_hidden() {
        let registry = seeded().await;
        let spec = ApiSpec {
            mime_type: "text/plain".into(),
            contents: b"hello".to_vec(),
            ..Default::default()
        };
        let created = registry
            .create("projects/p/locations/global/apis/a/versions/v1", "s", &spec)
            .await
            .unwrap();
        assert!(created.contents.is_empty());
        assert_eq!(created.size_bytes, 5);
        assert_eq!(created.hash, hex::encode(Sha256::digest(b"hello")));

        let contents = registry.get_contents(&created.name, false).await.unwrap();
        assert_eq!(&contents.data[..], b"hello");
        assert_eq!(contents.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_gzip_contents_follow_accept_encoding() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let registry = seeded().await;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"openapi: 3.0.0").unwrap();
        let compressed = encoder.finish().unwrap();
        let spec = ApiSpec {
            mime_type: "application/x.openapi+gzip;version=3".into(),
            contents: compressed.clone(),
            ..Default::default()
        };
        let created = registry
            .create("projects/p/locations/global/apis/a/versions/v1", "s", &spec)
            .await
            .unwrap();
        assert_eq!(created.size_bytes, 14);
        assert_eq!(created.hash, hex::encode(Sha256::digest(b"openapi: 3.0.0")));

        let plain = registry.get_contents(&created.name, false).await.unwrap();
        assert_eq!(plain.mime_type, "application/x.openapi;version=3");
        assert_eq!(&plain.data[..], b"openapi: 3.0.0");

        let stored = registry.get_contents(&created.name, true).await.unwrap();
        assert_eq!(stored.mime_type, "application/x.openapi+gzip;version=3");
        assert_eq!(&stored.data[..], &compressed[..]);
    }

    #[tokio::test]
    async fn test_delete_requires_force_for_children() {
        let registry = seeded().await;
        let api = "projects/p/locations/global/apis/a";
        let err = registry.delete(api, false).await.unwrap_err();
        assert!(matches!(err, RegistryError::FailedPrecondition(_)));
        registry.delete(api, true).await.unwrap();
        assert!(!registry.names().iter().any(|n| n.starts_with(api)));
    }

    #[tokio::test]
    async fn test_masked_update_and_allow_missing() {
        let registry = seeded().await;
        let mut api: Api = registry.get("projects/p/locations/global/apis/a").await.unwrap();
        api.labels.insert("tier".into(), "1".into());
        api.description = "ignored".into();
        let updated = registry.update(&api, &["labels"], false).await.unwrap();
        assert_eq!(updated.labels.get("tier").map(String::as_str), Some("1"));
        assert!(updated.description.is_empty());

        let missing = Api {
            name: "projects/p/locations/global/apis/c".into(),
            ..Default::default()
        };
        assert!(registry.update(&missing, &[], false).await.unwrap_err().is_not_found());
        registry.update(&missing, &[], true).await.unwrap();
    }
}
