#![allow(dead_code)]

use apg::cancel::Cancellation;
use apg::commands::Context;
use apg::config::RegistrySettings;
use apg::registry::memory::MemoryRegistry;
use apg::registry::{Api, ApiSpec, ApiVersion, Project, Registry};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

pub const LOCATION: &str = "projects/demo/locations/global";
pub const PETSTORE: &str = include_str!("../fixtures/petstore.yaml");

pub fn context(registry: MemoryRegistry) -> Context<MemoryRegistry> {
    let settings = RegistrySettings {
        address: "memory".into(),
        project: Some("demo".into()),
        ..Default::default()
    };
    Context::new(registry, &settings, Cancellation::new())
}

pub fn api_name(api: &str) -> String {
    format!("{LOCATION}/apis/{api}")
}

pub fn version_name(api: &str, version: &str) -> String {
    format!("{LOCATION}/apis/{api}/versions/{version}")
}

/// Creates the `demo` project once.
pub async fn seed_project(registry: &MemoryRegistry) {
    if registry.get::<Project>("projects/demo").await.is_err() {
        registry.create("", "demo", &Project::default()).await.unwrap();
    }
}

/// Creates an API with the given versions.
pub async fn seed_api(registry: &MemoryRegistry, api: &str, versions: &[&str]) {
    seed_project(registry).await;
    registry.create(LOCATION, api, &Api::default()).await.unwrap();
    for version in versions {
        registry
            .create(&api_name(api), version, &ApiVersion::default())
            .await
            .unwrap();
    }
}

pub async fn seed_spec(
    registry: &MemoryRegistry,
    version: &str,
    id: &str,
    mime_type: &str,
    contents: &[u8],
) -> String {
    let spec = ApiSpec {
        filename: "openapi.yaml".into(),
        mime_type: mime_type.into(),
        contents: contents.to_vec(),
        ..Default::default()
    };
    registry.create(version, id, &spec).await.unwrap().name
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn count_mutations(registry: &MemoryRegistry, prefix: &str) -> usize {
    registry
        .mutations()
        .iter()
        .filter(|m| m.starts_with(prefix))
        .count()
}
