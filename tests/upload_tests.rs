mod common;

use apg::commands::upload::{upload_openapi, upload_spec, OpenApiArgs, SpecArgs};
use apg::registry::memory::MemoryRegistry;
use apg::registry::{Api, ApiSpec, Registry};
use apg::registry::gunzip;
use common::{
    api_name, context, count_mutations, gzip, seed_api, seed_project, seed_spec, version_name,
    LOCATION, PETSTORE,
};
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;

const SWAGGER: &str = r#"{"swagger": "2.0", "info": {"title": "Acme", "version": "2"}, "paths": {}}"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn openapi_args(root: &Path) -> OpenApiArgs {
    OpenApiArgs {
        directories: vec![root.to_path_buf()],
        parent: LOCATION.to_string(),
        base_uri: Some("https://github.com/example/specs/".to_string()),
        jobs: 4,
    }
}

#[tokio::test]
async fn test_upload_tree() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "googleapis.com/books/v1/openapi.yaml", PETSTORE);
    write(dir.path(), "acme/v2/swagger.json", SWAGGER);
    write(dir.path(), "acme/v2/README.md", "not a spec");

    let registry = MemoryRegistry::new();
    seed_project(&registry).await;
    let ctx = context(registry);

    let summary = upload_openapi(&ctx, openapi_args(dir.path())).await.unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);

    let api: Api = ctx.client.get(&api_name("googleapis.com-books")).await.unwrap();
    assert_eq!(api.display_name, "googleapis.com-books");
    assert_eq!(api.description, "Swagger Petstore");

    let books = format!("{}/specs/openapi.yaml", version_name("googleapis.com-books", "v1"));
    let spec: ApiSpec = ctx.client.get(&books).await.unwrap();
    assert_eq!(spec.filename, "openapi.yaml");
    assert_eq!(spec.mime_type, "application/x.openapi+gzip;version=3");
    assert_eq!(
        spec.source_uri,
        "https://github.com/example/specs/googleapis.com/books/v1/openapi.yaml"
    );
    let contents = ctx.client.get_contents(&books, true).await.unwrap();
    assert_eq!(gunzip(&contents.data).unwrap(), PETSTORE.as_bytes());

    let acme = format!("{}/specs/swagger.json", version_name("acme", "v2"));
    let spec: ApiSpec = ctx.client.get(&acme).await.unwrap();
    assert_eq!(spec.mime_type, "application/x.openapi+gzip;version=2");
}

#[tokio::test]
async fn test_unchanged_specs_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "acme/v2/swagger.json", SWAGGER);
    let registry = MemoryRegistry::new();
    seed_project(&registry).await;
    let ctx = context(registry);
    let spec = format!("{}/specs/swagger.json", version_name("acme", "v2"));
    let spec_updates = format!("update {spec}");

    upload_openapi(&ctx, openapi_args(dir.path())).await.unwrap();
    assert_eq!(count_mutations(&ctx.client, &spec_updates), 1);

    let summary = upload_openapi(&ctx, openapi_args(dir.path())).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(count_mutations(&ctx.client, &spec_updates), 1);

    write(dir.path(), "acme/v2/swagger.json", &SWAGGER.replace("Acme", "Acme Corp"));
    upload_openapi(&ctx, openapi_args(dir.path())).await.unwrap();
    assert_eq!(count_mutations(&ctx.client, &spec_updates), 2);
    let api: Api = ctx.client.get(&api_name("acme")).await.unwrap();
    assert_eq!(api.description, "Acme Corp");
}

#[tokio::test]
async fn test_unchanged_check_ignores_gzip_framing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "acme/v2/swagger.json", SWAGGER);
    let registry = MemoryRegistry::new();
    seed_api(&registry, "acme", &["v2"]).await;

    // Same document, compressed by another client with different settings.
    let mut encoder = GzBuilder::new()
        .mtime(1_650_000_000)
        .write(Vec::new(), Compression::best());
    encoder.write_all(SWAGGER.as_bytes()).unwrap();
    let stored = encoder.finish().unwrap();
    assert_ne!(stored, gzip(SWAGGER.as_bytes()));
    let spec = seed_spec(
        &registry,
        &version_name("acme", "v2"),
        "swagger.json",
        "application/x.openapi+gzip;version=2",
        &stored,
    )
    .await;
    let existing: ApiSpec = registry.get(&spec).await.unwrap();
    assert_eq!(existing.size_bytes as usize, SWAGGER.len());
    assert_eq!(existing.hash, hex::encode(Sha256::digest(SWAGGER.as_bytes())));

    let ctx = context(registry);
    let summary = upload_openapi(&ctx, openapi_args(dir.path())).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(count_mutations(&ctx.client, &format!("update {spec}")), 0);
}

#[tokio::test]
async fn test_shallow_paths_fail_their_task() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "v1/openapi.yaml", PETSTORE);
    write(dir.path(), "books/v1/openapi.yaml", PETSTORE);
    let registry = MemoryRegistry::new();
    seed_project(&registry).await;
    let ctx = context(registry);

    let summary = upload_openapi(&ctx, openapi_args(dir.path())).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert!(ctx.client.names().contains(&api_name("books")));
}

#[tokio::test]
async fn test_parent_must_be_a_location() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(MemoryRegistry::new());
    let mut args = openapi_args(dir.path());
    args.parent = format!("{LOCATION}/apis/books");
    let err = upload_openapi(&ctx, args).await.unwrap_err();
    assert!(err.to_string().contains("--parent must name a project location"));
}

#[tokio::test]
async fn test_upload_single_spec() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "petstore.yaml", PETSTORE);
    let registry = MemoryRegistry::new();
    seed_api(&registry, "petstore", &["v1"]).await;
    let ctx = context(registry);

    let stored = upload_spec(
        &ctx,
        SpecArgs {
            file: dir.path().join("petstore.yaml"),
            parent: "apis/petstore/versions/v1".into(),
            spec_id: None,
            mime_type: Some("application/x.openapi+gzip;version=3.0.0".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(
        stored.name,
        format!("{}/specs/petstore.yaml", version_name("petstore", "v1"))
    );
    let contents = ctx.client.get_contents(&stored.name, true).await.unwrap();
    assert_eq!(gunzip(&contents.data).unwrap(), PETSTORE.as_bytes());

    let stored = upload_spec(
        &ctx,
        SpecArgs {
            file: dir.path().join("petstore.yaml"),
            parent: "apis/petstore/versions/v1".into(),
            spec_id: Some("plain".into()),
            mime_type: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(stored.mime_type, "application/x.openapi;version=3.0.0");
    let contents = ctx.client.get_contents(&stored.name, true).await.unwrap();
    assert_eq!(&contents.data[..], PETSTORE.as_bytes());
}

#[tokio::test]
async fn test_upload_spec_needs_a_version_parent() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "petstore.yaml", PETSTORE);
    let ctx = context(MemoryRegistry::new());

    let err = upload_spec(
        &ctx,
        SpecArgs {
            file: dir.path().join("petstore.yaml"),
            parent: "apis/petstore/versions/-".into(),
            spec_id: None,
            mime_type: None,
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("--parent must name a single version"));
}
