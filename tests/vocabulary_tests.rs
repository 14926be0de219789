mod common;

use apg::analysis::messages::{Vocabulary, WordCount};
use apg::commands::compute::{self, ComputeArgs, ComputeCommands};
use apg::commands::vocabulary::{self, CombineArgs, UniqueArgs, VocabularyCommands};
use apg::commands::Context;
use apg::registry::memory::MemoryRegistry;
use apg::registry::Registry;
use common::{api_name, context, gzip, seed_api, seed_spec, version_name, PETSTORE};
use prost::Message;

const OWNERS: &str = r#"
openapi: 3.0.0
info: {title: Owners, version: "1"}
paths:
  /owners:
    get:
      operationId: listOwners
      parameters:
        - {name: limit, in: query}
components:
  schemas:
    Owner:
      properties:
        id: {type: string}
        name: {type: string}
    Pet:
      properties:
        name: {type: string}
"#;

fn words(counts: &[WordCount]) -> Vec<(&str, i32)> {
    counts.iter().map(|w| (w.word.as_str(), w.count)).collect()
}

fn spec_vocabulary(api: &str) -> String {
    format!("{}/specs/openapi.yaml/artifacts/vocabulary", version_name(api, "v1"))
}

fn combine(artifacts: &[String], output: Option<String>) -> CombineArgs {
    CombineArgs {
        artifacts: artifacts.to_vec(),
        filter: String::new(),
        output,
    }
}

/// Two specs with their vocabularies computed.
async fn vocabularies() -> Context<MemoryRegistry> {
    let registry = MemoryRegistry::new();
    seed_api(&registry, "petstore", &["v1"]).await;
    seed_api(&registry, "owners", &["v1"]).await;
    let petstore = gzip(PETSTORE.as_bytes());
    let openapi_gzip = "application/x.openapi+gzip;version=3.0.0";
    seed_spec(&registry, &version_name("petstore", "v1"), "openapi.yaml", openapi_gzip, &petstore)
        .await;
    let openapi = "application/x.openapi;version=3.0.0";
    seed_spec(&registry, &version_name("owners", "v1"), "openapi.yaml", openapi, OWNERS.as_bytes())
        .await;
    let ctx = context(registry);

    let commands: [fn(ComputeArgs) -> ComputeCommands; 2] =
        [ComputeCommands::Vocabulary, ComputeCommands::Complexity];
    for cmd in commands {
        let args = ComputeArgs {
            pattern: "apis/-/versions/-/specs/-".into(),
            filter: String::new(),
            jobs: 2,
            dry_run: false,
        };
        let summary = compute::run(&ctx, cmd(args)).await.unwrap();
        assert_eq!(summary.succeeded, 2);
    }
    ctx
}

async fn stored(ctx: &Context<MemoryRegistry>, name: &str) -> Vocabulary {
    let contents = ctx.client.get_contents(name, false).await.unwrap();
    assert_eq!(
        contents.mime_type,
        "application/octet-stream;type=gnostic.metrics.Vocabulary"
    );
    Vocabulary::decode(contents.data).unwrap()
}

#[tokio::test]
async fn test_union_is_stored_as_an_artifact() {
    let ctx = vocabularies().await;
    let output = format!("{}/artifacts/vocabulary-union", api_name("petstore"));

    // Complexity artifacts match the pattern too and are skipped.
    let every_artifact = vec!["apis/-/versions/-/specs/-/artifacts/-".to_string()];
    let cmd = VocabularyCommands::Union(combine(&every_artifact, Some(output.clone())));
    vocabulary::run(&ctx, cmd, &mut std::io::sink()).await.unwrap();

    let union = stored(&ctx, &output).await;
    assert_eq!(
        words(&union.schemas),
        vec![("Error", 1), ("Owner", 1), ("Pet", 2), ("Pets", 1)]
    );
    assert_eq!(
        words(&union.properties),
        vec![("code", 1), ("id", 2), ("message", 1), ("name", 3), ("tag", 1)]
    );
    assert_eq!(words(&union.parameters), vec![("limit", 2), ("petId", 1)]);
    assert_eq!(union.operations.len(), 4);

    // Storing again replaces the artifact.
    let cmd = VocabularyCommands::Union(combine(&every_artifact, Some(output.clone())));
    vocabulary::run(&ctx, cmd, &mut std::io::sink()).await.unwrap();
    let artifacts = ctx.client.names().into_iter().filter(|n| *n == output).count();
    assert_eq!(artifacts, 1);
}

#[tokio::test]
async fn test_intersection_prints_json_without_output() {
    let ctx = vocabularies().await;
    let inputs = vec!["apis/-/versions/-/specs/-/artifacts/vocabulary".to_string()];

    let mut out = Vec::new();
    let cmd = VocabularyCommands::Intersection(combine(&inputs, None));
    vocabulary::run(&ctx, cmd, &mut out).await.unwrap();

    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json["schemas"], serde_json::json!([{"word": "Pet", "count": 2}]));
    assert_eq!(json["operations"], serde_json::json!([]));
    assert_eq!(json["parameters"], serde_json::json!([{"word": "limit", "count": 2}]));
}

#[tokio::test]
async fn test_difference_follows_argument_order() {
    let ctx = vocabularies().await;
    let output = format!("{}/artifacts/petstore-only", api_name("petstore"));
    let inputs = vec![spec_vocabulary("petstore"), spec_vocabulary("owners")];

    let cmd = VocabularyCommands::Difference(combine(&inputs, Some(output.clone())));
    vocabulary::run(&ctx, cmd, &mut std::io::sink()).await.unwrap();

    let difference = stored(&ctx, &output).await;
    assert_eq!(words(&difference.schemas), vec![("Error", 1), ("Pets", 1)]);
    assert_eq!(
        words(&difference.properties),
        vec![("code", 1), ("message", 1), ("tag", 1)]
    );
    assert_eq!(words(&difference.parameters), vec![("petId", 1)]);
    assert_eq!(difference.operations.len(), 3);
}

#[tokio::test]
async fn test_unique_is_stored_next_to_each_input() {
    let ctx = vocabularies().await;
    let inputs = vec!["apis/-/versions/-/specs/-/artifacts/vocabulary".to_string()];

    let cmd = VocabularyCommands::Unique(UniqueArgs {
        artifacts: inputs,
        filter: String::new(),
        dry_run: false,
    });
    vocabulary::run(&ctx, cmd, &mut std::io::sink()).await.unwrap();

    let owners = stored(&ctx, &format!("{}-unique", spec_vocabulary("owners"))).await;
    assert_eq!(words(&owners.schemas), vec![("Owner", 1)]);
    assert_eq!(words(&owners.operations), vec![("listOwners", 1)]);
    assert!(owners.properties.is_empty());
    assert!(owners.parameters.is_empty());

    let petstore = stored(&ctx, &format!("{}-unique", spec_vocabulary("petstore"))).await;
    assert_eq!(words(&petstore.parameters), vec![("petId", 1)]);
}

#[tokio::test]
async fn test_inputs_must_be_vocabulary_artifacts() {
    let ctx = vocabularies().await;

    let specs = vec!["apis/-/versions/-/specs/-".to_string()];
    let cmd = VocabularyCommands::Union(combine(&specs, None));
    let err = vocabulary::run(&ctx, cmd, &mut std::io::sink()).await.unwrap_err();
    assert!(err.to_string().contains("does not name artifacts"));

    let complexity = vec!["apis/-/versions/-/specs/-/artifacts/complexity".to_string()];
    let cmd = VocabularyCommands::Union(combine(&complexity, None));
    let err = vocabulary::run(&ctx, cmd, &mut std::io::sink()).await.unwrap_err();
    assert!(err.to_string().contains("no vocabularies found"));

    let inputs = vec![spec_vocabulary("owners")];
    let to_version = Some(version_name("owners", "v1"));
    let cmd = VocabularyCommands::Union(combine(&inputs, to_version));
    let err = vocabulary::run(&ctx, cmd, &mut std::io::sink()).await.unwrap_err();
    assert!(err.to_string().contains("--output must name a single artifact"));
}
