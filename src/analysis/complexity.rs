//! Complexity counts: paths, operations per verb, schemas and their properties.

use super::messages::Complexity;
use super::proto::ProtoDescription;
use super::{parse_document, SpecFormat};
use anyhow::Result;
use serde_yaml::Value;

const VERBS: [&str; 4] = ["get", "post", "put", "delete"];

/// Computes the complexity of an uncompressed spec.
pub fn summarize(format: SpecFormat, data: &[u8]) -> Result<Complexity> {
    Ok(match format {
        SpecFormat::OpenApiV2 => openapi_v2(&parse_document(data)?),
        SpecFormat::OpenApiV3 => openapi_v3(&parse_document(data)?),
        SpecFormat::Discovery => discovery(&parse_document(data)?),
        SpecFormat::ZippedProtos => protos(&ProtoDescription::from_zip(data)?),
    })
}

pub fn openapi_v2(document: &Value) -> Complexity {
    let mut summary = Complexity::default();
    count_schemas(&mut summary, document.get("definitions"));
    count_paths(&mut summary, document.get("paths"));
    summary
}

pub fn openapi_v3(document: &Value) -> Complexity {
    let mut summary = Complexity::default();
    let schemas = document.get("components").and_then(|c| c.get("schemas"));
    count_schemas(&mut summary, schemas);
    count_paths(&mut summary, document.get("paths"));
    summary
}

/// Discovery documents list top-level methods with an explicit `httpMethod`.
pub fn discovery(document: &Value) -> Complexity {
    let mut summary = Complexity::default();
    count_schemas(&mut summary, document.get("schemas"));
    if let Some(methods) = document.get("methods").and_then(Value::as_mapping) {
        for (_, method) in methods {
            summary.path_count += 1;
            match method.get("httpMethod").and_then(Value::as_str) {
                Some("GET") => summary.get_count += 1,
                Some("POST") => summary.post_count += 1,
                Some("PUT") => summary.put_count += 1,
                Some("DELETE") => summary.delete_count += 1,
                _ => {}
            }
        }
    }
    summary
}

/// Messages count as schemas, fields as properties and RPCs as paths.
pub fn protos(description: &ProtoDescription) -> Complexity {
    let mut summary = Complexity::default();
    for message in &description.messages {
        summary.schema_count += 1;
        summary.schema_property_count += message.fields.len() as i32;
    }
    for rpc in &description.rpcs {
        summary.path_count += 1;
        match rpc.http_verb.as_deref() {
            Some("get") => summary.get_count += 1,
            Some("post") => summary.post_count += 1,
            Some("put") => summary.put_count += 1,
            Some("delete") => summary.delete_count += 1,
            _ => {}
        }
    }
    summary
}

fn count_schemas(summary: &mut Complexity, schemas: Option<&Value>) {
    if let Some(schemas) = schemas.and_then(Value::as_mapping) {
        for (_, schema) in schemas {
            count_schema(summary, schema);
        }
    }
}

fn count_schema(summary: &mut Complexity, schema: &Value) {
    summary.schema_count += 1;
    if let Some(properties) = schema.get("properties").and_then(Value::as_mapping) {
        for (_, property) in properties {
            summary.schema_property_count += 1;
            count_schema(summary, property);
        }
    }
}

fn count_paths(summary: &mut Complexity, paths: Option<&Value>) {
    let Some(paths) = paths.and_then(Value::as_mapping) else {
        return;
    };
    for (_, item) in paths {
        summary.path_count += 1;
        for verb in VERBS {
            if item.get(verb).is_some() {
                match verb {
                    "get" => summary.get_count += 1,
                    "post" => summary.post_count += 1,
                    "put" => summary.put_count += 1,
                    _ => summary.delete_count += 1,
                }
            }
        }
    }
}
