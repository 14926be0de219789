//! Protocol buffer messages stored as artifact contents.
//!
//! Field numbers match the published `gnostic.metrics` and
//! `google.cloud.apigeeregistry.v1.style` schemas so other tools can decode
//! what we write.

use crate::constants::{COMPLEXITY_MESSAGE, LINT_MESSAGE, VOCABULARY_MESSAGE};
use prost::Message;
use serde::Serialize;

/// Counts describing the size of an API description.
#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
#[serde(rename_all = "camelCase")]
pub struct Complexity {
    #[prost(int32, tag = "1")]
    pub path_count: i32,
    #[prost(int32, tag = "2")]
    pub get_count: i32,
    #[prost(int32, tag = "3")]
    pub post_count: i32,
    #[prost(int32, tag = "4")]
    pub put_count: i32,
    #[prost(int32, tag = "5")]
    pub delete_count: i32,
    #[prost(int32, tag = "6")]
    pub schema_count: i32,
    #[prost(int32, tag = "7")]
    pub schema_property_count: i32,
}

#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
pub struct WordCount {
    #[prost(string, tag = "1")]
    pub word: String,
    #[prost(int32, tag = "2")]
    pub count: i32,
}

/// Terms used by an API, each list sorted by word.
#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
pub struct Vocabulary {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub schemas: Vec<WordCount>,
    #[prost(message, repeated, tag = "3")]
    pub properties: Vec<WordCount>,
    #[prost(message, repeated, tag = "4")]
    pub operations: Vec<WordCount>,
    #[prost(message, repeated, tag = "5")]
    pub parameters: Vec<WordCount>,
}

#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
#[serde(rename_all = "camelCase")]
pub struct LintPosition {
    #[prost(int32, tag = "1")]
    pub line_number: i32,
    #[prost(int32, tag = "2")]
    pub column_number: i32,
}

#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
#[serde(rename_all = "camelCase")]
pub struct LintLocation {
    #[prost(message, optional, tag = "1")]
    pub start_position: Option<LintPosition>,
    #[prost(message, optional, tag = "2")]
    pub end_position: Option<LintPosition>,
}

#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
#[serde(rename_all = "camelCase")]
pub struct LintProblem {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(string, tag = "2")]
    pub rule_id: String,
    #[prost(string, tag = "3")]
    pub rule_doc_uri: String,
    #[prost(string, tag = "4")]
    pub suggestion: String,
    #[prost(message, optional, tag = "5")]
    pub location: Option<LintLocation>,
}

#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
#[serde(rename_all = "camelCase")]
pub struct LintFile {
    #[prost(string, tag = "1")]
    pub file_path: String,
    #[prost(message, repeated, tag = "2")]
    pub problems: Vec<LintProblem>,
}

/// Results of running one linter over one spec.
#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
pub struct Lint {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub files: Vec<LintFile>,
}

/// Written to a lint plugin's stdin.
#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
#[serde(rename_all = "camelCase")]
pub struct LinterRequest {
    #[prost(string, tag = "1")]
    pub spec_directory: String,
    #[prost(string, repeated, tag = "2")]
    pub rule_ids: Vec<String>,
}

/// Read from a lint plugin's stdout.
#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
pub struct LinterResponse {
    #[prost(string, repeated, tag = "1")]
    pub errors: Vec<String>,
    #[prost(message, optional, tag = "2")]
    pub lint: Option<Lint>,
}

/// Renders artifact contents of a known message type as pretty JSON.
///
/// Returns `None` for message types this crate does not define.
pub fn to_json(message_type: &str, data: &[u8]) -> anyhow::Result<Option<String>> {
    fn render<M: Message + Default + Serialize>(data: &[u8]) -> anyhow::Result<Option<String>> {
        Ok(Some(serde_json::to_string_pretty(&M::decode(data)?)?))
    }
    match message_type {
        COMPLEXITY_MESSAGE => render::<Complexity>(data),
        VOCABULARY_MESSAGE => render::<Vocabulary>(data),
        LINT_MESSAGE => render::<Lint>(data),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_wire_format() {
        let complexity = Complexity {
            path_count: 2,
            get_count: 2,
            ..Default::default()
        };
        // Field 1 and 2, varint 2 each.
        assert_eq!(complexity.encode_to_vec(), vec![0x08, 0x02, 0x10, 0x02]);
        assert_eq!(Complexity::decode(&[0x08u8, 0x02, 0x10, 0x02][..]).unwrap(), complexity);
    }

    #[test]
    fn test_linter_response_decodes_nested_problems() {
        let response = LinterResponse {
            errors: vec![],
            lint: Some(Lint {
                name: "registry-lint-test".into(),
                files: vec![LintFile {
                    file_path: "openapi.yaml".into(),
                    problems: vec![LintProblem {
                        message: "missing description".into(),
                        rule_id: "R001".into(),
                        location: Some(LintLocation {
                            start_position: Some(LintPosition {
                                line_number: 3,
                                column_number: 1,
                            }),
                            end_position: None,
                        }),
                        ..Default::default()
                    }],
                }],
            }),
        };
        let bytes = response.encode_to_vec();
        assert_eq!(LinterResponse::decode(bytes.as_slice()).unwrap(), response);
    }

    #[test]
    fn test_known_artifacts_render_as_json() {
        let bytes = Complexity {
            schema_count: 4,
            ..Default::default()
        }
        .encode_to_vec();
        let json = to_json(COMPLEXITY_MESSAGE, &bytes).unwrap().unwrap();
        assert!(json.contains("\"schemaCount\": 4"));
        assert_eq!(to_json("example.Unknown", &bytes).unwrap(), None);
    }
}
