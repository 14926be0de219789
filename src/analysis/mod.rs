//! Summaries derived from spec contents and stored as artifacts.

pub mod complexity;
pub mod lint;
pub mod messages;
pub mod proto;
pub mod vocabulary;

use crate::mime;
use anyhow::{Context, Result};
use serde_yaml::Value;

/// Spec formats that can be summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    OpenApiV2,
    OpenApiV3,
    Discovery,
    ZippedProtos,
}

impl SpecFormat {
    /// Recognises an uncompressed spec MIME type.
    pub fn detect(mime_type: &str) -> Option<Self> {
        if mime::is_openapi_v2(mime_type) {
            Some(SpecFormat::OpenApiV2)
        } else if mime::is_openapi_v3(mime_type) {
            Some(SpecFormat::OpenApiV3)
        } else if mime::is_discovery(mime_type) {
            Some(SpecFormat::Discovery)
        } else if mime::is_proto(mime_type) && mime::is_zip(mime_type) {
            Some(SpecFormat::ZippedProtos)
        } else {
            None
        }
    }

    /// Message attached to a summary failure for `spec_name`.
    pub fn parse_error(self, spec_name: &str) -> String {
        match self {
            SpecFormat::OpenApiV2 | SpecFormat::OpenApiV3 => {
                format!("invalid OpenAPI: {spec_name}")
            }
            SpecFormat::Discovery => format!("invalid Discovery: {spec_name}"),
            SpecFormat::ZippedProtos => format!("error processing protos: {spec_name}"),
        }
    }
}

/// Parses a YAML or JSON API description.
pub fn parse_document(data: &[u8]) -> Result<Value> {
    let document: Value =
        serde_yaml::from_slice(data).context("document is not valid YAML or JSON")?;
    if !document.is_mapping() {
        anyhow::bail!("document is not a mapping");
    }
    Ok(document)
}
