//! MIME type conventions for specs and artifacts.
//!
//! Spec formats are recognised by substring, e.g.
//! `application/x.openapi+gzip;version=3.0.0`. Artifact contents are typed
//! protobuf messages: `application/octet-stream;type=<message name>`.

const MESSAGE_PREFIX: &str = "application/octet-stream;type=";

pub fn openapi_mime_type(compression: &str, version: &str) -> String {
    format!("application/x.openapi{compression};version={version}")
}

pub fn discovery_mime_type(compression: &str) -> String {
    format!("application/x.discovery{compression}")
}

pub fn protobuf_mime_type(compression: &str) -> String {
    format!("application/x.protobuf{compression}")
}

pub fn is_openapi_v2(mime_type: &str) -> bool {
    mime_type.contains("openapi") && mime_type.contains("version=2")
}

pub fn is_openapi_v3(mime_type: &str) -> bool {
    mime_type.contains("openapi") && mime_type.contains("version=3")
}

pub fn is_discovery(mime_type: &str) -> bool {
    mime_type.contains("discovery")
}

pub fn is_proto(mime_type: &str) -> bool {
    mime_type.contains("proto")
}

pub fn is_gzip(mime_type: &str) -> bool {
    mime_type.contains("+gzip")
}

pub fn is_zip(mime_type: &str) -> bool {
    mime_type.contains("+zip")
}

/// The MIME type of the data once gzip compression is removed.
pub fn gunzipped_type(mime_type: &str) -> String {
    mime_type.replacen("+gzip", "", 1)
}

pub fn mime_type_for_message_type(message_type: &str) -> String {
    format!("{MESSAGE_PREFIX}{message_type}")
}

/// Extracts the message type from an artifact MIME type.
pub fn message_type_for_mime_type(mime_type: &str) -> Option<&str> {
    mime_type
        .strip_prefix(MESSAGE_PREFIX)
        .filter(|message| !message.is_empty())
}
