//! Registry resources as exchanged over the HTTP/JSON interface.

use crate::mime;
use crate::names::Kind;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::io::Read;

/// Key/value metadata attached to a resource.
pub type Metadata = BTreeMap<String, String>;

/// Describes how a resource type is addressed by the registry API.
pub trait RegistryResource:
    Serialize + DeserializeOwned + Clone + Send + Sync + std::fmt::Debug + 'static
{
    const KIND: Kind;
    /// Field holding the items in a list response.
    const LIST_FIELD: &'static str;
    /// Query parameter carrying the identifier on create.
    const ID_PARAM: &'static str;

    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn into_resource(self) -> Resource;
}

/// Resources that carry labels and annotations.
pub trait Labeled: RegistryResource {
    fn labels(&self) -> &Metadata;
    fn labels_mut(&mut self) -> &mut Metadata;
    fn annotations(&self) -> &Metadata;
    fn annotations_mut(&mut self) -> &mut Metadata;
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Api {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recommended_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recommended_deployment: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub labels: Metadata,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub annotations: Metadata,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersion {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_spec: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub labels: Metadata,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub annotations: Metadata,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revision_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size_bytes: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_uri: String,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<u8>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub labels: Metadata,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub annotations: Metadata,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiDeployment {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revision_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_spec_revision: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint_uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_channel_uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub intended_audience: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_guidance: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub labels: Metadata,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub annotations: Metadata,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size_bytes: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<u8>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub labels: Metadata,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub annotations: Metadata,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

macro_rules! registry_resource {
    ($ty:ty, $kind:expr, $field:literal, $param:literal, $variant:ident) => {
        impl RegistryResource for $ty {
            const KIND: Kind = $kind;
            const LIST_FIELD: &'static str = $field;
            const ID_PARAM: &'static str = $param;

            fn name(&self) -> &str {
                &self.name
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }

            fn into_resource(self) -> Resource {
                Resource::$variant(self)
            }
        }
    };
}

macro_rules! labeled {
    ($ty:ty) => {
        impl Labeled for $ty {
            fn labels(&self) -> &Metadata {
                &self.labels
            }
            fn labels_mut(&mut self) -> &mut Metadata {
                &mut self.labels
            }
            fn annotations(&self) -> &Metadata {
                &self.annotations
            }
            fn annotations_mut(&mut self) -> &mut Metadata {
                &mut self.annotations
            }
        }
    };
}

registry_resource!(Project, Kind::Project, "projects", "projectId", Project);
registry_resource!(Api, Kind::Api, "apis", "apiId", Api);
registry_resource!(ApiVersion, Kind::Version, "apiVersions", "apiVersionId", Version);
registry_resource!(ApiSpec, Kind::Spec, "apiSpecs", "apiSpecId", Spec);
registry_resource!(
    ApiDeployment,
    Kind::Deployment,
    "apiDeployments",
    "apiDeploymentId",
    Deployment
);
registry_resource!(Artifact, Kind::Artifact, "artifacts", "artifactId", Artifact);

labeled!(Api);
labeled!(ApiVersion);
labeled!(ApiSpec);
labeled!(ApiDeployment);

/// Any resource returned by a visit.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Resource {
    Project(Project),
    Api(Api),
    Version(ApiVersion),
    Spec(ApiSpec),
    Deployment(ApiDeployment),
    Artifact(Artifact),
}

impl Resource {
    pub fn name(&self) -> &str {
        match self {
            Resource::Project(r) => &r.name,
            Resource::Api(r) => &r.name,
            Resource::Version(r) => &r.name,
            Resource::Spec(r) => &r.name,
            Resource::Deployment(r) => &r.name,
            Resource::Artifact(r) => &r.name,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Resource::Project(_) => Kind::Project,
            Resource::Api(_) => Kind::Api,
            Resource::Version(_) => Kind::Version,
            Resource::Spec(_) => Kind::Spec,
            Resource::Deployment(_) => Kind::Deployment,
            Resource::Artifact(_) => Kind::Artifact,
        }
    }
}

/// One page of a list response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Empty when there are no further pages.
    pub next_page_token: String,
}

/// Raw contents of a spec or artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Contents {
    pub mime_type: String,
    pub data: bytes::Bytes,
}

impl Contents {
    /// Removes gzip compression when the MIME type is `+gzip` marked.
    pub fn uncompressed(self) -> std::io::Result<Contents> {
        if !mime::is_gzip(&self.mime_type) {
            return Ok(self);
        }
        Ok(Contents {
            data: gunzip(&self.data)?.into(),
            mime_type: mime::gunzipped_type(&self.mime_type),
        })
    }
}

pub fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(data).read_to_end(&mut decoded)?;
    Ok(decoded)
}

mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
