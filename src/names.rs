//! Resource names and the pattern grammar used by every resource command.
//!
//! A pattern is a resource name in which any segment may be the wildcard `-`,
//! or which stops at a collection segment (`.../specs`). Parsing yields a
//! typed [`ResourceName`] plus a flag telling the visitor whether to list or
//! get.
//!
//! The `locations/<id>` segment is optional in input. Names are always
//! rendered in canonical form with the location included.

use crate::constants::DEFAULT_LOCATION;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Wildcard segment accepted anywhere an identifier is expected.
pub const WILDCARD: &str = "-";

const IDENTIFIER: &str = "([a-z0-9-.]+)";
const LOCATION: &str = "(?:/locations/([a-z0-9-.]+))?";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("unsupported resource name {0}")]
    Unsupported(String),
    #[error("invalid identifier {id:?}: {reason}")]
    InvalidIdentifier { id: String, reason: &'static str },
}

/// The resource kinds a pattern can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Project,
    Api,
    Version,
    Spec,
    Deployment,
    Artifact,
}

impl Kind {
    /// Collection segment naming resources of this kind under their parent.
    pub fn collection(self) -> &'static str {
        match self {
            Kind::Project => "projects",
            Kind::Api => "apis",
            Kind::Version => "versions",
            Kind::Spec => "specs",
            Kind::Deployment => "deployments",
            Kind::Artifact => "artifacts",
        }
    }

    /// Filter field matching the leaf identifier of this kind.
    pub fn id_field(self) -> &'static str {
        match self {
            Kind::Project => "project_id",
            Kind::Api => "api_id",
            Kind::Version => "version_id",
            Kind::Spec => "spec_id",
            Kind::Deployment => "deployment_id",
            Kind::Artifact => "artifact_id",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Project => "project",
            Kind::Api => "api",
            Kind::Version => "version",
            Kind::Spec => "spec",
            Kind::Deployment => "deployment",
            Kind::Artifact => "artifact",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectName {
    pub project: String,
}

/// A project plus location; the parent of APIs and project-level artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationName {
    pub project: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiName {
    pub project: String,
    pub location: String,
    pub api: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionName {
    pub project: String,
    pub location: String,
    pub api: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecName {
    pub project: String,
    pub location: String,
    pub api: String,
    pub version: String,
    pub spec: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentName {
    pub project: String,
    pub location: String,
    pub api: String,
    pub deployment: String,
}

/// Resources that may own artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactParent {
    Location(LocationName),
    Api(ApiName),
    Version(VersionName),
    Spec(SpecName),
    Deployment(DeploymentName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub parent: ArtifactParent,
    pub artifact: String,
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}", self.project)
    }
}

impl fmt::Display for LocationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/locations/{}", self.project, self.location)
    }
}

impl fmt::Display for ApiName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/apis/{}",
            self.project, self.location, self.api
        )
    }
}

impl fmt::Display for VersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/versions/{}", self.api_name(), self.version)
    }
}

impl fmt::Display for SpecName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/specs/{}", self.version_name(), self.spec)
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/deployments/{}", self.api_name(), self.deployment)
    }
}

impl fmt::Display for ArtifactParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactParent::Location(n) => n.fmt(f),
            ArtifactParent::Api(n) => n.fmt(f),
            ArtifactParent::Version(n) => n.fmt(f),
            ArtifactParent::Spec(n) => n.fmt(f),
            ArtifactParent::Deployment(n) => n.fmt(f),
        }
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/artifacts/{}", self.parent, self.artifact)
    }
}

static LOCATION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^projects/{IDENTIFIER}{LOCATION}$")).expect("location regex is valid")
});

impl LocationName {
    /// Parses `projects/<p>[/locations/<l>]`; wildcards are not allowed.
    pub fn parse(input: &str) -> Result<Self, NameError> {
        let unsupported = || NameError::Unsupported(input.to_string());
        let caps = LOCATION_NAME.captures(input).ok_or_else(unsupported)?;
        let name = LocationName {
            project: caps[1].to_string(),
            location: caps.get(2).map_or(DEFAULT_LOCATION, |m| m.as_str()).to_string(),
        };
        if name.project == WILDCARD || name.location == WILDCARD {
            return Err(unsupported());
        }
        Ok(name)
    }

    pub fn api(&self, api: &str) -> ApiName {
        ApiName {
            project: self.project.clone(),
            location: self.location.clone(),
            api: api.to_string(),
        }
    }
}

impl ApiName {
    pub fn location_name(&self) -> LocationName {
        LocationName {
            project: self.project.clone(),
            location: self.location.clone(),
        }
    }

    pub fn version(&self, version: &str) -> VersionName {
        VersionName {
            project: self.project.clone(),
            location: self.location.clone(),
            api: self.api.clone(),
            version: version.to_string(),
        }
    }
}

impl VersionName {
    pub fn api_name(&self) -> ApiName {
        ApiName {
            project: self.project.clone(),
            location: self.location.clone(),
            api: self.api.clone(),
        }
    }

    pub fn spec(&self, spec: &str) -> SpecName {
        SpecName {
            project: self.project.clone(),
            location: self.location.clone(),
            api: self.api.clone(),
            version: self.version.clone(),
            spec: spec.to_string(),
        }
    }
}

impl SpecName {
    pub fn version_name(&self) -> VersionName {
        VersionName {
            project: self.project.clone(),
            location: self.location.clone(),
            api: self.api.clone(),
            version: self.version.clone(),
        }
    }

    /// Name of the artifact that holds a value derived from this spec.
    pub fn artifact(&self, relation: &str) -> ArtifactName {
        ArtifactName {
            parent: ArtifactParent::Spec(self.clone()),
            artifact: relation.to_string(),
        }
    }
}

impl DeploymentName {
    pub fn api_name(&self) -> ApiName {
        ApiName {
            project: self.project.clone(),
            location: self.location.clone(),
            api: self.api.clone(),
        }
    }
}

/// A typed resource name; the leaf identifier may be empty (a collection) or `-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceName {
    Project(ProjectName),
    Api(ApiName),
    Version(VersionName),
    Spec(SpecName),
    Deployment(DeploymentName),
    Artifact(ArtifactName),
}

impl ResourceName {
    pub fn kind(&self) -> Kind {
        match self {
            ResourceName::Project(_) => Kind::Project,
            ResourceName::Api(_) => Kind::Api,
            ResourceName::Version(_) => Kind::Version,
            ResourceName::Spec(_) => Kind::Spec,
            ResourceName::Deployment(_) => Kind::Deployment,
            ResourceName::Artifact(_) => Kind::Artifact,
        }
    }

    /// The leaf identifier.
    pub fn id(&self) -> &str {
        match self {
            ResourceName::Project(n) => &n.project,
            ResourceName::Api(n) => &n.api,
            ResourceName::Version(n) => &n.version,
            ResourceName::Spec(n) => &n.spec,
            ResourceName::Deployment(n) => &n.deployment,
            ResourceName::Artifact(n) => &n.artifact,
        }
    }

    /// Name of the resource under which this one is listed; empty for projects.
    pub fn parent(&self) -> String {
        match self {
            ResourceName::Project(_) => String::new(),
            ResourceName::Api(n) => n.location_name().to_string(),
            ResourceName::Version(n) => n.api_name().to_string(),
            ResourceName::Spec(n) => n.version_name().to_string(),
            ResourceName::Deployment(n) => n.api_name().to_string(),
            ResourceName::Artifact(n) => n.parent.to_string(),
        }
    }

    /// Path of the collection containing this resource, e.g. `.../versions/v1/specs`.
    pub fn collection_path(&self) -> String {
        let parent = self.parent();
        if parent.is_empty() {
            self.kind().collection().to_string()
        } else {
            format!("{}/{}", parent, self.kind().collection())
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceName::Project(n) => n.fmt(f),
            ResourceName::Api(n) => n.fmt(f),
            ResourceName::Version(n) => n.fmt(f),
            ResourceName::Spec(n) => n.fmt(f),
            ResourceName::Deployment(n) => n.fmt(f),
            ResourceName::Artifact(n) => n.fmt(f),
        }
    }
}

/// A parsed user pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub name: ResourceName,
    /// True when the pattern must be listed rather than fetched.
    pub collection: bool,
}

impl Pattern {
    pub fn parse(input: &str) -> Result<Self, NameError> {
        for grammar in GRAMMARS.iter() {
            let Some(caps) = grammar.regex.captures(input) else {
                continue;
            };
            let project = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let location = caps
                .get(2)
                .map_or(DEFAULT_LOCATION, |m| m.as_str())
                .to_string();
            let mut ids: Vec<String> = caps
                .iter()
                .skip(3)
                .map(|m| m.map_or("", |m| m.as_str()).to_string())
                .collect();
            if grammar.collection && !grammar.path.is_empty() {
                ids.push(String::new());
            }
            let name = build_name(project, location, grammar.path, ids)
                .ok_or_else(|| NameError::Unsupported(input.to_string()))?;
            let collection = grammar.collection || has_wildcard(input);
            return Ok(Pattern { name, collection });
        }
        Err(NameError::Unsupported(input.to_string()))
    }

    pub fn kind(&self) -> Kind {
        self.name.kind()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.id().is_empty() {
            f.write_str(&self.name.collection_path())
        } else {
            self.name.fmt(f)
        }
    }
}

fn has_wildcard(input: &str) -> bool {
    input.split('/').any(|segment| segment == WILDCARD)
}

struct Grammar {
    regex: Regex,
    /// Collection segments after `projects/<id>`, outermost first.
    path: &'static [&'static str],
    collection: bool,
}

const PATHS: &[&[&str]] = &[
    &["apis"],
    &["apis", "versions"],
    &["apis", "versions", "specs"],
    &["apis", "deployments"],
    &["artifacts"],
    &["apis", "artifacts"],
    &["apis", "versions", "artifacts"],
    &["apis", "versions", "specs", "artifacts"],
    &["apis", "deployments", "artifacts"],
];

impl Grammar {
    fn new(path: &'static [&'static str], collection: bool) -> Self {
        let mut pattern = if path.is_empty() && collection {
            "^projects".to_string()
        } else {
            format!("^projects/{IDENTIFIER}")
        };
        if !path.is_empty() {
            pattern.push_str(LOCATION);
        }
        for (i, segment) in path.iter().enumerate() {
            pattern.push('/');
            pattern.push_str(segment);
            if i + 1 < path.len() || !collection {
                pattern.push('/');
                pattern.push_str(IDENTIFIER);
            }
        }
        pattern.push('$');
        let regex = Regex::new(&pattern).expect("name grammar is a valid regex");
        Grammar {
            regex,
            path,
            collection,
        }
    }
}

// Collections are tried before singletons.
static GRAMMARS: LazyLock<Vec<Grammar>> = LazyLock::new(|| {
    let mut grammars = vec![Grammar::new(&[], true)];
    grammars.extend(PATHS.iter().map(|path| Grammar::new(path, true)));
    grammars.push(Grammar::new(&[], false));
    grammars.extend(PATHS.iter().map(|path| Grammar::new(path, false)));
    grammars
});

fn build_name(
    project: String,
    location: String,
    path: &[&str],
    ids: Vec<String>,
) -> Option<ResourceName> {
    if let Some((&"artifacts", owner_path)) = path.split_last() {
        let (artifact, owner_ids) = ids.split_last()?;
        let parent = match build_owner(project, location, owner_path, owner_ids.to_vec())? {
            Owner::Location(n) => ArtifactParent::Location(n),
            Owner::Name(ResourceName::Api(n)) => ArtifactParent::Api(n),
            Owner::Name(ResourceName::Version(n)) => ArtifactParent::Version(n),
            Owner::Name(ResourceName::Spec(n)) => ArtifactParent::Spec(n),
            Owner::Name(ResourceName::Deployment(n)) => ArtifactParent::Deployment(n),
            Owner::Name(_) => return None,
        };
        return Some(ResourceName::Artifact(ArtifactName {
            parent,
            artifact: artifact.clone(),
        }));
    }
    match build_owner(project, location, path, ids)? {
        Owner::Location(n) => Some(ResourceName::Project(ProjectName { project: n.project })),
        Owner::Name(name) => Some(name),
    }
}

enum Owner {
    Location(LocationName),
    Name(ResourceName),
}

fn build_owner(
    project: String,
    location: String,
    path: &[&str],
    ids: Vec<String>,
) -> Option<Owner> {
    let mut ids = ids.into_iter();
    let owner = match path {
        [] => Owner::Location(LocationName { project, location }),
        ["apis"] => Owner::Name(ResourceName::Api(ApiName {
            project,
            location,
            api: ids.next()?,
        })),
        ["apis", "versions"] => Owner::Name(ResourceName::Version(VersionName {
            project,
            location,
            api: ids.next()?,
            version: ids.next()?,
        })),
        ["apis", "versions", "specs"] => Owner::Name(ResourceName::Spec(SpecName {
            project,
            location,
            api: ids.next()?,
            version: ids.next()?,
            spec: ids.next()?,
        })),
        ["apis", "deployments"] => Owner::Name(ResourceName::Deployment(DeploymentName {
            project,
            location,
            api: ids.next()?,
            deployment: ids.next()?,
        })),
        _ => return None,
    };
    Some(owner)
}

/// Qualifies a project-relative pattern with `projects/<project>/locations/<location>/`.
///
/// Names that already start with `projects` are returned unchanged, as are
/// relative names when no project is configured.
pub fn qualify(pattern: &str, project: Option<&str>, location: Option<&str>) -> String {
    if pattern == "projects" || pattern.starts_with("projects/") {
        return pattern.to_string();
    }
    match project {
        Some(project) if !project.is_empty() => format!(
            "projects/{}/locations/{}/{}",
            project,
            location.unwrap_or(DEFAULT_LOCATION),
            pattern.trim_start_matches('/')
        ),
        _ => pattern.to_string(),
    }
}

static CUSTOM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-z0-9-.]+$").expect("identifier regex is valid"));
static UUID_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("uuid regex is valid")
});

/// Checks a user-supplied identifier before it is used to create a resource.
pub fn validate_id(id: &str) -> Result<(), NameError> {
    let invalid = |reason| {
        Err(NameError::InvalidIdentifier {
            id: id.to_string(),
            reason,
        })
    };
    if id.is_empty() {
        invalid("identifier must be nonempty")
    } else if !CUSTOM_ID.is_match(id) {
        invalid("must contain only lowercase letters, digits, dashes and dots")
    } else if UUID_FORMAT.is_match(id) {
        invalid("must not match UUID format")
    } else if id.len() > 80 {
        invalid("must be 80 characters or less")
    } else if id.starts_with(['-', '.']) {
        invalid("must begin with a number or letter")
    } else if id.ends_with(['-', '.']) {
        invalid("must end with a number or letter")
    } else {
        Ok(())
    }
}
