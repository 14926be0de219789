use super::{report, Context};
use crate::analysis::parse_document;
use crate::constants::DEFAULT_JOBS;
use crate::mime;
use crate::names::{self, LocationName, ResourceName, VersionName};
use crate::pool::{PoolSummary, Task};
use crate::registry::{Api, ApiSpec, ApiVersion, Registry, RegistryError};
use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use flate2::write::GzEncoder;
use flate2::Compression;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use walkdir::WalkDir;

#[derive(Subcommand, Debug)]
pub enum UploadCommands {
    /// Upload one spec file to a version
    Spec(SpecArgs),
    /// Upload every OpenAPI description found under directories
    Openapi(OpenApiArgs),
}

#[derive(Args, Debug)]
pub struct SpecArgs {
    pub file: PathBuf,
    /// Version that will own the spec
    #[arg(long)]
    pub parent: String,
    /// Spec identifier; defaults to the sanitized file name
    #[arg(long)]
    pub spec_id: Option<String>,
    /// MIME type; detected from the document when omitted
    #[arg(long)]
    pub mime_type: Option<String>,
}

#[derive(Args, Debug)]
pub struct OpenApiArgs {
    #[arg(required = true)]
    pub directories: Vec<PathBuf>,
    /// Location that will own the APIs, e.g. `projects/demo/locations/global`
    #[arg(long)]
    pub parent: String,
    /// Prefix for the source URI recorded on each spec
    #[arg(long)]
    pub base_uri: Option<String>,
    /// Number of files to upload in parallel
    #[arg(short, long, default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,
}

pub async fn run<C: Registry>(ctx: &Context<C>, cmd: UploadCommands) -> Result<()> {
    match cmd {
        UploadCommands::Spec(args) => upload_spec(ctx, args).await.map(|_| ()),
        UploadCommands::Openapi(args) => upload_openapi(ctx, args).await.map(|_| ()),
    }
}

static UNSUPPORTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9-.]").expect("sanitize regex is valid"));

/// Turns a path segment into an identifier: lowercase, separators to dashes,
/// anything else unsupported dropped.
pub fn sanitize(name: &str) -> String {
    let name = name.to_lowercase().replace([' ', ':', '_', '+'], "-");
    UNSUPPORTED.replace_all(&name, "").into_owned()
}

/// API and version identifiers derived from a spec path relative to the upload root.
pub fn ids_from_path(relative: &Path) -> Result<(String, String)> {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.len() < 3 {
        bail!("invalid API path: {}", relative.display());
    }
    let api = sanitize(&parts[..parts.len() - 2].join("-"));
    let version = sanitize(&parts[parts.len() - 2]);
    Ok((api, version))
}

/// OpenAPI major version implied by a file name, if it is one we upload.
fn openapi_version(path: &Path) -> Option<&'static str> {
    match path.file_name()?.to_str()? {
        "swagger.yaml" | "swagger.json" => Some("2"),
        "openapi.yaml" | "openapi.json" => Some("3"),
        _ => None,
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Guesses a spec MIME type from the file name or the document itself.
fn detect_mime_type(path: &Path, data: &[u8]) -> Result<String> {
    if path.extension().is_some_and(|ext| ext == "zip") {
        return Ok(mime::protobuf_mime_type("+zip"));
    }
    let guess = || -> Option<String> {
        let document = parse_document(data).ok()?;
        if let Some(version) = document.get("openapi").and_then(|v| v.as_str()) {
            return Some(mime::openapi_mime_type("", version));
        }
        if document.get("swagger").is_some() {
            return Some(mime::openapi_mime_type("", "2"));
        }
        if document.get("discoveryVersion").is_some() {
            return Some(mime::discovery_mime_type(""));
        }
        None
    };
    match guess() {
        Some(mime_type) => Ok(mime_type),
        None => bail!("cannot tell the format of {}; pass --mime-type", path.display()),
    }
}

/// Creates or replaces one spec. Gzip MIME types get compressed contents.
pub async fn upload_spec<C: Registry>(ctx: &Context<C>, args: SpecArgs) -> Result<ApiSpec> {
    let parent = ctx.pattern(&args.parent)?;
    let version = match (&parent.name, parent.collection) {
        (ResourceName::Version(version), false) => version.clone(),
        _ => bail!("--parent must name a single version, got {}", args.parent),
    };
    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let filename = args
        .file
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let spec_id = args.spec_id.clone().unwrap_or_else(|| sanitize(&filename));
    names::validate_id(&spec_id)?;
    let mime_type = match args.mime_type {
        Some(mime_type) => mime_type,
        None => detect_mime_type(&args.file, &data)?,
    };
    let contents = if mime::is_gzip(&mime_type) { gzip(&data)? } else { data };

    let spec = ApiSpec {
        name: version.spec(&spec_id).to_string(),
        filename,
        mime_type,
        contents,
        ..Default::default()
    };
    let stored = ctx
        .client
        .update(&spec, &["filename", "mime_type", "contents"], true)
        .await
        .with_context(|| format!("failed to upload {}", spec.name))?;
    println!("{}", stored.name);
    Ok(stored)
}

/// Walks each directory and uploads every OpenAPI file found through the pool.
pub async fn upload_openapi<C: Registry>(
    ctx: &Context<C>,
    args: OpenApiArgs,
) -> Result<PoolSummary> {
    let qualified = names::qualify(&args.parent, ctx.project.as_deref(), ctx.location.as_deref());
    let location = LocationName::parse(&qualified)
        .with_context(|| format!("--parent must name a project location, got {}", args.parent))?;
    let location = Arc::new(location);
    let base_uri = args.base_uri.map(Arc::<str>::from);

    let pool = ctx.pool(args.jobs);
    'walk: for root in &args.directories {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("failed to walk {}: {err}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(version) = openapi_version(entry.path()) else {
                continue;
            };
            let task = openapi_task(
                ctx.client.clone(),
                location.clone(),
                root.clone(),
                entry.into_path(),
                version,
                base_uri.clone(),
            );
            if let Err(err) = pool.submit(task).await {
                tracing::warn!("{err}");
                break 'walk;
            }
        }
    }
    let summary = pool.wait().await;
    report(&summary);
    Ok(summary)
}

fn openapi_task<C: Registry>(
    client: Arc<C>,
    location: Arc<LocationName>,
    root: PathBuf,
    path: PathBuf,
    version: &'static str,
    base_uri: Option<Arc<str>>,
) -> Task {
    Task::new(format!("upload openapi {}", path.display()), async move {
        let relative = path.strip_prefix(&root).unwrap_or(&path).to_path_buf();
        let (api_id, version_id) = ids_from_path(&relative)?;
        let api_name = location.api(&api_id);
        let version_name = api_name.version(&version_id);
        tracing::info!("uploading {}", version_name);

        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let title = parse_document(&data)
            .ok()
            .and_then(|doc| doc.get("info")?.get("title")?.as_str().map(str::to_string))
            .unwrap_or_default();

        let api = Api {
            name: api_name.to_string(),
            display_name: api_id.clone(),
            description: title,
            ..Default::default()
        };
        client.update(&api, &["display_name", "description"], true).await?;
        let api_version = ApiVersion {
            name: version_name.to_string(),
            display_name: version_id.clone(),
            ..Default::default()
        };
        client.update(&api_version, &["display_name"], true).await?;

        let filename = relative
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_uri = base_uri
            .as_deref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), relative.display()))
            .unwrap_or_default();
        upload_gzipped_spec(&*client, &version_name, filename, version, source_uri, &data).await
    })
}

/// Writes the spec unless the stored one already has the same contents.
async fn upload_gzipped_spec<C: Registry>(
    client: &C,
    version: &VersionName,
    filename: String,
    openapi_version: &str,
    source_uri: String,
    data: &[u8],
) -> Result<()> {
    let name = version.spec(&sanitize(&filename)).to_string();
    // The registry measures and hashes gzip specs after decompressing them.
    match client.get::<ApiSpec>(&name).await {
        Ok(existing)
            if existing.size_bytes as usize == data.len() && existing.hash == sha256_hex(data) =>
        {
            tracing::debug!("{name} is unchanged");
            return Ok(());
        }
        Ok(_) => {}
        Err(RegistryError::NotFound(_)) => {}
        Err(err) => return Err(err).with_context(|| format!("failed to get {name}")),
    }
    let spec = ApiSpec {
        name,
        filename,
        mime_type: mime::openapi_mime_type("+gzip", openapi_version),
        source_uri,
        contents: gzip(data)?,
        ..Default::default()
    };
    client
        .update(&spec, &["filename", "mime_type", "source_uri", "contents"], true)
        .await?;
    tracing::debug!("uploaded {}", spec.name);
    Ok(())
}
