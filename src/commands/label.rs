use super::Context;
use crate::constants::DEFAULT_JOBS;
use crate::labeling::{patch_task, Field, Labeling};
use crate::names::Kind;
use crate::pool::PoolSummary;
use crate::registry::{Registry, Resource};
use anyhow::{bail, Result};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct LabelArgs {
    /// APIs, versions, specs or deployments to patch
    pub pattern: String,
    /// `key=value` to set a key, `key-` to remove it
    #[arg(required = true)]
    pub operations: Vec<String>,
    /// Filter passed to list calls
    #[arg(long, default_value = "")]
    pub filter: String,
    /// Replace values of keys that are already set
    #[arg(long)]
    pub overwrite: bool,
    /// Number of updates to run in parallel
    #[arg(short, long, default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,
}

pub async fn run<C: Registry>(ctx: &Context<C>, args: LabelArgs) -> Result<PoolSummary> {
    patch(ctx, args, Field::Labels).await
}

/// Applies one labeling to every match, one update per resource.
pub async fn patch<C: Registry>(
    ctx: &Context<C>,
    args: LabelArgs,
    field: Field,
) -> Result<PoolSummary> {
    let labeling = Arc::new(Labeling::parse(&args.operations, args.overwrite)?);
    let pattern = ctx.pattern(&args.pattern)?;
    match pattern.kind() {
        Kind::Project => bail!("projects do not have {field}"),
        Kind::Artifact => {
            bail!("artifacts cannot be patched; their {field} change only when they are replaced")
        }
        _ => {}
    }

    let client = ctx.client.clone();
    ctx.run_tasks(&pattern, &args.filter, args.jobs, move |resource| {
        let client = client.clone();
        let labeling = labeling.clone();
        match resource {
            Resource::Api(r) => Some(patch_task(client, r, labeling, field)),
            Resource::Version(r) => Some(patch_task(client, r, labeling, field)),
            Resource::Spec(r) => Some(patch_task(client, r, labeling, field)),
            Resource::Deployment(r) => Some(patch_task(client, r, labeling, field)),
            other => {
                tracing::debug!("skipping {}", other.name());
                None
            }
        }
    })
    .await
}
