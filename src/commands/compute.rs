use super::Context;
use crate::analysis::lint::LintPlugin;
use crate::analysis::{complexity, vocabulary, SpecFormat};
use crate::constants::{
    COMPLEXITY_MESSAGE, COMPLEXITY_RELATION, DEFAULT_JOBS, LINT_MESSAGE, VOCABULARY_MESSAGE,
    VOCABULARY_RELATION,
};
use crate::mime;
use crate::names::Kind;
use crate::pool::{PoolSummary, Task};
use crate::registry::{ApiSpec, Artifact, Registry, Resource};
use crate::visitor::{fetch_spec_contents, set_artifact, SpecContents};
use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use prost::Message;
use serde::Serialize;
use std::sync::Arc;

#[derive(Subcommand, Debug)]
pub enum ComputeCommands {
    /// Count paths, operations, schemas and properties of specs
    Complexity(ComputeArgs),
    /// Collect the names used by specs
    Vocabulary(ComputeArgs),
    /// Run a lint plugin over specs
    Lint(LintArgs),
}

#[derive(Args, Debug)]
pub struct ComputeArgs {
    /// Spec name or pattern, e.g. `apis/-/versions/-/specs/-`
    pub pattern: String,
    /// Filter passed to list calls
    #[arg(long, default_value = "")]
    pub filter: String,
    /// Number of specs to process in parallel
    #[arg(short, long, default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,
    /// Print results instead of storing them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct LintArgs {
    #[command(flatten)]
    pub common: ComputeArgs,
    /// Plugin to run; the executable is `registry-lint-<linter>`
    #[arg(long)]
    pub linter: String,
    /// Keep the directories the plugin was given
    #[arg(long)]
    pub debug: bool,
}

/// What a compute task derives from a spec.
#[derive(Debug, Clone)]
pub enum Computation {
    Complexity,
    Vocabulary,
    Lint(LintPlugin),
}

impl Computation {
    fn description(&self, spec: &str) -> String {
        match self {
            Computation::Complexity => format!("compute complexity {spec}"),
            Computation::Vocabulary => format!("compute vocabulary {spec}"),
            Computation::Lint(plugin) => format!("compute {spec}/{}", plugin.relation()),
        }
    }

    async fn compute<C: Registry>(&self, client: &C, spec: &ApiSpec, dry_run: bool) -> Result<()> {
        let contents = fetch_spec_contents(client, spec).await?;
        match self {
            Computation::Complexity => {
                let format = detect(spec, &contents)?;
                let summary = complexity::summarize(format, &contents.data)
                    .with_context(|| format.parse_error(&spec.name))?;
                let relation = COMPLEXITY_RELATION;
                store(client, spec, relation, COMPLEXITY_MESSAGE, &summary, dry_run).await
            }
            Computation::Vocabulary => {
                let format = detect(spec, &contents)?;
                let summary = vocabulary::summarize(format, &contents.data)
                    .with_context(|| format.parse_error(&spec.name))?;
                let relation = VOCABULARY_RELATION;
                store(client, spec, relation, VOCABULARY_MESSAGE, &summary, dry_run).await
            }
            Computation::Lint(plugin) => {
                let lint = plugin.lint(&spec.name, &spec.filename, &contents).await?;
                store(client, spec, &plugin.relation(), LINT_MESSAGE, &lint, dry_run).await
            }
        }
    }
}

fn detect(spec: &ApiSpec, contents: &SpecContents) -> Result<SpecFormat> {
    match SpecFormat::detect(&contents.mime_type) {
        Some(format) => Ok(format),
        None => bail!("we don't know how to summarize {}", spec.name),
    }
}

/// Stores `summary` as `<spec>/artifacts/<relation>`, or prints it on a dry run.
async fn store<C, M>(
    client: &C,
    spec: &ApiSpec,
    relation: &str,
    message_type: &str,
    summary: &M,
    dry_run: bool,
) -> Result<()>
where
    C: Registry,
    M: Message + Serialize,
{
    let name = format!("{}/artifacts/{}", spec.name, relation);
    if dry_run {
        println!("{name}\n{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    let artifact = Artifact {
        name,
        mime_type: mime::mime_type_for_message_type(message_type),
        contents: summary.encode_to_vec(),
        ..Default::default()
    };
    set_artifact(client, &artifact).await?;
    tracing::debug!(artifact = %artifact.name, "stored");
    Ok(())
}

/// Builds the task that computes one artifact for one spec.
pub fn compute_task<C: Registry>(
    client: Arc<C>,
    spec: ApiSpec,
    computation: Computation,
    dry_run: bool,
) -> Task {
    let description = computation.description(&spec.name);
    Task::new(description, async move {
        computation.compute(&*client, &spec, dry_run).await
    })
}

pub async fn run<C: Registry>(ctx: &Context<C>, cmd: ComputeCommands) -> Result<PoolSummary> {
    let (args, computation) = match cmd {
        ComputeCommands::Complexity(args) => (args, Computation::Complexity),
        ComputeCommands::Vocabulary(args) => (args, Computation::Vocabulary),
        ComputeCommands::Lint(lint) => {
            if lint.linter.is_empty() {
                bail!("--linter must name a lint plugin");
            }
            let plugin = LintPlugin::for_linter(&lint.linter).keep_dir(lint.debug);
            (lint.common, Computation::Lint(plugin))
        }
    };
    compute(ctx, args, computation).await
}

/// Runs `computation` over every spec matching the arguments.
pub async fn compute<C: Registry>(
    ctx: &Context<C>,
    args: ComputeArgs,
    computation: Computation,
) -> Result<PoolSummary> {
    let pattern = ctx.pattern(&args.pattern)?;
    if pattern.kind() != Kind::Spec {
        bail!("{} does not name specs", pattern);
    }
    let client = ctx.client.clone();
    let dry_run = args.dry_run;
    ctx.run_tasks(&pattern, &args.filter, args.jobs, move |resource| match resource {
        Resource::Spec(spec) => {
            Some(compute_task(client.clone(), spec, computation.clone(), dry_run))
        }
        _ => None,
    })
    .await
}
