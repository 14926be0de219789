use super::Context;
use crate::analysis::messages::Vocabulary;
use crate::analysis::vocabulary;
use crate::constants::VOCABULARY_MESSAGE;
use crate::mime;
use crate::names::Kind;
use crate::registry::{Artifact, Registry, Resource};
use crate::visitor::{self, set_artifact, Collector};
use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use prost::Message;
use std::io::Write;

#[derive(Subcommand, Debug)]
pub enum VocabularyCommands {
    /// Words used by any of the inputs
    Union(CombineArgs),
    /// Words used by every input
    Intersection(CombineArgs),
    /// Words of the first input that none of the others use
    Difference(CombineArgs),
    /// For each input, the words no other input uses
    Unique(UniqueArgs),
}

#[derive(Args, Debug)]
pub struct CombineArgs {
    /// Vocabulary artifact names or patterns
    #[arg(required = true)]
    pub artifacts: Vec<String>,
    /// Filter passed to list calls
    #[arg(long, default_value = "")]
    pub filter: String,
    /// Artifact that receives the result; printed as JSON when omitted
    #[arg(long)]
    pub output: Option<String>,
}

#[derive(Args, Debug)]
pub struct UniqueArgs {
    /// Vocabulary artifact names or patterns
    #[arg(required = true)]
    pub artifacts: Vec<String>,
    /// Filter passed to list calls
    #[arg(long, default_value = "")]
    pub filter: String,
    /// Print results instead of storing them next to their inputs
    #[arg(long)]
    pub dry_run: bool,
}

/// A vocabulary read from the registry with the artifact it came from.
#[derive(Debug, Clone)]
pub struct Input {
    pub name: String,
    pub vocabulary: Vocabulary,
}

pub async fn run<C: Registry>(
    ctx: &Context<C>,
    cmd: VocabularyCommands,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let (args, combine): (CombineArgs, fn(&[Vocabulary]) -> Vocabulary) = match cmd {
        VocabularyCommands::Union(args) => (args, vocabulary::union),
        VocabularyCommands::Intersection(args) => (args, vocabulary::intersection),
        VocabularyCommands::Difference(args) => (args, vocabulary::difference),
        VocabularyCommands::Unique(args) => return unique(ctx, args, out).await,
    };

    let inputs = collect(ctx, &args.artifacts, &args.filter).await?;
    let vocabularies: Vec<Vocabulary> = inputs.into_iter().map(|i| i.vocabulary).collect();
    let result = combine(&vocabularies);
    match args.output {
        Some(output) => {
            let pattern = ctx.pattern(&output)?;
            if pattern.kind() != Kind::Artifact || pattern.collection {
                bail!("--output must name a single artifact");
            }
            store(&*ctx.client, pattern.to_string(), &result).await
        }
        None => {
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
            Ok(())
        }
    }
}

async fn unique<C: Registry>(
    ctx: &Context<C>,
    args: UniqueArgs,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let inputs = collect(ctx, &args.artifacts, &args.filter).await?;
    let vocabularies: Vec<Vocabulary> = inputs.iter().map(|i| i.vocabulary.clone()).collect();
    for (input, result) in inputs.iter().zip(vocabulary::unique(&vocabularies)) {
        let name = format!("{}-unique", input.name);
        if args.dry_run {
            writeln!(out, "{name}\n{}", serde_json::to_string_pretty(&result)?)?;
        } else {
            store(&*ctx.client, name, &result).await?;
        }
    }
    Ok(())
}

/// Reads every vocabulary artifact matching `patterns`, in argument order.
///
/// Artifacts holding other message types are skipped.
pub async fn collect<C: Registry>(
    ctx: &Context<C>,
    patterns: &[String],
    filter: &str,
) -> Result<Vec<Input>> {
    let mut inputs = Vec::new();
    for input in patterns {
        let pattern = ctx.pattern(input)?;
        if pattern.kind() != Kind::Artifact {
            bail!("{} does not name artifacts", pattern);
        }
        let filter = if pattern.collection { filter } else { "" };
        let mut collector = Collector::default();
        visitor::visit(&*ctx.client, &pattern, filter, &ctx.cancellation, &mut collector)
            .await?;

        for resource in collector.resources {
            let Resource::Artifact(artifact) = resource else {
                continue;
            };
            if mime::message_type_for_mime_type(&artifact.mime_type) != Some(VOCABULARY_MESSAGE) {
                tracing::info!("skipping, not a vocabulary: {}", artifact.name);
                continue;
            }
            let contents = ctx
                .client
                .get_contents(&artifact.name, false)
                .await
                .with_context(|| format!("failed to get contents of {}", artifact.name))?;
            let vocabulary = Vocabulary::decode(contents.data)
                .with_context(|| format!("{} is not a valid vocabulary", artifact.name))?;
            inputs.push(Input {
                name: artifact.name,
                vocabulary,
            });
        }
    }
    if inputs.is_empty() {
        bail!("no vocabularies found");
    }
    tracing::debug!(count = inputs.len(), "collected vocabularies");
    Ok(inputs)
}

async fn store<C: Registry>(client: &C, name: String, vocabulary: &Vocabulary) -> Result<()> {
    let artifact = Artifact {
        name,
        mime_type: mime::mime_type_for_message_type(VOCABULARY_MESSAGE),
        contents: vocabulary.encode_to_vec(),
        ..Default::default()
    };
    set_artifact(client, &artifact).await?;
    tracing::debug!(artifact = %artifact.name, "stored");
    Ok(())
}
