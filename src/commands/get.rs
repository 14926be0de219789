use super::Context;
use crate::analysis::messages;
use crate::mime;
use crate::names::Kind;
use crate::registry::{Registry, RegistryError, Resource};
use crate::visitor::{self, Collector, Handler};
use anyhow::{bail, Result};
use async_trait::async_trait;
use clap::{Args, ValueEnum};
use std::io::Write;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Resource name or pattern, e.g. `apis/-/versions/-/specs`
    pub pattern: String,
    /// Filter passed to list calls
    #[arg(long, default_value = "")]
    pub filter: String,
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Output::Name)]
    pub output: Output,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Name,
    Yaml,
    Json,
    /// Contents of a single spec or artifact; known artifact messages print as JSON
    Contents,
}

/// Writes each resource name as it is visited.
pub(crate) struct NamePrinter<'a> {
    pub out: &'a mut (dyn Write + Send),
}

#[async_trait]
impl<'a> Handler for NamePrinter<'a> {
    async fn handle(&mut self, resource: Resource) -> Result<()> {
        writeln!(self.out, "{}", resource.name())?;
        Ok(())
    }
}

pub async fn run<C: Registry>(
    ctx: &Context<C>,
    args: GetArgs,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let pattern = ctx.pattern(&args.pattern)?;
    let client = &*ctx.client;

    let visited = match args.output {
        Output::Name => {
            let mut printer = NamePrinter { out };
            visitor::visit(client, &pattern, &args.filter, &ctx.cancellation, &mut printer).await
        }
        Output::Yaml | Output::Json => {
            let mut collector = Collector::default();
            let visited =
                visitor::visit(client, &pattern, &args.filter, &ctx.cancellation, &mut collector)
                    .await;
            if visited.is_ok() {
                write_resources(out, &collector.resources, args.output, pattern.collection)?;
            }
            visited
        }
        Output::Contents => {
            if pattern.collection || !matches!(pattern.kind(), Kind::Spec | Kind::Artifact) {
                bail!("contents can only be printed for a single spec or artifact");
            }
            let mut collector = Collector::default();
            let visited =
                visitor::visit(client, &pattern, &args.filter, &ctx.cancellation, &mut collector)
                    .await;
            if visited.is_ok() {
                for resource in &collector.resources {
                    write_contents(client, resource, out).await?;
                }
            }
            visited
        }
    };

    match visited {
        Err(err) if !pattern.collection && is_not_found(&err) => {
            eprintln!("Not Found");
            Ok(())
        }
        Err(err) => Err(err),
        Ok(count) => {
            tracing::debug!(count, "visited {}", pattern);
            Ok(())
        }
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RegistryError>()
        .is_some_and(RegistryError::is_not_found)
}

fn write_resources(
    out: &mut (dyn Write + Send),
    resources: &[Resource],
    output: Output,
    many: bool,
) -> Result<()> {
    match (output, many, resources) {
        (Output::Json, false, [one]) => writeln!(out, "{}", serde_json::to_string_pretty(one)?)?,
        (Output::Json, _, all) => writeln!(out, "{}", serde_json::to_string_pretty(all)?)?,
        (_, false, [one]) => write!(out, "{}", serde_yaml::to_string(one)?)?,
        (_, _, all) => write!(out, "{}", serde_yaml::to_string(all)?)?,
    }
    Ok(())
}

async fn write_contents<C: Registry>(
    client: &C,
    resource: &Resource,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let data = match resource {
        Resource::Spec(spec) => visitor::fetch_spec_contents(client, spec).await?.data,
        other => {
            let contents = client.get_contents(other.name(), false).await?;
            let rendered = match mime::message_type_for_mime_type(&contents.mime_type) {
                Some(message_type) => messages::to_json(message_type, &contents.data)?,
                None => None,
            };
            match rendered {
                Some(json) => {
                    writeln!(out, "{json}")?;
                    return Ok(());
                }
                None => contents.data.to_vec(),
            }
        }
    };
    out.write_all(&data)?;
    Ok(())
}
