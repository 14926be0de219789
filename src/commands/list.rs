use super::get::NamePrinter;
use super::Context;
use crate::registry::Registry;
use crate::visitor;
use anyhow::Result;
use clap::Args;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Collection or wildcard pattern, e.g. `projects/p/locations/global/apis`
    pub pattern: String,
    /// Filter passed to list calls
    #[arg(long, default_value = "")]
    pub filter: String,
}

pub async fn run<C: Registry>(
    ctx: &Context<C>,
    args: ListArgs,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let pattern = ctx.pattern(&args.pattern)?;
    let mut printer = NamePrinter { out };
    let count =
        visitor::visit(&*ctx.client, &pattern, &args.filter, &ctx.cancellation, &mut printer)
            .await?;
    tracing::info!(count, "listed {}", pattern);
    Ok(())
}
