use super::{report, Context};
use crate::constants::DEFAULT_JOBS;
use crate::pool::{PoolSummary, Task};
use crate::registry::Registry;
use crate::visitor::{self, Collector};
use anyhow::{bail, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Resource name or pattern
    pub pattern: String,
    /// Filter passed to list calls
    #[arg(long, default_value = "")]
    pub filter: String,
    /// Also delete child resources
    #[arg(long)]
    pub force: bool,
    /// Number of deletions to run in parallel
    #[arg(short, long, default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,
}

/// Collects every match first, so deletions never race the listing.
pub async fn run<C: Registry>(ctx: &Context<C>, args: DeleteArgs) -> Result<PoolSummary> {
    let pattern = ctx.pattern(&args.pattern)?;
    let mut collector = Collector::default();
    visitor::visit(&*ctx.client, &pattern, &args.filter, &ctx.cancellation, &mut collector).await?;
    if collector.resources.is_empty() {
        bail!("no resources found");
    }

    let pool = ctx.pool(args.jobs);
    for resource in collector.resources {
        let client = ctx.client.clone();
        let name = resource.name().to_string();
        let force = args.force;
        let task = Task::new(format!("delete {name}"), async move {
            client.delete(&name, force).await?;
            Ok(())
        });
        if let Err(err) = pool.submit(task).await {
            tracing::warn!("{err}");
            break;
        }
    }
    let summary = pool.wait().await;
    report(&summary);
    Ok(summary)
}
