use crate::cancel::Cancellation;
use crate::config::{ConfigStore, ConnectionArgs, RegistrySettings};
use crate::names::{self, Pattern};
use crate::pool::{PoolSummary, Task, WorkerPool};
use crate::registry::http::HttpRegistry;
use crate::registry::{Registry, Resource};
use crate::visitor::{self, Handler};
use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use clap::Subcommand;
use clap_complete::Shell;
use std::sync::Arc;

pub mod annotate;
pub mod completions;
pub mod compute;
pub mod config;
pub mod delete;
pub mod get;
pub mod label;
pub mod list;
pub mod upload;
pub mod vocabulary;

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Print resources matching a name or pattern")]
    Get(get::GetArgs),
    #[command(about = "Print the names of resources matching a pattern")]
    List(list::ListArgs),
    #[command(about = "Delete every resource matching a pattern")]
    Delete(delete::DeleteArgs),
    #[command(about = "Set or clear labels on matching resources")]
    Label(label::LabelArgs),
    #[command(about = "Set or clear annotations on matching resources")]
    Annotate(label::LabelArgs),
    #[command(about = "Compute properties of specs and store them as artifacts")]
    Compute {
        #[command(subcommand)]
        cmd: compute::ComputeCommands,
    },
    #[command(about = "Combine vocabulary artifacts (union/intersection/difference/unique)")]
    Vocabulary {
        #[command(subcommand)]
        cmd: vocabulary::VocabularyCommands,
    },
    #[command(about = "Upload API descriptions")]
    Upload {
        #[command(subcommand)]
        cmd: upload::UploadCommands,
    },
    #[command(about = "Manage connection profiles (list/get/create/activate/delete)")]
    Config {
        #[command(subcommand)]
        cmd: config::ConfigCommands,
    },
    #[command(about = "Emit shell completion scripts")]
    Completions { shell: Shell },
}

/// Everything a registry command needs besides its own arguments.
pub struct Context<C> {
    pub client: Arc<C>,
    pub cancellation: Cancellation,
    pub project: Option<String>,
    pub location: Option<String>,
}

impl<C: Registry> Context<C> {
    pub fn new(client: C, settings: &RegistrySettings, cancellation: Cancellation) -> Self {
        Context {
            client: Arc::new(client),
            cancellation,
            project: settings.project.clone(),
            location: settings.location.clone(),
        }
    }

    /// Qualifies a relative pattern with the configured project and parses it.
    pub fn pattern(&self, input: &str) -> Result<Pattern> {
        let qualified = names::qualify(input, self.project.as_deref(), self.location.as_deref());
        Ok(Pattern::parse(&qualified)?)
    }

    pub fn pool(&self, jobs: usize) -> WorkerPool {
        WorkerPool::new(jobs, &self.cancellation)
    }

    /// Visits `pattern`, turning each resource into at most one pool task.
    ///
    /// Tasks already queued still run when listing fails; the listing error
    /// is returned after the pool has drained.
    pub async fn run_tasks<F>(
        &self,
        pattern: &Pattern,
        filter: &str,
        jobs: usize,
        make_task: F,
    ) -> Result<PoolSummary>
    where
        F: FnMut(Resource) -> Option<Task> + Send,
    {
        let pool = self.pool(jobs);
        let mut submitter = TaskSubmitter {
            pool: &pool,
            make_task,
        };
        let visited =
            visitor::visit(&*self.client, pattern, filter, &self.cancellation, &mut submitter)
                .await;
        drop(submitter);
        let summary = pool.wait().await;
        report(&summary);
        visited?;
        Ok(summary)
    }
}

/// Hands visited resources to a worker pool.
pub struct TaskSubmitter<'a, F> {
    pool: &'a WorkerPool,
    make_task: F,
}

#[async_trait]
impl<'a, F> Handler for TaskSubmitter<'a, F>
where
    F: FnMut(Resource) -> Option<Task> + Send,
{
    async fn handle(&mut self, resource: Resource) -> Result<()> {
        if let Some(task) = (self.make_task)(resource) {
            self.pool.submit(task).await?;
        }
        Ok(())
    }
}

/// Logs the outcome of a bulk operation; failures never change the exit code.
pub fn report(summary: &PoolSummary) {
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "finished"
    );
    if summary.failed > 0 {
        tracing::warn!("{} of {} tasks failed", summary.failed, summary.total());
    }
}

pub async fn run(
    cmd: Commands,
    connection: &ConnectionArgs,
    cancellation: Cancellation,
) -> Result<()> {
    let store = ConfigStore::new(ConfigStore::default_dir());
    match cmd {
        Commands::Config { cmd } => config::run(cmd, &store),
        Commands::Completions { shell } => completions::run(shell),
        cmd => {
            let settings = connection.resolve(&store)?;
            let client = HttpRegistry::new(&settings).context("failed to create registry client")?;
            let ctx = Context::new(client, &settings, cancellation);
            run_with(cmd, &ctx).await
        }
    }
}

/// Runs a registry command against any client.
pub async fn run_with<C: Registry>(cmd: Commands, ctx: &Context<C>) -> Result<()> {
    let mut out = std::io::stdout();
    match cmd {
        Commands::Get(args) => get::run(ctx, args, &mut out).await,
        Commands::List(args) => list::run(ctx, args, &mut out).await,
        Commands::Delete(args) => delete::run(ctx, args).await.map(|_| ()),
        Commands::Label(args) => label::run(ctx, args).await.map(|_| ()),
        Commands::Annotate(args) => annotate::run(ctx, args).await.map(|_| ()),
        Commands::Compute { cmd } => compute::run(ctx, cmd).await.map(|_| ()),
        Commands::Vocabulary { cmd } => vocabulary::run(ctx, cmd, &mut out).await,
        Commands::Upload { cmd } => upload::run(ctx, cmd).await,
        Commands::Config { .. } | Commands::Completions { .. } => {
            bail!("this command does not talk to a registry")
        }
    }
}
