use super::label::{patch, LabelArgs};
use super::Context;
use crate::labeling::Field;
use crate::pool::PoolSummary;
use crate::registry::Registry;
use anyhow::Result;

pub async fn run<C: Registry>(ctx: &Context<C>, args: LabelArgs) -> Result<PoolSummary> {
    patch(ctx, args, Field::Annotations).await
}
