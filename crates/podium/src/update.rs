//! Policy-driven score updates and top-N trimming.
//!
//! Both run inside one [`UpdateScript`], so the store applies every
//! entry, then trims, as a single atomic unit. A reader never sees a
//! collection over its limit, and two `best` updates on the same id can
//! never interleave their read and write.

use podium_store::{Script, ScriptContext};

use crate::policy::{SortPolicy, UpdatePolicy};

/// Everything needed to update one collection.
#[derive(Debug, Clone)]
pub(crate) struct UpdateBatch {
    pub key: String,
    pub sort_policy: SortPolicy,
    pub update_policy: UpdatePolicy,
    pub limit: Option<usize>,
    pub entries: Vec<(String, f64)>,
}

/// Updates one or more collections, in order, as one atomic unit.
///
/// The output holds, per batch, the final score of each entry for the
/// `aggregate` and `best` policies, and nothing for `replace`.
#[derive(Debug)]
pub(crate) struct UpdateScript {
    pub batches: Vec<UpdateBatch>,
}

impl Script for UpdateScript {
    type Output = Vec<Vec<f64>>;

    fn run(self, ctx: &mut dyn ScriptContext) -> Self::Output {
        self.batches
            .into_iter()
            .map(|batch| {
                let scores = apply_batch(ctx, &batch);
                if let Some(limit) = batch.limit {
                    trim_to_top(ctx, &batch.key, batch.sort_policy, limit);
                }
                scores
            })
            .collect()
    }
}

fn apply_batch(ctx: &mut dyn ScriptContext, batch: &UpdateBatch) -> Vec<f64> {
    let key = batch.key.as_str();
    match batch.update_policy {
        UpdatePolicy::Replace => {
            let members: Vec<(f64, String)> = batch
                .entries
                .iter()
                .map(|(id, value)| (*value, id.clone()))
                .collect();
            ctx.zadd(key, &members);
            Vec::new()
        }
        UpdatePolicy::Aggregate => batch
            .entries
            .iter()
            .map(|(id, value)| ctx.zincrby(key, id, *value))
            .collect(),
        UpdatePolicy::Best => batch
            .entries
            .iter()
            .map(|(id, value)| keep_best(ctx, key, batch.sort_policy, id, *value))
            .collect(),
    }
}

/// Stores `value` if `id` is absent or `value` beats its score. Returns
/// the score `id` ends up with.
pub(crate) fn keep_best(
    ctx: &mut dyn ScriptContext,
    key: &str,
    sort_policy: SortPolicy,
    id: &str,
    value: f64,
) -> f64 {
    match ctx.zscore(key, id) {
        Some(current) if !sort_policy.is_better(value, current) => current,
        _ => {
            ctx.zadd(key, &[(value, id.to_owned())]);
            value
        }
    }
}

/// Removes everything ranked below `limit`. Returns how many entries went.
pub(crate) fn trim_to_top(
    ctx: &mut dyn ScriptContext,
    key: &str,
    sort_policy: SortPolicy,
    limit: usize,
) -> usize {
    let count = ctx.zcard(key);
    if count <= limit {
        return 0;
    }
    let excess = (count - limit) as i64;
    // the store ranks ascending; the worst entries sit at whichever end
    // the policy ranks last
    match sort_policy {
        SortPolicy::HighToLow => ctx.zremrangebyrank(key, 0, excess - 1),
        SortPolicy::LowToHigh => ctx.zremrangebyrank(key, limit as i64, -1),
    }
}
