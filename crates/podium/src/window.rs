//! Rank windows: the neighbourhood of an entry, optionally border-filled.

use podium_store::{Order, Script, ScriptContext};

/// Inclusive 0-based bounds of the window around `rank` in a collection of
/// `count` entries (`rank < count`).
///
/// Without `fill_borders` the window is clipped at either end and can be
/// asymmetric. With it, a window clipped at the top is extended downward,
/// and one that would run past the bottom is slid back up. A collection of
/// at least `2 * distance + 1` entries then always yields that many; a
/// smaller one can yield fewer than `count`, since the window never reaches
/// more than `distance` ranks below `rank` once it hits the bottom.
pub(crate) fn window_bounds(
    rank: usize,
    count: usize,
    distance: usize,
    fill_borders: bool,
) -> (usize, usize) {
    let last = count.saturating_sub(1);
    let mut lower = rank.saturating_sub(distance);
    let upper = if fill_borders {
        let upper = lower.saturating_add(distance.saturating_mul(2));
        if upper >= count {
            let upper = last.min(rank.saturating_add(distance));
            lower = upper.saturating_sub(distance.saturating_mul(2));
            upper
        } else {
            upper
        }
    } else {
        last.min(rank.saturating_add(distance))
    };
    (lower, upper)
}

/// A resolved window: the 0-based rank of its first member, then the
/// members in rank order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Window {
    pub first_rank: usize,
    pub members: Vec<(String, f64)>,
}

/// Reads the window around `member` from inside a script, so its rank,
/// the cardinality and the range all come from one consistent state.
/// Returns `None` when `member` is absent.
pub(crate) fn resolve_window(
    ctx: &dyn ScriptContext,
    key: &str,
    order: Order,
    member: &str,
    distance: usize,
    fill_borders: bool,
) -> Option<Window> {
    let rank = ctx.zrank(key, member, order)?;
    let count = ctx.zcard(key);
    let (lower, upper) = window_bounds(rank, count, distance, fill_borders);
    Some(Window {
        first_rank: lower,
        members: ctx.zrange(key, lower as i64, upper as i64, order),
    })
}

/// Single-collection `around` query.
#[derive(Debug)]
pub(crate) struct AroundScript {
    pub key: String,
    pub order: Order,
    pub member: String,
    pub distance: usize,
    pub fill_borders: bool,
}

impl Script for AroundScript {
    type Output = Option<Window>;

    fn run(self, ctx: &mut dyn ScriptContext) -> Self::Output {
        resolve_window(
            ctx,
            &self.key,
            self.order,
            &self.member,
            self.distance,
            self.fill_borders,
        )
    }
}
