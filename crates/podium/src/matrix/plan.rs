//! Query planning and result decoding for matrix reads.
//!
//! A [`QueryPlan`] is the ordered list of cells one read touches. The same
//! plan drives the store-side [`MatrixReadScript`], which returns one
//! [`CellRead`] per planned cell for every selected id, and [`parse`], which
//! walks the plan again to build sparse [`MatrixEntry`] values. Encoding and
//! decoding share the plan, so the two cannot disagree on cell order.

use std::collections::HashMap;

use podium_store::{Order, Script, ScriptContext};

use super::MatrixEntry;
use crate::window::window_bounds;

/// One cell a read touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedCell {
    pub dimension: String,
    pub feature: String,
    pub key: String,
    /// Store rank direction that puts the cell's best entry first.
    pub order: Order,
}

/// Cells in read order: dimensions as declared, features as declared
/// within each dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct QueryPlan {
    pub cells: Vec<PlannedCell>,
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Index of the cell at `(dimension, feature)`.
    pub fn position(&self, dimension: &str, feature: &str) -> Option<usize> {
        self.cells
            .iter()
            .position(|c| c.dimension == dimension && c.feature == feature)
    }
}

/// What a cell holds for one id. Both halves are absent together when the
/// id is not in the cell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct CellRead {
    pub score: Option<f64>,
    /// 0-based, under the cell's own order.
    pub rank: Option<usize>,
}

/// Which ids a matrix read returns.
#[derive(Debug, Clone)]
pub(crate) enum Selection {
    /// Exactly these ids, in this order.
    Ids(Vec<String>),
    /// 0-based ranks `start..=stop` of the anchor cell.
    Range { anchor: usize, start: i64, stop: i64 },
    /// The worst `max` entries of the anchor cell, best first.
    Bottom { anchor: usize, max: usize },
    /// The rank window around `member` in the anchor cell.
    Around {
        anchor: usize,
        member: String,
        distance: usize,
        fill_borders: bool,
    },
}

/// One combined atomic read across every planned cell.
#[derive(Debug)]
pub(crate) struct MatrixReadScript {
    pub cells: Vec<PlannedCell>,
    pub selection: Selection,
}

impl MatrixReadScript {
    fn anchor(&self, index: usize) -> &PlannedCell {
        match self.cells.get(index) {
            Some(cell) => cell,
            None => unreachable!("anchor cell {index} is not part of the plan"),
        }
    }

    fn selected_ids(&self, ctx: &dyn ScriptContext) -> Vec<String> {
        let only_ids = |members: Vec<(String, f64)>| -> Vec<String> {
            members.into_iter().map(|(id, _)| id).collect()
        };
        match &self.selection {
            Selection::Ids(ids) => ids.clone(),
            Selection::Range {
                anchor,
                start,
                stop,
            } => {
                let cell = self.anchor(*anchor);
                only_ids(ctx.zrange(&cell.key, *start, *stop, cell.order))
            }
            Selection::Bottom { anchor, max } => {
                let cell = self.anchor(*anchor);
                let mut members = ctx.zrange(&cell.key, 0, *max as i64 - 1, cell.order.reverse());
                members.reverse();
                only_ids(members)
            }
            Selection::Around {
                anchor,
                member,
                distance,
                fill_borders,
            } => {
                let cell = self.anchor(*anchor);
                let Some(rank) = ctx.zrank(&cell.key, member, cell.order) else {
                    return Vec::new();
                };
                let count = ctx.zcard(&cell.key);
                let (lower, upper) = window_bounds(rank, count, *distance, *fill_borders);
                only_ids(ctx.zrange(&cell.key, lower as i64, upper as i64, cell.order))
            }
        }
    }
}

impl Script for MatrixReadScript {
    /// Per selected id, one read per planned cell in plan order.
    type Output = Vec<(String, Vec<CellRead>)>;

    fn run(self, ctx: &mut dyn ScriptContext) -> Self::Output {
        let ids = self.selected_ids(ctx);
        ids.into_iter()
            .map(|id| {
                let reads = self
                    .cells
                    .iter()
                    .map(|cell| match ctx.zscore(&cell.key, &id) {
                        Some(score) => CellRead {
                            score: Some(score),
                            rank: ctx.zrank(&cell.key, &id, cell.order),
                        },
                        None => CellRead::default(),
                    })
                    .collect();
                (id, reads)
            })
            .collect()
    }
}

/// Decodes script rows into entries.
///
/// A dimension appears in an entry only if at least one of its planned
/// cells holds the id; an id found in no cell at all is dropped.
pub(crate) fn parse(plan: &QueryPlan, rows: Vec<(String, Vec<CellRead>)>) -> Vec<MatrixEntry> {
    rows.into_iter()
        .filter_map(|(id, reads)| parse_row(plan, id, &reads))
        .collect()
}

fn parse_row(plan: &QueryPlan, id: String, reads: &[CellRead]) -> Option<MatrixEntry> {
    if reads.len() != plan.cells.len() {
        unreachable!(
            "matrix read returned {} cells for a plan of {}",
            reads.len(),
            plan.cells.len()
        );
    }

    let mut scores: HashMap<String, HashMap<String, f64>> = HashMap::new();
    let mut ranks: HashMap<String, HashMap<String, usize>> = HashMap::new();
    for (cell, read) in plan.cells.iter().zip(reads) {
        let (Some(score), Some(rank)) = (read.score, read.rank) else {
            continue;
        };
        scores
            .entry(cell.dimension.clone())
            .or_default()
            .insert(cell.feature.clone(), score);
        ranks
            .entry(cell.dimension.clone())
            .or_default()
            .insert(cell.feature.clone(), rank + 1);
    }

    if scores.is_empty() {
        return None;
    }
    Some(MatrixEntry { id, scores, ranks })
}
