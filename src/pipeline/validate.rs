//! Structural repair of candidate blocks.
//!
//! Only tables are touched. Generated tables are often ragged, so instead of
//! rejecting them the validator makes them rectangular:
//!
//! 1. children that are not table rows are dropped;
//! 2. a zero width, or one above [`MAX_TABLE_WIDTH`], is inferred from the
//!    first row (then the widest row, then 1);
//! 3. short rows are right-padded with empty cells, long rows truncated.
//!
//! Validation never fails and is idempotent.

use crate::model::{Block, RichText, TableBlock, TableChild};
use tracing::{debug, warn};

/// Widest table the validator will build. Declared widths above this are
/// treated as missing.
pub const MAX_TABLE_WIDTH: usize = 100;

/// What the validator changed in one table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TableRepair {
    pub dropped_children: usize,
    pub inferred_width: bool,
    pub padded_rows: usize,
    pub truncated_rows: usize,
}

impl TableRepair {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Enforces the publishing target's block invariants.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockValidator;

impl BlockValidator {
    pub fn new() -> Self {
        Self
    }

    /// Repair every table in `blocks`; other blocks pass through in order.
    pub fn validate(&self, blocks: Vec<Block>) -> Vec<Block> {
        blocks
            .into_iter()
            .map(|block| match block {
                Block::Table(table) => {
                    let (table, repair) = repair_table(table);
                    if !repair.is_noop() {
                        warn!(
                            "Repaired table (width {}): {} foreign children dropped, {} rows padded, {} rows truncated{}",
                            table.width,
                            repair.dropped_children,
                            repair.padded_rows,
                            repair.truncated_rows,
                            if repair.inferred_width { ", width inferred" } else { "" }
                        );
                    }
                    Block::Table(table)
                }
                other => other,
            })
            .collect()
    }
}

/// Make one table rectangular.
pub fn repair_table(table: TableBlock) -> (TableBlock, TableRepair) {
    let mut repair = TableRepair::default();
    let child_count = table.rows.len();

    let mut rows: Vec<_> = table
        .rows
        .into_iter()
        .filter_map(|child| match child {
            TableChild::Row(row) => Some(row),
            TableChild::Foreign { kind } => {
                debug!("Dropping {} child from table", kind);
                None
            }
        })
        .collect();
    repair.dropped_children = child_count - rows.len();

    let mut width = table.width;
    if width > MAX_TABLE_WIDTH {
        warn!("Ignoring declared table width {}", width);
        width = 0;
        repair.inferred_width = true;
    }
    if width == 0 && !rows.is_empty() {
        width = rows
            .first()
            .map(|r| r.cells.len())
            .filter(|&n| n > 0)
            .or_else(|| rows.iter().map(|r| r.cells.len()).max().filter(|&n| n > 0))
            .unwrap_or(1)
            .min(MAX_TABLE_WIDTH);
        repair.inferred_width = true;
    }

    for row in &mut rows {
        let len = row.cells.len();
        if len < width {
            row.cells.resize_with(width, RichText::empty);
            repair.padded_rows += 1;
        } else if len > width {
            row.cells.truncate(width);
            repair.truncated_rows += 1;
        }
    }

    let table = TableBlock {
        width,
        has_column_header: table.has_column_header,
        has_row_header: table.has_row_header,
        rows: rows.into_iter().map(TableChild::Row).collect(),
    };
    (table, repair)
}
