use crate::model::{ChannelMetrics, MissingStatsPolicy, SnapshotRow};
use crate::prelude::*;
use crate::sheet::client::SheetStore;
use anyhow::anyhow;
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;

pub const HEADER: [&str; 6] = ["日付", "名前", "登録者数", "総再生数", "動画数", "URL"];
pub const COMPLETE_HEADER: &str = "完全";
pub const ORIGIN: &str = "A1";

/// Rightmost column cleared below the anchor.
const CLEAR_TO_COLUMN: &str = "ZZ";
/// Sheets stops at column `ZZZ`.
const MAX_COLUMN_LETTERS: usize = 3;

/// A single A1-notation cell such as `B1` or `AA10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    /// Zero-based column index.
    pub col: u32,
    /// One-based row number.
    pub row: u32,
}

impl CellRef {
    pub fn parse(raw: &str) -> Result<CellRef> {
        let raw = raw.trim();
        let split = raw
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| anyhow!("cell {:?} has no row number", raw))?;
        let (letters, digits) = raw.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(anyhow!("cell {:?} has no column letters", raw));
        }
        if letters.len() > MAX_COLUMN_LETTERS {
            return Err(anyhow!("cell {:?} is past the last column", raw));
        }

        let col = letters
            .chars()
            .fold(0u32, |acc, c| acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1))
            - 1;
        let row: u32 = digits
            .parse()
            .map_err(|_| anyhow!("cell {:?} has an invalid row number", raw))?;
        if row == 0 {
            return Err(anyhow!("cell {:?} has row 0", raw));
        }

        Ok(CellRef { col, row })
    }

    pub fn column_name(col: u32) -> String {
        let mut name = Vec::new();
        let mut n = col + 1;
        while n > 0 {
            let rem = (n - 1) % 26;
            name.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        name.iter().rev().collect()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CellRef::column_name(self.col), self.row)
    }
}

/// How a run's snapshot lands in the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite starting at the anchor. Rows left over from a longer earlier
    /// snapshot stay in place.
    Anchor(CellRef),
    /// Clear from the anchor row down, then write at the anchor. Rows above
    /// the anchor (the keyword cell) survive.
    AnchorClear(CellRef),
    /// Clear the whole sheet and write from `A1`. Anything else on the sheet,
    /// including the keyword cell, is lost.
    Clear,
}

impl WriteMode {
    pub fn from_parts(mode: &str, anchor: &str) -> Result<WriteMode> {
        match mode.to_ascii_lowercase().as_str() {
            "anchor" => Ok(WriteMode::Anchor(CellRef::parse(anchor)?)),
            "anchor-clear" => Ok(WriteMode::AnchorClear(CellRef::parse(anchor)?)),
            "clear" => Ok(WriteMode::Clear),
            other => Err(anyhow!(
                "write mode must be \"anchor\", \"anchor-clear\" or \"clear\", got {:?}",
                other
            )),
        }
    }
}

pub fn build_rows(metrics: &[ChannelMetrics], date: NaiveDate) -> Vec<SnapshotRow> {
    metrics
        .iter()
        .map(|m| SnapshotRow::from_metrics(m, date))
        .collect()
}

/// Header plus one row per snapshot row, in input order.
pub fn build_grid(rows: &[SnapshotRow], policy: MissingStatsPolicy) -> Vec<Vec<Value>> {
    let mut header: Vec<Value> = HEADER.iter().map(|h| Value::from(*h)).collect();
    if policy == MissingStatsPolicy::MarkPartial {
        header.push(Value::from(COMPLETE_HEADER));
    }

    let mut grid = Vec::with_capacity(rows.len() + 1);
    grid.push(header);
    for row in rows {
        let mut cells = vec![
            Value::from(row.date.format("%Y-%m-%d").to_string()),
            Value::from(row.name.clone()),
            Value::from(row.subscriber_count),
            Value::from(row.view_count),
            Value::from(row.video_count),
            Value::from(row.url.clone()),
        ];
        if policy == MissingStatsPolicy::MarkPartial {
            cells.push(Value::from(row.complete));
        }
        grid.push(cells);
    }

    grid
}

pub async fn write_snapshot<S: SheetStore>(
    sheet: &S,
    grid: &[Vec<Value>],
    mode: &WriteMode,
) -> Result<()> {
    match mode {
        WriteMode::Anchor(anchor) => {
            sheet.write_range(&anchor.to_string(), grid).await?;
        }
        WriteMode::AnchorClear(anchor) => {
            let below = format!("{}:{}", anchor, CLEAR_TO_COLUMN);
            sheet.clear_range(&below).await?;
            sheet.write_range(&anchor.to_string(), grid).await?;
        }
        WriteMode::Clear => {
            sheet.clear_all().await?;
            sheet.write_range(ORIGIN, grid).await?;
        }
    }

    tracing::info!("Wrote {} rows ({:?})", grid.len().saturating_sub(1), mode);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelId;
    use crate::sheet::client::tests::MemorySheet;

    fn metrics(n: usize, subs: u64) -> ChannelMetrics {
        ChannelMetrics {
            id: ChannelId::parse(&format!("UC{:0>22}", n)).unwrap(),
            title: format!("Creator {}", n),
            subscriber_count: subs,
            view_count: subs * 100,
            video_count: 10,
            missing: vec![],
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn cell_refs() {
        assert_eq!(CellRef::parse("A3").unwrap(), CellRef { col: 0, row: 3 });
        assert_eq!(CellRef::parse("b1").unwrap(), CellRef { col: 1, row: 1 });
        assert_eq!(CellRef::parse("AA10").unwrap(), CellRef { col: 26, row: 10 });
        assert_eq!(CellRef::parse("AA10").unwrap().to_string(), "AA10");
        assert_eq!(CellRef::column_name(701), "ZZ");
        assert!(CellRef::parse("3").is_err());
        assert!(CellRef::parse("A").is_err());
        assert!(CellRef::parse("A0").is_err());
        assert!(CellRef::parse("A1:B2").is_err());
        assert_eq!(CellRef::parse("ZZZ1").unwrap().col, 18277);
        assert!(CellRef::parse("AAAA1").is_err());
        assert!(CellRef::parse("AAAAAAAA1").is_err());
    }

    #[test]
    fn write_mode_names() {
        assert_eq!(
            WriteMode::from_parts("anchor", "A3").unwrap(),
            WriteMode::Anchor(CellRef { col: 0, row: 3 })
        );
        assert_eq!(
            WriteMode::from_parts("Anchor-Clear", "C5").unwrap(),
            WriteMode::AnchorClear(CellRef { col: 2, row: 5 })
        );
        assert_eq!(WriteMode::from_parts("clear", "bogus").unwrap(), WriteMode::Clear);
        assert!(WriteMode::from_parts("append", "A3").is_err());
    }

    #[test]
    fn grid_keeps_input_order_and_schema() {
        let rows = build_rows(&[metrics(2, 5), metrics(1, 900), metrics(3, 50)], date());
        let grid = build_grid(&rows, MissingStatsPolicy::ZeroFill);

        assert_eq!(grid.len(), 4);
        assert!(grid.iter().all(|row| row.len() == 6));
        assert_eq!(grid[0], HEADER.iter().map(|h| Value::from(*h)).collect::<Vec<_>>());
        assert_eq!(
            grid[1],
            vec![
                Value::from("2026-10-18"),
                Value::from("Creator 2"),
                Value::from(5u64),
                Value::from(500u64),
                Value::from(10u64),
                Value::from("https://www.youtube.com/channel/UC0000000000000000000002"),
            ]
        );
        assert_eq!(grid[2][1], Value::from("Creator 1"));
        assert_eq!(grid[3][1], Value::from("Creator 3"));
    }

    #[test]
    fn mark_policy_adds_completeness_column() {
        let mut partial = metrics(1, 0);
        partial.missing = vec!["subscriberCount"];
        let rows = build_rows(&[partial, metrics(2, 7)], date());
        let grid = build_grid(&rows, MissingStatsPolicy::MarkPartial);

        assert!(grid.iter().all(|row| row.len() == 7));
        assert_eq!(grid[0][6], Value::from(COMPLETE_HEADER));
        assert_eq!(grid[1][6], Value::from(false));
        assert_eq!(grid[2][6], Value::from(true));
    }

    #[test]
    fn empty_snapshot_is_header_only() {
        let grid = build_grid(&[], MissingStatsPolicy::ZeroFill);
        assert_eq!(grid.len(), 1);
    }

    #[tokio::test]
    async fn anchor_mode_leaves_stale_rows_below() {
        let sheet = MemorySheet::with_keyword("料理");
        let long = build_grid(&build_rows(&[metrics(1, 1), metrics(2, 2), metrics(3, 3)], date()), MissingStatsPolicy::ZeroFill);
        let short = build_grid(&build_rows(&[metrics(4, 4)], date()), MissingStatsPolicy::ZeroFill);
        let mode = WriteMode::from_parts("anchor", "A3").unwrap();

        write_snapshot(&sheet, &long, &mode).await.unwrap();
        write_snapshot(&sheet, &short, &mode).await.unwrap();

        assert_eq!(sheet.cell("B1"), Some(Value::from("料理")));
        assert_eq!(sheet.cell("B4"), Some(Value::from("Creator 4")));
        assert_eq!(sheet.cell("B5"), Some(Value::from("Creator 2")));
        assert_eq!(sheet.cell("B6"), Some(Value::from("Creator 3")));
    }

    #[tokio::test]
    async fn anchor_clear_mode_drops_stale_rows_keeps_keyword() {
        let sheet = MemorySheet::with_keyword("料理");
        let long = build_grid(&build_rows(&[metrics(1, 1), metrics(2, 2), metrics(3, 3)], date()), MissingStatsPolicy::ZeroFill);
        let short = build_grid(&build_rows(&[metrics(4, 4)], date()), MissingStatsPolicy::ZeroFill);
        let mode = WriteMode::from_parts("anchor-clear", "A3").unwrap();

        write_snapshot(&sheet, &long, &mode).await.unwrap();
        write_snapshot(&sheet, &short, &mode).await.unwrap();

        assert_eq!(sheet.cell("B1"), Some(Value::from("料理")));
        assert_eq!(sheet.cell("B4"), Some(Value::from("Creator 4")));
        assert_eq!(sheet.cell("B5"), None);
        assert_eq!(sheet.calls(), vec!["clear A3:ZZ", "write A3", "clear A3:ZZ", "write A3"]);
    }

    #[tokio::test]
    async fn clear_mode_rewrites_from_origin() {
        let sheet = MemorySheet::with_keyword("料理");
        let grid = build_grid(&build_rows(&[metrics(1, 1)], date()), MissingStatsPolicy::ZeroFill);

        write_snapshot(&sheet, &grid, &WriteMode::Clear).await.unwrap();

        assert_eq!(sheet.cell("A1"), Some(Value::from("日付")));
        assert_eq!(sheet.cell("B2"), Some(Value::from("Creator 1")));
        assert_eq!(sheet.calls(), vec!["clear all", "write A1"]);
        assert_eq!(sheet.grid(), grid);
    }
}
