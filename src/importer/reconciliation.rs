// ==========================================
// 表格批量导入引擎 - 自然键对账规划器
// ==========================================
// 输入: 有效行 + 既有记录（一次批量查询）
// 输出: to_update(id) / to_insert / superseded
// 策略: 同批次内重复自然键 → 文件顺序后者覆盖前者（last-write-wins）
// 键比较: 区分大小写、精确匹配；绝不使用代理 id 作为匹配依据
// ==========================================

use crate::domain::import::{ExistingRecord, ValidatedRow};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationPlan<P> {
    pub to_update: Vec<(i64, ValidatedRow<P>)>,
    pub to_insert: Vec<ValidatedRow<P>>,
    pub superseded: Vec<SupersededRow>,
}

/// 被同键后续行覆盖的行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupersededRow {
    pub row_number: usize,
    pub natural_key: String,
    pub superseded_by: usize,
}

impl<P> ReconciliationPlan<P> {
    pub fn total_planned(&self) -> usize {
        self.to_update.len() + self.to_insert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_planned() == 0
    }
}

/// 去重后需要查询的自然键（保持首次出现顺序）
pub fn distinct_keys<P>(rows: &[ValidatedRow<P>]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|r| seen.insert(r.natural_key.as_str()))
        .map(|r| r.natural_key.clone())
        .collect()
}

pub struct ReconciliationPlanner;

impl ReconciliationPlanner {
    pub fn plan<P>(rows: Vec<ValidatedRow<P>>, existing: &[ExistingRecord]) -> ReconciliationPlan<P> {
        let ids: HashMap<&str, i64> = existing
            .iter()
            .map(|r| (r.natural_key.as_str(), r.id))
            .collect();

        // 每个键的最后一次出现
        let mut last_index: HashMap<&str, usize> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            last_index.insert(row.natural_key.as_str(), idx);
        }

        let mut superseded = Vec::new();
        let mut keep = vec![false; rows.len()];
        for (idx, row) in rows.iter().enumerate() {
            let winner = last_index[row.natural_key.as_str()];
            if winner == idx {
                keep[idx] = true;
            } else {
                superseded.push(SupersededRow {
                    row_number: row.row_number,
                    natural_key: row.natural_key.clone(),
                    superseded_by: rows[winner].row_number,
                });
            }
        }

        let matched: Vec<Option<i64>> = rows
            .iter()
            .map(|row| ids.get(row.natural_key.as_str()).copied())
            .collect();

        let mut to_update = Vec::new();
        let mut to_insert = Vec::new();
        for ((row, kept), id) in rows.into_iter().zip(keep).zip(matched) {
            if !kept {
                continue;
            }
            match id {
                Some(id) => to_update.push((id, row)),
                None => to_insert.push(row),
            }
        }

        debug!(
            to_update = to_update.len(),
            to_insert = to_insert.len(),
            superseded = superseded.len(),
            "对账规划完成"
        );

        ReconciliationPlan {
            to_update,
            to_insert,
            superseded,
        }
    }
}
