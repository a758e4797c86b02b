// ==========================================
// 表格批量导入引擎 - 表头解析器
// ==========================================
// 职责: 任意/宽松的列标题 → 标准字段名
// 模式: ExactNormalized（严格流）/ SubstringTolerant（旧版流）
// 说明: 匹配模式是每个导入流的声明式配置，不分叉代码
// ==========================================

use crate::domain::import::{CellValue, RawRow};
use crate::importer::coercers::fold_key;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

/// 表头匹配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// 归一化后完全相等
    ExactNormalized,
    /// 归一化后的表头包含同义词即可（多字段命中时取最长同义词）
    SubstringTolerant,
}

/// 标准字段定义
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    /// 模板导出使用的表头文本，同时也是一个可接受的同义词
    pub label: &'static str,
    pub synonyms: &'static [&'static str],
    pub required: bool,
}

impl FieldDef {
    fn candidates(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.label)
            .chain(self.synonyms.iter().copied())
            .chain(std::iter::once(self.name))
            .map(fold_key)
            .filter(|s| !s.is_empty())
    }
}

// ==========================================
// HeaderMap - 每个导入流的静态表头配置
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct HeaderMap {
    pub mode: MatchMode,
    pub fields: &'static [FieldDef],
}

impl HeaderMap {
    pub const fn new(mode: MatchMode, fields: &'static [FieldDef]) -> Self {
        Self { mode, fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 将表头序列解析为 字段 → 列 的映射
    ///
    /// 每个表头至多绑定一个字段，每个字段至多绑定一列。
    /// 第一轮：归一化后与候选完全相等的表头优先绑定（按列顺序）。
    /// 第二轮（仅 SubstringTolerant）：剩余 (表头, 字段) 按命中长度降序统一分配，
    /// 同长度时列靠前、字段声明靠前者优先。
    pub fn resolve(&self, headers: &[String]) -> HeaderResolution {
        let candidates: Vec<Vec<String>> =
            self.fields.iter().map(|f| f.candidates().collect()).collect();
        let folded: Vec<String> = headers.iter().map(|h| fold_key(h)).collect();

        let mut columns: Vec<Option<usize>> = vec![None; self.fields.len()];
        let mut header_taken = vec![false; headers.len()];

        // === 第一轮: 完全相等 ===
        for (column, header) in folded.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let exact = candidates.iter().enumerate().position(|(idx, synonyms)| {
                columns[idx].is_none() && synonyms.iter().any(|s| s == header)
            });
            if let Some(idx) = exact {
                columns[idx] = Some(column);
                header_taken[column] = true;
            }
        }

        // === 第二轮: 包含匹配 ===
        if self.mode == MatchMode::SubstringTolerant {
            let mut pairs: Vec<(usize, usize, usize)> = Vec::new(); // (命中长度, 列, 字段序号)
            for (column, header) in folded.iter().enumerate() {
                if header.is_empty() || header_taken[column] {
                    continue;
                }
                for (idx, synonyms) in candidates.iter().enumerate() {
                    if columns[idx].is_some() {
                        continue;
                    }
                    let score = synonyms
                        .iter()
                        .filter(|syn| header.contains(syn.as_str()))
                        .map(|syn| syn.chars().count())
                        .max();
                    if let Some(score) = score {
                        pairs.push((score, column, idx));
                    }
                }
            }
            pairs.sort_by_key(|&(score, column, idx)| (Reverse(score), column, idx));

            for (_, column, idx) in pairs {
                if header_taken[column] || columns[idx].is_some() {
                    continue;
                }
                columns[idx] = Some(column);
                header_taken[column] = true;
            }
        }

        let unmatched_headers = headers
            .iter()
            .zip(&folded)
            .zip(&header_taken)
            .filter(|((_, folded), taken)| !folded.is_empty() && !**taken)
            .map(|((header, _), _)| header.clone())
            .collect();

        let bindings: Vec<ColumnBinding> = self
            .fields
            .iter()
            .zip(columns)
            .filter_map(|(field, column)| {
                column.map(|column| ColumnBinding {
                    field: field.name,
                    column,
                    header: headers[column].clone(),
                })
            })
            .collect();

        let missing_required = self
            .fields
            .iter()
            .filter(|f| f.required && !bindings.iter().any(|b| b.field == f.name))
            .map(|f| f.name)
            .collect();

        HeaderResolution {
            bindings,
            unmatched_headers,
            missing_required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub field: &'static str,
    pub column: usize,
    pub header: String,
}

// ==========================================
// HeaderResolution - 解析结果 + 行投影
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct HeaderResolution {
    pub bindings: Vec<ColumnBinding>,
    pub unmatched_headers: Vec<String>,
    pub missing_required: Vec<&'static str>,
}

impl HeaderResolution {
    pub fn column_of(&self, field: &str) -> Option<&ColumnBinding> {
        self.bindings.iter().find(|b| b.field == field)
    }

    /// RawRow → 标准字段值；未绑定的字段视为空
    pub fn project(&self, raw: &RawRow) -> ResolvedRow {
        let values = self
            .bindings
            .iter()
            .map(|binding| {
                let value = match raw.cells.get(binding.column) {
                    Some((header, value)) if *header == binding.header => value.clone(),
                    _ => raw.get(&binding.header).cloned().unwrap_or(CellValue::Empty),
                };
                (binding.field, value)
            })
            .collect();

        ResolvedRow {
            row_number: raw.row_number,
            values,
        }
    }
}

/// 按标准字段取值的行
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow {
    pub row_number: usize,
    values: HashMap<&'static str, CellValue>,
}

impl ResolvedRow {
    pub fn new(row_number: usize, values: HashMap<&'static str, CellValue>) -> Self {
        Self { row_number, values }
    }

    pub fn get(&self, field: &str) -> &CellValue {
        self.values.get(field).unwrap_or(&CellValue::Empty)
    }
}
