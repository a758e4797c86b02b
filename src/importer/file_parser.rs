// ==========================================
// 表格批量导入引擎 - 表格解码器
// ==========================================
// 职责: 字节缓冲 → 有序原始行（首行为表头）
// 支持: Excel (.xlsx/.xls) / ODS (.ods) / CSV (.csv)
// 规则: 全部单元格为空或空白的行直接丢弃，不产生行号
// ==========================================

use crate::domain::import::{CellValue, RawRow};
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Ods, Reader, Sheets, Xls, Xlsx};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const UTF8_BOM: char = '\u{feff}';

// ==========================================
// 解码选项
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetFormat {
    /// 按容器魔数识别（仅 ZIP / OLE 容器；CSV 必须显式指定）
    #[default]
    Auto,
    Xlsx,
    Xls,
    Ods,
    Csv,
}

impl SheetFormat {
    pub fn from_extension(path: &Path) -> ImportResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "xlsx" | "xlsm" => Ok(SheetFormat::Xlsx),
            "xls" => Ok(SheetFormat::Xls),
            "ods" => Ok(SheetFormat::Ods),
            "csv" => Ok(SheetFormat::Csv),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SheetSelector {
    /// 约定读取第一个工作表
    #[default]
    First,
    Named(String),
}

#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub format: SheetFormat,
    pub sheet: SheetSelector,
}

impl DecodeOptions {
    pub fn for_path(path: &Path) -> ImportResult<Self> {
        Ok(Self {
            format: SheetFormat::from_extension(path)?,
            sheet: SheetSelector::First,
        })
    }
}

// ==========================================
// DecodedSheet - 解码结果
// ==========================================
#[derive(Debug, Clone)]
pub struct DecodedSheet {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub dropped_blank_rows: usize,
}

impl DecodedSheet {
    fn assemble<I>(sheet_name: String, header_row_number: usize, headers: Vec<String>, data: I) -> Self
    where
        I: IntoIterator<Item = (usize, Vec<CellValue>)>,
    {
        let mut rows = Vec::new();
        let mut dropped_blank_rows = 0;

        for (row_number, values) in data {
            let cells: Vec<(String, CellValue)> = headers
                .iter()
                .cloned()
                .zip(values.into_iter().chain(std::iter::repeat(CellValue::Empty)))
                .collect();
            let row = RawRow::new(row_number, cells);

            // 跳过完全空白的行
            if row.is_blank() {
                dropped_blank_rows += 1;
                continue;
            }
            rows.push(row);
        }

        debug!(
            sheet = %sheet_name,
            header_row = header_row_number,
            rows = rows.len(),
            dropped = dropped_blank_rows,
            "工作表解码完成"
        );

        Self {
            sheet_name,
            headers,
            rows,
            dropped_blank_rows,
        }
    }
}

// ==========================================
// SheetDecoder Trait
// ==========================================
pub trait SheetDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], sheet: &SheetSelector) -> ImportResult<DecodedSheet>;
}

// ==========================================
// Excel / ODS 解码器
// ==========================================
pub struct ExcelDecoder {
    format: SheetFormat,
}

impl ExcelDecoder {
    pub fn new(format: SheetFormat) -> Self {
        Self { format }
    }

    fn open(&self, bytes: &[u8]) -> ImportResult<Sheets<Cursor<Vec<u8>>>> {
        let cursor = Cursor::new(bytes.to_vec());
        let workbook = match self.format {
            SheetFormat::Xlsx => Sheets::Xlsx(
                Xlsx::new(cursor).map_err(|e| ImportError::Decode(e.to_string()))?,
            ),
            SheetFormat::Xls => {
                Sheets::Xls(Xls::new(cursor).map_err(|e| ImportError::Decode(e.to_string()))?)
            }
            SheetFormat::Ods => {
                Sheets::Ods(Ods::new(cursor).map_err(|e| ImportError::Decode(e.to_string()))?)
            }
            SheetFormat::Auto => {
                if !bytes.starts_with(ZIP_MAGIC) && !bytes.starts_with(OLE_MAGIC) {
                    return Err(ImportError::Decode(
                        "无法识别的表格容器（非 ZIP/OLE 格式）".to_string(),
                    ));
                }
                open_workbook_auto_from_rs(cursor)?
            }
            SheetFormat::Csv => {
                return Err(ImportError::UnsupportedFormat(
                    "csv 需使用 CsvDecoder".to_string(),
                ))
            }
        };
        Ok(workbook)
    }
}

impl SheetDecoder for ExcelDecoder {
    fn decode(&self, bytes: &[u8], sheet: &SheetSelector) -> ImportResult<DecodedSheet> {
        let mut workbook = self.open(bytes)?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = match sheet {
            SheetSelector::First => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| ImportError::Decode("文件无工作表".to_string()))?,
            SheetSelector::Named(name) => sheet_names
                .iter()
                .find(|n| *n == name)
                .cloned()
                .ok_or_else(|| ImportError::SheetNotFound(name.clone()))?,
        };

        let range = workbook.worksheet_range(&sheet_name)?;

        // Range 从首个非空单元格开始，需换算回表格物理行号
        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let mut rows = range.rows();
        let header_row = rows.next().ok_or(ImportError::EmptySheet)?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| normalize_header_label(&cell.to_string()))
            .collect();
        let header_row_number = first_row + 1;

        let data = rows.enumerate().map(|(offset, cells)| {
            (
                header_row_number + offset + 1,
                cells.iter().map(cell_value).collect::<Vec<_>>(),
            )
        });

        Ok(DecodedSheet::assemble(sheet_name, header_row_number, headers, data))
    }
}

/// calamine 单元格 → CellValue（日期单元格转 ISO 文本）
fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_date() {
            Some(date) => CellValue::Text(date.format("%Y-%m-%d").to_string()),
            None => CellValue::Text(cell.to_string()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

fn normalize_header_label(raw: &str) -> String {
    raw.trim_start_matches(UTF8_BOM).trim().to_string()
}

// ==========================================
// CSV 解码器
// ==========================================
pub struct CsvDecoder;

impl CsvDecoder {
    /// 表头行中分号多于逗号时按分号分隔（区域设置导出的 CSV）
    fn sniff_delimiter(bytes: &[u8]) -> u8 {
        let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
        let semicolons = first_line.iter().filter(|b| **b == b';').count();
        let commas = first_line.iter().filter(|b| **b == b',').count();
        if semicolons > commas {
            b';'
        } else {
            b','
        }
    }
}

impl SheetDecoder for CsvDecoder {
    fn decode(&self, bytes: &[u8], _sheet: &SheetSelector) -> ImportResult<DecodedSheet> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .delimiter(Self::sniff_delimiter(bytes))
            .from_reader(bytes);

        // 物理行号 = 记录起始行 - 之前记录中引号内换行数（多行单元格在表格软件中仍是一行）
        let mut embedded_newlines = 0usize;
        let mut sheet_row = |record: &StringRecord, fallback: usize| -> usize {
            let row_number = record
                .position()
                .map(|p| (p.line() as usize).saturating_sub(embedded_newlines))
                .unwrap_or(fallback);
            embedded_newlines += record.iter().map(|f| f.matches('\n').count()).sum::<usize>();
            row_number
        };

        let mut records = reader.records();
        let header_record = records.next().ok_or(ImportError::EmptySheet)??;
        let header_row_number = sheet_row(&header_record, 1);
        let headers: Vec<String> = header_record.iter().map(normalize_header_label).collect();

        let mut data = Vec::new();
        let mut last_row = header_row_number;
        for result in records {
            let record = result?;
            let row_number = sheet_row(&record, last_row + 1);
            last_row = row_number;
            data.push((
                row_number,
                record.iter().map(CellValue::from).collect::<Vec<_>>(),
            ));
        }

        Ok(DecodedSheet::assemble(
            "csv".to_string(),
            header_row_number,
            headers,
            data,
        ))
    }
}

// ==========================================
// 通用解码器（按格式分派）
// ==========================================
pub struct UniversalDecoder;

impl UniversalDecoder {
    pub fn decode(&self, bytes: &[u8], options: &DecodeOptions) -> ImportResult<DecodedSheet> {
        match options.format {
            SheetFormat::Csv => CsvDecoder.decode(bytes, &options.sheet),
            format => ExcelDecoder::new(format).decode(bytes, &options.sheet),
        }
    }

    /// 读取文件并按扩展名选择格式
    pub fn decode_file<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<DecodedSheet> {
        let path = file_path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileReadError(format!(
                "文件不存在: {}",
                path.display()
            )));
        }
        let options = DecodeOptions::for_path(path)?;
        let bytes = std::fs::read(path)?;
        self.decode(&bytes, &options)
    }
}
