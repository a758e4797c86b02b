// ==========================================
// 表格批量导入引擎 - 导入模板导出
// ==========================================
// 第 1 个工作表: 表头 = 各字段模板标签（与表头解析器接受的文本一致）+ 可选示例行
// 第 2 个工作表: 字段说明（标准字段名 / 是否必填 / 可接受的同义词）
// 工具: rust_xlsxwriter
// ==========================================

use crate::importer::error::ImportResult;
use crate::importer::flows::ImportFlow;
use rust_xlsxwriter::{Color, Format, Workbook};
use tracing::info;

pub fn export_template<F: ImportFlow>(flow: &F, with_example: bool) -> ImportResult<Vec<u8>> {
    let map = flow.header_map();
    let mut workbook = Workbook::new();

    let header_format = Format::new().set_bold();
    let required_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xFFE699));

    let sheet = workbook.add_worksheet();
    sheet.set_name(flow.kind().as_str())?;
    for (col, field) in map.fields.iter().enumerate() {
        let format = if field.required {
            &required_format
        } else {
            &header_format
        };
        sheet.write_string_with_format(0, col as u16, field.label, format)?;
    }

    if with_example {
        let example = flow.example_row();
        for (col, field) in map.fields.iter().enumerate() {
            let value = example
                .iter()
                .find(|(name, _)| *name == field.name)
                .map(|(_, v)| *v)
                .unwrap_or("");
            if !value.is_empty() {
                sheet.write_string(1, col as u16, value)?;
            }
        }
    }
    sheet.set_freeze_panes(1, 0)?;
    sheet.autofit();

    let notes = workbook.add_worksheet();
    notes.set_name("fields")?;
    notes.write_string_with_format(0, 0, "field", &header_format)?;
    notes.write_string_with_format(0, 1, "label", &header_format)?;
    notes.write_string_with_format(0, 2, "required", &header_format)?;
    notes.write_string_with_format(0, 3, "synonyms", &header_format)?;
    for (idx, field) in map.fields.iter().enumerate() {
        let row = idx as u32 + 1;
        notes.write_string(row, 0, field.name)?;
        notes.write_string(row, 1, field.label)?;
        notes.write_string(row, 2, if field.required { "yes" } else { "no" })?;
        notes.write_string(row, 3, field.synonyms.join(", "))?;
    }
    notes.autofit();

    let bytes = workbook.save_to_buffer()?;
    info!(flow = %flow.kind(), with_example, size = bytes.len(), "导入模板已生成");
    Ok(bytes)
}
