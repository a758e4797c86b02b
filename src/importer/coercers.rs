// ==========================================
// 表格批量导入引擎 - 字段转换器
// ==========================================
// 职责: 单元格原始值 → 类型化值（纯函数，无 I/O）
// 约定: Ok(None) = 空单元格；Err(code) = 无法转换
// ==========================================

use crate::domain::import::{CellValue, FieldErrorCode};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// 转换结果
pub type Coerced<T> = Result<Option<T>, FieldErrorCode>;

// ==========================================
// 文本归一化
// ==========================================

/// 比较用键：去首尾空白、折叠变音符号、转大写、合并分隔符
///
/// 表头匹配与枚举/布尔同义词匹配共用此规则。
pub fn fold_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.trim().chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.extend(fold_char(ch).to_uppercase());
    }

    out
}

fn fold_char(ch: char) -> char {
    match ch {
        'ç' | 'Ç' => 'C',
        'ğ' | 'Ğ' => 'G',
        'ı' | 'İ' | 'î' | 'Î' | 'í' | 'ì' | 'ï' => 'I',
        'ö' | 'Ö' | 'ó' | 'ò' | 'ô' => 'O',
        'ş' | 'Ş' => 'S',
        'ü' | 'Ü' | 'û' | 'Û' | 'ú' | 'ù' => 'U',
        'â' | 'Â' | 'á' | 'à' | 'ä' => 'A',
        'é' | 'É' | 'è' | 'ê' | 'ë' => 'E',
        other => other,
    }
}

// ==========================================
// 字符串
// ==========================================

/// 空白 → None，其余去首尾空白
pub fn trimmed_or_null(cell: &CellValue) -> Option<String> {
    cell.as_text().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// 字符数必须落在 [min, max]
pub fn length_between(cell: &CellValue, min: usize, max: usize) -> Coerced<String> {
    match trimmed_or_null(cell) {
        None => Ok(None),
        Some(text) => {
            let len = text.chars().count();
            if len < min || len > max {
                Err(FieldErrorCode::InvalidLength)
            } else {
                Ok(Some(text))
            }
        }
    }
}

/// 去除常见分隔符后必须全为数字，且位数落在 [min, max]
pub fn digits_between(cell: &CellValue, min: usize, max: usize) -> Coerced<String> {
    let text = match trimmed_or_null(cell) {
        None => return Ok(None),
        Some(t) => t,
    };

    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | '+' | '(' | ')' | '-' | '.' | '/'))
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldErrorCode::InvalidNumber);
    }
    if digits.len() < min || digits.len() > max {
        return Err(FieldErrorCode::InvalidLength);
    }
    Ok(Some(digits))
}

// ==========================================
// 日期
// ==========================================

/// 日期：仅接受 YYYY-MM-DD 与 DD.MM.YYYY（日历日期，无时区）
pub fn parse_date(cell: &CellValue) -> Coerced<NaiveDate> {
    match cell {
        CellValue::Empty => Ok(None),
        // 未带日期格式的数值单元格不做序列号推断
        CellValue::Number(_) => Err(FieldErrorCode::InvalidDate),
        CellValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            parse_date_text(trimmed)
                .map(Some)
                .ok_or(FieldErrorCode::InvalidDate)
        }
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let all_digits = |s: &str, len: usize| s.len() == len && s.chars().all(|c| c.is_ascii_digit());

    let iso: Vec<&str> = text.split('-').collect();
    if let [y, m, d] = iso.as_slice() {
        if all_digits(y, 4) && all_digits(m, 2) && all_digits(d, 2) {
            return NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?);
        }
        return None;
    }

    let dotted: Vec<&str> = text.split('.').collect();
    if let [d, m, y] = dotted.as_slice() {
        if all_digits(d, 2) && all_digits(m, 2) && all_digits(y, 4) {
            return NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?);
        }
    }

    None
}

// ==========================================
// 数值
// ==========================================

const CURRENCY_TOKENS: &[&str] = &["₺", "TRY", "TL", "USD", "EUR", "$", "€"];

/// 小数：接受 `,` 或 `.` 作为小数分隔符，去除货币符号与千分位
pub fn parse_decimal(cell: &CellValue) -> Coerced<f64> {
    match cell {
        CellValue::Empty => Ok(None),
        CellValue::Number(n) => Ok(Some(*n)),
        CellValue::Text(text) => {
            if text.trim().is_empty() {
                return Ok(None);
            }
            parse_decimal_text(text)
                .map(Some)
                .ok_or(FieldErrorCode::InvalidNumber)
        }
    }
}

/// 小数（空值取调用方默认值）
pub fn decimal_or(cell: &CellValue, default: f64) -> Result<f64, FieldErrorCode> {
    parse_decimal(cell).map(|v| v.unwrap_or(default))
}

fn parse_decimal_text(raw: &str) -> Option<f64> {
    let mut cleaned = raw.trim().to_uppercase();
    for token in CURRENCY_TOKENS {
        cleaned = cleaned.replace(token, "");
    }
    cleaned.retain(|c| !c.is_whitespace() && c != '\'' && c != '\u{a0}');

    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, cleaned.trim_start_matches('+').to_string()),
    };

    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }
    // 分隔符两侧都必须有数字（"12," / ",5" / "1..2" 不是数字）
    if body.starts_with([',', '.'])
        || body.ends_with([',', '.'])
        || body.contains(",,")
        || body.contains("..")
    {
        return None;
    }

    let commas = body.matches(',').count();
    let dots = body.matches('.').count();

    let normalized = match (commas, dots) {
        (0, 0) => body,
        (c, d) if c > 0 && d > 0 => {
            // 两种分隔符同时出现：最后出现者为小数分隔符
            let last_comma = body.rfind(',')?;
            let last_dot = body.rfind('.')?;
            let (decimal, thousands, decimal_count) = if last_comma > last_dot {
                (',', '.', c)
            } else {
                ('.', ',', d)
            };
            if decimal_count != 1 {
                return None;
            }
            body.replace(thousands, "").replace(decimal, ".")
        }
        (1, 0) => body.replace(',', "."),
        (_, 0) => body.replace(',', ""),
        (0, 1) => body,
        (0, _) => body.replace('.', ""),
        _ => return None,
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

// ==========================================
// 有界整数
// ==========================================

/// 越界处理策略（按字段固定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfRange {
    /// 次要运营字段：越界值替换为默认值
    ClampToDefault,
    /// 标识性字段：越界即报错
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub min: i64,
    pub max: i64,
    pub default: i64,
    pub on_out_of_range: OutOfRange,
}

/// 有界整数（空值取默认值；非整数视同越界）
pub fn bounded_int(cell: &CellValue, range: &IntRange) -> Result<i64, FieldErrorCode> {
    let value = match parse_decimal(cell)? {
        None => return Ok(range.default),
        Some(v) => v,
    };

    let in_range =
        value.fract() == 0.0 && value >= range.min as f64 && value <= range.max as f64;
    if in_range {
        return Ok(value as i64);
    }

    match range.on_out_of_range {
        OutOfRange::ClampToDefault => {
            warn!(
                value,
                min = range.min,
                max = range.max,
                default = range.default,
                "越界值替换为默认值"
            );
            Ok(range.default)
        }
        OutOfRange::Reject => Err(FieldErrorCode::InvalidNumber),
    }
}

// ==========================================
// 枚举（同义词表）
// ==========================================

/// 有文档说明的枚举默认值（无法识别的输入采用此值）
#[derive(Debug, Clone, Copy)]
pub struct EnumDefault<T: 'static> {
    pub value: T,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct SynonymTable<T: 'static> {
    pub entries: &'static [(&'static str, T)],
    pub default: Option<EnumDefault<T>>,
}

impl<T: Copy + std::fmt::Debug> SynonymTable<T> {
    /// 空值 → Ok(None)；无法识别 → 默认值（若有）否则 invalid_enum
    pub fn resolve(&self, cell: &CellValue) -> Coerced<T> {
        let text = match trimmed_or_null(cell) {
            None => return Ok(None),
            Some(t) => t,
        };
        let key = fold_key(&text);

        if let Some((_, value)) = self.entries.iter().find(|(syn, _)| fold_key(syn) == key) {
            return Ok(Some(*value));
        }

        match &self.default {
            Some(default) => {
                debug!(input = %text, value = ?default.value, reason = default.reason, "无法识别的枚举值，采用默认值");
                Ok(Some(default.value))
            }
            None => Err(FieldErrorCode::InvalidEnum),
        }
    }
}

// ==========================================
// 布尔（同义词表）
// ==========================================

const TRUTHY: &[&str] = &["EVET", "E", "VAR", "AKTIF", "DOGRU", "TRUE", "YES", "Y", "1", "X"];
const FALSY: &[&str] = &["HAYIR", "H", "YOK", "PASIF", "YANLIS", "FALSE", "NO", "N", "0"];

/// 无法识别的布尔输入的处理方式（按字段说明）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolFallback {
    Reject,
    TrueBiased { reason: &'static str },
}

pub fn parse_bool(cell: &CellValue, fallback: BoolFallback) -> Coerced<bool> {
    let text = match trimmed_or_null(cell) {
        None => return Ok(None),
        Some(t) => t,
    };
    let key = fold_key(&text);

    if TRUTHY.contains(&key.as_str()) {
        return Ok(Some(true));
    }
    if FALSY.contains(&key.as_str()) {
        return Ok(Some(false));
    }

    match fallback {
        BoolFallback::TrueBiased { reason } => {
            debug!(input = %text, reason, "无法识别的布尔值，按 true 处理");
            Ok(Some(true))
        }
        BoolFallback::Reject => Err(FieldErrorCode::InvalidEnum),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_fold_key() {
        assert_eq!(fold_key("  Malzeme   Adı "), "MALZEME ADI");
        assert_eq!(fold_key("Başlangıç_Tarihi"), "BASLANGIC TARIHI");
        assert_eq!(fold_key("kart-son-4"), "KART SON 4");
        assert_eq!(fold_key("Ödeme Günü"), "ODEME GUNU");
    }

    #[test]
    fn test_trimmed_or_null() {
        assert_eq!(trimmed_or_null(&text("   ")), None);
        assert_eq!(trimmed_or_null(&CellValue::Empty), None);
        assert_eq!(trimmed_or_null(&text("  a b ")), Some("a b".to_string()));
        assert_eq!(trimmed_or_null(&CellValue::Number(42.0)), Some("42".to_string()));
    }

    #[test]
    fn test_parse_date_accepted_shapes() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        assert_eq!(parse_date(&text("2025-01-20")), Ok(Some(expected)));
        assert_eq!(parse_date(&text("20.01.2025")), Ok(Some(expected)));
        assert_eq!(parse_date(&text(" ")), Ok(None));
    }

    #[test]
    fn test_parse_date_rejects_other_shapes() {
        for bad in ["2025/01/20", "20250120", "2025-1-20", "1.1.2025", "31.02.2025", "yarın"] {
            assert_eq!(parse_date(&text(bad)), Err(FieldErrorCode::InvalidDate), "{bad}");
        }
        assert_eq!(parse_date(&CellValue::Number(45000.0)), Err(FieldErrorCode::InvalidDate));
    }

    #[test]
    fn test_parse_decimal_locale_variants() {
        assert_eq!(parse_decimal(&text("1.234,56")), Ok(Some(1234.56)));
        assert_eq!(parse_decimal(&text("1,234.56")), Ok(Some(1234.56)));
        assert_eq!(parse_decimal(&text("12,5")), Ok(Some(12.5)));
        assert_eq!(parse_decimal(&text("12.5")), Ok(Some(12.5)));
        assert_eq!(parse_decimal(&text("1.234.567")), Ok(Some(1234567.0)));
        assert_eq!(parse_decimal(&text("₺ 1 250,00")), Ok(Some(1250.0)));
        assert_eq!(parse_decimal(&text("99,90 TL")), Ok(Some(99.9)));
        assert_eq!(parse_decimal(&text("-5")), Ok(Some(-5.0)));
        assert_eq!(parse_decimal(&CellValue::Number(7.25)), Ok(Some(7.25)));
    }

    #[test]
    fn test_parse_decimal_residue() {
        assert_eq!(parse_decimal(&text("12a")), Err(FieldErrorCode::InvalidNumber));
        assert_eq!(parse_decimal(&text("TL")), Err(FieldErrorCode::InvalidNumber));
        assert_eq!(parse_decimal(&text("1,2.3,4")), Err(FieldErrorCode::InvalidNumber));
    }

    #[test]
    fn test_parse_decimal_dangling_separator() {
        for raw in ["12,", ",5", "12.", ".5", "-,5", "1..2"] {
            assert_eq!(parse_decimal(&text(raw)), Err(FieldErrorCode::InvalidNumber), "{}", raw);
        }
        assert_eq!(parse_decimal(&text("0,5")), Ok(Some(0.5)));
        assert_eq!(parse_decimal(&text("1.234,56")), Ok(Some(1234.56)));
    }

    #[test]
    fn test_decimal_or_default() {
        assert_eq!(decimal_or(&CellValue::Empty, 0.0), Ok(0.0));
        assert_eq!(decimal_or(&text("  "), 3.5), Ok(3.5));
        assert_eq!(decimal_or(&text("x"), 0.0), Err(FieldErrorCode::InvalidNumber));
    }

    #[test]
    fn test_bounded_int_policies() {
        let clamp = IntRange {
            min: 1,
            max: 28,
            default: 1,
            on_out_of_range: OutOfRange::ClampToDefault,
        };
        assert_eq!(bounded_int(&text("15"), &clamp), Ok(15));
        assert_eq!(bounded_int(&text("31"), &clamp), Ok(1));
        assert_eq!(bounded_int(&text("2,5"), &clamp), Ok(1));
        assert_eq!(bounded_int(&CellValue::Empty, &clamp), Ok(1));

        let reject = IntRange {
            on_out_of_range: OutOfRange::Reject,
            ..clamp
        };
        assert_eq!(bounded_int(&text("31"), &reject), Err(FieldErrorCode::InvalidNumber));
        assert_eq!(bounded_int(&CellValue::Number(28.0), &reject), Ok(28));
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Color {
        Red,
        Blue,
    }

    #[test]
    fn test_synonym_table() {
        static STRICT: SynonymTable<Color> = SynonymTable {
            entries: &[("kırmızı", Color::Red), ("red", Color::Red), ("mavi", Color::Blue)],
            default: None,
        };
        assert_eq!(STRICT.resolve(&text("KIRMIZI")), Ok(Some(Color::Red)));
        assert_eq!(STRICT.resolve(&text(" Mavi ")), Ok(Some(Color::Blue)));
        assert_eq!(STRICT.resolve(&CellValue::Empty), Ok(None));
        assert_eq!(STRICT.resolve(&text("yeşil")), Err(FieldErrorCode::InvalidEnum));

        let lenient = SynonymTable {
            default: Some(EnumDefault {
                value: Color::Blue,
                reason: "test",
            }),
            ..STRICT
        };
        assert_eq!(lenient.resolve(&text("yeşil")), Ok(Some(Color::Blue)));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(&text("Evet"), BoolFallback::Reject), Ok(Some(true)));
        assert_eq!(parse_bool(&text("hayır"), BoolFallback::Reject), Ok(Some(false)));
        assert_eq!(parse_bool(&CellValue::Number(0.0), BoolFallback::Reject), Ok(Some(false)));
        assert_eq!(parse_bool(&text("belki"), BoolFallback::Reject), Err(FieldErrorCode::InvalidEnum));
        assert_eq!(
            parse_bool(&text("belki"), BoolFallback::TrueBiased { reason: "test" }),
            Ok(Some(true))
        );
        assert_eq!(parse_bool(&text(""), BoolFallback::Reject), Ok(None));
    }

    #[test]
    fn test_digits_and_length() {
        assert_eq!(digits_between(&text("0532 123 45 67"), 10, 11), Ok(Some("05321234567".to_string())));
        assert_eq!(digits_between(&text("12ab"), 1, 5), Err(FieldErrorCode::InvalidNumber));
        assert_eq!(digits_between(&text("123"), 4, 4), Err(FieldErrorCode::InvalidLength));
        assert_eq!(length_between(&text("Ziraat"), 1, 3), Err(FieldErrorCode::InvalidLength));
        assert_eq!(length_between(&CellValue::Empty, 1, 3), Ok(None));
    }
}
