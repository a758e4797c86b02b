// ==========================================
// 表格批量导入引擎 - 物料目录导入流
// ==========================================
// 自然键: code
// 表头模式: SubstringTolerant（旧版目录表的列名带备注/前后缀）
// ==========================================

use crate::domain::material::MaterialRecord;
use crate::domain::types::MaterialUnit;
use crate::domain::FieldErrorCode;
use crate::importer::coercers::{BoolFallback, EnumDefault, IntRange, OutOfRange, SynonymTable};
use crate::importer::flows::{FlowKind, ImportFlow};
use crate::importer::header_resolver::{FieldDef, HeaderMap, MatchMode};
use crate::importer::row_validator::FieldCollector;

const FIELDS: &[FieldDef] = &[
    FieldDef {
        name: "code",
        label: "Malzeme Kodu",
        synonyms: &["KOD", "STOK KODU", "CODE"],
        required: true,
    },
    FieldDef {
        name: "name",
        label: "Malzeme Adı",
        synonyms: &["MALZEME ADI", "ADI", "ACIKLAMA", "NAME"],
        required: true,
    },
    FieldDef {
        name: "unit",
        label: "Birim",
        synonyms: &["BIRIM", "UNIT"],
        required: false,
    },
    FieldDef {
        name: "base_price",
        label: "Baz Fiyat",
        synonyms: &["FIYAT", "BIRIM FIYAT", "PRICE"],
        required: false,
    },
    FieldDef {
        name: "vat_rate",
        label: "KDV Oranı",
        synonyms: &["KDV", "VAT"],
        required: false,
    },
    FieldDef {
        name: "category",
        label: "Kategori",
        synonyms: &["KATEGORI", "GRUP", "CATEGORY"],
        required: false,
    },
    FieldDef {
        name: "is_active",
        label: "Aktif",
        synonyms: &["AKTIF", "DURUM", "ACTIVE"],
        required: false,
    },
];

static HEADERS: HeaderMap = HeaderMap::new(MatchMode::SubstringTolerant, FIELDS);

static UNITS: SynonymTable<MaterialUnit> = SynonymTable {
    entries: &[
        ("ADET", MaterialUnit::Piece),
        ("AD", MaterialUnit::Piece),
        ("PIECE", MaterialUnit::Piece),
        ("PCS", MaterialUnit::Piece),
        ("METRE", MaterialUnit::Meter),
        ("MT", MaterialUnit::Meter),
        ("M", MaterialUnit::Meter),
        ("METER", MaterialUnit::Meter),
        ("KILOGRAM", MaterialUnit::Kilogram),
        ("KG", MaterialUnit::Kilogram),
        ("KILO", MaterialUnit::Kilogram),
        ("LITRE", MaterialUnit::Liter),
        ("LT", MaterialUnit::Liter),
        ("L", MaterialUnit::Liter),
        ("LITER", MaterialUnit::Liter),
        ("KOLI", MaterialUnit::Box),
        ("KUTU", MaterialUnit::Box),
        ("BOX", MaterialUnit::Box),
    ],
    default: Some(EnumDefault {
        value: MaterialUnit::Piece,
        reason: "旧版目录表的单位列为自由文本，无法识别时按件计",
    }),
};

const VAT_RATE: IntRange = IntRange {
    min: 0,
    max: 100,
    default: 20,
    on_out_of_range: OutOfRange::Reject,
};

const ACTIVE_FALLBACK: BoolFallback = BoolFallback::TrueBiased {
    reason: "旧版目录表的状态列常写自由文本（如 satışta），除明确否定外均视为在售",
};

pub struct MaterialsFlow;

impl ImportFlow for MaterialsFlow {
    type Payload = MaterialRecord;

    fn kind(&self) -> FlowKind {
        FlowKind::Materials
    }

    fn header_map(&self) -> &'static HeaderMap {
        &HEADERS
    }

    fn natural_key_field(&self) -> &'static str {
        "code"
    }

    fn natural_key<'p>(&self, payload: &'p MaterialRecord) -> &'p str {
        &payload.code
    }

    fn coerce_row(&self, fields: &mut FieldCollector<'_>) -> Option<MaterialRecord> {
        let code = fields.required_string("code");
        let name = fields.required_string("name");
        let unit = fields.enumeration("unit", &UNITS);
        let base_price = fields.decimal("base_price", 0.0);
        let vat_rate = fields.bounded_int("vat_rate", &VAT_RATE);
        let category = fields.string("category");
        let is_active = fields.boolean("is_active", ACTIVE_FALLBACK);

        if matches!(base_price, Some(p) if p < 0.0) {
            fields.reject("base_price", FieldErrorCode::InvalidNumber);
        }

        if fields.has_errors() {
            return None;
        }

        Some(MaterialRecord {
            code: code?,
            name: name?,
            unit: unit.unwrap_or(MaterialUnit::Piece),
            base_price: base_price?,
            vat_rate: vat_rate?,
            category,
            is_active: is_active.unwrap_or(true),
        })
    }

    fn example_row(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("code", "DK230"),
            ("name", "Duvar Kasası 230mm"),
            ("unit", "adet"),
            ("base_price", "1.234,56"),
            ("vat_rate", "20"),
            ("category", "Kasa"),
            ("is_active", "evet"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::{CellValue, RawRow};
    use crate::importer::row_validator::{RowOutcome, RowValidator};

    fn validate(headers: &[&str], values: &[&str]) -> RowOutcome<MaterialRecord> {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let resolution = MaterialsFlow.header_map().resolve(&headers);
        let cells = headers
            .iter()
            .cloned()
            .zip(values.iter().map(|v| CellValue::from(*v)))
            .collect();
        RowValidator::new(&MaterialsFlow, &resolution).validate(&RawRow::new(3, cells))
    }

    #[test]
    fn test_turkish_decimal_price() {
        let outcome = validate(&["Malzeme Kodu", "Malzeme Adı", "Baz Fiyat"], &["DK230", "Kasa", "1.234,56"]);
        match outcome {
            RowOutcome::Valid(row) => {
                assert_eq!(row.natural_key, "DK230");
                assert_eq!(row.payload.base_price, 1234.56);
                assert_eq!(row.payload.vat_rate, 20);
                assert_eq!(row.payload.unit, MaterialUnit::Piece);
                assert!(row.payload.is_active);
            }
            other => panic!("expected valid row, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_headers_and_free_text() {
        let outcome = validate(
            &["STOK KODU", "Malzeme Adı (TR)", "Birim Fiyatı", "Birim", "KDV %", "Durum"],
            &["A-1", "Vida", "12,5 TL", "koli", "18", "satışta"],
        );
        match outcome {
            RowOutcome::Valid(row) => {
                assert_eq!(row.payload.base_price, 12.5);
                assert_eq!(row.payload.unit, MaterialUnit::Box);
                assert_eq!(row.payload.vat_rate, 18);
                assert!(row.payload.is_active);
            }
            other => panic!("expected valid row, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_fields_are_all_reported() {
        let outcome = validate(
            &["Malzeme Kodu", "Malzeme Adı", "Baz Fiyat", "KDV Oranı"],
            &["DK1", "", "-3", "120"],
        );
        match outcome {
            RowOutcome::Invalid(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| (e.field.as_str(), e.code)).collect();
                assert!(fields.contains(&("name", FieldErrorCode::Required)));
                assert!(fields.contains(&("vat_rate", FieldErrorCode::InvalidNumber)));
                assert!(fields.contains(&("base_price", FieldErrorCode::InvalidNumber)));
                assert!(errors.iter().all(|e| e.row_number == 3));
            }
            other => panic!("expected invalid row, got {:?}", other),
        }
    }
}
