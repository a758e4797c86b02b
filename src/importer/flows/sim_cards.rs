// ==========================================
// 表格批量导入引擎 - SIM 卡库存导入流
// ==========================================
// 自然键: phone_number（10 位，不含国家码/长途前缀）
// 表头模式: ExactNormalized
// ==========================================

use crate::domain::import::CellValue;
use crate::domain::sim_card::SimCardRecord;
use crate::domain::types::{SimOperator, SimStatus};
use crate::domain::FieldErrorCode;
use crate::importer::coercers::{trimmed_or_null, Coerced, EnumDefault, SynonymTable};
use crate::importer::flows::{FlowKind, ImportFlow};
use crate::importer::header_resolver::{FieldDef, HeaderMap, MatchMode};
use crate::importer::row_validator::FieldCollector;

const FIELDS: &[FieldDef] = &[
    FieldDef {
        name: "phone_number",
        label: "Telefon Numarası",
        synonyms: &["TELEFON", "TELEFON NO", "GSM NO", "HAT NO", "NUMARA"],
        required: true,
    },
    FieldDef {
        name: "iccid",
        label: "ICCID",
        synonyms: &["ICCID NO", "SIM SERI NO"],
        required: false,
    },
    FieldDef {
        name: "operator",
        label: "Operatör",
        synonyms: &["OPERATOR"],
        required: false,
    },
    FieldDef {
        name: "status",
        label: "Durum",
        synonyms: &["HAT DURUMU", "STATUS"],
        required: true,
    },
    FieldDef {
        name: "monthly_fee",
        label: "Aylık Ücret",
        synonyms: &["UCRET", "AYLIK TUTAR"],
        required: false,
    },
    FieldDef {
        name: "activation_date",
        label: "Aktivasyon Tarihi",
        synonyms: &["AKTIVASYON", "ACILIS TARIHI"],
        required: false,
    },
    FieldDef {
        name: "notes",
        label: "Not",
        synonyms: &["NOTLAR", "ACIKLAMA"],
        required: false,
    },
];

static HEADERS: HeaderMap = HeaderMap::new(MatchMode::ExactNormalized, FIELDS);

static OPERATORS: SynonymTable<SimOperator> = SynonymTable {
    entries: &[
        ("TURKCELL", SimOperator::Turkcell),
        ("TCELL", SimOperator::Turkcell),
        ("VODAFONE", SimOperator::Vodafone),
        ("VF", SimOperator::Vodafone),
        ("TURK TELEKOM", SimOperator::TurkTelekom),
        ("TURKTELEKOM", SimOperator::TurkTelekom),
        ("TT", SimOperator::TurkTelekom),
        ("AVEA", SimOperator::TurkTelekom),
    ],
    default: Some(EnumDefault {
        value: SimOperator::Turkcell,
        reason: "库存中绝大多数线路为 Turkcell 企业套餐，未填或无法识别时按 Turkcell 登记",
    }),
};

static STATUSES: SynonymTable<SimStatus> = SynonymTable {
    entries: &[
        ("AKTIF", SimStatus::Active),
        ("ACTIVE", SimStatus::Active),
        ("PASIF", SimStatus::Passive),
        ("PASSIVE", SimStatus::Passive),
        ("KAPALI", SimStatus::Passive),
        ("ASKIDA", SimStatus::Suspended),
        ("ASKIYA ALINDI", SimStatus::Suspended),
        ("SUSPENDED", SimStatus::Suspended),
    ],
    default: None,
};

/// 电话号码规范化：去除空格/符号与 90 / 0 前缀，剩余必须为 10 位数字
pub fn normalize_phone(cell: &CellValue) -> Coerced<String> {
    let text = match trimmed_or_null(cell) {
        None => return Ok(None),
        Some(t) => t,
    };
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '+' | '(' | ')' | '-' | '.'))
        .collect();
    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldErrorCode::InvalidNumber);
    }

    let national = if compact.len() == 12 && compact.starts_with("90") {
        &compact[2..]
    } else if compact.len() == 11 && compact.starts_with('0') {
        &compact[1..]
    } else {
        compact.as_str()
    };

    if national.len() != 10 {
        return Err(FieldErrorCode::InvalidLength);
    }
    Ok(Some(national.to_string()))
}

pub struct SimCardsFlow;

impl ImportFlow for SimCardsFlow {
    type Payload = SimCardRecord;

    fn kind(&self) -> FlowKind {
        FlowKind::SimCards
    }

    fn header_map(&self) -> &'static HeaderMap {
        &HEADERS
    }

    fn natural_key_field(&self) -> &'static str {
        "phone_number"
    }

    fn natural_key<'p>(&self, payload: &'p SimCardRecord) -> &'p str {
        &payload.phone_number
    }

    fn coerce_row(&self, fields: &mut FieldCollector<'_>) -> Option<SimCardRecord> {
        let phone_number = match normalize_phone(fields.cell("phone_number")) {
            Ok(Some(phone)) => Some(phone),
            Ok(None) => {
                fields.reject("phone_number", FieldErrorCode::Required);
                None
            }
            Err(code) => {
                fields.reject("phone_number", code);
                None
            }
        };
        let iccid = fields.digits("iccid", 19, 20);
        let operator = fields.enumeration("operator", &OPERATORS);
        let status = fields.required_enumeration("status", &STATUSES);
        let monthly_fee = fields.decimal("monthly_fee", 0.0);
        let activation_date = fields.date("activation_date");
        let notes = fields.string("notes");

        if matches!(monthly_fee, Some(fee) if fee < 0.0) {
            fields.reject("monthly_fee", FieldErrorCode::InvalidNumber);
        }

        if fields.has_errors() {
            return None;
        }

        Some(SimCardRecord {
            phone_number: phone_number?,
            iccid,
            operator: operator.unwrap_or(SimOperator::Turkcell),
            status: status?,
            monthly_fee: monthly_fee?,
            activation_date,
            notes,
        })
    }

    fn example_row(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("phone_number", "0532 123 45 67"),
            ("iccid", "8990011234567890123"),
            ("operator", "Turkcell"),
            ("status", "aktif"),
            ("monthly_fee", "149,90"),
            ("activation_date", "15.01.2025"),
            ("notes", "Depo hattı"),
        ]
    }
}
