// ==========================================
// 表格批量导入引擎 - 客户订阅导入流
// ==========================================
// 自然键: customer_code
// 表头模式: ExactNormalized
// 跨字段规则:
//   recurring_card ⇒ card_bank_name + 4 位 card_last4
//   manual_cash    ⇒ cash_collector
//   end_date 不得早于 start_date
// ==========================================

use crate::domain::import::FieldErrorCode;
use crate::domain::subscription::{PaymentDetails, SubscriptionRecord};
use crate::domain::types::SubscriptionType;
use crate::importer::coercers::{trimmed_or_null, BoolFallback, IntRange, OutOfRange, SynonymTable};
use crate::importer::flows::{FlowKind, ImportFlow};
use crate::importer::header_resolver::{FieldDef, HeaderMap, MatchMode};
use crate::importer::row_validator::FieldCollector;

const FIELDS: &[FieldDef] = &[
    FieldDef {
        name: "customer_code",
        label: "Müşteri Kodu",
        synonyms: &["MUSTERI NO", "CARI KOD"],
        required: true,
    },
    FieldDef {
        name: "subscription_type",
        label: "Abonelik Tipi",
        synonyms: &["ODEME TIPI", "ODEME SEKLI"],
        required: true,
    },
    FieldDef {
        name: "amount",
        label: "Tutar",
        synonyms: &["AYLIK TUTAR", "UCRET"],
        required: true,
    },
    FieldDef {
        name: "billing_day",
        label: "Ödeme Günü",
        synonyms: &["FATURA GUNU"],
        required: false,
    },
    FieldDef {
        name: "start_date",
        label: "Başlangıç Tarihi",
        synonyms: &["BASLANGIC"],
        required: true,
    },
    FieldDef {
        name: "end_date",
        label: "Bitiş Tarihi",
        synonyms: &["BITIS"],
        required: false,
    },
    FieldDef {
        name: "card_bank_name",
        label: "Kart Bankası",
        synonyms: &["BANKA"],
        required: false,
    },
    FieldDef {
        name: "card_last4",
        label: "Kart Son 4 Hane",
        synonyms: &["KART SON 4", "SON 4 HANE"],
        required: false,
    },
    FieldDef {
        name: "cash_collector",
        label: "Tahsilatçı",
        synonyms: &["TAHSILAT SORUMLUSU"],
        required: false,
    },
    FieldDef {
        name: "auto_renew",
        label: "Otomatik Yenileme",
        synonyms: &["YENILEME"],
        required: false,
    },
];

static HEADERS: HeaderMap = HeaderMap::new(MatchMode::ExactNormalized, FIELDS);

static SUBSCRIPTION_TYPES: SynonymTable<SubscriptionType> = SynonymTable {
    entries: &[
        ("KART", SubscriptionType::RecurringCard),
        ("KREDI KARTI", SubscriptionType::RecurringCard),
        ("OTOMATIK ODEME", SubscriptionType::RecurringCard),
        ("RECURRING CARD", SubscriptionType::RecurringCard),
        ("NAKIT", SubscriptionType::ManualCash),
        ("ELDEN", SubscriptionType::ManualCash),
        ("MANUAL CASH", SubscriptionType::ManualCash),
        ("HAVALE", SubscriptionType::BankTransfer),
        ("EFT", SubscriptionType::BankTransfer),
        ("HAVALE/EFT", SubscriptionType::BankTransfer),
        ("BANK TRANSFER", SubscriptionType::BankTransfer),
    ],
    default: None,
};

const BILLING_DAY: IntRange = IntRange {
    min: 1,
    max: 28,
    default: 1,
    on_out_of_range: OutOfRange::ClampToDefault,
};

pub struct SubscriptionsFlow;

impl SubscriptionsFlow {
    /// 按付款类型组装子字段组，缺失项记为 conditional_required
    fn payment_details(
        fields: &mut FieldCollector<'_>,
        subscription_type: SubscriptionType,
    ) -> Option<PaymentDetails> {
        match subscription_type {
            SubscriptionType::RecurringCard => {
                let bank = fields.string("card_bank_name");
                if bank.is_none() {
                    fields.reject("card_bank_name", FieldErrorCode::ConditionalRequired);
                }

                let last4 = match trimmed_or_null(fields.cell("card_last4")) {
                    None => {
                        fields.reject("card_last4", FieldErrorCode::ConditionalRequired);
                        None
                    }
                    Some(text) if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) => {
                        Some(text)
                    }
                    Some(_) => {
                        fields.reject("card_last4", FieldErrorCode::InvalidLength);
                        None
                    }
                };

                Some(PaymentDetails::RecurringCard {
                    card_bank_name: bank?,
                    card_last4: last4?,
                })
            }
            SubscriptionType::ManualCash => match fields.string("cash_collector") {
                Some(cash_collector) => Some(PaymentDetails::ManualCash { cash_collector }),
                None => {
                    fields.reject("cash_collector", FieldErrorCode::ConditionalRequired);
                    None
                }
            },
            SubscriptionType::BankTransfer => Some(PaymentDetails::BankTransfer),
        }
    }
}

impl ImportFlow for SubscriptionsFlow {
    type Payload = SubscriptionRecord;

    fn kind(&self) -> FlowKind {
        FlowKind::Subscriptions
    }

    fn header_map(&self) -> &'static HeaderMap {
        &HEADERS
    }

    fn natural_key_field(&self) -> &'static str {
        "customer_code"
    }

    fn natural_key<'p>(&self, payload: &'p SubscriptionRecord) -> &'p str {
        &payload.customer_code
    }

    fn coerce_row(&self, fields: &mut FieldCollector<'_>) -> Option<SubscriptionRecord> {
        let customer_code = fields.required_string("customer_code");
        let subscription_type = fields.required_enumeration("subscription_type", &SUBSCRIPTION_TYPES);
        let amount = fields.required_decimal("amount");
        let billing_day = fields.bounded_int("billing_day", &BILLING_DAY);
        let start_date = fields.required_date("start_date");
        let end_date = fields.date("end_date");
        let auto_renew = fields.boolean("auto_renew", BoolFallback::Reject);

        if matches!(amount, Some(a) if a < 0.0) {
            fields.reject("amount", FieldErrorCode::InvalidNumber);
        }

        // ===== 跨字段规则 =====
        let payment = subscription_type.and_then(|t| Self::payment_details(fields, t));

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                fields.reject("end_date", FieldErrorCode::InvalidDate);
            }
        }

        if fields.has_errors() {
            return None;
        }

        Some(SubscriptionRecord {
            customer_code: customer_code?,
            payment: payment?,
            amount: amount?,
            billing_day: billing_day?,
            start_date: start_date?,
            end_date,
            auto_renew: auto_renew.unwrap_or(true),
        })
    }

    fn example_row(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("customer_code", "C-1001"),
            ("subscription_type", "kart"),
            ("amount", "450,00"),
            ("billing_day", "5"),
            ("start_date", "01.02.2025"),
            ("end_date", ""),
            ("card_bank_name", "Ziraat"),
            ("card_last4", "4242"),
            ("cash_collector", ""),
            ("auto_renew", "evet"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::{CellValue, FieldError, RawRow};
    use crate::importer::row_validator::{RowOutcome, RowValidator};
    use chrono::NaiveDate;

    fn validate(pairs: &[(&str, &str)]) -> RowOutcome<SubscriptionRecord> {
        let headers: Vec<String> = pairs.iter().map(|(h, _)| h.to_string()).collect();
        let resolution = SubscriptionsFlow.header_map().resolve(&headers);
        let cells = pairs
            .iter()
            .map(|(h, v)| (h.to_string(), CellValue::from(*v)))
            .collect();
        RowValidator::new(&SubscriptionsFlow, &resolution).validate(&RawRow::new(5, cells))
    }

    fn errors_of(outcome: RowOutcome<SubscriptionRecord>) -> Vec<FieldError> {
        match outcome {
            RowOutcome::Invalid(errors) => errors,
            RowOutcome::Valid(row) => panic!("expected invalid row, got {:?}", row),
        }
    }

    #[test]
    fn test_card_without_bank_details_is_conditional_required() {
        let errors = errors_of(validate(&[
            ("Müşteri Kodu", "C-1"),
            ("Abonelik Tipi", "kart"),
            ("Tutar", "100"),
            ("Başlangıç Tarihi", "2025-01-01"),
            ("Kart Bankası", ""),
            ("Kart Son 4 Hane", ""),
        ]));

        let mut fields: Vec<_> = errors.iter().map(|e| (e.field.as_str(), e.code)).collect();
        fields.sort_by_key(|(field, _)| *field);
        assert_eq!(
            fields,
            vec![
                ("card_bank_name", FieldErrorCode::ConditionalRequired),
                ("card_last4", FieldErrorCode::ConditionalRequired),
            ]
        );
    }

    #[test]
    fn test_malformed_last4_is_invalid_length() {
        let errors = errors_of(validate(&[
            ("Müşteri Kodu", "C-1"),
            ("Abonelik Tipi", "Kredi Kartı"),
            ("Tutar", "100"),
            ("Başlangıç Tarihi", "2025-01-01"),
            ("Kart Bankası", "Ziraat"),
            ("Kart Son 4 Hane", "42"),
        ]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "card_last4");
        assert_eq!(errors[0].code, FieldErrorCode::InvalidLength);
    }

    #[test]
    fn test_cash_requires_collector() {
        let errors = errors_of(validate(&[
            ("Müşteri Kodu", "C-2"),
            ("Abonelik Tipi", "elden"),
            ("Tutar", "100"),
            ("Başlangıç Tarihi", "2025-01-01"),
        ]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "cash_collector");
        assert_eq!(errors[0].code, FieldErrorCode::ConditionalRequired);
    }

    #[test]
    fn test_end_before_start_is_invalid_date() {
        let errors = errors_of(validate(&[
            ("Müşteri Kodu", "C-3"),
            ("Abonelik Tipi", "havale"),
            ("Tutar", "100"),
            ("Başlangıç Tarihi", "01.03.2025"),
            ("Bitiş Tarihi", "01.02.2025"),
        ]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "end_date");
        assert_eq!(errors[0].code, FieldErrorCode::InvalidDate);
    }

    #[test]
    fn test_valid_transfer_with_clamped_billing_day() {
        let outcome = validate(&[
            ("Müşteri Kodu", "C-4"),
            ("Abonelik Tipi", "EFT"),
            ("Tutar", "1.250,00"),
            ("Ödeme Günü", "31"),
            ("Başlangıç Tarihi", "2025-01-01"),
            ("Otomatik Yenileme", "hayır"),
        ]);
        match outcome {
            RowOutcome::Valid(row) => {
                assert_eq!(row.natural_key, "C-4");
                assert_eq!(row.payload.payment, PaymentDetails::BankTransfer);
                assert_eq!(row.payload.amount, 1250.0);
                assert_eq!(row.payload.billing_day, 1);
                assert_eq!(row.payload.start_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
                assert!(!row.payload.auto_renew);
            }
            other => panic!("expected valid row, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_auto_renew_is_rejected() {
        let errors = errors_of(validate(&[
            ("Müşteri Kodu", "C-5"),
            ("Abonelik Tipi", "havale"),
            ("Tutar", "100"),
            ("Başlangıç Tarihi", "2025-01-01"),
            ("Otomatik Yenileme", "belki"),
        ]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "auto_renew");
        assert_eq!(errors[0].code, FieldErrorCode::InvalidEnum);
    }
}
