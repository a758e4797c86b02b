// ==========================================
// 集成测试 - 导入管道（内存仓储）
// ==========================================
// 覆盖范围: 校验策略 / 对账 / 执行 / 取消 / 批次上限
// ==========================================


use sheet_import::domain::{BatchError, FieldErrorCode, MaterialRecord};
use sheet_import::importer::*;
use sheet_import::logging;
use std::sync::Arc;
use test_helpers::{materials_sheet, MockRepo};

fn material_repo() -> MockRepo<MaterialRecord> {
    MockRepo::new(|m: &MaterialRecord| m.code.clone())
}

fn pipeline(
    repo: &Arc<MockRepo<MaterialRecord>>,
    options: ImportOptions,
) -> ImportPipeline<MaterialsFlow, MockRepo<MaterialRecord>> {
    ImportPipeline::new(MaterialsFlow, repo.clone(), options)
}

async fn run(
    repo: &Arc<MockRepo<MaterialRecord>>,
    options: ImportOptions,
    bytes: &[u8],
) -> ImportResult<ImportReport> {
    pipeline(repo, options)
        .run(bytes, &DecodeOptions::default(), Some("urunler.xlsx"), &CancelHandle::new())
        .await
}

#[tokio::test]
async fn test_existing_key_updates_and_new_key_inserts() {
    logging::init_test();
    let repo = Arc::new(material_repo().with_existing(&[(42, "DK230")]));
    let bytes = materials_sheet(&[("DK230", "Kasa", "10"), ("DK999", "Pervaz", "5,5")]);

    let report = run(&repo, ImportOptions::default(), &bytes).await.unwrap();

    assert_eq!(report.outcome.updated_count, 1);
    assert_eq!(report.outcome.created_count, 1);
    assert_eq!(report.outcome.failed_count, 0);
    assert_eq!(
        repo.writes(),
        vec![("update", "DK230".to_string()), ("insert", "DK999".to_string())]
    );
}

#[tokio::test]
async fn test_failed_write_is_reported_per_row() {
    let mut repo = material_repo().with_existing(&[(1, "A1"), (2, "A2"), (3, "A3")]);
    repo.fail_keys = vec!["B2".to_string()];
    let repo = Arc::new(repo);
    let bytes = materials_sheet(&[
        ("A1", "a", "1"),
        ("A2", "a", "1"),
        ("A3", "a", "1"),
        ("B1", "b", "1"),
        ("B2", "b", "1"),
    ]);

    let report = run(&repo, ImportOptions::default(), &bytes).await.unwrap();

    assert_eq!(report.outcome.updated_count, 3);
    assert_eq!(report.outcome.created_count, 1);
    assert_eq!(report.outcome.failed_count, 1);
    assert_eq!(report.outcome.errors.len(), 1);
    assert_eq!(report.outcome.errors[0].row_number, 6);
    assert_eq!(report.outcome.errors[0].reason, "unique_violation");
    assert!(!report.outcome.partial);
}

#[tokio::test]
async fn test_block_on_errors_writes_nothing() {
    let repo = Arc::new(material_repo());
    let bytes = materials_sheet(&[("DK1", "Kasa", "1"), ("DK2", "", "abc")]);
    let options = ImportOptions {
        validation_policy: ValidationPolicy::BlockOnErrors,
        ..ImportOptions::default()
    };

    let report = run(&repo, options, &bytes).await.unwrap();

    assert!(report.blocked);
    assert!(repo.writes().is_empty());
    assert_eq!(report.rejected_rows(), 1);
    let mut codes: Vec<(&str, FieldErrorCode)> = report
        .field_errors
        .iter()
        .map(|e| (e.field.as_str(), e.code))
        .collect();
    codes.sort_by_key(|(field, _)| *field);
    assert_eq!(
        codes,
        vec![
            ("base_price", FieldErrorCode::InvalidNumber),
            ("name", FieldErrorCode::Required)
        ]
    );
    assert!(report.field_errors.iter().all(|e| e.row_number == 3));
}

#[tokio::test]
async fn test_valid_subset_is_written_by_default() {
    let repo = Arc::new(material_repo());
    let bytes = materials_sheet(&[("DK1", "Kasa", "1"), ("DK2", "", "1"), ("DK3", "Pervaz", "2")]);

    let report = run(&repo, ImportOptions::default(), &bytes).await.unwrap();

    assert!(!report.blocked);
    assert_eq!(report.valid_rows, 2);
    assert_eq!(report.rejected_rows(), 1);
    assert_eq!(report.outcome.created_count, 2);
    assert_eq!(repo.writes().len(), 2);
}

#[tokio::test]
async fn test_lookup_failure_aborts_before_any_write() {
    let mut repo = material_repo();
    repo.fail_lookup = true;
    let repo = Arc::new(repo);
    let bytes = materials_sheet(&[("DK1", "Kasa", "1")]);

    let err = run(&repo, ImportOptions::default(), &bytes).await.unwrap_err();

    assert!(matches!(err, ImportError::Lookup(_)));
    assert!(repo.writes().is_empty());
}

#[tokio::test]
async fn test_cancel_before_execution_discards_plan() {
    let repo = Arc::new(material_repo());
    let bytes = materials_sheet(&[("DK1", "Kasa", "1"), ("DK2", "Kasa", "1")]);
    let cancel = CancelHandle::new();
    cancel.cancel();

    let report = pipeline(&repo, ImportOptions::default())
        .run(&bytes, &DecodeOptions::default(), None, &cancel)
        .await
        .unwrap();

    assert!(report.discarded);
    assert_eq!(report.outcome.created_count, 0);
    assert!(repo.writes().is_empty());
}

#[tokio::test]
async fn test_row_limit_advisory_truncates() {
    let repo = Arc::new(material_repo());
    let codes: Vec<String> = (0..501).map(|i| format!("M{:04}", i)).collect();
    let rows: Vec<(&str, &str, &str)> = codes.iter().map(|c| (c.as_str(), "x", "1")).collect();
    let bytes = materials_sheet(&rows);

    let report = run(&repo, ImportOptions::default(), &bytes).await.unwrap();

    assert_eq!(report.rows_seen, 500);
    assert_eq!(
        report.batch_errors,
        vec![BatchError::LimitExceeded {
            limit: 500,
            actual: 501
        }]
    );
    assert_eq!(report.outcome.created_count, 500);
    assert!(!repo.writes().iter().any(|(_, key)| key == "M0500"));
}

#[tokio::test]
async fn test_row_limit_block_policy_blocks_batch() {
    let repo = Arc::new(material_repo());
    let bytes = materials_sheet(&[("A", "x", "1"), ("B", "x", "1"), ("C", "x", "1")]);
    let options = ImportOptions {
        max_rows: 2,
        batch_limit_policy: BatchLimitPolicy::Block,
        ..ImportOptions::default()
    };

    let report = run(&repo, options, &bytes).await.unwrap();

    assert!(report.blocked);
    assert!(repo.writes().is_empty());
}

#[tokio::test]
async fn test_duplicate_keys_last_row_wins() {
    let repo = Arc::new(material_repo());
    let bytes = materials_sheet(&[("DK1", "Eski", "1"), ("DK2", "x", "1"), ("DK1", "Yeni", "2")]);

    let report = run(&repo, ImportOptions::default(), &bytes).await.unwrap();

    assert_eq!(report.outcome.created_count, 2);
    assert_eq!(report.superseded.len(), 1);
    assert_eq!(report.superseded[0].row_number, 2);
    assert_eq!(report.superseded[0].superseded_by, 4);
    assert_eq!(repo.writes().len(), 2);
}

#[tokio::test]
async fn test_concurrent_mode_writes_every_row() {
    let repo = Arc::new(material_repo());
    let codes: Vec<String> = (0..40).map(|i| format!("C{}", i)).collect();
    let rows: Vec<(&str, &str, &str)> = codes.iter().map(|c| (c.as_str(), "x", "1")).collect();
    let bytes = materials_sheet(&rows);
    let options = ImportOptions {
        execution_mode: ExecutionMode::Concurrent { max_in_flight: 4 },
        ..ImportOptions::default()
    };

    let report = run(&repo, options, &bytes).await.unwrap();

    assert_eq!(report.outcome.created_count, 40);
    assert_eq!(repo.writes().len(), 40);
}

#[tokio::test]
async fn test_preview_does_not_write() {
    let repo = Arc::new(material_repo().with_existing(&[(7, "DK1")]));
    let bytes = materials_sheet(&[("DK1", "x", "1"), ("DK2", "x", "1"), ("", "x", "1")]);

    let preview = pipeline(&repo, ImportOptions::default())
        .preview(&bytes, &DecodeOptions::default())
        .await
        .unwrap();

    assert_eq!(preview.to_update, 1);
    assert_eq!(preview.to_insert, 1);
    assert_eq!(preview.field_errors.len(), 1);
    assert!(repo.writes().is_empty());
}
