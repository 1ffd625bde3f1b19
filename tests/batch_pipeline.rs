// End-to-end batch runs over plain-text stand-ins for tech-log PDFs
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use techlog::batch::{BatchExtractor, CancelFlag, COMBINED_TABLE, PROCESSING_LOG};
use techlog::config::Layout;
use techlog::lookup::{CarrierCodeMap, DelayReasonMap};
use techlog::pdf_extraction::{FieldExtractor, PlainText, Template};
use techlog::pipeline::{Pipeline, EXTENDED_TABLE, REVIEW_DIR};
use techlog::sink::DirectorySink;
use techlog::table::Table;
use techlog::TechlogError;

fn report(flight: &str, date: &str, dep: &str, arr: &str, off_blocks: &str, flown: bool) -> String {
    let airborne = if flown { "AIRBORNE 09:12\nLANDED 11:02\n" } else { "" };
    format!(
        "9H-SLD\nReg\nFlight Date {flight}\nDeparture {date} {dep} / Origin\nArrival\n{date}\nDestination Intl\n{arr} / City\nOFF BLOCKS {off_blocks}\n{airborne}ON BLOCKS 11:10\nDelays: 00:25, 93/B\nFuel\nTotal 1200 11220 5710\n"
    )
}

fn pipeline(root: &Path) -> Pipeline {
    let exact = HashMap::new();
    let prefix = HashMap::from([("KM".to_string(), "QM".to_string())]);
    let reasons = HashMap::from([
        ("93".to_string(), "Aircraft rotation".to_string()),
        ("99".to_string(), "Miscellaneous".to_string()),
    ]);
    let extractor = FieldExtractor::new(
        Template::builtin("techlog-v2").unwrap(),
        CarrierCodeMap::new(exact, prefix),
        DelayReasonMap::new(reasons).unwrap(),
    );
    let batch = BatchExtractor::new(Arc::new(extractor), Arc::new(PlainText), 2);
    Pipeline::new(batch, Layout::new(root), true)
}

fn column(table: &Table, name: &str) -> Vec<String> {
    let col = table.column_index(name).unwrap();
    (0..table.len()).map(|r| table.cell(r, col).unwrap().to_string()).collect()
}

fn stage(root: &Path, reg: &str, files: &[(&str, String)]) {
    let dir = Layout::new(root).to_be_processed().join(reg);
    fs::create_dir_all(&dir).unwrap();
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
}

#[tokio::test]
async fn test_run_stages_processes_and_relocates() {
    let dir = tempfile::tempdir().unwrap();
    stage(
        dir.path(),
        "9H-SLD",
        &[
            ("a.pdf", report("KM101", "11-Jul-25", "DEL", "BOM", "09:00", true)),
            ("b.pdf", report("KM102", "11-Jul-25", "BOM", "DEL", "14:00", true)),
            ("c.pdf", report("KM103", "11-Jul-25", "BLR", "GOA", "18:00", true)),
            ("d.pdf", report("KM104", "12-Jul-25", "GOA", "BLR", "08:00", false)),
            ("e.pdf", report("KM101", "11-Jul-25", "DEL", "BOM", "09:30", true)),
        ],
    );
    let reg_dir = Layout::new(dir.path()).to_be_processed().join("9H-SLD");
    fs::write(reg_dir.join("f.pdf"), [0xff, 0xfe, 0x00]).unwrap();
    let outbox = dir.path().join("outbox");
    let pipeline = pipeline(dir.path()).with_sink(Box::new(DirectorySink::new(outbox.clone())));

    let (staging, report) = pipeline
        .run(&["9H-SLD".to_string()], &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(staging.file_count(), 6);
    assert_eq!(report.success_files.len(), 5);
    assert_eq!(report.failed_files.len(), 1);
    assert_eq!(report.failed_files[0].0, "f.pdf");
    assert!(!report.cancelled);
    assert!(report.sink_failures.is_empty());

    let processed = Layout::new(dir.path()).processed().join(&report.batch);
    assert_eq!(report.folder, processed);
    assert!(!Layout::new(dir.path()).processing().join(&report.batch).exists());

    let extended = Table::read_csv(&processed.join(EXTENDED_TABLE)).unwrap();
    assert_eq!(extended.len(), 5);
    assert_eq!(
        column(&extended, "filename"),
        vec!["a.pdf", "e.pdf", "b.pdf", "c.pdf", "d.pdf"]
    );
    assert_eq!(column(&extended, "FlightNumber")[0], "QM101");
    assert_eq!(column(&extended, "DelayReason")[0], "Aircraft rotation");
    assert_eq!(column(&extended, "FuelBurn")[0], "5510");
    assert_eq!(column(&extended, "EnquiryNo")[0], "9H-SLD");
    assert_eq!(column(&extended, "Status")[4], "Not Flown");

    // a.pdf and e.pdf share EnquiryNo, Date and FlightNumber; d.pdf never flew
    let combined = Table::read_csv(&processed.join(COMBINED_TABLE)).unwrap();
    assert_eq!(combined.headers().len(), 23);
    assert_eq!(column(&combined, "FlightNumber"), vec!["QM102", "QM103"]);

    let duplicates = Table::read_csv(&processed.join(REVIEW_DIR).join("Duplicates.csv")).unwrap();
    assert_eq!(column(&duplicates, "filename"), vec!["a.pdf", "e.pdf"]);
    let not_flown = Table::read_csv(&processed.join(REVIEW_DIR).join("Not_flown.csv")).unwrap();
    assert_eq!(column(&not_flown, "filename"), vec!["d.pdf"]);

    let log = fs::read_to_string(processed.join(PROCESSING_LOG)).unwrap();
    assert!(log.contains("Processed: a.pdf (EnquiryNo: 9H-SLD)"));
    assert!(log.contains("Error reading f.pdf: "));
    assert!(log.contains("Failed files: f.pdf\n"));
    assert!(log.contains("5 files processed and appended to combined_data.csv on "));
    assert!(log.trim_end().ends_with("Processing complete"));

    let delivered = outbox.join(&report.batch);
    assert!(delivered.join(COMBINED_TABLE).is_file());
    assert!(delivered.join("Duplicates.csv").is_file());
}

#[tokio::test]
async fn test_rotations_in_extended_table() {
    let dir = tempfile::tempdir().unwrap();
    let batch = Layout::new(dir.path()).processing().join("batch1");
    fs::create_dir_all(&batch).unwrap();
    fs::write(batch.join("1.pdf"), report("KM1", "11-Jul-25", "BLR", "GOA", "18:00", true)).unwrap();
    fs::write(batch.join("2.pdf"), report("KM2", "11-Jul-25", "BOM", "DEL", "14:00", true)).unwrap();
    fs::write(batch.join("3.pdf"), report("KM3", "11-Jul-25", "DEL", "BOM", "09:00", true)).unwrap();
    fs::write(batch.join("4.pdf"), report("KM4", "11-Jul-25", "GOA", "GOA", "20:00", true)).unwrap();

    let report = pipeline(dir.path()).process("batch1", &CancelFlag::new()).await.unwrap();

    let extended = Table::read_csv(&report.folder.join(EXTENDED_TABLE)).unwrap();
    assert_eq!(column(&extended, "Dep"), vec!["DEL", "BOM", "BLR", "GOA"]);
    assert_eq!(column(&extended, "Rotation"), vec!["1", "1", "2", "0"]);
    assert_eq!(column(&extended, "Status")[3], "Cancelled");
    assert_eq!(column(&extended, "SortATD"), vec!["09:00", "14:00", "18:00", "20:00"]);
    assert!(!report.review_written);
    assert!(!report.folder.join(REVIEW_DIR).exists());
}

#[tokio::test]
async fn test_missing_batch_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let err = pipeline(dir.path())
        .process("nope", &CancelFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TechlogError::FolderNotFound(_)));
    assert!(!Layout::new(dir.path()).processed().join("nope").exists());
}

#[tokio::test]
async fn test_cancelled_run_stays_in_processing() {
    let dir = tempfile::tempdir().unwrap();
    let batch = Layout::new(dir.path()).processing().join("batch1");
    fs::create_dir_all(&batch).unwrap();
    fs::write(batch.join("1.pdf"), report("KM1", "11-Jul-25", "DEL", "BOM", "09:00", true)).unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = pipeline(dir.path()).process("batch1", &cancel).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.folder, batch);
    assert!(batch.join(EXTENDED_TABLE).is_file());
    assert!(!Layout::new(dir.path()).processed().join("batch1").exists());
}

#[tokio::test]
async fn test_run_with_nothing_to_stage_leaves_no_batch() {
    let dir = tempfile::tempdir().unwrap();

    let err = pipeline(dir.path())
        .run(&["9H-XXX".to_string()], &CancelFlag::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TechlogError::NothingStaged(ref regs) if regs == &["9H-XXX".to_string()]));
    let processing = Layout::new(dir.path()).processing();
    assert_eq!(fs::read_dir(processing).unwrap().count(), 0);
}
