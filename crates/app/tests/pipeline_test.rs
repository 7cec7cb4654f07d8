//! End-to-end tests: synthetic stream -> org table on disk -> ingestion ->
//! aggregate -> report.

use pcnmap_app::ingest::{ingest_file, MalformedPolicy};
use pcnmap_app::input_gen::{generate_records, write_sample_table};
use pcnmap_app::report::{render, RenderConfig, ReportFormat};
use pcnmap_core::{ErrorAggregator, IngestMetrics};
use std::io::Write;

#[test]
fn test_disk_round_trip_matches_direct_fill() {
    let records = generate_records(2024, 3000, 0.25, 128);

    let mut direct = ErrorAggregator::new(128);
    for r in &records {
        r.fill_into(&mut direct).unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pcn_errors.org");
    write_sample_table(&path, &records).unwrap();

    let mut from_disk = ErrorAggregator::new(128);
    let mut metrics = IngestMetrics::new();
    ingest_file(&path, &mut from_disk, MalformedPolicy::Abort, &mut metrics).unwrap();

    assert_eq!(metrics.records_read, 3000);
    assert_eq!(metrics.records_malformed, 0);
    assert_eq!(
        metrics.errors_aggregated + metrics.records_agreeing,
        metrics.records_read
    );
    assert_eq!(metrics.errors_aggregated, direct.total_errors());

    let keys: Vec<_> = direct.all_channels_with_errors().collect();
    assert_eq!(keys, from_disk.all_channels_with_errors().collect::<Vec<_>>());
    for key in keys {
        assert_eq!(direct.error_count(key), from_disk.error_count(key));
        assert_eq!(direct.distribution_for(key), from_disk.distribution_for(key));
    }
}

#[test]
fn test_report_is_reproducible() {
    let build = || {
        let mut agg = ErrorAggregator::new(128);
        for r in generate_records(5, 1000, 0.2, 128) {
            r.fill_into(&mut agg).unwrap();
        }
        agg
    };
    let config = RenderConfig::default();
    assert_eq!(
        render(&build(), &config).unwrap(),
        render(&build(), &config).unwrap()
    );
}

#[test]
fn test_hand_written_dump() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "* PCN errors, run 1234\n\
         \n\
         | runNo | eventID | tell1 | ExpPCN | Beetle | expbits  | badbits  |\n\
         |-------+---------+-------+--------+--------+----------+----------|\n\
         |  1234 |       1 |     3 |    176 |      2 | 10110000 | 00000001 |\n\
         |  1234 |       2 |     3 |    177 |      2 | 10110001 | 00000011 |\n\
         |  1234 |       3 |    17 |    178 |      0 | 10110010 | 00000000 |\n\
         |  1234 |       4 |    17 |    179 |      0 | 1O110011 | 00000001 |\n"
    )
    .unwrap();

    let mut agg = ErrorAggregator::new(128);
    let mut metrics = IngestMetrics::new();
    ingest_file(file.path(), &mut agg, MalformedPolicy::Skip, &mut metrics).unwrap();

    assert_eq!(metrics.records_read, 4);
    assert_eq!(metrics.records_malformed, 1);
    assert_eq!(metrics.records_agreeing, 1);
    assert_eq!(metrics.bit_errors, 3);
    assert_eq!(agg.channel_count(), 1);

    let config = RenderConfig {
        format: ReportFormat::Json,
        show_grid: false,
        ..RenderConfig::default()
    };
    let value: serde_json::Value = serde_json::from_str(&render(&agg, &config).unwrap()).unwrap();
    let channel = &value["channels"][0];
    assert_eq!(channel["board"], 3);
    assert_eq!(channel["chip"], 2);
    assert_eq!(channel["errors"], 2);
    // LSB wrong twice, expected 0 then 1; bit 1 wrong once, expected 0
    assert_eq!(channel["bits"][7]["bit"], 0);
    assert_eq!(channel["bits"][7]["expected_0"], 1);
    assert_eq!(channel["bits"][7]["expected_1"], 1);
    assert_eq!(channel["bits"][6]["expected_0"], 1);
    assert!(value.get("grid").is_none());
}

#[test]
fn test_strict_mode_on_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "| tell1 | Beetle | expbits | badbits |").unwrap();
    writeln!(file, "| 1 | 16 | 00000000 | 00000001 |").unwrap();

    let mut agg = ErrorAggregator::new(128);
    let mut metrics = IngestMetrics::new();
    let err = ingest_file(file.path(), &mut agg, MalformedPolicy::Abort, &mut metrics).unwrap_err();
    assert!(err.to_string().contains("line 2"));
    assert!(agg.is_empty());
}

#[test]
fn test_missing_file_is_io_error() {
    let mut agg = ErrorAggregator::new(128);
    let mut metrics = IngestMetrics::new();
    let err = ingest_file(
        std::path::Path::new("/nonexistent/pcn.org"),
        &mut agg,
        MalformedPolicy::Skip,
        &mut metrics,
    )
    .unwrap_err();
    assert!(matches!(err, pcnmap_core::Error::Io(_)));
}
