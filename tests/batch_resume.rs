// Resumable batch job tests: chunked progress, resume-after-interrupt,
// idempotent re-runs, and the checkpoint file format.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use toxwatch::batch::{BatchJob, BatchOptions, Checkpoint, CsvCheckpoint};
use toxwatch::monitor::Shutdown;
use toxwatch::toxicity::{Label, ToxicityClassifier};

use common::CountingScorer;

fn options(chunk_size: usize, max_chunks: Option<usize>) -> BatchOptions {
    BatchOptions {
        chunk_size,
        chunk_pause: Duration::ZERO,
        max_chunks,
    }
}

fn inputs(n: usize) -> Vec<Option<String>> {
    (0..n)
        .map(|i| {
            if i % 10 == 0 {
                Some(format!("row {i}: you stupid idiot"))
            } else {
                Some(format!("row {i}: zebras grazing peacefully"))
            }
        })
        .collect()
}

/// Checkpoint rows without the timestamp column.
fn stable_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            r.iter().take(4).map(String::from).collect()
        })
        .collect()
}

#[tokio::test]
async fn full_run_writes_every_row_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    let scorer = Arc::new(CountingScorer::default());
    let job = BatchJob::new(ToxicityClassifier::new(scorer.clone()), options(32, None));

    let data = inputs(100);
    let mut checkpoint = CsvCheckpoint::new(&path);
    let summary = job.run(&data, &mut checkpoint).await.unwrap();

    assert!(summary.completed);
    assert_eq!(summary.total_rows, 100);
    assert_eq!(summary.resumed_from, 0);
    assert_eq!(summary.processed, 100);
    assert_eq!(summary.label_counts.get(&Label::Toxic), Some(&10));
    assert_eq!(summary.label_counts.get(&Label::NonToxic), Some(&90));
    assert_eq!(scorer.calls(), 100);

    let rows = stable_rows(&path);
    assert_eq!(rows.len(), 100);
    for (i, row) in rows.iter().enumerate() {
        assert!(row[0].starts_with(&format!("row {i}:")), "row {i} out of order");
    }
}

#[tokio::test]
async fn rerun_after_completion_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    let data = inputs(40);

    let first = BatchJob::new(
        ToxicityClassifier::new(Arc::new(CountingScorer::default())),
        options(16, None),
    );
    first.run(&data, &mut CsvCheckpoint::new(&path)).await.unwrap();
    let before = fs::read(&path).unwrap();

    let scorer = Arc::new(CountingScorer::default());
    let second = BatchJob::new(ToxicityClassifier::new(scorer.clone()), options(16, None));
    let summary = second
        .run(&data, &mut CsvCheckpoint::new(&path))
        .await
        .unwrap();

    assert!(summary.completed);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.resumed_from, 40);
    assert_eq!(scorer.calls(), 0);
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn interrupted_run_resumes_at_chunk_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let interrupted = dir.path().join("interrupted.csv");
    let straight = dir.path().join("straight.csv");
    let data = inputs(100);

    // Two chunks, then "crash"
    let scorer = Arc::new(CountingScorer::default());
    let partial = BatchJob::new(ToxicityClassifier::new(scorer.clone()), options(32, Some(2)));
    let summary = partial
        .run(&data, &mut CsvCheckpoint::new(&interrupted))
        .await
        .unwrap();
    assert!(!summary.completed);
    assert_eq!(summary.processed, 64);
    assert_eq!(stable_rows(&interrupted).len(), 64);

    let resumed = BatchJob::new(ToxicityClassifier::new(scorer.clone()), options(32, None));
    let summary = resumed
        .run(&data, &mut CsvCheckpoint::new(&interrupted))
        .await
        .unwrap();
    assert_eq!(summary.resumed_from, 64);
    assert_eq!(summary.processed, 36);
    assert!(summary.completed);
    assert_eq!(scorer.calls(), 100);

    BatchJob::new(
        ToxicityClassifier::new(Arc::new(CountingScorer::default())),
        options(32, None),
    )
    .run(&data, &mut CsvCheckpoint::new(&straight))
    .await
    .unwrap();

    assert_eq!(stable_rows(&interrupted), stable_rows(&straight));
}

#[tokio::test]
async fn blank_and_missing_texts_are_empty_without_scoring() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    let scorer = Arc::new(CountingScorer::default());
    let job = BatchJob::new(ToxicityClassifier::new(scorer.clone()), options(8, None));

    let data = vec![
        None,
        Some("   ".to_string()),
        Some("https://only.links/here @and_mentions".to_string()),
        Some("you idiot".to_string()),
    ];
    let summary = job.run(&data, &mut CsvCheckpoint::new(&path)).await.unwrap();

    assert_eq!(summary.label_counts.get(&Label::Empty), Some(&3));
    assert_eq!(summary.label_counts.get(&Label::Toxic), Some(&1));
    assert_eq!(scorer.calls(), 1);

    let rows = stable_rows(&path);
    assert_eq!(rows[0], ["", "", "EMPTY", "0.0"]);
    assert_eq!(rows[3][2], "TOXIC");
}

#[tokio::test]
async fn long_texts_are_bounded_in_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    let job = BatchJob::new(
        ToxicityClassifier::new(Arc::new(CountingScorer::default())),
        options(8, None),
    );
    let long = "zebra ".repeat(400);
    job.run(&[Some(long)], &mut CsvCheckpoint::new(&path))
        .await
        .unwrap();

    let rows = stable_rows(&path);
    assert_eq!(rows[0][0].chars().count(), 500);
    assert!(rows[0][1].chars().count() <= 500);
}

#[tokio::test]
async fn shutdown_stops_before_the_next_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    let (shutdown, listener) = Shutdown::new();
    shutdown.trigger();

    let job = BatchJob::new(
        ToxicityClassifier::new(Arc::new(CountingScorer::default())),
        options(10, None),
    )
    .with_shutdown(listener);
    let summary = job.run(&inputs(30), &mut CsvCheckpoint::new(&path)).await.unwrap();

    assert_eq!(summary.processed, 0);
    assert!(!summary.completed);
    assert!(!path.exists());
}

#[tokio::test]
async fn checkpoint_longer_than_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    let job = BatchJob::new(
        ToxicityClassifier::new(Arc::new(CountingScorer::default())),
        options(10, None),
    );
    job.run(&inputs(20), &mut CsvCheckpoint::new(&path)).await.unwrap();

    let err = job
        .run(&inputs(5), &mut CsvCheckpoint::new(&path))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("20 rows"));

    let mut checkpoint = CsvCheckpoint::new(&path);
    assert_eq!(checkpoint.load().unwrap(), 20);
}

#[tokio::test]
async fn unavailable_model_records_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    let job = BatchJob::new(ToxicityClassifier::unavailable(), options(10, None));
    let summary = job
        .run(
            &[Some("zebra".to_string()), None],
            &mut CsvCheckpoint::new(&path),
        )
        .await
        .unwrap();
    assert_eq!(summary.label_counts.get(&Label::Unknown), Some(&1));
    assert_eq!(summary.label_counts.get(&Label::Empty), Some(&1));
}
