//! Integration tests for cancellation and liveness
//!
//! These tests validate how stages stop:
//! - Firing the token closes the terminal endpoint in bounded time
//! - At most one value per stage escapes after the fire
//! - An undrained, uncancelled pipeline stays blocked (documented hazard)
//! - Dropping the terminal endpoint or a send deadline also releases stages

mod common;

use common::transforms::{increment, square};
use common::{drain_within, test_timeout, wait_until};
use stagepipe_rs::pipeline::{build_pipeline_fallible_with, join_all, try_transform};
use stagepipe_rs::{
    build_pipeline_cancelable, build_source, build_source_cancelable, CancelToken,
    PipelineBuilder, PipelineConfig, StageOutcome, TransformError, Value,
};
use std::time::Duration;

#[test]
fn test_cancel_before_any_read_closes_in_bounded_time() {
    let cancel = CancelToken::new();
    let source = build_source_cancelable(&cancel, vec![2, 3]).unwrap();
    let output = build_pipeline_cancelable(&cancel, source, vec![square(), increment()]).unwrap();

    cancel.fire();

    let values = drain_within(&output, test_timeout()).expect("cancelled pipeline must close");
    // Whatever got through is a prefix of the uncancelled result.
    assert!(values.len() <= 2);
    assert_eq!(values[..], [5, 10][..values.len()]);
}

#[test]
fn test_cancel_with_non_cancelable_source() {
    let cancel = CancelToken::new();
    let source = build_source(0..1_000_000).unwrap();
    let output = build_pipeline_cancelable(&cancel, source, vec![increment()]).unwrap();

    assert_eq!(output.recv(), Some(1));
    cancel.fire();

    let values = drain_within(&output, test_timeout()).expect("cancelled pipeline must close");
    assert!(values.len() <= 1);
}

#[test]
fn test_at_most_one_value_escapes_after_fire() {
    let cancel = CancelToken::new();
    let pipeline = PipelineBuilder::new()
        .cancel_with(&cancel)
        .stage("a", |x: Value| x + 1)
        .stage("b", |x: Value| x * 3)
        .stage("c", |x: Value| x - 2)
        .build_from_values(0..)
        .unwrap();

    let before: Vec<_> = (0..5).filter_map(|_| pipeline.output().recv()).collect();
    assert_eq!(before, vec![1, 4, 7, 10, 13]);

    cancel.fire();
    let after = drain_within(pipeline.output(), test_timeout()).expect("must close");
    assert!(after.len() <= 1, "got {:?} after cancellation", after);
    if let Some(&v) = after.first() {
        assert_eq!(v, 16);
    }

    let reports = pipeline.join().unwrap();
    assert_eq!(reports.len(), 4);
    for report in &reports {
        assert_eq!(report.received, report.forwarded + report.dropped);
        assert_ne!(report.outcome, StageOutcome::TimedOut);
    }
    // An endless source can only stop because of the fire or its reader leaving.
    assert_ne!(reports[0].outcome, StageOutcome::Exhausted);
}

#[test]
fn test_fire_twice_matches_fire_once() {
    let run = |fires: usize| {
        let cancel = CancelToken::new();
        let pipeline = PipelineBuilder::new()
            .cancel_with(&cancel)
            .stage("square", |x: Value| x * x)
            .build_from_values(0..)
            .unwrap();
        assert_eq!(pipeline.output().recv(), Some(0));
        for _ in 0..fires {
            cancel.fire();
        }
        assert!(cancel.is_cancelled());
        let rest = drain_within(pipeline.output(), test_timeout()).expect("must close");
        assert!(rest.len() <= 1);
        pipeline.join().unwrap()
    };

    let once = run(1);
    let twice = run(2);
    assert_eq!(once.len(), twice.len());
    for (a, b) in once.iter().zip(&twice) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.name, b.name);
        assert_ne!(b.outcome, StageOutcome::TimedOut);
    }
    // One value before the fire, at most one racing it.
    assert!(once[1].forwarded <= 2);
    assert!(twice[1].forwarded <= 2);
}

#[test]
fn test_undrained_uncancelled_pipeline_stays_blocked() {
    let cancel = CancelToken::new();
    let pipeline = PipelineBuilder::new()
        .cancel_with(&cancel)
        .stage("square", |x: Value| x * x)
        .stage("increment", |x: Value| x + 1)
        .build_from_values(0..10)
        .unwrap();

    // Nothing reads and nothing cancels: every stage parks on its send.
    std::thread::sleep(Duration::from_millis(50));
    assert!(!pipeline.is_finished());
    assert!(pipeline.stages().iter().all(|s| !s.is_finished()));

    assert!(pipeline.cancel());
    assert!(wait_until(test_timeout(), || pipeline.is_finished()));

    let reports = pipeline.join().unwrap();
    // The terminal endpoint was still held, so the last stage can only have
    // been stopped by the fire. Upstream stages may instead see it leave.
    assert_eq!(reports[2].outcome, StageOutcome::Cancelled);
    assert_eq!(reports[2].forwarded, 0);
    assert!(reports.iter().all(|r| matches!(
        r.outcome,
        StageOutcome::Cancelled | StageOutcome::DownstreamClosed
    )));
}

#[test]
fn test_dropping_terminal_endpoint_releases_stages() {
    let pipeline = PipelineBuilder::new()
        .stage("square", |x: Value| x * x)
        .stage("increment", |x: Value| x + 1)
        .build_from_values(0..)
        .unwrap();

    assert_eq!(pipeline.output().recv(), Some(1));

    let (output, stages) = pipeline.into_parts();
    drop(output);
    let reports = join_all(stages).unwrap();
    assert_eq!(reports[2].outcome, StageOutcome::DownstreamClosed);
    assert!(reports
        .iter()
        .all(|r| r.outcome == StageOutcome::DownstreamClosed));
}

#[test]
fn test_send_timeout_releases_blocked_stages() {
    let config = PipelineConfig::default().with_send_timeout(Duration::from_millis(100));
    let pipeline = PipelineBuilder::with_config(config)
        .stage("square", |x: Value| x * x)
        .stage("increment", |x: Value| x + 1)
        .build_from_values(0..10)
        .unwrap();

    assert!(wait_until(test_timeout(), || pipeline.is_finished()));

    let reports = pipeline.join().unwrap();
    assert_eq!(reports[2].outcome, StageOutcome::TimedOut);
    assert_eq!(reports[2].dropped, 1);
    for report in &reports {
        assert_eq!(report.received, report.forwarded + report.dropped);
    }
}

#[test]
fn test_cancel_stops_fallible_pipeline() {
    let cancel = CancelToken::new();
    let config = PipelineConfig::default();
    let source = build_source_cancelable(&cancel, 0..).unwrap();
    let halve = try_transform(|x: Value| {
        if x % 2 == 0 {
            Ok(x / 2)
        } else {
            Err(TransformError::new("odd"))
        }
    });
    let pipeline =
        build_pipeline_fallible_with(&config, Some(&cancel), source, vec![halve]).unwrap();

    assert_eq!(pipeline.output().recv(), Some(Ok(0)));
    assert!(pipeline.output().recv().unwrap().is_err());

    assert!(pipeline.cancel());
    let rest = drain_within(pipeline.output(), test_timeout()).expect("must close");
    assert!(rest.len() <= 1);
    assert_eq!(pipeline.join().unwrap().len(), 1);
}
