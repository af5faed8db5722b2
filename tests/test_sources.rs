//! Synchronous consumption of source graphs
//!
//! Everything here runs on the immediate strategy, so each handler has fired
//! by the time `consume` returns.

use dagger_source::{Outcome, Source, SourceError, Stage};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("index {index} out of range")]
struct OutOfRange {
    index: usize,
}

fn first_word(input: String) -> String {
    input.split(' ').next().unwrap_or_default().to_string()
}

/// A producer that fails if it is ever called a second time
fn once_only<T: Clone + Send + Sync + 'static>(
    value: T,
) -> impl Fn() -> anyhow::Result<T> + Send + Sync + 'static {
    let remaining = AtomicUsize::new(1);
    move || {
        if remaining
            .compare_exchange(1, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(value.clone())
        } else {
            anyhow::bail!("Supplied more than once")
        }
    }
}

fn expect_success<T>(outcome: Outcome<T>) -> T {
    match outcome {
        Outcome::Success(value) => value,
        Outcome::Failure(cause) => panic!("Expected success, got {cause}"),
    }
}

fn expect_failure<T: std::fmt::Debug>(outcome: Outcome<T>) -> SourceError {
    match outcome {
        Outcome::Success(value) => panic!("Should have failed, but succeeded with {value:?}"),
        Outcome::Failure(cause) => cause,
    }
}

#[test]
fn test_collect_from_single_source() {
    let mut output = Vec::new();
    Source::new(|| "hello world".to_string())
        .consume(|outcome| outcome.consume_or_raise(|s| output.push(s)).unwrap());

    assert_eq!(output, vec!["hello world".to_string()]);
}

#[test]
fn test_map_to_a_different_type() {
    let mut length = None;
    Source::new(|| "hello world".to_string())
        .map(|s| s.len())
        .consume(|outcome| length = Some(expect_success(outcome)));

    assert_eq!(length, Some(11));
}

#[test]
fn test_map_composes() {
    let double = |n: i64| n * 2;
    let describe = |n: i64| format!("<{n}>");

    for x in [-3_i64, 0, 21] {
        let mut seen = String::new();
        Source::new(move || x)
            .map(double)
            .map(describe)
            .consume(|outcome| seen = expect_success(outcome));
        assert_eq!(seen, describe(double(x)));
    }
}

#[test]
fn test_fork_into_two_types() {
    let (mut length, mut word) = (0, String::new());
    Source::new(|| "hello world".to_string())
        .fork(|s| s.len(), first_word)
        .consume(
            |first| length = expect_success(first),
            |second| word = expect_success(second),
        );

    assert_eq!(length, 11);
    assert_eq!(word, "hello");
}

#[test]
fn test_map_only_half_of_a_pair() {
    let (mut length, mut word) = (0, String::new());
    Source::new(|| "hello world".to_string())
        .fork(|s| s.len(), first_word)
        .map_first(|l| l + 15)
        .consume(
            |first| length = expect_success(first),
            |second| word = expect_success(second),
        );

    assert_eq!(length, 26);
    assert_eq!(word, "hello");
}

#[test]
fn test_map_first_failure_leaves_second_alone() {
    let pair = Source::new(|| "hello world".to_string()).fork(|s| s.len(), first_word);
    let broken = pair.try_map_first(|l| -> anyhow::Result<usize> {
        anyhow::bail!("cannot use length {l}")
    });

    let mut second_before = String::new();
    pair.second()
        .consume(|outcome| second_before = expect_success(outcome));

    let mut first_after = None;
    let mut second_after = String::new();
    broken.consume(
        |first| first_after = Some(expect_failure(first)),
        |second| second_after = expect_success(second),
    );

    assert_eq!(second_after, second_before);
    assert_eq!(first_after.unwrap().stage(), Some(Stage::Transform));
}

#[test]
fn test_detect_an_error_in_the_supply() {
    let mut cause = None;
    Source::new(|| String::from("hello world").as_bytes()[101])
        .consume(|outcome| cause = Some(expect_failure(outcome)));

    match cause.unwrap() {
        SourceError::Panicked { stage, message } => {
            assert_eq!(stage, Stage::Produce);
            assert!(message.contains("out of bounds"), "{message}");
        }
        other => panic!("Expected a captured panic, got {other:?}"),
    }
}

#[test]
fn test_detect_a_reported_error_in_the_supply() {
    let mut cause = None;
    Source::try_new(|| Ok("hello world".chars().nth(101).ok_or(OutOfRange { index: 101 })?))
        .consume(|outcome| cause = Some(expect_failure(outcome)));

    let cause = cause.unwrap();
    assert_eq!(cause.downcast_ref::<OutOfRange>().unwrap().index, 101);
    assert!(cause.clone().to_string().contains("index 101 out of range"));
}

#[test]
fn test_early_failure_means_downstream_functions_are_not_applied() {
    let applied = Arc::new(AtomicUsize::new(0));
    let counter = applied.clone();

    let mut cause = None;
    Source::new(|| String::from("short string").as_bytes()[101])
        .map(move |_| -> u8 {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("oops")
        })
        .map(|b| b as char)
        .consume(|outcome| cause = Some(expect_failure(outcome)));

    assert_eq!(applied.load(Ordering::SeqCst), 0);
    assert_eq!(cause.unwrap().stage(), Some(Stage::Produce));
}

#[test]
fn test_transform_failure_is_reported_once() {
    let mut cause = None;
    Source::new(|| "not a number".to_string())
        .try_map(|s| Ok(s.parse::<u32>()?))
        .map(|n| n * 2)
        .consume(|outcome| cause = Some(expect_failure(outcome)));

    let cause = cause.unwrap();
    assert_eq!(cause.stage(), Some(Stage::Transform));
    assert!(cause.downcast_ref::<std::num::ParseIntError>().is_some());
}

#[test]
fn test_supplies_are_used_just_the_once() {
    let (mut length, mut word) = (0, String::new());
    Source::try_new(once_only("moose".to_string()))
        .fork(|s| s.len(), first_word)
        .consume(
            |first| length = expect_success(first),
            |second| word = expect_success(second),
        );

    assert_eq!(length, 5);
    assert_eq!(word, "moose");
}

#[test]
fn test_repeated_consumption_reuses_the_shared_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let pair = Source::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        "hello world".to_string()
    })
    .fork(|s| s.len(), first_word);

    let mut seen = Vec::new();
    for _ in 0..3 {
        let (mut length, mut word) = (0, String::new());
        pair.consume(
            |first| length = expect_success(first),
            |second| word = expect_success(second),
        );
        seen.push((length, word));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(seen.iter().all(|entry| *entry == (11, "hello".to_string())));
}

#[test]
fn test_join_a_pair() {
    let mut output = String::new();
    Source::new(|| "hello world".to_string())
        .fork(|s| s.len(), first_word)
        .join(|length, word| format!("{length} {word}"))
        .consume(|outcome| output = expect_success(outcome));

    assert_eq!(output, "11 hello");
}

#[test]
fn test_join_reports_a_failed_branch() {
    let mut cause = None;
    Source::new(|| "hello world".to_string())
        .fork(|s| s.len(), first_word)
        .try_map_first(|_| -> anyhow::Result<usize> { anyhow::bail!("first branch broke") })
        .join(|length, word| format!("{length} {word}"))
        .consume(|outcome| cause = Some(expect_failure(outcome)));

    assert_eq!(cause.unwrap().to_string(), "transform failed: first branch broke");
}

#[test]
fn test_join_with_both_branches_failed_reports_the_first() {
    let mut cause = None;
    Source::new(|| 7_u32)
        .try_fork(
            |_| -> anyhow::Result<u32> { anyhow::bail!("left") },
            |_| -> anyhow::Result<u32> { anyhow::bail!("right") },
        )
        .join(|a, b| a + b)
        .consume(|outcome| cause = Some(expect_failure(outcome)));

    assert_eq!(cause.unwrap().to_string(), "transform failed: left");
}

#[test]
fn test_join_function_panic_is_captured() {
    let mut cause = None;
    Source::new(|| vec![1, 2, 3])
        .fork(|v| v.len(), |v| v)
        .join(|len, v| v[len])
        .consume(|outcome| cause = Some(expect_failure(outcome)));

    assert_eq!(cause.unwrap().stage(), Some(Stage::Join));
}
