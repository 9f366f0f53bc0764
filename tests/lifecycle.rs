//! Cancellation, abandonment and re-enumeration.

use anyhow::Result;
use mark_flaky_tests::flaky;
use rowstream::testing::*;
use rowstream::{CancellationToken, ChunkedSource, StreamConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn fast() -> StreamConfig {
    StreamConfig::default().with_poll_interval(Duration::from_millis(5))
}

fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

#[test]
fn cancelled_before_start_ends_without_running_producer() -> Result<()> {
    let token = CancellationToken::new();
    token.cancel();
    let script = ScriptedProducer::new().push(vec![1, 2, 3]);
    let calls = script.invocations();
    let source = ChunkedSource::new("pre-cancelled", script)
        .with_config(fast())
        .with_cancellation(token);

    let mut e = source.enumerate();
    assert!(!e.move_next()?);
    assert!(!e.move_next()?);
    assert_eq!(calls.get(), 0);
    Ok(())
}

#[test]
fn cancellation_mid_routine_is_not_a_fault() -> Result<()> {
    let token = CancellationToken::new();
    let script = ScriptedProducer::new()
        .push(vec!["x", "y"])
        .wait_for_cancel(Duration::from_secs(10));
    let source = ChunkedSource::new("waits", script)
        .with_config(fast())
        .with_cancellation(token.clone());

    let mut e = source.enumerate();
    assert!(e.move_next()?);
    assert!(e.move_next()?);
    assert_eq!(e.current(), Some(&"y"));

    let started = Instant::now();
    token.cancel();
    assert!(!e.move_next()?);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!e.move_next()?);
    Ok(())
}

#[test]
fn cancellation_stops_an_endless_producer() -> Result<()> {
    let token = CancellationToken::new();
    let script = ScriptedProducer::new().repeat_until_cancelled(vec![0u8; 3]);
    let source = ChunkedSource::new("endless", script)
        .with_config(fast().with_queue_capacity(2))
        .with_cancellation(token.clone());

    let mut e = source.enumerate();
    for _ in 0..10 {
        assert!(e.move_next()?);
    }
    token.cancel();

    // at most the rest of the current chunk is delivered
    let mut after_cancel = 0;
    while e.move_next()? {
        after_cancel += 1;
    }
    assert!(after_cancel < 3, "yielded {after_cancel} rows after cancel");
    Ok(())
}

#[flaky]
#[test]
fn dropping_the_enumerator_releases_a_blocked_producer() {
    let exited = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exited);
    let source = ChunkedSource::from_fn("blocked", move |sink, _| {
        struct SetOnExit(Arc<AtomicBool>);
        impl Drop for SetOnExit {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }
        let _guard = SetOnExit(Arc::clone(&flag));
        loop {
            sink.put_rows(vec![1u64, 2, 3])?;
        }
    })
    .with_config(fast().with_queue_capacity(1));

    {
        let mut e = source.enumerate();
        assert_eq!(e.next().transpose().unwrap(), Some(1));
        assert_eq!(e.next().transpose().unwrap(), Some(2));
    }

    assert!(
        wait_until(Duration::from_secs(5), || exited.load(Ordering::SeqCst)),
        "producer still blocked after the consumer went away"
    );
}

#[test]
fn each_enumeration_runs_the_producer_again() -> Result<()> {
    let script = ScriptedProducer::new().push(vec![1, 2]).push(vec![3]);
    let calls = script.invocations();
    let source = ChunkedSource::new("rerun", script).with_config(fast());

    let first = source.collect_rows()?;
    let second: Vec<i32> = (&source).into_iter().collect::<Result<_, _>>()?;
    assert_eq!(first, second);
    assert_eq!(calls.get(), 2);
    Ok(())
}

#[test]
fn enumerations_do_not_share_queues() -> Result<()> {
    let source = ChunkedSource::new(
        "parallel-runs",
        ScriptedProducer::new().push((0..100).collect::<Vec<u32>>()),
    )
    .with_config(fast());

    let mut a = source.enumerate();
    let mut b = source.enumerate();
    let mut from_a = Vec::new();
    let mut from_b = Vec::new();
    loop {
        let more_a = a.move_next()?;
        if more_a {
            from_a.push(*a.current().unwrap());
        }
        let more_b = b.move_next()?;
        if more_b {
            from_b.push(*b.current().unwrap());
        }
        if !more_a && !more_b {
            break;
        }
    }
    assert_eq!(from_a, (0..100).collect::<Vec<_>>());
    assert_eq!(from_a, from_b);
    Ok(())
}

#[test]
fn a_cancelled_source_stays_cancelled() -> Result<()> {
    let token = CancellationToken::new();
    let source = ChunkedSource::new("shared-token", ScriptedProducer::new().push(vec![1]))
        .with_config(fast())
        .with_cancellation(token.clone());
    assert_eq!(source.collect_rows()?, vec![1]);
    token.cancel();
    assert!(source.collect_rows()?.is_empty());
    Ok(())
}
