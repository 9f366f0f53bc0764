//! Ordering, completion and fault behaviour of a single stream.

use anyhow::Result;
use rowstream::testing::*;
use rowstream::{ChunkedSource, StreamConfig};
use std::error::Error;
use std::time::Duration;

fn fast() -> StreamConfig {
    StreamConfig::default().with_poll_interval(Duration::from_millis(5))
}

#[test]
fn chunks_are_flattened_in_order() -> Result<()> {
    let script = ScriptedProducer::new()
        .push(vec![1, 2, 3])
        .push(vec![4])
        .push(vec![5, 6]);
    let source = ChunkedSource::new("ordered", script).with_config(fast());
    let rows = source.collect_rows()?;
    assert_rows_in_order(&rows, &[1, 2, 3, 4, 5, 6]);
    Ok(())
}

#[test]
fn empty_chunk_in_the_middle_is_skipped() -> Result<()> {
    let script = ScriptedProducer::new()
        .push(vec!["a", "b", "c"])
        .push(vec![])
        .push(vec!["d", "e"]);
    let source = ChunkedSource::new("sizes-3-0-2", script).with_config(fast());
    let rows = source.collect_rows()?;
    assert_rows_in_order(&rows, &["a", "b", "c", "d", "e"]);
    Ok(())
}

#[test]
fn producer_with_no_data_ends_immediately() -> Result<()> {
    let source = ChunkedSource::new("nothing", ScriptedProducer::<u8>::new()).with_config(fast());
    let mut e = source.enumerate();
    assert!(!e.move_next()?);
    assert!(e.current().is_none());
    Ok(())
}

#[test]
fn slow_producer_is_waited_for() -> Result<()> {
    let script = ScriptedProducer::new()
        .push(vec![1])
        .sleep(Duration::from_millis(40))
        .push(vec![2])
        .sleep(Duration::from_millis(40))
        .push(vec![3]);
    let source = ChunkedSource::new("slow", script).with_config(fast());
    assert_eq!(source.collect_rows()?, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn end_of_sequence_is_sticky() -> Result<()> {
    let source = ChunkedSource::new("once", ScriptedProducer::new().push(vec![1]));
    let mut e = source.with_config(fast()).enumerate();
    assert!(e.move_next()?);
    assert_eq!(e.current(), Some(&1));
    assert!(!e.move_next()?);
    for _ in 0..5 {
        assert!(!e.move_next()?);
        assert!(e.current().is_none());
    }
    assert!(e.is_finished());
    Ok(())
}

#[test]
fn fault_after_two_rows_surfaces_on_third_pull() -> Result<()> {
    let script = ScriptedProducer::new().push(vec![10, 20]).fail("boom");
    let source = ChunkedSource::new("boom-api", script).with_config(fast());
    let mut e = source.enumerate();

    assert!(e.move_next()?);
    assert_eq!(e.current(), Some(&10));
    assert!(e.move_next()?);
    assert_eq!(e.current(), Some(&20));

    let err = e.move_next().unwrap_err();
    assert_fault_message(&err, "boom");
    assert_eq!(err.source_name, "boom-api");
    assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("boom"));
    assert!(err.to_string().contains("boom-api"));

    // terminated after the fault
    assert!(!e.move_next()?);
    Ok(())
}

#[test]
fn rows_queued_before_fault_are_still_delivered() -> Result<()> {
    let script = ScriptedProducer::new()
        .push(vec![1, 2])
        .push(vec![3])
        .push(vec![4, 5])
        .fail("late failure");
    let source = ChunkedSource::new("late", script).with_config(fast());
    let mut e = source.enumerate();
    assert!(e.move_next()?);
    // let the producer finish and fault while the consumer is idle
    std::thread::sleep(Duration::from_millis(50));

    let (mut rows, fault) = split_at_fault(&mut e);
    rows.insert(0, 1);
    assert_rows_in_order(&rows, &[1, 2, 3, 4, 5]);
    assert_fault_message(&fault.expect("fault expected"), "late failure");
    Ok(())
}

#[test]
fn fault_before_any_data() {
    let source = ChunkedSource::new("dead", ScriptedProducer::<u32>::new().fail("unreachable host"))
        .with_config(fast());
    let (rows, fault) = split_at_fault(source.iter());
    assert!(rows.is_empty());
    let fault = fault.expect("fault expected");
    assert_fault_message(&fault, "unreachable host");
    assert_eq!(fault.root_cause().to_string(), "unreachable host");
}

#[test]
fn producer_panic_becomes_fault() {
    let source = ChunkedSource::new("panicky", ScriptedProducer::new().push(vec![1u8]).panic("bad row"))
        .with_config(fast());
    let (rows, fault) = split_at_fault(source.iter());
    assert_eq!(rows, vec![1]);
    let fault = fault.expect("fault expected");
    assert!(fault.cause().to_string().contains("bad row"));
}

#[test]
fn iterator_stops_after_error() {
    let source = ChunkedSource::new("fused", ScriptedProducer::new().push(vec![1]).fail("x"))
        .with_config(fast());
    let items: Vec<_> = source.iter().collect();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(items[1].is_err());
}

#[test]
fn closure_producer_with_question_mark() -> Result<()> {
    let source = ChunkedSource::from_fn("closure", |sink, cancel| {
        for i in 0..4 {
            cancel.check()?;
            sink.put_rows(vec![i; i])?;
        }
        Ok(())
    })
    .with_config(fast());
    assert_eq!(source.collect_rows()?, vec![1, 2, 2, 3, 3, 3]);
    Ok(())
}

#[test]
fn bounded_queue_preserves_order() -> Result<()> {
    let script = ScriptedProducer::new()
        .push((0..5).collect())
        .push((5..10).collect())
        .push((10..15).collect())
        .push((15..20).collect());
    let puts = script.chunks_put();
    let source =
        ChunkedSource::new("bounded", script).with_config(fast().with_queue_capacity(1));
    let rows = source.collect_rows()?;
    assert_rows_in_order(&rows, &(0..20).collect::<Vec<_>>());
    assert_eq!(puts.get(), 4);
    Ok(())
}

#[test]
fn sub_millisecond_poll_interval_still_streams() -> Result<()> {
    let script = ScriptedProducer::new()
        .push(vec![1])
        .sleep(Duration::from_millis(10))
        .push(vec![2]);
    let config = StreamConfig::default().with_poll_interval(Duration::from_micros(500));
    assert_eq!(config.poll_interval(), Duration::from_millis(1));
    let source = ChunkedSource::new("sub-ms", script).with_config(config);
    assert_eq!(source.collect_rows()?, vec![1, 2]);
    Ok(())
}
