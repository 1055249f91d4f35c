use chunkwave::error::ChunkwaveError;
use chunkwave::pipeline::orchestrator::{Pipeline, PipelineConfig};
use chunkwave::pipeline::sink::CollectorSink;
use chunkwave::pipeline::types::{Resolution, SinkEvent, TaskStatus};
use chunkwave::transform::MockTransform;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| i as f32).collect()
}

fn pipeline(mock: MockTransform) -> Pipeline {
    Pipeline::new(PipelineConfig::default(), Arc::new(mock)).unwrap()
}

/// Deterministic permutation of 0..n (xorshift-driven Fisher-Yates).
fn permutation(n: usize, mut seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        let j = (seed % (i as u64 + 1)) as usize;
        order.swap(i, j);
    }
    order
}

fn wait_for_chunks(sink: &CollectorSink, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while sink.chunk_indices().len() < count {
        assert!(Instant::now() < deadline, "timed out waiting for {} chunks", count);
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn medium_resolution_reverse_completion_emits_in_order() {
    let mock = MockTransform::new().with_reverse_delays(100, Duration::from_millis(1));
    let pipeline = pipeline(mock);
    let sink = CollectorSink::new();
    let samples = ramp(1000);

    let handle = pipeline
        .submit(&samples, Resolution::Medium, "ramp.wav", Box::new(sink.clone()))
        .unwrap();
    assert_eq!(handle.chunk_count(), 100);
    let outcome = handle.wait().unwrap();

    assert_eq!(outcome.status, TaskStatus::Complete);
    assert_eq!(outcome.emitted, 100);
    assert_eq!(outcome.pending_at_exit, 0);

    let events = sink.events();
    assert_eq!(events.len(), 101);
    assert_eq!(events.last(), Some(&SinkEvent::Complete));
    for (i, event) in events[..100].iter().enumerate() {
        match event {
            SinkEvent::Chunk(chunk) => {
                assert_eq!(chunk.index, i);
                // Echo transform: chunk i holds samples 10i..10i+10
                let expected: Vec<f32> = (i * 10..i * 10 + 10).map(|s| s as f32).collect();
                assert_eq!(chunk.payload, expected);
            }
            other => panic!("unexpected event {:?} at {}", other, i),
        }
    }
}

#[test]
fn order_holds_for_shuffled_completion_times() {
    for seed in [7u64, 1234, 99_991] {
        let mut mock = MockTransform::new();
        for (index, rank) in permutation(40, seed).into_iter().enumerate() {
            mock = mock.with_delay(index, Duration::from_micros(200 * rank as u64));
        }
        let pipeline = pipeline(mock);
        let sink = CollectorSink::new();

        let outcome = pipeline
            .submit_with_chunk_count(&ramp(400), 40, "shuffled.wav", Box::new(sink.clone()))
            .unwrap()
            .wait()
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Complete, "seed {}", seed);
        assert_eq!(sink.chunk_indices(), (0..40).collect::<Vec<_>>(), "seed {}", seed);
    }
}

#[test]
fn stop_immediately_after_submission_emits_nothing() {
    let mock = MockTransform::new().with_reverse_delays(100, Duration::from_millis(1));
    let pipeline = pipeline(mock);
    let sink = CollectorSink::new();

    let handle = pipeline
        .submit(&ramp(1000), Resolution::Medium, "ramp.wav", Box::new(sink.clone()))
        .unwrap();
    pipeline.request_stop(handle.task_id()).unwrap();
    let outcome = handle.wait().unwrap();

    assert_eq!(outcome.status, TaskStatus::Stopped);
    assert_eq!(outcome.emitted, 0);
    assert_eq!(sink.events(), vec![SinkEvent::Stopped]);
}

#[test]
fn stop_after_some_emissions_ends_with_stopped() {
    let mock = MockTransform::new().with_default_delay(Duration::from_millis(5));
    let pipeline = pipeline(mock);
    let sink = CollectorSink::new();

    let handle = pipeline
        .submit(&ramp(1000), Resolution::Medium, "ramp.wav", Box::new(sink.clone()))
        .unwrap();
    let task_id = handle.task_id();

    wait_for_chunks(&sink, 5);
    pipeline.request_stop(task_id).unwrap();
    let outcome = handle.wait().unwrap();

    assert_eq!(outcome.status, TaskStatus::Stopped);
    let indices = sink.chunk_indices();
    assert!(indices.len() >= 5 && indices.len() <= 100);
    assert_eq!(indices, (0..indices.len()).collect::<Vec<_>>());
    assert_eq!(sink.events().last(), Some(&SinkEvent::Stopped));
    assert_eq!(outcome.emitted, indices.len());

    // Nothing arrives after the terminal event
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(sink.events().len(), indices.len() + 1);
}

#[test]
fn stop_after_terminal_event_is_task_not_found() {
    let pipeline = pipeline(MockTransform::new());
    let handle = pipeline
        .submit_with_chunk_count(&ramp(10), 5, "short.wav", Box::new(CollectorSink::new()))
        .unwrap();
    let task_id = handle.task_id();
    handle.wait().unwrap();

    assert!(matches!(
        pipeline.request_stop(task_id),
        Err(ChunkwaveError::TaskNotFound { .. })
    ));
}

#[test]
fn single_chunk_task() {
    let pipeline = pipeline(MockTransform::new());
    let sink = CollectorSink::new();

    let outcome = pipeline
        .submit_with_chunk_count(&ramp(7), 1, "one.wav", Box::new(sink.clone()))
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(outcome.status, TaskStatus::Complete);
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], SinkEvent::Chunk(c) if c.index == 0 && c.payload.len() == 7));
    assert_eq!(events[1], SinkEvent::Complete);
}

#[test]
fn more_chunks_than_samples_still_completes() {
    let pipeline = pipeline(MockTransform::new());
    let sink = CollectorSink::new();

    let outcome = pipeline
        .submit_with_chunk_count(&ramp(3), 8, "tiny.wav", Box::new(sink.clone()))
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(outcome.status, TaskStatus::Complete);
    assert_eq!(sink.chunk_indices(), (0..8).collect::<Vec<_>>());
}

#[test]
fn empty_input_is_rejected_without_a_task() {
    let pipeline = pipeline(MockTransform::new());
    let result = pipeline.submit(
        &[],
        Resolution::Fine,
        "empty.wav",
        Box::new(CollectorSink::new()),
    );

    assert!(matches!(result, Err(ChunkwaveError::EmptyInput)));
    assert!(pipeline.active_tasks().is_empty());
}

#[test]
fn failed_chunks_are_degraded_not_dropped() {
    let mock = MockTransform::new().with_failure(3).with_panic(7);
    let pipeline = pipeline(mock);
    let sink = CollectorSink::new();

    let outcome = pipeline
        .submit_with_chunk_count(&ramp(100), 10, "faulty.wav", Box::new(sink.clone()))
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(outcome.status, TaskStatus::Complete);
    assert_eq!(sink.chunk_indices(), (0..10).collect::<Vec<_>>());
    for event in sink.events() {
        if let SinkEvent::Chunk(chunk) = event {
            assert_eq!(chunk.is_degraded(), chunk.index == 3 || chunk.index == 7);
        }
    }
}

#[test]
fn concurrent_tasks_are_independent() {
    let mock = MockTransform::new().with_default_delay(Duration::from_millis(2));
    let pipeline = pipeline(mock);

    let keep = CollectorSink::new();
    let stop = CollectorSink::new();
    let kept = pipeline
        .submit_with_chunk_count(&ramp(500), 50, "keep.wav", Box::new(keep.clone()))
        .unwrap();
    let stopped = pipeline
        .submit_with_chunk_count(&ramp(500), 50, "stop.wav", Box::new(stop.clone()))
        .unwrap();
    assert_eq!(pipeline.active_tasks().len(), 2);

    pipeline.request_stop(stopped.task_id()).unwrap();

    assert_eq!(stopped.wait().unwrap().status, TaskStatus::Stopped);
    assert_eq!(kept.wait().unwrap().status, TaskStatus::Complete);
    assert_eq!(keep.chunk_indices(), (0..50).collect::<Vec<_>>());
    assert_eq!(stop.events().last(), Some(&SinkEvent::Stopped));
    assert!(pipeline.active_tasks().is_empty());
}
