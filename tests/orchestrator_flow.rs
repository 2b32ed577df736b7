use parking_lot::Mutex;
use sinfonia::playback::{PlaybackState, RecordingOutput, Trigger};
use sinfonia::streaming::source::MemoryRowSource;
use sinfonia::streaming::{
    OrchestratorConfig, OrchestratorEvent, Phase, Row, StopAction, StreamError, StreamMode,
    StreamOutcome, StreamingOrchestrator, TimelineOutcome,
};
use sinfonia::FieldMapper;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn orchestrator(output: Arc<RecordingOutput>, pace_ms: u64) -> Arc<StreamingOrchestrator> {
    Arc::new(StreamingOrchestrator::new(
        OrchestratorConfig {
            pace: Duration::from_millis(pace_ms),
            ..Default::default()
        },
        FieldMapper::default(),
        output,
    ))
}

/// One row per second carrying pitch, length and loudness
fn note_rows(notes: &[(f64, f64, f64)]) -> Vec<Row> {
    notes
        .iter()
        .enumerate()
        .map(|(i, (pitch, length, loudness))| {
            Row::new(1_700_000_000_000 + 1000 * i as i64)
                .with_field("pitch", *pitch)
                .with_field("length", *length)
                .with_field("loudness", *loudness)
        })
        .collect()
}

fn sensor_rows(count: i64) -> Vec<Row> {
    (0..count)
        .map(|i| Row::new(1000 * i).with_field("temperatura", 20.0 + i as f64))
        .collect()
}

const NOTE_FIELDS: &[&str] = &["pitch", "length", "loudness"];

// =============================================================================
// TIMELINE MODE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_timeline_plays_at_relative_offsets() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output.clone(), 10);
    let mut source = MemoryRowSource::new(note_rows(&[
        (60.0, 0.5, 100.0),
        (64.0, 0.5, 100.0),
        (67.0, 1.0, 127.0),
    ]));

    let outcome = orch
        .start_timeline(&mut source, &fields(NOTE_FIELDS))
        .await
        .unwrap();
    let scheduled_at = Instant::now();

    let TimelineOutcome::Scheduled {
        summary,
        handle,
        events,
        duration_secs,
    } = outcome
    else {
        panic!("expected a scheduled timeline");
    };
    assert_eq!(summary.total_rows, 3);
    assert_eq!(events, 3);
    assert_eq!(duration_secs, 3.0);
    assert_eq!(orch.phase(), Phase::Playing);
    assert!(orch.status().is_playing_timeline);

    assert_eq!(handle.wait().await, PlaybackState::Completed);
    assert_eq!(scheduled_at.elapsed(), Duration::from_millis(3500));
    assert_eq!(orch.phase(), Phase::Idle);
    assert!(!orch.status().is_playing_timeline);

    // Three rows at a 10ms pace were fetched before scheduling
    let offsets: Vec<Duration> = output.triggers().iter().map(Trigger::at).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::from_millis(30),
            Duration::from_millis(1030),
            Duration::from_millis(2030)
        ]
    );

    let notes = output.notes();
    assert_eq!(notes[0].duration, Duration::from_millis(500));
    assert_eq!(notes[2].velocity, 1.0);
    assert!((notes[0].frequency - 261.6256).abs() < 1e-3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_fetch_never_schedules() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output.clone(), 100);
    let source = MemoryRowSource::new(note_rows(&[(60.0, 0.5, 100.0); 10]));

    let task = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            let mut source = source;
            orch.start_timeline(&mut source, &fields(NOTE_FIELDS)).await
        })
    };

    sleep(Duration::from_millis(250)).await;
    assert_eq!(orch.phase(), Phase::Fetching(StreamMode::Timeline));
    assert!(orch.status().is_scheduling);
    assert_eq!(orch.stop(), StopAction::FetchStopped(StreamMode::Timeline));

    let outcome = task.await.unwrap().unwrap();
    let TimelineOutcome::Stopped(summary) = outcome else {
        panic!("expected a stopped fetch");
    };
    // The pace wait in progress at the stop still delivers its row
    assert_eq!(summary.total_rows, 3);

    sleep(Duration::from_secs(30)).await;
    assert!(output.is_empty());
    assert_eq!(orch.phase(), Phase::Idle);
    assert!(orch.playback_handle().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_playback_then_restart() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output.clone(), 0);
    let rows = note_rows(&[(60.0, 0.5, 100.0), (62.0, 0.5, 100.0), (64.0, 0.5, 100.0)]);

    let mut first = MemoryRowSource::new(rows.clone());
    let TimelineOutcome::Scheduled { handle, .. } = orch
        .start_timeline(&mut first, &fields(NOTE_FIELDS))
        .await
        .unwrap()
    else {
        panic!("expected a scheduled timeline");
    };

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(orch.stop_live(), StopAction::Nothing);
    assert_eq!(orch.stop(), StopAction::PlaybackCancelled);
    assert_eq!(handle.state(), PlaybackState::Cancelled);
    assert_eq!(orch.phase(), Phase::Idle);
    assert_eq!(output.len(), 2);

    // A second stop has nothing left to do
    assert_eq!(orch.stop(), StopAction::Nothing);

    let mut second = MemoryRowSource::new(rows);
    let TimelineOutcome::Scheduled { handle: next, .. } = orch
        .start_timeline(&mut second, &fields(NOTE_FIELDS))
        .await
        .unwrap()
    else {
        panic!("expected a scheduled timeline");
    };
    assert_ne!(next.id(), handle.id());
    assert_eq!(next.wait().await, PlaybackState::Completed);

    assert_eq!(handle.state(), PlaybackState::Cancelled);
    assert_eq!(output.len(), 5);
    assert_eq!(orch.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_timeline_discards_incomplete_samples() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output.clone(), 0);
    let mut source = MemoryRowSource::new(vec![
        Row::new(0)
            .with_field("pitch", 60.0)
            .with_field("length", 0.25)
            .with_field("loudness", 90.0),
        Row::new(500).with_field("pitch", 62.0),
        Row::new(2000)
            .with_field("pitch", 64.0)
            .with_field("length", 0.25)
            .with_field("loudness", 90.0),
    ]);

    let TimelineOutcome::Scheduled {
        summary,
        handle,
        events,
        duration_secs,
    } = orch
        .start_timeline(&mut source, &fields(NOTE_FIELDS))
        .await
        .unwrap()
    else {
        panic!("expected a scheduled timeline");
    };

    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.rows_by_field.get("pitch"), Some(&3));
    assert_eq!(summary.rows_by_field.get("length"), Some(&2));
    assert_eq!(events, 2);
    assert_eq!(duration_secs, 2.25);
    handle.wait().await;
    assert_eq!(output.len(), 2);
}

// =============================================================================
// LIVE MODE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_live_stop_ends_stream() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output.clone(), 100);
    let source = MemoryRowSource::new(sensor_rows(100));

    let task = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            let mut source = source;
            orch.start_live(&mut source, &fields(&["temperatura"])).await
        })
    };

    sleep(Duration::from_millis(450)).await;
    assert!(orch.status().is_streaming);
    assert_eq!(orch.stop_timeline(), StopAction::Nothing);
    assert_eq!(orch.stop_live(), StopAction::FetchStopped(StreamMode::Live));

    let outcome = task.await.unwrap().unwrap();
    let StreamOutcome::Stopped(summary) = outcome else {
        panic!("expected a stopped stream");
    };
    assert_eq!(summary.total_rows, 5);
    assert_eq!(output.chords().len(), 5);
    assert!(output
        .triggers()
        .iter()
        .all(|t| matches!(t, Trigger::Chord { duration, .. } if *duration == Duration::from_millis(125))));
    assert_eq!(orch.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected_while_running() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output, 100);
    let source = MemoryRowSource::new(sensor_rows(50));

    let task = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            let mut source = source;
            orch.start_live(&mut source, &fields(&["temperatura"])).await
        })
    };

    sleep(Duration::from_millis(150)).await;
    let mut other = MemoryRowSource::new(sensor_rows(1));
    let result = orch
        .start_timeline(&mut other, &fields(&["temperatura"]))
        .await;
    assert!(matches!(result, Err(StreamError::AlreadyRunning)));
    assert_eq!(other.remaining(), 1);

    orch.stop();
    assert!(matches!(
        task.await.unwrap(),
        Ok(StreamOutcome::Stopped(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_reported_and_cleared_on_next_start() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output, 0);

    let mut failing = MemoryRowSource::new(sensor_rows(5)).fail_after(2, "timed out");
    let outcome = orch
        .start_live(&mut failing, &fields(&["temperatura"]))
        .await
        .unwrap();
    assert!(matches!(outcome, StreamOutcome::Failed(ref msg) if msg.contains("timed out")));
    let error = orch.status().error.unwrap();
    assert!(error.starts_with("Failed to stream measurements:"));

    let mut healthy = MemoryRowSource::new(sensor_rows(2));
    let outcome = orch
        .start_live(&mut healthy, &fields(&["temperatura"]))
        .await
        .unwrap();
    assert!(matches!(outcome, StreamOutcome::Completed(_)));
    assert_eq!(orch.status().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_status_events_follow_phases() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output, 0);
    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        orch.set_event_callback(move |event| events.lock().push(event));
    }

    let mut source = MemoryRowSource::new(note_rows(&[(60.0, 0.5, 100.0)]));
    let TimelineOutcome::Scheduled { handle, .. } = orch
        .start_timeline(&mut source, &fields(NOTE_FIELDS))
        .await
        .unwrap()
    else {
        panic!("expected a scheduled timeline");
    };
    handle.wait().await;

    let events = events.lock();
    let statuses: Vec<(bool, bool)> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::StatusChanged(s) => Some((s.is_scheduling, s.is_playing_timeline)),
            OrchestratorEvent::PlaybackFinished(_) => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![(true, false), (false, true), (false, false)]
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::PlaybackFinished(PlaybackState::Completed))));
}

#[tokio::test(start_paused = true)]
async fn test_empty_selection_while_running_keeps_status() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output, 100);
    let source = MemoryRowSource::new(sensor_rows(50));

    let task = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            let mut source = source;
            orch.start_live(&mut source, &fields(&["temperatura"])).await
        })
    };

    sleep(Duration::from_millis(150)).await;
    let mut other = MemoryRowSource::new(sensor_rows(1));
    let result = orch.start_live(&mut other, &[]).await;
    assert!(matches!(result, Err(StreamError::AlreadyRunning)));
    let status = orch.status();
    assert!(status.is_streaming);
    assert_eq!(status.error, None);

    orch.stop();
    assert!(matches!(
        task.await.unwrap(),
        Ok(StreamOutcome::Stopped(_))
    ));
    assert_eq!(orch.status().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_stop_timeline_covers_fetch_and_playback() {
    let output = Arc::new(RecordingOutput::new());
    let orch = orchestrator(output.clone(), 100);
    let rows = note_rows(&[(60.0, 0.5, 100.0), (62.0, 0.5, 100.0), (64.0, 0.5, 100.0)]);

    // While the timeline rows are still being fetched
    let source = MemoryRowSource::new(note_rows(&[(60.0, 0.5, 100.0); 10]));
    let task = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            let mut source = source;
            orch.start_timeline(&mut source, &fields(NOTE_FIELDS)).await
        })
    };
    sleep(Duration::from_millis(250)).await;
    assert_eq!(orch.stop_live(), StopAction::Nothing);
    assert_eq!(
        orch.stop_timeline(),
        StopAction::FetchStopped(StreamMode::Timeline)
    );
    assert!(matches!(
        task.await.unwrap(),
        Ok(TimelineOutcome::Stopped(_))
    ));
    assert_eq!(orch.phase(), Phase::Idle);
    assert!(output.is_empty());

    // While the scheduled timeline is playing
    let mut source = MemoryRowSource::new(rows);
    let TimelineOutcome::Scheduled { handle, .. } = orch
        .start_timeline(&mut source, &fields(NOTE_FIELDS))
        .await
        .unwrap()
    else {
        panic!("expected a scheduled timeline");
    };
    sleep(Duration::from_millis(500)).await;
    assert_eq!(orch.phase(), Phase::Playing);
    assert_eq!(orch.stop_timeline(), StopAction::PlaybackCancelled);
    assert_eq!(handle.state(), PlaybackState::Cancelled);
    assert_eq!(orch.phase(), Phase::Idle);
    assert_eq!(orch.stop_timeline(), StopAction::Nothing);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(output.len(), 1);
}
