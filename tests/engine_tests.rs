// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the scan engine
//!
//! Hardware is replaced by scripted collaborators: a capture source that
//! publishes one frame on open, readers that replay a list of payloads and
//! a loader whose readiness is fixed per symbology.

use codescan::backends::camera::{
    CameraFrame, FacingMode, Frame, MediaDevices, MediaStream, VideoSink,
};
use codescan::backends::decoders::{
    BackendId, DependencyLoader, DetectedBarcode, FormatSelection, FormatSet,
    NativeBarcodePlatform, Readiness, SymbolReader, Symbology,
};
use codescan::engine::{Callbacks, EngineState, ResultMode, ScanConfig, ScanEngine};
use codescan::errors::{CameraError, DecodeError, ErrorKind, ScanError};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StreamCounters {
    opened: AtomicUsize,
    live: AtomicUsize,
}

struct ScriptedDevices {
    counters: Arc<StreamCounters>,
    deny: bool,
    open_delay: Duration,
}

impl ScriptedDevices {
    fn new() -> (Arc<Self>, Arc<StreamCounters>) {
        let counters = Arc::new(StreamCounters::default());
        let devices = Arc::new(Self {
            counters: Arc::clone(&counters),
            deny: false,
            open_delay: Duration::ZERO,
        });
        (devices, counters)
    }

    /// Devices whose open waits like a pending permission prompt
    fn slow(open_delay: Duration) -> (Arc<Self>, Arc<StreamCounters>) {
        let counters = Arc::new(StreamCounters::default());
        let devices = Arc::new(Self {
            counters: Arc::clone(&counters),
            deny: false,
            open_delay,
        });
        (devices, counters)
    }

    fn denying() -> Arc<Self> {
        Arc::new(Self {
            counters: Arc::new(StreamCounters::default()),
            deny: true,
            open_delay: Duration::ZERO,
        })
    }
}

impl MediaDevices for ScriptedDevices {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(
        &self,
        _facing: FacingMode,
        sink: Weak<VideoSink>,
    ) -> BoxFuture<'_, Result<Box<dyn MediaStream>, CameraError>> {
        async move {
            if !self.open_delay.is_zero() {
                tokio::time::sleep(self.open_delay).await;
            }
            if self.deny {
                return Err(CameraError::PermissionDenied("user declined".into()));
            }
            if let Some(sink) = sink.upgrade() {
                sink.publish(CameraFrame::from_gray(8, 6, vec![200; 48]));
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            self.counters.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedStream {
                counters: Arc::clone(&self.counters),
                stopped: false,
            }) as Box<dyn MediaStream>)
        }
        .boxed()
    }
}

struct ScriptedStream {
    counters: Arc<StreamCounters>,
    stopped: bool,
}

impl MediaStream for ScriptedStream {
    fn label(&self) -> &str {
        "scripted-stream"
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Replays payloads in order, then repeats the last entry (or finds nothing)
struct ScriptedReader {
    payloads: Mutex<VecDeque<Option<String>>>,
    repeat_last: bool,
    calls: AtomicUsize,
}

impl ScriptedReader {
    fn replay(payloads: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(payloads.iter().map(|p| Some(p.to_string())).collect()),
            repeat_last: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn always(payload: &str) -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(VecDeque::from([Some(payload.to_string())])),
            repeat_last: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn nothing() -> Arc<Self> {
        Self::replay(&[])
    }
}

impl SymbolReader for ScriptedReader {
    fn read(&self, _frame: &Frame) -> Result<Option<String>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut payloads = self.payloads.lock().unwrap();
        if self.repeat_last && payloads.len() == 1 {
            return Ok(payloads[0].clone());
        }
        Ok(payloads.pop_front().flatten())
    }
}

struct ScriptedLoader {
    unavailable: FormatSet,
}

impl ScriptedLoader {
    fn ready() -> Arc<Self> {
        Arc::new(Self {
            unavailable: FormatSet::new(),
        })
    }

    fn without(formats: &[Symbology]) -> Arc<Self> {
        Arc::new(Self {
            unavailable: formats.iter().copied().collect(),
        })
    }
}

/// Loader that reports ready after a delay
struct DelayedLoader {
    delay: Duration,
}

impl DependencyLoader for DelayedLoader {
    fn ensure_available(&self, _symbology: Symbology) -> BoxFuture<'_, Readiness> {
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            Readiness::Ready
        }
        .boxed()
    }
}

impl DependencyLoader for ScriptedLoader {
    fn ensure_available(&self, symbology: Symbology) -> BoxFuture<'_, Readiness> {
        let readiness = if self.unavailable.contains(&symbology) {
            Readiness::Unavailable
        } else {
            Readiness::Ready
        };
        futures::future::ready(readiness).boxed()
    }
}

struct ScriptedPlatform {
    supported: FormatSet,
    payload: String,
}

impl NativeBarcodePlatform for ScriptedPlatform {
    fn supported_formats(&self) -> BoxFuture<'_, Result<FormatSet, DecodeError>> {
        futures::future::ready(Ok(self.supported.clone())).boxed()
    }

    fn detect<'a>(
        &'a self,
        _frame: &'a Frame,
        _formats: &'a FormatSet,
    ) -> BoxFuture<'a, Result<Vec<DetectedBarcode>, DecodeError>> {
        futures::future::ready(Ok(vec![DetectedBarcode {
            raw_value: self.payload.clone(),
            format: Symbology::Qr,
        }]))
        .boxed()
    }
}

/// Native detector whose detection takes `delay` to resolve
struct SlowPlatform {
    delay: Duration,
    detections: Arc<AtomicUsize>,
}

impl NativeBarcodePlatform for SlowPlatform {
    fn supported_formats(&self) -> BoxFuture<'_, Result<FormatSet, DecodeError>> {
        futures::future::ready(Ok(FormatSet::from([Symbology::Qr]))).boxed()
    }

    fn detect<'a>(
        &'a self,
        _frame: &'a Frame,
        _formats: &'a FormatSet,
    ) -> BoxFuture<'a, Result<Vec<DetectedBarcode>, DecodeError>> {
        self.detections.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(self.delay).await;
            Ok(vec![DetectedBarcode {
                raw_value: "LATE".into(),
                format: Symbology::Qr,
            }])
        }
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Result(String, BackendId),
    Error(ErrorKind),
    Heartbeat(u32, u32),
    Activity(bool),
}

fn recording_callbacks(heartbeat: bool) -> (Callbacks, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (result_tx, error_tx, heartbeat_tx, activity_tx) =
        (tx.clone(), tx.clone(), tx.clone(), tx);

    let callbacks = Callbacks {
        on_result: Some(Arc::new(move |payload: &str, backend| {
            let _ = result_tx.send(Event::Result(payload.to_string(), backend));
        })),
        on_error: Some(Arc::new(move |kind, _message: &str| {
            let _ = error_tx.send(Event::Error(kind));
        })),
        on_heartbeat: heartbeat.then(|| {
            Arc::new(move |width: u32, height: u32, _at: chrono::DateTime<chrono::Utc>| {
                let _ = heartbeat_tx.send(Event::Heartbeat(width, height));
            }) as codescan::engine::HeartbeatCallback
        }),
        on_activity: Some(Arc::new(move |active| {
            let _ = activity_tx.send(Event::Activity(active));
        })),
    };
    (callbacks, rx)
}

/// Next event that is not a heartbeat or activity change
async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    loop {
        let event = timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for engine event")
            .expect("event channel closed");
        if matches!(event, Event::Result(..) | Event::Error(_)) {
            return event;
        }
    }
}

fn config_for(
    sink: &Arc<VideoSink>,
    formats: FormatSelection,
    mode: ResultMode,
    callbacks: Callbacks,
) -> ScanConfig {
    ScanConfig {
        formats: Some(formats),
        mode,
        target_fps: 30,
        callbacks,
        ..ScanConfig::with_sink(sink)
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_qr_stop_once_with_native_unavailable() {
    let (devices, counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .native(Arc::new(ScriptedPlatform {
            supported: FormatSet::from([Symbology::Code39]),
            payload: "NATIVE".into(),
        }))
        .qr_reader(ScriptedReader::always("ABC123"))
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    engine
        .start(config_for(
            &sink,
            FormatSelection::only([Symbology::Qr]),
            ResultMode::StopOnce,
            callbacks,
        ))
        .await
        .unwrap();

    assert_eq!(
        next_outcome(&mut rx).await,
        Event::Result("ABC123".into(), BackendId::SoftQr)
    );
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);

    // No second emission
    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, Event::Result(..)), "unexpected {:?}", event);
    }
}

#[tokio::test]
async fn test_code39_stop_on_valid_key() {
    let (devices, counters) = ScriptedDevices::new();
    let reader = ScriptedReader::replay(&["A1", "B2", "X9"]);
    let engine = ScanEngine::builder(devices)
        .code39_reader(reader.clone())
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    let mut config = config_for(
        &sink,
        FormatSelection::only([Symbology::Code39]),
        ResultMode::StopOnValid,
        callbacks,
    );
    config.key = Some("X9".into());
    engine.start(config).await.unwrap();

    assert_eq!(
        next_outcome(&mut rx).await,
        Event::Result("X9".into(), BackendId::SoftCode39)
    );
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(reader.calls.load(Ordering::SeqCst), 3);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_start_without_sink_is_not_mounted() {
    let (devices, counters) = ScriptedDevices::new();
    let engine = ScanEngine::new(devices);
    let (callbacks, mut rx) = recording_callbacks(false);

    let config = ScanConfig {
        callbacks,
        ..ScanConfig::default()
    };
    assert_eq!(engine.start(config).await, Err(ScanError::NotMounted));
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(rx.try_recv().ok(), Some(Event::Error(ErrorKind::NotMounted)));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_twice_equals_once() {
    let (devices, counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .qr_reader(ScriptedReader::nothing())
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    engine
        .start(config_for(
            &sink,
            FormatSelection::only([Symbology::Qr]),
            ResultMode::Continuous,
            callbacks,
        ))
        .await
        .unwrap();
    assert!(engine.is_running());

    engine.stop();
    engine.stop();
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events, vec![Event::Activity(true), Event::Activity(false)]);
}

#[tokio::test]
async fn test_start_while_running_does_not_reacquire() {
    let (devices, counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .qr_reader(ScriptedReader::nothing())
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    let config = config_for(
        &sink,
        FormatSelection::Auto,
        ResultMode::Continuous,
        Callbacks::default(),
    );
    engine.start(config.clone()).await.unwrap();
    engine.start(config).await.unwrap();

    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(counters.live.load(Ordering::SeqCst), 1);

    engine.stop();
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_continuous_cycles_release_the_camera() {
    let (devices, counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .qr_reader(ScriptedReader::always("LOOP"))
        .loader(ScriptedLoader::ready())
        .build();
    let sink = VideoSink::new();

    for cycle in 1..=4 {
        let (callbacks, mut rx) = recording_callbacks(false);
        engine
            .start(config_for(
                &sink,
                FormatSelection::only([Symbology::Qr]),
                ResultMode::Continuous,
                callbacks,
            ))
            .await
            .unwrap();

        // Several hits without stopping
        for _ in 0..2 {
            assert_eq!(
                next_outcome(&mut rx).await,
                Event::Result("LOOP".into(), BackendId::SoftQr)
            );
            assert!(engine.is_running());
        }

        engine.stop();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(counters.live.load(Ordering::SeqCst), 0, "cycle {}", cycle);
        assert_eq!(counters.opened.load(Ordering::SeqCst), cycle);
    }
}

#[tokio::test]
async fn test_no_decoder_available_is_fatal() {
    let (devices, counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .loader(ScriptedLoader::without(&Symbology::ALL))
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    engine
        .start(config_for(
            &sink,
            FormatSelection::Auto,
            ResultMode::StopOnce,
            callbacks,
        ))
        .await
        .unwrap();

    assert_eq!(
        next_outcome(&mut rx).await,
        Event::Error(ErrorKind::NoDecoderAvailable)
    );
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);

    // Exactly one error callback
    tokio::time::sleep(Duration::from_millis(100)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, Event::Error(_)), "unexpected {:?}", event);
    }
}

#[tokio::test]
async fn test_partial_availability_keeps_scanning() {
    let (devices, _counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .qr_reader(ScriptedReader::always("Q1"))
        .loader(ScriptedLoader::without(&[Symbology::Code39]))
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    engine
        .start(config_for(
            &sink,
            FormatSelection::Auto,
            ResultMode::StopOnce,
            callbacks,
        ))
        .await
        .unwrap();

    assert_eq!(
        next_outcome(&mut rx).await,
        Event::Result("Q1".into(), BackendId::SoftQr)
    );
}

#[tokio::test]
async fn test_permission_denied_leaves_engine_idle() {
    let engine = ScanEngine::builder(ScriptedDevices::denying())
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    let result = engine
        .start(config_for(
            &sink,
            FormatSelection::Auto,
            ResultMode::StopOnce,
            callbacks,
        ))
        .await;

    assert!(matches!(
        result,
        Err(ScanError::Camera(CameraError::PermissionDenied(_)))
    ));
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(
        next_outcome(&mut rx).await,
        Event::Error(ErrorKind::PermissionDenied)
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, Event::Error(_)), "unexpected {:?}", event);
    }
}

#[tokio::test]
async fn test_native_detector_runs_first() {
    let (devices, _counters) = ScriptedDevices::new();
    let soft = ScriptedReader::always("SOFT");
    let engine = ScanEngine::builder(devices)
        .native(Arc::new(ScriptedPlatform {
            supported: FormatSet::from([Symbology::Qr, Symbology::Code39]),
            payload: " NATIVE ".into(),
        }))
        .qr_reader(soft.clone())
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    engine
        .start(config_for(
            &sink,
            FormatSelection::only([Symbology::Qr]),
            ResultMode::StopOnce,
            callbacks,
        ))
        .await
        .unwrap();

    assert_eq!(
        next_outcome(&mut rx).await,
        Event::Result("NATIVE".into(), BackendId::NativeDetector)
    );
    assert_eq!(soft.calls.load(Ordering::SeqCst), 0);
    engine.stop();
}

#[tokio::test]
async fn test_heartbeat_reports_frame_size() {
    let (devices, _counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .qr_reader(ScriptedReader::nothing())
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(true);
    engine
        .start(config_for(
            &sink,
            FormatSelection::only([Symbology::Qr]),
            ResultMode::Continuous,
            callbacks,
        ))
        .await
        .unwrap();

    let heartbeat = loop {
        let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        if let Event::Heartbeat(w, h) = event {
            break (w, h);
        }
    };
    assert_eq!(heartbeat, (8, 6));
    engine.stop();
}

#[tokio::test]
async fn test_set_formats_applies_on_next_start() {
    let (devices, _counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .code39_reader(ScriptedReader::always("C39"))
        .qr_reader(ScriptedReader::nothing())
        .loader(ScriptedLoader::ready())
        .build();
    engine.set_formats(FormatSelection::only([Symbology::Code39]));
    assert_eq!(engine.formats(), FormatSelection::only([Symbology::Code39]));

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    let config = ScanConfig {
        callbacks,
        target_fps: 30,
        ..ScanConfig::with_sink(&sink)
    };
    engine.start(config).await.unwrap();

    assert_eq!(
        next_outcome(&mut rx).await,
        Event::Result("C39".into(), BackendId::SoftCode39)
    );
}

#[tokio::test]
async fn test_stop_from_result_callback() {
    let (devices, counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .qr_reader(ScriptedReader::always("AGAIN"))
        .loader(ScriptedLoader::ready())
        .build();

    let hits = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let stopper = engine.clone();
    let hit_counter = Arc::clone(&hits);
    let callbacks = Callbacks {
        on_result: Some(Arc::new(move |payload: &str, _backend| {
            hit_counter.fetch_add(1, Ordering::SeqCst);
            stopper.stop();
            let _ = tx.send(payload.to_string());
        })),
        ..Callbacks::default()
    };

    let sink = VideoSink::new();
    engine
        .start(config_for(
            &sink,
            FormatSelection::only([Symbology::Qr]),
            ResultMode::Continuous,
            callbacks,
        ))
        .await
        .unwrap();

    let payload = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload, "AGAIN");

    // Continuous mode would keep emitting if the stop had not taken
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_attempt_resolving_after_stop_is_discarded() {
    let (devices, counters) = ScriptedDevices::new();
    let detections = Arc::new(AtomicUsize::new(0));
    let engine = ScanEngine::builder(devices)
        .native(Arc::new(SlowPlatform {
            delay: Duration::from_millis(300),
            detections: Arc::clone(&detections),
        }))
        .qr_reader(ScriptedReader::nothing())
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    engine
        .start(config_for(
            &sink,
            FormatSelection::only([Symbology::Qr]),
            ResultMode::StopOnce,
            callbacks,
        ))
        .await
        .unwrap();

    // Wait for a detection to be in flight, then stop under it
    timeout(WAIT, async {
        while detections.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    engine.stop();
    assert_eq!(engine.state(), EngineState::Idle);

    tokio::time::sleep(Duration::from_millis(500)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, Event::Result(..)), "unexpected {:?}", event);
    }
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sampling_starts_before_backends_are_ready() {
    let (devices, _counters) = ScriptedDevices::new();
    let loader_delay = Duration::from_millis(300);
    let engine = ScanEngine::builder(devices)
        .qr_reader(ScriptedReader::always("READY"))
        .loader(Arc::new(DelayedLoader {
            delay: loader_delay,
        }))
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(true);
    let started = std::time::Instant::now();
    engine
        .start(config_for(
            &sink,
            FormatSelection::only([Symbology::Qr]),
            ResultMode::StopOnce,
            callbacks,
        ))
        .await
        .unwrap();
    assert!(started.elapsed() < loader_delay, "start() waited for preparation");
    assert!(engine.is_running());

    // Ticks run while the decoder is still preparing; the result follows once it is ready
    let mut heartbeats = 0;
    let result = loop {
        match timeout(WAIT, rx.recv()).await.unwrap().unwrap() {
            Event::Heartbeat(..) => heartbeats += 1,
            Event::Result(payload, backend) => break (payload, backend),
            Event::Activity(_) => {}
            Event::Error(kind) => panic!("unexpected error {:?}", kind),
        }
    };
    assert_eq!(result, ("READY".to_string(), BackendId::SoftQr));
    assert!(heartbeats > 1, "only {} ticks before the result", heartbeats);
    assert!(started.elapsed() >= loader_delay);
}

#[tokio::test]
async fn test_start_without_sink_while_running_is_ignored() {
    let (devices, counters) = ScriptedDevices::new();
    let engine = ScanEngine::builder(devices)
        .qr_reader(ScriptedReader::nothing())
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    engine
        .start(config_for(
            &sink,
            FormatSelection::only([Symbology::Qr]),
            ResultMode::Continuous,
            Callbacks::default(),
        ))
        .await
        .unwrap();

    let (callbacks, mut rx) = recording_callbacks(false);
    let sinkless = ScanConfig {
        callbacks,
        ..ScanConfig::default()
    };
    assert_eq!(engine.start(sinkless).await, Ok(()));
    assert!(engine.is_running());
    assert!(rx.try_recv().is_err());
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);

    engine.stop();
}

#[tokio::test]
async fn test_stop_during_acquisition_leaves_indicator_untouched() {
    let (devices, counters) = ScriptedDevices::slow(Duration::from_millis(200));
    let engine = ScanEngine::builder(devices)
        .qr_reader(ScriptedReader::nothing())
        .loader(ScriptedLoader::ready())
        .build();

    let sink = VideoSink::new();
    let (callbacks, mut rx) = recording_callbacks(false);
    let config = config_for(
        &sink,
        FormatSelection::only([Symbology::Qr]),
        ResultMode::StopOnce,
        callbacks,
    );
    let starter = engine.clone();
    let pending = tokio::spawn(async move { starter.start(config).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.state(), EngineState::Starting);
    engine.stop();

    assert_eq!(pending.await.unwrap(), Ok(()));
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.is_empty(), "unexpected {:?}", events);
}

#[test]
fn test_backend_ids_are_ordered() {
    let ids = [
        BackendId::SoftCode39,
        BackendId::NativeDetector,
        BackendId::SoftQr,
    ];
    let mut sorted = ids;
    sorted.sort_by_key(|id| std::cmp::Reverse(id.priority()));
    assert_eq!(
        sorted,
        [BackendId::NativeDetector, BackendId::SoftQr, BackendId::SoftCode39]
    );
}
