use anyhow::{anyhow, Result};
use std::cell::Cell;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use gesture_relay::detect::{Classification, StubClassifier, StubLandmarker};
use gesture_relay::ingest::{StreamConfig, StreamSource};
use gesture_relay::pipeline::drive;
use gesture_relay::{
    Dispatcher, GesturePipeline, GestureStabilizer, Interrupt, RetryPolicy, StabilizerConfig,
    StreamSupervisor, Throttle, Transport,
};

/// Forwards every delivered payload to a channel.
struct RecordingTransport {
    tx: Mutex<mpsc::Sender<String>>,
}

impl Transport for RecordingTransport {
    fn endpoint(&self) -> &str {
        "recording://"
    }

    fn send(&self, payload: &str) -> Result<()> {
        self.tx
            .lock()
            .map_err(|_| anyhow!("recording transport poisoned"))?
            .send(payload.to_string())
            .map_err(|_| anyhow!("receiver gone"))
    }
}

struct DeadTransport;

impl Transport for DeadTransport {
    fn endpoint(&self) -> &str {
        "dead://"
    }

    fn send(&self, _payload: &str) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}

/// Trips after a fixed number of loop checks.
struct StepBudget {
    remaining: Cell<u32>,
}

impl StepBudget {
    fn new(steps: u32) -> Self {
        Self {
            remaining: Cell::new(steps),
        }
    }
}

impl Interrupt for StepBudget {
    fn is_triggered(&self) -> bool {
        let left = self.remaining.get();
        if left == 0 {
            return true;
        }
        self.remaining.set(left - 1);
        false
    }

    fn wait(&self, delay: Duration) -> bool {
        std::thread::sleep(delay);
        true
    }
}

fn label(index: usize) -> std::result::Result<Classification, String> {
    Ok(Classification {
        label_index: index,
        confidence: 0.9,
    })
}

fn stream(url: &str) -> StreamSource {
    StreamSource::new(StreamConfig {
        url: url.to_string(),
        width: 64,
        height: 48,
    })
    .expect("stub stream")
}

fn pipeline(
    classifier: StubClassifier,
    confirm_frames: usize,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
) -> GesturePipeline {
    GesturePipeline::new(
        64,
        48,
        Throttle::new(Duration::ZERO, Instant::now()),
        Box::new(StubLandmarker::new()),
        Arc::new(classifier),
        GestureStabilizer::new(StabilizerConfig {
            confirm_frames,
            ..StabilizerConfig::default()
        })
        .expect("stabilizer"),
        Dispatcher::new(transport, retry),
    )
}

fn collect(rx: &mpsc::Receiver<String>, count: usize) -> Vec<String> {
    (0..count)
        .filter_map(|_| rx.recv_timeout(Duration::from_secs(5)).ok())
        .collect()
}

#[test]
fn fist_then_five_both_reach_consumer() {
    let (tx, rx) = mpsc::channel();
    let transport = Arc::new(RecordingTransport { tx: Mutex::new(tx) });
    // fist x3, five x3 (label indices 2 and 1)
    let classifier = StubClassifier::scripted(vec![
        label(2),
        label(2),
        label(2),
        label(1),
        label(1),
        label(1),
    ]);
    let mut pipeline = pipeline(classifier, 3, transport, RetryPolicy::default());
    let mut supervisor = StreamSupervisor::new(stream("stub://cam?fps=0"), Duration::from_millis(1));

    // one open + six frames
    let stats = drive(&mut supervisor, &mut pipeline, &StepBudget::new(7));

    assert_eq!(stats.stream.frames, 6);
    assert_eq!(stats.pipeline.fired, 2);
    assert_eq!(
        pipeline.stabilizer().last_fired().map(|(label, _)| label),
        Some("five")
    );

    // Deliveries run on separate threads and may land in either order.
    let mut delivered = collect(&rx, 2);
    delivered.sort();
    assert_eq!(
        delivered,
        vec![
            r#"{"type":"gesture","data":"fist"}"#,
            r#"{"type":"gesture","data":"five"}"#,
        ]
    );
}

#[test]
fn relay_survives_stream_outages() {
    let (tx, rx) = mpsc::channel();
    let transport = Arc::new(RecordingTransport { tx: Mutex::new(tx) });
    let mut pipeline = pipeline(
        StubClassifier::fixed(3, 0.9),
        1,
        transport,
        RetryPolicy::default(),
    );
    let mut supervisor = StreamSupervisor::new(
        stream("stub://cam?fps=0&fail_opens=2&frames=2"),
        Duration::from_millis(1),
    );

    // 2 failed opens, open, 2 frames, disconnect, open, 2 frames
    let stats = drive(&mut supervisor, &mut pipeline, &StepBudget::new(9));

    assert_eq!(stats.stream.open_attempts, 4);
    assert_eq!(stats.stream.connects, 2);
    assert_eq!(stats.stream.disconnects, 1);
    assert_eq!(stats.stream.frames, 4);
    // K=1 with a 2s cooldown: "ok" fires once for the whole run
    assert_eq!(stats.pipeline.fired, 1);
    assert_eq!(collect(&rx, 1), vec![r#"{"type":"gesture","data":"ok"}"#]);
}

#[test]
fn failing_consumer_does_not_stall_ingestion() {
    let classifier = StubClassifier::scripted(vec![label(0), label(4), label(6), label(7)]);
    let mut pipeline = pipeline(
        classifier,
        1,
        Arc::new(DeadTransport),
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_secs(1),
        },
    );
    let mut supervisor = StreamSupervisor::new(stream("stub://cam?fps=0"), Duration::from_millis(1));

    let start = Instant::now();
    let stats = drive(&mut supervisor, &mut pipeline, &StepBudget::new(5));

    // four distinct labels, four detached deliveries each needing at least 2s
    assert_eq!(stats.pipeline.fired, 4);
    assert!(start.elapsed() < Duration::from_millis(1500));
}
