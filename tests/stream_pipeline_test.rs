use async_trait::async_trait;
use slackcat::core::batcher::BatchPolicy;
use slackcat::core::shutdown::Shutdown;
use slackcat::core::{Batch, Deliver, Delivery, FileUpload};
use slackcat::{NoopSender, SlackcatError, StreamEngine};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const NEVER: Duration = Duration::from_secs(3600);

fn batches(sender: &NoopSender) -> Vec<Batch> {
    sender
        .deliveries()
        .into_iter()
        .filter_map(|d| match d {
            Delivery::Message { batch, .. } => Some(batch),
            Delivery::File { .. } => None,
        })
        .collect()
}

fn lines_of(batch: &Batch) -> Vec<String> {
    batch.lines.iter().map(|l| l.as_str().to_string()).collect()
}

fn input(lines: &[&str]) -> Cursor<Vec<u8>> {
    let mut body = String::new();
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    Cursor::new(body.into_bytes())
}

#[tokio::test]
async fn test_every_line_is_delivered_once_in_order() {
    let sender = NoopSender::new("general");
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::new(3, NEVER), Shutdown::new());

    let expected: Vec<String> = (0..10).map(|i| format!("line {}", i)).collect();
    let refs: Vec<&str> = expected.iter().map(String::as_str).collect();
    let report = engine.run(input(&refs)).await.unwrap();

    let sent = batches(&sender);
    let flattened: Vec<String> = sent.iter().flat_map(lines_of).collect();
    assert_eq!(flattened, expected);
    assert_eq!(sent.len(), 4);
    assert!(sent.iter().all(|b| b.len() <= 3));
    assert!(sent.last().unwrap().is_final);

    assert_eq!(report.batches_sent, 4);
    assert_eq!(report.lines_delivered, 10);
    assert_eq!(report.batches_failed, 0);
    assert!(!report.interrupted);
}

#[tokio::test]
async fn test_threshold_of_one_sends_each_line_separately() {
    let sender = NoopSender::new("general");
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::new(1, NEVER), Shutdown::new());

    engine.run(input(&["x", "y"])).await.unwrap();

    let sent = batches(&sender);
    assert_eq!(sent.len(), 2);
    assert_eq!(lines_of(&sent[0]), vec!["x"]);
    assert_eq!(lines_of(&sent[1]), vec!["y"]);
}

#[tokio::test]
async fn test_empty_input_sends_nothing() {
    let sender = NoopSender::new("general");
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::default(), Shutdown::new());

    let report = engine.run(Cursor::new(Vec::new())).await.unwrap();

    assert!(sender.deliveries().is_empty());
    assert_eq!(report.batches_sent, 0);
    assert_eq!(report.lines_delivered, 0);
}

/// Fails exactly one batch, by sequence position, and records every attempt.
#[derive(Clone)]
struct FlakySender {
    fail_on: usize,
    attempts: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl Deliver for FlakySender {
    async fn send_batch(&self, batch: &Batch) -> slackcat::Result<()> {
        let mut attempts = self.attempts.lock().unwrap();
        attempts.push(lines_of(batch));
        if attempts.len() == self.fail_on {
            return Err(SlackcatError::transport("connection reset"));
        }
        Ok(())
    }

    async fn upload_file(&self, _upload: &FileUpload) -> slackcat::Result<()> {
        unreachable!("stream mode never uploads files")
    }

    fn channel(&self) -> &str {
        "flaky"
    }
}

#[tokio::test]
async fn test_failed_batch_does_not_stop_the_stream() {
    let sender = FlakySender {
        fail_on: 2,
        attempts: Arc::new(Mutex::new(Vec::new())),
    };
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::new(1, NEVER), Shutdown::new());

    let report = engine.run(input(&["one", "two", "three"])).await.unwrap();

    let attempts = sender.attempts.lock().unwrap().clone();
    assert_eq!(attempts, vec![vec!["one"], vec!["two"], vec!["three"]]);
    assert_eq!(report.batches_sent, 2);
    assert_eq!(report.batches_failed, 1);
    assert_eq!(report.lines_delivered, 2);
}

#[tokio::test]
async fn test_shutdown_flushes_buffered_lines_once() {
    let sender = NoopSender::new("general");
    let shutdown = Shutdown::new();
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::new(100, NEVER), shutdown.clone());

    let (mut writer, reader) = tokio::io::duplex(1024);
    let task = tokio::spawn(async move { engine.run(reader).await });

    writer.write_all(b"alpha\nbeta\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sender.deliveries().is_empty());

    shutdown.trigger();
    let report = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("engine should stop after shutdown")
        .unwrap()
        .unwrap();

    let sent = batches(&sender);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].is_final);
    assert_eq!(lines_of(&sent[0]), vec!["alpha", "beta"]);
    assert!(report.interrupted);

    // The input is still open; nothing else may be sent.
    drop(writer);
    assert_eq!(batches(&sender).len(), 1);
}

#[tokio::test]
async fn test_input_error_delivers_what_was_read_then_fails() {
    let reader = tokio_test::io::Builder::new()
        .read(b"before\n")
        .read_error(std::io::Error::new(std::io::ErrorKind::Other, "device lost"))
        .build();
    let sender = NoopSender::new("general");
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::default(), Shutdown::new());

    let err = engine.run(reader).await.unwrap_err();

    assert!(matches!(err, SlackcatError::Input(_)));
    let sent = batches(&sender);
    assert_eq!(sent.len(), 1);
    assert_eq!(lines_of(&sent[0]), vec!["before"]);
}

#[tokio::test]
async fn test_tee_echoes_input_and_still_delivers() {
    let sender = NoopSender::new("general");
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::default(), Shutdown::new());
    let (echo, mut echoed) = tokio::io::duplex(1024);

    engine
        .run_with_echo(input(&["seen", "twice"]), echo)
        .await
        .unwrap();

    let mut text = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut echoed, &mut text)
        .await
        .unwrap();
    assert_eq!(text, "seen\ntwice\n");
    assert_eq!(lines_of(&batches(&sender)[0]), vec!["seen", "twice"]);
}

/// Takes `delay` per message and records every batch it was handed.
#[derive(Clone)]
struct SlowSender {
    delay: Duration,
    sent: Arc<Mutex<Vec<Batch>>>,
}

impl SlowSender {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn sent(&self) -> Vec<Batch> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deliver for SlowSender {
    async fn send_batch(&self, batch: &Batch) -> slackcat::Result<()> {
        self.sent.lock().unwrap().push(batch.clone());
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn upload_file(&self, _upload: &FileUpload) -> slackcat::Result<()> {
        unreachable!("stream mode never uploads files")
    }

    fn channel(&self) -> &str {
        "slow"
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_folds_queued_backlog_into_one_final_send() {
    let sender = SlowSender::new(Duration::from_millis(300));
    let shutdown = Shutdown::new();
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::new(1, NEVER), shutdown.clone());

    let (mut writer, reader) = tokio::io::duplex(1024);
    writer.write_all(b"1\n2\n3\n4\n5\n").await.unwrap();
    let task = tokio::spawn(async move { engine.run(reader).await });

    // "1" is in flight by now and "2".."5" wait in the batch queue.
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();
    let report = task.await.unwrap().unwrap();

    let sent = sender.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(lines_of(&sent[0]), vec!["1"]);
    assert_eq!(lines_of(&sent[1]), vec!["2", "3", "4", "5"]);
    assert!(sent[1].is_final);
    assert!(report.interrupted);
    assert_eq!(report.batches_sent, 2);
    assert_eq!(report.lines_delivered, 5);

    drop(writer);
}

#[tokio::test]
async fn test_shutdown_triggered_before_run_still_stops_the_engine() {
    let sender = NoopSender::new("general");
    let shutdown = Shutdown::new();
    shutdown.trigger();
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::new(100, NEVER), shutdown);

    let (_writer, reader) = tokio::io::duplex(1024);
    let report = tokio::time::timeout(Duration::from_secs(5), engine.run(reader))
        .await
        .expect("engine should see a shutdown raised before it started")
        .unwrap();

    assert!(report.interrupted);
    assert!(sender.deliveries().is_empty());
}

#[tokio::test]
async fn test_closed_tee_output_does_not_stop_delivery() {
    let sender = NoopSender::new("general");
    let engine = StreamEngine::new(sender.clone(), BatchPolicy::default(), Shutdown::new());
    let (echo, echoed) = tokio::io::duplex(64);
    drop(echoed);

    let report = engine
        .run_with_echo(input(&["a", "b", "c"]), echo)
        .await
        .unwrap();

    assert_eq!(report.lines_delivered, 3);
    assert_eq!(lines_of(&batches(&sender)[0]), vec!["a", "b", "c"]);
}
