//! Events raised on worker and timer threads carry the span of the
//! consumption that caused them.
//!
//! Installs a global subscriber, so everything lives in one test.

use dagger_source::{exec, ExecutorConfig, Source};
use std::io;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::Level;

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn lines_containing(&self, needle: &str) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn execution_id(line: &str) -> Option<&str> {
    let start = line.find("execution_id=")? + "execution_id=".len();
    line[start..].split([' ', '}']).next()
}

#[test]
fn test_worker_events_carry_the_consumption_span() {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let executor = exec::asynchronous(ExecutorConfig::with_workers(2)).unwrap();
    let (tx, rx) = mpsc::channel();

    let failed = tx.clone();
    Source::<u32>::try_new(|| anyhow::bail!("boom")).async_consume(&executor, move |outcome| {
        let _ = failed.send(outcome.is_failure());
    });
    assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());

    let (release, gate) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    Source::new(move || {
        let _ = gate.lock().unwrap().recv();
        1_u32
    })
    .map(|n| n + 1)
    .async_consume_with_timeout(&executor, Duration::from_millis(20), move |outcome| {
        let _ = tx.send(outcome.is_failure());
    });
    assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
    let _ = release.send(());
    thread::sleep(Duration::from_millis(50));

    let captured = log.lines_containing("Captured failure");
    assert_eq!(captured.len(), 1, "{captured:?}");
    assert!(captured[0].contains("consume{"), "{}", captured[0]);
    let failure_id = execution_id(&captured[0]).expect("no execution id on failure event");

    let timed_out = log.lines_containing("Pending result timed out");
    assert!(!timed_out.is_empty());
    for line in &timed_out {
        let id = execution_id(line).expect("no execution id on timeout event");
        assert_ne!(id, failure_id);
    }
}
