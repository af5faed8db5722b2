use anyhow::Result;
use dagger_source::{exec, ExecutorConfig, Outcome, Source};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn first_word(input: String) -> String {
    input.split(' ').next().unwrap_or_default().to_string()
}

fn report<T: std::fmt::Debug>(label: &str, outcome: Outcome<T>) {
    match outcome {
        Outcome::Success(value) => println!("{label}: {value:?}"),
        Outcome::Failure(cause) => println!("{label} failed [{}]: {cause}", cause.category()),
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let greeting = Source::new(|| {
        println!("producing greeting");
        "hello world".to_string()
    });
    let pair = greeting.fork(|s| s.len(), first_word).map_first(|l| l + 15);
    let joined = pair.join(|length, word| format!("{length} {word}"));

    // Inline on this thread
    pair.consume(|first| report("length", first), |second| report("word", second));
    joined.consume(|outcome| report("joined", outcome));

    // On a worker pool, with one branch too slow for its deadline
    let config = ExecutorConfig::from_yaml_str("workers: 4\ntimer_threads: 1\n")?;
    let executor = exec::asynchronous(config)?;

    let (tx, rx) = mpsc::channel();
    let slow = Source::new(|| "slow start".to_string()).fork(
        |s| {
            thread::sleep(Duration::from_millis(200));
            s.len()
        },
        first_word,
    );
    let (first_tx, second_tx) = (tx.clone(), tx);
    slow.async_consume_with_timeout(
        &executor,
        Duration::from_millis(50),
        move |first| {
            report("slow length", first);
            let _ = first_tx.send(());
        },
        move |second| {
            report("slow word", second);
            let _ = second_tx.send(());
        },
    );

    for _ in 0..2 {
        rx.recv_timeout(Duration::from_secs(1))?;
    }
    Ok(())
}
