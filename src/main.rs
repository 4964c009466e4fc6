use std::sync::Arc;

use prometheus::Registry;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::time::{self, Duration};
use tracing::{error, info, warn};

use chat_loadtest::actor::{run_actor, ActorConfig};
use chat_loadtest::api::ChatApi;
use chat_loadtest::client::build_client;
use chat_loadtest::config::Config;
use chat_loadtest::driver::WorkloadDriver;
use chat_loadtest::example_files::ExampleFiles;
use chat_loadtest::logging::init_tracing;
use chat_loadtest::metrics::{encode_metrics, register_metrics, start_metrics_server};
use chat_loadtest::stats::StatsRecorder;
use chat_loadtest::task::TaskSelector;

/// Extra time granted to in-flight tasks after the stop signal, on top of the request timeout.
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(5);

/// Prints helpful configuration documentation.
fn print_config_help() {
    eprintln!("Required environment variables:");
    eprintln!(
        "  TARGET_URL              - Base URL of the chat service (must start with http:// or https://)"
    );
    eprintln!();
    eprintln!("Authentication:");
    eprintln!("  CHAT_API_TOKEN          - Bearer token sent with every request");
    eprintln!("  REQUIRE_API_TOKEN       - Fail when CHAT_API_TOKEN is unset (default: false)");
    eprintln!();
    eprintln!("Workload:");
    eprintln!("  MODELS                  - Comma-separated model pool (default: qwen3-32b,qwen25-14b-instruct,tiny-llama)");
    eprintln!("  NUM_USERS               - Number of simulated users (default: 10, must be > 0)");
    eprintln!("  TEST_DURATION           - Total test duration: 90s, 10m, 2h (default: 10m)");
    eprintln!("  MIN_WAIT / MAX_WAIT     - Pause between tasks of one user (default: 15s / 60s)");
    eprintln!("  TASK_WEIGHTS            - simple,multi_turn,untracked_upload,tracked_upload (default: 10,5,3,3)");
    eprintln!("  EXAMPLE_FILES_DIR       - Directory of files to upload (default: example-files)");
    eprintln!("  RNG_SEED                - Seed for repeatable runs; user i uses seed + i");
    eprintln!();
    eprintln!("Timeouts:");
    eprintln!("  REQUEST_TIMEOUT         - Per-request client timeout (default: 300s)");
    eprintln!("  MAX_RESPONSE_TIME       - Slower tracked calls count as failures (default: REQUEST_TIMEOUT)");
    eprintln!();
    eprintln!("Advanced configuration:");
    eprintln!("  SKIP_TLS_VERIFY         - Skip TLS certificate verification (default: false)");
    eprintln!("  METRICS_PORT            - Prometheus metrics port, 0 disables (default: 9090)");
    eprintln!("  METRIC_NAMESPACE        - Prometheus metric namespace (default: chat_loadtest)");
    eprintln!("  LOG_FORMAT              - text or json (default: text)");
    eprintln!("  RUST_LOG                - Log filter (default: info)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration from environment variables
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}\n", e);
            print_config_help();
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format)?;

    let registry = Registry::new();
    register_metrics(&registry)?;

    config.print_summary();
    config.warn_on_weak_defaults();

    let client = build_client(&config.to_client_config())?;
    let api = ChatApi::new(client, config.target_url.clone());
    let stats = Arc::new(StatsRecorder::new());

    ExampleFiles::new(config.example_files_dir.clone())
        .log_inventory()
        .await;

    let selector = TaskSelector::new(config.task_weights);
    for (task, probability) in selector.probabilities() {
        info!(task = %task, probability = probability, "Task weight");
    }

    if config.metrics_port != 0 {
        let registry = registry.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            start_metrics_server(port, registry).await;
        });
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let start_time = time::Instant::now();

    let mut handles = Vec::with_capacity(config.num_users);
    for i in 0..config.num_users {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
            None => StdRng::from_entropy(),
        };
        let driver = WorkloadDriver::new(api.clone(), config.driver_config(), stats.clone(), rng)?;
        let actor_config = ActorConfig {
            actor_id: i,
            test_duration: config.test_duration,
            wait_time: config.wait_time,
        };

        handles.push(tokio::spawn(run_actor(
            driver,
            selector.clone(),
            actor_config,
            start_time,
            stop_rx.clone(),
        )));
    }
    drop(stop_rx);

    tokio::select! {
        _ = time::sleep(config.test_duration) => {
            info!("Test duration completed, signalling users to stop");
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => warn!("Interrupted, signalling users to stop"),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl-C, stopping"),
            }
        }
    }
    let _ = stop_tx.send(true);

    let grace = config.request_timeout + SHUTDOWN_MARGIN;
    let all_done = join_actors(handles);
    if time::timeout(grace, all_done).await.is_err() {
        warn!(
            grace_secs = grace.as_secs_f64(),
            "Some users did not finish in time; reporting what was recorded"
        );
    }

    println!("\n--- RESULTS ---\n{}", stats.format_report());
    println!("--- END OF RESULTS ---\n");

    match encode_metrics(&registry) {
        Ok(text) => {
            println!("--- FINAL METRICS ---\n{}", text);
            println!("--- END OF FINAL METRICS ---");
        }
        Err(e) => error!(error = %e, "Failed to encode final metrics"),
    }

    Ok(())
}

/// Awaits every actor handle, logging actors that panicked.
async fn join_actors(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "User task ended abnormally");
        }
    }
}
