//! Parking garage traffic simulator.
//!
//! Lets random cars into a garage of fixed capacity and out again, posting
//! the matching gate events to the correlator's ingest endpoints. One in five
//! entries is never reported, as if the camera failed to read the plate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use uuid::Uuid;

use gate_correlator::events::{EntryEvent, ExitEvent, StreamKind};

/// Share of entries the camera actually reports.
const ENTRY_DETECTION_RATE: f64 = 0.8;

#[derive(Parser)]
#[command(name = "gate-sim")]
#[command(about = "Synthetic entry/exit traffic for the gate correlator", long_about = None)]
struct Cli {
    /// Base URL of the correlator's ingest server.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Cars the garage holds at once.
    #[arg(long, default_value_t = 20)]
    capacity: usize,

    /// Upper bound, in seconds, between two arrivals.
    #[arg(long, default_value_t = 5)]
    max_entry_wait: u64,

    /// Upper bound, in seconds, between two departures.
    #[arg(long, default_value_t = 10)]
    max_exit_wait: u64,
}

type ParkingLot = Arc<Mutex<Vec<String>>>;

fn generate_plate<R: Rng>(rng: &mut R) -> String {
    const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const DIGITS: &[u8] = b"0123456789";

    let mut plate = String::with_capacity(6);
    for _ in 0..3 {
        plate.push(LETTERS[rng.gen_range(0..LETTERS.len())] as char);
    }
    for _ in 0..3 {
        plate.push(DIGITS[rng.gen_range(0..DIGITS.len())] as char);
    }
    plate
}

/// Park a new car if there is room. Returns its plate.
fn admit<R: Rng>(lot: &mut Vec<String>, capacity: usize, rng: &mut R) -> Option<String> {
    if lot.len() >= capacity {
        return None;
    }
    let plate = generate_plate(rng);
    lot.push(plate.clone());
    Some(plate)
}

/// Let a random car out, if any. Returns its plate.
fn release<R: Rng>(lot: &mut Vec<String>, rng: &mut R) -> Option<String> {
    if lot.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..lot.len());
    Some(lot.swap_remove(index))
}

fn random_wait(max_secs: u64) -> Duration {
    Duration::from_secs(rand::thread_rng().gen_range(1..=max_secs.max(1)))
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn publish<T: serde::Serialize>(client: &reqwest::Client, base: &str, kind: StreamKind, event: &T) {
    let url = format!("{}/{}", base.trim_end_matches('/'), kind.queue_name());
    match client.post(&url).json(event).send().await {
        Ok(res) if res.status().is_success() => {}
        Ok(res) => tracing::warn!(queue = %kind, status = %res.status(), "Event rejected"),
        Err(e) => tracing::warn!(queue = %kind, error = %e, "Failed to publish event"),
    }
}

async fn entry_gate(client: reqwest::Client, cli: Arc<Cli>, lot: ParkingLot) {
    loop {
        tokio::time::sleep(random_wait(cli.max_entry_wait)).await;

        let (plate, detected) = {
            let mut rng = rand::thread_rng();
            let mut lot = lot.lock().unwrap_or_else(|e| e.into_inner());
            match admit(&mut lot, cli.capacity, &mut rng) {
                Some(plate) => (plate, rng.gen_bool(ENTRY_DETECTION_RATE)),
                None => continue,
            }
        };

        let event = EntryEvent {
            id: Uuid::new_v4().to_string(),
            vehicle_id: plate,
            entry_time: now(),
        };
        if detected {
            tracing::info!(vehicle = %event.vehicle_id, "incoming");
            publish(&client, &cli.url, StreamKind::Entry, &event).await;
        } else {
            tracing::info!(vehicle = %event.vehicle_id, "incoming (unreported)");
        }
    }
}

async fn exit_gate(client: reqwest::Client, cli: Arc<Cli>, lot: ParkingLot) {
    loop {
        tokio::time::sleep(random_wait(cli.max_exit_wait)).await;

        let plate = {
            let mut lot = lot.lock().unwrap_or_else(|e| e.into_inner());
            match release(&mut lot, &mut rand::thread_rng()) {
                Some(plate) => plate,
                None => continue,
            }
        };

        let event = ExitEvent {
            id: Uuid::new_v4().to_string(),
            vehicle_id: plate,
            exit_time: now(),
        };
        tracing::info!(vehicle = %event.vehicle_id, "outgoing");
        publish(&client, &cli.url, StreamKind::Exit, &event).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gate_sim=info".into()),
        )
        .init();

    let cli = Arc::new(Cli::parse());
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let lot: ParkingLot = Arc::new(Mutex::new(Vec::new()));

    tracing::info!(url = %cli.url, capacity = cli.capacity, "Simulator starting");

    tokio::select! {
        _ = entry_gate(client.clone(), cli.clone(), lot.clone()) => {}
        _ = exit_gate(client, cli, lot) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Simulator stopped");
        }
    }
    Ok(())
}
