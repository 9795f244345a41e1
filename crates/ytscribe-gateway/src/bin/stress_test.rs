//! Load check for a running gateway: concurrent clients hitting /transcript.
//! Repeated IDs should come back as `source: "cache"` after the first fetch.
//!
//! Run with gateway up:
//!   YTSCRIBE_TOKEN=<token> cargo run --bin stress_test -- dQw4w9WgXcQ jNQXAC9IVRw
//! Optional: YTSCRIBE_BASE_URL, YTSCRIBE_STRESS_CLIENTS, YTSCRIBE_STRESS_ROUNDS.

use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_VIDEO_IDS: &[&str] = &["dQw4w9WgXcQ", "jNQXAC9IVRw"];
const DEFAULT_CLIENTS: usize = 10;
const DEFAULT_ROUNDS: usize = 5;

struct Plan {
    endpoint: String,
    token: String,
    video_ids: Vec<String>,
    clients: usize,
    rounds: usize,
}

impl Plan {
    fn from_env() -> Result<Self, String> {
        let base_url =
            std::env::var("YTSCRIBE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let token = std::env::var("YTSCRIBE_TOKEN")
            .map_err(|_| "YTSCRIBE_TOKEN is not set (use issue_token to create one)".to_string())?;
        let mut video_ids: Vec<String> = std::env::args().skip(1).collect();
        if video_ids.is_empty() {
            video_ids = DEFAULT_VIDEO_IDS.iter().map(|s| s.to_string()).collect();
        }
        Ok(Self {
            endpoint: format!("{}/transcript", base_url.trim_end_matches('/')),
            token,
            video_ids,
            clients: env_count("YTSCRIBE_STRESS_CLIENTS", DEFAULT_CLIENTS),
            rounds: env_count("YTSCRIBE_STRESS_ROUNDS", DEFAULT_ROUNDS),
        })
    }

    /// Clients start at different offsets so every ID sees concurrent first requests.
    fn video_for(&self, client: usize, round: usize) -> &str {
        &self.video_ids[(client + round) % self.video_ids.len()]
    }
}

fn env_count(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// Per-client tallies, merged once every client is done.
#[derive(Default)]
struct Tally {
    cached: u32,
    fetched: u32,
    failed: u32,
    latencies: Vec<Duration>,
}

impl Tally {
    fn merge(&mut self, other: Tally) {
        self.cached += other.cached;
        self.fetched += other.fetched;
        self.failed += other.failed;
        self.latencies.extend(other.latencies);
    }

    fn percentile(&self, p: f64) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort();
        let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
        sorted[idx]
    }
}

async fn run_client(client: Client, plan: Arc<Plan>, id: usize) -> Tally {
    let mut tally = Tally::default();
    for round in 0..plan.rounds {
        let video_id = plan.video_for(id, round);
        let started = Instant::now();
        let outcome = client
            .post(&plan.endpoint)
            .bearer_auth(&plan.token)
            .json(&json!({ "video_id": video_id }))
            .send()
            .await;
        let elapsed = started.elapsed();

        let resp = match outcome {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                eprintln!("[STRESS TEST] {} -> HTTP {}", video_id, resp.status());
                tally.failed += 1;
                continue;
            }
            Err(e) => {
                eprintln!("[STRESS TEST] {} -> {}", video_id, e);
                tally.failed += 1;
                continue;
            }
        };
        tally.latencies.push(elapsed);
        match resp.json::<serde_json::Value>().await {
            Ok(body) if body["source"] == "cache" => tally.cached += 1,
            _ => tally.fetched += 1,
        }
    }
    tally
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let plan = match Plan::from_env() {
        Ok(plan) => Arc::new(plan),
        Err(msg) => {
            eprintln!("[STRESS TEST] {}", msg);
            std::process::exit(2);
        }
    };
    println!(
        "[STRESS TEST] {} -> {} clients x {} rounds over {} video(s)",
        plan.endpoint,
        plan.clients,
        plan.rounds,
        plan.video_ids.len()
    );

    let client = Client::new();
    let wall = Instant::now();
    let workers: Vec<_> = (0..plan.clients)
        .map(|id| tokio::spawn(run_client(client.clone(), Arc::clone(&plan), id)))
        .collect();

    let mut total = Tally::default();
    for worker in workers {
        match worker.await {
            Ok(tally) => total.merge(tally),
            Err(e) => eprintln!("[STRESS TEST] client task failed: {}", e),
        }
    }

    let ok = total.cached + total.fetched;
    let sent = ok + total.failed;
    println!(
        "[STRESS TEST] {}/{} ok in {:.1?} (cache {}, youtube {}, failed {})",
        ok,
        sent,
        wall.elapsed(),
        total.cached,
        total.fetched,
        total.failed
    );
    println!(
        "[STRESS TEST] latency p50 {:?} | p95 {:?} | max {:?}",
        total.percentile(0.50),
        total.percentile(0.95),
        total.percentile(1.0)
    );
}
