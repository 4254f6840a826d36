use clap::Parser;
use std::sync::Arc;

use attack_lab::config::{LabConfig, SimulationConfig};
use attack_lab::jobs::JobKind;
use attack_lab::orchestrator::{AttackPayload, BroadcastNotifier, Orchestrator, Submission};
use attack_lab::stats::AttackStatistics;

#[derive(Parser, Debug)]
#[command(name = "submit-job")]
#[command(about = "Run simulated attacks against an in-process attack lab")]
struct Args {
    /// Target URL for every submission
    #[arg(long, default_value = "http://example.com")]
    target: String,

    /// XSS payload
    #[arg(long, default_value = "<script>alert(1)</script>")]
    xss: String,

    /// SSRF payload
    #[arg(long, default_value = "http://169.254.169.254/latest/meta-data")]
    ssrf: String,

    /// Multiplier for simulated latency
    #[arg(long, default_value = "0.1")]
    latency_scale: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = LabConfig::default()
        .with_simulation(SimulationConfig::default().scaled(args.latency_scale));
    let events = BroadcastNotifier::new(config.event_buffer);
    let mut rx = events.subscribe();
    let orchestrator = Orchestrator::from_config(&config, Arc::new(events));

    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            println!("  event: {} {} {}", event.job_id, event.kind, event.status);
        }
    });

    let submissions = vec![
        Submission::new(AttackPayload::Xss(args.xss.clone()), &args.target, "demo"),
        Submission::new(AttackPayload::Ssrf(args.ssrf.clone()), &args.target, "demo"),
        Submission::new(
            AttackPayload::Combined {
                xss: args.xss.clone(),
                ssrf: args.ssrf.clone(),
            },
            &args.target,
            "demo",
        ),
        Submission::new(
            AttackPayload::Ssrf(args.ssrf),
            "http://192.168.1.1/admin",
            "demo",
        ),
    ];

    let handles: Vec<_> = submissions
        .into_iter()
        .map(|s| orchestrator.spawn_submit(s))
        .collect();

    for handle in handles {
        match handle.await? {
            Ok(record) => println!(
                "Job {} ({}) finished: {} succeeded={}",
                record.id,
                record.kind,
                record.status,
                record.outcome.as_ref().map_or(false, |o| o.succeeded)
            ),
            Err(e) => println!("Rejected: {}", e),
        }
    }

    println!("\nXSS history:");
    for record in orchestrator.history(Some(JobKind::Xss)).await {
        println!("  {} {} {}", record.created_at, record.id, record.status);
    }

    let stats = AttackStatistics::collect(orchestrator.store()).await;
    println!("\n{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
