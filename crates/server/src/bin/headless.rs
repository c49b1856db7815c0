//! Headless call simulator
//!
//! Replays a scripted call through the agent without any telephony and
//! prints the transcript. Useful for checking traces and the stage flow.
//!
//! Usage:
//!     intake-headless [SCRIPT_FILE]
//!
//! One utterance per line; `#` lines are comments and an empty line is
//! silence. `INTAKE_CALL_DATE=YYYY-MM-DD` pins the date relative days are
//! resolved against.

use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};

use intake_agent::{CallRunner, IntakeAgent, ScriptedTransport};
use intake_config::{load_policy, load_settings, Settings};
use intake_core::render_transcript;
use intake_server::init_tracing;
use intake_server::telemetry::shutdown_tracing;

const BUILT_IN_SCRIPT: &str = "\
# new patient, insured
Hi, I'm a new patient
I've been feeling very anxious for the last few weeks and I can't sleep
about three weeks
I live in Mumbai
next week works
yes
Yes, Aetna, member ID AET5550123
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("INTAKE_ENV").ok();
    let settings = load_settings(env.as_deref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });
    init_tracing(&settings);

    let script = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading script {path}"))?,
        None => BUILT_IN_SCRIPT.to_string(),
    };
    let call_date = match std::env::var("INTAKE_CALL_DATE") {
        Ok(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("INTAKE_CALL_DATE '{raw}' is not YYYY-MM-DD"))?,
        Err(_) => Utc::now().date_naive(),
    };

    let policy = Arc::new(load_policy(&settings.policy_path)?);
    let agent = Arc::new(IntakeAgent::from_settings(&settings, policy)?);

    let call_id = format!("headless-{}", uuid::Uuid::new_v4());
    let transport = ScriptedTransport::from_script(&call_id, &script);
    let mut runner = CallRunner::new(agent, transport, call_date);
    let finished = runner.run().await?;

    for snapshot in &finished {
        println!("=== {} ({}) ===", snapshot.call_id, snapshot.call_date);
        println!("{}", render_transcript(&snapshot.history));
        println!(
            "--- outcome: {} | stage: {} | turns: {} | crisis: {} | booking: {}",
            snapshot.outcome.map(|o| o.as_str()).unwrap_or("open"),
            snapshot.stage,
            snapshot.turns,
            snapshot.crisis_flag,
            snapshot.booking_reference.as_deref().unwrap_or("-"),
        );
        println!("{}", serde_json::to_string_pretty(&snapshot.slots)?);
    }

    shutdown_tracing();
    Ok(())
}
