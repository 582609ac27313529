//! Debt collector - automated voice collection calls
//!
//! Runs the collection workflow against a console session, or dials a
//! number through Twilio so the media webhook can take the call.

mod config;
mod prompts;
mod runtime;
mod services;
mod state_machine;
mod turn;

use config::CollectorConfig;
use runtime::{CallPlacer, CallRuntime, CallServices, OutboundCall};
use services::{
    ConsoleSession, JsonFileSink, KeywordNegotiator, RegionAllowList, StaticAccountDirectory,
    TwilioCallPlacer,
};
use state_machine::{CallContext, CallMetadata};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: debt-collector [--dial <number>] [--region <code>]";

#[derive(Debug, Default)]
struct Args {
    dial: Option<String>,
    region: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dial" => parsed.dial = Some(args.next().ok_or("--dial needs a number")?),
            "--region" => parsed.region = Some(args.next().ok_or("--region needs a code")?),
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout belongs to the console session
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debt_collector=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = CollectorConfig::from_env()?;
    config.ensure_dirs()?;

    match args.dial {
        Some(number) => dial(&config, number).await,
        None => simulate(&config, args.region).await,
    }
}

/// Place an outbound recorded call
async fn dial(config: &CollectorConfig, destination: String) -> Result<(), Box<dyn std::error::Error>> {
    let telephony = &config.telephony;
    let placer = TwilioCallPlacer::new(telephony.require()?)?;
    let room = telephony.room_for(&destination);
    let recording = config.recording_path(&room);

    tracing::info!(
        destination = %destination,
        room = %room,
        recording = %recording.display(),
        "Placing outbound call"
    );

    let call = OutboundCall {
        destination,
        source: None,
        room: Some(room),
        record: true,
    };
    let handle = tokio::time::timeout(telephony.call_timeout, placer.place_call(&call))
        .await
        .map_err(|_| format!("Call placement timed out after {:?}", telephony.call_timeout))??;

    println!("{} {}", handle.call_id, recording.display());
    Ok(())
}

/// Run one call with the caller on stdin
async fn simulate(
    config: &CollectorConfig,
    region: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Arc::new(ConsoleSession::new());
    let services = CallServices {
        compliance: Arc::new(RegionAllowList::new(config.compliance_regions.clone())),
        accounts: Arc::new(StaticAccountDirectory::from_fixture(&config.account)),
        payments: Arc::new(KeywordNegotiator::new(&config.account, &config.policy)),
        transcripts: Arc::new(JsonFileSink::new(config.transcripts_dir.clone())),
    };
    let context = CallContext::new(CallMetadata {
        destination: None,
        region,
    });

    let mut call = CallRuntime::new(context, config.policy.clone(), session.clone(), services);
    let reader = session.start();
    let result = call.run().await;
    reader.abort();

    let outcome = result?;
    tracing::info!(call_id = %call.context().call_id(), outcome = ?outcome, "Call complete");
    Ok(())
}
