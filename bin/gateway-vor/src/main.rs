//! Intermediate VoR partition entry point.
//!
//! Two loops share one `running` flag, mirroring
//! `original_source/gateway-komponenten/intermediate-vor-partition-cpc/main.py`'s
//! `main()` (Flask bridge server + `pull_request_and_process` background
//! thread) and `.../intermediate-vor-partition/main.py`'s request
//! verification/mapping consumer:
//!
//! 1. the request-queue consumer: admits requests from C6, runs the
//!    verifier (C7) then the mapper (C8), persisting accepted requests
//!    into the mapped-request store (C10);
//! 2. the pull loop: pulls the highest-priority mapped request on a
//!    timer, round-trips it through the control-plane bridge, and runs
//!    the acceptance verifier (C9).
//!
//! Every outcome is submitted to the feedback bus (C11) before moving
//! to the next stage.

mod bridge;

use bridge::{append_affected_endpoints, ControlPlaneBridge, HttpControlPlaneBridge};
use gateway_core::feedback::{FeedbackRecord, Stage};
use gateway_core::time::shared_clock;
use gateway_core::GatewayConfig;
use gateway_feedback::{FeedbackSink, TracingSink};
use gateway_queue::queue::{run_consumer, RequestQueue};
use gateway_rules::acceptance::{verify_acceptance, verify_mapping_constraints};
use gateway_rules::mapping::{MappingRuleSets, RequestMapper};
use gateway_rules::verify::{RequestVerifier, RuleSet};
use gateway_storage::mapped_requests::MappedRequestStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Minimal acceptance-ruleset document used when no file is configured,
/// so the partition is still runnable out of the box. A real deployment
/// supplies its own `acceptance_rules_path`.
const DEFAULT_ACCEPTANCE_TEMPLATE: &str = "<AcceptanceRuleset></AcceptanceRuleset>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config/gateway.toml".to_string());
    let config = match GatewayConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %config_path, "failed to load configuration, using defaults");
            GatewayConfig::default()
        }
    };

    let clock = shared_clock();
    let feedback: Arc<dyn FeedbackSink> = Arc::new(TracingSink);

    let verification_rules = RuleSet::from_file(&config.rules.verification_rules_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config.rules.verification_rules_path.display(), "verification rule set unavailable, defaulting to empty");
        RuleSet::from_xml_str("<RuleSet></RuleSet>").expect("empty rule set is always valid")
    });
    let mapping_rule_sets = MappingRuleSets::from_file(&config.rules.mapping_rules_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config.rules.mapping_rules_path.display(), "mapping rule set unavailable, defaulting to empty");
        MappingRuleSets::default()
    });
    let acceptance_template = std::fs::read_to_string(&config.rules.acceptance_rules_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config.rules.acceptance_rules_path.display(), "acceptance rule set unavailable, defaulting to empty");
        DEFAULT_ACCEPTANCE_TEMPLATE.to_string()
    });

    // Two independent handles onto the same SQLite file, one per
    // consumer — `MappedRequestStore` holds a thread-bound pool rather
    // than being `Clone`, and the original's `pull_request` likewise
    // opens its own `sqlite3.connect()` per pull rather than sharing a
    // connection with the mapping step.
    let mapper_store = MappedRequestStore::open(&config.storage.mapped_requests_db_path, config.storage.pool_max_connections)?;
    let pull_store = MappedRequestStore::open(&config.storage.mapped_requests_db_path, config.storage.pool_max_connections)?;

    let verifier = Arc::new(RequestVerifier::new(verification_rules));
    let mapper = Arc::new(RequestMapper::new(mapping_rule_sets, mapper_store));
    let bridge: Arc<dyn ControlPlaneBridge> = Arc::new(HttpControlPlaneBridge::new(config.control_plane.bridge_url.clone()));

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("ctrl-c received, shutting down vor partition");
            running.store(false, Ordering::SeqCst);
        });
    }

    let queue = Arc::new(RequestQueue::new());
    {
        let queue = queue.clone();
        let running = running.clone();
        let socket_path = config.ipc.queue_socket_path();
        tokio::spawn(async move {
            if let Err(e) = gateway_queue::bridge::serve(socket_path, queue, running).await {
                error!(error = %e, "request queue bridge terminated");
            }
        });
    }

    let pull_task = {
        let store = pull_store;
        let bridge = bridge.clone();
        let feedback = feedback.clone();
        let clock = clock.clone();
        let running = running.clone();
        let interval = Duration::from_millis(config.control_plane.pull_interval_millis.max(1));
        tokio::spawn(async move {
            run_pull_loop(store, acceptance_template, bridge, feedback, clock, running, interval).await;
        })
    };

    info!("vor partition running");
    run_consumer(queue, running, move |request| {
        let verifier = verifier.clone();
        let mapper = mapper.clone();
        let feedback = feedback.clone();
        let clock = clock.clone();
        async move {
            let (verified, verification_feedback) = verifier.process(&request, clock.now());
            feedback.submit(verification_feedback);
            if let Some(request) = verified {
                let mapping_feedback = mapper.map_request(&request, clock.now());
                feedback.submit(mapping_feedback);
            }
        }
    })
    .await;

    pull_task.abort();
    info!("vor partition stopped");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_pull_loop(
    store: MappedRequestStore,
    acceptance_template: String,
    bridge: Arc<dyn ControlPlaneBridge>,
    feedback: Arc<dyn FeedbackSink>,
    clock: Arc<dyn gateway_core::MonotonicClock>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        if !running.load(Ordering::SeqCst) {
            break;
        }
        process_pull_cycle(&store, &acceptance_template, bridge.as_ref(), feedback.as_ref(), clock.now()).await;
    }
}

/// One iteration of the pull loop body, factored out so it can be
/// driven directly by tests without a timer: pull, round-trip through
/// the bridge, run the two C9 sub-checks, submit one feedback record.
async fn process_pull_cycle(
    store: &MappedRequestStore,
    acceptance_template: &str,
    bridge: &dyn ControlPlaneBridge,
    feedback: &dyn FeedbackSink,
    now: chrono::DateTime<chrono::Utc>,
) {
    let mapped = match store.pull_highest() {
        Ok(Some(mapped)) => mapped,
        Ok(None) => return,
        Err(e) => {
            error!(error = %e, "failed to pull mapped request");
            return;
        }
    };

    let xml = match append_affected_endpoints(acceptance_template, &mapped.affected_endpoints) {
        Ok(xml) => xml,
        Err(e) => {
            error!(error = %e, request_id = %mapped.request_id, "failed to build acceptance document");
            return;
        }
    };

    let Some(filled_xml) = bridge.send(xml).await else {
        feedback.submit(FeedbackRecord::new(
            Stage::Acceptance,
            Some(mapped.request_id),
            None,
            "Acceptance failed",
            "control-plane bridge unavailable",
            now,
        ));
        return;
    };

    let outcome = match verify_acceptance(&filled_xml) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, request_id = %mapped.request_id, "acceptance document malformed");
            return;
        }
    };

    if !outcome.accepted() {
        let info = match &outcome {
            gateway_rules::acceptance::AcceptanceOutcome::Rejected { key, technical_system: Some(ts) } => {
                format!("The request is not accepted: {key} in technical_system {ts}")
            }
            gateway_rules::acceptance::AcceptanceOutcome::Rejected { key, technical_system: None } => {
                format!("The request is not accepted: {key}")
            }
            gateway_rules::acceptance::AcceptanceOutcome::Accepted => unreachable!(),
        };
        feedback.submit(FeedbackRecord::new(Stage::Acceptance, Some(mapped.request_id), None, "Acceptance failed", info, now));
        return;
    }

    // Property 8 (acceptance monotonicity): mapping constraints are
    // only evaluated once acceptance itself has passed.
    match verify_mapping_constraints(&mapped.affected_endpoints, &filled_xml) {
        Ok(true) => {
            feedback.submit(FeedbackRecord::new(
                Stage::Acceptance,
                Some(mapped.request_id),
                None,
                "Accepted",
                "The request was accepted and its mapped effects were forwarded to the control plane.",
                now,
            ));
        }
        Ok(false) => {
            feedback.submit(FeedbackRecord::new(
                Stage::Acceptance,
                Some(mapped.request_id),
                None,
                "Mapping constraint violation",
                "The request failed the mapping verification step and the described change won't be implemented.",
                now,
            ));
        }
        Err(e) => {
            error!(error = %e, request_id = %mapped.request_id, "mapping constraint evaluation failed");
        }
    }
}
