use crate::audit::{AuditStore, MemoryAuditStore, SqliteAuditStore};
use crate::cli::{AccessCommands, AuditCommands, Cli, Commands, LimitsCommands};
use crate::config::{AuditBackend, Config};
use crate::guardrail::{
    AccessLevel, AccessStore, ActionRequest, ConfirmOptions, DryRunPlan, GateVerdict, Guardrail,
    HumanDecision, RiskLevel, RiskMatcher, ServiceRateLimiter,
};
use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Status => {
            let guardrail = build_guardrail(&config)?;
            println!("{}", crate::app::status::render_status(&config, &guardrail));
            Ok(())
        }
        Commands::Simulate {
            service,
            action,
            agent,
            service_name,
            target,
            preview,
            risk,
            count,
        } => {
            let risk = risk
                .map(|value| {
                    value
                        .parse::<RiskLevel>()
                        .map_err(|_| anyhow::anyhow!("risk must be one of: auto, soft, hard"))
                })
                .transpose()?;
            run_simulate(SimulateParams {
                config,
                service,
                action,
                agent,
                service_name,
                target,
                preview,
                risk,
                count,
            })
            .await
        }
        Commands::Plan { file } => run_plan(&config, &file),
        Commands::Audit { audit_command } => run_audit(&config, audit_command),
        Commands::Limits { limits_command } => run_limits(&config, &limits_command),
        Commands::Access { access_command } => run_access(&config, &access_command),
    }
}

/// Assemble the guardrail from config: classifier table, rate table, access
/// store, and the configured audit backend.
pub fn build_guardrail(config: &Config) -> Result<Guardrail> {
    let audit: Arc<dyn AuditStore> = match config.audit.backend {
        AuditBackend::Memory => Arc::new(MemoryAuditStore::new()),
        AuditBackend::Sqlite => Arc::new(
            SqliteAuditStore::new(&config.audit_db_path())
                .context("failed to open audit database")?,
        ),
    };
    Ok(Guardrail::new(
        RiskMatcher::new(config.guardrail.risk_rules.clone()),
        config.guardrail.policy,
        ServiceRateLimiter::new(config.guardrail.limits.clone()),
        AccessStore::load(
            &config.workspace_dir,
            config.guardrail.default_access_level,
        ),
        audit,
    ))
}

struct SimulateParams {
    config: Config,
    service: String,
    action: String,
    agent: String,
    service_name: Option<String>,
    target: Option<String>,
    preview: Option<String>,
    risk: Option<RiskLevel>,
    count: u32,
}

async fn run_simulate(params: SimulateParams) -> Result<()> {
    let guardrail = Arc::new(build_guardrail(&params.config)?);
    let timeout = Duration::from_secs(params.config.guardrail.confirm_timeout_secs);
    let service_name = params
        .service_name
        .clone()
        .unwrap_or_else(|| params.service.clone());

    for attempt in 1..=params.count {
        let id = format!(
            "req_{}",
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let request = ActionRequest {
            id: id.clone(),
            agent: params.agent.clone(),
            service: params.service.clone(),
            service_name: service_name.clone(),
            action: params.action.clone(),
            risk: params.risk,
            target: params.target.clone(),
            preview: params.preview.clone(),
        };
        let options = ConfirmOptions {
            timeout: Some(timeout),
            rate_override: None,
        };

        let gate = tokio::spawn({
            let guardrail = Arc::clone(&guardrail);
            let request = request.clone();
            async move { guardrail.confirm_action(&request, &options).await }
        });

        // The gate resolves synchronously for auto/rate/policy outcomes;
        // otherwise it parks in the pending map and we play the UI's role.
        while !gate.is_finished() {
            if guardrail.pending_ids().iter().any(|pending| pending == &id) {
                let decision = prompt_decision(&guardrail, &request, timeout).await;
                guardrail.resolve(&id, decision);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let verdict = gate.await.context("confirmation task panicked")??;
        if params.count > 1 {
            println!("[{attempt}/{}] {}", params.count, describe_verdict(&verdict));
        } else {
            println!("{}", describe_verdict(&verdict));
        }
    }

    Ok(())
}

async fn prompt_decision(
    guardrail: &Guardrail,
    request: &ActionRequest,
    timeout: Duration,
) -> HumanDecision {
    let risk = guardrail.effective_risk(request);
    eprintln!();
    eprintln!("┌─ Action Confirmation Required ───────────────────");
    eprintln!("│ Service: {} ({})", request.service, request.service_name);
    eprintln!("│ Action:  {}", request.action);
    eprintln!("│ Risk:    {risk}");
    eprintln!("│ Agent:   {}", request.agent);
    if let Some(target) = &request.target {
        eprintln!("│ Target:  {target}");
    }
    if let Some(preview) = &request.preview {
        eprintln!("│ Preview: {preview}");
    }
    eprintln!("├──────────────────────────────────────────────────");
    eprintln!("│ [A]pprove  [C]ancel  [E]dit");
    eprintln!("└──────────────────────────────────────────────────");
    eprint!("  > ");

    match tokio::time::timeout(timeout, read_single_char()).await {
        Ok(Ok(ch)) => match ch.to_ascii_lowercase() {
            'a' => HumanDecision::Approve,
            'e' => HumanDecision::Edit,
            'c' => HumanDecision::Cancel,
            other => {
                eprintln!("unrecognized input '{other}', treating as cancel");
                HumanDecision::Cancel
            }
        },
        Ok(Err(error)) => {
            eprintln!("input error: {error}, treating as cancel");
            HumanDecision::Cancel
        }
        Err(_) => HumanDecision::Cancel,
    }
}

async fn read_single_char() -> Result<char> {
    // stdin is blocking, so read it off the runtime
    let ch = tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        input
            .trim()
            .chars()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no input received"))
    })
    .await??;
    Ok(ch)
}

fn describe_verdict(verdict: &GateVerdict) -> String {
    match verdict {
        GateVerdict::AutoApproved => "✓ auto-approved (no confirmation required)".to_string(),
        GateVerdict::Approved => "✓ approved".to_string(),
        GateVerdict::Denied => "✗ denied by user".to_string(),
        GateVerdict::PolicyDenied { access } => {
            format!("✗ denied by access policy (level: {access})")
        }
        GateVerdict::RateLimited { remaining, limit } => {
            format!("✗ rate limit reached ({remaining}/{limit} remaining this window)")
        }
        GateVerdict::TimedOut => "✗ confirmation timed out".to_string(),
    }
}

fn run_plan(config: &Config, file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read plan file '{}'", file.display()))?;
    let plan: DryRunPlan =
        serde_json::from_str(&contents).context("failed to parse plan JSON")?;
    let matcher = RiskMatcher::new(config.guardrail.risk_rules.clone());

    println!("Plan {} (agent: {})", plan.id, plan.agent);
    for (index, (step, risk)) in plan
        .steps
        .iter()
        .zip(plan.annotated_risks(&matcher))
        .enumerate()
    {
        let summary = step.summary.as_deref().unwrap_or("");
        println!(
            "  {:>2}. [{risk:<4}] {:<12} {:<24} {summary}",
            index + 1,
            step.service,
            step.action
        );
    }
    println!();
    if plan.requires_confirmation(&matcher) {
        println!("⚠ plan requires explicit confirmation before execution");
    } else {
        println!("✓ plan may execute without a confirmation gate");
    }
    Ok(())
}

fn run_audit(config: &Config, command: AuditCommands) -> Result<()> {
    let store: Box<dyn AuditStore> = match config.audit.backend {
        AuditBackend::Memory => Box::new(MemoryAuditStore::new()),
        AuditBackend::Sqlite => Box::new(
            SqliteAuditStore::new(&config.audit_db_path())
                .context("failed to open audit database")?,
        ),
    };

    match command {
        AuditCommands::List {
            limit,
            service,
            json,
        } => {
            let limit = limit.unwrap_or(config.audit.default_list_limit);
            let entries = store
                .list(limit, service.as_deref())
                .context("failed to list audit entries")?;
            if json {
                for entry in &entries {
                    println!("{}", serde_json::to_string(entry)?);
                }
            } else if entries.is_empty() {
                println!("audit log is empty");
            } else {
                for entry in &entries {
                    println!(
                        "{}  {:<10} {:<24} {:<9} {}",
                        entry.timestamp, entry.service, entry.action, entry.result, entry.agent
                    );
                }
            }
        }
        AuditCommands::Stats => {
            let stats = store.stats().context("failed to compute audit stats")?;
            println!("today: {} total", stats.total);
            println!("  success: {}", stats.success);
            println!("  denied:  {}", stats.denied);
            println!("  failed:  {}", stats.failed);
            if !stats.by_service.is_empty() {
                println!();
                let mut services: Vec<_> = stats.by_service.iter().collect();
                services.sort_by(|a, b| a.0.cmp(b.0));
                for (service, per_service) in services {
                    println!(
                        "  {:<12} {:>4} actions, {} failed ({})",
                        service, per_service.count, per_service.failed, per_service.label
                    );
                }
            }
        }
        AuditCommands::Clear { yes } => {
            if !yes {
                bail!("refusing to clear the audit log without --yes");
            }
            store.clear().context("failed to clear audit log")?;
            println!("audit log cleared");
        }
    }
    Ok(())
}

fn run_limits(config: &Config, command: &LimitsCommands) -> Result<()> {
    let guardrail = build_guardrail(config)?;
    match command {
        LimitsCommands::Show => {
            println!("configured limits:");
            for limit in &config.guardrail.limits {
                println!(
                    "  {:<12} {:>4} actions / {} min",
                    limit.service, limit.max_actions, limit.window_minutes
                );
            }
            let windows = guardrail.limiter().windows();
            if windows.is_empty() {
                println!("\nno live windows in this session");
            } else {
                println!("\nlive windows:");
                for window in windows {
                    println!(
                        "  {:<12} {}/{} used, {} remaining, {}s old",
                        window.service,
                        window.count,
                        window.limit,
                        window.remaining,
                        window.window_age.as_secs()
                    );
                }
            }
        }
        LimitsCommands::Reset { service } => {
            guardrail.limiter().reset(service);
            println!("window for '{service}' cleared (session-local)");
        }
        LimitsCommands::Bump { service, extra } => {
            guardrail.limiter().bump(service, *extra);
            println!("handed back {extra} quota units to '{service}' (session-local)");
        }
    }
    Ok(())
}

fn run_access(config: &Config, command: &AccessCommands) -> Result<()> {
    let store = AccessStore::load(
        &config.workspace_dir,
        config.guardrail.default_access_level,
    );
    match command {
        AccessCommands::Show => {
            println!("default level: {}", store.default_level());
            let assignments = store.assignments();
            if assignments.is_empty() {
                println!("no explicit assignments");
            } else {
                for (agent, service, level) in assignments {
                    println!("  {agent:<16} {service:<12} {level}");
                }
            }
        }
        AccessCommands::Set {
            agent,
            service,
            level,
        } => {
            let level = level
                .parse::<AccessLevel>()
                .map_err(|_| anyhow::anyhow!("level must be one of: none, read, write, full"))?;
            store
                .set_level(agent, service, level)
                .context("failed to persist access level")?;
            println!("{agent} now has {level} access to {service}");
        }
    }
    Ok(())
}
