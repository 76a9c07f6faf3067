use crate::config::Config;
use crate::guardrail::Guardrail;

pub fn render_status(config: &Config, guardrail: &Guardrail) -> String {
    let mut lines = vec![
        "◆ actiongate status".to_string(),
        String::new(),
        format!("version     {}", env!("CARGO_PKG_VERSION")),
        format!("config      {}", config.config_path.display()),
        format!("workspace   {}", config.workspace_dir.display()),
        String::new(),
        format!("  audit backend    {:?}", config.audit.backend),
        format!("  audit database   {}", config.audit_db_path().display()),
        format!(
            "  default access   {}",
            config.guardrail.default_access_level
        ),
        format!(
            "  write gates hard {}",
            if config.guardrail.policy.write_allows_hard {
                "no (legacy permissive mode)"
            } else {
                "yes"
            }
        ),
        format!(
            "  confirm timeout  {}s",
            config.guardrail.confirm_timeout_secs
        ),
        format!("  risk rules       {}", config.guardrail.risk_rules.len()),
        String::new(),
        "  rate limits".to_string(),
    ];

    for limit in &config.guardrail.limits {
        lines.push(format!(
            "    {:<12} {:>4} actions / {} min",
            limit.service, limit.max_actions, limit.window_minutes
        ));
    }

    let windows = guardrail.limiter().windows();
    if !windows.is_empty() {
        lines.push(String::new());
        lines.push("  live windows".to_string());
        for window in windows {
            lines.push(format!(
                "    {:<12} {}/{} used",
                window.service, window.count, window.limit
            ));
        }
    }

    let pending = guardrail.pending_ids();
    lines.push(String::new());
    if pending.is_empty() {
        lines.push("  no pending confirmations".to_string());
    } else {
        lines.push(format!("  pending confirmations: {}", pending.len()));
        for id in pending {
            lines.push(format!("    {id}"));
        }
    }

    lines.join("\n")
}
