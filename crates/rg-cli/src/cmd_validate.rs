use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use rg_config::{PlanMode, RolloutConfig, RolloutPlan};
use rg_core::{
    Assessment, Fleet, FleetCountService, GroupDefinition, RolloutGroupsValidation, TargetFilter,
};
use rg_runtime::DefinitionSession;
use rg_runtime::tracing_init::init_tracing;

/// JSON document printed on stdout.
#[derive(Serialize)]
struct Report {
    mode: &'static str,
    target_filter: String,
    validation: RolloutGroupsValidation,
    assessment: Assessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    transport_error: Option<String>,
}

/// Run one validation cycle and print the report. Returns whether the plan
/// is valid.
pub(crate) async fn run(
    plan_path: PathBuf,
    config_path: Option<PathBuf>,
    fleet_path: Option<PathBuf>,
) -> anyhow::Result<bool> {
    let plan = RolloutPlan::load(&plan_path)
        .with_context(|| format!("loading plan: {}", plan_path.display()))?;
    let config = match &config_path {
        Some(path) => RolloutConfig::load(path)
            .with_context(|| format!("loading config: {}", path.display()))?,
        None => RolloutConfig::default(),
    };

    let base_dir = config_path
        .as_deref()
        .unwrap_or(&plan_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let _guard = init_tracing(&config.logging, &base_dir)?;

    let fleet_path = fleet_path
        .or_else(|| plan.fleet.clone())
        .context("no fleet: pass --fleet or set `fleet` in the plan")?;
    let fleet = Fleet::load(&fleet_path).map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::info!(
        domain = "sys",
        fleet = %fleet_path.display(),
        targets = fleet.len(),
        "fleet loaded"
    );
    let service = Arc::new(FleetCountService::new(fleet));

    let mut session =
        DefinitionSession::start(&config, service.clone()).map_err(|e| anyhow::anyhow!("{e}"))?;

    let report = match &plan.mode {
        PlanMode::Simple { groups } => {
            let filter =
                TargetFilter::parse(&plan.target_filter).map_err(|e| anyhow::anyhow!("{e}"))?;
            let total = service.fleet().count(&filter);
            let simple = session
                .simple_plan(total as i64, i64::from(*groups))
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            Report {
                mode: "simple",
                target_filter: plan.target_filter.clone(),
                assessment: simple.assess(&session.quotas(), session.policy()),
                validation: simple.validation(),
                transport_error: None,
            }
        }
        PlanMode::Advanced(entries) => {
            let groups: Vec<GroupDefinition> = entries
                .iter()
                .map(|e| GroupDefinition::from_entry(e, &config.group_defaults))
                .collect();
            let update = session
                .validate(groups, &plan.target_filter)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            Report {
                mode: "advanced",
                target_filter: plan.target_filter.clone(),
                validation: update.validation,
                assessment: update.assessment,
                transport_error: update.transport_error,
            }
        }
    };
    session.shutdown().await.map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    for message in report.assessment.error_messages() {
        eprintln!("error: {message}");
    }
    if let Some(err) = &report.transport_error {
        eprintln!("error: {err}");
    }
    Ok(report.assessment.is_valid())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLEET: &str = r#"{"id": "a1", "attributes": {"region": "eu"}}
{"id": "a2", "attributes": {"region": "eu"}}
{"id": "a3", "attributes": {"region": "eu"}}
{"id": "b1", "attributes": {"region": "us"}}
"#;

    // init_tracing installs a global subscriber, so only one test may call run
    #[tokio::test]
    async fn validates_advanced_plan_against_fleet() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fleet.jsonl"), FLEET).unwrap();
        let plan_path = dir.path().join("plan.toml");
        std::fs::write(
            &plan_path,
            r#"
target_filter = "attribute.region==eu"
fleet = "fleet.jsonl"

[[group]]
name = "first"
target_percentage = 50.0

[[group]]
name = "rest"
"#,
        )
        .unwrap();

        let valid = run(plan_path, None, None).await.unwrap();
        assert!(valid);
    }
}
