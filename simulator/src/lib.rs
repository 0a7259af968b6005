//! Scenario runner for the dynlink host.
//!
//! A scenario deploys sample modules into an in-memory host and runs an ordered
//! list of transactions and queries against them. String arguments of the form
//! `@label` are replaced with the hex address of the module deployed as `label`,
//! so modules can be wired to each other without knowing addresses up front.

use anyhow::{anyhow, Context, Result};
use dynlink_execution::{
    mocks::{contracts, create_account, Harness},
    Config,
};
use dynlink_types::{Address, LogEntry, Message, Value};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, info};

#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: Config,
    pub modules: Vec<Deployment>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A module instance to deploy before any step runs.
#[derive(Clone, Debug, Deserialize)]
pub struct Deployment {
    pub label: String,
    /// Name of a sample module (e.g. `number`, `call_number`).
    pub code: String,
    #[serde(default)]
    pub init: Option<Message>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Execute,
    Query,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Step {
    pub action: Action,
    /// Label of the target module.
    pub target: String,
    pub entry_point: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Seed of the sending account.
    #[serde(default)]
    pub sender: u64,
    #[serde(default)]
    pub attached_value: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub action: Action,
    pub target: String,
    pub entry_point: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub modules: BTreeMap<String, Address>,
    pub steps: Vec<StepReport>,
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("invalid scenario {}", path.display()))
}

fn substitute(value: Value, modules: &BTreeMap<String, Address>) -> Result<Value> {
    Ok(match value {
        Value::Str(s) => match s.strip_prefix('@') {
            Some(label) => Value::Str(
                modules
                    .get(label)
                    .ok_or_else(|| anyhow!("unknown module label: {label}"))?
                    .to_hex(),
            ),
            None => Value::Str(s),
        },
        Value::Tuple(items) => Value::Tuple(
            items
                .into_iter()
                .map(|item| substitute(item, modules))
                .collect::<Result<_>>()?,
        ),
        Value::Record(fields) => Value::Record(
            fields
                .into_iter()
                .map(|(name, item)| Ok((name, substitute(item, modules)?)))
                .collect::<Result<_>>()?,
        ),
        other => other,
    })
}

fn substitute_all(args: Vec<Value>, modules: &BTreeMap<String, Address>) -> Result<Vec<Value>> {
    args.into_iter()
        .map(|arg| substitute(arg, modules))
        .collect()
}

/// Deploy every module of `scenario`, then run its steps in order.
///
/// A failing step is recorded in its report; only a failed deployment or a
/// malformed scenario aborts the run.
pub fn run_scenario(scenario: Scenario) -> Result<Report> {
    let config = scenario.config.validate()?;
    let mut harness = Harness::new(config);
    let mut modules = BTreeMap::new();

    for deployment in scenario.modules {
        let contract = contracts::by_name(&deployment.code)
            .ok_or_else(|| anyhow!("unknown module code: {}", deployment.code))?;
        let init = match deployment.init {
            Some(message) => Some(Message::new(
                message.entry_point,
                substitute_all(message.args, &modules)?,
            )),
            None => None,
        };
        let address = harness
            .deploy(contract, &deployment.label, init)
            .with_context(|| format!("failed to deploy {}", deployment.label))?;
        info!(label = %deployment.label, %address, "deployed");
        modules.insert(deployment.label, address);
    }

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for step in scenario.steps {
        let target = modules
            .get(&step.target)
            .cloned()
            .ok_or_else(|| anyhow!("unknown module label: {}", step.target))?;
        let message = Message::new(step.entry_point.clone(), substitute_all(step.args, &modules)?);

        let mut report = StepReport {
            action: step.action,
            target: step.target,
            entry_point: step.entry_point,
            logs: Vec::new(),
            results: None,
            error: None,
        };
        match step.action {
            Action::Execute => {
                let sender = create_account(step.sender);
                match harness.execute(&sender, &target, &message, step.attached_value) {
                    Ok(logs) => report.logs = logs,
                    Err(err) => report.error = Some(err.to_string()),
                }
            }
            Action::Query => match harness.query(&target, &message) {
                Ok(results) => report.results = Some(results),
                Err(err) => report.error = Some(err.to_string()),
            },
        }
        debug!(
            target = %report.target,
            entry_point = %report.entry_point,
            ok = report.error.is_none(),
            "step complete"
        );
        steps.push(report);
    }

    Ok(Report { modules, steps })
}
