//! Verification plan as data
//!
//! A plan is an ordered list of stages. A sweep stage runs a fixed list of
//! read-only steps on every network; a flow stage runs producer steps
//! (transfers) on each network and then monitors the transaction they
//! produced. The standard four-stage plan is built from configuration; a
//! custom plan can be loaded from YAML with the same shape.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::config::{Config, Credential, CredentialSource, EVM_KEY_ENV, TRON_KEY_ENV};
use crate::common::{Error, Result};

use super::step::{ChainFamily, Step};

/// Environment variable the monitor subcommands read the hash from
pub const TX_HASH_VAR: &str = "TX_HASH";

/// A set of networks a per-step policy applies to
///
/// Written as `none`, `all`, `{only: [..]}` or a bare list of networks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "NetworkSetRepr", into = "NetworkSetRepr")]
pub enum NetworkSet {
    #[default]
    None,
    All,
    Only(Vec<String>),
}

/// Untagged wire form, readable inside internally tagged stages
#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum NetworkSetRepr {
    Keyword(NetworkKeyword),
    Only { only: Vec<String> },
    List(Vec<String>),
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum NetworkKeyword {
    None,
    All,
}

impl From<NetworkSetRepr> for NetworkSet {
    fn from(repr: NetworkSetRepr) -> Self {
        match repr {
            NetworkSetRepr::Keyword(NetworkKeyword::None) => Self::None,
            NetworkSetRepr::Keyword(NetworkKeyword::All) => Self::All,
            NetworkSetRepr::Only { only } | NetworkSetRepr::List(only) => Self::Only(only),
        }
    }
}

impl From<NetworkSet> for NetworkSetRepr {
    fn from(set: NetworkSet) -> Self {
        match set {
            NetworkSet::None => Self::Keyword(NetworkKeyword::None),
            NetworkSet::All => Self::Keyword(NetworkKeyword::All),
            NetworkSet::Only(only) => Self::Only { only },
        }
    }
}

impl NetworkSet {
    pub fn contains(&self, network: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Only(networks) => networks.iter().any(|n| n == network),
        }
    }

    fn only(network: &str) -> Self {
        Self::Only(vec![network.to_string()])
    }
}

/// Fixed pause before a step on selected networks
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settle {
    pub secs: u64,
    #[serde(default = "all_networks")]
    pub on: NetworkSet,
}

fn all_networks() -> NetworkSet {
    NetworkSet::All
}

/// One read-only step of a sweep
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SweepStep {
    pub name: String,
    /// Subcommand tokens; defaults to the step name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Networks on which a failure is tolerated
    #[serde(default)]
    pub tolerant: NetworkSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle: Option<Settle>,
}

impl SweepStep {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            command: None,
            tolerant: NetworkSet::None,
            settle: None,
        }
    }

    fn tolerant(mut self, networks: NetworkSet) -> Self {
        self.tolerant = networks;
        self
    }

    fn settle(mut self, secs: u64, on: NetworkSet) -> Self {
        self.settle = Some(Settle { secs, on });
        self
    }
}

/// Read-only sweep over a list of networks
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SweepStage {
    pub title: String,
    pub family: ChainFamily,
    pub networks: Vec<String>,
    /// Pause before every network but the first
    #[serde(default)]
    pub network_delay_secs: u64,
    /// Overlay shared by every step, below the network selector
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub steps: Vec<SweepStep>,
}

impl SweepStage {
    /// Resolve a sweep step on one network
    pub fn step(&self, spec: &SweepStep, network: &str) -> Step {
        Step {
            name: spec.name.clone(),
            network: network.to_string(),
            family: self.family,
            command: spec
                .command
                .clone()
                .unwrap_or_else(|| vec![spec.name.clone()]),
            env: overlay(&self.env, self.family, network),
            tolerant: spec.tolerant.contains(network),
        }
    }
}

/// Transfer-then-monitor flow on each listed network
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FlowStage {
    pub title: String,
    pub family: ChainFamily,
    pub networks: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Steps that may print a transaction hash; a later hash wins over an earlier one
    pub producers: Vec<String>,
    /// Step run with `TX_HASH` set to the selected hash
    pub monitor: String,
    #[serde(default)]
    pub monitor_env: BTreeMap<String, String>,
    /// When set, the stage is skipped with this message and nothing is counted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl FlowStage {
    pub fn producer_step(&self, network: &str, name: &str) -> Step {
        Step {
            name: name.to_string(),
            network: network.to_string(),
            family: self.family,
            command: vec![name.to_string()],
            env: overlay(&self.env, self.family, network),
            tolerant: false,
        }
    }

    pub fn monitor_step(&self, network: &str, tx_hash: &str) -> Step {
        let mut env = overlay(&self.monitor_env, self.family, network);
        env.insert(TX_HASH_VAR.to_string(), tx_hash.to_string());
        Step {
            name: self.monitor.clone(),
            network: network.to_string(),
            family: self.family,
            command: vec![self.monitor.clone()],
            env,
            tolerant: false,
        }
    }
}

/// Stage of a plan
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    Sweep(SweepStage),
    Flow(FlowStage),
}

impl Stage {
    pub fn title(&self) -> &str {
        match self {
            Self::Sweep(s) => &s.title,
            Self::Flow(f) => &f.title,
        }
    }

    fn networks(&self) -> &[String] {
        match self {
            Self::Sweep(s) => &s.networks,
            Self::Flow(f) => &f.networks,
        }
    }
}

/// Ordered list of stages, each gated on the previous one passing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Plan {
    pub stages: Vec<Stage>,
}

/// Network selector layered over a stage overlay
fn overlay(base: &BTreeMap<String, String>, family: ChainFamily, network: &str) -> BTreeMap<String, String> {
    let mut env = base.clone();
    env.insert(family.network_var().to_string(), network.to_string());
    env
}

fn env_of<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Plan {
    /// The standard four-stage plan, resolving credentials from the environment
    pub fn builtin(config: &Config) -> Self {
        let tron_key = config.tron_credential();
        let evm_key = config.evm_credential();
        for (var, key) in [(TRON_KEY_ENV, &tron_key), (EVM_KEY_ENV, &evm_key)] {
            match key {
                Some(cred) if cred.source == CredentialSource::TestFixture => {
                    tracing::warn!("{} not set; using the built-in test-fixture key", var)
                }
                Some(cred) => tracing::info!("{} taken from {}", var, cred.source),
                None => tracing::info!("{} not available", var),
            }
        }
        Self::with_credentials(config, tron_key.as_ref(), evm_key.as_ref())
    }

    /// The standard four-stage plan with explicit credentials
    pub fn with_credentials(
        config: &Config,
        tron_key: Option<&Credential>,
        evm_key: Option<&Credential>,
    ) -> Self {
        let tron = &config.tron;
        let evm = &config.evm;
        let timeouts = &config.timeouts;

        let tron_sweep = SweepStage {
            title: "1. Tron networks (read-only)".to_string(),
            family: ChainFamily::Tron,
            networks: tron.networks.clone(),
            network_delay_secs: timeouts.network_delay_secs,
            env: env_of([("TRON_ADDRESS", tron.address.as_str())]),
            steps: vec![
                SweepStep::new("tron-balance"),
                SweepStep::new("tron-trc20"),
                SweepStep::new("tron-usdt-balance"),
                SweepStep::new("tron-verify-trc20")
                    .tolerant(NetworkSet::only(&tron.rate_limited_network))
                    .settle(
                        timeouts.settle_secs,
                        NetworkSet::only(&tron.rate_limited_network),
                    ),
            ],
        };

        let mut tron_env = env_of([
            ("TRON_FROM_ADDRESS", tron.address.as_str()),
            ("TRON_TO_ADDRESS", tron.to_address.as_str()),
            ("TRX_AMOUNT_SUN", tron.trx_amount_sun.as_str()),
            ("TRC20_AMOUNT", tron.trc20_amount.as_str()),
        ]);
        if let Some(key) = tron_key {
            tron_env.insert(TRON_KEY_ENV.to_string(), key.value.clone());
        }
        let tron_flow = FlowStage {
            title: format!("2. Tron test network ({}): transfer and monitor", tron.test_network),
            family: ChainFamily::Tron,
            networks: vec![tron.test_network.clone()],
            env: tron_env,
            producers: vec!["tron-transfer".to_string(), "tron-full-flow".to_string()],
            monitor: "tron-monitor".to_string(),
            monitor_env: BTreeMap::new(),
            skip_reason: None,
        };

        let mut evm_read_env = env_of([("ETH_ADDRESS", evm.address.as_str())]);
        let mut monitor_env = BTreeMap::new();
        if let Some(url) = &evm.rpc_url {
            evm_read_env.insert("EVM_RPC_URL".to_string(), url.clone());
            monitor_env.insert("EVM_RPC_URL".to_string(), url.clone());
        }
        if let Some(secs) = config.monitor.timeout_secs {
            monitor_env.insert("MONITOR_TIMEOUT_SEC".to_string(), secs.to_string());
        }
        if let Some(n) = config.monitor.min_confirmations {
            monitor_env.insert("MONITOR_MIN_CONFIRMATIONS".to_string(), n.to_string());
        }

        let evm_sweep = SweepStage {
            title: "3. EVM networks (read-only)".to_string(),
            family: ChainFamily::Evm,
            networks: evm.networks.clone(),
            network_delay_secs: 0,
            env: evm_read_env.clone(),
            steps: vec![
                SweepStep::new("eth-balance"),
                SweepStep::new("erc20-demo"),
                SweepStep::new("erc20-verify").tolerant(NetworkSet::All),
            ],
        };

        let mut evm_env = evm_read_env;
        evm_env.extend(env_of([
            ("ETH_FROM_ADDRESS", evm.address.as_str()),
            ("ETH_TO_ADDRESS", evm.address.as_str()),
            ("ETH_AMOUNT_WEI", evm.amount_wei.as_str()),
            ("ERC20_AMOUNT", evm.erc20_amount.as_str()),
        ]));
        let skip_reason = match evm_key {
            Some(key) => {
                evm_env.insert(EVM_KEY_ENV.to_string(), key.value.clone());
                None
            }
            None => Some(format!(
                "{} not set; skipping EVM transfers and monitoring. \
                 Set {} to verify eth-transfer / erc20-full-flow / eth-monitor.",
                EVM_KEY_ENV, EVM_KEY_ENV
            )),
        };
        let evm_flow = FlowStage {
            title: format!("4. EVM test networks (optional: needs {})", EVM_KEY_ENV),
            family: ChainFamily::Evm,
            networks: evm.test_networks.clone(),
            env: evm_env,
            producers: vec!["eth-transfer".to_string(), "erc20-full-flow".to_string()],
            monitor: "eth-monitor".to_string(),
            monitor_env,
            skip_reason,
        };

        Self {
            stages: vec![
                Stage::Sweep(tron_sweep),
                Stage::Flow(tron_flow),
                Stage::Sweep(evm_sweep),
                Stage::Flow(evm_flow),
            ],
        }
    }

    /// Load a custom plan from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let plan: Self =
            serde_yaml::from_str(content).map_err(|e| Error::PlanParse(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Reject plans that could never run a step
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::PlanParse("plan has no stages".to_string()));
        }
        for stage in &self.stages {
            if stage.networks().is_empty() {
                return Err(Error::PlanParse(format!(
                    "stage '{}' lists no networks",
                    stage.title()
                )));
            }
            match stage {
                Stage::Sweep(s) if s.steps.is_empty() => {
                    return Err(Error::PlanParse(format!("stage '{}' has no steps", s.title)));
                }
                Stage::Flow(f) if f.producers.is_empty() => {
                    return Err(Error::PlanParse(format!(
                        "stage '{}' has no producer steps",
                        f.title
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Drop every inter-network delay and settle pause
    pub fn without_delays(mut self) -> Self {
        for stage in &mut self.stages {
            if let Stage::Sweep(sweep) = stage {
                sweep.network_delay_secs = 0;
                for step in &mut sweep.steps {
                    step.settle = None;
                }
            }
        }
        self
    }

    /// Copy with secret-looking environment values masked, for display
    pub fn redacted(&self) -> Self {
        let mut plan = self.clone();
        for stage in &mut plan.stages {
            let maps = match stage {
                Stage::Sweep(s) => vec![&mut s.env],
                Stage::Flow(f) => vec![&mut f.env, &mut f.monitor_env],
            };
            for map in maps {
                for (key, value) in map.iter_mut() {
                    if key.contains("PRIVATE_KEY") {
                        *value = "<redacted>".to_string();
                    }
                }
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_key(value: &str) -> Credential {
        Credential {
            value: value.to_string(),
            source: CredentialSource::TestFixture,
        }
    }

    fn builtin() -> Plan {
        Plan::with_credentials(
            &Config::default(),
            Some(&fixture_key("tronkey")),
            Some(&fixture_key("evmkey")),
        )
    }

    #[test]
    fn test_builtin_stage_order() {
        let plan = builtin();
        let kinds: Vec<_> = plan
            .stages
            .iter()
            .map(|s| match s {
                Stage::Sweep(s) => (s.family, "sweep"),
                Stage::Flow(f) => (f.family, "flow"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ChainFamily::Tron, "sweep"),
                (ChainFamily::Tron, "flow"),
                (ChainFamily::Evm, "sweep"),
                (ChainFamily::Evm, "flow"),
            ]
        );
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_tron_verify_tolerant_only_on_rate_limited_network() {
        let plan = builtin();
        let Stage::Sweep(sweep) = &plan.stages[0] else {
            panic!("expected sweep");
        };
        let verify = sweep.steps.iter().find(|s| s.name == "tron-verify-trc20").unwrap();

        assert!(sweep.step(verify, "mainnet").tolerant);
        assert!(!sweep.step(verify, "nile").tolerant);
        assert!(!sweep.step(verify, "shasta").tolerant);

        let balance = &sweep.steps[0];
        assert!(!sweep.step(balance, "mainnet").tolerant);

        let settle = verify.settle.as_ref().unwrap();
        assert!(settle.on.contains("mainnet"));
        assert!(!settle.on.contains("nile"));
    }

    #[test]
    fn test_evm_verify_tolerant_everywhere() {
        let plan = builtin();
        let Stage::Sweep(sweep) = &plan.stages[2] else {
            panic!("expected sweep");
        };
        let verify = sweep.steps.iter().find(|s| s.name == "erc20-verify").unwrap();
        for network in &sweep.networks {
            assert!(sweep.step(verify, network).tolerant, "{network}");
        }
        assert!(!sweep.step(&sweep.steps[0], "sepolia").tolerant);
    }

    #[test]
    fn test_sweep_step_env_is_resolved() {
        let plan = builtin();
        let Stage::Sweep(sweep) = &plan.stages[0] else {
            panic!("expected sweep");
        };
        let step = sweep.step(&sweep.steps[0], "shasta");
        assert_eq!(step.command, vec!["tron-balance"]);
        assert_eq!(step.env["TRON_NETWORK"], "shasta");
        assert_eq!(step.env["TRON_ADDRESS"], Config::default().tron.address);
    }

    #[test]
    fn test_monitor_step_env() {
        let plan = builtin();
        let Stage::Flow(flow) = &plan.stages[1] else {
            panic!("expected flow");
        };
        let step = flow.monitor_step("nile", "abc");
        assert_eq!(step.name, "tron-monitor");
        assert_eq!(step.env["TRON_NETWORK"], "nile");
        assert_eq!(step.env[TX_HASH_VAR], "abc");
        assert!(!step.env.contains_key(TRON_KEY_ENV));
        assert!(!step.tolerant);

        let producer = flow.producer_step("nile", "tron-transfer");
        assert_eq!(producer.env[TRON_KEY_ENV], "tronkey");
    }

    #[test]
    fn test_evm_flow_skipped_without_credential() {
        let plan = Plan::with_credentials(&Config::default(), None, None);
        let Stage::Flow(flow) = &plan.stages[3] else {
            panic!("expected flow");
        };
        assert!(flow.skip_reason.as_deref().unwrap().contains(EVM_KEY_ENV));
        assert!(!flow.env.contains_key(EVM_KEY_ENV));

        let Stage::Flow(tron) = &plan.stages[1] else {
            panic!("expected flow");
        };
        assert!(tron.skip_reason.is_none());
        assert!(!tron.env.contains_key(TRON_KEY_ENV));
    }

    #[test]
    fn test_evm_flow_runs_with_credential() {
        let plan = builtin();
        let Stage::Flow(flow) = &plan.stages[3] else {
            panic!("expected flow");
        };
        assert!(flow.skip_reason.is_none());
        assert_eq!(flow.networks, vec!["sepolia", "arbitrum-sepolia"]);
        assert_eq!(flow.env[EVM_KEY_ENV], "evmkey");
        assert_eq!(flow.producers, vec!["eth-transfer", "erc20-full-flow"]);
    }

    #[test]
    fn test_monitor_settings_forwarded() {
        let mut config = Config::default();
        config.monitor.timeout_secs = Some(60);
        config.evm.rpc_url = Some("http://localhost:8545".to_string());
        let plan = Plan::with_credentials(&config, None, Some(&fixture_key("k")));
        let Stage::Flow(flow) = &plan.stages[3] else {
            panic!("expected flow");
        };
        let step = flow.monitor_step("sepolia", "0xabc");
        assert_eq!(step.env["MONITOR_TIMEOUT_SEC"], "60");
        assert_eq!(step.env["EVM_RPC_URL"], "http://localhost:8545");
        assert_eq!(step.env["EVM_NETWORK"], "sepolia");
    }

    #[test]
    fn test_redacted_masks_keys() {
        let plan = builtin().redacted();
        let Stage::Flow(flow) = &plan.stages[3] else {
            panic!("expected flow");
        };
        assert_eq!(flow.env[EVM_KEY_ENV], "<redacted>");
        let yaml = serde_yaml::to_string(&plan).unwrap();
        assert!(!yaml.contains("evmkey"));
        assert!(!yaml.contains("tronkey"));
    }

    #[test]
    fn test_without_delays() {
        let plan = builtin().without_delays();
        for stage in &plan.stages {
            if let Stage::Sweep(s) = stage {
                assert_eq!(s.network_delay_secs, 0);
                assert!(s.steps.iter().all(|step| step.settle.is_none()));
            }
        }
    }

    #[test]
    fn test_yaml_plan_loads() {
        let plan = Plan::from_yaml(
            r#"
stages:
  - kind: sweep
    title: Local read-only
    family: tron
    networks: [nile, shasta]
    network_delay_secs: 1
    env:
      TRON_ADDRESS: TXYZ
    steps:
      - name: tron-balance
      - name: tron-verify-trc20
        tolerant: all
        settle:
          secs: 2
          on:
            only: [shasta]
  - kind: flow
    title: Local transfer
    family: evm
    networks: [sepolia]
    producers: [eth-transfer]
    monitor: eth-monitor
"#,
        )
        .unwrap();

        assert_eq!(plan.stages.len(), 2);
        let Stage::Sweep(sweep) = &plan.stages[0] else {
            panic!("expected sweep");
        };
        assert_eq!(sweep.steps[1].tolerant, NetworkSet::All);
        let settle = sweep.steps[1].settle.as_ref().unwrap();
        assert!(settle.on.contains("shasta"));
        assert!(!settle.on.contains("nile"));
        let Stage::Flow(flow) = &plan.stages[1] else {
            panic!("expected flow");
        };
        assert_eq!(flow.monitor, "eth-monitor");
        assert!(flow.skip_reason.is_none());
    }

    #[test]
    fn test_builtin_plan_survives_yaml() {
        let plan = builtin();
        let yaml = serde_yaml::to_string(&plan).unwrap();
        assert_eq!(Plan::from_yaml(&yaml).unwrap(), plan);
    }

    #[test]
    fn test_printed_plan_loads_back() {
        let plan = builtin().redacted();
        let yaml = serde_yaml::to_string(&plan).unwrap();
        assert!(!yaml.contains('!'), "{yaml}");
        assert!(yaml.contains("only:"), "{yaml}");
        assert_eq!(Plan::from_yaml(&yaml).unwrap(), plan);

        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(serde_json::from_str::<Plan>(&json).unwrap(), plan);
    }

    #[test]
    fn test_network_set_forms() {
        let parse = |yaml: &str| serde_yaml::from_str::<NetworkSet>(yaml).unwrap();
        assert_eq!(parse("none"), NetworkSet::None);
        assert_eq!(parse("all"), NetworkSet::All);
        assert_eq!(parse("only: [mainnet]"), NetworkSet::only("mainnet"));
        assert_eq!(
            parse("[nile, shasta]"),
            NetworkSet::Only(vec!["nile".to_string(), "shasta".to_string()])
        );
        assert_eq!(serde_yaml::to_string(&NetworkSet::All).unwrap().trim(), "all");
    }

    #[test]
    fn test_yaml_plan_accepts_list_tolerance() {
        let plan = Plan::from_yaml(
            r#"
stages:
  - kind: sweep
    title: Mixed
    family: evm
    networks: [sepolia, mainnet]
    steps:
      - name: erc20-verify
        tolerant: [mainnet]
"#,
        )
        .unwrap();
        let Stage::Sweep(sweep) = &plan.stages[0] else {
            panic!("expected sweep");
        };
        assert!(sweep.step(&sweep.steps[0], "mainnet").tolerant);
        assert!(!sweep.step(&sweep.steps[0], "sepolia").tolerant);
    }

    #[test]
    fn test_invalid_plans_rejected() {
        assert!(matches!(Plan::from_yaml("stages: []"), Err(Error::PlanParse(_))));
        let no_networks = r#"
stages:
  - kind: sweep
    title: empty
    family: evm
    networks: []
    steps:
      - name: eth-balance
"#;
        assert!(matches!(Plan::from_yaml(no_networks), Err(Error::PlanParse(_))));
        assert!(matches!(Plan::from_yaml("not: [valid"), Err(Error::PlanParse(_))));
    }
}
