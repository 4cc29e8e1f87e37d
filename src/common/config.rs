//! Configuration file handling
//!
//! Every section is optional; a missing config file yields the defaults that
//! reproduce the standard four-stage verification run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Built-in credentials for the public test networks.
///
/// These are throwaway test-fixture keys, funded only with faucet tokens.
/// They are used only when neither the environment nor the config file
/// provides a key and `[fixtures] enabled` is true.
pub mod fixtures {
    /// Test-fixture Tron key (Nile faucet account)
    pub const TRON_PRIVATE_KEY: &str =
        "79a5d62ebbe36b4e54fa5d795de9a2d4c528508a48e004cafbe0660a8d286e08";
    /// Test-fixture EVM key (Sepolia / Arbitrum Sepolia faucet account)
    pub const EVM_PRIVATE_KEY: &str =
        "98f16b84579621f391a1589626c057fa0a54630b9f792e6db4a8493229de089d";

    /// Tron account the read-only sweep queries and the transfers spend from
    pub const TRON_ADDRESS: &str = "TG2D8vTp4xHBB2vhVbgHK2AhA2p9wY4q9M";
    /// Tron transfer recipient
    pub const TRON_TO_ADDRESS: &str = "TPsXm9mBMn8WGoDQcvroGPQbb3WpP7K15t";
    /// EVM account queried, spent from and sent to
    pub const EVM_ADDRESS: &str = "0x3CCD11B6c4B5Ca62d2B29C949B23e0550d64f0b9";
}

/// Environment variable that overrides the Tron signing key
pub const TRON_KEY_ENV: &str = "TRON_PRIVATE_KEY";
/// Environment variable that overrides the EVM signing key
pub const EVM_KEY_ENV: &str = "ETH_PRIVATE_KEY";

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// How the client under test is invoked
    #[serde(default)]
    pub client: ClientConfig,

    /// Timeout and pacing settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Tron networks and accounts
    #[serde(default)]
    pub tron: TronConfig,

    /// EVM networks and accounts
    #[serde(default)]
    pub evm: EvmConfig,

    /// Settings forwarded to the monitor subcommands
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Test-fixture credential policy
    #[serde(default)]
    pub fixtures: FixtureConfig,
}

/// Invocation of the client binary: `<program> <args...> <subcommand>`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClientConfig {
    /// Program to run
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the subcommand
    #[serde(default = "default_client_args")]
    pub args: Vec<String>,

    /// Working directory for the client (defaults to the current directory)
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Environment applied to every step, below the step's own overlay
    #[serde(default = "default_client_env")]
    pub env: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_client_args(),
            workdir: None,
            env: default_client_env(),
        }
    }
}

fn default_program() -> String {
    "cargo".to_string()
}

fn default_client_args() -> Vec<String> {
    vec!["run".to_string(), "--".to_string()]
}

fn default_client_env() -> BTreeMap<String, String> {
    BTreeMap::from([("RUSTFLAGS".to_string(), "-A warnings".to_string())])
}

/// Timeout and pacing settings in seconds
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Timeouts {
    /// Wall-clock limit for a single step
    #[serde(default = "default_step")]
    pub step_secs: u64,

    /// Bound on joining the output drain after the child exits or is killed
    #[serde(default = "default_drain_join")]
    pub drain_join_secs: u64,

    /// Pause between Tron networks in the read-only sweep
    #[serde(default = "default_network_delay")]
    pub network_delay_secs: u64,

    /// Pause before the verify step on the rate-limited network
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            step_secs: default_step(),
            drain_join_secs: default_drain_join(),
            network_delay_secs: default_network_delay(),
            settle_secs: default_settle(),
        }
    }
}

fn default_step() -> u64 {
    180
}
fn default_drain_join() -> u64 {
    2
}
fn default_network_delay() -> u64 {
    4
}
fn default_settle() -> u64 {
    2
}

/// Tron section
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TronConfig {
    /// Networks covered by the read-only sweep, in order
    #[serde(default = "default_tron_networks")]
    pub networks: Vec<String>,

    /// Network used for the transfer and monitor flow
    #[serde(default = "default_tron_test_network")]
    pub test_network: String,

    /// Network whose public endpoint rate-limits the verify call
    #[serde(default = "default_tron_rate_limited")]
    pub rate_limited_network: String,

    /// Account queried and spent from
    #[serde(default = "default_tron_address")]
    pub address: String,

    /// Transfer recipient
    #[serde(default = "default_tron_to_address")]
    pub to_address: String,

    /// Native transfer amount in sun
    #[serde(default = "default_trx_amount")]
    pub trx_amount_sun: String,

    /// TRC20 transfer amount in base units
    #[serde(default = "default_trc20_amount")]
    pub trc20_amount: String,

    /// Signing key (overridden by `TRON_PRIVATE_KEY`)
    #[serde(default)]
    pub private_key: Option<String>,
}

impl Default for TronConfig {
    fn default() -> Self {
        Self {
            networks: default_tron_networks(),
            test_network: default_tron_test_network(),
            rate_limited_network: default_tron_rate_limited(),
            address: default_tron_address(),
            to_address: default_tron_to_address(),
            trx_amount_sun: default_trx_amount(),
            trc20_amount: default_trc20_amount(),
            private_key: None,
        }
    }
}

fn default_tron_networks() -> Vec<String> {
    ["nile", "mainnet", "shasta"].map(String::from).to_vec()
}
fn default_tron_test_network() -> String {
    "nile".to_string()
}
fn default_tron_rate_limited() -> String {
    "mainnet".to_string()
}
fn default_tron_address() -> String {
    fixtures::TRON_ADDRESS.to_string()
}
fn default_tron_to_address() -> String {
    fixtures::TRON_TO_ADDRESS.to_string()
}
fn default_trx_amount() -> String {
    "1000000".to_string()
}
fn default_trc20_amount() -> String {
    "1000000".to_string()
}

/// EVM section
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EvmConfig {
    /// Networks covered by the read-only sweep, in order
    #[serde(default = "default_evm_networks")]
    pub networks: Vec<String>,

    /// Networks used for the transfer and monitor flow
    #[serde(default = "default_evm_test_networks")]
    pub test_networks: Vec<String>,

    /// Account queried, spent from and sent to
    #[serde(default = "default_evm_address")]
    pub address: String,

    /// Native transfer amount in wei
    #[serde(default = "default_amount_wei")]
    pub amount_wei: String,

    /// ERC20 transfer amount (human units)
    #[serde(default = "default_erc20_amount")]
    pub erc20_amount: String,

    /// Signing key (overridden by `ETH_PRIVATE_KEY`)
    #[serde(default)]
    pub private_key: Option<String>,

    /// RPC endpoint forwarded as `EVM_RPC_URL`
    #[serde(default)]
    pub rpc_url: Option<String>,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            networks: default_evm_networks(),
            test_networks: default_evm_test_networks(),
            address: default_evm_address(),
            amount_wei: default_amount_wei(),
            erc20_amount: default_erc20_amount(),
            private_key: None,
            rpc_url: None,
        }
    }
}

fn default_evm_networks() -> Vec<String> {
    ["sepolia", "arbitrum-sepolia", "arbitrum-one", "mainnet"]
        .map(String::from)
        .to_vec()
}
fn default_evm_test_networks() -> Vec<String> {
    ["sepolia", "arbitrum-sepolia"].map(String::from).to_vec()
}
fn default_evm_address() -> String {
    fixtures::EVM_ADDRESS.to_string()
}
fn default_amount_wei() -> String {
    "1000000000000000".to_string()
}
fn default_erc20_amount() -> String {
    "0".to_string()
}

/// Settings forwarded to the monitor subcommands
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct MonitorConfig {
    /// Forwarded as `MONITOR_TIMEOUT_SEC`
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Forwarded as `MONITOR_MIN_CONFIRMATIONS`
    #[serde(default)]
    pub min_confirmations: Option<u64>,
}

/// Test-fixture credential policy
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FixtureConfig {
    /// Allow the built-in test-fixture keys as a last resort
    #[serde(default = "default_fixtures_enabled")]
    pub enabled: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            enabled: default_fixtures_enabled(),
        }
    }
}

fn default_fixtures_enabled() -> bool {
    true
}

/// Where a resolved credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Environment,
    ConfigFile,
    TestFixture,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Environment => "environment",
            Self::ConfigFile => "config file",
            Self::TestFixture => "built-in test fixture",
        };
        f.write_str(s)
    }
}

/// A signing key together with its provenance
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub source: CredentialSource,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve a credential: environment, then config file, then test fixture
///
/// Blank values count as unset at every level.
pub fn resolve_credential(
    env_value: Option<String>,
    configured: Option<&str>,
    fixture: &str,
    fixtures_enabled: bool,
) -> Option<Credential> {
    let non_blank = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    if let Some(value) = env_value.as_deref().and_then(non_blank) {
        return Some(Credential {
            value,
            source: CredentialSource::Environment,
        });
    }
    if let Some(value) = configured.and_then(non_blank) {
        return Some(Credential {
            value,
            source: CredentialSource::ConfigFile,
        });
    }
    if fixtures_enabled {
        return non_blank(fixture).map(|value| Credential {
            value,
            source: CredentialSource::TestFixture,
        });
    }
    None
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default config file is
    /// used if present, otherwise the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = config_path() {
            if path.exists() {
                tracing::info!(path = %path.display(), "loading configuration");
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Parse a specific config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the runner cannot execute
    pub fn validate(&self) -> Result<()> {
        if self.client.program.trim().is_empty() {
            return Err(Error::Config("client.program must not be empty".to_string()));
        }
        if self.timeouts.step_secs == 0 {
            return Err(Error::Config("timeouts.step_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Resolve the Tron signing key from `TRON_PRIVATE_KEY`, config, or fixture
    pub fn tron_credential(&self) -> Option<Credential> {
        resolve_credential(
            std::env::var(TRON_KEY_ENV).ok(),
            self.tron.private_key.as_deref(),
            fixtures::TRON_PRIVATE_KEY,
            self.fixtures.enabled,
        )
    }

    /// Resolve the EVM signing key from `ETH_PRIVATE_KEY`, config, or fixture
    pub fn evm_credential(&self) -> Option<Credential> {
        resolve_credential(
            std::env::var(EVM_KEY_ENV).ok(),
            self.evm.private_key.as_deref(),
            fixtures::EVM_PRIVATE_KEY,
            self.fixtures.enabled,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_standard_run() {
        let config = Config::default();
        assert_eq!(config.client.program, "cargo");
        assert_eq!(config.client.args, vec!["run", "--"]);
        assert_eq!(config.client.env["RUSTFLAGS"], "-A warnings");
        assert_eq!(config.timeouts.step_secs, 180);
        assert_eq!(config.timeouts.drain_join_secs, 2);
        assert_eq!(config.tron.networks, vec!["nile", "mainnet", "shasta"]);
        assert_eq!(config.evm.test_networks, vec!["sepolia", "arbitrum-sepolia"]);
        assert!(config.fixtures.enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[client]
program = "./client"
args = []

[timeouts]
step_secs = 30

[evm]
networks = ["sepolia"]
"#,
        )
        .unwrap();

        assert_eq!(config.client.program, "./client");
        assert!(config.client.args.is_empty());
        assert_eq!(config.client.env["RUSTFLAGS"], "-A warnings");
        assert_eq!(config.timeouts.step_secs, 30);
        assert_eq!(config.timeouts.network_delay_secs, 4);
        assert_eq!(config.evm.networks, vec!["sepolia"]);
        assert_eq!(config.evm.test_networks.len(), 2);
        assert_eq!(config.tron.test_network, "nile");
    }

    #[test]
    fn test_zero_step_timeout_is_rejected() {
        let mut config = Config::default();
        config.timeouts.step_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_credential_environment_wins() {
        let cred = resolve_credential(Some("envkey".into()), Some("filekey"), "fixture", true)
            .unwrap();
        assert_eq!(cred.value, "envkey");
        assert_eq!(cred.source, CredentialSource::Environment);
    }

    #[test]
    fn test_credential_blank_environment_falls_through() {
        let cred = resolve_credential(Some("   ".into()), Some("filekey"), "fixture", true)
            .unwrap();
        assert_eq!(cred.value, "filekey");
        assert_eq!(cred.source, CredentialSource::ConfigFile);
    }

    #[test]
    fn test_credential_fixture_is_last_resort() {
        let cred = resolve_credential(None, None, "fixture", true).unwrap();
        assert_eq!(cred.value, "fixture");
        assert_eq!(cred.source, CredentialSource::TestFixture);
    }

    #[test]
    fn test_credential_absent_when_fixtures_disabled() {
        assert!(resolve_credential(None, Some(""), "fixture", false).is_none());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = resolve_credential(Some("secret".into()), None, "", false).unwrap();
        let shown = format!("{:?}", cred);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("redacted"));
    }
}
