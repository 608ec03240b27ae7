use {
    alloy::{
        primitives::{
            Address,
            TxHash,
            utils::{ParseUnits, parse_units},
        },
        signers::local::PrivateKeySigner,
    },
    std::{
        fmt::{self, Display, Formatter},
        path::PathBuf,
        time::Duration,
    },
    url::Url,
};

#[derive(clap::Parser)]
#[command(name = "deployer", about = "Deploys and administers the exchange proxy")]
pub struct Arguments {
    /// Live network endpoint.
    #[clap(long, env)]
    pub node_rpc: Option<Url>,

    /// Endpoint of a local fork. Switches to simulation mode: fee-market
    /// prices are collapsed into legacy ones, accounts are funded and
    /// impersonated and nothing is verified.
    #[clap(long, env)]
    pub fork_rpc: Option<Url>,

    /// Gas price override in gwei. Added to the node's gas price on legacy
    /// networks, used as the max fee per gas on fee-market networks.
    #[clap(long, env, value_parser = parse_gwei)]
    pub tip: Option<u128>,

    #[clap(long, env)]
    pub gas_limit: Option<u64>,

    /// Private key of the account sending the transactions.
    #[clap(long, env, hide_env_values = true)]
    pub sender_key: PrivateKeySigner,

    /// Private key of the vanity deployer account.
    #[clap(long, env, hide_env_values = true)]
    pub vanity_deployer_key: Option<PrivateKeySigner>,

    /// Do not ask for confirmation.
    #[clap(long, env)]
    pub yes: bool,

    /// Pause before every source verification submission.
    #[clap(long, env, default_value = "60s", value_parser = humantime::parse_duration)]
    pub verify_delay: Duration,

    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub explorer_timeout: Duration,

    /// Where ecosystem packages are installed.
    #[clap(long, env, default_value = contracts::paths::DEFAULT_PACKAGES_DIR)]
    pub artifacts_dir: PathBuf,

    #[clap(
        long,
        env,
        default_value = "warn,deployer=info,contracts=info,chain=info"
    )]
    pub log_filter: String,

    #[clap(flatten)]
    pub explorer_keys: ExplorerKeys,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Deploys an ecosystem contract.
    Deploy {
        /// `<family>/<contractName>`, e.g. `zero-ex/ZeroEx`.
        name: String,
        /// Constructor arguments, parsed by the constructor's parameter types.
        #[clap(allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Deploys a transformer through the transformer deployer.
    DeployTransformer {
        #[clap(long)]
        deployer: Address,
        /// Transformer contract name, e.g. `FillQuoteTransformer`.
        name: String,
        #[clap(allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Deploys an ecosystem contract through the vanity deployer, from the
    /// vanity deployer key.
    DeployVanity {
        /// Artifact of the vanity deployer contract.
        #[clap(long)]
        deployer_artifact: PathBuf,
        name: String,
        #[clap(allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Restricts the governor: no time lock for rollbacks, two confirmations
    /// and a one day time lock for everything else.
    LockdownGovernor {
        #[clap(long)]
        governor: Address,
        #[clap(long)]
        exchange_proxy: Address,
    },
    /// Prints governor calldata reverting the upgrades of a transaction.
    RollbackCalldata {
        #[clap(long)]
        exchange_proxy: Address,
        #[clap(long)]
        tx: TxHash,
    },
    /// Verifies already deployed contracts listed in a manifest.
    Verify {
        #[clap(long)]
        manifest: PathBuf,
    },
}

impl Command {
    /// Whether the command records deployments to verify on the explorer.
    pub fn queues_deployments(&self) -> bool {
        match self {
            Self::Deploy { .. }
            | Self::DeployTransformer { .. }
            | Self::DeployVanity { .. }
            | Self::Verify { .. } => true,
            Self::LockdownGovernor { .. } | Self::RollbackCalldata { .. } => false,
        }
    }
}

/// API keys of the explorer families.
#[derive(clap::Parser, Default)]
pub struct ExplorerKeys {
    #[clap(long, env, hide_env_values = true)]
    pub etherscan_key: Option<String>,
    #[clap(long, env, hide_env_values = true)]
    pub bscscan_key: Option<String>,
    #[clap(long, env, hide_env_values = true)]
    pub polygonscan_key: Option<String>,
    #[clap(long, env, hide_env_values = true)]
    pub ftmscan_key: Option<String>,
    #[clap(long, env, hide_env_values = true)]
    pub celoscan_key: Option<String>,
    #[clap(long, env, hide_env_values = true)]
    pub optimism_key: Option<String>,
    #[clap(long, env, hide_env_values = true)]
    pub arbitrum_key: Option<String>,
    #[clap(long, env, hide_env_values = true)]
    pub snowtrace_key: Option<String>,
    #[clap(long, env, hide_env_values = true)]
    pub basescan_key: Option<String>,
    #[clap(long, env, hide_env_values = true)]
    pub zkevm_polygonscan_key: Option<String>,
}

impl ExplorerKeys {
    /// The key for the explorer of a network, selected by network name.
    pub fn for_network(&self, network: &str) -> Option<&str> {
        let key = if network.starts_with("bsc") {
            &self.bscscan_key
        } else if network.starts_with("matic") {
            &self.polygonscan_key
        } else if network.starts_with("fantom") {
            &self.ftmscan_key
        } else if network.starts_with("celo") {
            &self.celoscan_key
        } else if network.starts_with("optimistic-ethereum") {
            &self.optimism_key
        } else if network.starts_with("arbitrum") {
            &self.arbitrum_key
        } else if network.starts_with("avalanche") {
            &self.snowtrace_key
        } else if network == "base" {
            &self.basescan_key
        } else if network.starts_with("polygon-zkevm") {
            &self.zkevm_polygonscan_key
        } else {
            &self.etherscan_key
        };
        key.as_deref()
    }
}

impl Arguments {
    /// The endpoint transactions go to.
    pub fn rpc(&self) -> Option<&Url> {
        self.fork_rpc.as_ref().or(self.node_rpc.as_ref())
    }

    pub fn is_simulated(&self) -> bool {
        self.fork_rpc.is_some()
    }

    /// Where fee-market prices are queried when simulating a live network.
    pub fn fee_rpc(&self) -> Option<&Url> {
        self.node_rpc.as_ref().filter(|_| self.is_simulated())
    }
}

fn parse_gwei(s: &str) -> Result<u128, String> {
    let wei: ParseUnits = parse_units(s, "gwei").map_err(|err| err.to_string())?;
    match wei {
        ParseUnits::U256(wei) => u128::try_from(wei).map_err(|err| err.to_string()),
        ParseUnits::I256(_) => Err("tip must not be negative".to_owned()),
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            node_rpc,
            fork_rpc,
            tip,
            gas_limit,
            sender_key,
            vanity_deployer_key,
            yes,
            verify_delay,
            explorer_timeout,
            artifacts_dir,
            log_filter,
            explorer_keys,
            command,
        } = self;

        display_option(f, "node_rpc", node_rpc)?;
        display_option(f, "fork_rpc", fork_rpc)?;
        display_option(f, "tip", tip)?;
        display_option(f, "gas_limit", gas_limit)?;
        writeln!(f, "sender: {:?}", sender_key.address())?;
        display_option(
            f,
            "vanity_deployer",
            &vanity_deployer_key
                .as_ref()
                .map(|key| format!("{:?}", key.address())),
        )?;
        writeln!(f, "yes: {yes}")?;
        writeln!(f, "verify_delay: {verify_delay:?}")?;
        writeln!(f, "explorer_timeout: {explorer_timeout:?}")?;
        writeln!(f, "artifacts_dir: {}", artifacts_dir.display())?;
        writeln!(f, "log_filter: {log_filter}")?;
        write!(f, "{explorer_keys}")?;
        writeln!(f, "command: {command:?}")?;
        Ok(())
    }
}

impl Display for ExplorerKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            etherscan_key,
            bscscan_key,
            polygonscan_key,
            ftmscan_key,
            celoscan_key,
            optimism_key,
            arbitrum_key,
            snowtrace_key,
            basescan_key,
            zkevm_polygonscan_key,
        } = self;

        display_secret_option(f, "etherscan_key", etherscan_key)?;
        display_secret_option(f, "bscscan_key", bscscan_key)?;
        display_secret_option(f, "polygonscan_key", polygonscan_key)?;
        display_secret_option(f, "ftmscan_key", ftmscan_key)?;
        display_secret_option(f, "celoscan_key", celoscan_key)?;
        display_secret_option(f, "optimism_key", optimism_key)?;
        display_secret_option(f, "arbitrum_key", arbitrum_key)?;
        display_secret_option(f, "snowtrace_key", snowtrace_key)?;
        display_secret_option(f, "basescan_key", basescan_key)?;
        display_secret_option(f, "zkevm_polygonscan_key", zkevm_polygonscan_key)?;
        Ok(())
    }
}

fn display_option(
    f: &mut Formatter<'_>,
    name: &str,
    option: &Option<impl Display>,
) -> fmt::Result {
    match option {
        Some(value) => writeln!(f, "{name}: {value}"),
        None => writeln!(f, "{name}: None"),
    }
}

fn display_secret_option<T>(f: &mut Formatter<'_>, name: &str, option: &Option<T>) -> fmt::Result {
    display_option(f, name, &option.as_ref().map(|_| "SECRET"))
}
