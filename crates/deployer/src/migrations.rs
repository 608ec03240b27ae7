//! The operations exposed on the command line, each a [`Migration`] run from
//! the sender.

use {
    crate::{
        ecosystem::EcosystemContract,
        governor::{self, GovernorCall},
        multisig,
        run::Migration,
        sender::SenderContext,
        verify::DeploymentRecord,
    },
    alloy::{
        primitives::{Address, FixedBytes, TxHash, U256, utils::parse_ether},
        sol_types::SolCall,
    },
    anyhow::{Context, Result},
    contracts::{
        Artifact,
        ArtifactId,
        bindings::{IZeroEx, IZeroExGovernor},
    },
    serde::Deserialize,
    std::path::{Path, PathBuf},
};

pub struct Deploy {
    pub name: String,
    pub args: Vec<String>,
}

#[async_trait::async_trait]
impl Migration for Deploy {
    async fn run(&self, ctx: &SenderContext) -> Result<()> {
        let args = ctx
            .create_contract(&self.name, None)?
            .parse_constructor_args(&self.args)?;
        let (contract, _) = ctx.deploy_contract(&self.name, &args).await?;
        println!("{}: {:?}", self.name, contract.address()?);
        Ok(())
    }
}

pub struct DeployTransformer {
    pub deployer: Address,
    pub name: String,
    pub args: Vec<String>,
}

#[async_trait::async_trait]
impl Migration for DeployTransformer {
    async fn run(&self, ctx: &SenderContext) -> Result<()> {
        let deployer =
            ctx.create_contract("zero-ex/TransformerDeployer", Some(self.deployer))?;
        let args = ctx
            .create_contract(
                &format!("{}/{}", crate::deploy::TRANSFORMER_FAMILY, self.name),
                None,
            )?
            .parse_constructor_args(&self.args)?;
        let address = ctx.deploy_transformer(&deployer, &self.name, &args).await?;
        println!("{}: {address:?}", self.name);
        Ok(())
    }
}

/// Ether the vanity deployer is given on a simulated chain.
const VANITY_DEPLOYER_FUNDS: &str = "0.1";

pub struct DeployVanity {
    pub deployer_artifact: PathBuf,
    /// The vanity deployer key's account.
    pub vanity_deployer: Address,
    pub name: String,
    pub args: Vec<String>,
}

#[async_trait::async_trait]
impl Migration for DeployVanity {
    async fn run(&self, ctx: &SenderContext) -> Result<()> {
        let deployer = local_contract(&self.deployer_artifact)?;
        let args = ctx
            .create_contract(&self.name, None)?
            .parse_constructor_args(&self.args)?;
        if ctx.is_simulated() {
            ctx.fund(self.vanity_deployer, parse_ether(VANITY_DEPLOYER_FUNDS)?)
                .await?;
        }
        let options = ctx.send_options().await?.with_from(self.vanity_deployer);
        let (contract, _) = ctx
            .deploy_vanity(&deployer, &self.name, &args, &options)
            .await?;
        println!("{}: {:?}", self.name, contract.address()?);
        Ok(())
    }
}

/// A contract built locally rather than published in an ecosystem package.
fn local_contract(path: &Path) -> Result<EcosystemContract> {
    let artifact = Artifact::from_file(path)?;
    let id = ArtifactId::new("local", artifact.contract_name.clone());
    Ok(EcosystemContract::new(id, artifact, None))
}

/// `rollback(bytes4,address)` of the exchange proxy.
pub const ROLLBACK_SELECTOR: FixedBytes<4> = FixedBytes(IZeroEx::rollbackCall::SELECTOR);
/// Confirmations required after the lockdown.
pub const LOCKDOWN_REQUIRED_CONFIRMATIONS: u64 = 2;
/// Time lock of all other governor calls after the lockdown, one day.
pub const LOCKDOWN_TIME_LOCK: u64 = 86_400;

pub struct LockdownGovernor {
    pub governor: Address,
    pub exchange_proxy: Address,
}

impl LockdownGovernor {
    /// Rollbacks become immediate, everything else needs two confirmations
    /// and a day.
    pub fn calls(&self) -> Vec<GovernorCall> {
        vec![
            GovernorCall::new(
                self.governor,
                &IZeroExGovernor::registerFunctionCallCall {
                    hasCustomTimeLock: true,
                    functionSelector: ROLLBACK_SELECTOR,
                    destination: self.exchange_proxy,
                    newSecondsTimeLocked: 0,
                },
            ),
            GovernorCall::new(
                self.governor,
                &IZeroExGovernor::changeRequirementCall {
                    _required: U256::from(LOCKDOWN_REQUIRED_CONFIRMATIONS),
                },
            ),
            GovernorCall::new(
                self.governor,
                &IZeroExGovernor::changeTimeLockCall {
                    _secondsTimeLocked: U256::from(LOCKDOWN_TIME_LOCK),
                },
            ),
        ]
    }

    async fn check(&self, ctx: &SenderContext) -> Result<()> {
        let time_lock = ctx
            .call_sol(self.governor, &IZeroExGovernor::secondsTimeLockedCall {})
            .await?;
        anyhow::ensure!(
            time_lock == U256::from(LOCKDOWN_TIME_LOCK),
            "governor time lock is {time_lock}"
        );
        let rollback = ctx
            .call_sol(
                self.governor,
                &IZeroExGovernor::functionCallTimeLocksCall {
                    functionSelector: ROLLBACK_SELECTOR,
                    destination: self.exchange_proxy,
                },
            )
            .await?;
        anyhow::ensure!(
            rollback.hasCustomTimeLock && rollback.secondsTimeLocked == 0,
            "rollback time lock is not lifted"
        );
        let required = ctx
            .call_sol(self.governor, &IZeroExGovernor::requiredCall {})
            .await?;
        anyhow::ensure!(
            required == U256::from(LOCKDOWN_REQUIRED_CONFIRMATIONS),
            "governor requires {required} confirmations"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl Migration for LockdownGovernor {
    async fn run(&self, ctx: &SenderContext) -> Result<()> {
        let calldata = governor::encode_calls(&self.calls());
        tracing::info!(governor = ?self.governor, %calldata, "governor calldata");
        println!("{calldata}");

        if ctx.is_simulated() {
            multisig::Driver::new(ctx, self.governor)?
                .execute(calldata, None)
                .await?;
            self.check(ctx).await?;
            tracing::info!("governor locked down");
        }
        Ok(())
    }
}

pub struct RollbackCalldata {
    pub exchange_proxy: Address,
    pub tx: TxHash,
}

#[async_trait::async_trait]
impl Migration for RollbackCalldata {
    async fn run(&self, ctx: &SenderContext) -> Result<()> {
        let receipt = ctx
            .node()
            .receipt(self.tx)
            .await?
            .with_context(|| format!("transaction {:?} not found", self.tx))?;
        let calls = governor::rollback_calls(self.exchange_proxy, &receipt);
        tracing::info!(tx = ?self.tx, upgrades = calls.len(), "rolling back");
        println!("{}", governor::encode_calls(&calls));
        Ok(())
    }
}

/// Contracts to verify, as listed in a manifest:
///
/// ```toml
/// [[contract]]
/// name = "zero-ex/ZeroEx"
/// address = "0xdef1c0ded9bec7f1a1670819833240f027b25eff"
/// args = ["0x0000000000000000000000000000000000000001"]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "contract")]
    pub contracts: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub name: String,
    pub address: Address,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid manifest {}", path.display()))
    }
}

pub struct Verify {
    pub manifest: Manifest,
}

#[async_trait::async_trait]
impl Migration for Verify {
    async fn run(&self, ctx: &SenderContext) -> Result<()> {
        for entry in &self.manifest.contracts {
            let contract = ctx.create_contract(&entry.name, Some(entry.address))?;
            let args = contract.parse_constructor_args(&entry.args)?;
            ctx.verify_queue().enqueue(DeploymentRecord {
                name: entry.name.clone(),
                address: entry.address,
                constructor_args: contract.encode_constructor_args(&args)?,
            });
        }
        Ok(())
    }
}
