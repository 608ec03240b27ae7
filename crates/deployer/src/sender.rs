use {
    crate::{
        deploy,
        ecosystem::EcosystemContract,
        gas::{self, SendOptions},
        node::{Node, Receipt},
        verify::VerifyQueue,
    },
    alloy::{
        dyn_abi::DynSolValue,
        network::TransactionBuilder,
        primitives::{Address, Bytes, U256},
        rpc::types::TransactionRequest,
        sol_types::SolCall,
    },
    anyhow::{Context, Result},
    chain::Network,
    contracts::{ArtifactId, ArtifactStore},
    std::sync::Arc,
};

/// How a run sends its transactions.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    pub sender: Address,
    /// Running against a local fork rather than the live network.
    pub simulated: bool,
    /// Gas price override in wei.
    pub tip: Option<u128>,
    pub gas_limit: Option<u64>,
}

/// The chain connection and signing identity of one run, along with the
/// deployments it made that still need to be verified.
pub struct SenderContext {
    node: Arc<dyn Node>,
    network: &'static Network,
    artifacts: Arc<dyn ArtifactStore>,
    config: Config,
    verify_queue: VerifyQueue,
}

impl SenderContext {
    /// Resolves the network the node is on.
    pub async fn connect(
        node: Arc<dyn Node>,
        artifacts: Arc<dyn ArtifactStore>,
        config: Config,
    ) -> Result<Self> {
        let chain_id = node.chain_id().await.context("failed to query chain id")?;
        let network = chain::resolve(chain_id)?;
        Ok(Self::new(node, network, artifacts, config))
    }

    pub fn new(
        node: Arc<dyn Node>,
        network: &'static Network,
        artifacts: Arc<dyn ArtifactStore>,
        config: Config,
    ) -> Self {
        Self {
            node,
            network,
            artifacts,
            config,
            verify_queue: VerifyQueue::default(),
        }
    }

    pub fn node(&self) -> &dyn Node {
        self.node.as_ref()
    }

    pub fn network(&self) -> &'static Network {
        self.network
    }

    pub fn artifacts(&self) -> &Arc<dyn ArtifactStore> {
        &self.artifacts
    }

    pub fn sender(&self) -> Address {
        self.config.sender
    }

    pub fn is_simulated(&self) -> bool {
        self.config.simulated
    }

    /// Confirmations to wait for after every transaction.
    pub fn confirmations(&self) -> u64 {
        if self.config.simulated { 0 } else { 1 }
    }

    pub fn verify_queue(&self) -> &VerifyQueue {
        &self.verify_queue
    }

    /// Options for sending from the sender at current gas prices.
    pub async fn send_options(&self) -> Result<SendOptions, gas::Error> {
        let strategy = gas::Strategy {
            simulated: self.config.simulated,
            tip: self.config.tip,
        };
        let price = strategy.price(self.node(), self.network).await?;
        tracing::debug!(?price, "priced transaction");
        Ok(SendOptions {
            from: self.config.sender,
            gas_limit: self.config.gas_limit,
            price,
        })
    }

    /// A handle on the ecosystem contract `<family>/<contractName>`.
    pub fn create_contract(
        &self,
        name: &str,
        address: Option<Address>,
    ) -> Result<EcosystemContract> {
        let id = name.parse::<ArtifactId>()?;
        let artifact = self.artifacts.resolve(&id)?;
        Ok(EcosystemContract::new(id, artifact, address))
    }

    /// Sends a transaction and waits for it to be confirmed. Creates a
    /// contract if `to` is `None`. A reverted transaction is an error.
    pub async fn transact(
        &self,
        to: Option<Address>,
        data: Bytes,
        options: &SendOptions,
    ) -> Result<Receipt> {
        let tx = match to {
            Some(to) => TransactionRequest::default().with_to(to).with_input(data),
            None => TransactionRequest::default().with_deploy_code(data),
        };
        let receipt = self
            .node
            .send(options.apply(tx), self.confirmations())
            .await?;
        tracing::debug!(
            hash = ?receipt.transaction_hash,
            gas_used = receipt.gas_used,
            "transaction mined"
        );
        if !receipt.status {
            return Err(deploy::Error::Reverted(receipt.transaction_hash).into());
        }
        Ok(receipt)
    }

    pub async fn send(
        &self,
        contract: &EcosystemContract,
        function: &str,
        args: &[DynSolValue],
        options: &SendOptions,
    ) -> Result<Receipt> {
        let data = contract.encode_call(function, args)?;
        self.transact(Some(contract.address()?), data, options).await
    }

    pub async fn call(
        &self,
        contract: &EcosystemContract,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>> {
        let data = contract.encode_call(function, args)?;
        let output = self.node.call(self.request(contract.address()?, data)).await?;
        Ok(contract.decode_output(function, args.len(), &output)?)
    }

    /// `eth_call` of a function with a fixed ABI.
    pub async fn call_sol<C: SolCall + Sync>(&self, to: Address, call: &C) -> Result<C::Return> {
        let output = self
            .node
            .call(self.request(to, call.abi_encode().into()))
            .await?;
        C::abi_decode_returns(&output)
            .with_context(|| format!("failed to decode {} output", C::SIGNATURE))
    }

    pub async fn send_sol<C: SolCall + Sync>(
        &self,
        to: Address,
        call: &C,
        options: &SendOptions,
    ) -> Result<Receipt> {
        self.transact(Some(to), call.abi_encode().into(), options)
            .await
    }

    /// Credits `amount` wei to an account. Simulated chains only.
    pub async fn fund(&self, account: Address, amount: U256) -> Result<()> {
        anyhow::ensure!(self.is_simulated(), "cannot mint ether on a live network");
        let balance = self.node.balance(account).await?;
        self.node
            .set_balance(account, balance.saturating_add(amount))
            .await
    }

    fn request(&self, to: Address, data: Bytes) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.config.sender)
            .with_to(to)
            .with_input(data)
    }
}
