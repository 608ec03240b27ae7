//! The chain connection. Everything the deployer does on chain goes through
//! the [`Node`] trait so that the orchestration can be exercised against a
//! mock.

use {
    alloy::{
        network::EthereumWallet,
        primitives::{Address, Bytes, Log, TxHash, U256},
        providers::{DynProvider, Provider, ProviderBuilder, ext::AnvilApi},
        rpc::types::{BlockNumberOrTag, TransactionReceipt, TransactionRequest},
        signers::local::PrivateKeySigner,
    },
    anyhow::{Context, Result},
    std::collections::HashSet,
    url::Url,
};

/// The parts of a mined transaction the deployer cares about.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    /// `false` if the transaction reverted.
    pub status: bool,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

impl From<TransactionReceipt> for Receipt {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            status: receipt.status(),
            contract_address: receipt.contract_address,
            gas_used: receipt.gas_used,
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        }
    }
}

#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait Node: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn gas_price(&self) -> Result<u128>;

    /// Base fee of the latest block. `None` if the chain does not report one.
    async fn base_fee(&self) -> Result<Option<u128>>;

    async fn max_priority_fee(&self) -> Result<u128>;

    async fn balance(&self, account: Address) -> Result<U256>;

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes>;

    /// Submits a transaction and waits until it has at least `confirmations`
    /// confirmations. Zero waits for inclusion only.
    async fn send(&self, tx: TransactionRequest, confirmations: u64) -> Result<Receipt>;

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>>;

    /// Lets the node sign transactions for an account it has no key for.
    /// Simulated chains only.
    async fn impersonate(&self, account: Address) -> Result<()>;

    /// Simulated chains only.
    async fn set_balance(&self, account: Address, balance: U256) -> Result<()>;

    /// Advances the clock of a simulated chain.
    async fn increase_time(&self, seconds: u64) -> Result<()>;
}

/// A [`Node`] talking JSON-RPC over HTTP.
pub struct RpcNode {
    signing: DynProvider,
    unsigned: DynProvider,
    fees: DynProvider,
    local: HashSet<Address>,
}

impl RpcNode {
    /// Connects to `url`. Transactions from one of `signers` are signed
    /// locally, transactions from any other account are handed to the node
    /// unsigned. Fee queries go to `fee_url` if set.
    pub fn new(url: Url, fee_url: Option<Url>, signers: Vec<PrivateKeySigner>) -> Result<Self> {
        let local = signers.iter().map(PrivateKeySigner::address).collect();
        let mut signers = signers.into_iter();
        let mut wallet = EthereumWallet::new(signers.next().context("no signing key")?);
        for signer in signers {
            wallet.register_signer(signer);
        }

        let signing = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url.clone())
            .erased();
        let unsigned = ProviderBuilder::new().connect_http(url).erased();
        let fees = match fee_url {
            Some(url) => ProviderBuilder::new().connect_http(url).erased(),
            None => unsigned.clone(),
        };

        Ok(Self {
            signing,
            unsigned,
            fees,
            local,
        })
    }
}

#[async_trait::async_trait]
impl Node for RpcNode {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.unsigned.get_chain_id().await?)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.unsigned.get_gas_price().await?)
    }

    async fn base_fee(&self) -> Result<Option<u128>> {
        let block = self
            .fees
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .context("latest block not found")?;
        Ok(block.header.base_fee_per_gas.map(u128::from))
    }

    async fn max_priority_fee(&self) -> Result<u128> {
        Ok(self.fees.get_max_priority_fee_per_gas().await?)
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        Ok(self.unsigned.get_balance(account).await?)
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
        Ok(self.unsigned.call(tx).await?)
    }

    async fn send(&self, tx: TransactionRequest, confirmations: u64) -> Result<Receipt> {
        let from = tx.from.context("transaction has no sender")?;
        let provider = if self.local.contains(&from) {
            &self.signing
        } else {
            &self.unsigned
        };
        let pending = provider
            .send_transaction(tx)
            .await
            .context("failed to submit transaction")?;
        tracing::debug!(hash = ?pending.tx_hash(), ?from, "submitted transaction");
        let receipt = pending
            .with_required_confirmations(confirmations.max(1))
            .get_receipt()
            .await
            .context("failed to wait for transaction receipt")?;
        Ok(receipt.into())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
        let receipt = self.unsigned.get_transaction_receipt(hash).await?;
        Ok(receipt.map(Into::into))
    }

    async fn impersonate(&self, account: Address) -> Result<()> {
        Ok(self.unsigned.anvil_impersonate_account(account).await?)
    }

    async fn set_balance(&self, account: Address, balance: U256) -> Result<()> {
        Ok(self.unsigned.anvil_set_balance(account, balance).await?)
    }

    async fn increase_time(&self, seconds: u64) -> Result<()> {
        self.unsigned.anvil_increase_time(seconds).await?;
        Ok(())
    }
}
