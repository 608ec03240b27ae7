//! Contract deployments. Every successful deployment is queued for source
//! verification.

use {
    crate::{
        ecosystem::EcosystemContract,
        gas::SendOptions,
        node::Receipt,
        receipt,
        sender::SenderContext,
        verify::DeploymentRecord,
    },
    alloy::{
        dyn_abi::DynSolValue,
        primitives::{Address, Bytes, TxHash},
    },
    anyhow::Result,
    contracts::bindings::ITransformerDeployer,
};

/// Artifact family transformers are published in.
pub const TRANSFORMER_FAMILY: &str = "zero-ex";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transaction {0:?} reverted")]
    Reverted(TxHash),
    #[error("deployment of {name} in {hash:?} did not create a contract")]
    MissingContractAddress { name: String, hash: TxHash },
    #[error("no Deployed event in {0:?}, the transformer deployer does not match")]
    DeployedEventMissing(TxHash),
    #[error("vanity deployer emitted no event in {0:?}")]
    MissingVanityEvent(TxHash),
}

impl SenderContext {
    /// Deploys `<family>/<contractName>` from the sender at current gas prices.
    pub async fn deploy_contract(
        &self,
        name: &str,
        args: &[DynSolValue],
    ) -> Result<(EcosystemContract, Receipt)> {
        let options = self.send_options().await?;
        self.deploy_contract_with(name, args, &options).await
    }

    pub async fn deploy_contract_with(
        &self,
        name: &str,
        args: &[DynSolValue],
        options: &SendOptions,
    ) -> Result<(EcosystemContract, Receipt)> {
        let contract = self.create_contract(name, None)?;
        let constructor_args = contract.encode_constructor_args(args)?;
        let code = contract.encode_deploy(args)?;

        tracing::info!(%name, from = ?options.from, "deploying");
        let receipt = self.transact(None, code, options).await?;
        let address = receipt
            .contract_address
            .ok_or_else(|| Error::MissingContractAddress {
                name: name.to_owned(),
                hash: receipt.transaction_hash,
            })?;
        tracing::info!(%name, ?address, gas_used = receipt.gas_used, "deployed");

        self.queue(name, address, constructor_args);
        Ok((contract.deployed_at(address), receipt))
    }

    /// Deploys the transformer `zero-ex/<transformer>` through the
    /// transformer deployer and returns its address.
    pub async fn deploy_transformer(
        &self,
        deployer: &EcosystemContract,
        transformer: &str,
        args: &[DynSolValue],
    ) -> Result<Address> {
        let options = self.send_options().await?;
        self.deploy_transformer_with(deployer, transformer, args, &options)
            .await
    }

    /// [`Self::deploy_transformer`] sent with explicit `options`.
    pub async fn deploy_transformer_with(
        &self,
        deployer: &EcosystemContract,
        transformer: &str,
        args: &[DynSolValue],
        options: &SendOptions,
    ) -> Result<Address> {
        let name = format!("{TRANSFORMER_FAMILY}/{transformer}");
        let contract = self.create_contract(&name, None)?;
        let constructor_args = contract.encode_constructor_args(args)?;
        let bytecode = contract.encode_deploy(args)?;

        tracing::info!(%name, deployer = ?deployer.address()?, "deploying transformer");
        let receipt = self
            .send_sol(
                deployer.address()?,
                &ITransformerDeployer::deployCall { bytecode },
                options,
            )
            .await?;
        let deployed = receipt::first::<ITransformerDeployer::Deployed>(&receipt)
            .ok_or(Error::DeployedEventMissing(receipt.transaction_hash))?;
        tracing::info!(
            %name,
            address = ?deployed.deployedAddress,
            nonce = %deployed.nonce,
            gas_used = receipt.gas_used,
            "deployed transformer"
        );

        self.queue(&name, deployed.deployedAddress, constructor_args);
        Ok(deployed.deployedAddress)
    }

    /// Deploys `target` through the vanity deployer `deployer`, which
    /// creates the target from the creation code it is constructed with.
    /// Sent with `options`, whose sender is the vanity deployer key.
    pub async fn deploy_vanity(
        &self,
        deployer: &EcosystemContract,
        target: &str,
        args: &[DynSolValue],
        options: &SendOptions,
    ) -> Result<(EcosystemContract, Receipt)> {
        let contract = self.create_contract(target, None)?;
        let constructor_args = contract.encode_constructor_args(args)?;
        let creation_code = contract.encode_deploy(args)?;
        let code = deployer.encode_deploy(&[DynSolValue::Bytes(creation_code.to_vec())])?;

        tracing::info!(
            name = %target,
            from = ?options.from,
            "deploying through vanity deployer"
        );
        let receipt = self.transact(None, code, options).await?;
        let address = vanity_address(&receipt)?;
        tracing::info!(name = %target, ?address, gas_used = receipt.gas_used, "deployed");

        self.queue(target, address, constructor_args);
        Ok((contract.deployed_at(address), receipt))
    }

    fn queue(&self, name: &str, address: Address, constructor_args: Bytes) {
        self.verify_queue().enqueue(DeploymentRecord {
            name: name.to_owned(),
            address,
            constructor_args,
        });
    }
}

/// The address in the first data word of the first log, which is the only
/// event the vanity deployer emits. The log has to come from the vanity
/// deployer the transaction created and carry data.
pub fn vanity_address(receipt: &Receipt) -> Result<Address, Error> {
    let missing = || Error::MissingVanityEvent(receipt.transaction_hash);
    let log = receipt.logs.first().ok_or_else(missing)?;
    if receipt
        .contract_address
        .is_some_and(|deployer| deployer != log.address)
    {
        return Err(missing());
    }
    let data = log.data.data.as_ref();
    if data.is_empty() {
        return Err(missing());
    }
    let word = &data[..data.len().min(32)];
    let len = word.len().min(20);
    let mut address = [0_u8; 20];
    address[20 - len..].copy_from_slice(&word[word.len() - len..]);
    Ok(Address::from(address))
}
