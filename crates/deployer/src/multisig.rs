//! Drives a governor transaction from submission to execution on a
//! simulated chain by impersonating the governor's signers.

use {
    crate::{node::Receipt, receipt, sender::SenderContext},
    alloy::primitives::{Address, Bytes, U256, utils::parse_ether},
    anyhow::{Context, Result},
    contracts::bindings::IZeroExGovernor,
};

/// Time locks up to this many seconds are not worth skipping.
const NEGLIGIBLE_TIME_LOCK: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("governor transactions can only be forced through on a simulated chain")]
    NotSimulated,
    #[error("no Submission event in {0:?}")]
    SubmissionEventMissing(alloy::primitives::TxHash),
    #[error("governor requires {required} confirmations but has only {signers} signers")]
    NotEnoughSigners { required: u64, signers: usize },
    #[error("governor transaction {0} was already executed")]
    AlreadyExecuted(U256),
    #[error("governor transaction {0} is not executable yet")]
    NotExecutable(U256),
    #[error("governor transaction {0} failed to execute")]
    ExecutionFailed(U256),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Created,
    Confirming,
    TimeLockElapsed,
    Executed,
}

/// A submitted governor transaction, tracked locally.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MultisigTransaction {
    pub id: U256,
    pub required_confirmations: u64,
    pub confirmations: u64,
    pub time_lock: u64,
    time_lock_elapsed: bool,
    executed: bool,
}

impl MultisigTransaction {
    /// A freshly submitted transaction, confirmed by its submitter.
    pub fn submitted(id: U256, required_confirmations: u64, time_lock: u64) -> Self {
        Self {
            id,
            required_confirmations,
            confirmations: 1,
            time_lock,
            time_lock_elapsed: time_lock <= NEGLIGIBLE_TIME_LOCK,
            executed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.executed {
            Phase::Executed
        } else if self.needs_confirmation() {
            if self.confirmations <= 1 {
                Phase::Created
            } else {
                Phase::Confirming
            }
        } else if self.time_lock_elapsed {
            Phase::TimeLockElapsed
        } else {
            Phase::Confirming
        }
    }

    pub fn needs_confirmation(&self) -> bool {
        self.confirmations < self.required_confirmations
    }

    pub fn confirm(&mut self) -> Result<(), Error> {
        if self.executed {
            return Err(Error::AlreadyExecuted(self.id));
        }
        self.confirmations += 1;
        Ok(())
    }

    /// Whether the clock has to be advanced before executing.
    pub fn needs_time_travel(&self) -> bool {
        !self.time_lock_elapsed
    }

    pub fn elapse_time_lock(&mut self) {
        self.time_lock_elapsed = true;
    }

    pub fn is_executable(&self) -> bool {
        !self.executed && !self.needs_confirmation() && self.time_lock_elapsed
    }

    pub fn execute(&mut self) -> Result<(), Error> {
        if self.executed {
            return Err(Error::AlreadyExecuted(self.id));
        }
        if !self.is_executable() {
            return Err(Error::NotExecutable(self.id));
        }
        self.executed = true;
        Ok(())
    }
}

/// Ether given to every signer for gas.
const SIGNER_FUNDS: &str = "2";

pub struct Driver<'a> {
    ctx: &'a SenderContext,
    governor: Address,
}

impl<'a> Driver<'a> {
    pub fn new(ctx: &'a SenderContext, governor: Address) -> Result<Self, Error> {
        if !ctx.is_simulated() {
            return Err(Error::NotSimulated);
        }
        Ok(Self { ctx, governor })
    }

    /// Submits `calldata` as a call of the governor to itself, confirms it
    /// with as many signers as required, skips the time lock and executes
    /// it. Signers default to the governor's owners.
    pub async fn execute(
        &self,
        calldata: Bytes,
        signers: Option<Vec<Address>>,
    ) -> Result<MultisigTransaction> {
        let required = self
            .ctx
            .call_sol(self.governor, &IZeroExGovernor::requiredCall {})
            .await?;
        let required = u64::try_from(required).context("required confirmations overflow")?;
        let time_lock = self
            .ctx
            .call_sol(self.governor, &IZeroExGovernor::secondsTimeLockedCall {})
            .await?;
        let time_lock = u64::try_from(time_lock).context("time lock overflow")?;
        let signers = match signers {
            Some(signers) => signers,
            None => {
                self.ctx
                    .call_sol(self.governor, &IZeroExGovernor::getOwnersCall {})
                    .await?
            }
        };
        let submitter = *signers.first().ok_or(Error::NotEnoughSigners {
            required,
            signers: 0,
        })?;
        if (signers.len() as u64) < required {
            return Err(Error::NotEnoughSigners {
                required,
                signers: signers.len(),
            }
            .into());
        }

        let funds = parse_ether(SIGNER_FUNDS)?;
        for signer in &signers {
            self.ctx.node().impersonate(*signer).await?;
            self.ctx.fund(*signer, funds).await?;
        }
        let options = self.ctx.send_options().await?;

        let receipt = self
            .ctx
            .send_sol(
                self.governor,
                &IZeroExGovernor::submitTransactionCall {
                    destination: self.governor,
                    value: U256::ZERO,
                    data: calldata,
                },
                &options.with_from(submitter),
            )
            .await?;
        let id = receipt::first::<IZeroExGovernor::Submission>(&receipt)
            .ok_or(Error::SubmissionEventMissing(receipt.transaction_hash))?
            .transactionId;
        let mut tx = MultisigTransaction::submitted(id, required, time_lock);
        tracing::info!(%id, governor = ?self.governor, "submitted governor transaction");

        for signer in signers.iter().skip(1) {
            if !tx.needs_confirmation() {
                break;
            }
            tracing::info!(
                %id,
                ?signer,
                "confirming governor transaction ({}/{})",
                tx.confirmations + 1,
                required
            );
            self.ctx
                .send_sol(
                    self.governor,
                    &IZeroExGovernor::confirmTransactionCall { transactionId: id },
                    &options.with_from(*signer),
                )
                .await?;
            tx.confirm()?;
        }

        if tx.needs_time_travel() {
            tracing::info!(%id, seconds = time_lock, "skipping time lock");
            self.ctx.node().increase_time(time_lock).await?;
            tx.elapse_time_lock();
        }

        if !tx.is_executable() {
            return Err(Error::NotExecutable(id).into());
        }
        let receipt = self
            .ctx
            .send_sol(
                self.governor,
                &IZeroExGovernor::executeTransactionCall { transactionId: id },
                &options.with_from(submitter),
            )
            .await?;
        check_execution(id, &receipt)?;
        tx.execute()?;
        tracing::info!(%id, gas_used = receipt.gas_used, "executed governor transaction");
        Ok(tx)
    }
}

/// The governor reports a failed call through an event rather than a revert.
fn check_execution(id: U256, receipt: &Receipt) -> Result<(), Error> {
    let failed = receipt::events::<IZeroExGovernor::ExecutionFailure>(receipt)
        .iter()
        .any(|failure| failure.transactionId == id);
    if failed {
        return Err(Error::ExecutionFailed(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            node::MockNode,
            receipt::tests::log,
            sender::tests::{Artifacts, context},
        },
        alloy::{
            rpc::types::TransactionRequest,
            sol_types::{SolCall, SolValue},
        },
        parking_lot::Mutex,
        std::sync::Arc,
    };

    const GOVERNOR: Address = Address::new([0x60; 20]);
    const A: Address = Address::new([0x0a; 20]);
    const B: Address = Address::new([0x0b; 20]);
    const C: Address = Address::new([0x0c; 20]);

    fn selector(tx: &TransactionRequest) -> [u8; 4] {
        let input = tx.input.input().cloned().unwrap_or_default();
        input[..4].try_into().unwrap()
    }

    /// A governor with owners A, B and C.
    fn governor(
        required: u64,
        time_lock: u64,
        execution_fails: bool,
    ) -> (MockNode, Arc<Mutex<Vec<(Address, [u8; 4])>>>) {
        let mut node = MockNode::new();
        node.expect_call().returning(move |tx| {
            let selector = selector(&tx);
            let output = if selector == IZeroExGovernor::requiredCall::SELECTOR {
                U256::from(required).abi_encode()
            } else if selector == IZeroExGovernor::secondsTimeLockedCall::SELECTOR {
                U256::from(time_lock).abi_encode()
            } else if selector == IZeroExGovernor::getOwnersCall::SELECTOR {
                (vec![A, B, C],).abi_encode_params()
            } else {
                panic!("unexpected call {selector:?}")
            };
            Ok(output.into())
        });
        node.expect_impersonate().returning(|_| Ok(()));
        node.expect_balance().returning(|_| Ok(U256::ZERO));
        node.expect_set_balance().returning(|_, _| Ok(()));
        node.expect_gas_price().returning(|| Ok(1));

        let sent = Arc::new(Mutex::new(Vec::new()));
        let log_sent = sent.clone();
        node.expect_send().returning(move |tx, _| {
            let selector = selector(&tx);
            log_sent.lock().push((tx.from.unwrap(), selector));
            let id = U256::from(42);
            let logs = if selector == IZeroExGovernor::submitTransactionCall::SELECTOR {
                vec![log(GOVERNOR, &IZeroExGovernor::Submission { transactionId: id })]
            } else if selector == IZeroExGovernor::executeTransactionCall::SELECTOR {
                if execution_fails {
                    vec![log(
                        GOVERNOR,
                        &IZeroExGovernor::ExecutionFailure { transactionId: id },
                    )]
                } else {
                    vec![log(GOVERNOR, &IZeroExGovernor::Execution { transactionId: id })]
                }
            } else {
                vec![]
            };
            Ok(Receipt {
                status: true,
                logs,
                ..Default::default()
            })
        });
        (node, sent)
    }

    #[tokio::test]
    async fn submits_confirms_and_executes() {
        let (node, sent) = governor(2, 0, false);
        let ctx = context(node, true, Artifacts::default());

        let tx = Driver::new(&ctx, GOVERNOR)
            .unwrap()
            .execute(Bytes::from(vec![1, 2, 3]), None)
            .await
            .unwrap();
        assert_eq!(tx.id, U256::from(42));
        assert_eq!(tx.confirmations, 2);
        assert_eq!(tx.phase(), Phase::Executed);
        assert_eq!(
            *sent.lock(),
            vec![
                (A, IZeroExGovernor::submitTransactionCall::SELECTOR),
                (B, IZeroExGovernor::confirmTransactionCall::SELECTOR),
                (A, IZeroExGovernor::executeTransactionCall::SELECTOR),
            ]
        );
    }

    #[tokio::test]
    async fn skips_time_lock() {
        let (mut node, _) = governor(1, 86400, false);
        node.expect_increase_time()
            .withf(|seconds| *seconds == 86400)
            .times(1)
            .returning(|_| Ok(()));
        let ctx = context(node, true, Artifacts::default());

        Driver::new(&ctx, GOVERNOR)
            .unwrap()
            .execute(Bytes::new(), Some(vec![C]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reports_failed_execution() {
        let (node, _) = governor(1, 0, true);
        let ctx = context(node, true, Artifacts::default());

        let err = Driver::new(&ctx, GOVERNOR)
            .unwrap()
            .execute(Bytes::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ExecutionFailed(_))
        ));
    }

    #[tokio::test]
    async fn requires_enough_signers() {
        let (node, sent) = governor(3, 0, false);
        let ctx = context(node, true, Artifacts::default());

        let err = Driver::new(&ctx, GOVERNOR)
            .unwrap()
            .execute(Bytes::new(), Some(vec![A, B]))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotEnoughSigners {
                required: 3,
                signers: 2
            })
        ));
        assert!(sent.lock().is_empty());
    }

    #[test]
    fn live_networks_are_refused() {
        let ctx = context(MockNode::new(), false, Artifacts::default());
        assert!(matches!(
            Driver::new(&ctx, GOVERNOR),
            Err(Error::NotSimulated)
        ));
    }

    #[test]
    fn lifecycle() {
        let mut tx = MultisigTransaction::submitted(U256::from(1), 2, 0);
        assert_eq!(tx.phase(), Phase::Created);
        assert!(!tx.is_executable());
        assert!(matches!(tx.execute(), Err(Error::NotExecutable(_))));

        tx.confirm().unwrap();
        assert_eq!(tx.phase(), Phase::TimeLockElapsed);
        assert!(tx.is_executable());

        tx.execute().unwrap();
        assert_eq!(tx.phase(), Phase::Executed);
        assert!(matches!(tx.execute(), Err(Error::AlreadyExecuted(_))));
        assert!(matches!(tx.confirm(), Err(Error::AlreadyExecuted(_))));
    }

    #[test]
    fn time_lock_blocks_execution() {
        let mut tx = MultisigTransaction::submitted(U256::from(1), 1, 3600);
        assert!(tx.needs_time_travel());
        assert_eq!(tx.phase(), Phase::Confirming);
        assert!(matches!(tx.execute(), Err(Error::NotExecutable(_))));

        tx.elapse_time_lock();
        assert_eq!(tx.phase(), Phase::TimeLockElapsed);
        tx.execute().unwrap();

        // A one second lock is not worth advancing the clock for.
        assert!(!MultisigTransaction::submitted(U256::from(2), 1, 1).needs_time_travel());
    }
}
