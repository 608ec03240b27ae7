use {
    crate::{
        sender::SenderContext,
        verify::{Outcome, Verifier},
    },
    alloy::primitives::{
        U256,
        utils::{format_ether, parse_ether},
    },
    anyhow::Result,
    std::time::Duration,
};

/// Ether credited to the sender on a simulated chain.
const SIMULATION_FUNDS: &str = "10";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("User did not confirm action")]
    NotConfirmed,
}

/// A sequence of on-chain steps run from one sender.
#[async_trait::async_trait]
pub trait Migration: Send + Sync {
    async fn run(&self, ctx: &SenderContext) -> Result<()>;
}

/// Asks the operator before anything is sent.
pub trait Confirmation: Send + Sync {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Confirms without asking.
pub struct Unattended;

impl Confirmation for Unattended {
    fn confirm(&self, _: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Asks on the terminal.
pub struct Interactive;

impl Confirmation for Interactive {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        Ok(dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?)
    }
}

/// Source verification of a run's deployments.
pub struct Verification {
    pub verifier: Verifier,
    /// Pause before every submission.
    pub delay: Duration,
}

/// Runs a migration from the context's sender and returns what it cost the
/// sender. Deployments are verified afterwards unless the run is simulated.
pub async fn enter(
    ctx: &SenderContext,
    migration: &dyn Migration,
    confirmation: &dyn Confirmation,
    verification: Option<&Verification>,
) -> Result<U256> {
    let prompt = format!(
        "This will execute the transactions from the account {:?} on network {}{}. Continue?",
        ctx.sender(),
        ctx.network(),
        if ctx.is_simulated() { " (SIMULATED)" } else { "" },
    );
    if !confirmation.confirm(&prompt)? {
        return Err(Error::NotConfirmed.into());
    }

    if ctx.is_simulated() {
        ctx.fund(ctx.sender(), parse_ether(SIMULATION_FUNDS)?)
            .await?;
    }
    let starting_balance = ctx.node().balance(ctx.sender()).await?;

    migration.run(ctx).await?;

    let ending_balance = ctx.node().balance(ctx.sender()).await?;
    let cost = starting_balance.saturating_sub(ending_balance);
    tracing::info!(
        network = %ctx.network(),
        sender = ?ctx.sender(),
        cost = %format_ether(cost),
        "total sender cost in ETH"
    );

    if !ctx.is_simulated() {
        drain(ctx, verification).await?;
    }
    Ok(cost)
}

async fn drain(ctx: &SenderContext, verification: Option<&Verification>) -> Result<()> {
    let Some(verification) = verification else {
        for record in ctx.verify_queue().take() {
            tracing::warn!(
                name = %record.name,
                address = ?record.address,
                "verification disabled, not verified"
            );
        }
        return Ok(());
    };
    let outcomes = ctx
        .verify_queue()
        .drain(&verification.verifier, verification.delay)
        .await?;
    let rejected = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Outcome::Rejected(_)))
        .count();
    if rejected > 0 {
        tracing::warn!(rejected, "some contracts need to be verified manually");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            node::MockNode,
            sender::tests::{Artifacts, SENDER, context},
            verify::{DeploymentRecord, MockVerificationApi},
        },
        alloy::primitives::{Address, Bytes},
        parking_lot::Mutex,
        std::sync::Arc,
    };

    struct Decline;

    impl Confirmation for Decline {
        fn confirm(&self, prompt: &str) -> Result<bool> {
            assert!(prompt.contains("bsc"));
            Ok(false)
        }
    }

    /// Spends `cost` wei and queues one deployment.
    struct Spend {
        balance: Arc<Mutex<U256>>,
        cost: U256,
    }

    #[async_trait::async_trait]
    impl Migration for Spend {
        async fn run(&self, ctx: &SenderContext) -> Result<()> {
            *self.balance.lock() -= self.cost;
            ctx.verify_queue().enqueue(DeploymentRecord {
                name: "zero-ex/ZeroEx".to_owned(),
                address: Address::repeat_byte(1),
                constructor_args: Bytes::new(),
            });
            Ok(())
        }
    }

    fn node(balance: Arc<Mutex<U256>>) -> MockNode {
        let mut node = MockNode::new();
        let read = balance.clone();
        node.expect_balance()
            .withf(|account| *account == SENDER)
            .returning(move |_| Ok(*read.lock()));
        node.expect_set_balance().returning(move |_, amount| {
            *balance.lock() = amount;
            Ok(())
        });
        node
    }

    #[tokio::test]
    async fn declining_aborts_before_anything_happens() {
        let ctx = context(MockNode::new(), false, Artifacts::default());
        let migration = Spend {
            balance: Default::default(),
            cost: U256::ZERO,
        };
        let err = enter(&ctx, &migration, &Decline, None).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotConfirmed)));
        assert_eq!(err.to_string(), "User did not confirm action");
    }

    #[tokio::test]
    async fn simulated_runs_fund_the_sender_and_skip_verification() {
        let balance = Arc::new(Mutex::new(U256::ZERO));
        let ctx = context(node(balance.clone()), true, Artifacts::default());
        let migration = Spend {
            balance: balance.clone(),
            cost: U256::from(1_000),
        };

        let cost = enter(&ctx, &migration, &Unattended, None).await.unwrap();
        assert_eq!(cost, U256::from(1_000));
        assert_eq!(
            *balance.lock(),
            parse_ether(SIMULATION_FUNDS).unwrap() - U256::from(1_000)
        );
        // Left for nobody: simulated deployments are never verified.
        assert_eq!(ctx.verify_queue().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn live_runs_drain_the_verify_queue() {
        let balance = Arc::new(Mutex::new(U256::from(5_000)));
        let ctx = context(node(balance.clone()), false, Artifacts::default());
        let migration = Spend {
            balance,
            cost: U256::from(2_000),
        };
        // The in-memory artifacts have no compiler inputs, so the explorer is
        // never reached and the drain fails on the first record.
        let verification = Verification {
            verifier: Verifier::new(
                Arc::new(MockVerificationApi::new()),
                ctx.artifacts().clone(),
                ctx.network(),
                String::new(),
            ),
            delay: Duration::from_secs(60),
        };

        let err = enter(&ctx, &migration, &Unattended, Some(&verification))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unable to find ZeroEx for zero-ex");
        assert!(ctx.verify_queue().is_empty());
    }
}
