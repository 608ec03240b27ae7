pub mod arguments;
pub mod deploy;
pub mod ecosystem;
pub mod gas;
pub mod governor;
pub mod migrations;
pub mod multisig;
pub mod node;
pub mod receipt;
pub mod run;
pub mod sender;
pub mod verify;

use {
    crate::{
        arguments::{Arguments, Command},
        migrations::{
            Deploy,
            DeployTransformer,
            DeployVanity,
            LockdownGovernor,
            Manifest,
            RollbackCalldata,
            Verify,
        },
        node::RpcNode,
        run::{Confirmation, Interactive, Migration, Unattended, Verification},
        sender::{Config, SenderContext},
        verify::{Explorer, Verifier},
    },
    anyhow::{Context, Result},
    clap::Parser,
    contracts::Fallback,
    std::{process::ExitCode, sync::Arc},
    tracing::level_filters::LevelFilter,
};

pub async fn start(args: impl IntoIterator<Item = String>) -> ExitCode {
    let args = Arguments::parse_from(args);
    observe::tracing::initialize(&args.log_filter, LevelFilter::WARN);
    tracing::info!("running deployer with validated arguments:\n{}", args);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(?err, "deployer failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Arguments) -> Result<()> {
    let rpc = args
        .rpc()
        .cloned()
        .context("one of --node-rpc or --fork-rpc is required")?;
    let mut signers = vec![args.sender_key.clone()];
    signers.extend(args.vanity_deployer_key.clone());
    let node = RpcNode::new(rpc, args.fee_rpc().cloned(), signers)?;
    let artifacts = Arc::new(Fallback::packages(&args.artifacts_dir));
    let ctx = SenderContext::connect(
        Arc::new(node),
        artifacts,
        Config {
            sender: args.sender_key.address(),
            simulated: args.is_simulated(),
            tip: args.tip,
            gas_limit: args.gas_limit,
        },
    )
    .await?;

    let verification = verification(&args, &ctx)?;

    let migration: Box<dyn Migration> = match args.command {
        Command::Deploy { name, args } => Box::new(Deploy { name, args }),
        Command::DeployTransformer {
            deployer,
            name,
            args,
        } => Box::new(DeployTransformer {
            deployer,
            name,
            args,
        }),
        Command::DeployVanity {
            deployer_artifact,
            name,
            args: constructor_args,
        } => {
            let key = args
                .vanity_deployer_key
                .as_ref()
                .context("deploy-vanity needs --vanity-deployer-key")?;
            Box::new(DeployVanity {
                deployer_artifact,
                vanity_deployer: key.address(),
                name,
                args: constructor_args,
            })
        }
        Command::LockdownGovernor {
            governor,
            exchange_proxy,
        } => Box::new(LockdownGovernor {
            governor,
            exchange_proxy,
        }),
        Command::RollbackCalldata { exchange_proxy, tx } => {
            Box::new(RollbackCalldata { exchange_proxy, tx })
        }
        Command::Verify { manifest } => Box::new(Verify {
            manifest: Manifest::from_file(&manifest)?,
        }),
    };

    let confirmation: Box<dyn Confirmation> = if args.yes {
        Box::new(Unattended)
    } else {
        Box::new(Interactive)
    };

    run::enter(
        &ctx,
        migration.as_ref(),
        confirmation.as_ref(),
        verification.as_ref(),
    )
    .await?;
    Ok(())
}

/// Source verification for the commands that deploy or verify contracts on a
/// live network with an explorer. Only those need an explorer API key.
fn verification(args: &Arguments, ctx: &SenderContext) -> Result<Option<Verification>> {
    if !args.command.queues_deployments() || ctx.is_simulated() {
        return Ok(None);
    }
    let network = ctx.network();
    if network.explorer_api_url.is_none() {
        return Ok(None);
    }
    let api_key = args
        .explorer_keys
        .for_network(network.name)
        .with_context(|| format!("no explorer API key for {network}"))?;
    Ok(Some(Verification {
        verifier: Verifier::new(
            Arc::new(Explorer::new(args.explorer_timeout)?),
            ctx.artifacts().clone(),
            network,
            api_key.to_owned(),
        ),
        delay: args.verify_delay,
    }))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            arguments::tests::parse,
            node::MockNode,
            sender::tests::{Artifacts, context},
        },
    };

    const PROXY: &str = "0x0000000000000000000000000000000000000001";

    fn rollback(keys: &[&str]) -> Arguments {
        let mut args = keys.to_vec();
        args.extend([
            "rollback-calldata",
            "--exchange-proxy",
            PROXY,
            "--tx",
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        ]);
        parse(&args)
    }

    fn deploy(keys: &[&str]) -> Arguments {
        let mut args = keys.to_vec();
        args.extend(["deploy", "zero-ex/ZeroEx", PROXY]);
        parse(&args)
    }

    #[test]
    fn governance_commands_do_not_need_an_explorer_key() {
        let ctx = context(MockNode::new(), false, Artifacts::default());
        let mut args = rollback(&[]);
        args.explorer_keys = Default::default();
        assert!(verification(&args, &ctx).unwrap().is_none());
    }

    #[test]
    fn deployments_need_an_explorer_key() {
        let ctx = context(MockNode::new(), false, Artifacts::default());
        let mut args = deploy(&[]);
        args.explorer_keys = Default::default();
        let err = verification(&args, &ctx).err().unwrap();
        assert_eq!(err.to_string(), "no explorer API key for bsc");

        let args = deploy(&["--bscscan-key", "key"]);
        assert!(verification(&args, &ctx).unwrap().is_some());
    }

    #[test]
    fn simulated_deployments_are_not_verified() {
        let ctx = context(MockNode::new(), true, Artifacts::default());
        let mut args = deploy(&[]);
        args.explorer_keys = Default::default();
        assert!(verification(&args, &ctx).unwrap().is_none());
    }
}
