use {
    crate::node::Node,
    alloy::{primitives::Address, rpc::types::TransactionRequest},
    chain::Network,
};

/// How a transaction pays for gas. Exactly one pricing mode is ever set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GasPrice {
    Legacy {
        gas_price: u128,
    },
    FeeMarket {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

/// Everything needed to submit a transaction besides its target and data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SendOptions {
    pub from: Address,
    pub gas_limit: Option<u64>,
    pub price: GasPrice,
}

impl SendOptions {
    /// The same options sent from a different account.
    pub fn with_from(self, from: Address) -> Self {
        Self { from, ..self }
    }

    pub fn apply(&self, mut tx: TransactionRequest) -> TransactionRequest {
        tx.from = Some(self.from);
        if let Some(gas) = self.gas_limit {
            tx.gas = Some(gas);
        }
        match self.price {
            GasPrice::Legacy { gas_price } => {
                tx.gas_price = Some(gas_price);
                tx.max_fee_per_gas = None;
                tx.max_priority_fee_per_gas = None;
            }
            GasPrice::FeeMarket {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                tx.gas_price = None;
                tx.max_fee_per_gas = Some(max_fee_per_gas);
                tx.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
            }
        }
        tx
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tip is less than minimum combined fee-market gas price ({tip} < {minimum})")]
    InsufficientTip { tip: u128, minimum: u128 },
    #[error(transparent)]
    Node(#[from] anyhow::Error),
}

/// Picks gas prices for the transactions of a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Strategy {
    /// Forked chains only understand legacy pricing.
    pub simulated: bool,
    /// Operator override in wei. Added to the gas price in legacy mode, used
    /// as the max fee in fee-market mode.
    pub tip: Option<u128>,
}

impl Strategy {
    pub async fn price(&self, node: &dyn Node, network: &Network) -> Result<GasPrice, Error> {
        if !network.eip1559 {
            return self.legacy(node).await;
        }
        let Some(base_fee) = node.base_fee().await? else {
            tracing::debug!(%network, "no base fee reported, using legacy pricing");
            return self.legacy(node).await;
        };
        let priority_fee = node.max_priority_fee().await?;
        self.fee_market(base_fee, priority_fee)
    }

    async fn legacy(&self, node: &dyn Node) -> Result<GasPrice, Error> {
        let gas_price = node.gas_price().await?;
        Ok(GasPrice::Legacy {
            gas_price: gas_price.saturating_add(self.tip.unwrap_or_default()),
        })
    }

    fn fee_market(&self, base_fee: u128, priority_fee: u128) -> Result<GasPrice, Error> {
        let minimum = base_fee.saturating_add(priority_fee);
        // 20% head room on the base fee.
        let mut max_fee_per_gas = priority_fee.saturating_add(base_fee.saturating_mul(6) / 5);
        if let Some(tip) = self.tip {
            if tip < minimum {
                return Err(Error::InsufficientTip { tip, minimum });
            }
            max_fee_per_gas = tip;
        }

        if self.simulated {
            return Ok(GasPrice::Legacy { gas_price: minimum });
        }
        Ok(GasPrice::FeeMarket {
            max_fee_per_gas,
            max_priority_fee_per_gas: priority_fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::node::MockNode};

    fn fee_market_node(base_fee: Option<u128>, priority_fee: u128) -> MockNode {
        let mut node = MockNode::new();
        node.expect_base_fee().returning(move || Ok(base_fee));
        node.expect_max_priority_fee()
            .returning(move || Ok(priority_fee));
        node
    }

    #[tokio::test]
    async fn buffers_base_fee() {
        let node = fee_market_node(Some(100), 10);
        let price = Strategy::default()
            .price(&node, &chain::MAINNET)
            .await
            .unwrap();
        assert_eq!(
            price,
            GasPrice::FeeMarket {
                max_fee_per_gas: 130,
                max_priority_fee_per_gas: 10,
            }
        );
    }

    #[tokio::test]
    async fn rejects_tip_below_minimum() {
        let node = fee_market_node(Some(100), 10);
        let strategy = Strategy {
            simulated: false,
            tip: Some(50),
        };
        let err = strategy.price(&node, &chain::MAINNET).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientTip {
                tip: 50,
                minimum: 110
            }
        ));

        // Rejected on forks too, before collapsing to a legacy price.
        let strategy = Strategy {
            simulated: true,
            tip: Some(50),
        };
        assert!(strategy.price(&node, &chain::MAINNET).await.is_err());
    }

    #[tokio::test]
    async fn tip_replaces_max_fee() {
        let node = fee_market_node(Some(100), 10);
        let strategy = Strategy {
            simulated: false,
            tip: Some(200),
        };
        let price = strategy.price(&node, &chain::MAINNET).await.unwrap();
        assert_eq!(
            price,
            GasPrice::FeeMarket {
                max_fee_per_gas: 200,
                max_priority_fee_per_gas: 10,
            }
        );
    }

    #[tokio::test]
    async fn simulated_fee_market_collapses_to_legacy() {
        let node = fee_market_node(Some(100), 10);
        let strategy = Strategy {
            simulated: true,
            tip: None,
        };
        let price = strategy.price(&node, &chain::MAINNET).await.unwrap();
        assert_eq!(price, GasPrice::Legacy { gas_price: 110 });
    }

    #[tokio::test]
    async fn legacy_networks_add_tip() {
        let mut node = MockNode::new();
        node.expect_gas_price().returning(|| Ok(1_000));
        let strategy = Strategy {
            simulated: false,
            tip: Some(5),
        };
        let price = strategy.price(&node, &chain::BSC).await.unwrap();
        assert_eq!(price, GasPrice::Legacy { gas_price: 1_005 });

        let price = Strategy::default()
            .price(&node, &chain::POLYGON)
            .await
            .unwrap();
        assert_eq!(price, GasPrice::Legacy { gas_price: 1_000 });
    }

    #[tokio::test]
    async fn missing_base_fee_falls_back_to_legacy() {
        let mut node = MockNode::new();
        node.expect_base_fee().returning(|| Ok(None));
        node.expect_gas_price().returning(|| Ok(7));
        let strategy = Strategy {
            simulated: false,
            tip: Some(3),
        };
        let price = strategy.price(&node, &chain::MAINNET).await.unwrap();
        assert_eq!(price, GasPrice::Legacy { gas_price: 10 });
    }

    #[test]
    fn applies_exactly_one_pricing_mode() {
        let from = Address::repeat_byte(1);
        let tx = TransactionRequest {
            gas_price: Some(1),
            ..Default::default()
        };
        let options = SendOptions {
            from,
            gas_limit: Some(21_000),
            price: GasPrice::FeeMarket {
                max_fee_per_gas: 3,
                max_priority_fee_per_gas: 2,
            },
        };
        let tx = options.apply(tx);
        assert_eq!(tx.from, Some(from));
        assert_eq!(tx.gas, Some(21_000));
        assert_eq!(tx.gas_price, None);
        assert_eq!(tx.max_fee_per_gas, Some(3));
        assert_eq!(tx.max_priority_fee_per_gas, Some(2));

        let tx = SendOptions {
            price: GasPrice::Legacy { gas_price: 4 },
            ..options
        }
        .apply(tx);
        assert_eq!(tx.gas_price, Some(4));
        assert_eq!(tx.max_fee_per_gas, None);
        assert_eq!(tx.max_priority_fee_per_gas, None);
    }
}
