//! Static table of the networks the deployer operates on.
//!
//! Every chain id the deployer talks to has to resolve to a [`Network`]; an
//! unknown chain id is a hard error rather than a default.

use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// A chain id as reported by `eth_chainId`.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct ChainId(pub u64);

/// A network the deployer knows how to price transactions for and where to
/// submit source verification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Network {
    pub chain_id: ChainId,
    /// Canonical name. Explorer API keys are selected by prefix of this name.
    pub name: &'static str,
    /// Block explorer verification endpoint, if the network has one.
    pub explorer_api_url: Option<&'static str>,
    /// Whether the network is on the fee-market allow-list. Networks outside
    /// of it are always priced with a legacy gas price.
    pub eip1559: bool,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[error("unrecognized network with chain ID: {0}")]
pub struct UnknownNetwork(pub ChainId);

const fn network(
    chain_id: u64,
    name: &'static str,
    explorer_api_url: Option<&'static str>,
) -> Network {
    Network {
        chain_id: ChainId(chain_id),
        name,
        explorer_api_url,
        eip1559: false,
    }
}

pub const MAINNET: Network = Network {
    eip1559: true,
    ..network(1, "main", Some("https://api.etherscan.io/api"))
};
pub const GOERLI: Network = network(5, "goerli", Some("https://api-goerli.etherscan.io/api"));
pub const OPTIMISM: Network = network(
    10,
    "optimistic-ethereum",
    Some("https://api-optimistic.etherscan.io/api"),
);
pub const BSC: Network = network(56, "bsc", Some("https://api.bscscan.com/api"));
pub const OPTIMISM_KOVAN: Network = network(
    69,
    "optimistic-kovan",
    Some("https://kovan-optimistic.etherscan.io"),
);
pub const BSC_TESTNET: Network = network(
    97,
    "bsc-testnet",
    Some("https://api-testnet.bscscan.com/api"),
);
pub const POLYGON: Network = network(137, "matic", Some("https://api.polygonscan.com/api"));
pub const FANTOM: Network = network(250, "fantom", Some("https://api.ftmscan.com/api"));
pub const POLYGON_ZKEVM: Network = network(
    1101,
    "polygon-zkevm",
    Some("https://api-zkevm.polygonscan.com/api"),
);
pub const POLYGON_ZKEVM_TESTNET: Network = network(
    1442,
    "polygon-zkevm-testnet",
    Some("https://api-testnet-zkevm.polygonscan.com/api"),
);
pub const BASE: Network = network(8453, "base", Some("https://api.basescan.org/api"));
pub const ARBITRUM: Network = network(42161, "arbitrum", Some("https://api.arbiscan.io/api"));
pub const CELO: Network = network(42220, "celo", Some("https://api.celoscan.io/api"));
pub const AVALANCHE: Network = network(43114, "avalanche", Some("https://api.snowtrace.io/api"));
pub const POLYGON_TESTNET: Network = network(
    80001,
    "matic-testnet",
    Some("https://api-testnet.polygonscan.com/api"),
);
pub const BASE_GOERLI: Network = network(
    84531,
    "base-goerli",
    Some("https://api-goerli.basescan.org/api"),
);
pub const ARBITRUM_RINKEBY: Network = network(
    421611,
    "arbitrum-rinkeby",
    Some("https://api-testnet.arbiscan.io/api"),
);
// Verification on Sepolia is done by hand.
pub const SEPOLIA: Network = network(11155111, "sepolia", None);

/// All supported networks, ordered by chain id.
pub const NETWORKS: &[Network] = &[
    MAINNET,
    GOERLI,
    OPTIMISM,
    BSC,
    OPTIMISM_KOVAN,
    BSC_TESTNET,
    POLYGON,
    FANTOM,
    POLYGON_ZKEVM,
    POLYGON_ZKEVM_TESTNET,
    BASE,
    ARBITRUM,
    CELO,
    AVALANCHE,
    POLYGON_TESTNET,
    BASE_GOERLI,
    ARBITRUM_RINKEBY,
    SEPOLIA,
];

/// Maps a live chain id to its network.
pub fn resolve(chain_id: impl Into<ChainId>) -> Result<&'static Network, UnknownNetwork> {
    let chain_id = chain_id.into();
    NETWORKS
        .iter()
        .find(|network| network.chain_id == chain_id)
        .ok_or(UnknownNetwork(chain_id))
}
