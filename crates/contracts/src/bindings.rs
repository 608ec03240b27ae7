//! ABIs of the contracts the deployer interacts with directly. Everything else
//! is driven through artifacts loaded at runtime.

alloy::sol! {
    /// The multisig with time lock that owns the deployed system.
    #[derive(Debug, PartialEq, Eq)]
    interface IZeroExGovernor {
        event Submission(uint256 indexed transactionId);
        event Confirmation(address indexed sender, uint256 indexed transactionId);
        event Execution(uint256 indexed transactionId);
        event ExecutionFailure(uint256 indexed transactionId);

        function registerFunctionCall(
            bool hasCustomTimeLock,
            bytes4 functionSelector,
            address destination,
            uint128 newSecondsTimeLocked
        ) external;
        function changeRequirement(uint256 _required) external;
        function changeTimeLock(uint256 _secondsTimeLocked) external;
        function submitTransaction(address destination, uint256 value, bytes data)
            external
            returns (uint256 transactionId);
        function confirmTransaction(uint256 transactionId) external;
        function executeTransaction(uint256 transactionId) external;
        function required() external view returns (uint256);
        function secondsTimeLocked() external view returns (uint256);
        function functionCallTimeLocks(bytes4 functionSelector, address destination)
            external
            view
            returns (bool hasCustomTimeLock, uint128 secondsTimeLocked);
        function getOwners() external view returns (address[] memory);
    }

    /// The exchange proxy and the subset of its features used for ownership
    /// hand-over and upgrade rollbacks.
    #[derive(Debug, PartialEq, Eq)]
    interface IZeroEx {
        event ProxyFunctionUpdated(bytes4 indexed selector, address oldImpl, address newImpl);

        function rollback(bytes4 selector, address targetImpl) external;
        function owner() external view returns (address);
        function transferOwnership(address newOwner) external;
    }

    /// Factory through which transformers are deployed.
    #[derive(Debug, PartialEq, Eq)]
    interface ITransformerDeployer {
        event Deployed(address deployedAddress, uint256 nonce, address sender);

        function deploy(bytes bytecode) external payable returns (address deployedAddress);
    }
}
