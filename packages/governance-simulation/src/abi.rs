use alloy_sol_types::sol;

sol! {
    /// The subset of GovernorBravoDelegate the simulation drives.
    #[derive(Debug, PartialEq, Eq)]
    interface IGovernorBravo {
        function proposalCount() external view returns (uint256);

        function proposals(uint256 proposalId) external view returns (
            uint256 id,
            address proposer,
            uint256 eta,
            uint256 startBlock,
            uint256 endBlock,
            uint256 forVotes,
            uint256 againstVotes,
            uint256 abstainVotes,
            bool canceled,
            bool executed
        );

        function state(uint256 proposalId) external view returns (uint8);

        function latestProposalIds(address proposer) external view returns (uint256);

        function propose(
            address[] targets,
            uint256[] values,
            string[] signatures,
            bytes[] calldatas,
            string description
        ) external returns (uint256);

        function castVote(uint256 proposalId, uint8 support) external;

        function queue(uint256 proposalId) external;

        function execute(uint256 proposalId) external payable;
    }

    /// ENS public resolver text records.
    #[derive(Debug, PartialEq, Eq)]
    interface IPublicResolver {
        function setText(bytes32 node, string key, string value) external;

        function text(bytes32 node, string key) external view returns (string);
    }
}
