//! Gas price oracle contract bindings.

use ethers::contract::abigen;

abigen!(
    GasPriceOracleContract,
    r#"[
        function gasPrice() external view returns (uint256)
        function owner() external view returns (address)
        function setGasPrice(uint256 _gasPrice) external
    ]"#,
);
