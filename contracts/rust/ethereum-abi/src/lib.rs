use alloy::sol;

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
);

// V3
sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IUniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address);
    }
);

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IUniswapV3Pool {
        event Swap(
            address indexed sender,
            address indexed recipient,
            int256 amount0,
            int256 amount1,
            uint160 sqrtPriceX96,
            uint128 liquidity,
            int24 tick
        );

        function token0() external view returns (address);
        function token1() external view returns (address);
        function fee() external view returns (uint24);
    }
);

// Universal Router entry points (both deployed overloads)
sol!(
    #[allow(missing_docs)]
    interface IUniversalRouter {
        function execute(bytes calldata commands, bytes[] calldata inputs) external payable;
        function execute(bytes calldata commands, bytes[] calldata inputs, uint256 deadline) external payable;
    }
);
