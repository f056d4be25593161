pub mod bridge;
pub mod explorer;
pub mod extrinsic;
pub mod traits;

pub use bridge::{BridgeStepExecutor, Direction};
pub use traits::{BalanceReader, EvmWallet, EvmWithdrawal, NativeChain, RelayTransfer};
