//! Data models for monitored wallets, observed swaps, and positions.

mod position;
mod transaction;
mod wallet;

pub use position::Position;
pub use transaction::{ObservedTransaction, WalletAction};
pub use wallet::MonitoredWallet;
