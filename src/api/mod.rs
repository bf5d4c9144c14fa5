//! HTTP collaborators: wallet feed reads and swap execution.

mod data_client;
mod swap_client;
mod types;

pub use data_client::DataClient;
pub use swap_client::SwapClient;
pub use types::*;
