//! Account plumbing on top of the event bus: live balance caching, blocking
//! waits for top-up and stake-linking outcomes, and balance/stake assurance.

mod service;
mod store;
mod stream;

pub use service::{AccountService, CoinProvider};
pub use store::{general, general_and_bond, Balance, BalanceStore};
pub use stream::{AccountBalance, AccountStream, DataNode};
