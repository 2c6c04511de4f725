use std::sync::Mutex;

use crate::events::AccountKind;
use crate::num::{self, Amount, ParseAmountError};

/// Point-in-time snapshot of one party's balances in one asset, by account
/// category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub general: Amount,
    pub margin: Amount,
    pub bond: Amount,
}

/// The balance that backs plain orders and liquidity provision.
pub fn general(balance: &Balance) -> Amount {
    balance.general
}

/// The balance that backs a liquidity increase.
pub fn general_and_bond(balance: &Balance) -> Amount {
    balance.general.saturating_add(balance.bond)
}

/// Live balance record for one (party, asset) pair, updated in place by
/// account events. [`BalanceStore::balance`] returns a copy; the store itself
/// is the live handle.
#[derive(Debug, Default)]
pub struct BalanceStore {
    inner: Mutex<Balance>,
}

impl BalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> Balance {
        *self.inner.lock().expect("balance lock poisoned")
    }

    /// Sets the balance of the account category tagged on an event. The whole
    /// setter is the atomic unit. Unrecognised categories are logged and
    /// ignored.
    pub fn set(&self, kind: &AccountKind, balance: &str) -> Result<(), ParseAmountError> {
        let amount = num::parse_amount(balance)?;
        let mut inner = self.inner.lock().expect("balance lock poisoned");
        match kind {
            AccountKind::General => inner.general = amount,
            AccountKind::Margin => inner.margin = amount,
            AccountKind::Bond => inner.bond = amount,
            AccountKind::Other(name) => {
                tracing::warn!(kind = %name, "ignoring balance for unrecognised account kind");
            }
        }
        Ok(())
    }
}
