//! Funding capability shared by wallets and giver contracts.

use async_trait::async_trait;
use tracing::info;

use cellar_core::address::Address;
use cellar_core::constants::DEFAULT_SEND_FLAGS;
use cellar_core::models::InternalMessage;

use crate::error::WalletError;
use crate::protocol::{OutgoingMessage, WalletProtocol};
use crate::wallet::Wallet;

/// Anything able to send value to another address.
#[async_trait]
pub trait Giver: Send + Sync {
    /// Address the funds are sent from.
    fn address(&self) -> &Address;

    /// Send `amount` nano-tokens to `target` and wait until every
    /// transaction caused by the transfer is produced.
    async fn give(&self, target: &Address, amount: u128) -> Result<(), WalletError>;
}

#[async_trait]
impl<P: WalletProtocol> Giver for Wallet<P> {
    fn address(&self) -> &Address {
        Wallet::address(self)
    }

    async fn give(&self, target: &Address, amount: u128) -> Result<(), WalletError> {
        let transfer = OutgoingMessage::new(
            InternalMessage::transfer(*target, amount, false),
            DEFAULT_SEND_FLAGS,
        );
        let tx = self.send_raw(&[transfer], None).await?;
        let children = self.transport().trace_transaction(&tx).await?;
        info!(
            from = %Wallet::address(self),
            to = %target,
            amount,
            transactions = children.len() + 1,
            "funding settled"
        );
        Ok(())
    }
}
