//! Thin command layer between a messaging transport and the ledger.

mod command;
mod transport;

pub use command::{Dispatcher, TIP};
pub use transport::{ConsoleTransport, Transport, run};

use crate::engine::Counterparty;

/// Sender name the console transport uses for untagged lines.
pub const DEFAULT_OPERATOR: &str = "operator";

/// Settings that shape the bot's replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// Name shown to counterparties as the sender of money and bills.
    pub sender_name: String,
    /// Printed in front of every amount.
    pub currency: String,
    /// Senders whose commands are handled. Everyone else is ignored; an
    /// empty list ignores everyone.
    pub allowed_senders: Vec<String>,
}

impl BotConfig {
    pub fn allows(&self, sender: &str) -> bool {
        self.allowed_senders.iter().any(|allowed| allowed == sender)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            sender_name: "Ledger Bot".to_owned(),
            currency: "₹".to_owned(),
            allowed_senders: vec![DEFAULT_OPERATOR.to_owned()],
        }
    }
}

/// A command as it arrived, with the address it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub sender: String,
    pub text: String,
}

impl Inbound {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Inbound {
            sender: sender.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Whoever issued the command. Replaced by [`Recipient::Sender`] before delivery.
    Operator,
    Sender(String),
    Counterparty(Counterparty),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: Recipient,
    pub text: String,
}

impl Outbound {
    pub fn operator(text: impl Into<String>) -> Self {
        Outbound {
            to: Recipient::Operator,
            text: text.into(),
        }
    }

    pub fn to(counterparty: Counterparty, text: impl Into<String>) -> Self {
        Outbound {
            to: Recipient::Counterparty(counterparty),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BotConfig, DEFAULT_OPERATOR};

    #[test]
    fn test_that_only_listed_senders_are_allowed() {
        let config = BotConfig::default();
        assert!(config.allows(DEFAULT_OPERATOR));
        assert!(!config.allows("919999999999"));
        assert!(!config.allows(""));

        let nobody = BotConfig {
            allowed_senders: vec![],
            ..BotConfig::default()
        };
        assert!(!nobody.allows(DEFAULT_OPERATOR));
    }
}
