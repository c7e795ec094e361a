use anyhow::{Context, Result};
use chrono::TimeZone;
use std::io::{BufRead, Write};

use crate::bot::{DEFAULT_OPERATOR, Dispatcher, Inbound, Outbound, Recipient};
use crate::engine::Clock;

const ERROR_REPLY: &str = "An error occurred while processing your command. Please try again.";

/// The two things the bot needs from a messaging channel.
pub trait Transport {
    /// Next inbound command, or `None` once the channel is closed.
    fn receive(&mut self) -> Result<Option<Inbound>>;

    fn deliver(&mut self, to: &Recipient, text: &str) -> Result<()>;
}

/// Reads commands line by line and prints every delivery, tagged with who it
/// is for.
///
/// A line starting with `@name ` is from `name`; any other line is from the
/// transport's default sender.
pub struct ConsoleTransport<R, W> {
    input: R,
    output: W,
    sender: String,
}

impl<R: BufRead, W: Write> ConsoleTransport<R, W> {
    pub fn new(input: R, output: W) -> Self {
        ConsoleTransport {
            input,
            output,
            sender: DEFAULT_OPERATOR.to_owned(),
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl<R: BufRead, W: Write> Transport for ConsoleTransport<R, W> {
    fn receive(&mut self) -> Result<Option<Inbound>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .input
                .read_line(&mut line)
                .context("reading command")?;
            if read == 0 {
                return Ok(None);
            }
            let command = line.trim();
            if command.is_empty() {
                continue;
            }

            let Some(tagged) = command.strip_prefix('@') else {
                return Ok(Some(Inbound::new(self.sender.as_str(), command)));
            };
            match tagged.split_once(char::is_whitespace) {
                Some((sender, text)) if !sender.is_empty() && !text.trim().is_empty() => {
                    return Ok(Some(Inbound::new(sender, text.trim())));
                }
                _ => log::debug!("Skipping sender tag without a command: {command:?}"),
            }
        }
    }

    fn deliver(&mut self, to: &Recipient, text: &str) -> Result<()> {
        match to {
            Recipient::Operator => writeln!(self.output, "[operator]")?,
            Recipient::Sender(sender) => writeln!(self.output, "[to {sender}]")?,
            Recipient::Counterparty(counterparty) => writeln!(self.output, "[to {counterparty}]")?,
        }
        writeln!(self.output, "{text}")?;
        self.output.flush().context("flushing delivery")?;
        Ok(())
    }
}

/// Handles commands one at a time until the transport runs dry.
///
/// Messages from senders the dispatcher does not accept are dropped without
/// a reply. A failed command is logged and answered with a generic error; the
/// loop keeps going. Transport failures end the loop. Returns the number of
/// commands handled.
pub fn run<C, Tz, T>(dispatcher: &Dispatcher<'_, C, Tz>, transport: &mut T) -> Result<usize>
where
    C: Clock,
    Tz: TimeZone,
    T: Transport,
{
    let mut handled = 0;

    while let Some(Inbound { sender, text }) = transport.receive()? {
        if !dispatcher.accepts(&sender) {
            log::debug!("Ignoring message from unlisted sender {sender}");
            continue;
        }
        log::info!("Received command from {sender}: {text}");

        let outbound = match dispatcher.handle(&text) {
            Ok(outbound) => outbound,
            Err(e) => {
                log::error!("Error processing command {text:?}: {e:#}");
                vec![Outbound::operator(ERROR_REPLY)]
            }
        };

        for message in outbound {
            let to = match message.to {
                Recipient::Operator => Recipient::Sender(sender.clone()),
                other => other,
            };
            log::debug!("Delivering to {to:?}");
            transport.deliver(&to, &message.text)?;
        }
        handled += 1;
    }

    log::debug!("Transport closed after {handled} commands");
    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::{ConsoleTransport, Transport, run};
    use crate::bot::{BotConfig, Dispatcher, Inbound, Recipient};
    use crate::engine::{Counterparty, Ledger};
    use chrono::Utc;
    use std::io::Cursor;

    #[test]
    fn test_that_console_transport_skips_blank_lines() {
        let input = Cursor::new("\n  help  \n\n\nbill 1\n");
        let mut transport = ConsoleTransport::new(input, Vec::new());

        assert_eq!(transport.receive().unwrap(), Some(Inbound::new("operator", "help")));
        assert_eq!(transport.receive().unwrap(), Some(Inbound::new("operator", "bill 1")));
        assert_eq!(transport.receive().unwrap(), None);
    }

    #[test]
    fn test_that_console_lines_carry_their_sender() {
        let input = Cursor::new("@919649210000 help\nbill 1\n@  \n@lonely\n@bob   details 42  \n");
        let mut transport = ConsoleTransport::new(input, Vec::new()).with_sender("919413051000");

        assert_eq!(
            transport.receive().unwrap(),
            Some(Inbound::new("919649210000", "help"))
        );
        assert_eq!(
            transport.receive().unwrap(),
            Some(Inbound::new("919413051000", "bill 1"))
        );
        assert_eq!(transport.receive().unwrap(), Some(Inbound::new("bob", "details 42")));
        assert_eq!(transport.receive().unwrap(), None);
    }

    #[test]
    fn test_that_deliveries_are_tagged_by_recipient() {
        let mut transport = ConsoleTransport::new(Cursor::new(""), Vec::new());
        let cp = Counterparty::parse("42").unwrap();

        transport.deliver(&Recipient::Counterparty(cp), "hello").unwrap();
        transport.deliver(&Recipient::Sender("operator".into()), "done").unwrap();
        transport.deliver(&Recipient::Operator, "fallback").unwrap();

        let (_, output) = transport.into_inner();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "[to 42]\nhello\n[to operator]\ndone\n[operator]\nfallback\n"
        );
    }

    #[test]
    fn test_that_run_handles_every_command() {
        let ledger = Ledger::in_memory().unwrap();
        let dispatcher = Dispatcher::new(&ledger, Utc, BotConfig::default());
        let input = Cursor::new("send 9876543210 500\nbill 9876543210\nnonsense\n");
        let mut transport = ConsoleTransport::new(input, Vec::new());

        let handled = run(&dispatcher, &mut transport).unwrap();
        assert_eq!(handled, 3);

        let (_, output) = transport.into_inner();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("[to 9876543210]\nYou have received ₹500 from Ledger Bot."));
        assert!(output.contains("[to operator]\n✅ Sent ₹500 notification to 9876543210"));
        assert!(output.contains("Total amount received from Ledger Bot so far: ₹500"));
        assert!(output.contains("Type \"help\" or \"commands\""));
    }

    #[test]
    fn test_that_unlisted_senders_get_no_reply_and_write_nothing() {
        let ledger = Ledger::in_memory().unwrap();
        let config = BotConfig {
            allowed_senders: vec!["919649210000".into()],
            ..BotConfig::default()
        };
        let dispatcher = Dispatcher::new(&ledger, Utc, config);
        let input = Cursor::new(
            "send 9876543210 500\n\
             @919999999999 send 9876543210 75\n\
             @919999999999 help\n\
             @919649210000 send 9876543210 20\n",
        );
        let mut transport = ConsoleTransport::new(input, Vec::new());

        let handled = run(&dispatcher, &mut transport).unwrap();
        assert_eq!(handled, 1);

        let (_, output) = transport.into_inner();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "[to 9876543210]\nYou have received ₹20 from Ledger Bot.\n\
             [to 919649210000]\n✅ Sent ₹20 notification to 9876543210\n"
        );

        let cp = Counterparty::parse("9876543210").unwrap();
        let history = ledger.history(&cp).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount.to_string(), "20");
    }
}
