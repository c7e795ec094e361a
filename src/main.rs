use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use ledger_bot::bot::{self, BotConfig, ConsoleTransport, Dispatcher};
use ledger_bot::engine::{self, Counterparty, Ledger};
use simple_logger::SimpleLogger;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ledger-bot", version, about = "Records and reports money-transfer notifications")]
struct Cli {
    /// SQLite file holding the transactions table
    #[arg(long, env = "LEDGER_DB", default_value = "transactions.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read commands from stdin and print replies and notifications to stdout
    Serve {
        /// Name counterparties see as the sender
        #[arg(long, env = "LEDGER_SENDER_NAME", default_value = "Ledger Bot")]
        sender_name: String,

        /// Symbol printed before amounts
        #[arg(long, env = "LEDGER_CURRENCY", default_value = "₹")]
        currency: String,

        /// Senders allowed to issue commands; everyone else is ignored
        #[arg(
            long = "allow",
            env = "LEDGER_ALLOWED_SENDERS",
            value_delimiter = ',',
            default_value = bot::DEFAULT_OPERATOR
        )]
        allowed_senders: Vec<String>,

        /// Sender of stdin lines not tagged with `@sender`
        #[arg(long, env = "LEDGER_OPERATOR", default_value = bot::DEFAULT_OPERATOR)]
        operator: String,
    },
    /// Write one counterparty's history to stdout as CSV, newest first
    Export { counterparty: String },
}

fn main() -> Result<()> {
    SimpleLogger::new().env().init()?;

    let cli = Cli::parse();
    log::debug!("Application started: {cli:?}");

    let ledger = Ledger::open(&cli.db)
        .with_context(|| format!("opening ledger at {}", cli.db.display()))?;

    match cli.command {
        Command::Serve {
            sender_name,
            currency,
            allowed_senders,
            operator,
        } => {
            let config = BotConfig {
                sender_name,
                currency,
                allowed_senders,
            };
            serve(&ledger, config, operator)?
        }
        Command::Export { counterparty } => export(&ledger, &counterparty)?,
    }

    ledger.close()?;
    log::debug!("Application finished");

    Ok(())
}

fn serve(ledger: &Ledger, config: BotConfig, operator: String) -> Result<()> {
    log::info!("Starting ledger bot on stdin; transactions stored in {:?}", ledger.path());
    log::info!("Authorized senders: {}", config.allowed_senders.join(", "));
    if !config.allows(&operator) {
        log::warn!("Default sender {operator} is not allowed; untagged lines will be ignored");
    }

    let dispatcher = Dispatcher::new(ledger, Local, config);
    let mut transport =
        ConsoleTransport::new(io::stdin().lock(), io::stdout().lock()).with_sender(operator);

    let handled = bot::run(&dispatcher, &mut transport)?;
    log::info!("Stdin closed, handled {handled} commands");

    Ok(())
}

fn export(ledger: &Ledger, counterparty: &str) -> Result<()> {
    let counterparty = Counterparty::parse(counterparty)?;
    let history = ledger.history(&counterparty)?;

    log::debug!("Exporting {} transactions for {counterparty}", history.len());
    engine::write_csv(io::stdout().lock(), &history)?;

    Ok(())
}
