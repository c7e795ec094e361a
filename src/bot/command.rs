use anyhow::Result;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::bot::{BotConfig, Outbound};
use crate::engine::{Amount, Clock, Counterparty, Ledger, Transaction, aggregate};
use crate::period::{self, Query, ResolveError, Window};

static DETAILS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"details="([^"]*)""#).expect("Invalid details regex pattern"));

pub const TIP: &str =
    "💡 Tip: Use 10d (days), 1m (months), 1y (years), month=9, or DD/MM/YY for specific periods";

const SEND_USAGE: &str = r#"Usage: send <number> <amount> details="optional information""#;
const DETAILS_USAGE: &str =
    "Usage: details <number> [DD/MM/YY] [10d/5d/1m/1y] [month=9] [month=9 year=25]";
const BILL_USAGE: &str =
    "Usage: bill <number> [DD/MM/YY] [10d/5d/1m/1y] [month=9] [month=9 year=25]";
const INVALID_NUMBER: &str = "Invalid number format. Please use digits only.";
const INVALID_AMOUNT: &str = "Invalid amount. Please enter a positive number.";
const UNKNOWN_COMMAND: &str = r#"Type "help" or "commands" to see all available commands and formats."#;

const HELP: &str = r#"📋 *Available Commands & Formats*

🔹 *Send Money:*
• `send <number> <amount>` - Basic send
• `send <number> <amount> details="info"` - Send with details

🔹 *View Details:*
• `details <number>` - All transactions summary
• `details <number> 12/08/25` - Specific date (DD/MM/YY)
• `details <number> 10d` - Last 10 days
• `details <number> 1m` - Last 1 month
• `details <number> 1y` - Last 1 year
• `details <number> month=8` - Current year, month 8
• `details <number> month=8 year=25` - Specific month/year

🔹 *Send Bills:*
• `bill <number>` - Total bill (all time)
• `bill <number> 12/08/25` - Bill for specific date
• `bill <number> 30d` - Last 30 days bill
• `bill <number> month=8 year=25` - Specific month/year

🔹 *Help:*
• `help` or `commands` - Show this help

📝 *Date Formats Supported:*
• DD/MM/YY: 12/8/25, 01/02/25
• DD-MM-YY: 12-8-25, 01-02-25
• DD/MM/YYYY: 12/08/2025

⏰ *Period Formats:*
• d = days (1d, 10d, 30d)
• m = months (1m, 2m, 6m)
• y = years (1y, 2y)"#;

fn resolve_error_reply(error: &ResolveError) -> &'static str {
    match error {
        ResolveError::BadDate(_) => "Invalid date format. Use DD/MM/YY, DD-MM-YY or DD/MM/YYYY",
        ResolveError::BadMonth(_) => "Invalid month. Use month=1 to month=12",
        ResolveError::BadYear(_) => "Invalid year format. Use year=25 or year=2025",
        ResolveError::NonexistentLocalTime(_) => {
            "That day does not start at midnight in the local time zone. Try a neighbouring date."
        }
        ResolveError::BadPeriod(_) | ResolveError::Unrecognized(_) => {
            "Invalid format. Use: DD/MM/YY, 10d, 5d, 1m, 2m, 1y, month=9, or month=9 year=25"
        }
    }
}

/// Maps one inbound command to the messages it produces.
///
/// Input problems become replies to the operator; only ledger failures are
/// returned as errors.
pub struct Dispatcher<'a, C: Clock, Tz: TimeZone> {
    ledger: &'a Ledger<C>,
    zone: Tz,
    config: BotConfig,
}

impl<'a, C: Clock, Tz: TimeZone> Dispatcher<'a, C, Tz> {
    pub fn new(ledger: &'a Ledger<C>, zone: Tz, config: BotConfig) -> Self {
        Dispatcher {
            ledger,
            zone,
            config,
        }
    }

    /// Whether commands from `sender` should be handled at all.
    pub fn accepts(&self, sender: &str) -> bool {
        self.config.allows(sender)
    }

    pub fn handle(&self, text: &str) -> Result<Vec<Outbound>> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        let Some((command, args)) = parts.split_first() else {
            return Ok(vec![Outbound::operator(UNKNOWN_COMMAND)]);
        };

        log::debug!("Dispatching command {command:?} with {} args", args.len());
        match command.to_lowercase().as_str() {
            "send" => self.send(text, args),
            "details" => self.details(args),
            "bill" => self.bill(args),
            "help" | "commands" => Ok(vec![Outbound::operator(HELP)]),
            _ => Ok(vec![Outbound::operator(UNKNOWN_COMMAND)]),
        }
    }

    fn now(&self) -> DateTime<Tz> {
        self.ledger.now().with_timezone(&self.zone)
    }

    fn money(&self, amount: &Amount) -> String {
        format!("{}{amount}", self.config.currency)
    }

    fn local_date(&self, at: &DateTime<Utc>) -> String {
        at.with_timezone(&self.zone)
            .date_naive()
            .format("%-d/%-m/%Y")
            .to_string()
    }

    fn counterparty(&self, number: &str) -> Option<Counterparty> {
        match Counterparty::parse(number) {
            Ok(counterparty) => Some(counterparty),
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }

    fn window(&self, args: &[&str]) -> Result<(Query, Window, DateTime<Tz>), ResolveError> {
        let now = self.now();
        let query = period::parse(args[0], args.get(1).copied())?;
        let window = query.window(&now)?;
        Ok((query, window, now))
    }

    /// `12/8/2025`, `month 8/2025` or `last 10D`.
    fn period_label(&self, query: &Query, now: &DateTime<Tz>) -> String {
        match *query {
            Query::Day(date) => date.format("%-d/%-m/%Y").to_string(),
            Query::Month { year, month } => {
                format!("month {month}/{}", year.unwrap_or_else(|| now.year()))
            }
            Query::Rolling { count, unit } => format!("last {count}{}", unit.symbol()),
        }
    }

    fn send(&self, text: &str, args: &[&str]) -> Result<Vec<Outbound>> {
        let [number, amount, ..] = args else {
            return Ok(vec![Outbound::operator(SEND_USAGE)]);
        };
        let Some(counterparty) = self.counterparty(number) else {
            return Ok(vec![Outbound::operator(INVALID_NUMBER)]);
        };
        let amount = match Amount::from_str(amount) {
            Ok(amount) if amount.is_positive() => amount,
            _ => {
                log::warn!("Rejected amount {amount:?}");
                return Ok(vec![Outbound::operator(INVALID_AMOUNT)]);
            }
        };

        let details = if args.len() > 2 {
            DETAILS.captures(text).map(|caps| caps[1].to_owned())
        } else {
            None
        };

        let tx = self.ledger.append(&counterparty, amount, details.as_deref())?;

        let mut notice = format!(
            "You have received {} from {}.",
            self.money(&tx.amount),
            self.config.sender_name
        );
        let mut confirmation = format!("✅ Sent {} notification to {counterparty}", self.money(&tx.amount));
        if let Some(details) = &tx.details {
            notice.push_str(&format!("\nDetails: {details}"));
            confirmation.push_str(&format!("\nWith details: {details}"));
        }

        Ok(vec![
            Outbound::to(counterparty, notice),
            Outbound::operator(confirmation),
        ])
    }

    fn itemize(&self, transactions: &[Transaction]) -> Result<String> {
        if transactions.is_empty() {
            return Ok("No transactions found for this period.\n\n".to_owned());
        }

        let mut out = format!("Total: {}\n\n", self.money(&aggregate(transactions)?));
        for (index, tx) in transactions.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} on {}",
                index + 1,
                self.money(&tx.amount),
                self.local_date(&tx.occurred_at)
            ));
            if let Some(details) = &tx.details {
                out.push_str(&format!(" - {details}"));
            }
            out.push('\n');
        }
        Ok(out)
    }

    fn details(&self, args: &[&str]) -> Result<Vec<Outbound>> {
        let Some(number) = args.first() else {
            return Ok(vec![Outbound::operator(DETAILS_USAGE)]);
        };
        let Some(counterparty) = self.counterparty(number) else {
            return Ok(vec![Outbound::operator(INVALID_NUMBER)]);
        };

        let mut response = format!("Number: {counterparty}\n");

        if args.len() >= 2 {
            let (query, window, now) = match self.window(&args[1..]) {
                Ok(resolved) => resolved,
                Err(e) => {
                    log::warn!("{e}");
                    return Ok(vec![Outbound::operator(resolve_error_reply(&e))]);
                }
            };
            let found = self.ledger.query_by_window(&counterparty, &window)?;

            response.push_str(&format!(
                "Transactions for {}:\n",
                self.period_label(&query, &now)
            ));
            response.push_str(&self.itemize(&found)?);
            response.push('\n');
            response.push_str(TIP);
        } else {
            let total = self.ledger.total_for(&counterparty)?;
            response.push_str(&format!("Total Sent: {}", self.money(&total)));

            match self.ledger.last_for(&counterparty)? {
                Some(last) => {
                    response.push_str(&format!(
                        "\nLast Sent: {} on {}",
                        self.money(&last.amount),
                        self.local_date(&last.occurred_at)
                    ));
                    if let Some(details) = &last.details {
                        response.push_str(&format!(" - {details}"));
                    }
                }
                None => response.push_str("\nLast Sent: No transactions found"),
            }
            response.push_str("\n\n");
            response.push_str(TIP);
        }

        Ok(vec![Outbound::operator(response)])
    }

    fn bill(&self, args: &[&str]) -> Result<Vec<Outbound>> {
        let Some(number) = args.first() else {
            return Ok(vec![Outbound::operator(BILL_USAGE)]);
        };
        let Some(counterparty) = self.counterparty(number) else {
            return Ok(vec![Outbound::operator(INVALID_NUMBER)]);
        };

        let (total, period) = if args.len() >= 2 {
            let (query, window, now) = match self.window(&args[1..]) {
                Ok(resolved) => resolved,
                Err(e) => {
                    log::warn!("{e}");
                    return Ok(vec![Outbound::operator(resolve_error_reply(&e))]);
                }
            };
            let found = self.ledger.query_by_window(&counterparty, &window)?;

            let period = format!("for {}", self.period_label(&query, &now));
            (aggregate(&found)?, period)
        } else {
            (self.ledger.total_for(&counterparty)?, "so far".to_owned())
        };

        if total.is_zero() {
            return Ok(vec![Outbound::operator(format!(
                "No transactions found for {counterparty}\n\n{TIP}"
            ))]);
        }

        let summary = format!(
            "Total amount received from {} {period}: {}",
            self.config.sender_name,
            self.money(&total)
        );
        let confirmation = format!(
            "✅ Sent bill summary ({}) {period} to {counterparty}\n\n{TIP}",
            self.money(&total)
        );

        Ok(vec![
            Outbound::to(counterparty, summary),
            Outbound::operator(confirmation),
        ])
    }
}
