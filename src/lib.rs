//! Records money-transfer notifications against phone numbers and answers
//! totals, itemized histories and bills over human-entered periods.

pub mod bot;
pub mod engine;
pub mod period;
