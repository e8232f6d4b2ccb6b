//! # Notifications
//!
//! Scheduled group-chat messages composed from the ledgers.
//!
//! ## Messages
//! - Payment reminder: players still unpaid for a month
//! - Attendance summary: who showed up on a date
//!
//! ## Delivery
//! - JSON `{"text": ...}` posted to an incoming webhook, `NOTIFY_WEBHOOK_URL`
//! - One attempt, a scheduler is expected to rerun failed jobs
use chrono::Local;
use reqwest::Client;
use serde_json::json;
use sheets::{LedgerError, records::PaymentSheet};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Month '{0}' not found in payment headers")]
    UnknownMonth(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Webhook delivery failed: {0}")]
    Delivery(String),
}

pub fn current_month() -> String {
    Local::now().format("%B").to_string()
}

pub fn today_formatted() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

pub fn payment_reminder(sheet: &PaymentSheet, month: &str) -> Result<String, NotifyError> {
    if !sheet.months.iter().any(|m| m == month) {
        return Err(NotifyError::UnknownMonth(month.to_string()));
    }

    let unpaid: Vec<&str> = sheet
        .players
        .iter()
        .filter(|player| !player.payments.get(month).copied().unwrap_or(false))
        .map(|player| player.name.as_str())
        .collect();

    if unpaid.is_empty() {
        return Ok(format!("Everyone is paid up for {month}."));
    }

    let mut text = format!("Payment reminder for {month}: {} outstanding", unpaid.len());
    for name in unpaid {
        text.push_str("\n- ");
        text.push_str(name);
    }

    Ok(text)
}

pub fn attendance_summary(date: &str, present: &[String]) -> String {
    match present.len() {
        0 => format!("No attendance recorded for {date}."),
        1 => format!("1 player at {date}: {}", present[0]),
        n => format!("{n} players at {date}: {}", present.join(", ")),
    }
}

pub async fn deliver(client: &Client, webhook_url: &str, text: &str) -> Result<(), NotifyError> {
    let response = client
        .post(webhook_url)
        .json(&json!({ "text": text }))
        .send()
        .await
        .map_err(|e| NotifyError::Delivery(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(NotifyError::Delivery(format!("{status}: {body}")));
    }

    info!("Delivered notification ({} chars)", text.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sheets::records::{PaymentRecord, PaymentSheet};

    use super::{NotifyError, attendance_summary, payment_reminder};

    fn player(id: &str, name: &str, paid: &[(&str, bool)]) -> PaymentRecord {
        PaymentRecord {
            id: id.to_string(),
            name: name.to_string(),
            position: String::new(),
            payments: paid
                .iter()
                .map(|(m, p)| (m.to_string(), *p))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn sheet() -> PaymentSheet {
        PaymentSheet {
            months: vec!["January".to_string(), "February".to_string()],
            players: vec![
                player("1", "Alice", &[("January", true), ("February", false)]),
                player("2", "Bob", &[("January", true), ("February", false)]),
            ],
        }
    }

    #[test]
    fn test_reminder_lists_unpaid() {
        let text = payment_reminder(&sheet(), "February").unwrap();

        assert_eq!(text, "Payment reminder for February: 2 outstanding\n- Alice\n- Bob");
    }

    #[test]
    fn test_reminder_all_paid() {
        let text = payment_reminder(&sheet(), "January").unwrap();

        assert_eq!(text, "Everyone is paid up for January.");
    }

    #[test]
    fn test_reminder_unknown_month() {
        let err = payment_reminder(&sheet(), "March").unwrap_err();

        assert!(matches!(err, NotifyError::UnknownMonth(m) if m == "March"));
    }

    #[test]
    fn test_attendance_summary() {
        assert_eq!(
            attendance_summary("2024-01-01", &[]),
            "No attendance recorded for 2024-01-01."
        );
        assert_eq!(
            attendance_summary("2024-01-01", &["Alice".to_string()]),
            "1 player at 2024-01-01: Alice"
        );
        assert_eq!(
            attendance_summary("2024-01-01", &["Alice".to_string(), "Bob".to_string()]),
            "2 players at 2024-01-01: Alice, Bob"
        );
    }
}
