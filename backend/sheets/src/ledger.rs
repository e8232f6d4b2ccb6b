//! # Ledgers
//!
//! Typed view over the two worksheets the club keeps.
//!
//! ## Payment ledger
//! `id | name | position | <month> | <month> | ...`, cells `TRUE`/`FALSE`.
//!
//! ## Attendance ledger
//! `name | <date> | <date> | ...`, cells `P` or blank. The name doubles as the player id.
//!
//! ## Rules
//! - Header labels are resolved to columns on every call, nothing is cached between calls
//! - Short rows are padded with blanks, never an error
//! - A new date column is appended to the right of the last header, under a lock so sequential
//!   and same-process concurrent submissions never create duplicate date columns
//! - Every store call runs under a timeout, expiry counts as the store being unavailable
use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::timeout};
use tracing::{debug, info, warn};

use crate::{
    address::CellAddress,
    error::LedgerError,
    records::{
        AttendanceRecord, AttendanceSummary, PaymentRecord, PaymentSheet, PlayerDetail, Presence,
        SubmitOutcome, decode_paid, encode_paid,
    },
    store::{CellWrite, GridStore, StoreError},
};

pub const DEFAULT_PAYMENTS_SHEET: &str = "PAYMENTS2026";
pub const DEFAULT_ATTENDANCE_SHEET: &str = "ATTENDANCE 2026";

const ID_COL: usize = 1;
const NAME_COL: usize = 1;
const HEADER_ROW: usize = 1;
const FIRST_MONTH_INDEX: usize = 3;
const FIRST_DATE_INDEX: usize = 1;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub payments_sheet: String,
    pub attendance_sheet: String,
    pub call_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            payments_sheet: DEFAULT_PAYMENTS_SHEET.to_string(),
            attendance_sheet: DEFAULT_ATTENDANCE_SHEET.to_string(),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// 1-based column of `label`, searching only from `first_index` onward so identity columns never match.
fn label_column(headers: &[String], label: &str, first_index: usize) -> Option<usize> {
    headers
        .iter()
        .skip(first_index)
        .position(|header| header == label)
        .map(|offset| first_index + offset + 1)
}

pub struct Ledger {
    store: Arc<dyn GridStore>,
    config: LedgerConfig,
    date_column_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(store: Arc<dyn GridStore>, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            date_column_lock: Mutex::new(()),
        }
    }

    async fn call<T, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match timeout(self.config.call_timeout, fut).await {
            Ok(result) => result.map_err(|e| {
                warn!("Store call failed: {e}");
                e.into()
            }),
            Err(_) => {
                warn!("Store call timed out after {:?}", self.config.call_timeout);
                Err(LedgerError::StoreUnavailable(format!(
                    "timed out after {}ms",
                    self.config.call_timeout.as_millis()
                )))
            }
        }
    }

    pub async fn list_payments(&self) -> Result<PaymentSheet, LedgerError> {
        let sheet = &self.config.payments_sheet;
        let rows = self.call(self.store.read_all(sheet)).await?;

        let Some((headers, rows)) = rows.split_first() else {
            return Err(LedgerError::EmptyLedger(sheet.clone()));
        };

        let months: Vec<String> = headers.iter().skip(FIRST_MONTH_INDEX).cloned().collect();

        let players = rows
            .iter()
            .filter(|row| row.len() >= 2 && !row[0].is_empty())
            .map(|row| PaymentRecord {
                id: row[0].clone(),
                name: row[1].clone(),
                position: row.get(2).cloned().unwrap_or_default(),
                payments: months
                    .iter()
                    .enumerate()
                    .map(|(offset, month)| {
                        let paid = row
                            .get(FIRST_MONTH_INDEX + offset)
                            .is_some_and(|cell| decode_paid(cell));
                        (month.clone(), paid)
                    })
                    .collect(),
            })
            .collect();

        Ok(PaymentSheet { months, players })
    }

    pub async fn set_payment(&self, id: &str, month: &str, paid: bool) -> Result<(), LedgerError> {
        let sheet = &self.config.payments_sheet;

        let headers = self.call(self.store.read_row(sheet, HEADER_ROW)).await?;
        let col = label_column(&headers, month, FIRST_MONTH_INDEX)
            .ok_or_else(|| LedgerError::ColumnNotFound(month.to_string()))?;

        let cell = self
            .call(self.store.find_in_column(sheet, ID_COL, id))
            .await?
            .filter(|cell| cell.row > HEADER_ROW && !id.is_empty())
            .ok_or_else(|| LedgerError::RecordNotFound(format!("ID '{id}'")))?;

        let address = CellAddress::new(cell.row, col);
        self.call(self.store.write_cell(sheet, address, encode_paid(paid)))
            .await?;

        info!("Payment {id} {month} set to {paid}");
        Ok(())
    }

    pub async fn list_roster(&self) -> Result<Vec<String>, LedgerError> {
        let names = self
            .call(self.store.read_column(&self.config.attendance_sheet, NAME_COL))
            .await?;

        Ok(names
            .into_iter()
            .skip(1)
            .filter(|name| !name.trim().is_empty())
            .collect())
    }

    /// Names marked present on `date`. An unknown date is a normal, empty result.
    pub async fn present_on(&self, date: &str) -> Result<Vec<String>, LedgerError> {
        if date.is_empty() {
            return Ok(Vec::new());
        }

        let sheet = &self.config.attendance_sheet;
        let headers = self.call(self.store.read_row(sheet, HEADER_ROW)).await?;

        let Some(col) = label_column(&headers, date, FIRST_DATE_INDEX) else {
            debug!("No attendance column for {date}");
            return Ok(Vec::new());
        };

        let statuses = self.call(self.store.read_column(sheet, col)).await?;
        let names = self.call(self.store.read_column(sheet, NAME_COL)).await?;

        Ok(names
            .into_iter()
            .enumerate()
            .skip(1)
            .filter(|(i, name)| {
                let status = statuses.get(*i).map(String::as_str).unwrap_or_default();
                !name.trim().is_empty() && Presence::decode(status).is_present()
            })
            .map(|(_, name)| name)
            .collect())
    }

    /// Returns the column holding `date`, appending it after the last header when missing.
    async fn date_column(&self, date: &str) -> Result<(usize, bool), LedgerError> {
        let sheet = &self.config.attendance_sheet;
        let _guard = self.date_column_lock.lock().await;

        let headers = self.call(self.store.read_row(sheet, HEADER_ROW)).await?;
        if headers.first().is_some_and(|label| label == date) {
            warn!("Refusing to write attendance into the name column '{date}'");
            return Err(LedgerError::ColumnNotFound(date.to_string()));
        }
        if let Some(col) = label_column(&headers, date, FIRST_DATE_INDEX) {
            return Ok((col, false));
        }

        let col = headers.len().max(FIRST_DATE_INDEX) + 1;
        self.call(
            self.store
                .write_cell(sheet, CellAddress::new(HEADER_ROW, col), date),
        )
        .await?;

        info!("Created attendance column {col} for {date}");
        Ok((col, true))
    }

    pub async fn submit_attendance(
        &self,
        date: &str,
        present: &HashSet<String>,
    ) -> Result<SubmitOutcome, LedgerError> {
        if date.is_empty() {
            return Err(LedgerError::ColumnNotFound(date.to_string()));
        }

        let sheet = &self.config.attendance_sheet;
        let (col, column_created) = self.date_column(date).await?;
        let names = self.call(self.store.read_column(sheet, NAME_COL)).await?;

        let writes: Vec<CellWrite> = names
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, name)| {
                let presence = Presence::from_flag(present.contains(name));
                CellWrite::new(i + 1, col, presence.code())
            })
            .collect();

        if !writes.is_empty() {
            let total = writes.len();
            timeout(self.config.call_timeout, self.store.write_cells(sheet, &writes))
                .await
                .map_err(|_| {
                    warn!("Attendance batch for {date} timed out, outcome unknown");
                    LedgerError::StoreUnavailable(format!(
                        "timed out after {}ms",
                        self.config.call_timeout.as_millis()
                    ))
                })?
                .map_err(|e| {
                    warn!("Attendance batch for {date} failed: {e}");
                    LedgerError::from_batch(e, total)
                })?;
        }

        info!("Attendance saved for {date}: {} rows", writes.len());
        Ok(SubmitOutcome {
            date: date.to_string(),
            column_created,
            rows_written: writes.len(),
        })
    }

    pub async fn history(&self) -> Result<AttendanceSummary, LedgerError> {
        let rows = self
            .call(self.store.read_all(&self.config.attendance_sheet))
            .await?;

        let Some((headers, rows)) = rows.split_first() else {
            return Ok(AttendanceSummary {
                dates: Vec::new(),
                records: Vec::new(),
            });
        };

        let dates: Vec<String> = headers.iter().skip(FIRST_DATE_INDEX).cloned().collect();

        let records = rows
            .iter()
            .filter(|row| row.first().is_some_and(|name| !name.trim().is_empty()))
            .map(|row| {
                let history: Vec<Presence> = (0..dates.len())
                    .map(|offset| {
                        let cell = row.get(FIRST_DATE_INDEX + offset);
                        Presence::decode(cell.map(String::as_str).unwrap_or_default())
                    })
                    .collect();

                AttendanceRecord {
                    name: row[0].clone(),
                    total: history.iter().filter(|p| p.is_present()).count(),
                    history,
                }
            })
            .collect();

        Ok(AttendanceSummary { dates, records })
    }

    pub async fn player_detail(&self, name: &str) -> Result<PlayerDetail, LedgerError> {
        let sheet = &self.config.attendance_sheet;

        let cell = self
            .call(self.store.find_in_column(sheet, NAME_COL, name))
            .await?
            .filter(|cell| cell.row > HEADER_ROW && !name.is_empty())
            .ok_or_else(|| LedgerError::RecordNotFound(format!("Player '{name}'")))?;

        let headers = self.call(self.store.read_row(sheet, HEADER_ROW)).await?;
        let row = self.call(self.store.read_row(sheet, cell.row)).await?;

        let mut dates: Vec<String> = headers
            .iter()
            .enumerate()
            .skip(FIRST_DATE_INDEX)
            .filter(|(i, _)| {
                Presence::decode(row.get(*i).map(String::as_str).unwrap_or_default()).is_present()
            })
            .map(|(_, date)| date.clone())
            .collect();

        // Lexical, not chronological. Only reliable for zero-padded ISO labels.
        dates.sort_by(|a, b| b.cmp(a));

        Ok(PlayerDetail {
            name: name.to_string(),
            total: dates.len(),
            dates,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, time::Duration};

    use async_trait::async_trait;

    use super::{Ledger, LedgerConfig};
    use crate::{
        address::CellAddress,
        error::LedgerError,
        memory::MemoryGrid,
        records::Presence,
        store::{BatchWriteError, CellWrite, GridStore, Row, StoreError},
    };

    const PAY: &str = "PAYMENTS2026";
    const ATT: &str = "ATTENDANCE 2026";

    fn fixture() -> Arc<MemoryGrid> {
        Arc::new(
            MemoryGrid::new()
                .with_sheet(
                    PAY,
                    vec![
                        vec!["id", "name", "position", "January", "February"],
                        vec!["1", "Alice", "Forward", "TRUE", ""],
                        vec!["2", "Bob"],
                        vec!["", "Ghost", "Goalie", "TRUE"],
                        vec!["3"],
                    ],
                )
                .with_sheet(
                    ATT,
                    vec![
                        vec!["name", "2024-01-01"],
                        vec!["Alice", "P"],
                        vec!["Bob", ""],
                        vec!["Carol"],
                    ],
                ),
        )
    }

    fn ledger(grid: Arc<MemoryGrid>) -> Ledger {
        Ledger::new(grid, LedgerConfig::default())
    }

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[tokio::test]
    async fn test_list_payments() {
        let sheet = ledger(fixture()).list_payments().await.unwrap();

        assert_eq!(sheet.months, vec!["January", "February"]);
        assert_eq!(sheet.players.len(), 2);

        let alice = &sheet.players[0];
        assert_eq!(alice.id, "1");
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.position, "Forward");
        assert_eq!(alice.payments["January"], true);
        assert_eq!(alice.payments["February"], false);

        let bob = &sheet.players[1];
        assert_eq!(bob.position, "");
        assert!(bob.payments.values().all(|paid| !paid));
    }

    #[tokio::test]
    async fn test_list_payments_empty_ledger() {
        let grid = Arc::new(MemoryGrid::new().with_sheet(PAY, Vec::<Vec<&str>>::new()));

        let err = ledger(grid).list_payments().await.unwrap_err();
        assert_eq!(err, LedgerError::EmptyLedger(PAY.to_string()));
    }

    #[tokio::test]
    async fn test_set_payment_roundtrip() {
        let ledger = ledger(fixture());

        ledger.set_payment("2", "February", true).await.unwrap();
        ledger.set_payment("2", "February", true).await.unwrap();
        let sheet = ledger.list_payments().await.unwrap();
        assert!(sheet.players[1].payments["February"]);

        ledger.set_payment("2", "February", false).await.unwrap();
        let sheet = ledger.list_payments().await.unwrap();
        assert!(!sheet.players[1].payments["February"]);
    }

    #[tokio::test]
    async fn test_set_payment_writes_canonical_strings() {
        let grid = fixture();
        let ledger = ledger(grid.clone());

        ledger.set_payment("1", "January", false).await.unwrap();
        ledger.set_payment("1", "February", true).await.unwrap();

        let rows = grid.snapshot(PAY).await.unwrap();
        assert_eq!(rows[1], vec!["1", "Alice", "Forward", "FALSE", "TRUE"]);
    }

    #[tokio::test]
    async fn test_set_payment_unknown_month() {
        let err = ledger(fixture())
            .set_payment("1", "March", true)
            .await
            .unwrap_err();

        assert_eq!(err, LedgerError::ColumnNotFound("March".to_string()));
    }

    #[tokio::test]
    async fn test_set_payment_unknown_id() {
        let ledger = ledger(fixture());

        let err = ledger.set_payment("99", "January", true).await.unwrap_err();
        assert!(matches!(err, LedgerError::RecordNotFound(_)));

        let err = ledger.set_payment("id", "January", true).await.unwrap_err();
        assert!(matches!(err, LedgerError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn test_set_payment_ignores_identity_columns() {
        let grid = fixture();
        let ledger = ledger(grid.clone());

        for label in ["id", "name", "position"] {
            let err = ledger.set_payment("1", label, true).await.unwrap_err();
            assert_eq!(err, LedgerError::ColumnNotFound(label.to_string()));
        }

        let rows = grid.snapshot(PAY).await.unwrap();
        assert_eq!(rows[1], vec!["1", "Alice", "Forward", "TRUE"]);
        ledger.set_payment("1", "January", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_roster() {
        let grid = Arc::new(MemoryGrid::new().with_sheet(
            ATT,
            vec![vec!["name"], vec!["Alice"], vec!["  "], vec!["Bob"]],
        ));

        let roster = ledger(grid).list_roster().await.unwrap();
        assert_eq!(roster, vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_present_on() {
        let ledger = ledger(fixture());

        assert_eq!(ledger.present_on("2024-01-01").await.unwrap(), vec!["Alice"]);
        assert!(ledger.present_on("2099-01-01").await.unwrap().is_empty());
        assert!(ledger.present_on("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_label_is_not_a_date() {
        let grid = fixture();
        let ledger = ledger(grid.clone());

        assert!(ledger.present_on("name").await.unwrap().is_empty());

        let err = ledger
            .submit_attendance("name", &names(&["Alice"]))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::ColumnNotFound("name".to_string()));

        let rows = grid.snapshot(ATT).await.unwrap();
        assert_eq!(rows[0], vec!["name", "2024-01-01"]);
        assert_eq!(rows[1], vec!["Alice", "P"]);
        assert_eq!(ledger.list_roster().await.unwrap(), vec!["Alice", "Bob", "Carol"]);
    }

    #[tokio::test]
    async fn test_first_date_lands_after_name_column() {
        let grid = Arc::new(MemoryGrid::new().with_sheet(ATT, vec![vec![""], vec!["Alice"]]));
        let ledger = ledger(grid.clone());

        ledger
            .submit_attendance("2024-01-01", &names(&["Alice"]))
            .await
            .unwrap();

        let rows = grid.snapshot(ATT).await.unwrap();
        assert_eq!(rows[0], vec!["", "2024-01-01"]);
        assert_eq!(rows[1], vec!["Alice", "P"]);
    }

    #[tokio::test]
    async fn test_submit_then_present_on() {
        let ledger = ledger(fixture());
        let roster = ["Alice", "Bob", "Carol"];

        for subset in [vec![], vec!["Bob"], vec!["Carol", "Alice"], roster.to_vec()] {
            ledger
                .submit_attendance("2024-02-05", &names(&subset))
                .await
                .unwrap();

            let present = ledger.present_on("2024-02-05").await.unwrap();
            let mut expected: Vec<String> = subset.iter().map(|s| s.to_string()).collect();
            expected.sort();
            assert_eq!(sorted(present), expected);
        }
    }

    #[tokio::test]
    async fn test_submit_new_date_appends_one_column() {
        let grid = fixture();
        let ledger = ledger(grid.clone());

        let first = ledger
            .submit_attendance("2024-02-05", &names(&["Bob"]))
            .await
            .unwrap();
        assert!(first.column_created);
        assert_eq!(first.rows_written, 3);

        let second = ledger
            .submit_attendance("2024-02-05", &names(&["Alice"]))
            .await
            .unwrap();
        assert!(!second.column_created);

        let rows = grid.snapshot(ATT).await.unwrap();
        assert_eq!(rows[0], vec!["name", "2024-01-01", "2024-02-05"]);
        assert_eq!(rows[1], vec!["Alice", "P", "P"]);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_share_new_column() {
        let grid = fixture();
        let ledger = Arc::new(ledger(grid.clone()));

        let a = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.submit_attendance("2024-03-01", &names(&["Alice"])).await }
        });
        let b = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.submit_attendance("2024-03-01", &names(&["Alice"])).await }
        });

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let header = &grid.snapshot(ATT).await.unwrap()[0];
        assert_eq!(header.iter().filter(|h| *h == "2024-03-01").count(), 1);
    }

    #[tokio::test]
    async fn test_submit_partial_failure() {
        let grid = fixture();
        grid.fail_batches_after(Some(1)).await;

        let err = ledger(grid.clone())
            .submit_attendance("2024-01-01", &names(&["Bob"]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::PartialBatchFailure {
                applied: 1,
                total: 3,
                failed_at: "B3".to_string(),
                reason: "Store unavailable: injected batch failure".to_string(),
            }
        );

        let rows = grid.snapshot(ATT).await.unwrap();
        assert_eq!(rows[1], vec!["Alice"]);
        assert_eq!(rows[2], vec!["Bob"]);
    }

    #[tokio::test]
    async fn test_submit_total_failure_is_not_partial() {
        let grid = fixture();
        grid.fail_batches_after(Some(0)).await;

        let err = ledger(grid)
            .submit_attendance("2024-01-01", &names(&["Bob"]))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_history_pads_short_rows() {
        let grid = Arc::new(MemoryGrid::new().with_sheet(
            ATT,
            vec![
                vec!["name", "2024-01-10", "2024-02-05", "2024-01-20"],
                vec!["Alice", "P", "", "p"],
                vec!["Bob"],
                vec!["", "P"],
            ],
        ));

        let summary = ledger(grid).history().await.unwrap();

        assert_eq!(summary.dates, vec!["2024-01-10", "2024-02-05", "2024-01-20"]);
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.records[0].total, 2);
        assert_eq!(summary.records[1].history, vec![Presence::Absent; 3]);
        assert_eq!(summary.records[1].total, 0);
    }

    #[tokio::test]
    async fn test_history_of_empty_ledger() {
        let grid = Arc::new(MemoryGrid::new().with_sheet(ATT, Vec::<Vec<&str>>::new()));

        let summary = ledger(grid).history().await.unwrap();
        assert!(summary.dates.is_empty());
        assert!(summary.records.is_empty());
    }

    #[tokio::test]
    async fn test_player_detail_reverse_lexical() {
        let grid = Arc::new(MemoryGrid::new().with_sheet(
            ATT,
            vec![
                vec!["name", "2024-01-10", "2024-02-05", "2024-01-20"],
                vec!["Alice", "P", "P"],
            ],
        ));
        let ledger = ledger(grid);

        let detail = ledger.player_detail("Alice").await.unwrap();
        assert_eq!(detail.total, 2);
        assert_eq!(detail.dates, vec!["2024-02-05", "2024-01-10"]);

        let summary = ledger.history().await.unwrap();
        let present: Vec<&String> = summary
            .dates
            .iter()
            .zip(&summary.records[0].history)
            .filter(|(_, p)| p.is_present())
            .map(|(d, _)| d)
            .collect();
        assert!(detail.dates.iter().all(|d| present.contains(&d)));
    }

    #[tokio::test]
    async fn test_player_detail_not_found() {
        let err = ledger(fixture())
            .player_detail("NotAPlayer")
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::RecordNotFound(_)));
    }

    struct Stalled;

    #[async_trait]
    impl GridStore for Stalled {
        async fn read_all(&self, _: &str) -> Result<Vec<Row>, StoreError> {
            std::future::pending().await
        }

        async fn read_row(&self, _: &str, _: usize) -> Result<Row, StoreError> {
            std::future::pending().await
        }

        async fn read_column(&self, _: &str, _: usize) -> Result<Vec<String>, StoreError> {
            std::future::pending().await
        }

        async fn find_in_column(
            &self,
            _: &str,
            _: usize,
            _: &str,
        ) -> Result<Option<CellAddress>, StoreError> {
            std::future::pending().await
        }

        async fn write_cell(&self, _: &str, _: CellAddress, _: &str) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn write_cells(&self, _: &str, _: &[CellWrite]) -> Result<(), BatchWriteError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let ledger = Ledger::new(
            Arc::new(Stalled),
            LedgerConfig {
                call_timeout: Duration::from_millis(20),
                ..LedgerConfig::default()
            },
        );

        let err = ledger.list_roster().await.unwrap_err();
        assert!(matches!(err, LedgerError::StoreUnavailable(_)));
    }
}
