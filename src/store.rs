// 🗃️ Expense Store
// Owns the authoritative record list (most recent first) and persists it
// through a debounced writer thread.

use crate::expense::{Expense, ExpenseError, NewExpense};
use crate::importer::{self, ImportError};
use crate::period::{self, Period};
use crate::storage::Storage;
use crate::summary::{self, Summary};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::path::Path;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_STORAGE_KEY: &str = "expenses";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Key the serialized list lives under
    pub storage_key: String,
    /// Quiet period before a pending write is flushed
    pub debounce: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to add expense: {0}")]
    Invalid(#[from] ExpenseError),
}

/// Filtered records plus their summary, for one period
#[derive(Debug, Clone)]
pub struct ExpenseView<'a> {
    pub period: Period,
    pub expenses: Vec<&'a Expense>,
    pub summary: Summary,
}

pub struct ExpenseStore {
    expenses: Vec<Expense>,
    revision: u64,
    persister: Persister,
}

impl ExpenseStore {
    /// Load the persisted list and start the writer thread
    pub fn open<S: Storage + 'static>(storage: S, config: &StoreConfig) -> Self {
        let expenses = load(&storage, &config.storage_key);
        info!("Loaded {} expenses", expenses.len());

        ExpenseStore {
            expenses,
            revision: 0,
            persister: Persister::spawn(Box::new(storage), config.clone()),
        }
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Expense> {
        self.expenses.iter().find(|e| e.id == id)
    }

    /// Bumped on every mutation; callers key cached views on it
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Add a single expense at the front of the list
    pub fn add(&mut self, candidate: NewExpense) -> Result<&Expense, StoreError> {
        if let Err(e) = candidate.validate() {
            warn!("Rejected expense '{}': {}", candidate.description, e);
            return Err(e.into());
        }

        let expense = Expense::from_candidate(self.fresh_id(), candidate);
        debug!("Adding expense {} ({:.2})", expense.id, expense.amount);
        self.expenses.insert(0, expense);
        self.mutated();

        Ok(&self.expenses[0])
    }

    /// Add a batch ahead of the existing records, keeping batch order.
    ///
    /// Invalid candidates are dropped; returns how many were added.
    pub fn add_many(&mut self, candidates: Vec<NewExpense>) -> usize {
        let mut batch = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if let Err(e) = candidate.validate() {
                warn!("Dropping expense '{}' from batch: {}", candidate.description, e);
                continue;
            }
            let id = loop {
                let id = self.fresh_id();
                if !batch.iter().any(|e: &Expense| e.id == id) {
                    break id;
                }
            };
            batch.push(Expense::from_candidate(id, candidate));
        }

        let added = batch.len();
        if added == 0 {
            return 0;
        }

        batch.append(&mut self.expenses);
        self.expenses = batch;
        self.mutated();

        info!("Added {} expenses", added);
        added
    }

    /// Import a CSV file; on any error the record set is left untouched
    pub fn import_file(&mut self, file_path: &Path) -> Result<usize, ImportError> {
        let report = importer::import_file(file_path)?;
        let skipped = report.skipped_count();
        let added = self.add_many(report.into_expenses());

        info!(
            "Imported {} expenses from {} ({} rows skipped)",
            added,
            file_path.display(),
            skipped
        );
        Ok(added)
    }

    pub fn filtered(&self, period: Period) -> Vec<&Expense> {
        period::filter_by_period(&self.expenses, period)
    }

    /// Current filtered view + summary for `period`
    pub fn view(&self, period: Period) -> ExpenseView<'_> {
        let expenses = self.filtered(period);
        let summary = summary::summarize(expenses.iter().copied());
        ExpenseView {
            period,
            expenses,
            summary,
        }
    }

    /// Write any pending snapshot now and wait for it
    pub fn flush(&self) {
        self.persister.flush();
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = uuid::Uuid::new_v4().to_string();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    fn mutated(&mut self) {
        self.revision += 1;
        self.persister.schedule(self.expenses.clone());
    }
}

/// Read the persisted list; anything unreadable becomes an empty list
fn load(storage: &dyn Storage, key: &str) -> Vec<Expense> {
    let raw = match storage.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            error!("Failed to load expenses: {:#}", e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<Expense>>(&raw) {
        Ok(expenses) => expenses,
        Err(e) => {
            warn!("Stored expenses are malformed, starting empty: {}", e);
            Vec::new()
        }
    }
}

// ============================================================================
// DEBOUNCED PERSISTENCE
// ============================================================================

enum Command {
    Save(Vec<Expense>),
    Flush(Sender<()>),
}

struct Persister {
    tx: Option<Sender<Command>>,
    handle: Option<JoinHandle<()>>,
}

impl Persister {
    fn spawn(storage: Box<dyn Storage>, config: StoreConfig) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = std::thread::Builder::new()
            .name("expense-persister".to_string())
            .spawn(move || run_persister(rx, storage.as_ref(), &config));

        match handle {
            Ok(handle) => Persister {
                tx: Some(tx),
                handle: Some(handle),
            },
            Err(e) => {
                error!("Failed to start persistence thread, changes will not be saved: {}", e);
                Persister {
                    tx: None,
                    handle: None,
                }
            }
        }
    }

    fn schedule(&self, snapshot: Vec<Expense>) {
        if let Some(tx) = &self.tx {
            if tx.send(Command::Save(snapshot)).is_err() {
                error!("Persistence thread is gone, dropping write");
            }
        }
    }

    fn flush(&self) {
        let Some(tx) = &self.tx else { return };
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl Drop for Persister {
    fn drop(&mut self) {
        // Closing the channel makes the writer flush what it holds and exit
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Persistence thread panicked");
            }
        }
    }
}

fn run_persister(rx: Receiver<Command>, storage: &dyn Storage, config: &StoreConfig) {
    loop {
        let mut pending = match rx.recv() {
            Ok(Command::Save(snapshot)) => snapshot,
            Ok(Command::Flush(ack)) => {
                let _ = ack.send(());
                continue;
            }
            Err(_) => return,
        };

        // Every new snapshot restarts the quiet window
        loop {
            match rx.recv_timeout(config.debounce) {
                Ok(Command::Save(snapshot)) => pending = snapshot,
                Ok(Command::Flush(ack)) => {
                    persist(storage, &config.storage_key, &pending);
                    let _ = ack.send(());
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    persist(storage, &config.storage_key, &pending);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    persist(storage, &config.storage_key, &pending);
                    return;
                }
            }
        }
    }
}

fn persist(storage: &dyn Storage, key: &str, expenses: &[Expense]) {
    let json = match serde_json::to_string(expenses) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize expenses: {}", e);
            return;
        }
    };

    match storage.write(key, &json) {
        Ok(()) => debug!("Persisted {} expenses", expenses.len()),
        Err(e) => error!("Failed to save expenses: {:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use std::collections::HashSet;

    fn config(debounce_ms: u64) -> StoreConfig {
        StoreConfig {
            storage_key: "expenses".to_string(),
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    fn candidate(description: &str, amount: f64) -> NewExpense {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 8, 45, 30).unwrap();
        NewExpense::new(description, amount, "Food", date)
    }

    fn descriptions(store: &ExpenseStore) -> Vec<String> {
        store.expenses().iter().map(|e| e.description.clone()).collect()
    }

    #[test]
    fn test_add_prepends_and_assigns_id() {
        let mut store = ExpenseStore::open(MemoryStorage::new(), &config(10));

        let first_id = store.add(candidate("Coffee", 4.5)).unwrap().id.clone();
        store.add(candidate("Lunch", 12.0)).unwrap();

        assert_eq!(descriptions(&store), vec!["Lunch", "Coffee"]);
        assert!(!first_id.is_empty());
        assert!(store.get(&first_id).is_some());
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_add_rejects_invalid_without_mutation() {
        let storage = MemoryStorage::new();
        let mut store = ExpenseStore::open(storage.clone(), &config(10));

        let result = store.add(candidate("Freebie", 0.0));

        assert!(matches!(
            result,
            Err(StoreError::Invalid(ExpenseError::NonPositiveAmount(_)))
        ));
        assert!(store.is_empty());
        assert_eq!(store.revision(), 0);

        store.flush();
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_add_many_on_empty_store() {
        let mut store = ExpenseStore::open(MemoryStorage::new(), &config(10));

        let batch: Vec<NewExpense> = (1..=25)
            .map(|i| candidate(&format!("item {}", i), i as f64))
            .collect();
        let added = store.add_many(batch);

        assert_eq!(added, 25);
        assert_eq!(store.len(), 25);

        let ids: HashSet<&str> = store.expenses().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 25);

        let expected: Vec<String> = (1..=25).map(|i| format!("item {}", i)).collect();
        assert_eq!(descriptions(&store), expected);
    }

    #[test]
    fn test_add_many_goes_ahead_of_existing_and_skips_invalid() {
        let mut store = ExpenseStore::open(MemoryStorage::new(), &config(10));
        store.add(candidate("old", 1.0)).unwrap();

        let added = store.add_many(vec![
            candidate("new 1", 2.0),
            candidate("broken", -1.0),
            candidate("new 2", 3.0),
        ]);

        assert_eq!(added, 2);
        assert_eq!(descriptions(&store), vec!["new 1", "new 2", "old"]);

        assert_eq!(store.add_many(Vec::new()), 0);
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_burst_of_mutations_is_one_write() {
        let storage = MemoryStorage::new();
        let mut store = ExpenseStore::open(storage.clone(), &config(10_000));

        for i in 0..5 {
            store.add(candidate(&format!("burst {}", i), 1.0)).unwrap();
        }
        assert_eq!(storage.write_count(), 0);

        store.flush();
        assert_eq!(storage.write_count(), 1);

        let saved: Vec<Expense> =
            serde_json::from_str(&storage.read("expenses").unwrap().unwrap()).unwrap();
        assert_eq!(saved.len(), 5);
    }

    #[test]
    fn test_write_happens_after_quiet_period() {
        let storage = MemoryStorage::new();
        let mut store = ExpenseStore::open(storage.clone(), &config(20));

        store.add(candidate("Coffee", 4.5)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while storage.write_count() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn test_round_trip_through_storage() {
        let storage = MemoryStorage::new();
        let original: Vec<Expense>;

        {
            let mut store = ExpenseStore::open(storage.clone(), &config(10_000));
            store
                .add(candidate("Coffee", 4.5).with_notes("Morning coffee"))
                .unwrap();
            store.add(candidate("Bus fare", 2.75)).unwrap();
            original = store.expenses().to_vec();
            // Dropping the store flushes the pending write
        }

        let reloaded = ExpenseStore::open(storage, &config(10_000));
        assert_eq!(reloaded.expenses(), original.as_slice());
        assert_eq!(
            reloaded.expenses()[1].date,
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 45, 30).unwrap()
        );
        assert_eq!(
            reloaded.expenses()[1].notes.as_deref(),
            Some("Morning coffee")
        );
    }

    /// Backend whose every read and write fails
    struct FailingStorage;

    impl Storage for FailingStorage {
        fn read(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("disk unavailable")
        }

        fn write(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_failing_storage_keeps_memory_state() {
        let mut store = ExpenseStore::open(FailingStorage, &config(10_000));
        assert!(store.is_empty());

        store.add(candidate("Coffee", 4.5)).unwrap();
        let added = store.add_many(vec![candidate("Lunch", 12.0), candidate("Bus", 2.75)]);
        assert_eq!(added, 2);

        store.flush();
        assert_eq!(descriptions(&store), vec!["Lunch", "Bus", "Coffee"]);
        assert_eq!(store.view(Period::All).summary.count, 3);
    }

    #[test]
    fn test_malformed_storage_loads_empty() {
        let storage = MemoryStorage::new();
        storage.write("expenses", "{not json").unwrap();

        let store = ExpenseStore::open(storage, &config(10));
        assert!(store.is_empty());
    }

    #[test]
    fn test_import_file_error_leaves_store_untouched() {
        let mut store = ExpenseStore::open(MemoryStorage::new(), &config(10));
        store.add(candidate("existing", 5.0)).unwrap();

        let result = store.import_file(Path::new("statement.pdf"));

        assert!(matches!(result, Err(ImportError::UnsupportedFileType { .. })));
        assert_eq!(store.len(), 1);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_view_filters_and_summarizes() {
        let mut store = ExpenseStore::open(MemoryStorage::new(), &config(10));
        let now: DateTime<Utc> = Utc::now();

        let mut recent = candidate("recent", 10.0);
        recent.date = now;
        let mut ancient = candidate("ancient", 99.0);
        ancient.date = now - ChronoDuration::days(800);
        store.add_many(vec![recent, ancient]);

        let all = store.view(Period::All);
        assert_eq!(all.expenses.len(), 2);
        assert_eq!(all.summary.count, 2);

        let year = store.view(Period::Year);
        assert_eq!(year.expenses.len(), 1);
        assert_eq!(year.expenses[0].description, "recent");
        assert_eq!(year.summary.total, 10.0);
    }
}
