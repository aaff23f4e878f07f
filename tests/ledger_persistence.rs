//! Ledger write-through and recovery behavior against mocked and file stores

use async_trait::async_trait;
use breakoutbot::ledger::{AccountState, SaveOutcome, TradeLedger};
use breakoutbot::persistence::{FileStateStore, StateStore};
use breakoutbot::types::{Position, Side};
use mockall::mock;
use mockall::predicate::always;
use std::path::PathBuf;

mock! {
    pub Store {}

    #[async_trait]
    impl StateStore for Store {
        fn describe(&self) -> String;
        async fn read(&self) -> anyhow::Result<Option<AccountState>>;
        async fn write(&self, state: &AccountState) -> anyhow::Result<()>;
    }
}

fn mock_store() -> MockStore {
    let mut store = MockStore::new();
    store.expect_describe().return_const("mock".to_string());
    store
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("breakoutbot_it_{}", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn read_failure_starts_fresh_wallet() {
    let mut store = mock_store();
    store
        .expect_read()
        .times(1)
        .returning(|| Err(anyhow::anyhow!("disk on fire")));

    let ledger = TradeLedger::load(store, 10_000.0).await;
    assert_eq!(ledger.state(), &AccountState::new(10_000.0));
}

#[tokio::test]
async fn inconsistent_document_is_normalized_on_load() {
    let mut broken = AccountState::new(8_000.0);
    broken.position = Position::Short;

    let mut store = mock_store();
    store
        .expect_read()
        .times(1)
        .returning(move || Ok(Some(broken.clone())));

    let ledger = TradeLedger::load(store, 10_000.0).await;
    assert!(ledger.state().is_flat());
    assert_eq!(ledger.state().balance, 8_000.0);
}

#[tokio::test]
async fn each_transition_writes_exactly_once() {
    let mut store = mock_store();
    store.expect_read().times(1).returning(|| Ok(None));
    store
        .expect_write()
        .withf(|s: &AccountState| s.position == Position::Long && s.trade_history.is_empty())
        .times(1)
        .returning(|_| Ok(()));
    store
        .expect_write()
        .withf(|s: &AccountState| s.is_flat() && s.trade_history.len() == 1)
        .times(1)
        .returning(|_| Ok(()));

    let mut ledger = TradeLedger::load(store, 10_000.0).await;
    assert_eq!(ledger.open_position(Side::Long, 105.0, 0.10).await, SaveOutcome::Saved);
    assert_eq!(ledger.close_position(96.0, -90.0).await, SaveOutcome::Saved);
}

#[tokio::test]
async fn write_failure_keeps_in_memory_state() {
    let mut store = mock_store();
    store.expect_read().times(1).returning(|| Ok(None));
    store
        .expect_write()
        .with(always())
        .times(2)
        .returning(|_| Err(anyhow::anyhow!("remote unavailable")));

    let mut ledger = TradeLedger::load(store, 10_000.0).await;
    assert_eq!(ledger.open_position(Side::Short, 2_000.0, 0.5).await, SaveOutcome::Failed);
    assert_eq!(ledger.state().position, Position::Short);

    assert_eq!(ledger.close_position(1_990.0, 500.0).await, SaveOutcome::Failed);
    assert!(ledger.state().is_flat());
    assert_eq!(ledger.state().balance, 10_500.0);
    assert_eq!(ledger.state().trade_history.len(), 1);
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = temp_dir();
    let path = dir.join("bot_state.json");

    {
        let mut ledger = TradeLedger::load(FileStateStore::new(&path), 10_000.0).await;
        ledger.open_position(Side::Long, 105.0, 0.10).await;
        ledger.close_position(96.0, -90.0).await;
        ledger.open_position(Side::Short, 97.0, 0.25).await;
    }

    let restarted = TradeLedger::load(FileStateStore::new(&path), 10_000.0).await;
    let state = restarted.state();
    assert_eq!(state.balance, 9_910.0);
    assert_eq!(state.position, Position::Short);
    assert_eq!(state.entry_price, 97.0);
    assert_eq!(state.quantity, 0.25);
    assert_eq!(state.trade_history.len(), 1);
    assert_eq!(state.trades().next().unwrap().exit_price, 96.0);

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["position"], "SHORT");
    assert_eq!(raw["lots"], 0.25);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn corrupt_file_falls_back_to_default_and_is_kept() {
    let dir = temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bot_state.json");
    std::fs::write(&path, "{\"balance\": \"lots of money\"}").unwrap();

    let ledger = TradeLedger::load(FileStateStore::new(&path), 10_000.0).await;
    assert_eq!(ledger.state(), &AccountState::new(10_000.0));

    // The next save must not destroy the quarantined original
    ledger.save().await;
    let names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("bot_state.json.corrupt-")));
    assert!(names.iter().any(|n| n == "bot_state.json"));

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn file_store_keeps_unfamiliar_history_lines() {
    let dir = temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bot_state.json");
    let foreign = "[2024-05-01 13:00:00] CLOSE LONG @ 96.00 | PnL: $-90.00";
    std::fs::write(
        &path,
        serde_json::json!({
            "balance": 12345.67,
            "position": null,
            "entry_price": 0.0,
            "lots": 0.0,
            "trade_history": [foreign]
        })
        .to_string(),
    )
    .unwrap();

    let mut ledger = TradeLedger::load(FileStateStore::new(&path), 10_000.0).await;
    assert_eq!(ledger.state().balance, 12_345.67);
    ledger.open_position(Side::Long, 105.0, 0.10).await;
    ledger.close_position(96.0, -90.0).await;

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["trade_history"][0], foreign);
    assert_eq!(raw["trade_history"].as_array().unwrap().len(), 2);
    assert!((raw["balance"].as_f64().unwrap() - 12_255.67).abs() < 1e-6);
    assert_eq!(ledger.summary().trades, 1);

    let _ = std::fs::remove_dir_all(dir);
}
