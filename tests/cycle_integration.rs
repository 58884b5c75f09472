//! End-to-end cycle tests against the paper exchange: one profitable tick
//! must drive all three legs in order, and the failure paths must leave the
//! worker in a sane state.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use triarb::config::WorkerConfig;
use triarb::exchange::paper::PaperExchange;
use triarb::exchange::{BookTicker, Precision, Side};
use triarb::strategy::{StrategyController, TriangularStrategy};
use triarb::worker::{ArbitrageWorker, WorkerState};

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        name: "btc-eth-usdt".to_string(),
        pairs: vec![
            "BTC/USDT".to_string(),
            "ETH/BTC".to_string(),
            "ETH/USDT".to_string(),
        ],
        holding_asset: "USDT".to_string(),
        order_amount: dec!(100),
        fee: dec!(0.001),
        min_profitability: dec!(0.002),
    }
}

/// Paper client seeded with a profitable book:
/// spent = 100.00 USDT, received = 101.60 USDT, spread = +1.60.
fn profitable_paper() -> PaperExchange {
    let paper = PaperExchange::new();
    paper.seed_ticker(
        "BTCUSDT",
        BookTicker::new(dec!(50000), dec!(1), dec!(49990), dec!(1)),
    );
    paper.seed_ticker(
        "ETHBTC",
        BookTicker::new(dec!(0.05), dec!(10), dec!(0.0499), dec!(10)),
    );
    paper.seed_ticker(
        "ETHUSDT",
        BookTicker::new(dec!(2550), dec!(5), dec!(2540), dec!(5)),
    );
    paper.seed_precision("BTCUSDT", Precision { base_dp: 5, quote_dp: 2 });
    paper.seed_precision("ETHBTC", Precision { base_dp: 3, quote_dp: 5 });
    paper.seed_precision("ETHUSDT", Precision { base_dp: 4, quote_dp: 2 });
    paper
}

#[tokio::test]
async fn profitable_tick_places_all_three_legs_in_order() {
    let paper = Arc::new(profitable_paper());
    let worker = ArbitrageWorker::new(worker_config(), Arc::clone(&paper) as Arc<dyn triarb::exchange::ExchangeClient>);
    let handle = worker.handle();
    let ct = CancellationToken::new();
    let task = tokio::spawn(worker.execute(ct.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.state(), WorkerState::Running);

    // Any accepted tick triggers evaluation; the book is already profitable.
    paper.push_tick(
        "ETHUSDT",
        BookTicker::new(dec!(2550), dec!(5), dec!(2540), dec!(5)),
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let submissions = paper.submissions();
    assert_eq!(submissions.len(), 3, "all three legs must be placed");

    assert_eq!(submissions[0].symbol(), "BTCUSDT");
    assert_eq!(submissions[0].side(), Side::Buy);
    assert_eq!(submissions[0].quantity(), dec!(0.002));
    assert_eq!(submissions[0].price(), Some(dec!(50000)));

    assert_eq!(submissions[1].symbol(), "ETHBTC");
    assert_eq!(submissions[1].side(), Side::Buy);
    assert_eq!(submissions[1].quantity(), dec!(0.040));
    assert_eq!(submissions[1].price(), Some(dec!(0.05)));

    assert_eq!(submissions[2].symbol(), "ETHUSDT");
    assert_eq!(submissions[2].side(), Side::Sell);
    assert_eq!(submissions[2].quantity(), dec!(0.040));
    assert_eq!(submissions[2].price(), Some(dec!(2540)));

    // All legs settled; back to Running and nothing left to cancel.
    assert_eq!(handle.state(), WorkerState::Running);
    assert!(paper.canceled_ids().is_empty());

    ct.cancel();
    task.await.unwrap();
    assert_eq!(handle.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn unprofitable_book_places_nothing() {
    let paper = Arc::new(profitable_paper());
    let worker = ArbitrageWorker::new(worker_config(), Arc::clone(&paper) as Arc<dyn triarb::exchange::ExchangeClient>);
    let handle = worker.handle();
    let ct = CancellationToken::new();
    let task = tokio::spawn(worker.execute(ct.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    // Collapse the disposal leg: proceeds now round below the cost.
    paper.push_tick(
        "ETHUSDT",
        BookTicker::new(dec!(2500), dec!(5), dec!(2490), dec!(5)),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(paper.submissions().is_empty());
    assert_eq!(handle.state(), WorkerState::Running);

    ct.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn cancellation_during_open_leg_requests_exchange_cancel() {
    // Orders are acknowledged but never fill, so the worker parks on leg 0.
    let paper = Arc::new(profitable_paper().without_auto_fill());
    let worker = ArbitrageWorker::new(worker_config(), Arc::clone(&paper) as Arc<dyn triarb::exchange::ExchangeClient>);
    let handle = worker.handle();
    let ct = CancellationToken::new();
    let task = tokio::spawn(worker.execute(ct.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    paper.push_tick(
        "ETHUSDT",
        BookTicker::new(dec!(2550), dec!(5), dec!(2540), dec!(5)),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    let submissions = paper.submissions();
    assert_eq!(submissions.len(), 1, "stuck on the first leg");
    assert_eq!(handle.state(), WorkerState::ArbitrageStarted);

    ct.cancel();
    task.await.unwrap();

    assert_eq!(handle.state(), WorkerState::Stopped);
    assert!(paper
        .canceled_ids()
        .contains(&submissions[0].client_order_id().to_string()));
}

#[tokio::test]
async fn controller_drives_full_lifecycle() {
    let paper = Arc::new(profitable_paper());
    let strategy = TriangularStrategy::new(
        Arc::clone(&paper) as Arc<dyn triarb::exchange::ExchangeClient>,
        vec![worker_config()],
    );
    let shutdown = CancellationToken::new();
    let controller = Arc::new(StrategyController::new(strategy, shutdown.clone()));

    let runner = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run_until_shutdown().await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.status().await, "btc-eth-usdt RUNNING");

    paper.push_tick(
        "ETHUSDT",
        BookTicker::new(dec!(2550), dec!(5), dec!(2540), dec!(5)),
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(paper.submissions().len(), 3);

    shutdown.cancel();
    runner.await.unwrap();
    assert_eq!(controller.status().await, "strategy stopped");
}
