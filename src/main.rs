//! Perp Risk Engine Simulation.
//!
//! Walks the engine through the commitment lifecycle, funding and utilization
//! drift, a leveraged liquidation with capacity throttling, and account
//! restructuring with debt payment.

use perps_risk::*;
use rust_decimal_macros::dec;

fn main() {
    println!("Perp Risk Engine Simulation");
    println!("Commitment Orders, Skew Pricing, Capacity-Limited Liquidation\n");

    scenario_1_order_lifecycle();
    scenario_2_funding_and_utilization();
    scenario_3_liquidation_cascade();
    scenario_4_restructuring_and_debt();

    println!("\nAll simulations completed successfully.");
}

fn base_engine() -> Engine {
    let mut engine = Engine::new(EngineConfig::default(), GlobalConfig::default());
    // anchor the logical clock at wall time; everything after is relative
    engine.set_time(Timestamp::now());
    engine.add_market(MarketConfig::eth_perp());
    engine
        .set_delegated_collateral(MarketId(1), Usd::new(dec!(10_000_000)))
        .unwrap();
    engine.set_gas_snapshot(GasSnapshot::new(dec!(20), Price::new_unchecked(dec!(2500))));
    push_price(&mut engine, dec!(2500));
    engine
}

fn push_price(engine: &mut Engine, price: rust_decimal::Decimal) {
    let now = engine.time();
    let price = Price::new(price).expect("sim prices are positive");
    engine
        .set_oracle_price(MarketId(1), OraclePrice::new(price, now))
        .unwrap();
}

/// Commit, wait out the price delay, settle with a fresh oracle price.
fn scenario_1_order_lifecycle() {
    println!("Scenario 1: Order Lifecycle\n");

    let mut engine = base_engine();
    let mkt = MarketId(1);
    let owner = ActorId(1);
    let alice = engine.create_account(owner);

    engine.fund_wallet(alice, Usd::new(dec!(50_000))).unwrap();
    engine.deposit(owner, alice, mkt, Usd::new(dec!(50_000))).unwrap();
    println!("  Alice deposits $50,000 margin, oracle at $2,500");

    engine
        .commit_order(
            owner,
            alice,
            mkt,
            SignedSize::new(dec!(10)),
            Price::new_unchecked(dec!(2600)),
            Usd::zero(),
            Vec::new(),
        )
        .unwrap();
    println!("  Alice commits BUY 10 ETH, limit $2,600");

    // too early: still inside the price-delay window
    assert!(matches!(
        engine.settle_order(alice, mkt),
        Err(EngineError::OrderNotReady)
    ));
    println!("  Immediate settlement refused (price delay window)");

    engine.advance_time(13_000);
    push_price(&mut engine, dec!(2505));
    let result = engine.settle_order(alice, mkt).unwrap();
    println!(
        "  Settled: fill ${}, order fee ${}, keeper fee ${}",
        result.fill_price, result.order_fee, result.keeper_fee
    );

    let digest = engine.position_digest(alice, mkt).unwrap();
    println!(
        "  Position: {} ETH @ ${}, health factor {}\n",
        digest.size,
        digest.entry_price.unwrap(),
        digest.health_factor.round_dp(2)
    );
}

/// Skewed markets drift the funding rate; open notional accrues utilization
/// interest against the pool.
fn scenario_2_funding_and_utilization() {
    println!("Scenario 2: Funding and Utilization Drift\n");

    let mut engine = base_engine();
    let mkt = MarketId(1);
    let owner = ActorId(1);
    let alice = engine.create_account(owner);
    engine.fund_wallet(alice, Usd::new(dec!(500_000))).unwrap();
    engine.deposit(owner, alice, mkt, Usd::new(dec!(500_000))).unwrap();

    engine
        .commit_order(
            owner,
            alice,
            mkt,
            SignedSize::new(dec!(100)),
            Price::new_unchecked(dec!(2600)),
            Usd::zero(),
            Vec::new(),
        )
        .unwrap();
    engine.advance_time(13_000);
    push_price(&mut engine, dec!(2500));
    engine.settle_order(alice, mkt).unwrap();
    println!("  Alice long 100 ETH: market skew is now long-heavy");

    // one day later the long-heavy skew has pushed funding positive
    engine.advance_time(86_400_000);
    push_price(&mut engine, dec!(2500));
    let funding_rate = engine.recompute_funding(mkt).unwrap();
    let utilization_rate = engine.recompute_utilization(mkt).unwrap();
    println!(
        "  After 24h: funding rate {}/day, utilization rate {}/yr",
        funding_rate.round_dp(6),
        utilization_rate.round_dp(6)
    );

    let digest = engine.position_digest(alice, mkt).unwrap();
    println!(
        "  Alice accrued funding ${}, utilization interest ${}\n",
        digest.accrued_funding.value().round_dp(2),
        digest.accrued_utilization.value().round_dp(2)
    );
}

/// A 10x long gets caught by a price drop: flag, capacity-limited partial
/// liquidations, then margin-only cleanup of the residual debt.
fn scenario_3_liquidation_cascade() {
    println!("Scenario 3: Liquidation Cascade\n");

    let mut engine = base_engine();
    let mkt = MarketId(1);
    let owner = ActorId(2);
    let keeper = ActorId(99);
    let bob = engine.create_account(owner);

    engine.fund_wallet(bob, Usd::new(dec!(100_000))).unwrap();
    engine.deposit(owner, bob, mkt, Usd::new(dec!(100_000))).unwrap();

    // ~10x leverage: 400 ETH at $2,500 on $100k collateral
    engine
        .commit_order(
            owner,
            bob,
            mkt,
            SignedSize::new(dec!(400)),
            Price::new_unchecked(dec!(2600)),
            Usd::zero(),
            Vec::new(),
        )
        .unwrap();
    engine.advance_time(13_000);
    push_price(&mut engine, dec!(2500));
    engine.settle_order(bob, mkt).unwrap();
    println!("  Bob long 400 ETH @ ~$2,500 on $100,000 collateral");

    // price drops 9%: health falls through 1.0
    engine.advance_time(60_000);
    push_price(&mut engine, dec!(2275));
    let hf = engine.health_factor(bob, mkt).unwrap();
    println!("  Price drops to $2,275, health factor {}", hf.round_dp(3));

    let flag = engine.flag_position(keeper, bob, mkt).unwrap();
    println!("  Keeper flags the position, reward ${}", flag.flag_reward);

    let mut passes = 0;
    while engine
        .get_account(bob)
        .unwrap()
        .position(mkt)
        .is_some()
    {
        match engine.liquidate_position(bob, mkt) {
            Ok(result) => {
                passes += 1;
                println!(
                    "  Pass {}: liquidated {} ETH, remaining {}",
                    passes, result.liquidated_size, result.remaining_size
                );
            }
            Err(EngineError::LiquidationZeroCapacity) => {
                // wait out the rolling window
                engine.advance_time(31_000);
                push_price(&mut engine, dec!(2275));
            }
            Err(e) => panic!("unexpected liquidation error: {e}"),
        }
    }

    let account = engine.get_account(bob).unwrap();
    println!(
        "  Closed in {} passes. Residual collateral ${}, debt ${}",
        passes,
        account.collateral_usd(mkt),
        account.debt_usd(mkt)
    );

    if can_liquidate_margin_only(true, account.collateral_usd(mkt), account.debt_usd(mkt)) {
        let cleanup = engine.liquidate_margin_only(bob, mkt).unwrap();
        println!(
            "  Margin-only cleanup: seized ${}, cleared ${} debt",
            cleanup.seized_collateral, cleanup.cleared_debt
        );
    }
    println!();
}

/// Split a position across accounts, merge it back, and pay down debt.
fn scenario_4_restructuring_and_debt() {
    println!("Scenario 4: Split, Merge and Debt Payment\n");

    let mut engine = base_engine();
    let mkt = MarketId(1);
    let owner = ActorId(3);
    let main = engine.create_account(owner);
    let side = engine.create_account(owner);

    engine.fund_wallet(main, Usd::new(dec!(200_000))).unwrap();
    engine.deposit(owner, main, mkt, Usd::new(dec!(200_000))).unwrap();

    engine
        .commit_order(
            owner,
            main,
            mkt,
            SignedSize::new(dec!(20)),
            Price::new_unchecked(dec!(2600)),
            Usd::zero(),
            Vec::new(),
        )
        .unwrap();
    engine.advance_time(13_000);
    push_price(&mut engine, dec!(2500));
    engine.settle_order(main, mkt).unwrap();

    engine
        .split_account(owner, main, side, mkt, dec!(0.25))
        .unwrap();
    let main_digest = engine.position_digest(main, mkt).unwrap();
    let side_digest = engine.position_digest(side, mkt).unwrap();
    println!(
        "  Split 25%: main holds {} ETH, side holds {} ETH",
        main_digest.size, side_digest.size
    );

    engine.merge_accounts(owner, side, main, mkt).unwrap();
    let merged = engine.position_digest(main, mkt).unwrap();
    println!("  Merged back: main holds {} ETH", merged.size);

    // close out at a lower price; a loss overflowing collateral becomes debt
    engine
        .commit_order(
            owner,
            main,
            mkt,
            SignedSize::new(dec!(-20)),
            Price::new_unchecked(dec!(1000)),
            Usd::zero(),
            Vec::new(),
        )
        .unwrap();
    engine.advance_time(13_000);
    push_price(&mut engine, dec!(2400));
    engine.settle_order(main, mkt).unwrap();

    let account = engine.get_account(main).unwrap();
    let debt = account.debt_usd(mkt);
    if !debt.is_zero() {
        let payment = engine.pay_debt(owner, main, mkt, debt).unwrap();
        println!(
            "  Paid ${} debt (${} collateral, ${} wallet)",
            payment.paid, payment.from_collateral, payment.from_wallet
        );
    } else {
        println!("  Position closed with no residual debt");
    }
    println!(
        "  Events recorded: {}",
        engine.events().len()
    );
}
