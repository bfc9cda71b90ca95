//! Liquidation path tests: flagging, capacity-limited partial close-out, and
//! margin-only liquidation of residual debt.

use perps_risk::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const MKT: MarketId = MarketId(1);
const OWNER: ActorId = ActorId(1);
const KEEPER: ActorId = ActorId(99);

fn engine() -> Engine {
    let mut engine = Engine::new(EngineConfig::default(), GlobalConfig::default());
    engine.set_time(Timestamp::from_millis(1_000_000));
    engine.add_market(MarketConfig::eth_perp());
    engine
        .set_delegated_collateral(MKT, Usd::new(dec!(10_000_000)))
        .unwrap();
    engine.set_gas_snapshot(GasSnapshot::new(dec!(20), Price::new_unchecked(dec!(2500))));
    push_price(&mut engine, dec!(2500));
    engine
}

fn push_price(engine: &mut Engine, price: Decimal) {
    let now = engine.time();
    engine
        .set_oracle_price(MKT, OraclePrice::new(Price::new_unchecked(price), now))
        .unwrap();
}

fn funded_account(engine: &mut Engine, usd: Decimal) -> AccountId {
    let id = engine.create_account(OWNER);
    engine.fund_wallet(id, Usd::new(usd)).unwrap();
    engine.deposit(OWNER, id, MKT, Usd::new(usd)).unwrap();
    id
}

fn open_position(engine: &mut Engine, acct: AccountId, size: Decimal) {
    engine
        .commit_order(
            OWNER,
            acct,
            MKT,
            SignedSize::new(size),
            Price::new_unchecked(dec!(3000)),
            Usd::zero(),
            Vec::new(),
        )
        .unwrap();
    engine.advance_time(13_000);
    push_price(engine, dec!(2500));
    engine.settle_order(acct, MKT).unwrap();
}

/// 400 ETH at ~10x leverage, then a 9% drop.
fn underwater_whale(engine: &mut Engine) -> AccountId {
    let bob = funded_account(engine, dec!(100_000));
    open_position(engine, bob, dec!(400));
    engine.advance_time(60_000);
    push_price(engine, dec!(2275));
    bob
}

#[test]
fn healthy_positions_cannot_be_flagged() {
    let mut engine = engine();
    let alice = funded_account(&mut engine, dec!(100_000));
    open_position(&mut engine, alice, dec!(10));

    assert!(engine.health_factor(alice, MKT).unwrap() >= Decimal::ONE);
    assert!(matches!(
        engine.flag_position(KEEPER, alice, MKT),
        Err(EngineError::CannotLiquidatePosition)
    ));
}

#[test]
fn flagging_requires_a_position() {
    let mut engine = engine();
    let alice = funded_account(&mut engine, dec!(100_000));
    assert!(matches!(
        engine.flag_position(KEEPER, alice, MKT),
        Err(EngineError::PositionNotFound)
    ));
}

#[test]
fn flag_charges_reward_and_freezes_the_account() {
    let mut engine = engine();
    let bob = underwater_whale(&mut engine);

    let hf = engine.health_factor(bob, MKT).unwrap();
    assert!(hf < Decimal::ONE);

    let before = engine.get_account(bob).unwrap().collateral_usd(MKT);
    let flag = engine.flag_position(KEEPER, bob, MKT).unwrap();
    assert_eq!(flag.health_factor, hf);
    // reward is funded by the account
    let after = engine.get_account(bob).unwrap().collateral_usd(MKT);
    assert_eq!(before.sub(after), flag.flag_reward);
    // collateral bonus on $99k pushes the reward into the global cap
    assert_eq!(flag.flag_reward, engine.global_config().max_keeper_fee_usd);

    assert!(engine.position_digest(bob, MKT).unwrap().flagged);

    // flagged accounts take no new orders and release no collateral
    let err = engine
        .commit_order(
            OWNER,
            bob,
            MKT,
            SignedSize::new(dec!(-1)),
            Price::new_unchecked(dec!(1)),
            Usd::zero(),
            Vec::new(),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::PositionFlagged));
    assert!(matches!(
        engine.withdraw(OWNER, bob, MKT, Usd::new(dec!(1))),
        Err(EngineError::PositionFlagged)
    ));

    // and a second flag finds nothing to do
    assert!(matches!(
        engine.flag_position(KEEPER, bob, MKT),
        Err(EngineError::PositionFlagged)
    ));
}

#[test]
fn flagging_cancels_the_pending_order() {
    let mut engine = engine();
    let bob = funded_account(&mut engine, dec!(100_000));
    open_position(&mut engine, bob, dec!(400));

    // a reduce order parked before the drop
    engine
        .commit_order(
            OWNER,
            bob,
            MKT,
            SignedSize::new(dec!(-100)),
            Price::new_unchecked(dec!(1)),
            Usd::zero(),
            Vec::new(),
        )
        .unwrap();

    engine.advance_time(60_000);
    push_price(&mut engine, dec!(2275));
    engine.flag_position(KEEPER, bob, MKT).unwrap();

    assert!(matches!(
        engine.order_digest(bob, MKT),
        Err(EngineError::OrderNotFound)
    ));
    let canceled = engine
        .events()
        .iter()
        .find_map(|e| match &e.payload {
            EventPayload::OrderCanceled(ev) => Some(ev.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(canceled.reason, CancelReason::Flagged);
    assert_eq!(canceled.keeper_fee, Usd::zero());
}

#[test]
fn liquidation_requires_a_flag() {
    let mut engine = engine();
    let bob = underwater_whale(&mut engine);
    // deeply unhealthy, but nobody flagged it yet
    assert!(matches!(
        engine.liquidate_position(bob, MKT),
        Err(EngineError::PositionNotFlagged)
    ));
}

#[test]
fn oversized_position_closes_in_capacity_limited_passes() {
    let mut engine = engine();
    let bob = underwater_whale(&mut engine);
    engine.flag_position(KEEPER, bob, MKT).unwrap();

    // (makerFee + takerFee) * skewScale * limitScalar = 40 per 30s window
    assert_eq!(engine.remaining_liquidatable_capacity(MKT).unwrap(), dec!(40));

    let first = engine.liquidate_position(bob, MKT).unwrap();
    assert_eq!(first.liquidated_size, dec!(40));
    assert_eq!(first.remaining_size.value(), dec!(360));
    assert_eq!(first.price.value(), dec!(2275));
    assert_eq!(first.distributed_notional.value(), dec!(91_000));

    // the remainder keeps the flag and the window is exhausted
    assert!(engine.position_digest(bob, MKT).unwrap().flagged);
    assert_eq!(
        engine.remaining_liquidatable_capacity(MKT).unwrap(),
        Decimal::ZERO
    );
    assert!(matches!(
        engine.liquidate_position(bob, MKT),
        Err(EngineError::LiquidationZeroCapacity)
    ));

    // the rolling window replenishes once the old entry ages out
    engine.advance_time(31_000);
    push_price(&mut engine, dec!(2275));
    assert_eq!(engine.remaining_liquidatable_capacity(MKT).unwrap(), dec!(40));

    let mut passes = 1;
    while engine.get_account(bob).unwrap().position(MKT).is_some() {
        match engine.liquidate_position(bob, MKT) {
            Ok(_) => passes += 1,
            Err(EngineError::LiquidationZeroCapacity) => {
                engine.advance_time(31_000);
                push_price(&mut engine, dec!(2275));
            }
            Err(e) => panic!("unexpected liquidation error: {e}"),
        }
    }
    assert_eq!(passes, 10);

    // all 400 ETH of notional went to the reward distributor
    assert_eq!(
        engine.pool().rewards_distributed(MKT),
        Usd::new(dec!(910_000))
    );
    let liquidated_events = engine
        .events()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::PositionLiquidated(_)))
        .count();
    assert_eq!(liquidated_events, 10);

    // the $92k loss and per-pass keeper fees came out of collateral without
    // creating debt, and the account is healthy (empty) again
    let account = engine.get_account(bob).unwrap();
    let residual = account.collateral_usd(MKT).value();
    assert!(residual > dec!(6_700) && residual < dec!(6_800));
    assert_eq!(account.debt_usd(MKT), Usd::zero());
    assert_eq!(engine.health_factor(bob, MKT).unwrap(), Decimal::MAX);

    // market aggregates emptied out with the position
    let market = engine.market_digest(MKT).unwrap();
    assert_eq!(market.skew, Decimal::ZERO);
    assert_eq!(market.long_oi, Decimal::ZERO);
}

#[test]
fn full_realization_on_every_partial_pass() {
    let mut engine = engine();
    let bob = underwater_whale(&mut engine);
    engine.flag_position(KEEPER, bob, MKT).unwrap();

    let before = engine.get_account(bob).unwrap().collateral_usd(MKT);
    engine.liquidate_position(bob, MKT).unwrap();

    // the first pass realizes the whole -$92,000, not just the closed
    // slice's share: the remainder re-enters flat at the liquidation price
    let account = engine.get_account(bob).unwrap();
    let position = account.position(MKT).unwrap();
    assert_eq!(position.entry_price.value(), dec!(2275));
    let spent = before.sub(account.collateral_usd(MKT)).value();
    assert!(spent > dec!(92_000) && spent < dec!(92_100));

    // later passes at the same price realize only fees
    engine.advance_time(31_000);
    push_price(&mut engine, dec!(2275));
    let mid = engine.get_account(bob).unwrap().collateral_usd(MKT);
    engine.liquidate_position(bob, MKT).unwrap();
    let pass_cost = mid
        .sub(engine.get_account(bob).unwrap().collateral_usd(MKT))
        .value();
    assert!(pass_cost < dec!(51));
}

#[test]
fn small_flagged_position_closes_in_one_pass() {
    let mut engine = engine();
    let alice = funded_account(&mut engine, dec!(10_000));
    open_position(&mut engine, alice, dec!(40));

    engine.advance_time(60_000);
    push_price(&mut engine, dec!(2275));
    engine.flag_position(KEEPER, alice, MKT).unwrap();

    let result = engine.liquidate_position(alice, MKT).unwrap();
    assert_eq!(result.liquidated_size, dec!(40));
    assert!(result.remaining_size.is_zero());
    assert!(engine.get_account(alice).unwrap().position(MKT).is_none());
}

#[test]
fn margin_only_liquidation_clears_residual_debt() {
    let mut engine = engine();
    let alice = funded_account(&mut engine, dec!(6_000));
    open_position(&mut engine, alice, dec!(100));

    // close 12% down: the loss blows through the collateral into debt
    engine.advance_time(60_000);
    push_price(&mut engine, dec!(2200));
    engine
        .commit_order(
            OWNER,
            alice,
            MKT,
            SignedSize::new(dec!(-100)),
            Price::new_unchecked(dec!(1)),
            Usd::zero(),
            Vec::new(),
        )
        .unwrap();
    engine.advance_time(13_000);
    push_price(&mut engine, dec!(2200));
    engine.settle_order(alice, MKT).unwrap();

    let account = engine.get_account(alice).unwrap();
    assert!(account.position(MKT).is_none());
    assert_eq!(account.collateral_usd(MKT), Usd::zero());
    let debt = account.debt_usd(MKT);
    assert!(debt > Usd::zero());

    let result = engine.liquidate_margin_only(alice, MKT).unwrap();
    assert_eq!(result.cleared_debt, debt);
    assert_eq!(result.seized_collateral, Usd::zero());

    let account = engine.get_account(alice).unwrap();
    assert_eq!(account.debt_usd(MKT), Usd::zero());
    assert_eq!(engine.get_market(MKT).unwrap().total_debt_usd, Usd::zero());
    assert_eq!(engine.pool().seized_collateral(MKT), Usd::zero());
}

#[test]
fn margin_only_liquidation_rejects_open_positions_and_solvent_accounts() {
    let mut engine = engine();
    let alice = funded_account(&mut engine, dec!(100_000));
    open_position(&mut engine, alice, dec!(10));

    // open position: never eligible, whatever the balances
    assert!(matches!(
        engine.liquidate_margin_only(alice, MKT),
        Err(EngineError::CannotLiquidateMargin)
    ));

    // closed and debt-free: nothing to liquidate either
    let carol = funded_account(&mut engine, dec!(1_000));
    assert!(matches!(
        engine.liquidate_margin_only(carol, MKT),
        Err(EngineError::CannotLiquidateMargin)
    ));
}
