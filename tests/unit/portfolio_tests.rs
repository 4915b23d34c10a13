//! Portfolio valuation tests
//!
//! Tests the pure valuation step: native/wrapped SOL merging, percentage
//! shares, ordering and the all-prices-unknown case.

use crate::support::wallet;
use dca_sentinel::constants::mints;
use dca_sentinel::portfolio::{build_portfolio, price_ids};
use dca_sentinel::wallet::aggregator::merge;
use std::collections::HashMap;

const WALLET_A: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
const WALLET_B: &str = "HN7cABqLq46Es1jh92dQQisAq662SmxELLLsHHe4YWrH";

fn prices(list: &[(&str, f64)]) -> HashMap<String, f64> {
    list.iter().map(|(id, p)| (id.to_string(), *p)).collect()
}

fn approx(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() < eps
}

#[test]
fn test_two_wallets_value_and_shares() {
    let aggregated = merge(vec![
        wallet(WALLET_A, 5.0, &[]),
        wallet(WALLET_B, 0.0, &[(mints::USDC, 100.0, 6)]),
    ]);

    let portfolio = build_portfolio(
        &aggregated,
        &prices(&[(mints::SOL, 150.0), (mints::USDC, 1.0)]),
    );

    assert_eq!(portfolio.wallet_count, 2);
    assert!(approx(portfolio.total_value, 850.0, 1e-9));
    assert_eq!(portfolio.native_price, 150.0);

    assert_eq!(portfolio.holdings.len(), 2);
    let sol = &portfolio.holdings[0];
    let usdc = &portfolio.holdings[1];
    assert_eq!(sol.symbol, "SOL");
    assert!(approx(sol.value, 750.0, 1e-9));
    assert!(approx(sol.percentage, 88.2, 0.05));
    assert_eq!(usdc.symbol, "USDC");
    assert!(approx(usdc.percentage, 11.8, 0.05));
}

#[test]
fn test_native_and_wrapped_sol_share_a_line() {
    let aggregated = merge(vec![wallet(WALLET_A, 1.5, &[(mints::SOL, 0.5, 9)])]);

    let portfolio = build_portfolio(&aggregated, &prices(&[(mints::SOL, 100.0)]));

    assert_eq!(portfolio.holdings.len(), 1);
    assert!(approx(portfolio.holdings[0].amount, 2.0, 1e-12));
    assert!(approx(portfolio.total_value, 200.0, 1e-9));
}

#[test]
fn test_percentages_sum_to_one_hundred() {
    let aggregated = merge(vec![
        wallet(WALLET_A, 2.0, &[(mints::JUP, 300.0, 6), (mints::BONK, 1_000_000.0, 5)]),
        wallet(WALLET_B, 0.25, &[(mints::JUP, 50.0, 6), (mints::USDC, 42.0, 6)]),
    ]);

    let portfolio = build_portfolio(
        &aggregated,
        &prices(&[
            (mints::SOL, 140.0),
            (mints::JUP, 0.9),
            (mints::BONK, 0.00002),
            (mints::USDC, 1.0),
        ]),
    );

    let sum: f64 = portfolio.holdings.iter().map(|h| h.percentage).sum();
    assert!(approx(sum, 100.0, 1e-6));

    let values: Vec<f64> = portfolio.holdings.iter().map(|h| h.value).collect();
    assert!(values.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_all_prices_unknown() {
    let aggregated = merge(vec![wallet(WALLET_A, 3.0, &[(mints::RAY, 10.0, 6)])]);

    let portfolio = build_portfolio(&aggregated, &HashMap::new());

    assert_eq!(portfolio.total_value, 0.0);
    assert_eq!(portfolio.native_price, 0.0);
    assert_eq!(portfolio.holdings.len(), 2);
    assert!(portfolio.holdings.iter().all(|h| h.percentage == 0.0));
    assert!(portfolio.holdings.iter().all(|h| h.value == 0.0));
}

#[test]
fn test_equal_values_order_by_asset_id() {
    let aggregated = merge(vec![wallet(
        WALLET_A,
        0.0,
        &[(mints::USDT, 10.0, 6), (mints::USDC, 10.0, 6)],
    )]);

    let portfolio = build_portfolio(
        &aggregated,
        &prices(&[(mints::USDC, 1.0), (mints::USDT, 1.0)]),
    );

    let order: Vec<&str> = portfolio
        .holdings
        .iter()
        .map(|h| h.asset_id.as_str())
        .collect();
    let mut expected = vec![mints::USDC, mints::USDT];
    expected.sort();
    assert_eq!(order, expected);
}

#[test]
fn test_price_ids_always_include_native() {
    let aggregated = merge(vec![wallet(WALLET_A, 0.0, &[(mints::JUP, 1.0, 6)])]);
    let ids = price_ids(&aggregated);
    assert!(ids.contains(&mints::SOL.to_string()));
    assert!(ids.contains(&mints::JUP.to_string()));

    let with_wrapped = merge(vec![wallet(WALLET_A, 0.0, &[(mints::SOL, 1.0, 9)])]);
    assert_eq!(price_ids(&with_wrapped), vec![mints::SOL.to_string()]);
}

#[test]
fn test_merge_sums_tokens_and_keeps_first_decimals() {
    let aggregated = merge(vec![
        wallet(WALLET_A, 1.0, &[(mints::JUP, 10.0, 6)]),
        wallet(WALLET_B, 2.5, &[(mints::JUP, 5.0, 8)]),
    ]);

    assert!(approx(aggregated.total_native, 3.5, 1e-12));
    let jup = aggregated.token_totals[mints::JUP];
    assert!(approx(jup.amount, 15.0, 1e-12));
    assert_eq!(jup.decimals, 6);
    assert_eq!(aggregated.per_wallet[0].address, WALLET_A);
}
