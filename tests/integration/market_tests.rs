//! Market Adapter Integration Tests
//!
//! Runs the CoinGecko and Jupiter clients against throwaway local axum
//! servers: tier-1/tier-2 price lookups, fallback on failure, quote
//! parsing and error mapping.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use dca_sentinel::config::{JupiterConfig, PricesConfig};
use dca_sentinel::constants::mints;
use dca_sentinel::market::{CoinGeckoClient, JupiterClient, PriceFeed, QuoteError, QuoteProvider, QuoteRequest};
use parking_lot::Mutex;
use secrecy::SecretString;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

const OTHER_MINT: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

type Params = HashMap<String, String>;

#[derive(Default)]
struct Recorded {
    requests: Mutex<Vec<(String, Params)>>,
    api_keys: Mutex<Vec<Option<String>>>,
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn prices_config(base_url: &str) -> PricesConfig {
    PricesConfig {
        coingecko_url: base_url.to_string(),
        timeout_secs: 5,
        ..Default::default()
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// COINGECKO
// =============================================================================

fn coingecko_router(recorded: Arc<Recorded>, tier_one_status: StatusCode) -> Router {
    async fn by_coin(
        State((recorded, status)): State<(Arc<Recorded>, StatusCode)>,
        headers: HeaderMap,
        Query(params): Query<Params>,
    ) -> axum::response::Response {
        recorded
            .api_keys
            .lock()
            .push(headers.get("x-cg-demo-api-key").map(|v| v.to_str().unwrap().to_string()));
        recorded.requests.lock().push(("coin".to_string(), params));
        if status != StatusCode::OK {
            return status.into_response();
        }
        Json(json!({
            "solana": { "usd": 150.25 },
            "usd-coin": { "usd": 1.0 }
        }))
        .into_response()
    }

    async fn by_contract(
        State((recorded, _)): State<(Arc<Recorded>, StatusCode)>,
        Query(params): Query<Params>,
    ) -> Json<serde_json::Value> {
        recorded.requests.lock().push(("contract".to_string(), params));
        Json(json!({
            (OTHER_MINT.to_lowercase()): { "usd": 0.42 },
            (mints::SOL): { "usd": 149.0 },
            (mints::USDC): { "usd": 0.999 }
        }))
    }

    Router::new()
        .route("/simple/price", get(by_coin))
        .route("/simple/token_price/solana", get(by_contract))
        .with_state((recorded, tier_one_status))
}

#[tokio::test]
async fn test_registry_tokens_use_coin_ids_and_others_use_contracts() {
    let recorded = Arc::new(Recorded::default());
    let base = serve(coingecko_router(recorded.clone(), StatusCode::OK)).await;
    let client = CoinGeckoClient::new(&prices_config(&base)).unwrap();

    let batch = client
        .fetch_prices(&ids(&[mints::SOL, mints::USDC, OTHER_MINT]))
        .await;

    assert!(batch.healthy);
    assert_eq!(batch.price(mints::SOL), 150.25);
    assert_eq!(batch.price(mints::USDC), 1.0);
    assert_eq!(batch.price(OTHER_MINT), 0.42);

    let requests = recorded.requests.lock();
    assert_eq!(requests.len(), 2);
    let (_, coin_params) = requests.iter().find(|(tier, _)| tier == "coin").unwrap();
    assert_eq!(coin_params["vs_currencies"], "usd");
    assert!(coin_params["ids"].contains("solana"));
    let (_, contract_params) = requests.iter().find(|(tier, _)| tier == "contract").unwrap();
    assert_eq!(contract_params["contract_addresses"], OTHER_MINT);

    assert_eq!(*recorded.api_keys.lock(), vec![None]);
}

#[tokio::test]
async fn test_tier_one_failure_falls_back_to_contracts() {
    let recorded = Arc::new(Recorded::default());
    let base = serve(coingecko_router(recorded.clone(), StatusCode::INTERNAL_SERVER_ERROR)).await;
    let client = CoinGeckoClient::new(&prices_config(&base)).unwrap();

    let batch = client.fetch_prices(&ids(&[mints::SOL, mints::JUP])).await;

    assert!(!batch.healthy);
    assert_eq!(batch.price(mints::SOL), 149.0);
    // Asked for but not returned
    assert_eq!(batch.price(mints::JUP), 0.0);
    assert_eq!(batch.prices.len(), 2);
}

#[tokio::test]
async fn test_rate_limit_and_unreachable_feed_report_zero_prices() {
    let recorded = Arc::new(Recorded::default());
    let base = serve(coingecko_router(recorded, StatusCode::TOO_MANY_REQUESTS)).await;
    let client = CoinGeckoClient::new(&prices_config(&base)).unwrap();

    let batch = client.fetch_prices(&ids(&[mints::BONK])).await;
    assert!(!batch.healthy);
    assert_eq!(batch.price(mints::BONK), 0.0);

    let unreachable = CoinGeckoClient::new(&prices_config("http://127.0.0.1:9")).unwrap();
    let batch = unreachable.fetch_prices(&ids(&[mints::SOL, OTHER_MINT])).await;
    assert!(!batch.healthy);
    assert!(batch.prices.values().all(|p| *p == 0.0));
}

#[tokio::test]
async fn test_api_key_header_is_sent() {
    let recorded = Arc::new(Recorded::default());
    let base = serve(coingecko_router(recorded.clone(), StatusCode::OK)).await;
    let config = PricesConfig {
        api_key: Some(SecretString::new("cg-demo-key".to_string())),
        ..prices_config(&base)
    };
    let client = CoinGeckoClient::new(&config).unwrap();

    client.fetch_prices(&ids(&[mints::SOL])).await;

    assert_eq!(
        *recorded.api_keys.lock(),
        vec![Some("cg-demo-key".to_string())]
    );
}

// =============================================================================
// JUPITER
// =============================================================================

fn jupiter_router(recorded: Arc<Recorded>, status: StatusCode, body: serde_json::Value) -> Router {
    Router::new().route(
        "/quote",
        get(move |Query(params): Query<Params>| {
            let recorded = recorded.clone();
            let body = body.clone();
            async move {
                recorded.requests.lock().push(("quote".to_string(), params));
                (status, Json(body))
            }
        }),
    )
}

fn quote_request() -> QuoteRequest {
    QuoteRequest {
        input_mint: mints::USDC.to_string(),
        output_mint: mints::SOL.to_string(),
        amount_atoms: 50_000_000,
        slippage_bps: 50,
    }
}

async fn jupiter(status: StatusCode, body: serde_json::Value) -> (JupiterClient, Arc<Recorded>) {
    let recorded = Arc::new(Recorded::default());
    let base = serve(jupiter_router(recorded.clone(), status, body)).await;
    let client = JupiterClient::new(&JupiterConfig {
        api_url: base,
        timeout_secs: 5,
    })
    .unwrap();
    (client, recorded)
}

#[tokio::test]
async fn test_quote_is_parsed_and_query_is_camel_case() {
    let (client, recorded) = jupiter(
        StatusCode::OK,
        json!({ "outAmount": "333000000", "priceImpactPct": "0.0012", "otherAmountThreshold": "331335000" }),
    )
    .await;

    let quote = client.fetch_quote(&quote_request()).await.unwrap();

    assert_eq!(quote.output_amount_atoms, 333_000_000);
    assert_eq!(quote.price_impact_pct, Some(0.0012));

    let requests = recorded.requests.lock();
    let params = &requests[0].1;
    assert_eq!(params["inputMint"], mints::USDC);
    assert_eq!(params["outputMint"], mints::SOL);
    assert_eq!(params["amount"], "50000000");
    assert_eq!(params["slippageBps"], "50");
}

#[tokio::test]
async fn test_quote_error_body_is_surfaced() {
    let (client, _) = jupiter(
        StatusCode::BAD_REQUEST,
        json!({ "error": "No routes found", "errorCode": "COULD_NOT_FIND_ANY_ROUTE" }),
    )
    .await;

    let err = client.fetch_quote(&quote_request()).await.unwrap_err();

    match err {
        QuoteError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "No routes found");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_quote_is_a_parse_error() {
    let (client, _) = jupiter(StatusCode::OK, json!({ "outAmount": "lots" })).await;
    assert!(matches!(
        client.fetch_quote(&quote_request()).await,
        Err(QuoteError::Parse(_))
    ));

    let (client, _) = jupiter(StatusCode::OK, json!({ "routePlan": [] })).await;
    assert!(matches!(
        client.fetch_quote(&quote_request()).await,
        Err(QuoteError::Parse(_))
    ));
}

#[tokio::test]
async fn test_unreachable_quote_service_is_transport_error() {
    let client = JupiterClient::new(&JupiterConfig {
        api_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 2,
    })
    .unwrap();

    assert!(matches!(
        client.fetch_quote(&quote_request()).await,
        Err(QuoteError::Transport(_))
    ));
}
