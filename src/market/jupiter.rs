//! Jupiter quote client (`GET {base}/quote`)

use super::{Quote, QuoteError, QuoteProvider, QuoteRequest};
use crate::config::JupiterConfig;
use crate::utils::parse_atomic;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    out_amount: String,
    #[serde(default)]
    price_impact_pct: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct JupiterClient {
    http: reqwest::Client,
    base_url: String,
}

impl JupiterClient {
    pub fn new(config: &JupiterConfig) -> Result<Self, QuoteError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| QuoteError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteProvider for JupiterClient {
    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        let url = format!("{}/quote", self.base_url);

        debug!(
            input = %request.input_mint,
            output = %request.output_mint,
            amount = request.amount_atoms,
            "Requesting Jupiter quote"
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("inputMint", request.input_mint.clone()),
                ("outputMint", request.output_mint.clone()),
                ("amount", request.amount_atoms.to_string()),
                ("slippageBps", request.slippage_bps.to_string()),
            ])
            .send()
            .await
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or(body);
            return Err(QuoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| QuoteError::Parse(e.to_string()))?;

        let output_amount_atoms = parse_atomic(&quote.out_amount)
            .ok_or_else(|| QuoteError::Parse(format!("Bad outAmount '{}'", quote.out_amount)))?;

        Ok(Quote {
            output_amount_atoms,
            price_impact_pct: quote
                .price_impact_pct
                .as_deref()
                .and_then(|p| p.parse::<f64>().ok()),
        })
    }
}
