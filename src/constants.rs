//! Static token registry and well-known addresses
//!
//! Symbols resolve to mint addresses through [`resolve`]; anything that already
//! looks like a base58 mint address resolves to itself.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Solana token mint addresses
pub mod mints {
    /// Wrapped SOL (native SOL wrapped as SPL token)
    pub const SOL: &str = "So11111111111111111111111111111111111111112";
    /// USDC (Circle USD Coin)
    pub const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    /// USDT (Tether USD)
    pub const USDT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
    /// Jupiter governance token
    pub const JUP: &str = "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN";
    /// Raydium
    pub const RAY: &str = "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R";
    /// Bonk
    pub const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
}

/// Program IDs
pub mod programs {
    /// SPL Token program, owner of every token account we read
    pub const SPL_TOKEN: &str = "TokenkegQfeZyiNwAJbNbGhdNW9nhy5FwcnWpGCs5Bxf8";
}

/// Native SOL decimals (lamports)
pub const NATIVE_DECIMALS: u8 = 9;

/// Registry entry for a supported token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub mint: &'static str,
    /// CoinGecko coin id for the `/simple/price` tier
    pub coingecko_id: &'static str,
    pub decimals: u8,
}

/// Supported tokens, in display order
pub const TOKENS: &[TokenInfo] = &[
    TokenInfo { symbol: "SOL", mint: mints::SOL, coingecko_id: "solana", decimals: 9 },
    TokenInfo { symbol: "USDC", mint: mints::USDC, coingecko_id: "usd-coin", decimals: 6 },
    TokenInfo { symbol: "USDT", mint: mints::USDT, coingecko_id: "tether", decimals: 6 },
    TokenInfo { symbol: "JUP", mint: mints::JUP, coingecko_id: "jupiter-exchange-solana", decimals: 6 },
    TokenInfo { symbol: "RAY", mint: mints::RAY, coingecko_id: "raydium", decimals: 6 },
    TokenInfo { symbol: "BONK", mint: mints::BONK, coingecko_id: "bonk", decimals: 5 },
];

static BY_MINT: Lazy<HashMap<&'static str, &'static TokenInfo>> =
    Lazy::new(|| TOKENS.iter().map(|t| (t.mint, t)).collect());

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Whether `s` has the shape of a base58 mint address (32-44 chars)
pub fn looks_like_address(s: &str) -> bool {
    (32..=44).contains(&s.len()) && s.chars().all(|c| BASE58_ALPHABET.contains(c))
}

/// Resolve a symbol (case-insensitive) or address to a mint address
pub fn resolve(symbol_or_address: &str) -> Option<String> {
    let trimmed = symbol_or_address.trim();
    if let Some(info) = TOKENS.iter().find(|t| t.symbol.eq_ignore_ascii_case(trimmed)) {
        return Some(info.mint.to_string());
    }
    if looks_like_address(trimmed) {
        return Some(trimmed.to_string());
    }
    None
}

/// Registry entry for a mint
pub fn token_by_mint(mint: &str) -> Option<&'static TokenInfo> {
    BY_MINT.get(mint).copied()
}

/// Display symbol for a mint, falling back to a shortened address
pub fn symbol_for(mint: &str) -> String {
    match token_by_mint(mint) {
        Some(info) => info.symbol.to_string(),
        None if mint.len() > 8 => format!("{}..{}", &mint[..4], &mint[mint.len() - 4..]),
        None => mint.to_string(),
    }
}

/// CoinGecko coin id for a mint, if the token has a native listing
pub fn coingecko_id(mint: &str) -> Option<&'static str> {
    token_by_mint(mint).map(|t| t.coingecko_id)
}

/// Decimals used when converting a purchase amount to atomic units.
///
/// Registered tokens (by symbol or mint) use their registry decimals.
/// Unregistered mints fall back to the native 9.
pub fn purchase_decimals(symbol_or_mint: &str) -> u8 {
    let trimmed = symbol_or_mint.trim();
    TOKENS
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(trimmed) || t.mint == trimmed)
        .map_or(NATIVE_DECIMALS, |t| t.decimals)
}
