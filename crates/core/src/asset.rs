//! Chain and Token codes
//!
//! Known chains are pre-defined; anything else falls back to `Other`.
//! Token symbols are validated, uppercased codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing chain or token codes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Empty code")]
    EmptyCode,

    #[error("Code too long (max 16 chars): {0}")]
    TooLong(String),

    #[error("Invalid code format: {0}")]
    InvalidFormat(String),
}

const MAX_CODE_LEN: usize = 16;

fn normalize(raw: &str) -> Result<String, AssetError> {
    let s = raw.trim().to_uppercase();

    if s.is_empty() {
        return Err(AssetError::EmptyCode);
    }
    if s.len() > MAX_CODE_LEN {
        return Err(AssetError::TooLong(s));
    }
    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AssetError::InvalidFormat(s));
    }

    Ok(s)
}

/// Blockchain a pool lives on
///
/// # Examples
/// ```
/// use flashpool_core::Chain;
///
/// let eos: Chain = "eos".parse().unwrap();
/// assert_eq!(eos, Chain::Eos);
/// assert_eq!(eos.to_string(), "eos");
///
/// let custom: Chain = "aptos".parse().unwrap();
/// assert!(matches!(custom, Chain::Other(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Chain {
    Eos,
    Ton,
    Sui,
    /// Any other chain, stored lowercased
    Other(String),
}

impl Chain {
    /// Returns the chain code as a string slice
    pub fn code(&self) -> &str {
        match self {
            Chain::Eos => "eos",
            Chain::Ton => "ton",
            Chain::Sui => "sui",
            Chain::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Chain {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = normalize(s)?.to_lowercase();

        Ok(match code.as_str() {
            "eos" => Chain::Eos,
            "ton" => Chain::Ton,
            "sui" => Chain::Sui,
            _ => Chain::Other(code),
        })
    }
}

impl TryFrom<String> for Chain {
    type Error = AssetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Chain> for String {
    fn from(c: Chain) -> Self {
        c.code().to_string()
    }
}

/// Token symbol (e.g. `EOS`, `USDT`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    pub fn symbol(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Token {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s).map(Token)
    }
}

impl TryFrom<String> for Token {
    type Error = AssetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Token> for String {
    fn from(t: Token) -> Self {
        t.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_chains() {
        assert_eq!("EOS".parse::<Chain>().unwrap(), Chain::Eos);
        assert_eq!("ton".parse::<Chain>().unwrap(), Chain::Ton);
        assert_eq!(" Sui ".parse::<Chain>().unwrap(), Chain::Sui);
    }

    #[test]
    fn test_parse_custom_chain() {
        let chain: Chain = "Aptos".parse().unwrap();
        assert_eq!(chain, Chain::Other("aptos".to_string()));
        assert_eq!(chain.to_string(), "aptos");
    }

    #[test]
    fn test_token_uppercased() {
        let token: Token = "usdt".parse().unwrap();
        assert_eq!(token.symbol(), "USDT");
    }

    #[test]
    fn test_empty_code_error() {
        assert!(matches!("".parse::<Token>(), Err(AssetError::EmptyCode)));
        assert!(matches!("  ".parse::<Chain>(), Err(AssetError::EmptyCode)));
    }

    #[test]
    fn test_invalid_format_error() {
        let result: Result<Token, _> = "BTC-USD".parse();
        assert!(matches!(result, Err(AssetError::InvalidFormat(_))));
    }

    #[test]
    fn test_too_long_error() {
        let result: Result<Token, _> = "AVERYLONGTOKENSYMBOL".parse();
        assert!(matches!(result, Err(AssetError::TooLong(_))));
    }

    #[test]
    fn test_chain_serde_as_string() {
        let json = serde_json::to_string(&Chain::Ton).unwrap();
        assert_eq!(json, "\"ton\"");
        let parsed: Chain = serde_json::from_str("\"EOS\"").unwrap();
        assert_eq!(parsed, Chain::Eos);
    }
}
