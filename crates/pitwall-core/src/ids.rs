//! Correlation tokens for outbound commands.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Length of a generated [`MessageToken`].
pub const TOKEN_LEN: usize = 16;

/// Client-generated token attached to every outbound command.
///
/// The server may use it for idempotency or correlation. This client never
/// matches responses against it.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageToken(String);

impl MessageToken {
    /// Generate a fresh random token of [`TOKEN_LEN`] ASCII alphanumerics.
    pub fn generate() -> Self {
        let token = rand::rng()
            .sample_iter(Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Borrow the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MessageToken {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl AsRef<str> for MessageToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generated_token_is_sixteen_alphanumerics() {
        let token = MessageToken::generate();
        assert_eq!(token.as_str().len(), TOKEN_LEN);
        assert!(
            token.as_str().chars().all(|c| c.is_ascii_alphanumeric()),
            "got: {token}"
        );
    }

    #[test]
    fn tokens_are_unique() {
        let tokens: HashSet<MessageToken> = (0..1000).map(|_| MessageToken::generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn serializes_as_plain_string() {
        let token: MessageToken = "AbCdEfGh12345678".parse().unwrap();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"AbCdEfGh12345678\"");
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        let token = MessageToken::generate();
        let parsed: MessageToken = token.to_string().parse().unwrap();
        assert_eq!(token, parsed);
    }
}
