//! Bearer token issuance and verification.
//!
//! Tokens are RS256-signed JWTs whose only claims are `iat` and `exp`,
//! with a fixed one-hour lifetime. The issuer holds the private key, the
//! verifier configuration holds the public key; all expiry math uses epoch
//! seconds.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifetime of an issued token.
pub const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("key is not usable for RS256: {0}")]
    InvalidKey(String),
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is malformed")]
    Malformed,
}

/// Signs bearer tokens with an RSA private key.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn from_private_pem(private_pem: &str) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|err| TokenError::InvalidKey(err.to_string()))?;
        Ok(Self { encoding_key })
    }

    /// Issues a token valid from `now` for [`TOKEN_TTL_SECS`].
    pub fn issue(&self, now: DateTime<Utc>) -> Result<BearerToken, TokenError> {
        let iat = now.timestamp();
        let exp = iat + TOKEN_TTL_SECS;
        let claims = TokenClaims { iat, exp };
        let secret = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))?;
        Ok(BearerToken {
            secret,
            issued_at: iat,
            expires_at: exp,
        })
    }
}

/// An issued token plus the window it is valid for.
#[derive(Debug, Clone)]
pub struct BearerToken {
    secret: String,
    issued_at: i64,
    expires_at: i64,
}

impl BearerToken {
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// True once `now` reaches the recorded expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }
}

/// Verifies bearer tokens against an RSA public key.
#[derive(Clone)]
pub struct VerifierConfig {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl VerifierConfig {
    pub fn from_public_pem(public_pem: &str) -> Result<Self, TokenError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|err| TokenError::InvalidKey(err.to_string()))?;
        let mut validation = Validation::new(Algorithm::RS256);
        // No leeway: a token at or past exp is rejected.
        validation.leeway = 0;
        Ok(Self {
            decoding_key,
            validation,
        })
    }

    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(map_verify_error)?;
        Ok(data.claims)
    }
}

fn map_verify_error(error: jsonwebtoken::errors::Error) -> TokenError {
    match error.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::test_support::{rsa_key_pair, second_rsa_key_pair};

    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::from_private_pem(&rsa_key_pair().private_pem).expect("issuer")
    }

    fn verifier() -> VerifierConfig {
        VerifierConfig::from_public_pem(&rsa_key_pair().public_pem).expect("verifier")
    }

    #[test]
    fn expiry_is_one_hour_after_issuance() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp");

        let token = issuer().issue(now).expect("token");

        assert_eq!(token.issued_at(), 1_700_000_000);
        assert_eq!(token.expires_at(), 1_700_003_600);
    }

    #[test]
    fn issued_token_verifies_with_the_matching_public_key() {
        let now = Utc::now();

        let token = issuer().issue(now).expect("token");
        let claims = verifier().decode(token.secret()).expect("claims");

        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, now.timestamp() + TOKEN_TTL_SECS);
    }

    #[test]
    fn signing_is_deterministic_for_identical_claims() {
        let now = Utc::now();

        let first = issuer().issue(now).expect("first token");
        let second = issuer().issue(now).expect("second token");

        assert_eq!(first.secret(), second.secret());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issuer()
            .issue(Utc::now() - Duration::hours(2))
            .expect("token");

        let err = verifier().decode(token.secret()).expect_err("expired");
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn token_from_another_key_pair_is_rejected() {
        let token = issuer().issue(Utc::now()).expect("token");
        let other = VerifierConfig::from_public_pem(&second_rsa_key_pair().public_pem)
            .expect("other verifier");

        let err = other.decode(token.secret()).expect_err("wrong key");
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issuer().issue(Utc::now()).expect("token");

        let parts: Vec<&str> = token.secret().split('.').collect();
        assert_eq!(parts.len(), 3);
        let mut payload = parts[1].to_string();
        let first = payload.remove(0);
        let replacement = if first == 'A' { 'B' } else { 'A' };
        payload.insert(0, replacement);
        let tampered = format!("{}.{}.{}", parts[0], payload, parts[2]);

        let err = verifier().decode(&tampered).expect_err("tampered payload");
        assert!(matches!(
            err,
            TokenError::InvalidSignature | TokenError::Malformed
        ));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let err = verifier().decode("not-a-jwt").expect_err("garbage");
        assert!(matches!(err, TokenError::Malformed));
    }

    #[test]
    fn hs256_token_is_rejected() {
        let claims = TokenClaims {
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + TOKEN_TTL_SECS,
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(rsa_key_pair().public_pem.as_bytes()),
        )
        .expect("forged token");

        let err = verifier().decode(&forged).expect_err("algorithm confusion");
        assert!(matches!(err, TokenError::Malformed));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let token = issuer().issue(now).expect("token");

        assert!(!token.is_expired(now + Duration::seconds(TOKEN_TTL_SECS - 1)));
        assert!(token.is_expired(now + Duration::seconds(TOKEN_TTL_SECS)));
    }

    #[test]
    fn invalid_private_pem_is_an_invalid_key_error() {
        assert!(matches!(
            TokenIssuer::from_private_pem("junk"),
            Err(TokenError::InvalidKey(_))
        ));
    }
}
