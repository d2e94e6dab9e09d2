//! Shared-secret JWT verification
//!
//! Only the HMAC family (`HS256`, `HS384`, `HS512`) is ever accepted. A token
//! whose header names any other algorithm is refused before signature checks
//! run, so an asymmetric or `none` header can never be paired with the shared
//! secret.

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};

use super::token::{Claims, TokenVerifier};
use crate::{config::AuthConfig, error::Error};

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// JWT verifier over a shared secret
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
}

impl JwtVerifier {
    /// Verifier accepting any HMAC algorithm signed with `secret`
    pub fn new(secret: &[u8]) -> Self {
        Self::with_algorithms(secret, HMAC_ALGORITHMS.to_vec(), 60)
    }

    /// Verifier for the configured secret and algorithm
    pub fn from_config(config: &AuthConfig) -> Result<Self, Error> {
        let algorithm = match config.algorithm.to_uppercase().as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            alg => {
                return Err(Error::Config(Box::new(figment::Error::from(format!(
                    "Unsupported JWT algorithm: {} (only HS256, HS384 and HS512 are allowed)",
                    alg
                )))))
            }
        };

        let secret = config.secret_bytes()?;
        Ok(Self::with_algorithms(
            &secret,
            vec![algorithm],
            config.leeway_secs,
        ))
    }

    fn with_algorithms(secret: &[u8], algorithms: Vec<Algorithm>, leeway: u64) -> Self {
        let mut validation = Validation::new(algorithms[0]);
        validation.algorithms = algorithms;
        validation.leeway = leeway;
        validation.validate_aud = false;
        // exp/nbf are checked when present but not required
        validation.required_spec_claims.clear();

        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            validation,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Claims, Error> {
        let header = decode_header(token)?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            return Err(jsonwebtoken::errors::Error::from(ErrorKind::InvalidAlgorithm).into());
        }

        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;
    use crate::middleware::token::ADMIN_ROLE;

    pub(crate) const SECRET: &[u8] = b"test-shared-secret";

    pub(crate) fn sign(claims: &Claims, secret: &[u8], algorithm: Algorithm) -> String {
        encode(
            &Header::new(algorithm),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn forge(header_json: &str, claims: &Claims) -> String {
        let header = URL_SAFE_NO_PAD.encode(header_json);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
        let signature = URL_SAFE_NO_PAD.encode(b"not-a-real-signature");
        format!("{}.{}.{}", header, payload, signature)
    }

    #[test]
    fn test_verifies_each_hmac_algorithm() {
        let verifier = JwtVerifier::new(SECRET);
        let claims = Claims::new("alice", "Member");

        for algorithm in HMAC_ALGORITHMS {
            let token = sign(&claims, SECRET, algorithm);
            assert_eq!(verifier.verify(&token).unwrap(), claims);
        }
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let verifier = JwtVerifier::new(SECRET);
        let token = sign(&Claims::new("alice", "Member"), b"other-secret", Algorithm::HS256);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_rejects_asymmetric_header() {
        let verifier = JwtVerifier::new(SECRET);
        let token = forge(r#"{"alg":"RS256","typ":"JWT"}"#, &Claims::new("mallory", ADMIN_ROLE));
        let err = verifier.verify(&token).unwrap_err();
        match err {
            Error::Jwt(e) => assert!(matches!(e.kind(), ErrorKind::InvalidAlgorithm)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_rejects_none_algorithm() {
        let verifier = JwtVerifier::new(SECRET);
        let token = forge(r#"{"alg":"none","typ":"JWT"}"#, &Claims::new("mallory", ADMIN_ROLE));
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_rejects_expired_token() {
        let verifier = JwtVerifier::new(SECRET);
        let expired = chrono::Utc::now().timestamp() - 3600;
        let token = sign(
            &Claims::new("alice", "Member").with_expiry(expired),
            SECRET,
            Algorithm::HS256,
        );
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        let verifier = JwtVerifier::new(SECRET);
        assert!(verifier.verify("not-a-token").is_err());
    }

    #[test]
    fn test_from_config_restricts_algorithm() {
        let config = AuthConfig {
            secret: Some("test-shared-secret".to_string()),
            secret_path: None,
            algorithm: "hs512".to_string(),
            leeway_secs: 0,
        };
        let verifier = JwtVerifier::from_config(&config).unwrap();

        let claims = Claims::new("alice", "Member");
        assert!(verifier.verify(&sign(&claims, SECRET, Algorithm::HS512)).is_ok());
        assert!(verifier.verify(&sign(&claims, SECRET, Algorithm::HS256)).is_err());
    }

    #[test]
    fn test_from_config_rejects_asymmetric_algorithm() {
        let config = AuthConfig {
            secret: Some("x".to_string()),
            secret_path: None,
            algorithm: "RS256".to_string(),
            leeway_secs: 0,
        };
        assert!(matches!(JwtVerifier::from_config(&config), Err(Error::Config(_))));
    }
}
