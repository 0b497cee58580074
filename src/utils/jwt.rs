use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;

use crate::{
    config::JwtConfig,
    domain::{
        errors::JWTError,
        fields::{Claims, UserId},
    },
};

/// Issues a token for `user_id`. Login lives outside this service; this is
/// what the identity side (and the test suite) uses to mint compatible tokens.
/// The token carries no role: that is looked up per request.
pub fn generate_auth_token(
    user_id: UserId,
    jwt_config: &JwtConfig,
) -> Result<String, JWTError> {
    let exp = SystemTime::now() + Duration::from_secs(jwt_config.exp);
    let exp = exp
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JWTError::GenerationFailed(jsonwebtoken::errors::ErrorKind::ExpiredSignature))?;
    let claims = Claims {
        iss: jwt_config.iss.clone(),
        sub: user_id.to_string(),
        exp: exp.as_secs() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_config.secret.expose_secret().as_ref()),
    )
    .map_err(|e| {
        tracing::error!("auth token generation failed >>> {}", e);
        JWTError::GenerationFailed(e.into_kind())
    })?;

    Ok(token)
}

pub fn decode_auth_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, JWTError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[jwt_config.iss.as_str()]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.expose_secret().as_ref()),
        &validation,
    )
    .map_err(|e| {
        tracing::error!("auth token decode failed >>> {}", e);
        JWTError::DecodeFailed(e.into_kind())
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn jwt_config(secret: &str, iss: &str) -> JwtConfig {
        JwtConfig {
            secret: Secret::new(secret.to_string()),
            iss: iss.to_string(),
            exp: 60,
        }
    }

    #[test]
    fn token_round_trips_the_subject() {
        let config = jwt_config("test-secret", "tithe-ledger");

        let token = generate_auth_token(UserId::from(7), &config).unwrap();
        let claims = decode_auth_token(&token, &config).unwrap();

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.user_id().unwrap(), UserId::from(7));
    }

    #[test]
    fn token_from_another_issuer_is_rejected() {
        let token =
            generate_auth_token(UserId::from(7), &jwt_config("test-secret", "someone-else")).unwrap();

        assert!(decode_auth_token(&token, &jwt_config("test-secret", "tithe-ledger")).is_err());
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = generate_auth_token(UserId::from(7), &jwt_config("other", "tithe-ledger")).unwrap();

        assert!(decode_auth_token(&token, &jwt_config("test-secret", "tithe-ledger")).is_err());
    }
}
