use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::models::{Claims, TokenType};

/// Decodes and validates an access token. Refresh tokens are refused.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    if claims.token_type != TokenType::Access {
        return Err("not an access token".to_string());
    }
    Ok(claims)
}

#[cfg(test)]
pub fn generate_access_token(
    user_id: u64,
    role: crate::model::role::Role,
    organization_id: u64,
    employee_id: Option<u64>,
    secret: &str,
    ttl: usize,
) -> Result<String, jsonwebtoken::errors::Error> {
    use std::time::{SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize;
    let claims = Claims {
        user_id,
        sub: format!("user-{user_id}"),
        role: role.id(),
        exp: now + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::Access,
        organization_id,
        employee_id,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::test_utils::TEST_SECRET;

    #[test]
    fn access_token_round_trips_tenant_claims() {
        let token = generate_access_token(7, Role::Hr, 3, Some(1000), TEST_SECRET, 60).expect("token");
        let claims = verify_token(&token, TEST_SECRET).expect("valid");
        assert_eq!(claims.organization_id, 3);
        assert_eq!(claims.employee_id, Some(1000));
        assert_eq!(Role::from_id(claims.role), Some(Role::Hr));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(7, Role::Hr, 3, None, TEST_SECRET, 60).expect("token");
        assert!(verify_token(&token, "another-secret").is_err());
    }
}
