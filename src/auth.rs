use crate::{
    errors::{AppError, AppResult},
    models::{Claims, Role},
    state::AppState,
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

/// Verified caller identity.
/// Tokens are minted by the external session service; this side only verifies them.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub employee_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator role required".to_string()))
        }
    }

    /// Resolve the employee an operation targets. Staff may only act on themselves.
    pub fn target(&self, requested: Option<Uuid>) -> AppResult<Uuid> {
        match requested {
            Some(id) if id != self.employee_id => {
                self.require_admin()?;
                Ok(id)
            }
            _ => Ok(self.employee_id),
        }
    }

    /// Name recorded in audit entries and approver columns.
    pub fn actor(&self) -> String {
        self.employee_id.to_string()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let headers: &HeaderMap = &parts.headers;

        let auth_header = headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization format".to_string()))?;

        verify_token(token, &state.config.jwt_secret)
    }
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<AuthUser> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;

    let employee_id =
        Uuid::parse_str(&token_data.claims.sub).map_err(|_| AppError::InvalidToken)?;

    Ok(AuthUser {
        employee_id,
        role: token_data.claims.role,
    })
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    pub fn token_for(employee_id: Uuid, role: Role, secret: &str) -> String {
        let claims = Claims {
            sub: employee_id.to_string(),
            role,
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
            iat: Utc::now().timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("token encodes")
    }

    #[test]
    fn verifies_a_token_signed_with_the_shared_secret() {
        let id = Uuid::new_v4();
        let token = token_for(id, Role::Staff, "secret");
        let user = verify_token(&token, "secret").unwrap();
        assert_eq!(user.employee_id, id);
        assert_eq!(user.role, Role::Staff);
    }

    #[test]
    fn rejects_a_token_signed_with_another_secret() {
        let token = token_for(Uuid::new_v4(), Role::Admin, "secret");
        assert!(matches!(
            verify_token(&token, "other"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn staff_can_only_target_themselves() {
        let me = Uuid::new_v4();
        let staff = AuthUser {
            employee_id: me,
            role: Role::Staff,
        };
        assert_eq!(staff.target(None).unwrap(), me);
        assert_eq!(staff.target(Some(me)).unwrap(), me);
        assert!(matches!(
            staff.target(Some(Uuid::new_v4())),
            Err(AppError::Forbidden(_))
        ));

        let admin = AuthUser {
            employee_id: me,
            role: Role::Admin,
        };
        let other = Uuid::new_v4();
        assert_eq!(admin.target(Some(other)).unwrap(), other);
    }
}
