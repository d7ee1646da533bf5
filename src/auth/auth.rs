use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::TokenType;
use crate::auth::jwt::verify_token;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

/// Staff member behind a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub staff_id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Decode and check a bearer token.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, AppError> {
        let claims = verify_token(token, secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".to_string()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".to_string()))?;

        Ok(AuthUser {
            staff_id: claims.staff_id,
            username: claims.sub,
            role,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Normally put there by auth_middleware
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(AppError::Unauthorized("Missing token".to_string()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(AppError::Internal("Config missing".to_string()))),
        };

        ready(AuthUser::from_token(token, &config.jwt_secret))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_supervisor_or_admin(&self) -> Result<(), AppError> {
        if matches!(self.role, Role::Admin | Role::Supervisor) {
            Ok(())
        } else {
            Err(AppError::forbidden("Supervisor/Admin only"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::models::Claims;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "auth-test-secret-0123456789";

    #[test]
    fn access_token_yields_user() {
        let token = generate_access_token(4, "ada".into(), Role::Supervisor.id(), SECRET, 60).unwrap();
        let user = AuthUser::from_token(&token, SECRET).unwrap();
        assert_eq!(user.staff_id, 4);
        assert_eq!(user.role, Role::Supervisor);
        assert!(user.require_supervisor_or_admin().is_ok());
        assert!(user.require_admin().is_err());
    }

    #[test]
    fn refresh_token_is_not_accepted_as_access() {
        let claims = Claims {
            staff_id: 4,
            sub: "ada".into(),
            role: Role::Staff.id(),
            exp: chrono::Utc::now().timestamp() as usize + 60,
            jti: "r-1".into(),
            token_type: TokenType::Refresh,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = AuthUser::from_token(&token, SECRET).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unauthorized);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let token = generate_access_token(4, "ada".into(), 42, SECRET, 60).unwrap();
        assert!(AuthUser::from_token(&token, SECRET).is_err());
    }
}
