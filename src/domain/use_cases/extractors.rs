use actix_web::{FromRequest, HttpRequest, HttpMessage};
use futures_util::future::{ready, Ready};
use uuid::Uuid;

use crate::{
    entities::{token::Claims, user::Role},
    errors::{AppError, AuthError},
};

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl TryFrom<&Claims> for Principal {
    type Error = AuthError;

    fn try_from(claims: &Claims) -> Result<Self, Self::Error> {
        let id = claims.user_id().ok_or(AuthError::InvalidUserId)?;
        Ok(Principal { id, role: claims.role })
    }
}

/// Owners may change what they created; a superadmin may change anything.
pub fn ensure_can_modify(principal: &Principal, owner: Uuid, resource: &str) -> Result<(), AppError> {
    if principal.id == owner || principal.role.is_superadmin() {
        return Ok(());
    }
    tracing::warn!("User {} denied access to {} owned by {}", principal.id, resource, owner);
    Err(AppError::ForbiddenAccess(format!(
        "User {} is not authorized to modify this {}",
        principal.id, resource
    )))
}

fn principal_from(req: &HttpRequest) -> Result<Principal, AuthError> {
    let extensions = req.extensions();
    let claims = extensions.get::<Claims>().ok_or(AuthError::MissingCredentials)?;
    Principal::try_from(claims)
}

/// Extractor for any authenticated caller.
/// Returns 401 if the request carries no valid token.
#[derive(Debug)]
pub struct AuthClaims(pub Principal);

impl FromRequest for AuthClaims {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(principal_from(req).map(AuthClaims).map_err(Into::into))
    }
}

/// Extractor for callers allowed to author content (superadmin, admin, teacher).
/// Returns 403 for other roles, 401 if not authenticated.
#[derive(Debug)]
pub struct ContentManager(pub Principal);

impl FromRequest for ContentManager {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let result = principal_from(req).and_then(|principal| {
            if principal.role.can_manage_content() {
                Ok(ContentManager(principal))
            } else {
                Err(AuthError::Forbidden(format!(
                    "User role {} is not authorized to access this route",
                    principal.role
                )))
            }
        });
        ready(result.map_err(Into::into))
    }
}

/// Extractor for superadmin-only routes.
/// Returns 403 for other roles, 401 if not authenticated.
#[derive(Debug)]
pub struct SuperAdmin(pub Principal);

impl FromRequest for SuperAdmin {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let result = principal_from(req).and_then(|principal| {
            if principal.role.is_superadmin() {
                Ok(SuperAdmin(principal))
            } else {
                Err(AuthError::Forbidden("Superadmin access required".into()))
            }
        });
        ready(result.map_err(Into::into))
    }
}
