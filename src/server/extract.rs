use async_trait::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::error::Error;

const USER_ID: &str = "x-user-id";
const USER_ROLE: &str = "x-user-role";
const USER_ADMIN: &str = "x-user-admin";

/// Identity as forwarded by the gateway, which has already checked the
/// caller's credentials.
pub fn user_from_headers(headers: &HeaderMap) -> Result<User, Error> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    };

    let id = header(USER_ID)
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or(Error::Unauthorized)?;

    let role: Role = header(USER_ROLE).ok_or(Error::Unauthorized)?.parse()?;

    let is_admin = matches!(header(USER_ADMIN), Some("true") | Some("1"));

    Ok(User { id, role, is_admin })
}

#[async_trait]
impl<B> FromRequest<B> for User
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        user_from_headers(req.headers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn reads_gateway_headers() {
        let id = Uuid::new_v4();
        let user = user_from_headers(&headers(&[
            (USER_ID, &id.to_string()),
            (USER_ROLE, "rider"),
            (USER_ADMIN, "true"),
        ]))
        .unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::Ride);
        assert!(user.is_admin);
    }

    #[test]
    fn admin_flag_defaults_off() {
        let user = user_from_headers(&headers(&[
            (USER_ID, &Uuid::new_v4().to_string()),
            (USER_ROLE, "hotel"),
        ]))
        .unwrap();

        assert!(!user.is_admin);
    }

    #[test]
    fn missing_or_malformed_identity_is_refused() {
        assert!(user_from_headers(&headers(&[(USER_ROLE, "hotel")]))
            .unwrap_err()
            .is_unauthorized());

        assert!(user_from_headers(&headers(&[(USER_ID, "42"), (USER_ROLE, "hotel")]))
            .unwrap_err()
            .is_unauthorized());

        assert!(user_from_headers(&headers(&[
            (USER_ID, &Uuid::new_v4().to_string()),
            (USER_ROLE, "pilot"),
        ]))
        .unwrap_err()
        .is_validation());
    }
}
