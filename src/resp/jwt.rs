use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::outcome::Outcome::{Error, Success};
use rocket::request::{self, FromRequest, Request};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::util::date_time_as_unix_seconds;
use crate::data::user::User;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Security;

pub static AUTH_COOKIE_NAME: &str = "jwt_auth";

const TOKEN_LIFETIME_DAYS: i64 = 30;

/// Verified identity of the caller, carried as JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub user: Uuid,
    pub name: String,
    pub role: Role,
}

impl SessionToken {
    pub fn new(user: Uuid, name: impl ToString, role: Role) -> SessionToken {
        let now = Utc::now();
        SessionToken {
            iat: now,
            exp: now + Duration::days(TOKEN_LIFETIME_DAYS),
            user,
            name: name.to_string(),
            role,
        }
    }

    pub fn for_user(user: &User) -> SessionToken {
        SessionToken::new(user.id, &user.name, user.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn encode_jwt(&self, secret: impl AsRef<[u8]>) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(secret.as_ref());

        encode(&header, &self, &key)
    }

    pub fn decode_jwt(
        token: impl AsRef<str>,
        secret: impl AsRef<[u8]>,
    ) -> Result<SessionToken, jsonwebtoken::errors::Error> {
        decode::<SessionToken>(
            token.as_ref(),
            &DecodingKey::from_secret(secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
    }

    pub fn cookie(
        &self,
        secret: impl AsRef<[u8]>,
    ) -> Result<Cookie<'static>, jsonwebtoken::errors::Error> {
        Ok(Cookie::build((AUTH_COOKIE_NAME, self.encode_jwt(secret)?))
            .secure(true)
            .expires(OffsetDateTime::from_unix_timestamp(self.exp.timestamp()).ok())
            .path("/")
            .http_only(true)
            .build())
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Not authenticated")
        .detail(detail)
        .clone()
}

/// Bearer value of an `Authorization` header, if the scheme matches.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

pub fn extract_claims(
    authorization: Option<&str>,
    cookies: &CookieJar,
    secret: impl AsRef<[u8]>,
) -> Result<SessionToken, Problem> {
    let token = match authorization.and_then(bearer_token) {
        Some(token) => token.to_owned(),
        None => match cookies.get(AUTH_COOKIE_NAME) {
            Some(jwt) => jwt.value().to_owned(),
            None => return Err(auth_problem("Not authorized, no token")),
        },
    };

    match SessionToken::decode_jwt(&token, secret) {
        Ok(it) => {
            tracing::debug!("decoded session token for user: {}", it.user);
            Ok(it)
        }
        Err(e) => {
            tracing::debug!("rejected session token: {}", e);
            Err(auth_problem("Not authorized, token failed"))
        }
    }
}

/// Request-local slot for the problem a failing guard produced, so the
/// catcher can render it instead of a generic status body.
#[derive(Debug, Default)]
pub struct GuardProblem(pub Option<Problem>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security = match req.rocket().state::<Security>() {
            Some(it) => it,
            None => {
                tracing::error!("security material isn't managed by rocket");
                return Error((Status::InternalServerError, Problem::default()));
            }
        };

        tracing::trace!("extracting session token from request");
        let authorization = req.headers().get_one("Authorization");
        match extract_claims(authorization, req.cookies(), &security.jwt_secret) {
            Ok(claims) => Success(claims),
            Err(problem) => {
                req.local_cache(|| GuardProblem(Some(problem.clone())));
                Error((Status::Unauthorized, problem))
            }
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> SecurityScheme {
            let mut http = Http::new(HttpAuthScheme::Bearer);
            http.bearer_format = Some("JWT".to_string());
            SecurityScheme::Http(http)
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;

    #[test]
    fn jwt_configured_properly() {
        let mut now = Utc::now();
        now = now.round_subsecs(0);

        let user = Uuid::new_v4();

        let token = SessionToken {
            iat: now,
            exp: now + Duration::days(TOKEN_LIFETIME_DAYS),
            user,
            name: "Ada".to_string(),
            role: Role::Admin,
        };

        let security = Security::ephemeral();

        let encoded = token
            .encode_jwt(&security.jwt_secret)
            .expect("encoding should work for example");

        let decoded = SessionToken::decode_jwt(&encoded, &security.jwt_secret)
            .expect("unable to decode encoded token");

        assert_eq!(now, decoded.iat);
        assert_eq!(now + Duration::days(TOKEN_LIFETIME_DAYS), decoded.exp);
        assert_eq!(user, decoded.user);
        assert_eq!(decoded.name, "Ada");
        assert_eq!(decoded.role, Role::Admin);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = SessionToken::new(Uuid::new_v4(), "Mallory", Role::Admin)
            .encode_jwt(b"someone else's secret")
            .expect("encoding should work");

        assert!(SessionToken::decode_jwt(token, Security::ephemeral().jwt_secret).is_err());
    }

    #[test]
    fn bearer_scheme_is_required() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc.def "), Some("abc.def"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
