use mongodb::Database;
use rocket::http::{CookieJar, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;

use crate::config::Config;
use crate::data::user::db::{authenticate, problem as user_problem, UserDbExt};
use crate::data::user::{AuthResponse, User, UserLoginData, UserResponse, UserSignupData};
use crate::resp::jwt::SessionToken;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Security;

fn issue_session(
    user: User,
    cookies: &CookieJar<'_>,
    security: &Security,
) -> Result<AuthResponse, Problem> {
    let session = SessionToken::for_user(&user);
    let token = session.encode_jwt(&security.jwt_secret)?;
    cookies.add(session.cookie(&security.jwt_secret)?);

    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

/// Register a new account
#[utoipa::path(
    request_body = UserSignupData,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid data or email already registered", body = Problem),
    )
)]
#[post("/register", format = "json", data = "<signup>")]
#[tracing::instrument(skip(cookies, db, security, config))]
pub async fn user_register(
    signup: Json<UserSignupData>,
    cookies: &CookieJar<'_>,
    db: &State<Database>,
    security: &State<Security>,
    config: &State<Config>,
) -> Result<Custom<Json<AuthResponse>>, Problem> {
    let signup = signup.into_inner();
    let role = if config.is_admin_email(&signup.email) {
        Role::Admin
    } else {
        Role::Student
    };

    let user = db.create_user(signup, role, &security.salt).await?;
    let response = issue_session(user, cookies, security)?;

    Ok(Custom(Status::Created, Json(response)))
}

/// Log in with email and password
#[utoipa::path(
    request_body = UserLoginData,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Bad email or password", body = Problem),
    )
)]
#[post("/login", format = "json", data = "<login>")]
#[tracing::instrument(skip(cookies, db, security))]
pub async fn user_login(
    login: Json<UserLoginData>,
    cookies: &CookieJar<'_>,
    db: &State<Database>,
    security: &State<Security>,
) -> Result<Json<AuthResponse>, Problem> {
    login.validate()?;

    // VULN: Login attempts aren't rate limited
    let user = authenticate(db.inner(), &login.email, &login.password, &security.salt).await?;
    tracing::info!("user {} logged in", user.id);

    Ok(Json(issue_session(user, cookies, security)?))
}

/// Profile of the logged in user
#[utoipa::path(
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 404, description = "Account no longer exists", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/profile")]
#[tracing::instrument(skip(db))]
pub async fn user_profile(
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<UserResponse>, Problem> {
    let user = db
        .get_user(auth.user)
        .await?
        .ok_or_else(|| user_problem::not_found(auth.user))?;

    Ok(Json(user.into()))
}
