use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket, Route};

pub mod courses;
pub mod files;
pub mod resources;
pub mod reviews;
pub mod tips;
pub mod users;

use courses::*;
use files::*;
use resources::*;
use reviews::*;
use tips::*;
use users::*;

use utoipa::OpenApi;

use crate::{
    data::{
        course::{CourseCreateData, CourseResponse, Difficulty},
        resource::{ResourceKind, ResourceResponse},
        review::{ReviewApprovalData, ReviewCreateData, ReviewResponse},
        tip::{LikeCountResponse, TipCreateData, TipResponse},
        user::{AuthResponse, UserLoginData, UserResponse, UserSignupData},
    },
    resp::{
        jwt::{doc::JWTAuth, GuardProblem},
        problem::Problem,
        MessageResponse,
    },
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(health),
    components(schemas(
        Role,
        Difficulty,
        ResourceKind,
        CourseCreateData,
        CourseResponse,
        ReviewCreateData,
        ReviewApprovalData,
        ReviewResponse,
        TipCreateData,
        TipResponse,
        LikeCountResponse,
        ResourceResponse,
        ResourceUploadForm,
        UserSignupData,
        UserLoginData,
        UserResponse,
        AuthResponse,
        MessageResponse,
        Problem
    )),
    modifiers(&JWTAuth)
)]
pub struct ApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(user_register, user_login, user_profile),
    modifiers(&USERS_PREFIX)
)]
struct UsersApi;

#[derive(OpenApi)]
#[openapi(
    paths(course_list, course_get, course_create, course_delete),
    modifiers(&COURSES_PREFIX)
)]
struct CoursesApi;

#[derive(OpenApi)]
#[openapi(
    paths(review_list, review_create, review_delete, review_pending, review_approval),
    modifiers(&REVIEWS_PREFIX)
)]
struct ReviewsApi;

#[derive(OpenApi)]
#[openapi(
    paths(tip_list, tip_create, tip_like, tip_delete),
    modifiers(&TIPS_PREFIX)
)]
struct TipsApi;

#[derive(OpenApi)]
#[openapi(
    paths(resource_list, resource_create, resource_delete),
    modifiers(&RESOURCES_PREFIX)
)]
struct ResourcesApi;

pub struct PathPrefix(pub &'static str);
static USERS_PREFIX: PathPrefix = PathPrefix("/api/users");
static COURSES_PREFIX: PathPrefix = PathPrefix("/api/courses");
static REVIEWS_PREFIX: PathPrefix = PathPrefix("/api/reviews");
static TIPS_PREFIX: PathPrefix = PathPrefix("/api/tips");
static RESOURCES_PREFIX: PathPrefix = PathPrefix("/api/resources");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            let full = match path.as_str() {
                "/" => self.0.to_string(),
                _ => self.0.to_string() + path.as_ref(),
            };
            new_paths.insert(full, item);
        }

        openapi.paths.paths = new_paths;
    }
}

/// Complete OpenAPI document of the HTTP surface.
pub fn api_doc() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.merge(UsersApi::openapi());
    doc.merge(CoursesApi::openapi());
    doc.merge(ReviewsApi::openapi());
    doc.merge(TipsApi::openapi());
    doc.merge(ResourcesApi::openapi());
    doc
}

#[get("/openapi.json")]
pub fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(api_doc())
}

/// Renders failures without a handler-produced body as problems. Guards that
/// rejected the request leave their own problem in the request-local cache.
#[catch(default)]
pub fn default_catcher(status: Status, req: &Request<'_>) -> Problem {
    let cached = req.local_cache(|| GuardProblem(None));
    match &cached.0 {
        Some(problem) => problem.clone(),
        None => Problem::new_untyped(status, status.reason().unwrap_or("Unknown error")),
    }
}

pub fn user_routes() -> Vec<Route> {
    routes![user_register, user_login, user_profile]
}

pub fn course_routes() -> Vec<Route> {
    routes![course_list, course_get, course_create, course_delete]
}

pub fn review_routes() -> Vec<Route> {
    routes![
        review_list,
        review_create,
        review_delete,
        review_pending,
        review_approval
    ]
}

pub fn tip_routes() -> Vec<Route> {
    routes![tip_list, tip_create, tip_like, tip_delete]
}

pub fn resource_routes() -> Vec<Route> {
    routes![resource_list, resource_create, resource_delete]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", routes![health])
        .mount("/api", routes![openapi_json])
        .mount("/api/users", user_routes())
        .mount("/api/courses", course_routes())
        .mount("/api/reviews", review_routes())
        .mount("/api/tips", tip_routes())
        .mount("/api/resources", resource_routes())
        .mount("/uploads", routes![upload_file])
        .register("/", catchers![default_catcher])
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::Value;
    use uuid::Uuid;

    use crate::config::Config;
    use crate::resp::jwt::SessionToken;
    use crate::role::Role;
    use crate::security::Security;

    /// Rocket whose MongoDB client never connects unless a handler touches it.
    async fn client(security: Security) -> Client {
        let mut config = Config::default();
        config.upload_dir = std::env::temp_dir().join("studycirclehub-test-uploads");

        let mongo = mongodb::Client::with_uri_str("mongodb://localhost:27017")
            .await
            .expect("valid MongoDB URI");
        let db = mongo.database("studycirclehub_test");

        let rocket = crate::build_rocket(config, security, db).expect("valid rocket");
        Client::tracked(rocket).await.expect("valid rocket instance")
    }

    #[rocket::async_test]
    async fn health_reports_running() {
        let client = client(Security::ephemeral()).await;

        let response = client.get("/").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let body: Value = response.into_json().await.expect("json body");
        assert_eq!(body["message"], "Study Circle Hub API is running");
    }

    #[rocket::async_test]
    async fn openapi_lists_prefixed_paths() {
        let client = client(Security::ephemeral()).await;

        let response = client.get("/api/openapi.json").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let body: Value = response.into_json().await.expect("json body");
        let paths = body["paths"].as_object().expect("paths object");
        assert!(paths.contains_key("/api/tips/{id}/like"));
        assert!(paths.contains_key("/api/reviews/course/{course}"));
        assert!(paths.contains_key("/api/users/register"));
    }

    #[rocket::async_test]
    async fn approval_route_resolves_beside_course_routes() {
        let security = Security::ephemeral();
        let token = SessionToken::new(Uuid::new_v4(), "Ada", Role::Student)
            .encode_jwt(&security.jwt_secret)
            .expect("token encodes");
        let client = client(security).await;

        let response = client
            .post(format!("/api/reviews/{}/approval", Uuid::new_v4()))
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .header(ContentType::JSON)
            .body(r#"{"isApproved": true}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn mutations_require_authentication() {
        let client = client(Security::ephemeral()).await;
        let id = Uuid::new_v4();

        let requests = [
            client.post(format!("/api/tips/{}/like", id)),
            client.delete(format!("/api/reviews/{}", id)),
            client.delete(format!("/api/tips/{}", id)),
            client.delete(format!("/api/resources/{}", id)),
            client.get("/api/users/profile"),
        ];

        for request in requests {
            let response = request.dispatch().await;
            assert_eq!(response.status(), Status::Unauthorized);
            assert_eq!(
                response.content_type(),
                Some(ContentType::new("application", "problem+json"))
            );

            let body: Value = response.into_json().await.expect("problem body");
            assert_eq!(body["message"], "Not authorized, no token");
        }
    }

    #[rocket::async_test]
    async fn tokens_signed_elsewhere_are_rejected() {
        let client = client(Security::ephemeral()).await;

        let forged = SessionToken::new(Uuid::new_v4(), "Mallory", Role::Admin)
            .encode_jwt(b"some other secret")
            .expect("token encodes");

        let response = client
            .post(format!("/api/tips/{}/like", Uuid::new_v4()))
            .header(Header::new("Authorization", format!("Bearer {}", forged)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let body: Value = response.into_json().await.expect("problem body");
        assert_eq!(body["message"], "Not authorized, token failed");
    }

    #[rocket::async_test]
    async fn admin_routes_reject_students() {
        let security = Security::ephemeral();
        let token = SessionToken::new(Uuid::new_v4(), "Ada", Role::Student)
            .encode_jwt(&security.jwt_secret)
            .expect("token encodes");
        let client = client(security).await;

        let response = client
            .get("/api/reviews/pending")
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .delete(format!("/api/courses/{}", Uuid::new_v4()))
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn invalid_review_is_rejected_before_storage() {
        let security = Security::ephemeral();
        let token = SessionToken::new(Uuid::new_v4(), "Ada", Role::Student)
            .encode_jwt(&security.jwt_secret)
            .expect("token encodes");
        let client = client(security).await;

        let response = client
            .post(format!("/api/reviews/course/{}", Uuid::new_v4()))
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .header(ContentType::JSON)
            .body(r#"{"rating": 6, "text": "Too good"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let body: Value = response.into_json().await.expect("problem body");
        assert_eq!(body["field"], "rating");
    }
}
