use mongodb::Database;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::access;
use crate::data::course::db::CourseDbExt;
use crate::data::course::{create_course, CourseCreateData, CourseFilter, CourseResponse};
use crate::middleware::paging::PageState;
use crate::resp::jwt::SessionToken;
use crate::resp::problem::{problems, Problem};
use crate::resp::MessageResponse;

/// List courses, newest first
#[utoipa::path(
    params(
        CourseFilter,
        ("page" = Option<u32>, Query, description = "Zero based page number"),
        ("len" = Option<u32>, Query, description = "Page length, at most 100"),
    ),
    responses(
        (status = 200, description = "Matching courses", body = Vec<CourseResponse>),
    )
)]
#[get("/?<filter..>")]
#[tracing::instrument(skip(db))]
pub async fn course_list(
    filter: CourseFilter,
    page: PageState,
    db: &State<Database>,
) -> Result<Json<Vec<CourseResponse>>, Problem> {
    let courses = db.list_courses(&filter, page).await?;
    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

/// Get a single course
#[utoipa::path(
    params(("id", description = "course ID")),
    responses(
        (status = 200, description = "Course with its current rating", body = CourseResponse),
        (status = 404, description = "Course doesn't exist", body = Problem),
    )
)]
#[get("/<id>")]
#[tracing::instrument(skip(db))]
pub async fn course_get(id: Uuid, db: &State<Database>) -> Result<Json<CourseResponse>, Problem> {
    db.get_course(id)
        .await?
        .map(|course| Json(course.into()))
        .ok_or_else(|| problems::not_found("Course", id))
}

/// Create a course (admin)
#[utoipa::path(
    request_body = CourseCreateData,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 400, description = "Missing fields or duplicate code", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/", format = "json", data = "<data>")]
#[tracing::instrument(skip(db))]
pub async fn course_create(
    data: Json<CourseCreateData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Custom<Json<CourseResponse>>, Problem> {
    access::ensure_admin(&auth)?;

    let course = create_course(db.inner(), data.into_inner()).await?;
    Ok(Custom(Status::Created, Json(course.into())))
}

/// Delete a course (admin)
///
/// Reviews, tips and resources of the course are left in place.
#[utoipa::path(
    params(("id", description = "course ID")),
    responses(
        (status = 200, description = "Course removed", body = MessageResponse),
        (status = 403, description = "Caller isn't an admin", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/<id>")]
#[tracing::instrument(skip(db))]
pub async fn course_delete(
    id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<MessageResponse>, Problem> {
    access::ensure_admin(&auth)?;

    let removed = db
        .delete_course(id)
        .await?
        .ok_or_else(|| problems::not_found("Course", id))?;
    tracing::info!("admin {} deleted course {}", auth.user, removed.code);

    Ok(Json(MessageResponse::new("Course removed")))
}
