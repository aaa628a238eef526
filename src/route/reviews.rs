use mongodb::Database;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::access;
use crate::config::Config;
use crate::data::review::db::ReviewDbExt;
use crate::data::review::{
    add_review, delete_review, set_review_approval, ReviewApprovalData, ReviewCreateData,
    ReviewResponse,
};
use crate::resp::jwt::SessionToken;
use crate::resp::problem::Problem;
use crate::resp::MessageResponse;

fn responses(reviews: Vec<crate::data::review::Review>) -> Json<Vec<ReviewResponse>> {
    Json(reviews.into_iter().map(ReviewResponse::from).collect())
}

/// Approved reviews of a course, newest first
#[utoipa::path(
    params(("course", description = "course ID")),
    responses(
        (status = 200, description = "Approved reviews", body = Vec<ReviewResponse>),
    )
)]
#[get("/course/<course>")]
#[tracing::instrument(skip(db))]
pub async fn review_list(
    course: Uuid,
    db: &State<Database>,
) -> Result<Json<Vec<ReviewResponse>>, Problem> {
    Ok(responses(db.list_course_reviews(course, true).await?))
}

/// Review a course
///
/// Updates the course rating and review count.
#[utoipa::path(
    params(("course", description = "course ID")),
    request_body = ReviewCreateData,
    responses(
        (status = 201, description = "Review stored", body = ReviewResponse),
        (status = 400, description = "Rating outside 1-5 or empty text", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/course/<course>", format = "json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn review_create(
    course: Uuid,
    data: Json<ReviewCreateData>,
    auth: SessionToken,
    db: &State<Database>,
    config: &State<Config>,
) -> Result<Custom<Json<ReviewResponse>>, Problem> {
    let approved = !config.reviews_require_approval;
    let review = add_review(db.inner(), course, &auth, &data, approved).await?;

    Ok(Custom(Status::Created, Json(review.into())))
}

/// Delete a review (owner or admin)
#[utoipa::path(
    params(("id", description = "review ID")),
    responses(
        (status = 200, description = "Review removed", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Review belongs to someone else", body = Problem),
        (status = 404, description = "Review doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/<id>")]
#[tracing::instrument(skip(db))]
pub async fn review_delete(
    id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<MessageResponse>, Problem> {
    delete_review(db.inner(), id, &auth).await?;
    Ok(Json(MessageResponse::new("Review removed")))
}

/// Reviews waiting for moderation (admin)
#[utoipa::path(
    responses(
        (status = 200, description = "Unapproved reviews of all courses", body = Vec<ReviewResponse>),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/pending")]
#[tracing::instrument(skip(db))]
pub async fn review_pending(
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Vec<ReviewResponse>>, Problem> {
    access::ensure_admin(&auth)?;
    Ok(responses(db.list_pending_reviews().await?))
}

/// Approve or hide a review (admin)
#[utoipa::path(
    params(("id", description = "review ID")),
    request_body = ReviewApprovalData,
    responses(
        (status = 200, description = "Updated review", body = ReviewResponse),
        (status = 403, description = "Caller isn't an admin", body = Problem),
        (status = 404, description = "Review doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/<id>/approval", format = "json", data = "<data>", rank = 2)]
#[tracing::instrument(skip(db))]
pub async fn review_approval(
    id: Uuid,
    data: Json<ReviewApprovalData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<ReviewResponse>, Problem> {
    access::ensure_admin(&auth)?;

    let review = set_review_approval(db.inner(), id, data.is_approved).await?;
    tracing::info!(
        "admin {} set approval of review {} to {}",
        auth.user,
        id,
        review.is_approved
    );
    Ok(Json(review.into()))
}
