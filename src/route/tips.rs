use mongodb::Database;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::tip::db::TipDbExt;
use crate::data::tip::{
    add_tip, delete_tip, toggle_like, LikeCountResponse, TipCreateData, TipResponse,
};
use crate::resp::jwt::SessionToken;
use crate::resp::problem::Problem;
use crate::resp::MessageResponse;

/// Study tips for a course, newest first
#[utoipa::path(
    params(("course", description = "course ID")),
    responses(
        (status = 200, description = "Tips with their likes", body = Vec<TipResponse>),
    )
)]
#[get("/course/<course>")]
#[tracing::instrument(skip(db))]
pub async fn tip_list(course: Uuid, db: &State<Database>) -> Result<Json<Vec<TipResponse>>, Problem> {
    let tips = db.list_course_tips(course).await?;
    Ok(Json(tips.into_iter().map(TipResponse::from).collect()))
}

/// Share a study tip
#[utoipa::path(
    params(("course", description = "course ID")),
    request_body = TipCreateData,
    responses(
        (status = 201, description = "Tip stored", body = TipResponse),
        (status = 400, description = "Empty text", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/course/<course>", format = "json", data = "<data>")]
#[tracing::instrument(skip(db))]
pub async fn tip_create(
    course: Uuid,
    data: Json<TipCreateData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Custom<Json<TipResponse>>, Problem> {
    let tip = add_tip(db.inner(), course, &auth, &data).await?;
    Ok(Custom(Status::Created, Json(tip.into())))
}

/// Like a tip, or take the like back
#[utoipa::path(
    params(("id", description = "tip ID")),
    responses(
        (status = 200, description = "Like count after the toggle", body = LikeCountResponse),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 404, description = "Tip doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/<id>/like", rank = 2)]
#[tracing::instrument(skip(db))]
pub async fn tip_like(
    id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<LikeCountResponse>, Problem> {
    let likes = toggle_like(db.inner(), id, &auth).await?;
    Ok(Json(LikeCountResponse { likes }))
}

/// Delete a tip (owner or admin)
#[utoipa::path(
    params(("id", description = "tip ID")),
    responses(
        (status = 200, description = "Tip removed", body = MessageResponse),
        (status = 403, description = "Tip belongs to someone else", body = Problem),
        (status = 404, description = "Tip doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/<id>")]
#[tracing::instrument(skip(db))]
pub async fn tip_delete(
    id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<MessageResponse>, Problem> {
    delete_tip(db.inner(), id, &auth).await?;
    Ok(Json(MessageResponse::new("Tip removed")))
}
