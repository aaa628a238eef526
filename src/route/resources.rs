use mongodb::Database;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::resource::db::ResourceDbExt;
use crate::data::resource::{
    add_resource, delete_resource, ResourceDraft, ResourceKind, ResourceResponse,
};
use crate::resp::jwt::SessionToken;
use crate::resp::problem::Problem;
use crate::resp::MessageResponse;
use crate::storage::UploadStore;

/// Multipart body of a resource upload. Either `file` or `url` is required.
#[derive(Debug, FromForm)]
pub struct ResourceUpload<'r> {
    pub title: Option<String>,
    #[field(name = "type")]
    pub kind: Option<ResourceKind>,
    pub url: Option<String>,
    pub file: Option<TempFile<'r>>,
}

/// OpenAPI shape of [`ResourceUpload`].
#[derive(Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct ResourceUploadForm {
    title: String,
    #[serde(rename = "type")]
    kind: ResourceKind,
    url: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    file: Option<Vec<u8>>,
}

/// Shared resources of a course, newest first
#[utoipa::path(
    params(("course", description = "course ID")),
    responses(
        (status = 200, description = "Resources", body = Vec<ResourceResponse>),
    )
)]
#[get("/course/<course>")]
#[tracing::instrument(skip(db))]
pub async fn resource_list(
    course: Uuid,
    db: &State<Database>,
) -> Result<Json<Vec<ResourceResponse>>, Problem> {
    let resources = db.list_course_resources(course).await?;
    Ok(Json(resources.into_iter().map(ResourceResponse::from).collect()))
}

/// Share a file or link
///
/// Accepted files are PDF, JPEG and PNG up to the configured size.
#[utoipa::path(
    params(("course", description = "course ID")),
    request_body(content = ResourceUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Resource stored", body = ResourceResponse),
        (status = 400, description = "Missing fields, unsupported file type or a file sent as a link", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
        (status = 413, description = "File too large", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/course/<course>", data = "<upload>")]
#[tracing::instrument(skip(db, uploads))]
pub async fn resource_create(
    course: Uuid,
    upload: Form<ResourceUpload<'_>>,
    auth: SessionToken,
    db: &State<Database>,
    uploads: &State<UploadStore>,
) -> Result<Custom<Json<ResourceResponse>>, Problem> {
    let mut upload = upload.into_inner();

    let stored = match upload.file.as_mut() {
        Some(file) if file.len() > 0 => Some(uploads.store(file).await?),
        _ => None,
    };

    let draft = ResourceDraft {
        title: upload.title,
        kind: upload.kind,
        url: upload.url,
        upload: stored.clone(),
    };

    match add_resource(db.inner(), course, &auth, &draft).await {
        Ok(resource) => Ok(Custom(Status::Created, Json(resource.into()))),
        Err(problem) => {
            if let Some(url) = stored {
                uploads.remove(&url).await;
            }
            Err(problem)
        }
    }
}

/// Delete a resource (owner or admin)
///
/// Stored files are removed along with the record.
#[utoipa::path(
    params(("id", description = "resource ID")),
    responses(
        (status = 200, description = "Resource removed", body = MessageResponse),
        (status = 403, description = "Resource belongs to someone else", body = Problem),
        (status = 404, description = "Resource doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/<id>")]
#[tracing::instrument(skip(db, uploads))]
pub async fn resource_delete(
    id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
    uploads: &State<UploadStore>,
) -> Result<Json<MessageResponse>, Problem> {
    delete_resource(db.inner(), uploads, id, &auth).await?;
    Ok(Json(MessageResponse::new("Resource removed")))
}
