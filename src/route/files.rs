use std::path::PathBuf;

use rocket::fs::NamedFile;
use rocket::serde::json::Json;
use rocket::State;

use crate::resp::MessageResponse;
use crate::storage::UploadStore;

/// Health check
#[utoipa::path(
    responses(
        (status = 200, description = "Server is up", body = MessageResponse),
    )
)]
#[get("/")]
pub fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("Study Circle Hub API is running"))
}

/// Serves stored uploads. `PathBuf` segments reject `..` and hidden files.
#[get("/<path..>")]
pub async fn upload_file(path: PathBuf, uploads: &State<UploadStore>) -> Option<NamedFile> {
    NamedFile::open(uploads.dir().join(path)).await.ok()
}
