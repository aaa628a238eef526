use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::{self, Owned};
use crate::data::course::db::CourseDbExt;
use crate::resp::jwt::SessionToken;
use crate::resp::problem::{problems, Problem};
use crate::storage::{UploadStore, UPLOAD_URL_PREFIX};
use crate::util::non_blank;

pub mod db;

use db::ResourceDbExt;

pub static RESOURCE_COLLECTION_NAME: &str = "resources";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, FromFormField,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pdf,
    Link,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub user: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// `/uploads/<name>` for stored files, anything else is an external link.
    pub url: String,
    /// Set only when `url` names a file this resource stored itself.
    #[serde(default)]
    pub stored: bool,
    pub uploaded_by: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Owned for Resource {
    fn owner(&self) -> Uuid {
        self.user
    }
}

/// Resource fields as submitted. `upload` is the URL the file part was stored
/// under, `url` is whatever the client sent.
#[derive(Debug, Clone, Default)]
pub struct ResourceDraft {
    pub title: Option<String>,
    pub kind: Option<ResourceKind>,
    pub url: Option<String>,
    pub upload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidResource {
    pub title: String,
    pub kind: ResourceKind,
    pub url: String,
    pub stored: bool,
}

impl ResourceDraft {
    pub fn validate(&self) -> Result<ValidResource, Problem> {
        let title = self
            .title
            .as_deref()
            .and_then(non_blank)
            .ok_or_else(|| problems::validation("title", "Please provide a title."))?;

        let kind = self
            .kind
            .ok_or_else(|| problems::validation("type", "Please provide the resource type."))?;

        if let Some(upload) = &self.upload {
            if kind == ResourceKind::Link {
                return Err(problems::validation(
                    "type",
                    "Uploaded files must be a pdf or an image.",
                ));
            }
            return Ok(ValidResource {
                title,
                kind,
                url: upload.clone(),
                stored: true,
            });
        }

        let url = self.url.as_deref().and_then(non_blank).ok_or_else(|| {
            let detail = match kind {
                ResourceKind::Link => "Links need a URL.",
                _ => "Please upload a file or provide a URL.",
            };
            problems::validation("url", detail)
        })?;

        if url.starts_with(UPLOAD_URL_PREFIX) {
            return Err(problems::validation(
                "url",
                "Stored uploads can't be shared by URL.",
            ));
        }

        Ok(ValidResource {
            title,
            kind,
            url,
            stored: false,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub course: Uuid,
    pub user: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub url: String,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<Resource> for ResourceResponse {
    fn from(value: Resource) -> Self {
        Self {
            id: value.id,
            course: value.course,
            user: value.user,
            title: value.title,
            kind: value.kind,
            url: value.url,
            uploaded_by: value.uploaded_by,
            created_at: value.created_at,
        }
    }
}

pub async fn add_resource<S>(
    db: &S,
    course: Uuid,
    author: &SessionToken,
    draft: &ResourceDraft,
) -> Result<Resource, Problem>
where
    S: CourseDbExt + ResourceDbExt,
{
    let ValidResource {
        title,
        kind,
        url,
        stored,
    } = draft.validate()?;

    if db.get_course(course).await?.is_none() {
        return Err(problems::not_found("Course", course));
    }

    let resource = Resource {
        id: Uuid::new_v4(),
        course,
        user: author.user,
        title,
        kind,
        url,
        stored,
        uploaded_by: author.name.clone(),
        created_at: Utc::now(),
    };

    db.insert_resource(&resource).await?;
    tracing::info!(
        "user {} added {:?} resource {} to course {}",
        author.user,
        kind,
        resource.id,
        course
    );
    Ok(resource)
}

/// Deletes the record and, for stored uploads, the file behind it.
/// File removal is best-effort and never blocks the record deletion.
pub async fn delete_resource<S: ResourceDbExt>(
    db: &S,
    uploads: &UploadStore,
    id: Uuid,
    caller: &SessionToken,
) -> Result<Resource, Problem> {
    let resource = db
        .get_resource(id)
        .await?
        .ok_or_else(|| problems::not_found("Resource", id))?;

    access::ensure_can_modify(caller, &resource, "Resource")?;

    if resource.stored {
        uploads.remove(&resource.url).await;
    }

    let removed = db
        .delete_resource(id)
        .await?
        .ok_or_else(|| problems::not_found("Resource", id))?;
    tracing::info!("user {} deleted resource {}", caller.user, id);
    Ok(removed)
}
