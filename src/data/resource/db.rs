use mongodb::options::FindOptions;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{Resource, RESOURCE_COLLECTION_NAME};
use crate::data::filter;
use crate::resp::problem::Problem;

pub trait ResourceDbExt {
    async fn insert_resource(&self, resource: &Resource) -> Result<(), Problem>;
    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>, Problem>;
    /// Newest first.
    async fn list_course_resources(&self, course: Uuid) -> Result<Vec<Resource>, Problem>;
    async fn delete_resource(&self, id: Uuid) -> Result<Option<Resource>, Problem>;
}

impl ResourceDbExt for Database {
    async fn insert_resource(&self, resource: &Resource) -> Result<(), Problem> {
        self.collection::<Resource>(RESOURCE_COLLECTION_NAME)
            .insert_one(resource, None)
            .await?;
        Ok(())
    }

    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>, Problem> {
        self.collection(RESOURCE_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn list_course_resources(&self, course: Uuid) -> Result<Vec<Resource>, Problem> {
        let options = FindOptions::builder()
            .sort(filter::newest_first())
            .build();

        let cursor = self
            .collection::<Resource>(RESOURCE_COLLECTION_NAME)
            .find(filter::by_course(course), options)
            .await?;

        cursor.try_collect().await.map_err(Problem::from)
    }

    async fn delete_resource(&self, id: Uuid) -> Result<Option<Resource>, Problem> {
        self.collection(RESOURCE_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }
}
