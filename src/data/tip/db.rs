use bson::doc;
use mongodb::options::FindOptions;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{Likes, StudyTip, TIP_COLLECTION_NAME};
use crate::data::filter;
use crate::resp::problem::Problem;

pub trait TipDbExt {
    async fn insert_tip(&self, tip: &StudyTip) -> Result<(), Problem>;
    async fn get_tip(&self, id: Uuid) -> Result<Option<StudyTip>, Problem>;
    /// Newest first.
    async fn list_course_tips(&self, course: Uuid) -> Result<Vec<StudyTip>, Problem>;
    /// `false` when the tip is gone.
    async fn save_tip_likes(&self, id: Uuid, likes: &Likes) -> Result<bool, Problem>;
    async fn delete_tip(&self, id: Uuid) -> Result<Option<StudyTip>, Problem>;
}

impl TipDbExt for Database {
    async fn insert_tip(&self, tip: &StudyTip) -> Result<(), Problem> {
        self.collection::<StudyTip>(TIP_COLLECTION_NAME)
            .insert_one(tip, None)
            .await?;
        Ok(())
    }

    async fn get_tip(&self, id: Uuid) -> Result<Option<StudyTip>, Problem> {
        self.collection(TIP_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn list_course_tips(&self, course: Uuid) -> Result<Vec<StudyTip>, Problem> {
        let options = FindOptions::builder()
            .sort(filter::newest_first())
            .build();

        let cursor = self
            .collection::<StudyTip>(TIP_COLLECTION_NAME)
            .find(filter::by_course(course), options)
            .await?;

        cursor.try_collect().await.map_err(Problem::from)
    }

    async fn save_tip_likes(&self, id: Uuid, likes: &Likes) -> Result<bool, Problem> {
        let update = doc! { "$set": { "likes": bson::to_bson(likes)? } };

        let result = self
            .collection::<StudyTip>(TIP_COLLECTION_NAME)
            .update_one(filter::by_id(id), update, None)
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn delete_tip(&self, id: Uuid) -> Result<Option<StudyTip>, Problem> {
        self.collection(TIP_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }
}
