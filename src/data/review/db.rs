use bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{Review, REVIEW_COLLECTION_NAME};
use crate::data::filter;
use crate::resp::problem::Problem;

pub trait ReviewDbExt {
    async fn insert_review(&self, review: &Review) -> Result<(), Problem>;
    async fn get_review(&self, id: Uuid) -> Result<Option<Review>, Problem>;
    async fn delete_review(&self, id: Uuid) -> Result<Option<Review>, Problem>;

    /// Newest first.
    async fn list_course_reviews(&self, course: Uuid, approved: bool)
        -> Result<Vec<Review>, Problem>;
    /// Unapproved reviews of every course, newest first.
    async fn list_pending_reviews(&self) -> Result<Vec<Review>, Problem>;

    async fn approved_ratings(&self, course: Uuid) -> Result<Vec<u8>, Problem>;

    async fn set_review_approval(&self, id: Uuid, approved: bool)
        -> Result<Option<Review>, Problem>;
}

#[derive(Deserialize)]
struct RatingOnly {
    rating: u8,
}

impl ReviewDbExt for Database {
    async fn insert_review(&self, review: &Review) -> Result<(), Problem> {
        self.collection::<Review>(REVIEW_COLLECTION_NAME)
            .insert_one(review, None)
            .await?;
        Ok(())
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>, Problem> {
        self.collection(REVIEW_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn delete_review(&self, id: Uuid) -> Result<Option<Review>, Problem> {
        self.collection(REVIEW_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn list_course_reviews(
        &self,
        course: Uuid,
        approved: bool,
    ) -> Result<Vec<Review>, Problem> {
        let mut query = filter::by_course(course);
        query.insert("isApproved", approved);

        let options = FindOptions::builder()
            .sort(filter::newest_first())
            .build();

        let cursor = self
            .collection::<Review>(REVIEW_COLLECTION_NAME)
            .find(query, options)
            .await?;

        cursor.try_collect().await.map_err(Problem::from)
    }

    async fn list_pending_reviews(&self) -> Result<Vec<Review>, Problem> {
        let options = FindOptions::builder()
            .sort(filter::newest_first())
            .build();

        let cursor = self
            .collection::<Review>(REVIEW_COLLECTION_NAME)
            .find(doc! { "isApproved": false }, options)
            .await?;

        cursor.try_collect().await.map_err(Problem::from)
    }

    async fn approved_ratings(&self, course: Uuid) -> Result<Vec<u8>, Problem> {
        let mut query = filter::by_course(course);
        query.insert("isApproved", true);

        let options = FindOptions::builder()
            .projection(doc! { "_id": 0, "rating": 1 })
            .build();

        let cursor = self
            .collection::<RatingOnly>(REVIEW_COLLECTION_NAME)
            .find(query, options)
            .await?;

        let ratings: Vec<RatingOnly> = cursor.try_collect().await?;
        Ok(ratings.into_iter().map(|it| it.rating).collect())
    }

    async fn set_review_approval(
        &self,
        id: Uuid,
        approved: bool,
    ) -> Result<Option<Review>, Problem> {
        let update = doc! {
            "$set": {
                "isApproved": approved,
                "updatedAt": bson::DateTime::now(),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection(REVIEW_COLLECTION_NAME)
            .find_one_and_update(filter::by_id(id), update, options)
            .await
            .map_err(Problem::from)
    }
}
