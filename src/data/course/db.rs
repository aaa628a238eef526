use bson::doc;
use mongodb::options::FindOptions;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::rating::RatingSummary;
use super::{Course, CourseFilter, COURSE_COLLECTION_NAME};
use crate::data::filter;
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;

pub trait CourseDbExt {
    async fn insert_course(&self, course: &Course) -> Result<(), Problem>;
    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, Problem>;
    async fn find_course_by_code(&self, code: &str) -> Result<Option<Course>, Problem>;
    async fn list_courses(
        &self,
        course_filter: &CourseFilter,
        page: PageState,
    ) -> Result<Vec<Course>, Problem>;

    /// Writes mean and count together. `false` when the course is gone.
    async fn set_course_rating(&self, id: Uuid, summary: RatingSummary)
        -> Result<bool, Problem>;

    async fn delete_course(&self, id: Uuid) -> Result<Option<Course>, Problem>;
}

impl CourseDbExt for Database {
    async fn insert_course(&self, course: &Course) -> Result<(), Problem> {
        self.collection::<Course>(COURSE_COLLECTION_NAME)
            .insert_one(course, None)
            .await?;
        Ok(())
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, Problem> {
        self.collection(COURSE_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn find_course_by_code(&self, code: &str) -> Result<Option<Course>, Problem> {
        self.collection(COURSE_COLLECTION_NAME)
            .find_one(doc! { "code": code.trim().to_uppercase() }, None)
            .await
            .map_err(Problem::from)
    }

    async fn list_courses(
        &self,
        course_filter: &CourseFilter,
        page: PageState,
    ) -> Result<Vec<Course>, Problem> {
        let options = FindOptions::builder()
            .sort(filter::newest_first())
            .skip(page.skip())
            .limit(i64::from(page.page_length))
            .build();

        let cursor = self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .find(course_filter.to_document(), options)
            .await?;

        cursor.try_collect().await.map_err(Problem::from)
    }

    async fn set_course_rating(
        &self,
        id: Uuid,
        summary: RatingSummary,
    ) -> Result<bool, Problem> {
        let update = doc! {
            "$set": {
                "rating": summary.rating,
                "reviewCount": i64::from(summary.review_count),
                "updatedAt": bson::DateTime::now(),
            }
        };

        let result = self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .update_one(filter::by_id(id), update, None)
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn delete_course(&self, id: Uuid) -> Result<Option<Course>, Problem> {
        self.collection(COURSE_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }
}
