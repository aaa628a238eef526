use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::{self, Owned};
use crate::data::course::db::CourseDbExt;
use crate::data::course::rating::refresh_course_rating;
use crate::resp::jwt::SessionToken;
use crate::resp::problem::{problems, Problem};
use crate::util::non_blank;

pub mod db;

use db::ReviewDbExt;

pub static REVIEW_COLLECTION_NAME: &str = "reviews";

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

fn true_bool() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub user: Uuid,
    pub user_name: String,
    pub rating: u8,
    pub text: String,
    /// Only approved reviews are listed and counted towards the course rating.
    #[serde(default = "true_bool")]
    pub is_approved: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Owned for Review {
    fn owner(&self) -> Uuid {
        self.user
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReviewCreateData {
    /// Whole stars, 1 to 5.
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ReviewCreateData {
    pub fn validate(&self) -> Result<(u8, String), Problem> {
        let rating = self
            .rating
            .ok_or_else(|| problems::validation("rating", "Please provide a rating."))?;
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(problems::validation(
                "rating",
                format!("Rating must be between {} and {}.", MIN_RATING, MAX_RATING),
            ));
        }

        let text = self
            .text
            .as_deref()
            .and_then(non_blank)
            .ok_or_else(|| problems::validation("text", "Please provide the review text."))?;

        // range checked above
        Ok((rating as u8, text))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub course: Uuid,
    pub user: Uuid,
    pub user_name: String,
    pub rating: u8,
    pub text: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(value: Review) -> Self {
        Self {
            id: value.id,
            course: value.course,
            user: value.user,
            user_name: value.user_name,
            rating: value.rating,
            text: value.text,
            is_approved: value.is_approved,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewApprovalData {
    pub is_approved: bool,
}

/// Stores a new review and refreshes the rating of its course.
pub async fn add_review<S>(
    db: &S,
    course: Uuid,
    author: &SessionToken,
    data: &ReviewCreateData,
    approved: bool,
) -> Result<Review, Problem>
where
    S: CourseDbExt + ReviewDbExt,
{
    let (rating, text) = data.validate()?;

    if db.get_course(course).await?.is_none() {
        return Err(problems::not_found("Course", course));
    }

    let now = Utc::now();
    let review = Review {
        id: Uuid::new_v4(),
        course,
        user: author.user,
        user_name: author.name.clone(),
        rating,
        text,
        is_approved: approved,
        created_at: now,
        updated_at: now,
    };

    db.insert_review(&review).await?;
    tracing::info!("user {} reviewed course {} with {}", author.user, course, rating);

    refresh_course_rating(db, course).await?;
    Ok(review)
}

/// Removes a review owned by the caller (or any review, for admins).
pub async fn delete_review<S>(db: &S, id: Uuid, caller: &SessionToken) -> Result<Review, Problem>
where
    S: CourseDbExt + ReviewDbExt,
{
    let review = db
        .get_review(id)
        .await?
        .ok_or_else(|| problems::not_found("Review", id))?;

    access::ensure_can_modify(caller, &review, "Review")?;

    let removed = db
        .delete_review(id)
        .await?
        .ok_or_else(|| problems::not_found("Review", id))?;
    tracing::info!("user {} deleted review {}", caller.user, id);

    refresh_course_rating(db, removed.course).await?;
    Ok(removed)
}

/// Moderation: shows or hides a review and refreshes its course rating.
pub async fn set_review_approval<S>(db: &S, id: Uuid, approved: bool) -> Result<Review, Problem>
where
    S: CourseDbExt + ReviewDbExt,
{
    let review = db
        .set_review_approval(id, approved)
        .await?
        .ok_or_else(|| problems::not_found("Review", id))?;

    refresh_course_rating(db, review.course).await?;
    Ok(review)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::course::test_course;
    use crate::data::memory::MemoryStore;
    use crate::role::Role;

    fn student(name: &str) -> SessionToken {
        SessionToken::new(Uuid::new_v4(), name, Role::Student)
    }

    fn review_data(rating: i64) -> ReviewCreateData {
        ReviewCreateData {
            rating: Some(rating),
            text: Some(format!("Worth {} stars", rating)),
        }
    }

    #[test]
    fn rating_outside_range_is_rejected() {
        for rating in [0, 6, -1] {
            let problem = review_data(rating).validate().expect_err("must reject");
            assert_eq!(problem.status.code, 400);
        }
        assert_eq!(review_data(5).validate().expect("valid").0, 5);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let missing_rating = ReviewCreateData {
            rating: None,
            text: Some("Great".to_string()),
        };
        assert_eq!(missing_rating.validate().unwrap_err().body["field"], "rating");

        let blank_text = ReviewCreateData {
            rating: Some(3),
            text: Some("   ".to_string()),
        };
        assert_eq!(blank_text.validate().unwrap_err().body["field"], "text");
    }

    #[rocket::async_test]
    async fn course_rating_follows_reviews() {
        let store = MemoryStore::default();
        let course = store.add_course(test_course("CS101"));
        let ada = student("Ada");

        let mut ids = vec![];
        for rating in [5, 3, 4] {
            let review = add_review(&store, course, &ada, &review_data(rating), true)
                .await
                .expect("review should be stored");
            ids.push((rating, review.id));
        }

        let stored = store.course(course);
        assert_eq!(stored.rating, 4.0);
        assert_eq!(stored.review_count, 3);

        let (_, three) = ids.iter().find(|(r, _)| *r == 3).expect("rating 3 review");
        delete_review(&store, *three, &ada)
            .await
            .expect("owner may delete");

        let stored = store.course(course);
        assert_eq!(stored.rating, 4.5);
        assert_eq!(stored.review_count, 2);
    }

    #[rocket::async_test]
    async fn deleting_last_review_zeroes_course() {
        let store = MemoryStore::default();
        let course = store.add_course(test_course("MATH101"));
        let ada = student("Ada");

        let review = add_review(&store, course, &ada, &review_data(2), true)
            .await
            .expect("review should be stored");
        delete_review(&store, review.id, &ada)
            .await
            .expect("owner may delete");

        let stored = store.course(course);
        assert_eq!(stored.rating, 0.0);
        assert_eq!(stored.review_count, 0);
    }

    #[rocket::async_test]
    async fn stale_aggregate_is_corrected_on_next_write() {
        let store = MemoryStore::default();
        let mut drifted = test_course("PHY200");
        drifted.rating = 1.0;
        drifted.review_count = 17;
        let course = store.add_course(drifted);

        add_review(&store, course, &student("Ada"), &review_data(4), true)
            .await
            .expect("review should be stored");

        let stored = store.course(course);
        assert_eq!(stored.rating, 4.0);
        assert_eq!(stored.review_count, 1);
    }

    #[rocket::async_test]
    async fn stranger_cannot_delete_review() {
        let store = MemoryStore::default();
        let course = store.add_course(test_course("CS101"));
        let review = add_review(&store, course, &student("Ada"), &review_data(5), true)
            .await
            .expect("review should be stored");

        let problem = delete_review(&store, review.id, &student("Eve"))
            .await
            .expect_err("stranger must be denied");

        assert_eq!(problem.status.code, 403);
        assert!(store.get_review(review.id).await.unwrap().is_some());
        assert_eq!(store.course(course).review_count, 1);
    }

    #[rocket::async_test]
    async fn admin_can_delete_any_review() {
        let store = MemoryStore::default();
        let course = store.add_course(test_course("CS101"));
        let review = add_review(&store, course, &student("Ada"), &review_data(5), true)
            .await
            .expect("review should be stored");

        let dean = SessionToken::new(Uuid::new_v4(), "Dean", Role::Admin);
        delete_review(&store, review.id, &dean)
            .await
            .expect("admin may delete");

        assert!(store.get_review(review.id).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn missing_targets_are_not_found() {
        let store = MemoryStore::default();
        let ada = student("Ada");

        let problem = add_review(&store, Uuid::new_v4(), &ada, &review_data(4), true)
            .await
            .expect_err("course doesn't exist");
        assert_eq!(problem.status.code, 404);

        let problem = delete_review(&store, Uuid::new_v4(), &ada)
            .await
            .expect_err("review doesn't exist");
        assert_eq!(problem.status.code, 404);
    }

    #[rocket::async_test]
    async fn only_approved_reviews_count() {
        let store = MemoryStore::default();
        let course = store.add_course(test_course("BIO110"));
        let ada = student("Ada");

        add_review(&store, course, &ada, &review_data(5), true)
            .await
            .expect("review should be stored");
        let pending = add_review(&store, course, &ada, &review_data(1), false)
            .await
            .expect("review should be stored");

        assert_eq!(store.course(course).rating, 5.0);
        assert_eq!(store.course(course).review_count, 1);

        set_review_approval(&store, pending.id, true)
            .await
            .expect("review exists");
        assert_eq!(store.course(course).rating, 3.0);
        assert_eq!(store.course(course).review_count, 2);

        set_review_approval(&store, pending.id, false)
            .await
            .expect("review exists");
        assert_eq!(store.course(course).rating, 5.0);
        assert_eq!(store.course(course).review_count, 1);
    }
}
