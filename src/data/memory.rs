//! In-process stand-in for MongoDB, implementing every `*DbExt` trait so
//! course, review, tip and resource operations can be exercised in tests.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use super::course::db::CourseDbExt;
use super::course::rating::RatingSummary;
use super::course::{Course, CourseFilter};
use super::resource::db::ResourceDbExt;
use super::resource::Resource;
use super::review::db::ReviewDbExt;
use super::review::Review;
use super::tip::db::TipDbExt;
use super::tip::{Likes, StudyTip};
use super::user::db::{create_user_in, UserDbExt};
use super::user::{User, UserSignupData};
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Salt;

#[derive(Debug, Default)]
pub struct MemoryStore {
    courses: Mutex<Vec<Course>>,
    reviews: Mutex<Vec<Review>>,
    tips: Mutex<Vec<StudyTip>>,
    resources: Mutex<Vec<Resource>>,
    users: Mutex<Vec<User>>,
}

fn lock<T>(items: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Latest insert first among equal timestamps, like a `createdAt` descending sort.
fn newest_first<T: Clone>(
    items: &[T],
    keep: impl Fn(&T) -> bool,
    created_at: impl Fn(&T) -> chrono::DateTime<Utc>,
) -> Vec<T> {
    let mut found: Vec<T> = items.iter().rev().filter(|it| keep(*it)).cloned().collect();
    found.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    found
}

fn take<T>(items: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> Option<T> {
    let index = items.iter().position(matches)?;
    Some(items.remove(index))
}

impl MemoryStore {
    pub fn add_course(&self, course: Course) -> Uuid {
        let id = course.id;
        lock(&self.courses).push(course);
        id
    }

    pub fn course(&self, id: Uuid) -> Course {
        lock(&self.courses)
            .iter()
            .find(|it| it.id == id)
            .cloned()
            .expect("course should be stored")
    }
}

impl CourseDbExt for MemoryStore {
    async fn insert_course(&self, course: &Course) -> Result<(), Problem> {
        lock(&self.courses).push(course.clone());
        Ok(())
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, Problem> {
        Ok(lock(&self.courses).iter().find(|it| it.id == id).cloned())
    }

    async fn find_course_by_code(&self, code: &str) -> Result<Option<Course>, Problem> {
        let code = code.trim().to_uppercase();
        Ok(lock(&self.courses).iter().find(|it| it.code == code).cloned())
    }

    async fn list_courses(
        &self,
        course_filter: &CourseFilter,
        page: PageState,
    ) -> Result<Vec<Course>, Problem> {
        let courses = lock(&self.courses);
        Ok(
            newest_first(&courses, |it| course_filter.matches(it), |it| it.created_at)
                .into_iter()
                .skip(page.skip() as usize)
                .take(page.page_length as usize)
                .collect(),
        )
    }

    async fn set_course_rating(
        &self,
        id: Uuid,
        summary: RatingSummary,
    ) -> Result<bool, Problem> {
        let mut courses = lock(&self.courses);
        match courses.iter_mut().find(|it| it.id == id) {
            Some(course) => {
                course.rating = summary.rating;
                course.review_count = summary.review_count;
                course.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_course(&self, id: Uuid) -> Result<Option<Course>, Problem> {
        Ok(take(&mut lock(&self.courses), |it| it.id == id))
    }
}

impl ReviewDbExt for MemoryStore {
    async fn insert_review(&self, review: &Review) -> Result<(), Problem> {
        lock(&self.reviews).push(review.clone());
        Ok(())
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>, Problem> {
        Ok(lock(&self.reviews).iter().find(|it| it.id == id).cloned())
    }

    async fn delete_review(&self, id: Uuid) -> Result<Option<Review>, Problem> {
        Ok(take(&mut lock(&self.reviews), |it| it.id == id))
    }

    async fn list_course_reviews(
        &self,
        course: Uuid,
        approved: bool,
    ) -> Result<Vec<Review>, Problem> {
        let reviews = lock(&self.reviews);
        Ok(newest_first(
            &reviews,
            |it| it.course == course && it.is_approved == approved,
            |it| it.created_at,
        ))
    }

    async fn list_pending_reviews(&self) -> Result<Vec<Review>, Problem> {
        let reviews = lock(&self.reviews);
        Ok(newest_first(&reviews, |it| !it.is_approved, |it| it.created_at))
    }

    async fn approved_ratings(&self, course: Uuid) -> Result<Vec<u8>, Problem> {
        Ok(lock(&self.reviews)
            .iter()
            .filter(|it| it.course == course && it.is_approved)
            .map(|it| it.rating)
            .collect())
    }

    async fn set_review_approval(
        &self,
        id: Uuid,
        approved: bool,
    ) -> Result<Option<Review>, Problem> {
        let mut reviews = lock(&self.reviews);
        Ok(reviews.iter_mut().find(|it| it.id == id).map(|review| {
            review.is_approved = approved;
            review.updated_at = Utc::now();
            review.clone()
        }))
    }
}

impl TipDbExt for MemoryStore {
    async fn insert_tip(&self, tip: &StudyTip) -> Result<(), Problem> {
        lock(&self.tips).push(tip.clone());
        Ok(())
    }

    async fn get_tip(&self, id: Uuid) -> Result<Option<StudyTip>, Problem> {
        Ok(lock(&self.tips).iter().find(|it| it.id == id).cloned())
    }

    async fn list_course_tips(&self, course: Uuid) -> Result<Vec<StudyTip>, Problem> {
        let tips = lock(&self.tips);
        Ok(newest_first(&tips, |it| it.course == course, |it| it.created_at))
    }

    async fn save_tip_likes(&self, id: Uuid, likes: &Likes) -> Result<bool, Problem> {
        let mut tips = lock(&self.tips);
        match tips.iter_mut().find(|it| it.id == id) {
            Some(tip) => {
                tip.likes = likes.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_tip(&self, id: Uuid) -> Result<Option<StudyTip>, Problem> {
        Ok(take(&mut lock(&self.tips), |it| it.id == id))
    }
}

impl ResourceDbExt for MemoryStore {
    async fn insert_resource(&self, resource: &Resource) -> Result<(), Problem> {
        lock(&self.resources).push(resource.clone());
        Ok(())
    }

    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>, Problem> {
        Ok(lock(&self.resources).iter().find(|it| it.id == id).cloned())
    }

    async fn list_course_resources(&self, course: Uuid) -> Result<Vec<Resource>, Problem> {
        let resources = lock(&self.resources);
        Ok(newest_first(&resources, |it| it.course == course, |it| it.created_at))
    }

    async fn delete_resource(&self, id: Uuid) -> Result<Option<Resource>, Problem> {
        Ok(take(&mut lock(&self.resources), |it| it.id == id))
    }
}

impl UserDbExt for MemoryStore {
    async fn create_user(
        &self,
        signup: UserSignupData,
        role: Role,
        salt: &Salt,
    ) -> Result<User, Problem> {
        create_user_in(self, signup, role, salt).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), Problem> {
        lock(&self.users).push(user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem> {
        Ok(lock(&self.users).iter().find(|it| it.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Problem> {
        let email = email.trim().to_lowercase();
        Ok(lock(&self.users).iter().find(|it| it.email == email).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::course::test_course;

    #[rocket::async_test]
    async fn course_listing_pages_newest_first() {
        let store = MemoryStore::default();
        for code in ["CS101", "CS102", "CS103"] {
            store.add_course(test_course(code));
        }

        let first = store
            .list_courses(&CourseFilter::default(), PageState::new(0, 2))
            .await
            .unwrap();
        let codes: Vec<_> = first.iter().map(|it| it.code.as_str()).collect();
        assert_eq!(codes, ["CS103", "CS102"]);

        let second = store
            .list_courses(&CourseFilter::default(), PageState::new(1, 2))
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].code, "CS101");
    }
}
