use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::{self, Owned};
use crate::data::course::db::CourseDbExt;
use crate::resp::jwt::SessionToken;
use crate::resp::problem::{problems, Problem};
use crate::util::non_blank;

pub mod db;

use db::TipDbExt;

pub static TIP_COLLECTION_NAME: &str = "tips";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub user: Uuid,
}

/// Users who liked a tip. Holds each user at most once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Likes(Vec<Like>);

impl Likes {
    pub fn contains(&self, user: Uuid) -> bool {
        self.0.iter().any(|like| like.user == user)
    }

    /// Likes for a user that hasn't liked yet, unlikes otherwise.
    /// Returns the number of likes afterwards.
    pub fn toggle(&mut self, user: Uuid) -> usize {
        if self.contains(user) {
            self.0.retain(|like| like.user != user);
        } else {
            self.0.push(Like { user });
        }
        self.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn users(&self) -> BTreeSet<Uuid> {
        self.0.iter().map(|like| like.user).collect()
    }
}

impl PartialEq for Likes {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.users() == other.users()
    }
}

impl FromIterator<Uuid> for Likes {
    fn from_iter<T: IntoIterator<Item = Uuid>>(iter: T) -> Self {
        let mut likes = Likes::default();
        for user in iter {
            if !likes.contains(user) {
                likes.0.push(Like { user });
            }
        }
        likes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyTip {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub user: Uuid,
    pub user_name: String,
    pub text: String,
    #[serde(default)]
    pub likes: Likes,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Owned for StudyTip {
    fn owner(&self) -> Uuid {
        self.user
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TipCreateData {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TipResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub course: Uuid,
    pub user: Uuid,
    pub user_name: String,
    pub text: String,
    /// Users who liked the tip.
    pub likes: Vec<Uuid>,
    pub like_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<StudyTip> for TipResponse {
    fn from(value: StudyTip) -> Self {
        Self {
            id: value.id,
            course: value.course,
            user: value.user,
            user_name: value.user_name,
            like_count: value.likes.len(),
            likes: value.likes.users().into_iter().collect(),
            text: value.text,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LikeCountResponse {
    pub likes: usize,
}

pub async fn add_tip<S>(
    db: &S,
    course: Uuid,
    author: &SessionToken,
    data: &TipCreateData,
) -> Result<StudyTip, Problem>
where
    S: CourseDbExt + TipDbExt,
{
    let text = data
        .text
        .as_deref()
        .and_then(non_blank)
        .ok_or_else(|| problems::validation("text", "Please provide the tip text."))?;

    if db.get_course(course).await?.is_none() {
        return Err(problems::not_found("Course", course));
    }

    let tip = StudyTip {
        id: Uuid::new_v4(),
        course,
        user: author.user,
        user_name: author.name.clone(),
        text,
        likes: Likes::default(),
        created_at: Utc::now(),
    };

    db.insert_tip(&tip).await?;
    tracing::info!("user {} shared tip {} for course {}", author.user, tip.id, course);
    Ok(tip)
}

/// Flips the caller's like on a tip, returning the resulting like count.
pub async fn toggle_like<S: TipDbExt>(
    db: &S,
    id: Uuid,
    caller: &SessionToken,
) -> Result<usize, Problem> {
    let mut tip = db
        .get_tip(id)
        .await?
        .ok_or_else(|| problems::not_found("Tip", id))?;

    let count = tip.likes.toggle(caller.user);

    if !db.save_tip_likes(id, &tip.likes).await? {
        return Err(problems::not_found("Tip", id));
    }

    tracing::debug!("tip {} now has {} likes", id, count);
    Ok(count)
}

pub async fn delete_tip<S: TipDbExt>(
    db: &S,
    id: Uuid,
    caller: &SessionToken,
) -> Result<StudyTip, Problem> {
    let tip = db
        .get_tip(id)
        .await?
        .ok_or_else(|| problems::not_found("Tip", id))?;

    access::ensure_can_modify(caller, &tip, "Tip")?;

    let removed = db
        .delete_tip(id)
        .await?
        .ok_or_else(|| problems::not_found("Tip", id))?;
    tracing::info!("user {} deleted tip {}", caller.user, id);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::course::test_course;
    use crate::data::memory::MemoryStore;
    use crate::role::Role;
    use rand::seq::SliceRandom;
    use rand::Rng;

    fn student(name: &str) -> SessionToken {
        SessionToken::new(Uuid::new_v4(), name, Role::Student)
    }

    fn tip_data(text: &str) -> TipCreateData {
        TipCreateData {
            text: Some(text.to_string()),
        }
    }

    #[test]
    fn toggle_twice_restores_likes() {
        let mut rng = rand::thread_rng();
        let population: Vec<Uuid> = (0..12).map(|_| Uuid::new_v4()).collect();

        for _ in 0..100 {
            let amount = rng.gen_range(0..population.len());
            let original: Likes = population
                .choose_multiple(&mut rng, amount)
                .copied()
                .collect();
            let user = *population.choose(&mut rng).expect("non-empty population");

            let mut likes = original.clone();
            likes.toggle(user);
            let count = likes.toggle(user);

            assert_eq!(likes, original);
            assert_eq!(count, original.len());
        }
    }

    #[test]
    fn users_like_at_most_once() {
        let user = Uuid::new_v4();
        let likes: Likes = vec![user, user, user].into_iter().collect();
        assert_eq!(likes.len(), 1);

        let mut likes = Likes::default();
        assert_eq!(likes.toggle(user), 1);
        assert!(likes.contains(user));
        assert_eq!(likes.toggle(user), 0);
        assert!(likes.is_empty());
    }

    #[rocket::async_test]
    async fn like_toggle_scenario() {
        let store = MemoryStore::default();
        let course = store.add_course(test_course("CS101"));
        let author = student("Ada");
        let a = student("Alan");
        let b = student("Barbara");

        let tip = add_tip(&store, course, &author, &tip_data("Do the past exams"))
            .await
            .expect("tip should be stored");
        assert!(tip.likes.is_empty());

        assert_eq!(toggle_like(&store, tip.id, &a).await.unwrap(), 1);
        assert_eq!(toggle_like(&store, tip.id, &a).await.unwrap(), 0);
        assert_eq!(toggle_like(&store, tip.id, &b).await.unwrap(), 1);

        let stored = store.get_tip(tip.id).await.unwrap().expect("tip exists");
        assert!(stored.likes.contains(b.user));
        assert!(!stored.likes.contains(a.user));
    }

    #[rocket::async_test]
    async fn liking_missing_tip_is_not_found() {
        let store = MemoryStore::default();
        let problem = toggle_like(&store, Uuid::new_v4(), &student("Ada"))
            .await
            .expect_err("tip doesn't exist");
        assert_eq!(problem.status.code, 404);
    }

    #[rocket::async_test]
    async fn blank_tips_are_rejected() {
        let store = MemoryStore::default();
        let course = store.add_course(test_course("CS101"));

        let problem = add_tip(&store, course, &student("Ada"), &tip_data(" \n "))
            .await
            .expect_err("blank text");
        assert_eq!(problem.status.code, 400);
    }

    #[rocket::async_test]
    async fn only_owner_or_admin_deletes_tip() {
        let store = MemoryStore::default();
        let course = store.add_course(test_course("CS101"));
        let author = student("Ada");

        let tip = add_tip(&store, course, &author, &tip_data("Sleep before exams"))
            .await
            .expect("tip should be stored");

        let problem = delete_tip(&store, tip.id, &student("Eve"))
            .await
            .expect_err("stranger must be denied");
        assert_eq!(problem.status.code, 403);
        assert!(store.get_tip(tip.id).await.unwrap().is_some());

        delete_tip(&store, tip.id, &author)
            .await
            .expect("owner may delete");
        assert!(store.get_tip(tip.id).await.unwrap().is_none());
    }
}
