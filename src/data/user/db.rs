use mongodb::Database;
use uuid::Uuid;

use super::{User, UserSignupData, USER_COLLECTION_NAME};
use crate::data::filter;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Salt;

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn bad_email(email: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad email.")
            .insert_str("email", email)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_name(name: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad name.")
            .insert_str("name", name)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_password(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad password.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "User doesn't exist.")
            .insert_str("id", id)
            .to_owned()
    }

    #[inline]
    pub fn bad_login() -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Bad email or password.")
    }
}

pub trait UserDbExt {
    /// Stores a new user, rejecting emails that are already registered.
    async fn create_user(
        &self,
        signup: UserSignupData,
        role: Role,
        salt: &Salt,
    ) -> Result<User, Problem>;

    async fn insert_user(&self, user: &User) -> Result<(), Problem>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Problem>;
}

impl UserDbExt for Database {
    async fn create_user(
        &self,
        signup: UserSignupData,
        role: Role,
        salt: &Salt,
    ) -> Result<User, Problem> {
        create_user_in(self, signup, role, salt).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), Problem> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .insert_one(user, None)
            .await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem> {
        self.collection(USER_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Problem> {
        self.collection(USER_COLLECTION_NAME)
            .find_one(filter::by_email(email.trim()), None)
            .await
            .map_err(Problem::from)
    }
}

/// Shared by every `UserDbExt` implementation. The unique email index still
/// guards against concurrent registrations racing past the lookup.
pub(crate) async fn create_user_in<S: UserDbExt>(
    db: &S,
    signup: UserSignupData,
    role: Role,
    salt: &Salt,
) -> Result<User, Problem> {
    signup.validate()?;

    if db.find_user_by_email(&signup.email).await?.is_some() {
        return Err(problem::bad_email(
            signup.email.trim(),
            "Email already registered.",
        ));
    }

    let user = signup.into_user(role, salt);
    db.insert_user(&user).await?;
    Ok(user)
}

/// Looks up the user by email and checks the password against the stored hash.
pub async fn authenticate<S: UserDbExt>(
    db: &S,
    email: &str,
    password: &str,
    salt: &Salt,
) -> Result<User, Problem> {
    let user = db
        .find_user_by_email(email)
        .await?
        .ok_or_else(problem::bad_login)?;

    if !user.pw_hash.matches(password, salt) {
        tracing::debug!("password mismatch for user {}", user.id);
        return Err(problem::bad_login());
    }

    Ok(user)
}
