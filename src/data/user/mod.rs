use std::convert::TryInto;

use chrono::{DateTime, Utc};
use crypto::bcrypt::bcrypt;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Salt;
use crate::util::non_blank;

pub mod db;

pub use db::problem;

pub static USER_COLLECTION_NAME: &str = "users";

const BCRYPT_COST: u32 = 10;

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 1024;
pub const MAX_NAME_LENGTH: usize = 64;

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash([u8; 24]);

impl PasswordHash {
    pub fn new(password: impl AsRef<str>, salt: &Salt) -> PasswordHash {
        let mut pw_hash: [u8; 24] = [0; 24];

        let mut sha = Sha256::new();
        sha2::Digest::update(&mut sha, password.as_ref().as_bytes());

        bcrypt(BCRYPT_COST, salt, sha.finalize().as_slice(), &mut pw_hash);

        PasswordHash(pw_hash)
    }

    pub fn matches(&self, password: impl AsRef<str>, salt: &Salt) -> bool {
        *self == PasswordHash::new(password, salt)
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PasswordHash")
    }
}

impl Serialize for PasswordHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        bson::Binary {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: self.0.to_vec(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PasswordHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let binary = bson::Binary::deserialize(deserializer)?;
        let bytes: [u8; 24] = binary
            .bytes
            .try_into()
            .map_err(|_| D::Error::custom("password hash must be 24 bytes"))?;
        Ok(PasswordHash(bytes))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub pw_hash: PasswordHash,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct UserSignupData {
    pub name: String,
    #[schema(format = "email")]
    pub email: String,
    #[schema(format = "password")]
    pub password: String,
    #[serde(default)]
    pub college: Option<String>,
}

impl std::fmt::Debug for UserSignupData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserSignupData:{}", self.email)
    }
}

impl UserSignupData {
    pub fn validate(&self) -> Result<(), Problem> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(problem::bad_name(name, "Please provide your name."));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(problem::bad_name(
                name,
                format!("Name can't be longer than {} bytes.", MAX_NAME_LENGTH),
            ));
        }

        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => {
                return Err(problem::bad_email(
                    email,
                    "Not a valid e-mail address.",
                ))
            }
        }

        if self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(problem::bad_password(format!(
                "Password must be at least {} characters (bytes) long.",
                MIN_PASSWORD_LENGTH
            )));
        }
        if self.password.len() > MAX_PASSWORD_LENGTH {
            return Err(problem::bad_password(
                "Passwords longer than 1024 characters aren't supported.",
            ));
        }

        Ok(())
    }

    pub fn into_user(self, role: Role, salt: &Salt) -> User {
        let id = Uuid::new_v4();
        tracing::info!("Creating a new user with UUID: {}", id);

        User {
            id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            pw_hash: PasswordHash::new(&self.password, salt),
            role,
            college: self.college.as_deref().and_then(non_blank),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct UserLoginData {
    #[schema(format = "email")]
    pub email: String,
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for UserLoginData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserLoginData:{}", self.email)
    }
}

impl UserLoginData {
    pub fn validate(&self) -> Result<(), Problem> {
        if !self.email.contains('@')
            || self.password.len() < MIN_PASSWORD_LENGTH
            || self.password.len() > MAX_PASSWORD_LENGTH
        {
            return Err(problem::bad_login());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            role: value.role,
            college: value.college,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}
