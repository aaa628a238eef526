pub mod course;
pub mod resource;
pub mod review;
pub mod tip;
pub mod user;

#[cfg(test)]
pub mod memory;

use bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};

fn index(keys: bson::Document, unique: bool) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(unique).build())
        .build()
}

/// Creates the indexes listings and uniqueness checks rely on. Existing
/// indexes with the same keys are left untouched.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(course::COURSE_COLLECTION_NAME)
        .create_indexes(
            [
                index(doc! { "code": 1 }, true),
                index(doc! { "createdAt": -1 }, false),
            ],
            None,
        )
        .await?;

    db.collection::<bson::Document>(user::USER_COLLECTION_NAME)
        .create_index(index(doc! { "email": 1 }, true), None)
        .await?;

    for collection in [
        review::REVIEW_COLLECTION_NAME,
        tip::TIP_COLLECTION_NAME,
        resource::RESOURCE_COLLECTION_NAME,
    ] {
        db.collection::<bson::Document>(collection)
            .create_index(index(doc! { "course": 1, "createdAt": -1 }, false), None)
            .await?;
    }

    tracing::debug!("database indexes are in place");
    Ok(())
}

pub mod filter {
    use bson::spec::BinarySubtype;
    use bson::{doc, Binary, Bson, Document};
    use uuid::Uuid;

    /// Same encoding `bson::serde_helpers::uuid_1_as_binary` writes.
    #[inline]
    pub fn uuid(id: Uuid) -> Bson {
        Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes: id.as_bytes().to_vec(),
        })
    }

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": uuid(id) }
    }

    #[inline]
    pub fn by_course(course: Uuid) -> Document {
        doc! { "course": uuid(course) }
    }

    #[inline]
    pub fn by_email(email: impl AsRef<str>) -> Document {
        doc! { "email": email.as_ref().to_lowercase() }
    }

    #[inline]
    pub fn newest_first() -> Document {
        doc! { "createdAt": -1 }
    }
}
