use chrono::{DateTime, Utc};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::resp::problem::{problems, Problem};
use crate::util::non_blank;

pub mod db;
pub mod rating;

use db::CourseDbExt;

pub static COURSE_COLLECTION_NAME: &str = "courses";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, FromFormField,
)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub college: String,
    pub professor: String,
    pub difficulty: Difficulty,

    /// Mean of approved review ratings, 0 without reviews.
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CourseCreateData {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub college: String,
    pub professor: String,
    pub difficulty: Difficulty,
}

impl CourseCreateData {
    pub fn validate(self) -> Result<Course, Problem> {
        let required = |field: &str, value: &str| {
            non_blank(value).ok_or_else(|| {
                problems::validation(field, format!("Please provide the course {}.", field))
            })
        };

        let now = Utc::now();
        Ok(Course {
            id: Uuid::new_v4(),
            name: required("name", &self.name)?,
            code: required("code", &self.code)?.to_uppercase(),
            description: self.description.trim().to_string(),
            college: required("college", &self.college)?,
            professor: required("professor", &self.professor)?,
            difficulty: self.difficulty,
            rating: 0.0,
            review_count: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: String,
    pub college: String,
    pub professor: String,
    pub difficulty: Difficulty,
    pub rating: f64,
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Course> for CourseResponse {
    fn from(value: Course) -> Self {
        Self {
            id: value.id,
            name: value.name,
            code: value.code,
            description: value.description,
            college: value.college,
            professor: value.professor,
            difficulty: value.difficulty,
            rating: value.rating,
            review_count: value.review_count,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Optional narrowing of the course catalogue.
#[derive(Debug, Clone, Default, FromForm, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CourseFilter {
    #[param(inline)]
    pub difficulty: Option<Difficulty>,
    /// Exact college name, case-insensitive.
    pub college: Option<String>,
    /// Matches name, code or professor, case-insensitive.
    pub q: Option<String>,
}

impl CourseFilter {
    fn college(&self) -> Option<String> {
        self.college.as_deref().and_then(non_blank)
    }

    fn query(&self) -> Option<String> {
        self.q.as_deref().and_then(non_blank)
    }

    pub fn matches(&self, course: &Course) -> bool {
        if let Some(difficulty) = self.difficulty {
            if course.difficulty != difficulty {
                return false;
            }
        }

        if let Some(college) = self.college() {
            if !course.college.eq_ignore_ascii_case(&college) {
                return false;
            }
        }

        if let Some(q) = self.query() {
            let q = q.to_lowercase();
            return [&course.name, &course.code, &course.professor]
                .iter()
                .any(|field| field.to_lowercase().contains(&q));
        }

        true
    }

    pub fn to_document(&self) -> bson::Document {
        use bson::{doc, Regex};

        let mut filter = doc! {};

        if let Some(difficulty) = self.difficulty {
            filter.insert("difficulty", format!("{:?}", difficulty));
        }

        if let Some(college) = self.college() {
            filter.insert(
                "college",
                Regex {
                    pattern: format!("^{}$", escape_regex(&college)),
                    options: "i".to_string(),
                },
            );
        }

        if let Some(q) = self.query() {
            let contains = Regex {
                pattern: escape_regex(&q),
                options: "i".to_string(),
            };
            filter.insert(
                "$or",
                vec![
                    doc! { "name": contains.clone() },
                    doc! { "code": contains.clone() },
                    doc! { "professor": contains },
                ],
            );
        }

        filter
    }
}

/// Adds a course to the catalogue. Course codes are unique.
pub async fn create_course<S: CourseDbExt>(db: &S, data: CourseCreateData) -> Result<Course, Problem> {
    let course = data.validate()?;

    if db.find_course_by_code(&course.code).await?.is_some() {
        return Err(problems::validation("code", "Course code already exists."));
    }

    db.insert_course(&course).await?;
    tracing::info!("created course {} ({})", course.code, course.id);
    Ok(course)
}

fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\.+*?()|[]{}^$#-".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
pub(crate) fn test_course(code: &str) -> Course {
    CourseCreateData {
        name: format!("Course {}", code),
        code: code.to_string(),
        description: String::new(),
        college: "Tech University".to_string(),
        professor: "Dr. Smith".to_string(),
        difficulty: Difficulty::Beginner,
    }
    .validate()
    .expect("test course must be valid")
}
