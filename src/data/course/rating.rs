use uuid::Uuid;

use super::db::CourseDbExt;
use crate::data::review::db::ReviewDbExt;
use crate::resp::problem::Problem;

/// Aggregate a course carries for its approved reviews.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub rating: f64,
    pub review_count: u32,
}

impl RatingSummary {
    pub const EMPTY: RatingSummary = RatingSummary {
        rating: 0.0,
        review_count: 0,
    };

    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> RatingSummary {
        let (sum, count) = ratings
            .into_iter()
            .fold((0u64, 0u32), |(sum, count), rating| {
                (sum + u64::from(rating), count + 1)
            });

        if count == 0 {
            return RatingSummary::EMPTY;
        }

        RatingSummary {
            rating: sum as f64 / f64::from(count),
            review_count: count,
        }
    }
}

/// Recomputes the course aggregate from the full set of approved reviews.
///
/// Runs after every review insert, delete and approval change. A full scan
/// means earlier drift in the stored aggregate never survives a write.
pub async fn refresh_course_rating<S>(db: &S, course: Uuid) -> Result<RatingSummary, Problem>
where
    S: CourseDbExt + ReviewDbExt,
{
    let ratings = db.approved_ratings(course).await?;
    let summary = RatingSummary::from_ratings(ratings);

    if db.set_course_rating(course, summary).await? {
        tracing::debug!(
            "course {} rated {:.2} over {} reviews",
            course,
            summary.rating,
            summary.review_count
        );
    } else {
        tracing::warn!("unable to update rating of missing course {}", course);
    }

    Ok(summary)
}
