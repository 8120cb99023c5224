use std::collections::BTreeMap;

use crate::models::{AggregateSummary, Category, Review};
use crate::sentiment::SentimentPolicy;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 5.0;

/// Computes the teacher-level summary from the full set of that teacher's reviews.
pub fn compute_aggregate(reviews: &[Review], policy: &SentimentPolicy) -> AggregateSummary {
    if reviews.is_empty() {
        return AggregateSummary::default();
    }

    let total = reviews.len() as f64;
    let mut score_sum = 0.0;
    let mut category_sums: BTreeMap<Category, f64> = BTreeMap::new();

    for review in reviews {
        score_sum += review_score(review, policy);
        for (category, value) in review.ratings.categories.iter() {
            *category_sums.entry(category).or_insert(0.0) += finite_or_zero(*value);
        }
    }

    let by_category = category_sums
        .into_iter()
        .map(|(category, sum)| (category, round2(sum / total)))
        .collect();

    AggregateSummary {
        overall: round2(score_sum / total),
        by_category,
        total_reviews: reviews.len(),
    }
}

/// Mean of the nine category ratings of one review.
pub fn numeric_average(review: &Review) -> f64 {
    let sum: f64 = review
        .ratings
        .categories
        .iter()
        .map(|(_, value)| finite_or_zero(*value))
        .sum();
    sum / Category::ALL.len() as f64
}

/// Sentiment-adjusted score of a single review, within `[MIN_SCORE, MAX_SCORE]`.
pub fn review_score(review: &Review, policy: &SentimentPolicy) -> f64 {
    let numeric_avg = numeric_average(review);
    let stated = finite_or_zero(review.ratings.overall);
    let overall_rating = if stated != 0.0 { stated } else { numeric_avg };
    let bonus = policy.bonus(&review.texts);

    ((numeric_avg + overall_rating) / 2.0 + bonus).clamp(MIN_SCORE, MAX_SCORE)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PerCategory, Ratings, ReviewTexts};
    use crate::sentiment::Lexicon;
    use chrono::Utc;
    use uuid::Uuid;

    fn uniform_review(value: f64, overall: f64) -> Review {
        Review {
            id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            student_id: None,
            college_id: Uuid::new_v4(),
            ratings: Ratings {
                overall,
                categories: PerCategory::from_fn(|_| value),
            },
            texts: ReviewTexts::default(),
            created_at: Utc::now(),
        }
    }

    fn with_comment(mut review: Review, comment: &str) -> Review {
        review.texts.comment = Some(comment.to_string());
        review
    }

    #[test]
    fn empty_collection_yields_zero() {
        let summary = compute_aggregate(&[], &SentimentPolicy::default());
        assert_eq!(summary.overall, 0.0);
        assert!(summary.by_category.is_empty());
        assert_eq!(summary.total_reviews, 0);
    }

    #[test]
    fn perfect_review_without_text() {
        let summary = compute_aggregate(&[uniform_review(5.0, 5.0)], &SentimentPolicy::default());
        assert_eq!(summary.overall, 5.0);
        assert_eq!(summary.total_reviews, 1);
        assert_eq!(summary.by_category.len(), 9);
        assert!(summary.by_category.values().all(|v| *v == 5.0));
    }

    #[test]
    fn negative_comment_nudges_overall_down() {
        let review = with_comment(uniform_review(5.0, 5.0), "terrible confusing");
        let summary = compute_aggregate(&[review], &SentimentPolicy::default());
        assert_eq!(summary.overall, 4.98);
        assert!(summary.by_category.values().all(|v| *v == 5.0));
    }

    #[test]
    fn mixed_reviews_average_out() {
        let reviews = vec![uniform_review(5.0, 5.0), uniform_review(1.0, 1.0)];
        let summary = compute_aggregate(&reviews, &SentimentPolicy::default());
        assert_eq!(summary.overall, 3.0);
        assert_eq!(summary.by_category[&Category::Knowledge], 3.0);
        assert_eq!(summary.total_reviews, 2);
    }

    #[test]
    fn missing_overall_falls_back_to_category_average() {
        let mut review = uniform_review(3.0, 0.0);
        review.ratings.categories.knowledge = 2.0;
        review.ratings.categories.feedback = 4.0;
        let policy = SentimentPolicy::default();
        assert!((numeric_average(&review) - 3.0).abs() < 1e-9);
        assert!((review_score(&review, &policy) - 3.0).abs() < 1e-9);

        let praised = with_comment(review, "great");
        let expected = 3.0 + (1.0 / 3.0) / 10.0 * 0.25;
        assert!((review_score(&praised, &policy) - expected).abs() < 1e-9);
    }

    #[test]
    fn stated_overall_is_blended_with_categories() {
        let review = uniform_review(3.0, 5.0);
        assert!((review_score(&review, &SentimentPolicy::default()) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn sentiment_moves_score_in_the_right_direction() {
        let policy = SentimentPolicy::default();
        let neutral = uniform_review(3.0, 3.0);
        let positive = with_comment(neutral.clone(), "great, clear and helpful");
        let negative = with_comment(neutral.clone(), "rude and always late");

        let base = review_score(&neutral, &policy);
        assert!(review_score(&positive, &policy) >= base);
        assert!(review_score(&negative, &policy) <= base);
    }

    #[test]
    fn score_is_clamped_to_rating_scale() {
        let policy = SentimentPolicy::default();
        let mut glowing = uniform_review(5.0, 5.0);
        glowing.texts.comment = Some("good great excellent amazing".into());
        glowing.texts.categories = PerCategory::from_fn(|_| Some("awesome best love".into()));
        assert_eq!(review_score(&glowing, &policy), MAX_SCORE);

        let mut dismal = uniform_review(1.0, 1.0);
        dismal.texts.comment = Some("bad poor terrible worst".into());
        assert_eq!(review_score(&dismal, &policy), MIN_SCORE);
    }

    #[test]
    fn category_averages_ignore_text() {
        let policy = SentimentPolicy::default();
        let plain = vec![uniform_review(4.0, 4.0), uniform_review(2.0, 2.0)];
        let noisy = vec![
            with_comment(uniform_review(4.0, 4.0), "worst teacher, rude"),
            with_comment(uniform_review(2.0, 2.0), "amazing, best ever"),
        ];
        assert_eq!(
            compute_aggregate(&plain, &policy).by_category,
            compute_aggregate(&noisy, &policy).by_category
        );
    }

    #[test]
    fn non_finite_ratings_count_as_zero() {
        let mut review = uniform_review(4.0, f64::NAN);
        review.ratings.categories.grading = f64::NAN;
        let summary = compute_aggregate(&[review], &SentimentPolicy::default());
        assert_eq!(summary.by_category[&Category::Grading], 0.0);
        // (8 * 4) / 9 with the overall falling back to the same value
        assert_eq!(summary.overall, 3.56);
    }

    #[test]
    fn results_stay_in_bounds_and_are_repeatable() {
        let policy = SentimentPolicy::default();
        let reviews: Vec<Review> = (1..=5)
            .flat_map(|value| {
                let value = value as f64;
                [
                    with_comment(uniform_review(value, value), "excellent"),
                    with_comment(uniform_review(value, 6.0 - value), "confusing and late"),
                ]
            })
            .collect();

        let first = compute_aggregate(&reviews, &policy);
        let second = compute_aggregate(&reviews, &policy);
        assert_eq!(first, second);
        assert!((MIN_SCORE..=MAX_SCORE).contains(&first.overall));
        assert!(first.by_category.values().all(|v| (0.0..=5.0).contains(v)));
    }

    #[test]
    fn policy_weight_controls_bonus() {
        let review = with_comment(uniform_review(3.0, 3.0), "great");
        let muted = SentimentPolicy {
            bonus_weight: 0.0,
            ..SentimentPolicy::default()
        };
        assert_eq!(review_score(&review, &muted), 3.0);

        let strict = SentimentPolicy {
            lexicon: Lexicon::new(Vec::<String>::new(), ["great"]),
            ..SentimentPolicy::default()
        };
        assert!(review_score(&review, &strict) < 3.0);
    }

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round2(4.983_333), 4.98);
        assert_eq!(round2(3.556), 3.56);
        assert_eq!(round2(2.0), 2.0);
    }

    #[test]
    fn rounding_scales_before_rounding_half_away_from_zero() {
        // 2.675 is stored just below the tie; scaling by 100 lands on 267.5
        assert_eq!(round2(107.0 / 40.0), 2.68);
        assert_eq!(round2(0.125), 0.13);
    }
}
