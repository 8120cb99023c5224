use std::fmt::Write;

use crate::aggregate;
use crate::models::{AggregateSummary, Category, Review, TeacherRecord};
use crate::sentiment::SentimentPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToneSummary {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

/// Buckets reviews by the sign of their mean text sentiment.
pub fn summarize_tone(reviews: &[Review], policy: &SentimentPolicy) -> ToneSummary {
    let mut tone = ToneSummary::default();
    for review in reviews {
        let sentiment = policy.average(&review.texts);
        if sentiment > 0.0 {
            tone.positive += 1;
        } else if sentiment < 0.0 {
            tone.negative += 1;
        } else {
            tone.neutral += 1;
        }
    }
    tone
}

pub fn build_report(
    teacher: &TeacherRecord,
    summary: &AggregateSummary,
    reviews: &[Review],
    policy: &SentimentPolicy,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Teacher Dashboard: {}", teacher.name);
    let _ = writeln!(
        output,
        "{} · {} years of experience",
        teacher.college_name, teacher.experience
    );
    if !teacher.subjects.is_empty() {
        let _ = writeln!(output, "Subjects: {}", teacher.subjects.join(", "));
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall Rating");

    if summary.total_reviews == 0 {
        let _ = writeln!(output, "No reviews yet.");
        return output;
    }

    let _ = writeln!(
        output,
        "{:.2} / 5 across {} reviews",
        summary.overall, summary.total_reviews
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Category Breakdown");
    for category in Category::ALL {
        if let Some(average) = summary.by_category.get(&category) {
            let _ = writeln!(output, "- {}: {:.2}", category.label(), average);
        }
    }

    let tone = summarize_tone(reviews, policy);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Review Tone");
    let _ = writeln!(
        output,
        "- positive: {}\n- neutral: {}\n- negative: {}",
        tone.positive, tone.neutral, tone.negative
    );

    let mut recent: Vec<&Review> = reviews
        .iter()
        .filter(|r| r.texts.comment.is_some())
        .collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Comments");
    if recent.is_empty() {
        let _ = writeln!(output, "No written comments yet.");
    } else {
        for review in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} (score {:.2}): {}",
                review.created_at.format("%Y-%m-%d"),
                aggregate::review_score(review, policy),
                review.texts.comment.as_deref().unwrap_or_default()
            );
        }
    }

    output
}
