use crate::models::ReviewTexts;

pub const POSITIVE_WORDS: &[&str] = &[
    "good",
    "great",
    "excellent",
    "amazing",
    "love",
    "helpful",
    "clear",
    "friendly",
    "best",
    "recommended",
    "positive",
    "awesome",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "poor",
    "terrible",
    "hate",
    "confusing",
    "rude",
    "worst",
    "late",
    "unhelpful",
    "disappointing",
    "negative",
];

/// Raw lexicon sums are clamped to `[-CLAMP_BOUND, CLAMP_BOUND]`.
pub const CLAMP_BOUND: f64 = 3.0;
pub const DIVISOR: f64 = 3.0;
/// Multiplier applied to a review's mean sentiment before it is added to the score.
pub const BONUS_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Lexicon {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().map(|w| w.to_string()).collect(),
            negative: NEGATIVE_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl Lexicon {
    pub fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        Self {
            positive: normalize_words(positive),
            negative: normalize_words(negative),
        }
    }

    /// Net count of distinct positive minus distinct negative words found as substrings.
    pub fn raw_score(&self, text: &str) -> i32 {
        let lowered = text.to_lowercase();
        let hits = |words: &[String]| {
            words
                .iter()
                .filter(|word| lowered.contains(word.as_str()))
                .count() as i32
        };
        hits(&self.positive) - hits(&self.negative)
    }
}

fn normalize_words<I>(words: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for word in words {
        let word = word.as_ref().trim().to_lowercase();
        if !word.is_empty() && !out.contains(&word) {
            out.push(word);
        }
    }
    out
}

/// Scoring policy for the text signal of a review.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentPolicy {
    pub lexicon: Lexicon,
    pub clamp_bound: f64,
    pub divisor: f64,
    pub bonus_weight: f64,
}

impl Default for SentimentPolicy {
    fn default() -> Self {
        Self {
            lexicon: Lexicon::default(),
            clamp_bound: CLAMP_BOUND,
            divisor: DIVISOR,
            bonus_weight: BONUS_WEIGHT,
        }
    }
}

impl SentimentPolicy {
    pub fn field_score(&self, text: Option<&str>) -> f64 {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return 0.0;
        };
        if self.divisor == 0.0 {
            return 0.0;
        }

        let raw = f64::from(self.lexicon.raw_score(text));
        raw.clamp(-self.clamp_bound, self.clamp_bound) / self.divisor
    }

    /// Mean field sentiment over the comment and the nine category texts.
    pub fn average(&self, texts: &ReviewTexts) -> f64 {
        let (total, count) = texts
            .fields()
            .fold((0.0, 0usize), |(total, count), field| {
                (total + self.field_score(field), count + 1)
            });
        total / count as f64
    }

    pub fn bonus(&self, texts: &ReviewTexts) -> f64 {
        self.average(texts) * self.bonus_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PerCategory;

    fn comment_only(comment: &str) -> ReviewTexts {
        ReviewTexts {
            comment: Some(comment.to_string()),
            categories: PerCategory::default(),
        }
    }

    #[test]
    fn empty_and_missing_text_is_neutral() {
        let policy = SentimentPolicy::default();
        assert_eq!(policy.field_score(None), 0.0);
        assert_eq!(policy.field_score(Some("")), 0.0);
        assert_eq!(policy.field_score(Some("   ")), 0.0);
        assert_eq!(policy.average(&ReviewTexts::default()), 0.0);
    }

    #[test]
    fn counts_distinct_words_once() {
        let lexicon = Lexicon::default();
        assert_eq!(lexicon.raw_score("good good GOOD"), 1);
        assert_eq!(lexicon.raw_score("Great and CLEAR lectures"), 2);
        assert_eq!(lexicon.raw_score("terrible confusing"), -2);
    }

    #[test]
    fn matches_substrings() {
        let lexicon = Lexicon::default();
        // "unhelpful" also contains "helpful"
        assert_eq!(lexicon.raw_score("unhelpful"), 0);
        assert_eq!(lexicon.raw_score("goodness"), 1);
    }

    #[test]
    fn field_score_is_clamped() {
        let policy = SentimentPolicy::default();
        let glowing = "good great excellent amazing awesome";
        assert!((policy.field_score(Some(glowing)) - 1.0).abs() < 1e-9);
        let awful = "bad poor terrible rude worst";
        assert!((policy.field_score(Some(awful)) + 1.0).abs() < 1e-9);
        let mild = "terrible confusing";
        assert!((policy.field_score(Some(mild)) + 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn average_spans_all_ten_fields() {
        let policy = SentimentPolicy::default();
        let texts = comment_only("terrible confusing");
        let expected = (-2.0 / 3.0) / 10.0;
        assert!((policy.average(&texts) - expected).abs() < 1e-9);
        assert!((policy.bonus(&texts) - expected * 0.25).abs() < 1e-9);
    }

    #[test]
    fn custom_lexicon_changes_scoring() {
        let policy = SentimentPolicy {
            lexicon: Lexicon::new(["Patient", " ", "patient"], ["boring"]),
            ..SentimentPolicy::default()
        };
        assert_eq!(policy.lexicon.positive, vec!["patient".to_string()]);
        assert_eq!(policy.lexicon.raw_score("good but boring"), -1);
        assert!((policy.field_score(Some("very patient")) - 1.0 / 3.0).abs() < 1e-9);
    }
}
