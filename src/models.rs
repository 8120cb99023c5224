use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The nine rated teaching categories, excluding the overall rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Knowledge,
    Communication,
    Explanation,
    Availability,
    Grading,
    Engagement,
    Preparation,
    Approachability,
    Feedback,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Knowledge,
        Category::Communication,
        Category::Explanation,
        Category::Availability,
        Category::Grading,
        Category::Engagement,
        Category::Preparation,
        Category::Approachability,
        Category::Feedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Knowledge => "knowledge",
            Category::Communication => "communication",
            Category::Explanation => "explanation",
            Category::Availability => "availability",
            Category::Grading => "grading",
            Category::Engagement => "engagement",
            Category::Preparation => "preparation",
            Category::Approachability => "approachability",
            Category::Feedback => "feedback",
        }
    }

    /// Human label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Knowledge => "Knowledge of the subject",
            Category::Communication => "Communication style",
            Category::Explanation => "Explaining complex concepts",
            Category::Availability => "Availability for help",
            Category::Grading => "Fairness in grading",
            Category::Engagement => "Class engagement",
            Category::Preparation => "Lecture preparation",
            Category::Approachability => "Approachability",
            Category::Feedback => "Providing feedback",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per category, stored in named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerCategory<T> {
    pub knowledge: T,
    pub communication: T,
    pub explanation: T,
    pub availability: T,
    pub grading: T,
    pub engagement: T,
    pub preparation: T,
    pub approachability: T,
    pub feedback: T,
}

impl<T> PerCategory<T> {
    pub fn get(&self, category: Category) -> &T {
        match category {
            Category::Knowledge => &self.knowledge,
            Category::Communication => &self.communication,
            Category::Explanation => &self.explanation,
            Category::Availability => &self.availability,
            Category::Grading => &self.grading,
            Category::Engagement => &self.engagement,
            Category::Preparation => &self.preparation,
            Category::Approachability => &self.approachability,
            Category::Feedback => &self.feedback,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut T {
        match category {
            Category::Knowledge => &mut self.knowledge,
            Category::Communication => &mut self.communication,
            Category::Explanation => &mut self.explanation,
            Category::Availability => &mut self.availability,
            Category::Grading => &mut self.grading,
            Category::Engagement => &mut self.engagement,
            Category::Preparation => &mut self.preparation,
            Category::Approachability => &mut self.approachability,
            Category::Feedback => &mut self.feedback,
        }
    }

    pub fn from_fn(mut f: impl FnMut(Category) -> T) -> Self {
        Self {
            knowledge: f(Category::Knowledge),
            communication: f(Category::Communication),
            explanation: f(Category::Explanation),
            availability: f(Category::Availability),
            grading: f(Category::Grading),
            engagement: f(Category::Engagement),
            preparation: f(Category::Preparation),
            approachability: f(Category::Approachability),
            feedback: f(Category::Feedback),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        Category::ALL.into_iter().map(move |category| (category, self.get(category)))
    }
}

/// Numeric ratings of a review, each on the 1-5 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    pub overall: f64,
    pub categories: PerCategory<f64>,
}

/// Free-text parts of a review: a general comment plus one text per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewTexts {
    pub comment: Option<String>,
    pub categories: PerCategory<Option<String>>,
}

impl ReviewTexts {
    /// The comment followed by the nine category texts.
    pub fn fields(&self) -> impl Iterator<Item = Option<&str>> {
        std::iter::once(self.comment.as_deref())
            .chain(self.categories.iter().map(|(_, text)| text.as_deref()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub student_id: Option<Uuid>,
    pub college_id: Uuid,
    pub ratings: Ratings,
    pub texts: ReviewTexts,
    pub created_at: DateTime<Utc>,
}

/// A review that passed validation and is ready to be stored.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub teacher_id: Uuid,
    pub student_id: Option<Uuid>,
    pub college_id: Uuid,
    pub ratings: Ratings,
    pub texts: ReviewTexts,
    /// Idempotency key for seeded and imported reviews.
    pub source_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub overall: f64,
    pub by_category: BTreeMap<Category, f64>,
    pub total_reviews: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct College {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub established_year: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub college_id: Uuid,
    pub college_name: String,
    pub subjects: Vec<String>,
    pub description: String,
    pub experience: i32,
    pub achievements: Vec<String>,
    pub average_rating: f64,
    pub category_averages: BTreeMap<Category, f64>,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
}

impl TeacherRecord {
    /// The cached aggregate as stored on the teacher row.
    pub fn cached_summary(&self) -> AggregateSummary {
        AggregateSummary {
            overall: self.average_rating,
            by_category: self.category_averages.clone(),
            total_reviews: self.total_reviews.max(0) as usize,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub name: String,
    pub email: String,
    pub college_name: String,
    pub subjects: Vec<String>,
    pub description: String,
    pub experience: i32,
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub college_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A student's review joined with the reviewed teacher's name.
#[derive(Debug, Clone)]
pub struct StudentReview {
    pub teacher_name: String,
    pub review: Review,
}
