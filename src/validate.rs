use thiserror::Error;

use crate::models::{Category, PerCategory, Ratings};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingRating(String),

    #[error("{field} must be a number between 1 and 5 (got {value})")]
    RatingOutOfRange { field: String, value: f64 },

    #[error("{0} must not be blank")]
    Blank(&'static str),

    #[error("please provide at least one subject")]
    NoSubjects,

    #[error("experience must not be negative (got {0})")]
    NegativeExperience(i32),
}

/// Ratings as submitted, before presence and range checks.
#[derive(Debug, Clone, Default)]
pub struct RatingInput {
    pub overall: Option<f64>,
    pub categories: PerCategory<Option<f64>>,
}

pub fn validate_ratings(input: &RatingInput) -> Result<Ratings, ValidationError> {
    let overall = check_rating("overallRating", input.overall)?;

    let mut checked = PerCategory::<f64>::default();
    for category in Category::ALL {
        let value = check_rating(&rating_field(category), *input.categories.get(category))?;
        *checked.get_mut(category) = value;
    }

    Ok(Ratings {
        overall,
        categories: checked,
    })
}

fn rating_field(category: Category) -> String {
    format!("{}Rating", category.as_str())
}

fn check_rating(field: &str, value: Option<f64>) -> Result<f64, ValidationError> {
    let value = value.ok_or_else(|| ValidationError::MissingRating(field.to_string()))?;
    if !value.is_finite() || !(1.0..=5.0).contains(&value) {
        return Err(ValidationError::RatingOutOfRange {
            field: field.to_string(),
            value,
        });
    }
    Ok(value)
}

pub fn optional_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

pub fn required_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank(field));
    }
    Ok(trimmed.to_string())
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

pub fn parse_subjects(raw: &[String]) -> Result<Vec<String>, ValidationError> {
    let subjects: Vec<String> = raw.iter().flat_map(|entry| split_list(entry)).collect();
    if subjects.is_empty() {
        return Err(ValidationError::NoSubjects);
    }
    Ok(subjects)
}

pub fn check_experience(years: i32) -> Result<i32, ValidationError> {
    if years < 0 {
        return Err(ValidationError::NegativeExperience(years));
    }
    Ok(years)
}
