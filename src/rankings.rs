use std::cmp::Ordering;

use clap::ValueEnum;

use crate::models::TeacherRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortKey {
    #[default]
    Rating,
    Experience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

#[derive(Debug, Clone, Default)]
pub struct RankingQuery {
    /// Exact college name to restrict to.
    pub college: Option<String>,
    /// Case-insensitive match against teacher name or any subject.
    pub search: Option<String>,
    pub sort_by: SortKey,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

pub fn rank<'a>(teachers: &'a [TeacherRecord], query: &RankingQuery) -> Vec<&'a TeacherRecord> {
    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut ranked: Vec<&TeacherRecord> = teachers
        .iter()
        .filter(|t| query.college.as_deref().map_or(true, |c| t.college_name == c))
        .filter(|t| needle.as_deref().map_or(true, |n| matches_search(t, n)))
        .collect();

    // stable, so equal keys keep the incoming order
    ranked.sort_by(|a, b| {
        let ordering = match query.sort_by {
            SortKey::Rating => a
                .average_rating
                .partial_cmp(&b.average_rating)
                .unwrap_or(Ordering::Equal),
            SortKey::Experience => a.experience.cmp(&b.experience),
        };
        match query.order {
            SortOrder::Desc => ordering.reverse(),
            SortOrder::Asc => ordering,
        }
    });

    if let Some(limit) = query.limit {
        ranked.truncate(limit);
    }
    ranked
}

fn matches_search(teacher: &TeacherRecord, needle: &str) -> bool {
    teacher.name.to_lowercase().contains(needle)
        || teacher
            .subjects
            .iter()
            .any(|subject| subject.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn teacher(
        name: &str,
        college: &str,
        subjects: &[&str],
        rating: f64,
        experience: i32,
    ) -> TeacherRecord {
        TeacherRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.edu", name.to_lowercase()),
            college_id: Uuid::new_v4(),
            college_name: college.to_string(),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            description: String::new(),
            experience,
            achievements: Vec::new(),
            average_rating: rating,
            category_averages: BTreeMap::new(),
            total_reviews: 1,
            created_at: Utc::now(),
        }
    }

    fn sample() -> Vec<TeacherRecord> {
        vec![
            teacher("Chen", "Northfield", &["Calculus", "Linear Algebra"], 4.6, 12),
            teacher("Okafor", "Northfield", &["Organic Chemistry"], 2.4, 20),
            teacher("Marquez", "Riverside", &["Operating Systems"], 4.9, 6),
            teacher("Brandt", "Riverside", &["Algebra"], 0.0, 1),
        ]
    }

    fn names(ranked: &[&TeacherRecord]) -> Vec<String> {
        ranked.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn default_ranks_by_rating_descending() {
        let teachers = sample();
        let ranked = rank(&teachers, &RankingQuery::default());
        assert_eq!(names(&ranked), vec!["Marquez", "Chen", "Okafor", "Brandt"]);
    }

    #[test]
    fn sorts_by_experience_ascending() {
        let teachers = sample();
        let query = RankingQuery {
            sort_by: SortKey::Experience,
            order: SortOrder::Asc,
            ..RankingQuery::default()
        };
        assert_eq!(
            names(&rank(&teachers, &query)),
            vec!["Brandt", "Marquez", "Chen", "Okafor"]
        );
    }

    #[test]
    fn filters_by_college_and_search() {
        let teachers = sample();
        let query = RankingQuery {
            college: Some("Northfield".into()),
            ..RankingQuery::default()
        };
        assert_eq!(names(&rank(&teachers, &query)), vec!["Chen", "Okafor"]);

        let query = RankingQuery {
            search: Some("ALGEBRA".into()),
            ..RankingQuery::default()
        };
        assert_eq!(names(&rank(&teachers, &query)), vec!["Chen", "Brandt"]);

        let query = RankingQuery {
            search: Some("marq".into()),
            ..RankingQuery::default()
        };
        assert_eq!(names(&rank(&teachers, &query)), vec!["Marquez"]);
    }

    #[test]
    fn blank_search_matches_everyone() {
        let teachers = sample();
        let query = RankingQuery {
            search: Some("  ".into()),
            ..RankingQuery::default()
        };
        assert_eq!(rank(&teachers, &query).len(), 4);
    }

    #[test]
    fn limit_truncates_after_sorting() {
        let teachers = sample();
        let query = RankingQuery {
            limit: Some(2),
            ..RankingQuery::default()
        };
        assert_eq!(names(&rank(&teachers, &query)), vec!["Marquez", "Chen"]);

        let query = RankingQuery {
            limit: Some(0),
            ..RankingQuery::default()
        };
        assert!(rank(&teachers, &query).is_empty());
    }
}
