use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate;
use crate::models::{
    AggregateSummary, Category, College, NewReview, NewTeacher, PerCategory, Review, ReviewTexts,
    Ratings, Student, StudentReview, TeacherRecord,
};
use crate::sentiment::SentimentPolicy;
use crate::validate::{self, RatingInput, ValidationError};

const REVIEW_COLUMNS: &str = "r.id, r.teacher_id, r.student_id, r.college_id, \
     r.overall_rating, r.knowledge_rating, r.communication_rating, r.explanation_rating, \
     r.availability_rating, r.grading_rating, r.engagement_rating, r.preparation_rating, \
     r.approachability_rating, r.feedback_rating, \
     r.knowledge_review, r.communication_review, r.explanation_review, r.availability_review, \
     r.grading_review, r.engagement_review, r.preparation_review, r.approachability_review, \
     r.feedback_review, r.comment, r.created_at";

const TEACHER_COLUMNS: &str = "t.id, t.name, t.email, t.college_id, c.name AS college_name, \
     t.subjects, t.description, t.experience, t.achievements, t.average_rating, \
     t.category_averages, t.total_reviews, t.created_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn create_college(
    pool: &PgPool,
    name: &str,
    address: &str,
    established_year: i32,
) -> anyhow::Result<College> {
    if find_college_by_name(pool, name).await?.is_some() {
        anyhow::bail!("college {name:?} already exists");
    }

    let row = sqlx::query(
        r#"
        INSERT INTO judgetutor.colleges (id, name, address, established_year)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, address, established_year, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(address)
    .bind(established_year)
    .fetch_one(pool)
    .await
    .context("failed to insert college")?;

    Ok(college_from_row(&row)?)
}

pub async fn list_colleges(pool: &PgPool) -> anyhow::Result<Vec<College>> {
    let rows = sqlx::query(
        "SELECT id, name, address, established_year, created_at \
         FROM judgetutor.colleges ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| college_from_row(row).map_err(Into::into))
        .collect()
}

pub async fn find_college_by_name(pool: &PgPool, name: &str) -> anyhow::Result<Option<College>> {
    let row = sqlx::query(
        "SELECT id, name, address, established_year, created_at \
         FROM judgetutor.colleges WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(college_from_row).transpose()?)
}

async fn require_college(pool: &PgPool, name: &str) -> anyhow::Result<College> {
    find_college_by_name(pool, name)
        .await?
        .with_context(|| format!("college {name:?} not found"))
}

/// Reserves an email across teachers and students. False when it is taken.
async fn claim_email(conn: &mut PgConnection, email: &str, role: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO judgetutor.accounts (email, role)
        VALUES ($1, $2)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(email)
    .bind(role)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn create_teacher(pool: &PgPool, teacher: &NewTeacher) -> anyhow::Result<TeacherRecord> {
    let college = require_college(pool, &teacher.college_name).await?;
    let id = Uuid::new_v4();

    let mut tx = pool.begin().await?;
    if !claim_email(&mut tx, &teacher.email, "teacher").await? {
        anyhow::bail!("an account with email {} already exists", teacher.email);
    }

    sqlx::query(
        r#"
        INSERT INTO judgetutor.teachers
        (id, name, email, college_id, subjects, description, experience, achievements)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(id)
    .bind(&teacher.name)
    .bind(&teacher.email)
    .bind(college.id)
    .bind(&teacher.subjects)
    .bind(&teacher.description)
    .bind(teacher.experience)
    .bind(&teacher.achievements)
    .execute(&mut *tx)
    .await
    .context("failed to insert teacher")?;
    tx.commit().await?;

    info!(teacher = %teacher.email, college = %college.name, "registered teacher");
    find_teacher(pool, id)
        .await?
        .context("teacher vanished after insert")
}

pub async fn create_student(
    pool: &PgPool,
    name: &str,
    email: &str,
    college_name: &str,
) -> anyhow::Result<Student> {
    let college = require_college(pool, college_name).await?;

    let mut tx = pool.begin().await?;
    if !claim_email(&mut tx, email, "student").await? {
        anyhow::bail!("an account with email {email} already exists");
    }

    let row = sqlx::query(
        r#"
        INSERT INTO judgetutor.students (id, name, email, college_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, email, college_id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(college.id)
    .fetch_one(&mut *tx)
    .await
    .context("failed to insert student")?;
    tx.commit().await?;

    Ok(student_from_row(&row)?)
}

pub async fn find_student_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Option<Student>> {
    let row = sqlx::query(
        "SELECT id, name, email, college_id, created_at \
         FROM judgetutor.students WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(student_from_row).transpose()?)
}

pub async fn find_teacher(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<TeacherRecord>> {
    let query = format!(
        "SELECT {TEACHER_COLUMNS} FROM judgetutor.teachers t \
         JOIN judgetutor.colleges c ON c.id = t.college_id WHERE t.id = $1"
    );
    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(teacher_from_row).transpose()?)
}

pub async fn find_teacher_by_email(
    pool: &PgPool,
    email: &str,
) -> anyhow::Result<Option<TeacherRecord>> {
    let query = format!(
        "SELECT {TEACHER_COLUMNS} FROM judgetutor.teachers t \
         JOIN judgetutor.colleges c ON c.id = t.college_id WHERE t.email = $1"
    );
    let row = sqlx::query(&query).bind(email).fetch_optional(pool).await?;
    Ok(row.as_ref().map(teacher_from_row).transpose()?)
}

pub async fn list_teachers(pool: &PgPool) -> anyhow::Result<Vec<TeacherRecord>> {
    let query = format!(
        "SELECT {TEACHER_COLUMNS} FROM judgetutor.teachers t \
         JOIN judgetutor.colleges c ON c.id = t.college_id ORDER BY t.name"
    );
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    rows.iter()
        .map(|row| teacher_from_row(row).map_err(Into::into))
        .collect()
}

pub async fn fetch_reviews_for_teacher(
    conn: &mut PgConnection,
    teacher_id: Uuid,
) -> anyhow::Result<Vec<Review>> {
    let query = format!(
        "SELECT {REVIEW_COLUMNS} FROM judgetutor.reviews r \
         WHERE r.teacher_id = $1 ORDER BY r.created_at"
    );
    let rows = sqlx::query(&query).bind(teacher_id).fetch_all(conn).await?;
    rows.iter()
        .map(|row| review_from_row(row).map_err(Into::into))
        .collect()
}

pub async fn fetch_reviews_for_student(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<StudentReview>> {
    let query = format!(
        "SELECT {REVIEW_COLUMNS}, t.name AS teacher_name FROM judgetutor.reviews r \
         JOIN judgetutor.teachers t ON t.id = r.teacher_id \
         WHERE r.student_id = $1 ORDER BY r.created_at DESC"
    );
    let rows = sqlx::query(&query).bind(student_id).fetch_all(pool).await?;

    let mut reviews = Vec::with_capacity(rows.len());
    for row in rows {
        reviews.push(StudentReview {
            teacher_name: row.try_get("teacher_name")?,
            review: review_from_row(&row)?,
        });
    }
    Ok(reviews)
}

/// Takes the per-teacher row lock for the rest of the enclosing transaction.
async fn lock_teacher(conn: &mut PgConnection, teacher_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("SELECT id FROM judgetutor.teachers WHERE id = $1 FOR UPDATE")
        .bind(teacher_id)
        .fetch_optional(conn)
        .await?
        .with_context(|| format!("teacher {teacher_id} not found"))?;
    Ok(())
}

/// Returns false when a review with the same source key already exists.
async fn insert_review(conn: &mut PgConnection, review: &NewReview) -> anyhow::Result<bool> {
    let ratings = &review.ratings.categories;
    let texts = &review.texts.categories;

    let result = sqlx::query(
        r#"
        INSERT INTO judgetutor.reviews
        (id, teacher_id, student_id, college_id,
         overall_rating, knowledge_rating, communication_rating, explanation_rating,
         availability_rating, grading_rating, engagement_rating, preparation_rating,
         approachability_rating, feedback_rating,
         knowledge_review, communication_review, explanation_review, availability_review,
         grading_review, engagement_review, preparation_review, approachability_review,
         feedback_review, comment, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(review.teacher_id)
    .bind(review.student_id)
    .bind(review.college_id)
    .bind(review.ratings.overall)
    .bind(ratings.knowledge)
    .bind(ratings.communication)
    .bind(ratings.explanation)
    .bind(ratings.availability)
    .bind(ratings.grading)
    .bind(ratings.engagement)
    .bind(ratings.preparation)
    .bind(ratings.approachability)
    .bind(ratings.feedback)
    .bind(&texts.knowledge)
    .bind(&texts.communication)
    .bind(&texts.explanation)
    .bind(&texts.availability)
    .bind(&texts.grading)
    .bind(&texts.engagement)
    .bind(&texts.preparation)
    .bind(&texts.approachability)
    .bind(&texts.feedback)
    .bind(&review.texts.comment)
    .bind(&review.source_key)
    .execute(conn)
    .await
    .context("failed to insert review")?;

    Ok(result.rows_affected() > 0)
}

/// Recomputes the aggregate from every stored review and writes it onto the teacher.
/// The caller must already hold the teacher's row lock.
async fn store_aggregate(
    conn: &mut PgConnection,
    teacher_id: Uuid,
    policy: &SentimentPolicy,
) -> anyhow::Result<AggregateSummary> {
    let reviews = fetch_reviews_for_teacher(&mut *conn, teacher_id).await?;
    let summary = aggregate::compute_aggregate(&reviews, policy);

    sqlx::query(
        r#"
        UPDATE judgetutor.teachers
        SET average_rating = $2, category_averages = $3, total_reviews = $4
        WHERE id = $1
        "#,
    )
    .bind(teacher_id)
    .bind(summary.overall)
    .bind(Json(&summary.by_category))
    .bind(i32::try_from(summary.total_reviews).context("review count overflow")?)
    .execute(conn)
    .await?;

    debug!(%teacher_id, overall = summary.overall, reviews = summary.total_reviews, "stored aggregate");
    Ok(summary)
}

/// Re-derives and persists one teacher's aggregate under the teacher's row lock.
pub async fn recompute_and_store(
    pool: &PgPool,
    teacher_id: Uuid,
    policy: &SentimentPolicy,
) -> anyhow::Result<AggregateSummary> {
    let mut tx = pool.begin().await?;
    lock_teacher(&mut tx, teacher_id).await?;
    let summary = store_aggregate(&mut tx, teacher_id, policy).await?;
    tx.commit().await?;
    Ok(summary)
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub inserted: bool,
    pub summary: AggregateSummary,
}

/// Stores a review and refreshes the teacher's cached aggregate in one transaction.
pub async fn submit_review(
    pool: &PgPool,
    review: &NewReview,
    policy: &SentimentPolicy,
) -> anyhow::Result<SubmitOutcome> {
    let mut tx = pool.begin().await?;
    lock_teacher(&mut tx, review.teacher_id).await?;
    let inserted = insert_review(&mut tx, review).await?;
    let summary = store_aggregate(&mut tx, review.teacher_id, policy).await?;
    tx.commit().await?;

    info!(
        teacher_id = %review.teacher_id,
        inserted,
        overall = summary.overall,
        "review submitted"
    );
    Ok(SubmitOutcome { inserted, summary })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub teachers_updated: usize,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct CsvReviewRow {
    teacher_email: String,
    student_email: Option<String>,
    overall: Option<f64>,
    knowledge: Option<f64>,
    communication: Option<f64>,
    explanation: Option<f64>,
    availability: Option<f64>,
    grading: Option<f64>,
    engagement: Option<f64>,
    preparation: Option<f64>,
    approachability: Option<f64>,
    feedback: Option<f64>,
    comment: Option<String>,
    knowledge_review: Option<String>,
    communication_review: Option<String>,
    explanation_review: Option<String>,
    availability_review: Option<String>,
    grading_review: Option<String>,
    engagement_review: Option<String>,
    preparation_review: Option<String>,
    approachability_review: Option<String>,
    feedback_review: Option<String>,
    source_key: Option<String>,
}

/// A CSV row that passed validation, before teacher and student lookup.
#[derive(Debug)]
struct ImportRow {
    teacher_email: String,
    student_email: Option<String>,
    ratings: Ratings,
    texts: ReviewTexts,
    source_key: String,
}

impl CsvReviewRow {
    fn rating_input(&self) -> RatingInput {
        RatingInput {
            overall: self.overall,
            categories: PerCategory {
                knowledge: self.knowledge,
                communication: self.communication,
                explanation: self.explanation,
                availability: self.availability,
                grading: self.grading,
                engagement: self.engagement,
                preparation: self.preparation,
                approachability: self.approachability,
                feedback: self.feedback,
            },
        }
    }

    fn prepare(self) -> Result<ImportRow, ValidationError> {
        let ratings = validate::validate_ratings(&self.rating_input())?;
        let teacher_email = validate::required_text("teacher_email", &self.teacher_email)?;

        Ok(ImportRow {
            teacher_email,
            student_email: validate::optional_text(self.student_email),
            ratings,
            source_key: validate::optional_text(self.source_key)
                .unwrap_or_else(|| format!("import-{}", Uuid::new_v4())),
            texts: ReviewTexts {
                comment: validate::optional_text(self.comment),
                categories: PerCategory {
                    knowledge: validate::optional_text(self.knowledge_review),
                    communication: validate::optional_text(self.communication_review),
                    explanation: validate::optional_text(self.explanation_review),
                    availability: validate::optional_text(self.availability_review),
                    grading: validate::optional_text(self.grading_review),
                    engagement: validate::optional_text(self.engagement_review),
                    preparation: validate::optional_text(self.preparation_review),
                    approachability: validate::optional_text(self.approachability_review),
                    feedback: validate::optional_text(self.feedback_review),
                },
            },
        })
    }
}

/// Imports reviews from CSV in a single transaction. Invalid rows are skipped.
/// Every teacher named by an accepted row is locked on first sight and
/// recomputed before commit, so a failed import leaves nothing behind.
pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    policy: &SentimentPolicy,
) -> anyhow::Result<ImportOutcome> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut outcome = ImportOutcome::default();
    let mut teachers: HashMap<String, Option<(Uuid, Uuid)>> = HashMap::new();
    let mut touched: Vec<Uuid> = Vec::new();

    let mut tx = pool.begin().await?;

    for (index, result) in reader.deserialize::<CsvReviewRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(line, error = %err, "skipping unreadable row");
                outcome.rejected += 1;
                continue;
            }
        };

        let row = match row.prepare() {
            Ok(row) => row,
            Err(err) => {
                warn!(line, error = %err, "skipping invalid review");
                outcome.rejected += 1;
                continue;
            }
        };

        if !teachers.contains_key(&row.teacher_email) {
            let found = find_teacher_by_email(pool, &row.teacher_email)
                .await?
                .map(|teacher| (teacher.id, teacher.college_id));
            if let Some((teacher_id, _)) = found {
                lock_teacher(&mut tx, teacher_id).await?;
                touched.push(teacher_id);
            }
            teachers.insert(row.teacher_email.clone(), found);
        }
        let Some(Some((teacher_id, college_id))) = teachers.get(&row.teacher_email).copied()
        else {
            warn!(line, teacher = %row.teacher_email, "skipping review for unknown teacher");
            outcome.rejected += 1;
            continue;
        };

        let student_id = match row.student_email.as_deref() {
            Some(student_email) => match find_student_by_email(pool, student_email).await? {
                Some(student) => Some(student.id),
                None => {
                    warn!(line, student = %student_email, "unknown student, storing review anonymously");
                    None
                }
            },
            None => None,
        };

        let review = NewReview {
            teacher_id,
            student_id,
            college_id,
            ratings: row.ratings,
            texts: row.texts,
            source_key: Some(row.source_key),
        };

        if insert_review(&mut tx, &review).await? {
            outcome.inserted += 1;
        } else {
            outcome.duplicates += 1;
        }
    }

    for teacher_id in &touched {
        store_aggregate(&mut tx, *teacher_id, policy).await?;
        outcome.teachers_updated += 1;
    }
    tx.commit().await?;

    info!(
        inserted = outcome.inserted,
        duplicates = outcome.duplicates,
        rejected = outcome.rejected,
        "csv import finished"
    );
    Ok(outcome)
}

pub async fn seed(pool: &PgPool, policy: &SentimentPolicy) -> anyhow::Result<()> {
    let colleges = vec![
        (
            Uuid::parse_str("6f1c2a52-0d7e-4c8e-9a51-2b1f3c9d7e01")?,
            "Northfield University",
            "12 College Road, Northfield",
            1962,
        ),
        (
            Uuid::parse_str("a3b4c5d6-7e8f-4a0b-8c1d-2e3f4a5b6c02")?,
            "Riverside Institute of Technology",
            "400 Riverside Drive, Eastport",
            1988,
        ),
    ];

    for (id, name, address, year) in &colleges {
        sqlx::query(
            r#"
            INSERT INTO judgetutor.colleges (id, name, address, established_year)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE
            SET address = EXCLUDED.address, established_year = EXCLUDED.established_year
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(address)
        .bind(year)
        .execute(pool)
        .await?;
    }

    let teachers = vec![
        (
            Uuid::parse_str("0b6a8c1e-3d2f-4e5a-9b7c-1d2e3f4a5b01")?,
            "Dr. Maya Chen",
            "maya.chen@northfield.edu",
            "Northfield University",
            vec!["Linear Algebra", "Calculus"],
            "Applied mathematician focused on numerical methods.",
            12,
            vec!["Teaching Excellence Award 2023"],
        ),
        (
            Uuid::parse_str("1c7b9d2f-4e3a-4f6b-8c8d-2e3f4a5b6c02")?,
            "Prof. Daniel Okafor",
            "daniel.okafor@northfield.edu",
            "Northfield University",
            vec!["Organic Chemistry"],
            "Synthetic chemist and lab safety lead.",
            20,
            vec![],
        ),
        (
            Uuid::parse_str("2d8c0e3a-5f4b-4a7c-9d9e-3f4a5b6c7d03")?,
            "Sofia Marquez",
            "sofia.marquez@rit.edu",
            "Riverside Institute of Technology",
            vec!["Operating Systems", "Computer Networks"],
            "Systems engineer teaching low-level programming.",
            6,
            vec!["Open source maintainer"],
        ),
    ];

    for (id, name, email, college, subjects, description, experience, achievements) in &teachers {
        sqlx::query(
            r#"
            INSERT INTO judgetutor.teachers
            (id, name, email, college_id, subjects, description, experience, achievements)
            SELECT $1, $2, $3, c.id, $5, $6, $7, $8
            FROM judgetutor.colleges c WHERE c.name = $4
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, subjects = EXCLUDED.subjects,
                description = EXCLUDED.description, experience = EXCLUDED.experience,
                achievements = EXCLUDED.achievements
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(college)
        .bind(subjects)
        .bind(description)
        .bind(experience)
        .bind(achievements)
        .execute(pool)
        .await?;
    }

    let mut conn = pool.acquire().await?;
    for (_, _, email, ..) in &teachers {
        claim_email(&mut conn, email, "teacher").await?;
    }
    drop(conn);

    let students = vec![
        (
            Uuid::parse_str("3e9d1f4b-6a5c-4b8d-8eaf-4a5b6c7d8e04")?,
            "Liam Novak",
            "liam.novak@student.northfield.edu",
            "Northfield University",
        ),
        (
            Uuid::parse_str("4fae2a5c-7b6d-4c9e-9fb0-5b6c7d8e9f05")?,
            "Aisha Rahman",
            "aisha.rahman@student.rit.edu",
            "Riverside Institute of Technology",
        ),
    ];

    for (id, name, email, college) in &students {
        sqlx::query(
            r#"
            INSERT INTO judgetutor.students (id, name, email, college_id)
            SELECT $1, $2, $3, c.id FROM judgetutor.colleges c WHERE c.name = $4
            ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(college)
        .execute(pool)
        .await?;
    }

    let mut conn = pool.acquire().await?;
    for (_, _, email, _) in &students {
        claim_email(&mut conn, email, "student").await?;
    }
    drop(conn);

    let reviews = vec![
        (
            "seed-001",
            "maya.chen@northfield.edu",
            Some("liam.novak@student.northfield.edu"),
            [5.0, 5.0, 5.0, 4.0, 4.0, 5.0, 5.0, 5.0, 4.0, 5.0],
            "Excellent lecturer, clear proofs and always helpful in office hours.",
        ),
        (
            "seed-002",
            "maya.chen@northfield.edu",
            None,
            [4.0, 5.0, 4.0, 4.0, 3.0, 4.0, 4.0, 5.0, 4.0, 3.0],
            "Good course overall, homework feedback came back late.",
        ),
        (
            "seed-003",
            "daniel.okafor@northfield.edu",
            Some("liam.novak@student.northfield.edu"),
            [2.0, 4.0, 2.0, 2.0, 2.0, 3.0, 2.0, 3.0, 2.0, 2.0],
            "Knows the material but lectures are confusing and he can be rude.",
        ),
        (
            "seed-004",
            "sofia.marquez@rit.edu",
            Some("aisha.rahman@student.rit.edu"),
            [5.0, 5.0, 5.0, 5.0, 5.0, 4.0, 5.0, 5.0, 5.0, 5.0],
            "Best systems class I have taken. Amazing labs, highly recommended.",
        ),
    ];

    let mut tx = pool.begin().await?;
    for (source_key, teacher_email, student_email, values, comment) in reviews {
        let teacher = find_teacher_by_email(pool, teacher_email)
            .await?
            .with_context(|| format!("seed teacher {teacher_email} missing"))?;
        let student_id = match student_email {
            Some(email) => find_student_by_email(pool, email).await?.map(|s| s.id),
            None => None,
        };

        let [overall, rest @ ..] = values;
        let mut rest = rest.into_iter();
        let review = NewReview {
            teacher_id: teacher.id,
            student_id,
            college_id: teacher.college_id,
            ratings: Ratings {
                overall,
                categories: PerCategory::from_fn(|_| rest.next().unwrap_or_default()),
            },
            texts: ReviewTexts {
                comment: Some(comment.to_string()),
                categories: PerCategory::default(),
            },
            source_key: Some(source_key.to_string()),
        };

        insert_review(&mut tx, &review).await?;
    }

    for teacher in list_teachers(pool).await? {
        lock_teacher(&mut tx, teacher.id).await?;
        store_aggregate(&mut tx, teacher.id, policy).await?;
    }
    tx.commit().await?;

    Ok(())
}

fn college_from_row(row: &PgRow) -> Result<College, sqlx::Error> {
    Ok(College {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        established_year: row.try_get("established_year")?,
        created_at: row.try_get("created_at")?,
    })
}

fn student_from_row(row: &PgRow) -> Result<Student, sqlx::Error> {
    Ok(Student {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        college_id: row.try_get("college_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn teacher_from_row(row: &PgRow) -> Result<TeacherRecord, sqlx::Error> {
    let averages: Json<BTreeMap<Category, f64>> = row.try_get("category_averages")?;
    Ok(TeacherRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        college_id: row.try_get("college_id")?,
        college_name: row.try_get("college_name")?,
        subjects: row.try_get("subjects")?,
        description: row.try_get("description")?,
        experience: row.try_get("experience")?,
        achievements: row.try_get("achievements")?,
        average_rating: row.try_get("average_rating")?,
        category_averages: averages.0,
        total_reviews: row.try_get("total_reviews")?,
        created_at: row.try_get("created_at")?,
    })
}

fn review_from_row(row: &PgRow) -> Result<Review, sqlx::Error> {
    Ok(Review {
        id: row.try_get("id")?,
        teacher_id: row.try_get("teacher_id")?,
        student_id: row.try_get("student_id")?,
        college_id: row.try_get("college_id")?,
        ratings: Ratings {
            overall: row.try_get("overall_rating")?,
            categories: PerCategory {
                knowledge: row.try_get("knowledge_rating")?,
                communication: row.try_get("communication_rating")?,
                explanation: row.try_get("explanation_rating")?,
                availability: row.try_get("availability_rating")?,
                grading: row.try_get("grading_rating")?,
                engagement: row.try_get("engagement_rating")?,
                preparation: row.try_get("preparation_rating")?,
                approachability: row.try_get("approachability_rating")?,
                feedback: row.try_get("feedback_rating")?,
            },
        },
        texts: ReviewTexts {
            comment: row.try_get("comment")?,
            categories: PerCategory {
                knowledge: row.try_get("knowledge_review")?,
                communication: row.try_get("communication_review")?,
                explanation: row.try_get("explanation_review")?,
                availability: row.try_get("availability_review")?,
                grading: row.try_get("grading_review")?,
                engagement: row.try_get("engagement_review")?,
                preparation: row.try_get("preparation_review")?,
                approachability: row.try_get("approachability_review")?,
                feedback: row.try_get("feedback_review")?,
            },
        },
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMPORT_CSV: &str = "\
teacher_email,student_email,overall,knowledge,communication,explanation,availability,grading,engagement,preparation,approachability,feedback,comment,knowledge_review,source_key
 maya.chen@northfield.edu ,,5,5,4,5,4,4,5,5,5,4,\"Clear lectures, very helpful.\",,import-demo-001
daniel.okafor@northfield.edu,liam.novak@student.northfield.edu,3,4,3,3,2,3,3,4,2,3,  ,Knows a lot,
sofia.marquez@rit.edu,,7,5,4,4,5,4,4,5,4,4,too high,,import-demo-003
sofia.marquez@rit.edu,,4,5,,4,5,4,4,5,4,4,missing communication,,import-demo-004
";

    fn rows() -> Vec<CsvReviewRow> {
        csv::Reader::from_reader(IMPORT_CSV.as_bytes())
            .deserialize()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn missing_and_blank_columns_become_none() {
        let row = rows().remove(0).prepare().unwrap();

        assert_eq!(row.teacher_email, "maya.chen@northfield.edu");
        assert_eq!(row.student_email, None);
        assert_eq!(row.source_key, "import-demo-001");
        assert_eq!(row.ratings.overall, 5.0);
        assert_eq!(row.ratings.categories.communication, 4.0);
        assert_eq!(
            row.texts.comment.as_deref(),
            Some("Clear lectures, very helpful.")
        );
        assert_eq!(row.texts.categories.knowledge, None);
        assert_eq!(row.texts.categories.grading, None);
        assert!(row.texts.fields().skip(1).all(|text| text.is_none()));
    }

    #[test]
    fn student_email_and_review_texts_are_kept() {
        let row = rows().remove(1).prepare().unwrap();

        assert_eq!(
            row.student_email.as_deref(),
            Some("liam.novak@student.northfield.edu")
        );
        assert_eq!(row.texts.comment, None);
        assert_eq!(row.texts.categories.knowledge.as_deref(), Some("Knows a lot"));
    }

    #[test]
    fn blank_source_key_gets_generated_import_key() {
        let first = rows().remove(1).prepare().unwrap();
        let second = rows().remove(1).prepare().unwrap();

        assert!(first.source_key.starts_with("import-"));
        assert_ne!(first.source_key, second.source_key);
    }

    #[test]
    fn out_of_range_and_missing_ratings_are_rejected() {
        let mut rows = rows();

        let err = rows.remove(2).prepare().unwrap_err();
        assert_eq!(
            err,
            ValidationError::RatingOutOfRange {
                field: "overallRating".to_string(),
                value: 7.0
            }
        );

        let err = rows.remove(2).prepare().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRating("communicationRating".to_string())
        );
    }

    #[test]
    fn blank_teacher_email_is_rejected() {
        let data = "teacher_email,overall,knowledge,communication,explanation,availability,grading,engagement,preparation,approachability,feedback\n   ,4,4,4,4,4,4,4,4,4,4\n";
        let row: CsvReviewRow = csv::Reader::from_reader(data.as_bytes())
            .deserialize()
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(
            row.prepare().unwrap_err(),
            ValidationError::Blank("teacher_email")
        );
    }
}
