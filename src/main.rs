use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod config;
mod db;
mod models;
mod rankings;
mod report;
mod sentiment;
mod validate;

use config::Config;
use models::{AggregateSummary, Category, NewReview, NewTeacher, PerCategory, ReviewTexts};
use rankings::{RankingQuery, SortKey, SortOrder};
use sentiment::SentimentPolicy;
use validate::RatingInput;

#[derive(Parser)]
#[command(name = "judgetutor")]
#[command(about = "Teacher reviews and aggregate ratings by university", long_about = None)]
struct Cli {
    /// Path to a judgetutor.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo colleges, teachers, students and reviews
    Seed,
    /// Register a college
    AddCollege {
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        established_year: i32,
    },
    /// List colleges by name
    Colleges,
    /// Register a teacher
    AddTeacher {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        college: String,
        /// Comma-separated; may be repeated
        #[arg(long = "subjects", required = true)]
        subjects: Vec<String>,
        #[arg(long)]
        description: String,
        #[arg(long)]
        experience: i32,
        /// Comma-separated
        #[arg(long)]
        achievements: Option<String>,
    },
    /// Register a student
    AddStudent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        college: String,
    },
    /// Submit a review and refresh the teacher's aggregate
    Review(ReviewArgs),
    /// Import reviews from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Recompute cached aggregates for one teacher, or all of them
    Recompute {
        #[arg(long)]
        teacher: Option<String>,
    },
    /// Show a teacher's profile and ratings
    Show {
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        json: bool,
    },
    /// Rank teachers by rating or experience
    Rankings {
        #[arg(long)]
        college: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = SortKey::Rating)]
        sort_by: SortKey,
        #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
        order: SortOrder,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List the reviews written by a student
    StudentReviews {
        #[arg(long)]
        email: String,
    },
    /// Generate a markdown dashboard for a teacher
    Report {
        #[arg(long)]
        teacher: String,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct ReviewArgs {
    /// Email of the reviewed teacher
    #[arg(long)]
    teacher: String,
    /// Email of the submitting student
    #[arg(long)]
    student: Option<String>,
    /// College name, defaults to the teacher's college
    #[arg(long)]
    college: Option<String>,

    #[arg(long)]
    overall: Option<f64>,
    #[arg(long)]
    knowledge: Option<f64>,
    #[arg(long)]
    communication: Option<f64>,
    #[arg(long)]
    explanation: Option<f64>,
    #[arg(long)]
    availability: Option<f64>,
    #[arg(long)]
    grading: Option<f64>,
    #[arg(long)]
    engagement: Option<f64>,
    #[arg(long)]
    preparation: Option<f64>,
    #[arg(long)]
    approachability: Option<f64>,
    #[arg(long)]
    feedback: Option<f64>,

    #[arg(long)]
    comment: Option<String>,
    #[arg(long)]
    knowledge_review: Option<String>,
    #[arg(long)]
    communication_review: Option<String>,
    #[arg(long)]
    explanation_review: Option<String>,
    #[arg(long)]
    availability_review: Option<String>,
    #[arg(long)]
    grading_review: Option<String>,
    #[arg(long)]
    engagement_review: Option<String>,
    #[arg(long)]
    preparation_review: Option<String>,
    #[arg(long)]
    approachability_review: Option<String>,
    #[arg(long)]
    feedback_review: Option<String>,
}

impl ReviewArgs {
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

    fn texts(&self) -> ReviewTexts {
        let text = |value: &Option<String>| validate::optional_text(value.clone());
        ReviewTexts {
            comment: text(&self.comment),
            categories: PerCategory {
                knowledge: text(&self.knowledge_review),
                communication: text(&self.communication_review),
                explanation: text(&self.explanation_review),
                availability: text(&self.availability_review),
                grading: text(&self.grading_review),
                engagement: text(&self.engagement_review),
                preparation: text(&self.preparation_review),
                approachability: text(&self.approachability_review),
                feedback: text(&self.feedback_review),
            },
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let policy = config.scoring.policy();
    debug!(?policy, "scoring policy");

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    run(cli.command, &pool, &policy).await
}

async fn run(command: Commands, pool: &PgPool, policy: &SentimentPolicy) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(pool, policy).await?;
            println!("Seed data inserted.");
        }
        Commands::AddCollege {
            name,
            address,
            established_year,
        } => {
            let name = validate::required_text("name", &name)?;
            let address = validate::required_text("address", &address)?;
            let college = db::create_college(pool, &name, &address, established_year).await?;
            println!("College {} created ({}).", college.name, college.id);
        }
        Commands::Colleges => {
            let colleges = db::list_colleges(pool).await?;
            if colleges.is_empty() {
                println!("No colleges registered.");
            }
            for college in colleges {
                println!(
                    "- {} ({}, est. {})",
                    college.name, college.address, college.established_year
                );
            }
        }
        Commands::AddTeacher {
            name,
            email,
            college,
            subjects,
            description,
            experience,
            achievements,
        } => {
            let teacher = NewTeacher {
                name: validate::required_text("name", &name)?,
                email: validate::required_text("email", &email)?,
                college_name: validate::required_text("college", &college)?,
                subjects: validate::parse_subjects(&subjects)?,
                description: validate::required_text("description", &description)?,
                experience: validate::check_experience(experience)?,
                achievements: achievements
                    .as_deref()
                    .map(validate::split_list)
                    .unwrap_or_default(),
            };
            let record = db::create_teacher(pool, &teacher).await?;
            println!("Teacher {} registered ({}).", record.name, record.id);
        }
        Commands::AddStudent {
            name,
            email,
            college,
        } => {
            let name = validate::required_text("name", &name)?;
            let email = validate::required_text("email", &email)?;
            let student = db::create_student(pool, &name, &email, &college).await?;
            println!("Student {} registered ({}).", student.name, student.id);
        }
        Commands::Review(args) => {
            let ratings = validate::validate_ratings(&args.rating_input())?;
            let teacher = db::find_teacher_by_email(pool, &args.teacher)
                .await?
                .with_context(|| format!("teacher {} not found", args.teacher))?;

            let student_id = match args.student.as_deref() {
                Some(email) => Some(
                    db::find_student_by_email(pool, email)
                        .await?
                        .with_context(|| format!("student {email} not found"))?
                        .id,
                ),
                None => None,
            };
            let college_id = match args.college.as_deref() {
                Some(name) => {
                    db::find_college_by_name(pool, name)
                        .await?
                        .with_context(|| format!("college {name:?} not found"))?
                        .id
                }
                None => teacher.college_id,
            };

            let review = NewReview {
                teacher_id: teacher.id,
                student_id,
                college_id,
                ratings,
                texts: args.texts(),
                source_key: None,
            };
            let outcome = db::submit_review(pool, &review, policy).await?;
            if outcome.inserted {
                println!("Review recorded for {}.", teacher.name);
            } else {
                println!("Review already recorded for {}.", teacher.name);
            }
            print_summary(&outcome.summary);
        }
        Commands::Import { csv } => {
            let outcome = db::import_csv(pool, &csv, policy).await?;
            println!(
                "Inserted {} reviews from {} ({} duplicates, {} rejected, {} teachers updated).",
                outcome.inserted,
                csv.display(),
                outcome.duplicates,
                outcome.rejected,
                outcome.teachers_updated
            );
        }
        Commands::Recompute { teacher } => {
            let teachers = match teacher {
                Some(email) => vec![db::find_teacher_by_email(pool, &email)
                    .await?
                    .with_context(|| format!("teacher {email} not found"))?],
                None => db::list_teachers(pool).await?,
            };

            for teacher in &teachers {
                let summary = db::recompute_and_store(pool, teacher.id, policy).await?;
                println!(
                    "- {}: {:.2} across {} reviews",
                    teacher.name, summary.overall, summary.total_reviews
                );
            }
            info!(count = teachers.len(), "recomputed aggregates");
        }
        Commands::Show { teacher, json } => {
            let record = db::find_teacher_by_email(pool, &teacher)
                .await?
                .with_context(|| format!("teacher {teacher} not found"))?;
            let summary = effective_summary(pool, &record, policy).await?;

            if json {
                let mut value = serde_json::to_value(&record)?;
                value["aggregates"] = serde_json::to_value(&summary)?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{} <{}>", record.name, record.email);
                println!("{}", record.college_name);
                println!("Subjects: {}", record.subjects.join(", "));
                println!("Experience: {} years", record.experience);
                if !record.description.is_empty() {
                    println!("{}", record.description);
                }
                if !record.achievements.is_empty() {
                    println!("Achievements: {}", record.achievements.join("; "));
                }
                print_summary(&summary);
            }
        }
        Commands::Rankings {
            college,
            search,
            sort_by,
            order,
            limit,
        } => {
            let teachers = db::list_teachers(pool).await?;
            let query = RankingQuery {
                college,
                search,
                sort_by,
                order,
                limit: Some(limit),
            };
            let ranked = rankings::rank(&teachers, &query);

            if ranked.is_empty() {
                println!("No teachers match.");
            }
            for (position, teacher) in ranked.iter().enumerate() {
                println!(
                    "{}. {} ({}) rating {:.2} from {} reviews, {} years",
                    position + 1,
                    teacher.name,
                    teacher.college_name,
                    teacher.average_rating,
                    teacher.total_reviews,
                    teacher.experience
                );
            }
        }
        Commands::StudentReviews { email } => {
            let student = db::find_student_by_email(pool, &email)
                .await?
                .with_context(|| format!("student {email} not found"))?;
            let reviews = db::fetch_reviews_for_student(pool, student.id).await?;

            if reviews.is_empty() {
                println!("{} has not written any reviews.", student.name);
            }
            for entry in reviews {
                println!(
                    "- {} on {}: overall {:.1}, score {:.2}{}",
                    entry.teacher_name,
                    entry.review.created_at.format("%Y-%m-%d"),
                    entry.review.ratings.overall,
                    aggregate::review_score(&entry.review, policy),
                    entry
                        .review
                        .texts
                        .comment
                        .as_deref()
                        .map(|c| format!(" \"{c}\""))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Report { teacher, out } => {
            let record = db::find_teacher_by_email(pool, &teacher)
                .await?
                .with_context(|| format!("teacher {teacher} not found"))?;
            let mut conn = pool.acquire().await?;
            let reviews = db::fetch_reviews_for_teacher(&mut conn, record.id).await?;
            let summary = aggregate::compute_aggregate(&reviews, policy);
            let report = report::build_report(&record, &summary, &reviews, policy);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

/// Cached aggregate, or a fresh one when the cache was never filled.
async fn effective_summary(
    pool: &PgPool,
    teacher: &models::TeacherRecord,
    policy: &SentimentPolicy,
) -> anyhow::Result<AggregateSummary> {
    let cached = teacher.cached_summary();
    if cached.overall != 0.0 && !cached.by_category.is_empty() {
        return Ok(cached);
    }

    let mut conn = pool.acquire().await?;
    let reviews = db::fetch_reviews_for_teacher(&mut conn, teacher.id).await?;
    debug!(teacher = %teacher.email, reviews = reviews.len(), "cache empty, computing aggregate");
    Ok(aggregate::compute_aggregate(&reviews, policy))
}

fn print_summary(summary: &AggregateSummary) {
    if summary.total_reviews == 0 {
        println!("No reviews yet.");
        return;
    }
    println!(
        "Overall {:.2} / 5 across {} reviews",
        summary.overall, summary.total_reviews
    );
    for category in Category::ALL {
        if let Some(average) = summary.by_category.get(&category) {
            println!("  {:<16} {:.2}", category.as_str(), average);
        }
    }
}
