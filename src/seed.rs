//! Reference data seeding
//!
//! Loads the bundled catalog (entities, their profiles, topics and the
//! built-in question bank) and any configured administrator accounts.
//! Every step looks records up by name, email or question text first, so
//! seeding an already-seeded database changes nothing.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{instrument, debug, info, warn};

use crate::auth;
use crate::db::DbPool;
use crate::models::{Entity, Question, QuestionDraft, Topic, User, UserRole};
use crate::repo;

const QUESTION_BANK: &str = include_str!("../data/question_bank.json");

/// Highest `n` probed for `ADMIN_EMAIL_n` / `ADMIN_PASS_n`
pub const MAX_ENV_ADMINS: usize = 3;

#[derive(Debug, Deserialize)]
struct Catalog {
    entities: Vec<SeedEntity>,
    topics: Vec<SeedTopic>,
    /// Questions keyed by entity name
    questions: BTreeMap<String, Vec<SeedQuestion>>,
}

#[derive(Debug, Deserialize)]
struct SeedEntity {
    name: String,
    description: String,
    icon: String,
    color: String,
    profiles: Vec<SeedProfile>,
}

#[derive(Debug, Deserialize)]
struct SeedProfile {
    name: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct SeedTopic {
    name: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct SeedQuestion {
    text: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_answer: String,
    explanation: String,
    topic: Option<String>,
    difficulty: i32,
}

/// An administrator account to create when missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Administrator accounts configured through `ADMIN_EMAIL_n` / `ADMIN_PASS_n`
///
/// Pairs are read for `n` in `1..=MAX_ENV_ADMINS`; a slot missing either
/// variable is ignored.
pub fn admins_from_env<F>(lookup: F) -> Vec<AdminSeed>
where
    F: Fn(&str) -> Option<String>,
{
    (1..=MAX_ENV_ADMINS)
        .filter_map(|n| {
            let email = lookup(&format!("ADMIN_EMAIL_{n}"))?;
            let password = lookup(&format!("ADMIN_PASS_{n}"))?;
            Some(AdminSeed {
                email,
                password,
                full_name: lookup(&format!("ADMIN_NAME_{n}")),
            })
        })
        .collect()
}

/// Counts of records created by one seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub admins: usize,
    pub entities: usize,
    pub profiles: usize,
    pub topics: usize,
    pub questions: usize,
}

/// Creates an administrator unless the email is already registered
///
/// ### Returns
///
/// The account and whether it was created by this call
///
/// ### Errors
///
/// Returns an error if the password is shorter than the login minimum or
/// the database write fails
#[instrument(skip(pool, admin), fields(email = %admin.email))]
pub fn create_admin(pool: &DbPool, admin: &AdminSeed) -> anyhow::Result<(User, bool)> {
    let email = repo::normalize_email(&admin.email);
    if let Some(existing) = repo::get_user_by_email(pool, &email)? {
        debug!("Admin already exists");
        return Ok((existing, false));
    }
    if admin.password.chars().count() < auth::MIN_PASSWORD_LEN {
        anyhow::bail!("password for {email} must be at least {} characters", auth::MIN_PASSWORD_LEN);
    }

    let hashed = auth::hash_password(&admin.password)?;
    let user = repo::create_user(pool, User::new(email, hashed, admin.full_name.clone(), UserRole::Admin))?;
    info!("Created admin {}", user.get_id());
    Ok((user, true))
}

fn seed_entities(pool: &DbPool, catalog: &Catalog, report: &mut SeedReport) -> anyhow::Result<HashMap<String, Entity>> {
    let mut by_name = HashMap::new();

    for seed in &catalog.entities {
        let entity = match repo::get_entity_by_name(pool, &seed.name)? {
            Some(entity) => entity,
            None => {
                report.entities += 1;
                repo::create_entity(
                    pool,
                    Entity::new(
                        seed.name.clone(),
                        Some(seed.description.clone()),
                        Some(seed.icon.clone()),
                        Some(seed.color.clone()),
                    ),
                )?
            }
        };

        for profile in &seed.profiles {
            let (_, created) = repo::get_or_create_profile(
                pool,
                &entity.get_id(),
                &profile.name,
                Some(profile.description.clone()),
            )?;
            if created {
                report.profiles += 1;
            }
        }

        by_name.insert(seed.name.clone(), entity);
    }

    Ok(by_name)
}

fn get_or_create_topic(
    pool: &DbPool,
    topics: &mut HashMap<String, Topic>,
    name: &str,
    description: &str,
    report: &mut SeedReport,
) -> anyhow::Result<Topic> {
    if let Some(topic) = topics.get(name) {
        return Ok(topic.clone());
    }
    let topic = match repo::get_topic_by_name(pool, name)? {
        Some(topic) => topic,
        None => {
            report.topics += 1;
            repo::create_topic(pool, Topic::new(name.to_string(), Some(description.to_string())))?
        }
    };
    topics.insert(name.to_string(), topic.clone());
    Ok(topic)
}

/// Seeds the bundled catalog and the given administrators
///
/// Question XP is always `difficulty * 10`. Questions naming a topic that is
/// not part of the bundled topic list get that topic created on the fly.
///
/// ### Errors
///
/// Returns an error if the bundled catalog does not parse, a bundled
/// question is invalid, or a database write fails
#[instrument(skip(pool, admins), fields(admins = admins.len()))]
pub fn seed_database(pool: &DbPool, admins: &[AdminSeed]) -> anyhow::Result<SeedReport> {
    let catalog: Catalog = serde_json::from_str(QUESTION_BANK)?;
    let mut report = SeedReport::default();

    for admin in admins {
        if create_admin(pool, admin)?.1 {
            report.admins += 1;
        }
    }

    let entities = seed_entities(pool, &catalog, &mut report)?;

    let mut topics = HashMap::new();
    for seed in &catalog.topics {
        get_or_create_topic(pool, &mut topics, &seed.name, &seed.description, &mut report)?;
    }

    for (entity_name, questions) in &catalog.questions {
        let Some(entity) = entities.get(entity_name) else {
            warn!("Skipping questions for unknown entity {}", entity_name);
            continue;
        };

        for seed in questions {
            if repo::find_question_by_text(pool, &seed.text)?.is_some() {
                continue;
            }
            let topic_id = match &seed.topic {
                Some(name) => Some(
                    get_or_create_topic(pool, &mut topics, name, "Creado durante la carga inicial", &mut report)?
                        .get_id(),
                ),
                None => None,
            };

            let question = Question::new(QuestionDraft {
                entity_id: Some(entity.get_id()),
                profile_id: None,
                topic_id,
                material_id: None,
                text: seed.text.clone(),
                option_a: seed.option_a.clone(),
                option_b: seed.option_b.clone(),
                option_c: seed.option_c.clone(),
                option_d: seed.option_d.clone(),
                correct_answer: seed.correct_answer.clone(),
                explanation: Some(seed.explanation.clone()),
                page_reference: None,
                difficulty: seed.difficulty,
                xp_reward: seed.difficulty * 10,
            })?;
            repo::create_question(pool, question)?;
            report.questions += 1;
        }
    }

    info!(
        "Seeding finished: {} admins, {} entities, {} profiles, {} topics, {} questions created",
        report.admins, report.entities, report.profiles, report.topics, report.questions
    );
    Ok(report)
}
