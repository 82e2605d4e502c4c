use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::db::DbPool;
use crate::dto::{EntityProgressDto, ProgressDto};
use crate::models::{Entity, User};
use crate::progression::TopicTally;
use crate::schema::{answers, entities, questions, study_sessions};
use anyhow::Result;
use chrono::{Days, NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use tracing::{instrument, debug};

/// Per-topic question totals and the user's completion counts in one scope
///
/// Only active questions inside the entity/profile scope are counted, both
/// for the totals and for the completed side, so a topic can never report
/// more completed questions than it has.
///
/// ### Arguments
///
/// * `pool` - The database connection pool
/// * `user_id` - The learner whose correct answers count as completion
/// * `entity_id` - Optional entity scope
/// * `profile_id` - Optional profile scope
///
/// ### Returns
///
/// One tally per topic (plus one for topic-less questions, if any), in no
/// particular order
#[instrument(skip(pool))]
pub fn topic_tallies(
    pool: &DbPool,
    user_id: &str,
    entity_id: Option<&str>,
    profile_id: Option<&str>,
) -> Result<Vec<TopicTally>> {
    let conn = &mut pool.get()?;

    let mut scope = questions::table
        .filter(questions::is_active.eq(true))
        .into_boxed();
    if let Some(entity_id) = entity_id {
        scope = scope.filter(questions::entity_id.eq(entity_id));
    }
    if let Some(profile_id) = profile_id {
        scope = scope.filter(questions::profile_id.eq(profile_id));
    }
    let scoped: Vec<(String, Option<String>)> = scope
        .select((questions::id, questions::topic_id))
        .load(conn)?;

    let correct: HashSet<String> = answers::table
        .filter(answers::user_id.eq(user_id))
        .filter(answers::is_correct.eq(true))
        .select(answers::question_id)
        .load::<String>(conn)?
        .into_iter()
        .collect();

    let mut totals: HashMap<Option<String>, (i64, i64)> = HashMap::new();
    for (question_id, topic_id) in scoped {
        let entry = totals.entry(topic_id).or_insert((0, 0));
        entry.0 += 1;
        if correct.contains(&question_id) {
            entry.1 += 1;
        }
    }

    let topic_ids: Vec<String> = totals.keys().flatten().cloned().collect();
    let names = super::catalog_repo::topic_names(conn, &topic_ids)?;

    let tallies: Vec<TopicTally> = totals
        .into_iter()
        .map(|(topic_id, (total, completed))| TopicTally {
            topic_name: topic_id.as_ref().and_then(|id| names.get(id).cloned()),
            topic_id,
            total_questions: total,
            completed_questions: completed,
        })
        .collect();

    debug!("Computed {} topic tallies", tallies.len());
    Ok(tallies)
}

/// Length of the run of consecutive days with activity ending today
///
/// A run that ended yesterday still counts, so the streak survives until the
/// learner misses a whole day.
pub fn streak_from_dates(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> i64 {
    let yesterday = today.checked_sub_days(Days::new(1));
    let mut cursor = if days.contains(&today) {
        Some(today)
    } else if yesterday.is_some_and(|d| days.contains(&d)) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        streak += 1;
        cursor = day.checked_sub_days(Days::new(1));
    }
    streak
}

fn percentage(correct: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

/// Aggregate statistics for one learner
///
/// Entity rows cover every entity in name order, including ones the learner
/// has not practised yet.
///
/// ### Arguments
///
/// * `pool` - The database connection pool
/// * `user` - The learner, whose XP and level are copied as-is
/// * `today` - The current UTC date, used for the streak
#[instrument(skip(pool, user), fields(user_id = %user.get_id()))]
pub fn user_progress(pool: &DbPool, user: &User, today: NaiveDate) -> Result<ProgressDto> {
    let conn = &mut pool.get()?;
    let user_id = user.get_id();

    let total_sessions: i64 = study_sessions::table
        .filter(study_sessions::user_id.eq(&user_id))
        .count()
        .get_result(conn)?;

    let graded: Vec<(Option<String>, bool, NaiveDateTime)> = answers::table
        .inner_join(questions::table)
        .filter(answers::user_id.eq(&user_id))
        .select((questions::entity_id, answers::is_correct, answers::answered_at))
        .load(conn)?;

    let total_answers = graded.len() as i64;
    let correct_answers = graded.iter().filter(|(_, correct, _)| *correct).count() as i64;

    let mut per_entity: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    let mut days = BTreeSet::new();
    for (entity_id, correct, answered_at) in &graded {
        days.insert(answered_at.date());
        if let Some(entity_id) = entity_id {
            let entry = per_entity.entry(entity_id.clone()).or_insert((0, 0));
            entry.0 += 1;
            if *correct {
                entry.1 += 1;
            }
        }
    }

    let all_entities: Vec<Entity> = entities::table
        .order(entities::name.asc())
        .select(Entity::as_select())
        .load(conn)?;
    let entity_progress = all_entities
        .iter()
        .map(|entity| {
            let (total, correct) = per_entity.get(&entity.get_id()).copied().unwrap_or((0, 0));
            EntityProgressDto {
                entity_id: entity.get_id(),
                entity_name: entity.get_name(),
                color: entity.get_color(),
                total_answers: total,
                correct_answers: correct,
                percentage: percentage(correct, total),
            }
        })
        .collect();

    Ok(ProgressDto {
        total_sessions,
        total_questions_answered: total_answers,
        correct_percentage: (percentage(correct_answers, total_answers) * 10.0).round() / 10.0,
        current_streak: streak_from_dates(&days, today),
        level: user.get_level(),
        xp_points: user.get_xp_points(),
        entity_progress,
    })
}
