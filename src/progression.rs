//! Topic progression map
//!
//! Turns per-topic question totals and per-user completion counts into the
//! ordered, gated node list rendered as the "adventure map". Topics form a
//! linear curriculum sorted by name: the first node is always open and each
//! later node opens once its predecessor reaches the unlock threshold.

use serde::{Deserialize, Serialize};

/// Default percentage the previous node must reach to unlock the next one
pub const DEFAULT_UNLOCK_THRESHOLD: i32 = 60;

/// Aggregate counts for one topic, as read from storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTally {
    /// `None` for questions that have no topic
    pub topic_id: Option<String>,
    pub topic_name: Option<String>,
    /// Active questions in the topic
    pub total_questions: i64,
    /// Distinct questions in the topic the user answered correctly
    pub completed_questions: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Locked,
    Available,
    Completed,
}

/// One node of the adventure map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    pub id: String,
    pub topic_id: Option<String>,
    pub topic: Option<String>,
    pub label: String,
    pub status: NodeStatus,
    /// Whole percent, 0 to 100
    pub progress: i32,
    pub total_questions: i64,
    pub completed_questions: i64,
    pub x: i32,
    pub y: i32,
}

/// `floor(completed / total * 100)`, clamped to 100; 0 for an empty topic
pub fn progress_percent(completed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    let completed = completed.clamp(0, total);
    // completed <= total, so the quotient fits in 0..=100
    (completed * 100 / total) as i32
}

/// Builds the adventure map from topic tallies
///
/// The input order does not matter; nodes are sorted by topic name, with
/// untitled topics sorting as the empty string. The result depends only on
/// the tallies and the threshold.
pub fn build_adventure_map(mut tallies: Vec<TopicTally>, unlock_threshold: i32) -> Vec<MapNode> {
    tallies.sort_by(|a, b| {
        let left = a.topic_name.as_deref().unwrap_or("");
        let right = b.topic_name.as_deref().unwrap_or("");
        left.cmp(right).then_with(|| a.topic_id.cmp(&b.topic_id))
    });

    let mut nodes: Vec<MapNode> = Vec::with_capacity(tallies.len());
    for (i, tally) in tallies.into_iter().enumerate() {
        let progress = progress_percent(tally.completed_questions, tally.total_questions);

        let unlocked = match nodes.last() {
            None => true,
            Some(previous) => previous.progress >= unlock_threshold,
        };
        let status = if tally.total_questions > 0 && tally.completed_questions >= tally.total_questions {
            NodeStatus::Completed
        } else if unlocked {
            NodeStatus::Available
        } else {
            NodeStatus::Locked
        };

        let label = tally
            .topic_name
            .clone()
            .unwrap_or_else(|| format!("Módulo General {}", i + 1));
        let index = i as i32;

        nodes.push(MapNode {
            id: format!("node_{i}"),
            topic_id: tally.topic_id,
            topic: tally.topic_name,
            label,
            status,
            progress,
            total_questions: tally.total_questions,
            completed_questions: tally.completed_questions.min(tally.total_questions.max(0)),
            x: 20 + (index % 2) * 60,
            y: 20 + index * 20,
        });
    }
    nodes
}
