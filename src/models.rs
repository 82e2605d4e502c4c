/// Data models module
///
/// This module defines the records stored in the database: the question bank
/// and its reference data, user accounts, and the session ledger.

mod enums;
pub use enums::{ParseEnumError, StudyMode, UserRole};

mod user;
pub use user::User;

mod entity;
pub use entity::Entity;

mod profile;
pub use profile::Profile;

mod topic;
pub use topic::Topic;

mod material;
pub use material::Material;

mod question;
pub use question::{InvalidQuestion, Question, QuestionDraft};

mod study_session;
pub use study_session::{SessionQuestion, SessionState, StudySession};

mod answer;
pub use answer::Answer;
