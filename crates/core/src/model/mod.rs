mod answer;
mod ids;
mod lesson;
mod level;
mod page;
mod question;
mod result;
mod role;
mod session;
mod topic;
mod user;

pub use ids::{LessonId, ParseIdError, QuestionId, TopicId, UserId};

pub use answer::{Answer, AnswerError, AnswerSheet, AnswerShape};
pub use lesson::{Lesson, LessonContent, ordered as ordered_lessons};
pub use level::{LevelParseError, ProficiencyLevel};
pub use page::{MAX_PAGE_SIZE, Page, PageError, PageRequest};
pub use question::{
    ChoiceOption, GroupedQuestions, MAX_BLANKS, Question, QuestionGroup, QuestionKind,
    QuestionKindParseError, count_blank_markers,
};
pub use result::{
    CorrectAnswer, MergeReport, QuestionResult, QuestionReview, SubmissionOutcome, merge_results,
};
pub use role::{Role, RoleParseError};
pub use session::Session;
pub use topic::{SkillModule, Topic, visible_topics};
pub use user::UserProfile;
