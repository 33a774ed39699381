mod adapter;
mod review;
mod state;

// Public API of the lesson player.
pub use adapter::{
    GrammarAdapter, ListeningAdapter, ReadingAdapter, SubmissionAdapter, adapter_for,
};
pub use review::{BlankReview, PairReview, ReviewItem, review_items};
pub use state::{AttemptState, LessonPlayer, SubmitPrompt, SubmitTrigger};
