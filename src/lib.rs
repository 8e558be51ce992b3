pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod session_gate;
pub mod status;
pub mod study_service;
pub mod sync;
pub mod views;

pub use api::{create_router, AppState};
pub use database::Database;
pub use errors::{ApiError, ErrorBody};
pub use models::{
    EffectiveStatus, Question, QuestionKind, Review, StoredStatus, StudyItem, StudyItemView,
};
pub use study_service::StudyService;
pub use sync::SyncClient;
