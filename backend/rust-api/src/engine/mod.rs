//! Multi-student game session engine.
//!
//! Everything in here is synchronous state plus two async seams
//! (`ContentSource`, `ResultSink`) and an injectable clock.

pub mod clock;
pub mod distributor;
pub mod error;
pub mod ports;
pub mod save;
pub mod sequencing;
pub mod session;
pub mod spinner;
pub mod store;
pub mod tracker;
pub mod turns;
pub mod types;

pub use clock::{Clock, ManualClock, RandomSource, SeededRandom, SystemClock, ThreadRandom};
pub use error::{EngineError, EngineResult};
pub use ports::{ContentQuery, ContentSource, ResultSink, ResultSubmission};
pub use save::{ParticipantBatch, SaveBatchStatus, SaveMode, SaveOutcome};
pub use session::{
    AttemptFeedback, AttemptOutcome, EngineTimings, GameSession, Phase, SessionSetup, SessionView,
};
pub use spinner::{SpinOutcome, SpinResolution};
pub use store::{
    InMemorySelectionBackend, RedisSelectionBackend, SelectionBackend, SessionSelection,
    SessionStore,
};
pub use types::{AnswerRepresentation, ExerciseItem, ExerciseType, GameKind, ParticipantTuple};
