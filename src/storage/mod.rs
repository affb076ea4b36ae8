pub mod run_log;

pub use run_log::{
    CandidateRecord, FsRunLog, MemoryRunLog, OutcomeRecord, RunRecord, RunSink, StepRecord,
    WinnerRecord, proxy_score,
};
