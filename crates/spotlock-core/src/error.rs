use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotLockError {
    #[error("no peak found above threshold")]
    NoPeakFound,

    #[error("correlation fit did not converge (status {status})")]
    ConvergenceFailure { status: i32 },
}

pub type Result<T> = std::result::Result<T, SpotLockError>;
