use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("invalid input")]
    InvalidInput,
    #[error("target filter error")]
    Filter,
    #[error("count service error")]
    CountService,
    #[error("fleet data error")]
    FleetData,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::InvalidInput => 1001,
            Self::Filter => 1002,
            Self::CountService => 1003,
            Self::FleetData => 1004,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
