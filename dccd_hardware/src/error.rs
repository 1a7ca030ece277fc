use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HwError {
    #[error("coil sensor timeout")]
    Timeout,
    #[error("pwm driver error: {0}")]
    Driver(String),
    #[error("duty {duty} exceeds full scale {full_scale}")]
    DutyOutOfRange { duty: u16, full_scale: u16 },
}

pub type Result<T> = std::result::Result<T, HwError>;
