use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("packet shorter than minimal frame")]
    PacketTooShort,

    #[error("packet length does not match LEN field")]
    PacketLengthMismatch,

    #[error("CRC mismatch")]
    CrcMismatch,

    #[error("message payload shorter than header")]
    MessageTooShort,

    #[error("message length does not match LEN field")]
    MessageLengthMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModemError>;
