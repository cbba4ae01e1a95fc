#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    #[error("max_retx_attempts must be greater than zero")]
    ZeroRetxAttempts,
}
