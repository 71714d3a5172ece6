/// A convenience `Result` type alias for the crate error type.
pub type Result<T> = std::result::Result<T, crate::Error>;
