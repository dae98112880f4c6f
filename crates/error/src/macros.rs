/// Simplifies creating input errors
///
/// # Example
/// ```
/// # fn check() -> app_error::AppResult<()> {
/// app_error::input_error!("secret", "must not be empty")
/// # }
/// ```
#[macro_export]
macro_rules! input_error {
    ($field:expr, $message:expr) => {
        Err($crate::AppError::invalid_input($field, $message))
    };
}

/// Maps a parse failure of a stored hash to a corrupt hash error, logging the cause
#[macro_export]
macro_rules! corrupt_hash {
    ($result:expr, $context:expr) => {
        $result.map_err(|e| {
            tracing::error!("{}: {}", $context, e);
            $crate::AppError::corrupt_hash(format!("{}: {}", $context, e))
        })
    };
}
