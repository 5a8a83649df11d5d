use thiserror::Error;

/// An environment variable required by the application is not set, or is blank.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Blank values count as missing: a credential exported as `""` is never what the
/// caller wants to send upstream. Surrounding whitespace is trimmed.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    get_optional_env_var(name).ok_or_else(|| MissingEnvVarError(name.to_string()))
}

/// Reads an optional environment variable, with the same blank handling as
/// [`get_env_var`].
pub fn get_optional_env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
