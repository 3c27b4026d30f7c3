//! ca-case: analysis case files, signal files and validation.

pub mod schema;
pub mod signals;
pub mod validate;

pub use schema::*;
pub use signals::{SignalFile, SignalTrace};
pub use validate::{ValidationError, validate_case, validate_signal_file};

pub const LATEST_VERSION: u32 = 1;

pub type CaseResult<T> = Result<T, CaseError>;

#[derive(thiserror::Error, Debug)]
pub enum CaseError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &std::path::Path) -> CaseResult<CaseConfig> {
    let content = std::fs::read_to_string(path)?;
    let case: CaseConfig = serde_yaml::from_str(&content)?;
    validate_case(&case)?;
    Ok(case)
}

pub fn save_yaml(path: &std::path::Path, case: &CaseConfig) -> CaseResult<()> {
    validate_case(case)?;
    let content = serde_yaml::to_string(case)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> CaseResult<CaseConfig> {
    let content = std::fs::read_to_string(path)?;
    let case: CaseConfig = serde_json::from_str(&content)?;
    validate_case(&case)?;
    Ok(case)
}

pub fn save_json(path: &std::path::Path, case: &CaseConfig) -> CaseResult<()> {
    validate_case(case)?;
    let content = serde_json::to_string_pretty(case)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a case by extension: `.json` is JSON, anything else YAML.
pub fn load_case(path: &std::path::Path) -> CaseResult<CaseConfig> {
    if path.extension().is_some_and(|e| e == "json") {
        load_json(path)
    } else {
        load_yaml(path)
    }
}

/// Load a signal file by extension: `.json` is JSON, anything else YAML.
pub fn load_signals(path: &std::path::Path) -> CaseResult<SignalFile> {
    let content = std::fs::read_to_string(path)?;
    let file: SignalFile = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    validate_signal_file(&file)?;
    Ok(file)
}

pub fn save_signals(path: &std::path::Path, file: &SignalFile) -> CaseResult<()> {
    validate_signal_file(file)?;
    let content = if path.extension().is_some_and(|e| e == "json") {
        serde_json::to_string_pretty(file)?
    } else {
        serde_yaml::to_string(file)?
    };
    std::fs::write(path, content)?;
    Ok(())
}
