use std::time::Duration;

use crate::config::PasteConfig;
use crate::error::ApiError;
use crate::models::PasteFile;

const MAX_FILE_NAME_CHARS: usize = 255;
const MAX_SYNTAX_HINT_CHARS: usize = 64;

/// Validates paste input against the configured limits before anything
/// touches the store.
pub struct PasteValidator {
    limits: PasteConfig,
}

impl PasteValidator {
    pub fn new(limits: PasteConfig) -> Self {
        Self { limits }
    }

    /// Total serialized content size across all files.
    pub fn total_size(files: &[PasteFile]) -> u64 {
        files
            .iter()
            .map(|f| (f.name.len() + f.content.len()) as u64)
            .sum()
    }

    pub fn validate_files(&self, files: &[PasteFile]) -> Result<(), ApiError> {
        if files.is_empty() {
            return Err(ApiError::Validation(
                "a paste must contain at least one file".to_string(),
            ));
        }

        if files.len() > self.limits.max_files {
            return Err(ApiError::Validation(format!(
                "a paste may contain at most {} files",
                self.limits.max_files
            )));
        }

        for (index, file) in files.iter().enumerate() {
            if file.name.trim().is_empty() {
                return Err(ApiError::Validation(format!(
                    "file {index} has an empty name"
                )));
            }
            if file.name.chars().count() > MAX_FILE_NAME_CHARS {
                return Err(ApiError::Validation(format!(
                    "file name '{}…' exceeds {MAX_FILE_NAME_CHARS} characters",
                    file.name.chars().take(16).collect::<String>()
                )));
            }
            if file.name.chars().any(|c| c.is_control()) {
                return Err(ApiError::Validation(format!(
                    "file {index} name contains control characters"
                )));
            }
            if let Some(hint) = &file.syntax_hint {
                if hint.chars().count() > MAX_SYNTAX_HINT_CHARS {
                    return Err(ApiError::Validation(format!(
                        "file {index} syntax hint exceeds {MAX_SYNTAX_HINT_CHARS} characters"
                    )));
                }
            }
        }

        let total = Self::total_size(files);
        if total > self.limits.max_paste_bytes as u64 {
            return Err(ApiError::Validation(format!(
                "paste size {total} exceeds the maximum of {} bytes",
                self.limits.max_paste_bytes
            )));
        }

        Ok(())
    }

    /// Resolve the effective TTL: the requested one (bounded by max_ttl)
    /// or the configured default.
    pub fn resolve_ttl(&self, requested_secs: Option<u64>) -> Result<Option<Duration>, ApiError> {
        let requested = match requested_secs {
            Some(0) => {
                return Err(ApiError::Validation(
                    "ttl_secs must be greater than 0".to_string(),
                ))
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => self.limits.default_ttl,
        };

        if let (Some(ttl), Some(max)) = (requested, self.limits.max_ttl) {
            if ttl > max {
                return Err(ApiError::Validation(format!(
                    "requested ttl exceeds the maximum of {} seconds",
                    max.as_secs()
                )));
            }
        }

        Ok(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(max_files: usize, max_bytes: usize) -> PasteValidator {
        PasteValidator::new(PasteConfig {
            max_files,
            max_paste_bytes: max_bytes,
            ..Default::default()
        })
    }

    fn file(name: &str, content: &str) -> PasteFile {
        PasteFile {
            name: name.to_string(),
            content: content.to_string(),
            syntax_hint: None,
        }
    }

    #[test]
    fn test_rejects_empty_file_list() {
        assert!(validator(4, 1024).validate_files(&[]).is_err());
    }

    #[test]
    fn test_rejects_too_many_files() {
        let files = vec![file("a", "x"), file("b", "x"), file("c", "x")];
        assert!(validator(2, 1024).validate_files(&files).is_err());
    }

    #[test]
    fn test_rejects_oversized_paste() {
        let files = vec![file("a.txt", &"x".repeat(100))];
        assert!(validator(4, 50).validate_files(&files).is_err());
        assert!(validator(4, 200).validate_files(&files).is_ok());
    }

    #[test]
    fn test_rejects_blank_file_name() {
        assert!(validator(4, 1024).validate_files(&[file("  ", "x")]).is_err());
    }

    #[test]
    fn test_ttl_defaults_and_bounds() {
        let mut limits = PasteConfig::default();
        limits.default_ttl = Some(Duration::from_secs(600));
        limits.max_ttl = Some(Duration::from_secs(3600));
        let validator = PasteValidator::new(limits);

        assert_eq!(
            validator.resolve_ttl(None).unwrap(),
            Some(Duration::from_secs(600))
        );
        assert_eq!(
            validator.resolve_ttl(Some(1800)).unwrap(),
            Some(Duration::from_secs(1800))
        );
        assert!(validator.resolve_ttl(Some(7200)).is_err());
        assert!(validator.resolve_ttl(Some(0)).is_err());
    }

    #[test]
    fn test_ttl_unlimited_when_unconfigured() {
        let validator = PasteValidator::new(PasteConfig::default());
        assert_eq!(validator.resolve_ttl(None).unwrap(), None);
        assert_eq!(
            validator.resolve_ttl(Some(86_400)).unwrap(),
            Some(Duration::from_secs(86_400))
        );
    }
}
