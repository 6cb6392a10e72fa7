use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A catalog item whose competitors are researched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

impl Subject {
    /// Lower-cased title words longer than two characters, used to anchor
    /// keyword windows when sanitizing competitor pages.
    #[must_use]
    pub fn title_tokens(&self) -> Vec<String> {
        self.title
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2)
            .map(str::to_lowercase)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SubjectsFile {
    pub subjects: Vec<Subject>,
}

/// Load and validate the subject catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_subjects(path: &Path) -> Result<SubjectsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SubjectsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let subjects_file: SubjectsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::SubjectsFileParse)?;

    validate_subjects(&subjects_file)?;

    Ok(subjects_file)
}

fn validate_subjects(subjects_file: &SubjectsFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for subject in &subjects_file.subjects {
        if subject.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "subject id must be non-empty".to_string(),
            ));
        }

        if subject.title.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "subject '{}' has an empty title",
                subject.id
            )));
        }

        if !seen_ids.insert(subject.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate subject id: '{}'",
                subject.id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: &str, title: &str) -> Subject {
        Subject {
            id: id.to_string(),
            title: title.to_string(),
            category: None,
            brand: None,
        }
    }

    #[test]
    fn title_tokens_drop_short_words() {
        let s = subject("42", "Wireless Mouse X200 by Acme");
        assert_eq!(s.title_tokens(), vec!["wireless", "mouse", "x200", "acme"]);
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let file = SubjectsFile {
            subjects: vec![subject("1", "Mouse"), subject("1", "Keyboard")],
        };
        let err = validate_subjects(&file).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn validate_rejects_blank_title() {
        let file = SubjectsFile {
            subjects: vec![subject("1", "  ")],
        };
        assert!(validate_subjects(&file).is_err());
    }

    #[test]
    fn yaml_catalog_parses() {
        let yaml = "subjects:\n  - id: \"101\"\n    title: Wireless Mouse X200\n    category: Computer Accessories\n    brand: Acme\n";
        let file: SubjectsFile = serde_yaml::from_str(yaml).unwrap();
        assert!(validate_subjects(&file).is_ok());
        assert_eq!(file.subjects[0].brand.as_deref(), Some("Acme"));
    }

    #[test]
    fn load_subjects_reports_missing_file() {
        let err = load_subjects(Path::new("/nonexistent/subjects.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::SubjectsFileIo { .. }));
    }
}
