use serde::Serialize;

use crate::structs::ImageFile;

/// Largest payload the backend accepts, 10 MiB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Checks the declared type and size of a file before it is submitted.
///
/// Every rule is evaluated, so the outcome lists all the problems at once.
pub fn validate(file: &ImageFile) -> ValidationOutcome {
    let mut errors = Vec::new();

    if !ALLOWED_TYPES.contains(&file.mime.as_str()) {
        errors.push(format!(
            "Invalid file type {}. Only {} are allowed",
            file.mime,
            ALLOWED_TYPES.join(", ")
        ));
    }

    if file.len() > MAX_FILE_SIZE {
        errors.push("The file is too large, the maximum size is 10MB".to_string());
    }

    if file.is_empty() {
        errors.push("The file is empty".to_string());
    }

    ValidationOutcome {
        valid: errors.is_empty(),
        errors,
    }
}
