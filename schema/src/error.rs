/// A request payload that cannot become an entity.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    /// Missing field, wrong type, unknown field or a value outside an enum's set
    #[error("{}", located(.path, .message))]
    Payload { path: String, message: String },
    /// Range constraints
    #[error("{0}")]
    Constraint(#[from] validator::ValidationErrors),
    #[error("{0}")]
    Body(String),
}

impl ValidationError {
    /// Names of the offending fields, as far as they can be determined.
    pub fn fields(&self) -> Vec<String> {
        match self {
            ValidationError::Payload { path, message } => {
                // Missing fields are reported against the parent object
                match (missing_field(message), path.as_str()) {
                    (Some(field), ".") => vec![field.to_string()],
                    (Some(field), parent) => vec![format!("{parent}.{field}")],
                    (None, ".") => vec![],
                    (None, path) => vec![path.to_string()],
                }
            }
            ValidationError::Constraint(errors) => {
                let mut fields: Vec<String> = errors.errors().keys().map(|k| k.to_string()).collect();
                fields.sort();
                fields
            }
            ValidationError::Body(_) => vec![],
        }
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for ValidationError {
    fn from(error: serde_path_to_error::Error<serde_json::Error>) -> Self {
        ValidationError::Payload {
            path: error.path().to_string(),
            message: error.inner().to_string(),
        }
    }
}

fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next()
}

fn located(path: &str, message: &str) -> String {
    match path {
        "." => message.to_string(),
        path => format!("{path}: {message}"),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("database not initialized")]
    Unavailable,
    #[error("entity does not serialize to a document")]
    NotADocument,
    // Froms
    #[error("{0}")]
    MongoDB(#[from] mongodb::error::Error),
    #[error("{0}")]
    BsonSerialization(#[from] mongodb::bson::ser::Error),
    #[error("{0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(path: &str, message: &str) -> ValidationError {
        ValidationError::Payload {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn root_errors_have_no_path_prefix() {
        let err = payload(".", "missing field `student_id`");
        assert_eq!(err.to_string(), "missing field `student_id`");
        assert_eq!(err.fields(), vec!["student_id".to_string()]);
    }

    #[test]
    fn nested_errors_keep_their_path() {
        let err = payload("questions[1]", "missing field `qtype`");
        assert_eq!(err.to_string(), "questions[1]: missing field `qtype`");
        assert_eq!(err.fields(), vec!["questions[1].qtype".to_string()]);
    }

    #[test]
    fn unknown_field_is_named_once() {
        let err = payload("questions[0].extra", "unknown field `extra`, expected one of `title`");
        assert_eq!(err.fields(), vec!["questions[0].extra".to_string()]);
    }
}
