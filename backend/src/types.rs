use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type UserId = String;

/// Tables this subsystem reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Projects,
    ErrorLogs,
    Notifications,
}

impl Table {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Table::Projects => "projects",
            Table::ErrorLogs => "error_logs",
            Table::Notifications => "notifications",
        }
    }
}

/// A row of the `projects` table.
///
/// `external_connection` is the only signal that a project is linked to a
/// partner system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub external_connection: Option<String>,
    pub user_id: UserId,
}

impl Project {
    pub fn is_linked(&self) -> bool {
        self.external_connection.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub external_connection: Option<String>,
    pub user_id: UserId,
}

/// The only columns a reconnect touches.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectLink {
    pub external_connection: Option<String>,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub name: String,
    pub stack: Option<String>,
}

impl ErrorDetail {
    /// Captures an error and its source chain. `name` is the error kind.
    pub fn capture(name: &str, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        ErrorDetail {
            message: error.to_string(),
            name: name.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }
}

/// Append-only diagnostic row in `error_logs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(thiserror::Error, Debug)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_capture_walks_source_chain() {
        let err = Outer(std::io::Error::other("connection reset"));
        let detail = ErrorDetail::capture("Outer", &err);
        assert_eq!(detail.message, "outer failure");
        assert_eq!(detail.name, "Outer");
        assert_eq!(detail.stack.as_deref(), Some("caused by: connection reset"));

        let flat = ErrorDetail::capture("Io", &std::io::Error::other("boom"));
        assert_eq!(flat.stack, None);
    }

    #[test]
    fn test_error_log_serializes_type_tag() {
        let entry = ErrorLogEntry {
            kind: "onemil_webhook".into(),
            payload: serde_json::json!({"sender": "a"}),
            error: ErrorDetail {
                message: "m".into(),
                name: "n".into(),
                stack: None,
            },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "onemil_webhook");
        assert_eq!(value["payload"]["sender"], "a");
    }
}
