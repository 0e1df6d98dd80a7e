//! Line protocol spoken by the embedded coordination service.
//!
//! One request per line, one response line per request:
//!
//! | request                 | response                              |
//! |-------------------------|---------------------------------------|
//! | `ruok`                  | `imok`                                |
//! | `stat`                  | `ok nodes=<n> connections=<m>`        |
//! | `create <path> [data]`  | `ok` / `err exists`                   |
//! | `set <path> [data]`     | `ok`                                  |
//! | `get <path>`            | `ok <data>` / `err nonode`            |
//! | `delete <path>`         | `ok` / `err nonode`                   |
//! | `ls <prefix>`           | `ok <path>,<path>,...`                |

use std::fmt;
use std::str::FromStr;

use crate::CoordinationError;

pub(crate) const ERR_EXISTS: &str = "exists";
pub(crate) const ERR_NO_NODE: &str = "nonode";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Ruok,
    Stat,
    Create { path: String, data: String },
    Set { path: String, data: String },
    Get { path: String },
    Delete { path: String },
    List { prefix: String },
}

impl Request {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Request::Create { .. } | Request::Set { .. } | Request::Delete { .. })
    }

    /// Rejects requests that cannot be framed as a single line.
    pub fn validate(&self) -> Result<(), CoordinationError> {
        match self {
            Request::Create { path, data } | Request::Set { path, data } => {
                validate_path(path)?;
                if data.contains(['\n', '\r']) {
                    return Err(CoordinationError::Protocol(format!(
                        "data for {path} must not contain line breaks"
                    )));
                }
                Ok(())
            }
            Request::Get { path } | Request::Delete { path } => validate_path(path),
            Request::List { prefix } => validate_path(prefix),
            Request::Ruok | Request::Stat => Ok(()),
        }
    }
}

fn validate_path(path: &str) -> Result<(), CoordinationError> {
    if !path.starts_with('/') || path.chars().any(char::is_whitespace) {
        return Err(CoordinationError::Protocol(format!(
            "path {path:?} must start with '/' and contain no whitespace"
        )));
    }
    Ok(())
}

impl fmt::Display for Request {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Request::Ruok => write!(f, "ruok"),
            Request::Stat => write!(f, "stat"),
            Request::Create { path, data } => write!(f, "create {path} {data}"),
            Request::Set { path, data } => write!(f, "set {path} {data}"),
            Request::Get { path } => write!(f, "get {path}"),
            Request::Delete { path } => write!(f, "delete {path}"),
            Request::List { prefix } => write!(f, "ls {prefix}"),
        }
    }
}

impl FromStr for Request {
    type Err = CoordinationError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.trim_end_matches(['\r', '\n']).splitn(3, ' ');
        let command = parts.next().unwrap_or_default();
        let path = parts.next().map(str::to_string);
        let data = parts.next().unwrap_or_default().to_string();

        let need_path = |path: Option<String>| {
            path.filter(|p| !p.is_empty())
                .ok_or_else(|| CoordinationError::Protocol(format!("{command} needs a path")))
        };

        let request = match command {
            "ruok" => Request::Ruok,
            "stat" => Request::Stat,
            "create" => Request::Create {
                path: need_path(path)?,
                data,
            },
            "set" => Request::Set {
                path: need_path(path)?,
                data,
            },
            "get" => Request::Get {
                path: need_path(path)?,
            },
            "delete" => Request::Delete {
                path: need_path(path)?,
            },
            "ls" => Request::List {
                prefix: path.filter(|p| !p.is_empty()).unwrap_or_else(|| "/".to_string()),
            },
            other => {
                return Err(CoordinationError::Protocol(format!("unknown command {other:?}")))
            }
        };
        request.validate()?;
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Imok,
    Ok(String),
    Error(String),
}

impl fmt::Display for Response {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Response::Imok => write!(f, "imok"),
            Response::Ok(payload) if payload.is_empty() => write!(f, "ok"),
            Response::Ok(payload) => write!(f, "ok {payload}"),
            Response::Error(message) => write!(f, "err {message}"),
        }
    }
}

impl FromStr for Response {
    type Err = CoordinationError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == "imok" {
            return Ok(Response::Imok);
        }
        if line == "ok" {
            return Ok(Response::Ok(String::new()));
        }
        if let Some(payload) = line.strip_prefix("ok ") {
            return Ok(Response::Ok(payload.to_string()));
        }
        if let Some(message) = line.strip_prefix("err ") {
            return Ok(Response::Error(message.to_string()));
        }
        Err(CoordinationError::Protocol(format!("unexpected response {line:?}")))
    }
}
