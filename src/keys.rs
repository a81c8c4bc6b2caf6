//! Deploy key resolution.
//!
//! The deployment's SSH key pair can be supplied inline (typically from a
//! mounted secret exposed as an environment variable) or as file paths.
//! This module centralises the branching and file loading so the driver and
//! CLI resolve keys the same way.

use std::fmt;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Errors raised while resolving deploy keys.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum KeyError {
    /// Raised when both inline and file sources are provided.
    #[error("{key} cannot be provided both inline and via file")]
    BothProvided {
        /// Key being resolved.
        key: String,
    },
    /// Raised when neither source is provided.
    #[error("{key} is required")]
    Missing {
        /// Key being resolved.
        key: String,
    },
    /// Raised when the resolved key is empty or only whitespace.
    #[error("{key} must not be empty")]
    Empty {
        /// Key being resolved.
        key: String,
    },
    /// Raised when reading the key file fails.
    #[error("failed to read {key} file `{path}`: {message}")]
    FileRead {
        /// Key being resolved.
        key: String,
        /// Expanded path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// SSH key pair authorised on every server this deployment provisions.
#[derive(Clone, Eq, PartialEq)]
pub struct DeployKeys {
    public_key: String,
    private_key: String,
}

impl DeployKeys {
    /// Builds a key pair, rejecting blank keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Empty`] when either key is blank.
    pub fn new(
        public_key: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let public = public_key.into();
        let private = private_key.into();
        require_content("public key", &public)?;
        require_content("private key", &private)?;
        Ok(Self {
            public_key: public,
            private_key: private,
        })
    }

    /// Returns the OpenSSH encoded public key.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Returns the encoded private key.
    #[must_use]
    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl fmt::Debug for DeployKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployKeys")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Resolves a key from either an inline value or a file.
///
/// Inline and file sources are mutually exclusive and exactly one must be
/// set. The returned key preserves the original content.
///
/// # Errors
///
/// Returns [`KeyError`] when the inputs are invalid or the file cannot be
/// read.
pub fn resolve_key(key: &str, inline: Option<&str>, file: Option<&str>) -> Result<String, KeyError> {
    match (inline, file) {
        (Some(_), Some(_)) => Err(KeyError::BothProvided {
            key: key.to_owned(),
        }),
        (None, None) => Err(KeyError::Missing {
            key: key.to_owned(),
        }),
        (Some(value), None) => {
            require_content(key, value)?;
            Ok(value.to_owned())
        }
        (None, Some(path)) => {
            let expanded = expand_tilde(path.trim());
            let content =
                read_to_string_ambient(&expanded).map_err(|message| KeyError::FileRead {
                    key: key.to_owned(),
                    path: expanded.clone(),
                    message,
                })?;
            require_content(key, &content)?;
            Ok(content)
        }
    }
}

/// Expands a leading `~/` prefix to the user's home directory.
///
/// If `HOME` is not set the input is returned unchanged.
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

fn require_content(key: &str, value: &str) -> Result<(), KeyError> {
    if value.trim().is_empty() {
        return Err(KeyError::Empty {
            key: key.to_owned(),
        });
    }
    Ok(())
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}
