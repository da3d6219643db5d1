//! `%ENV[NAME]` substitution applied to config text before decoding.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;

use crate::error::{FsOpsError, FsOpsResult};

const ENV_TOKEN: &str = r"%ENV\[(\w+)\]";

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Text preprocessor replacing `%ENV[NAME]` tokens with variable values.
#[derive(Clone)]
pub struct EnvSubstituter {
    pattern: Regex,
    lookup: Lookup,
}

impl fmt::Debug for EnvSubstituter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvSubstituter")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

impl EnvSubstituter {
    /// Substituter backed by the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Pattern`] if the token pattern fails to compile.
    pub fn from_env() -> FsOpsResult<Self> {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Substituter backed by an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Pattern`] if the token pattern fails to compile.
    pub fn with_lookup<F>(lookup: F) -> FsOpsResult<Self>
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        let pattern = Regex::new(ENV_TOKEN).map_err(|source| FsOpsError::Pattern {
            pattern: ENV_TOKEN,
            source,
        })?;
        Ok(Self {
            pattern,
            lookup: Arc::new(lookup),
        })
    }

    /// Replace every token in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::EnvSubstitution`] naming the first undefined variable.
    pub fn substitute(&self, text: &str) -> FsOpsResult<String> {
        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;
        for captures in self.pattern.captures_iter(text) {
            let (Some(token), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let value = (self.lookup)(name.as_str()).ok_or_else(|| {
                FsOpsError::EnvSubstitution {
                    variable: name.as_str().to_string(),
                }
            })?;
            output.push_str(&text[cursor..token.start()]);
            output.push_str(&value);
            cursor = token.end();
        }
        output.push_str(&text[cursor..]);
        Ok(output)
    }

    /// Read `path` as UTF-8 and substitute its contents.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the file cannot be read and
    /// [`FsOpsError::EnvSubstitution`] on undefined variables.
    pub fn substitute_file(&self, path: &Path) -> FsOpsResult<String> {
        let contents = fs::read_to_string(path)
            .map_err(|source| FsOpsError::io("envsubst.read", path, source))?;
        self.substitute(&contents)
    }
}
