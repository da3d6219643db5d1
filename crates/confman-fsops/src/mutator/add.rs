use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{Mutator, generate_file_name, run_operation};
use crate::decode::{decode_sections, select_section};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{ConfigDescriptor, MutationResult};
use crate::registry::{ConfigKind, TickerRule};

/// An existing file that matches the config being added.
struct Duplicate {
    path: PathBuf,
    contents: String,
}

impl Mutator {
    /// Store `payload` as a new config file, or over an equivalent one when
    /// `overwrite` is set.
    ///
    /// The first section whose type is allow-listed (in allow-list order)
    /// decides placement. An existing file in the target directory is a
    /// duplicate when it declares a section with the same name and ticker, or
    /// when its raw or substituted contents equal `payload`.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::MutationFailure`] carrying a decode, validation,
    /// duplicate, safety, or IO error. Nothing is written on failure.
    pub fn add(&self, payload: &str, overwrite: bool) -> MutationResult {
        let descriptor = ConfigDescriptor {
            overwrite,
            ..ConfigDescriptor::default()
        };
        run_operation("add", descriptor, |descriptor| {
            self.add_config(payload, descriptor)
        })
    }

    fn add_config(&self, payload: &str, descriptor: &mut ConfigDescriptor) -> FsOpsResult<String> {
        let sections = decode_sections(payload)?;
        let section = select_section(&sections, &self.include_types).ok_or_else(|| {
            FsOpsError::validation("payload", "no_eligible_section", None)
        })?;
        descriptor.describe_section(section);

        let kind = section.kind();
        descriptor.ticker = section.ticker(kind.map_or(TickerRule::None, |kind| kind.ticker))?;
        let Some(kind) = kind else {
            return Err(FsOpsError::validation(
                "config_type",
                "unknown_root",
                Some(section.config_type().to_string()),
            ));
        };

        let directory = self.target_directory(kind, descriptor.ticker);
        let candidate = directory.join(generate_file_name());
        let root = self.policy.check(&candidate)?;
        fs::create_dir_all(&directory)
            .map_err(|source| FsOpsError::io("add.create_dir", &directory, source))?;
        self.policy.check_resolved(&candidate, root)?;

        let mut message = String::new();
        let target = match self.find_duplicate(&directory, section.name(), descriptor.ticker, payload)? {
            Some(duplicate) if !descriptor.overwrite => {
                descriptor.file_name = Some(duplicate.path.clone());
                return Err(FsOpsError::DuplicateConfig {
                    path: duplicate.path,
                    contents: duplicate.contents,
                });
            }
            Some(duplicate) => {
                let _ = writeln!(
                    message,
                    "Overwriting existing configuration.\nFilename: {}\n{}",
                    duplicate.path.display(),
                    duplicate.contents
                );
                duplicate.path
            }
            None => candidate,
        };

        descriptor.file_name = Some(target.clone());
        fs::write(&target, payload).map_err(|source| FsOpsError::io("add.write", &target, source))?;
        info!(
            path = %target.display(),
            config_type = %descriptor.config_type,
            bytes = payload.len(),
            "stored configuration"
        );
        message.push_str("Successfully updated configuration!");
        Ok(message)
    }

    fn target_directory(&self, kind: &ConfigKind, ticker: Option<u32>) -> PathBuf {
        let root = self.policy.roots().get(kind.root);
        match (kind.ticker, ticker) {
            (TickerRule::Interval { .. }, Some(seconds)) => root.join(seconds.to_string()),
            (TickerRule::Interval { default }, None) => root.join(default.to_string()),
            (TickerRule::None, _) => root.to_path_buf(),
        }
    }

    /// First duplicate among the regular files of `directory`, in name order.
    fn find_duplicate(
        &self,
        directory: &Path,
        name: &str,
        ticker: Option<u32>,
        payload: &str,
    ) -> FsOpsResult<Option<Duplicate>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(directory)
            .map_err(|source| FsOpsError::io("add.scan", directory, source))?
        {
            let entry = entry.map_err(|source| FsOpsError::io("add.scan", directory, source))?;
            let is_file = entry
                .file_type()
                .map_err(|source| FsOpsError::io("add.scan", entry.path(), source))?
                .is_file();
            if is_file {
                files.push(entry.path());
            }
        }
        files.sort();

        for path in files {
            let raw = fs::read(&path).map_err(|source| FsOpsError::io("add.read", &path, source))?;
            let substituted = self.substitute_existing(&path, &raw);
            let identical =
                raw == payload.as_bytes() || substituted.as_deref() == Some(payload);
            let same_identity = substituted
                .as_deref()
                .is_some_and(|text| declares_section(&path, text, name, ticker));

            if identical || same_identity {
                let contents =
                    substituted.unwrap_or_else(|| String::from_utf8_lossy(&raw).into_owned());
                return Ok(Some(Duplicate { path, contents }));
            }
        }
        Ok(None)
    }

    fn substitute_existing(&self, path: &Path, raw: &[u8]) -> Option<String> {
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "existing config is not UTF-8");
                return None;
            }
        };
        match self.env.substitute(text) {
            Ok(text) => Some(text),
            Err(err) => {
                debug!(path = %path.display(), error = %err.report(), "existing config substitution failed");
                None
            }
        }
    }
}

/// Whether `text` declares a section called `name` at the same ticker.
fn declares_section(path: &Path, text: &str, name: &str, ticker: Option<u32>) -> bool {
    match decode_sections(text) {
        Ok(sections) => sections
            .iter()
            .any(|section| section.name() == name && section.own_ticker().ok().flatten() == ticker),
        Err(err) => {
            debug!(path = %path.display(), error = %err.report(), "existing config failed to decode");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envsubst::EnvSubstituter;
    use anyhow::Result;
    use confman_config::{ManagedRoot, ManagerConfig};
    use confman_events::Status;
    use tempfile::TempDir;

    fn mutator(temp: &TempDir) -> Result<Mutator> {
        let settings = ManagerConfig {
            share_dir: temp.path().to_path_buf(),
            ..ManagerConfig::default()
        }
        .resolve()?;
        let env = EnvSubstituter::with_lookup(|name| (name == "PORT").then(|| "8080".to_string()))?;
        Ok(Mutator::with_substituter(&settings, env))
    }

    fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            files.push(entry?.path());
        }
        files.sort();
        Ok(files)
    }

    const UPTIME: &str = "[uptime]\ntype = \"ProcessInput\"\nticker_interval = 30\ncommand = \"uptime\"\n";

    #[test]
    fn process_config_lands_in_ticker_directory() -> Result<()> {
        let temp = TempDir::new()?;
        let mutator = mutator(&temp)?;
        let outcome = mutator.add(UPTIME, false).map_err(|failure| failure.error)?;

        let ticker_dir = mutator.policy().roots().get(ManagedRoot::Process).join("30");
        let files = files_in(&ticker_dir)?;
        assert_eq!(files.len(), 1);
        assert_eq!(outcome.descriptor.file_name.as_ref(), Some(&files[0]));
        assert_eq!(outcome.descriptor.ticker, Some(30));
        assert_eq!(outcome.descriptor.config_type, "ProcessInput");
        assert_eq!(outcome.descriptor.status, Status::Ok);
        assert_eq!(outcome.message, "Successfully updated configuration!");
        assert_eq!(fs::read_to_string(&files[0])?, UPTIME);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_ticker_directory_is_refused() -> Result<()> {
        let temp = TempDir::new()?;
        let outside = TempDir::new()?;
        let mutator = mutator(&temp)?;
        let process = mutator.policy().roots().get(ManagedRoot::Process).to_path_buf();
        fs::create_dir_all(&process)?;
        std::os::unix::fs::symlink(outside.path(), process.join("30"))?;

        let Err(failure) = mutator.add(UPTIME, false) else {
            anyhow::bail!("expected safety violation");
        };
        assert!(matches!(failure.error, FsOpsError::SafetyViolation { .. }));
        assert!(files_in(outside.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn default_ticker_is_fifteen() -> Result<()> {
        let temp = TempDir::new()?;
        let mutator = mutator(&temp)?;
        let outcome = mutator
            .add("[load]\ntype = \"ProcessInput\"\n", false)
            .map_err(|failure| failure.error)?;
        assert_eq!(outcome.descriptor.ticker, Some(15));
        let parent = outcome
            .descriptor
            .file_name
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        assert_eq!(
            parent,
            Some(mutator.policy().roots().get(ManagedRoot::Process).join("15"))
        );
        Ok(())
    }

    #[test]
    fn duplicate_name_and_ticker_is_rejected_without_writing() -> Result<()> {
        let temp = TempDir::new()?;
        let mutator = mutator(&temp)?;
        let first = mutator.add(UPTIME, false).map_err(|failure| failure.error)?;
        let original = first.descriptor.file_name.clone().unwrap_or_default();

        let changed = UPTIME.replace("uptime\"\n", "w\"\n");
        let Err(failure) = mutator.add(&changed, false) else {
            anyhow::bail!("expected duplicate failure");
        };
        assert!(matches!(failure.error, FsOpsError::DuplicateConfig { .. }));
        assert_eq!(failure.descriptor.status, Status::Error);
        assert_eq!(failure.descriptor.file_name.as_ref(), Some(&original));
        assert!(failure.report().contains(&original.display().to_string()));
        assert_eq!(fs::read_to_string(&original)?, UPTIME);
        assert_eq!(files_in(original.parent().unwrap_or(temp.path()))?.len(), 1);
        Ok(())
    }

    #[test]
    fn same_name_at_other_ticker_is_not_a_duplicate() -> Result<()> {
        let temp = TempDir::new()?;
        let mutator = mutator(&temp)?;
        mutator.add(UPTIME, false).map_err(|failure| failure.error)?;
        let other = UPTIME.replace("= 30", "= 60");
        let outcome = mutator.add(&other, false).map_err(|failure| failure.error)?;
        assert_eq!(outcome.descriptor.ticker, Some(60));
        Ok(())
    }

    #[test]
    fn overwrite_replaces_only_the_duplicate() -> Result<()> {
        let temp = TempDir::new()?;
        let mutator = mutator(&temp)?;
        let http = "[web]\ntype = \"HttpInput\"\naddress = \":80\"\n";
        let other = "[admin]\ntype = \"HttpInput\"\naddress = \":81\"\n";
        let first = mutator.add(http, false).map_err(|failure| failure.error)?;
        let sibling = mutator.add(other, false).map_err(|failure| failure.error)?;

        let replacement = "[web]\ntype = \"HttpInput\"\naddress = \":8080\"\n";
        let outcome = mutator
            .add(replacement, true)
            .map_err(|failure| failure.error)?;

        assert_eq!(outcome.descriptor.file_name, first.descriptor.file_name);
        assert!(outcome.message.starts_with("Overwriting existing configuration."));
        assert!(outcome.message.ends_with("Successfully updated configuration!"));
        let first_path = first.descriptor.file_name.unwrap_or_default();
        let sibling_path = sibling.descriptor.file_name.unwrap_or_default();
        assert_eq!(fs::read_to_string(first_path)?, replacement);
        assert_eq!(fs::read_to_string(sibling_path)?, other);
        Ok(())
    }

    #[test]
    fn substituted_contents_count_as_identical() -> Result<()> {
        let temp = TempDir::new()?;
        let mutator = mutator(&temp)?;
        let http_dir = mutator.policy().roots().get(ManagedRoot::Http).to_path_buf();
        fs::create_dir_all(&http_dir)?;
        fs::write(
            http_dir.join("operator.toml"),
            "[site]\ntype = \"HttpInput\"\nport = %ENV[PORT]\n",
        )?;

        let result = mutator.add("[site2]\ntype = \"HttpInput\"\nport = 8080\n", false);
        assert!(result.is_ok());
        let identical = mutator.add("[site]\ntype = \"HttpInput\"\nport = 8080\n", false);
        assert!(matches!(
            identical,
            Err(ref failure) if matches!(failure.error, FsOpsError::DuplicateConfig { .. })
        ));
        Ok(())
    }

    #[test]
    fn undecodable_neighbours_only_match_on_bytes() -> Result<()> {
        let temp = TempDir::new()?;
        let mutator = mutator(&temp)?;
        let http_dir = mutator.policy().roots().get(ManagedRoot::Http).to_path_buf();
        fs::create_dir_all(&http_dir)?;
        fs::write(http_dir.join("broken.toml"), "[web\n")?;

        let outcome = mutator
            .add("[web]\ntype = \"HttpInput\"\n", false)
            .map_err(|failure| failure.error)?;
        assert_eq!(outcome.descriptor.status, Status::Ok);
        assert_eq!(files_in(&http_dir)?.len(), 2);
        Ok(())
    }

    #[test]
    fn ineligible_and_unplaceable_payloads_fail() -> Result<()> {
        let temp = TempDir::new()?;
        let mutator = mutator(&temp)?;

        let Err(none) = mutator.add("[json]\ntype = \"JsonDecoder\"\n", false) else {
            anyhow::bail!("expected validation failure");
        };
        assert!(matches!(
            none.error,
            FsOpsError::Validation {
                reason: "no_eligible_section",
                ..
            }
        ));

        let Err(malformed) = mutator.add("[unterminated", false) else {
            anyhow::bail!("expected decode failure");
        };
        assert!(matches!(malformed.error, FsOpsError::Decode { .. }));
        assert!(!temp.path().join("processes.d").exists());
        Ok(())
    }

    #[test]
    fn allow_listed_type_without_root_cannot_be_placed() -> Result<()> {
        let temp = TempDir::new()?;
        let settings = ManagerConfig {
            share_dir: temp.path().to_path_buf(),
            include_types: vec!["TcpInput".to_string()],
            ..ManagerConfig::default()
        }
        .resolve()?;
        let mutator = Mutator::with_substituter(&settings, EnvSubstituter::with_lookup(|_| None)?);
        let Err(failure) = mutator.add("[tcp]\ntype = \"TcpInput\"\n", false) else {
            anyhow::bail!("expected unknown root");
        };
        assert_eq!(
            failure.report(),
            "Unable to determine configuration directory."
        );
        assert_eq!(failure.descriptor.config_type, "TcpInput");
        Ok(())
    }

    #[test]
    fn excluded_target_directory_is_refused() -> Result<()> {
        let temp = TempDir::new()?;
        let settings = ManagerConfig {
            share_dir: temp.path().to_path_buf(),
            exclude_paths: vec![temp.path().join("processes.d").join("30")],
            ..ManagerConfig::default()
        }
        .resolve()?;
        let mutator = Mutator::with_substituter(&settings, EnvSubstituter::with_lookup(|_| None)?);
        let Err(failure) = mutator.add(UPTIME, false) else {
            anyhow::bail!("expected safety violation");
        };
        assert!(matches!(failure.error, FsOpsError::SafetyViolation { .. }));
        assert!(!temp.path().join("processes.d").join("30").exists());
        Ok(())
    }
}
