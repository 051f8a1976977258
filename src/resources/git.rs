//! Repository cloning with `git2`.
use git2::{Cred, CredentialType, ErrorClass, FetchOptions, RemoteCallbacks, build::RepoBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::GitCloner;
use super::fs::remove_path;
use crate::error::CollaboratorError;
use crate::logging::Log;
use crate::retry::{RetryPolicy, retry};

/// [`GitCloner`] backed by libgit2, retried with a [`RetryPolicy`].
pub struct Git2Cloner {
    retry: RetryPolicy,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for Git2Cloner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git2Cloner")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Git2Cloner {
    /// Cloner retrying with `retry`.
    #[must_use]
    pub fn new(retry: RetryPolicy, log: Arc<dyn Log>) -> Self {
        Self { retry, log }
    }
}

impl GitCloner for Git2Cloner {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), CollaboratorError> {
        if dest.exists() {
            return Err(CollaboratorError::Git(format!(
                "destination {} already exists",
                dest.display()
            )));
        }
        retry(
            &self.retry,
            |_| {
                clone_once(url, dest).inspect_err(|_| {
                    let _ = remove_path(dest);
                })
            },
            |attempt, e| {
                self.log
                    .warn(&format!("clone attempt {attempt} failed, retrying: {e}"));
            },
        )?;
        self.log.debug(&format!("cloned {url} into {}", dest.display()));
        Ok(())
    }
}

fn clone_once(url: &str, dest: &Path) -> Result<(), CollaboratorError> {
    let mut callbacks = RemoteCallbacks::new();
    setup_auth_callbacks(&mut callbacks);
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);

    let is_local = url.starts_with("file://") || Path::new(url).is_absolute();
    if !is_local {
        fetch_options.depth(1);
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);
    builder
        .clone(url, dest)
        .map(|_| ())
        .map_err(|e| CollaboratorError::Git(format!("{url}: {}", interpret_git_error(&e))))
}

/// Turn a libgit2 error into a short operator-facing reason.
fn interpret_git_error(err: &git2::Error) -> String {
    let message = err.message().to_lowercase();
    if message.contains("not found") || message.contains("404") {
        "repository not found".to_string()
    } else if message.contains("authentication") || message.contains("credentials") {
        "authentication failed".to_string()
    } else if message.contains("connection")
        || message.contains("network")
        || message.contains("timed out")
    {
        format!("network error: {}", err.message())
    } else if err.class() == ErrorClass::Ssh {
        format!("SSH error: {}", err.message())
    } else {
        err.message().to_string()
    }
}

/// SSH agent, default SSH keys, then git credential helpers.
fn setup_auth_callbacks(callbacks: &mut RemoteCallbacks<'_>) {
    callbacks.credentials(|url, username_from_url, allowed_types| {
        if allowed_types.contains(CredentialType::DEFAULT) {
            return Cred::default();
        }
        if allowed_types.contains(CredentialType::SSH_KEY)
            && let Some(username) = username_from_url
        {
            if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                return Ok(cred);
            }
            let ssh_dir = std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(".ssh");
            for key_name in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                let private_key = ssh_dir.join(key_name);
                let public_key = ssh_dir.join(format!("{key_name}.pub"));
                if private_key.exists()
                    && let Ok(cred) = Cred::ssh_key(
                        username,
                        public_key.exists().then_some(public_key.as_path()),
                        &private_key,
                        None,
                    )
                {
                    return Ok(cred);
                }
            }
        }
        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT)
            && let Ok(config) = git2::Config::open_default()
            && let Ok(cred) = Cred::credential_helper(&config, url, username_from_url)
        {
            return Ok(cred);
        }
        Err(git2::Error::new(
            git2::ErrorCode::Auth,
            ErrorClass::Http,
            "authentication failed",
        ))
    });
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::CaptureLog;

    fn origin_with_commit(dir: &Path) {
        let repo = git2::Repository::init(dir).unwrap();
        std::fs::create_dir_all(dir.join("nvim")).unwrap();
        std::fs::write(dir.join("nvim/init.lua"), "-- init").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("nvim/init.lua")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("rice", "rice@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
    }

    #[test]
    fn clones_local_repository() {
        let origin = tempfile::tempdir().unwrap();
        origin_with_commit(origin.path());
        let work = tempfile::tempdir().unwrap();
        let dest = work.path().join("gruvbox");

        let cloner = Git2Cloner::new(RetryPolicy::none(), Arc::new(CaptureLog::default()));
        cloner
            .clone_repo(origin.path().to_str().unwrap(), &dest)
            .unwrap();
        assert!(dest.join("nvim/init.lua").exists());
        assert!(dest.join(".git").exists());
    }

    #[test]
    fn failed_clone_leaves_nothing_behind() {
        let work = tempfile::tempdir().unwrap();
        let dest = work.path().join("ghost");
        let missing = work.path().join("no-such-repo");

        let cloner = Git2Cloner::new(RetryPolicy::none(), Arc::new(CaptureLog::default()));
        let err = cloner
            .clone_repo(missing.to_str().unwrap(), &dest)
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Git(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn existing_destination_is_refused() {
        let work = tempfile::tempdir().unwrap();
        let cloner = Git2Cloner::new(RetryPolicy::none(), Arc::new(CaptureLog::default()));
        let err = cloner.clone_repo("https://example.com/x.git", work.path()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
