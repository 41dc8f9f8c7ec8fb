//! Local Git repository operations via `git2`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use git2::build::CheckoutBuilder;
use git2::{BranchType, Cred, FetchOptions, PushOptions, RemoteCallbacks, Repository, Signature};
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
}

/// Outcome of merging a revision into the checked-out branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeSummary {
    /// HEAD already contains the revision.
    UpToDate,
    /// HEAD moved to `commit`; `changed_files` entries differ from the old tree.
    Merged {
        commit: String,
        changed_files: usize,
        fast_forward: bool,
    },
    /// The merge produced conflicts in `paths`; HEAD was left untouched.
    Conflicted { paths: Vec<String> },
}

impl MergeSummary {
    /// Number of entries changed by the merge (0 unless merged).
    pub fn changes(&self) -> usize {
        match self {
            Self::Merged { changed_files, .. } => *changed_files,
            _ => 0,
        }
    }

    pub fn failed(&self) -> bool {
        matches!(self, Self::Conflicted { .. })
    }
}

fn token_callbacks<'a>(token: Option<&str>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(tok) = token {
        let tok = tok.to_string();
        callbacks.credentials(move |_url, _username, _allowed| {
            Cred::userpass_plaintext("x-access-token", &tok)
        });
    }
    callbacks
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self { repo })
    }

    /// Clone a remote repository to `path` (which must be empty or absent).
    #[instrument(skip(token), fields(url = %url, path = %path.display()))]
    pub fn clone_repo(url: &str, path: &Path, token: Option<&str>) -> Result<Self, GitError> {
        info!("cloning git repository");
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(token_callbacks(token));
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_opts);
        let repo = builder.clone(url, path)?;
        info!("clone completed");
        Ok(Self { repo })
    }

    /// Fetch from a named remote.
    #[instrument(skip(self, token))]
    pub fn fetch(&self, remote_name: &str, token: Option<&str>) -> Result<(), GitError> {
        info!(remote = remote_name, "fetching");
        let mut remote = self.repo.find_remote(remote_name)?;
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(token_callbacks(token));
        remote.fetch(&[] as &[&str], Some(&mut fetch_opts), None)?;
        debug!("fetch completed");
        Ok(())
    }

    /// Check out a local branch, creating it from `<remote>/<branch>` when it
    /// only exists as a remote-tracking branch.
    #[instrument(skip(self))]
    pub fn checkout_branch(&self, remote_name: &str, branch: &str) -> Result<(), GitError> {
        let local = match self.repo.find_branch(branch, BranchType::Local) {
            Ok(b) => b,
            Err(_) => {
                let tracking = format!("{}/{}", remote_name, branch);
                let remote_branch = self
                    .repo
                    .find_branch(&tracking, BranchType::Remote)
                    .map_err(|_| GitError::RefNotFound(tracking.clone()))?;
                let commit = remote_branch.get().peel_to_commit()?;
                let mut created = self.repo.branch(branch, &commit, false)?;
                created.set_upstream(Some(&tracking))?;
                debug!(branch, tracking = %tracking, "created local branch");
                created
            }
        };
        let refname = local
            .get()
            .name()
            .ok_or_else(|| GitError::RefNotFound(branch.to_string()))?
            .to_string();
        let target = local.get().peel(git2::ObjectType::Commit)?;
        self.repo
            .checkout_tree(&target, Some(CheckoutBuilder::new().force()))?;
        self.repo.set_head(&refname)?;
        info!(branch, "checked out branch");
        Ok(())
    }

    /// Fetch and fast-forward the checked-out branch to its remote counterpart.
    #[instrument(skip(self, token))]
    pub fn pull(
        &self,
        remote_name: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<(), GitError> {
        self.fetch(remote_name, token)?;
        let fetch_head_ref = format!("refs/remotes/{}/{}", remote_name, branch);
        let fetch_commit = self
            .repo
            .find_reference(&fetch_head_ref)
            .map_err(|_| GitError::RefNotFound(fetch_head_ref.clone()))?
            .peel_to_commit()?;
        let head_ref = self.repo.head()?;
        if head_ref.is_branch() {
            let head_name = head_ref.name().unwrap_or("HEAD").to_string();
            self.repo
                .checkout_tree(fetch_commit.as_object(), Some(CheckoutBuilder::new().force()))?;
            let mut head_ref_mut = self.repo.find_reference(&head_name)?;
            head_ref_mut.set_target(fetch_commit.id(), "branchgate: fast-forward pull")?;
        }
        info!("pull completed");
        Ok(())
    }

    /// Merge `rev` (any revspec, e.g. `origin/dev`) into the checked-out
    /// branch.
    ///
    /// Fast-forwards when possible, otherwise records a merge commit with
    /// both parents signed by `committer_name <committer_email>`. On
    /// conflicts nothing is written and [`MergeSummary::Conflicted`] is
    /// returned.
    #[instrument(skip(self))]
    pub fn merge_into_head(
        &self,
        rev: &str,
        committer_name: &str,
        committer_email: &str,
    ) -> Result<MergeSummary, GitError> {
        let their_commit = self
            .repo
            .revparse_single(rev)
            .map_err(|_| GitError::RefNotFound(rev.to_string()))?
            .peel_to_commit()?;
        let head_ref = self.repo.head()?;
        let head_name = head_ref
            .name()
            .ok_or_else(|| GitError::RefNotFound("HEAD".into()))?
            .to_string();
        let head_short = head_ref.shorthand().unwrap_or("HEAD").to_string();
        let our_commit = head_ref.peel_to_commit()?;

        let annotated = self.repo.find_annotated_commit(their_commit.id())?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;
        if analysis.is_up_to_date() {
            info!(rev, "already up to date");
            return Ok(MergeSummary::UpToDate);
        }

        let fast_forward = analysis.is_fast_forward();
        let new_oid = if fast_forward {
            their_commit.id()
        } else {
            let mut index = self.repo.merge_commits(&our_commit, &their_commit, None)?;
            if index.has_conflicts() {
                let paths: Vec<String> = index
                    .conflicts()?
                    .filter_map(|c| c.ok())
                    .filter_map(|c| c.our.or(c.their).or(c.ancestor))
                    .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
                    .collect();
                warn!(rev, conflicts = paths.len(), "merge produced conflicts");
                return Ok(MergeSummary::Conflicted { paths });
            }
            let tree_oid = index.write_tree_to(&self.repo)?;
            let tree = self.repo.find_tree(tree_oid)?;
            let sig = Signature::now(committer_name, committer_email)?;
            let message = format!("Merge {} into {}", rev, head_short);
            self.repo
                .commit(None, &sig, &sig, &message, &tree, &[&our_commit, &their_commit])?
        };

        let old_tree = our_commit.tree()?;
        let new_commit = self.repo.find_commit(new_oid)?;
        let new_tree = new_commit.tree()?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;
        let changed_files = diff.stats()?.files_changed();

        self.repo
            .checkout_tree(new_commit.as_object(), Some(CheckoutBuilder::new().force()))?;
        self.repo
            .find_reference(&head_name)?
            .set_target(new_oid, "branchgate: merge")?;

        info!(sha = %new_oid, changed_files, fast_forward, "merge completed");
        Ok(MergeSummary::Merged {
            commit: new_oid.to_string(),
            changed_files,
            fast_forward,
        })
    }

    /// Push a local branch to a remote.
    #[instrument(skip(self, token))]
    pub fn push(&self, remote_name: &str, branch: &str, token: Option<&str>) -> Result<(), GitError> {
        info!(remote = remote_name, branch, "pushing");
        let mut remote = self.repo.find_remote(remote_name)?;
        let mut callbacks = token_callbacks(token);
        let push_error = Arc::new(Mutex::new(None::<String>));
        let push_error_clone = push_error.clone();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                warn!(refname, msg, "push rejected");
                if let Ok(mut slot) = push_error_clone.lock() {
                    *slot = Some(msg.to_string());
                }
            }
            Ok(())
        });
        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        remote.push(&[&refspec], Some(&mut push_opts))?;
        let rejected = push_error.lock().ok().and_then(|mut slot| slot.take());
        if let Some(detail) = rejected {
            return Err(GitError::PushRejected {
                branch: branch.to_string(),
                detail,
            });
        }
        info!("push completed");
        Ok(())
    }

    /// Return the SHA of HEAD.
    pub fn get_head_sha(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        let commit = head.peel_to_commit()?;
        Ok(commit.id().to_string())
    }
}
