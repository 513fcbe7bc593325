//! Git + DVC collaborator for the sync cycle.
//!
//! Shells out to the `git` and `dvc` binaries inside the configured
//! checkout. The push scope is deliberately a single pointer artifact
//! (`<dataset>.dvc`); committing anything broader could clobber unrelated
//! content in the shared dataset repository.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::sync::{PushOutcome, Repository};

/// Marker emitted by `dvc push` when the remote already has every block.
const UP_TO_DATE_MARKER: &str = "Everything is up to date.";

/// True when the push output indicates the remote was already current.
pub fn remote_up_to_date(output: &str) -> bool {
    output.contains(UP_TO_DATE_MARKER)
}

/// [`Repository`] backed by a local git+DVC checkout.
pub struct GitDvcRepository {
    git_folder: PathBuf,
    branch: String,
}

impl GitDvcRepository {
    pub fn new(git_folder: PathBuf, branch: String) -> Self {
        Self { git_folder, branch }
    }

    /// Run one subprocess in the checkout, capturing stdout and stderr
    /// interleaved into a single string.
    async fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<String> {
        debug!("running {program} {}", args.join(" "));
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.git_folder)
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            anyhow::bail!(
                "{program} {} failed ({}): {}",
                args.join(" "),
                output.status,
                combined.trim()
            );
        }
        Ok(combined)
    }
}

impl Repository for GitDvcRepository {
    fn pull(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            let out = self.run("git", &["pull", "origin", &self.branch]).await?;
            debug!("git pull: {}", out.trim());
            Ok(())
        })
    }

    fn commit_and_push(
        &self,
        artifact: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PushOutcome>> + Send + '_>> {
        let artifact = artifact.to_string();
        Box::pin(async move {
            self.run("dvc", &["commit", &artifact, "-f"]).await?;
            let push_output = self.run("dvc", &["push"]).await?;

            if remote_up_to_date(&push_output) {
                return Ok(PushOutcome {
                    pushed: false,
                    output: push_output,
                });
            }

            // Data blocks moved: record the new pointer in git.
            self.run("git", &["add", &artifact]).await?;
            let message = format!("update {artifact}");
            self.run("git", &["commit", "-m", &message, "--", &artifact])
                .await?;
            self.run("git", &["push", "origin", &self.branch]).await?;
            info!("pushed {artifact} to origin/{}", self.branch);

            Ok(PushOutcome {
                pushed: true,
                output: push_output,
            })
        })
    }
}
