// fraudgate/src/engine/dispatcher.rs
//
// Writes verdicts to output JSONL files.
//   audit_log.jsonl        every verdict
//   review_queue.jsonl     checkouts rated high (requires manual review)
//   flagged_events.jsonl   suspicious logins / sign-ups / rate-limited actions
// Wire these files to the storefront's order-hold and alerting jobs.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::events::RiskVerdict;

pub const AUDIT_LOG:    &str = "audit_log.jsonl";
pub const REVIEW_QUEUE: &str = "review_queue.jsonl";
pub const FLAGGED:      &str = "flagged_events.jsonl";

pub struct Dispatcher {
    out: PathBuf,
}

impl Dispatcher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let out: PathBuf = output_dir.into();
        std::fs::create_dir_all(&out)
            .with_context(|| format!("creating output directory {}", out.display()))?;
        Ok(Self { out })
    }

    pub async fn dispatch(&self, verdict: &RiskVerdict) -> Result<()> {
        let line = verdict.to_jsonl() + "\n";

        match &verdict.assessment {
            Some(a) if a.requires_review => {
                info!(
                    "REVIEW subject={} score={} factors={}",
                    verdict.subject, a.risk_score, a.risk_factors.join(" | ")
                );
                self.write(REVIEW_QUEUE, &line).await?;
            }
            Some(_) => {}
            None if verdict.flagged => {
                info!("FLAGGED kind={} subject={}", verdict.kind, verdict.subject);
                self.write(FLAGGED, &line).await?;
            }
            None => {}
        }
        self.write(AUDIT_LOG, &line).await?;
        Ok(())
    }

    async fn write(&self, file: &str, content: &str) -> Result<()> {
        let mut f = OpenOptions::new().create(true).append(true)
            .open(self.out.join(file)).await?;
        f.write_all(content.as_bytes()).await?;
        Ok(())
    }
}
