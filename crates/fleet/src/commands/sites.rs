//! Site command handlers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use tokio::task::JoinSet;

use fleet_config::Config;
use fleet_core::{CoreError, Registry, Site, SiteConfig};

use crate::cli::{GlobalOpts, SitesArgs, SitesCommand};
use crate::error::CliError;
use crate::output;

// ── Reports & table rows ────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SiteSummary {
    name: String,
    master_url: String,
    exec_addr: Option<String>,
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Master URL")]
    master_url: String,
    #[tabled(rename = "Exec Address")]
    exec_addr: String,
}

impl From<&SiteSummary> for SiteRow {
    fn from(s: &SiteSummary) -> Self {
        Self {
            name: s.name.clone(),
            master_url: s.master_url.clone(),
            exec_addr: s.exec_addr.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckReport {
    name: String,
    healthy: bool,
    state: String,
    version: Option<String>,
    error: Option<String>,
}

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Healthy")]
    healthy: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&CheckReport> for CheckRow {
    fn from(r: &CheckReport) -> Self {
        Self {
            name: r.name.clone(),
            healthy: if r.healthy { "yes" } else { "no" }.into(),
            state: r.state.clone(),
            version: r.version.clone().unwrap_or_default(),
            error: r.error.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct KindReport {
    kind: String,
    items: usize,
    synced: bool,
    last_sync: Option<DateTime<Utc>>,
}

#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Items")]
    items: usize,
    #[tabled(rename = "Last Sync")]
    last_sync: String,
}

impl From<&KindReport> for KindRow {
    fn from(r: &KindReport) -> Self {
        Self {
            kind: r.kind.clone(),
            items: r.items,
            last_sync: r
                .last_sync
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".into()),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SitesArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SitesCommand::List => {
            let summaries: Vec<SiteSummary> = config
                .sites
                .iter()
                .map(|(name, entry)| SiteSummary {
                    name: name.clone(),
                    master_url: entry.master_url.clone(),
                    exec_addr: entry.exec_addr.clone(),
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &summaries,
                |s| SiteRow::from(s),
                |s| s.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SitesCommand::Check { names } => check(config, names, global).await,

        SitesCommand::Cache { name } => cache(config, &name, global).await,
    }
}

// ── sites check ─────────────────────────────────────────────────────

async fn check(config: &Config, names: Vec<String>, global: &GlobalOpts) -> Result<(), CliError> {
    let names = if names.is_empty() {
        config.site_names().map(str::to_owned).collect()
    } else {
        names
    };
    let site_configs = names
        .iter()
        .map(|name| site_config(config, name, global))
        .collect::<Result<Vec<_>, _>>()?;

    let registry = Arc::new(Registry::new());
    let mut checks = JoinSet::new();
    for site_config in site_configs {
        let registry = Arc::clone(&registry);
        checks.spawn(async move { check_one(&registry, site_config).await });
    }

    let mut reports = Vec::with_capacity(names.len());
    let mut failures = Vec::new();
    while let Some(joined) = checks.join_next().await {
        let (report, failure) = joined.map_err(|e| CliError::ApiError {
            message: format!("site check task failed: {e}"),
        })?;
        reports.push(report);
        failures.extend(failure);
    }
    registry.shutdown().await;
    reports.sort_by(|a, b| a.name.cmp(&b.name));

    let out = output::render_list(
        &global.output,
        &reports,
        |r| CheckRow::from(r),
        |r| format!("{}\t{}", r.name, if r.healthy { "healthy" } else { "unhealthy" }),
    );
    output::print_output(&out, global.quiet);

    let total = reports.len();
    if !global.quiet {
        let healthy = total - failures.len();
        let color = output::should_color(&global.color);
        eprintln!(
            "{}",
            output::status_text(
                &format!("{healthy}/{total} sites healthy"),
                failures.is_empty(),
                color
            )
        );
    }

    match (failures.len(), total) {
        (0, _) => Ok(()),
        (1, 1) => Err(failures.remove(0).into()),
        (failed, total) => Err(CliError::CheckFailed { failed, total }),
    }
}

async fn check_one(registry: &Registry, config: SiteConfig) -> (CheckReport, Option<CoreError>) {
    let name = config.name.clone();
    match registry.add_site(Site::new(config)).await {
        Ok(site) => {
            let version = site
                .connection()
                .ok()
                .map(|c| c.version().git_version.clone());
            let report = CheckReport {
                name,
                healthy: true,
                state: site.state().to_string(),
                version,
                error: None,
            };
            (report, None)
        }
        Err(e) => {
            tracing::debug!(site = %name, error = %e, "site check failed");
            let report = CheckReport {
                name,
                healthy: false,
                state: "failed".into(),
                version: None,
                error: Some(e.to_string()),
            };
            (report, Some(e))
        }
    }
}

// ── sites cache ─────────────────────────────────────────────────────

async fn cache(config: &Config, name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let registry = Registry::new();
    let site = registry
        .add_site(Site::new(site_config(config, name, global)?))
        .await?;
    tracing::debug!(site = %site.name(), id = %site.id(), "site registered");

    let result = kind_reports(&registry, name).await;
    registry.shutdown().await;
    let reports = result?;

    let out = output::render_list(
        &global.output,
        &reports,
        |r| KindRow::from(r),
        |r| format!("{}\t{}", r.kind, r.items),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn kind_reports(registry: &Registry, name: &str) -> Result<Vec<KindReport>, CoreError> {
    let cache = registry.cache(name).await?;
    cache
        .readers()
        .map(|reader| {
            Ok(KindReport {
                kind: reader.kind().to_string(),
                items: reader.len()?,
                synced: reader.has_synced(),
                last_sync: reader.last_synced(),
            })
        })
        .collect()
}

// ── Helpers ─────────────────────────────────────────────────────────

/// `SiteConfig` for `name`, with CLI overrides applied.
fn site_config(config: &Config, name: &str, global: &GlobalOpts) -> Result<SiteConfig, CliError> {
    let site = config.site(name)?;
    Ok(match global.timeout {
        Some(secs) => site.with_timeout(Duration::from_secs(secs)),
        None => site,
    })
}
