//! Handler for `kargo publish`.

use kargo_core::config::{GlobalConfig, DEFAULT_NEXUS_URL, DEFAULT_PORTAL_URL};
use kargo_maven::target::{NexusTarget, PortalTarget};
use kargo_ops::ops_publish::{self, PublishRequest};
use kargo_staging::{StagingSettings, StagingTarget};
use kargo_util::errors::PublishError;
use kargo_util::progress::status;
use miette::Result;

use crate::cli::{CredentialArgs, NexusArgs, PublishAction};

pub fn exec(action: PublishAction, verbose: bool) -> Result<()> {
    let config = GlobalConfig::load()?;
    let mut settings = StagingSettings::from(&config.publish);
    settings.verbose |= verbose;

    match action {
        PublishAction::Nexus { dirs, nexus } => {
            let target = nexus_target(&config, nexus)?;
            let report = ops_publish::publish(&PublishRequest {
                target: StagingTarget::Nexus(target.clone()),
                directories: dirs,
                settings,
            })?;
            status(
                "Released",
                &format!(
                    "{} ({} unit(s), {} file(s))",
                    target.group, report.units, report.files_uploaded
                ),
            );
        }
        PublishAction::Portal {
            dirs,
            url,
            auto_publish,
            credentials,
        } => {
            let portal = config.publish.portal.as_ref();
            let url = url
                .or_else(|| portal.map(|p| p.url.clone()))
                .unwrap_or_else(|| DEFAULT_PORTAL_URL.to_string());
            let (username, password) = resolve_credentials(
                &config,
                credentials,
                portal.and_then(|p| p.credentials.as_deref()),
            )?;
            let auto_publish = auto_publish || portal.is_some_and(|p| p.auto_publish);
            let target = PortalTarget::new(url, username, password, auto_publish);
            let report = ops_publish::publish(&PublishRequest {
                target: StagingTarget::Portal(target),
                directories: dirs,
                settings,
            })?;
            let outcome = if auto_publish { "Published" } else { "Validated" };
            status(outcome, &format!("{} unit(s) as one deployment", report.units));
        }
        PublishAction::Release { nexus } => {
            let target = nexus_target(&config, nexus)?;
            let id = ops_publish::release_existing(&target, &settings)?;
            status("Released", &id);
        }
        PublishAction::Drop {
            repository_id,
            nexus,
        } => {
            let target = nexus_target(&config, nexus)?;
            ops_publish::drop_repository(&target, &repository_id, &settings)?;
            status("Dropped", &repository_id);
        }
    }
    Ok(())
}

/// Flags win over `[publish.nexus]`.
fn nexus_target(config: &GlobalConfig, args: NexusArgs) -> Result<NexusTarget> {
    let nexus = config.publish.nexus.as_ref();
    let url = args
        .url
        .or_else(|| nexus.map(|n| n.url.clone()))
        .unwrap_or_else(|| DEFAULT_NEXUS_URL.to_string());
    let group = args
        .group
        .or_else(|| nexus.and_then(|n| n.group.clone()))
        .ok_or_else(|| PublishError::Config {
            message: "No group given; pass --group or set group in [publish.nexus]".to_string(),
        })?;
    let (username, password) = resolve_credentials(
        config,
        args.credentials,
        nexus.and_then(|n| n.credentials.as_deref()),
    )?;
    Ok(NexusTarget::new(url, username, password, group))
}

fn resolve_credentials(
    config: &GlobalConfig,
    args: CredentialArgs,
    entry: Option<&str>,
) -> Result<(String, String)> {
    let stored = entry.and_then(|name| config.credential(name));
    let username = args
        .username
        .or_else(|| stored.and_then(|c| c.username.clone()));
    let password = args
        .password
        .or_else(|| stored.and_then(|c| c.password.clone()));

    match (username, password) {
        (Some(u), Some(p)) => Ok((u, p)),
        _ => {
            let hint = match entry {
                Some(name) => format!("[credentials.{name}] is missing or incomplete"),
                None => "no credentials entry is configured".to_string(),
            };
            Err(PublishError::Config {
                message: format!(
                    "Missing publishing credentials ({hint}); pass --username/--password \
                     or set KARGO_PUBLISH_USERNAME and KARGO_PUBLISH_PASSWORD"
                ),
            }
            .into())
        }
    }
}
