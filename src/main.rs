use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sievefs::config::Settings;
use sievefs::filter::{FilterPolicy, RuleSet};

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();

    let default_directive = if settings.debug { "sievefs=debug,info" } else { "sievefs=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        source = %settings.source.display(),
        config = %settings.config.display(),
        "Starting sievefs"
    );

    if !settings.source.exists() {
        anyhow::bail!("Source directory does not exist: {}", settings.source.display());
    }

    let rules = RuleSet::load(&settings.config)
        .with_context(|| format!("Error loading rule file: {}", settings.config.display()))?;
    let policy = Arc::new(FilterPolicy::new(rules, settings.invert, &settings.source));

    sievefs::fuse::mount(
        policy,
        settings.preserve_perms,
        &settings.mountpoint,
        settings.mount_options(),
    )
}
