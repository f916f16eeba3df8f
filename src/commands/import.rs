use anyhow::{Context, Result};
use geo_db::{
    config::Config,
    import::{
        ByteSource, FileSource, HttpSource, ImportCoordinatorBuilder, LogObserver,
        ProgressBarObserver, ProgressObserver,
    },
    sink::SqliteSink,
    taxonomy::TaxonomyClient,
    temporal::Timestamp,
};
use std::time::Duration;
use tracing::{info, warn};

pub async fn run_import(config: Config, quiet: bool) -> Result<()> {
    // Fail on an existing destination before spending minutes on taxonomies,
    // but only create it once they are loaded
    if config.output.path.exists() {
        anyhow::bail!(
            "Destination {} already exists; remove it or pass --output",
            config.output.path.display()
        );
    }

    let taxonomies = TaxonomyClient::new(&config.taxonomy, &config.source.user_agent)?
        .load(&config.taxonomy)
        .await
        .context("Failed to load taxonomies")?;

    let mut sink = SqliteSink::create(&config.output.path, config.output.commit_every)
        .with_context(|| format!("Failed to create database {}", config.output.path.display()))?;

    let mut builder = ImportCoordinatorBuilder::new(taxonomies)
        .with_decompressor(config.decompressor.clone())
        .with_progress_interval(Duration::from_secs(config.import.progress_interval_secs));
    if let Some(reference) = config.import.reference_time {
        builder = builder.with_reference_time(Timestamp::from_datetime(reference));
    }

    let run = async {
        let stats = match &config.source.path {
            Some(path) => {
                let source = FileSource::open(path)
                    .await
                    .with_context(|| format!("Failed to open dump {}", path.display()))?;
                let observer = observer(&config, quiet, source.size_hint());
                let mut coordinator = builder.with_observer(observer).build();
                coordinator.run(source, &mut sink).await?
            }
            None => {
                let source = HttpSource::open(&config.source)
                    .await
                    .with_context(|| format!("Failed to open dump stream {}", config.source.url))?;
                let observer = observer(&config, quiet, source.size_hint());
                let mut coordinator = builder.with_observer(observer).build();
                coordinator.run(source, &mut sink).await?
            }
        };
        Ok::<_, anyhow::Error>(stats)
    };

    let discard = config.output.path.display();
    let stats = tokio::select! {
        result = run => result.with_context(|| format!("Import failed; discard {} before retrying", discard))?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl+C, stopping import");
            anyhow::bail!("Import interrupted; discard {} before retrying", discard);
        }
    };

    info!("Wrote {}", config.output.path.display());
    if !quiet {
        stats.print_summary();
    }
    Ok(())
}

fn observer(config: &Config, quiet: bool, total: Option<u64>) -> Box<dyn ProgressObserver> {
    if config.import.progress_bar && !quiet {
        Box::new(ProgressBarObserver::new(total))
    } else {
        Box::new(LogObserver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_taxonomy_failure_leaves_no_database() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output.path = dir.path().join("geo.db");
        config.taxonomy.endpoint = "http://127.0.0.1:9/sparql".to_string();
        config.taxonomy.timeout_secs = 5;

        let err = run_import(config.clone(), true).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load taxonomies"));
        assert!(!config.output.path.exists());
    }

    #[tokio::test]
    async fn test_existing_destination_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output.path = dir.path().join("geo.db");
        std::fs::write(&config.output.path, b"").unwrap();

        let err = run_import(config, true).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
