use anyhow::{Context, Result};
use geo_db::{
    classify::classify,
    config::Config,
    entity::{parse_entity_data, Entity},
    import::{ImportCoordinatorBuilder, ImportStats},
    sink::MemorySink,
    taxonomy::TaxonomyClient,
    temporal::Timestamp,
};
use std::time::Duration;
use tracing::{info, warn};

/// Print the rows each entity would produce, one JSON document per entity
pub async fn show_entities(config: Config, ids: Vec<String>) -> Result<()> {
    let taxonomies = TaxonomyClient::new(&config.taxonomy, &config.source.user_agent)?
        .load(&config.taxonomy)
        .await
        .context("Failed to load taxonomies")?;

    let mut builder = ImportCoordinatorBuilder::new(taxonomies);
    if let Some(reference) = config.import.reference_time {
        builder = builder.with_reference_time(Timestamp::from_datetime(reference));
    }
    let coordinator = builder.build();

    let client = reqwest::Client::builder()
        .user_agent(config.source.user_agent.as_str())
        .connect_timeout(Duration::from_secs(config.source.connect_timeout_secs))
        .build()?;

    for id in ids {
        let entities = match fetch_entity(&client, &config.source.entity_data_url, &id).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!("Skipping {}: {:#}", id, e);
                continue;
            }
        };

        for entity in entities {
            let roles = classify(&entity, coordinator.taxonomies());
            let mut sink = MemorySink::new();
            let mut stats = ImportStats::default();
            if let Err(e) = coordinator.process_entity(&entity, &mut sink, &mut stats).await {
                warn!("Entity {} would abort an import: {}", entity.id, e);
            }

            let output = serde_json::json!({
                "id": entity.id,
                "roles": roles.iter().collect::<Vec<_>>(),
                "handler_skips": stats.handler_skips,
                "batches": sink.batches(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    info!("Reference time: {}", coordinator.resolver().reference().unix_seconds());
    Ok(())
}

async fn fetch_entity(client: &reqwest::Client, base: &str, id: &str) -> Result<Vec<Entity>> {
    let url = format!("{}/{}.json", base.trim_end_matches('/'), id);
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("{} returned {}", url, status);
    }

    let body = response.bytes().await?;
    let entities = parse_entity_data(&body).with_context(|| format!("Malformed entity data for {}", id))?;
    Ok(entities)
}
