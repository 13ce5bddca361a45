//! CLI runner - executes commands

use crate::cli::commands::{CheckpointArgs, Cli, Commands, OutputFormat, WalkArgs};
use crate::config::{load_config, ClientConfig};
use crate::engine::EntityPager;
use crate::error::{Error, Result, ResultExt};
use crate::query::ListParameters;
use crate::state::{PaginationState, StateManager};
use crate::store::{Entity, EntityStore, RestEntityStore};
use serde_json::{json, Value};
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

/// Redaction to apply when storing a walk
#[derive(Debug, Clone, Copy)]
struct Redaction {
    include_entities: bool,
    include_filter_values: bool,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::List {
                resource,
                limit,
                orderby,
                order,
                fields,
                total,
                walk,
                checkpoint,
            } => {
                let config = self.load_config()?;
                let mut parameters =
                    ListParameters::new().limit(limit.unwrap_or(config.paging.page_size));
                if let Some(orderby) = orderby {
                    parameters = parameters.orderby(orderby);
                }
                if let Some(order) = order {
                    parameters = parameters.order(*order);
                }
                for field in fields {
                    parameters = parameters.field(field);
                }
                if *total {
                    parameters = parameters.total(true);
                }
                self.list(&config, resource, parameters, walk, checkpoint)
                    .await
            }
            Commands::Resume {
                name,
                fields,
                walk,
                no_update,
            } => self.resume(name, fields, walk, *no_update).await,
            Commands::Checkpoints => self.checkpoints().await,
        }
    }

    /// Load the client configuration
    fn load_config(&self) -> Result<ClientConfig> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Client configuration not specified (use -C flag)"))?;
        load_config(path)
    }

    /// Open the checkpoint file
    fn state_manager(&self) -> Result<StateManager> {
        let path = self
            .cli
            .state_file
            .as_ref()
            .ok_or_else(|| Error::config("Checkpoint file not specified (use -s flag)"))?;
        StateManager::from_file(path)
    }

    async fn list(
        &self,
        config: &ClientConfig,
        resource: &str,
        parameters: ListParameters,
        walk: &WalkArgs,
        checkpoint: &CheckpointArgs,
    ) -> Result<()> {
        // Fail before fetching anything if the walk cannot be stored
        let manager = match &checkpoint.checkpoint {
            Some(_) => Some(self.state_manager()?),
            None => None,
        };

        let mut pager = EntityPager::new(RestEntityStore::from_config(config)?);
        let first = pager.start_listing(resource, parameters).await?;
        self.output_entities(&first);

        let outcome = self.walk(&mut pager, walk, 1).await;

        if let (Some(manager), Some(name)) = (manager, &checkpoint.checkpoint) {
            let redaction = Redaction {
                include_entities: !checkpoint.without_entities,
                include_filter_values: !checkpoint.without_filter_values,
            };
            self.store_checkpoint(&manager, name, &pager, redaction)
                .await?;
        }
        self.output_summary(&pager);
        outcome
    }

    async fn resume(
        &self,
        name: &str,
        fields: &[String],
        walk: &WalkArgs,
        no_update: bool,
    ) -> Result<()> {
        let config = self.load_config()?;
        let manager = self.state_manager()?;
        let blob = manager
            .get(name)
            .await?
            .ok_or_else(|| Error::state(format!("No checkpoint named '{name}'")))?;

        let mut pager = EntityPager::new(RestEntityStore::from_config(&config)?);
        pager
            .import_state(&blob)
            .with_context(|| format!("Checkpoint '{name}' cannot be resumed"))?;

        let redaction = match pager.state() {
            Some(state) => Redaction {
                include_entities: state.last_batch.is_some(),
                include_filter_values: !state.filters_redacted,
            },
            None => return Err(Error::NotStarted),
        };
        if !redaction.include_filter_values {
            if fields.is_empty() {
                warn!(
                    checkpoint = name,
                    "Checkpoint was stored without filter values; pass them with --field"
                );
            } else {
                pager.restore_filters(fields.to_vec())?;
            }
        }

        let outcome = self.walk(&mut pager, walk, 0).await;

        if !no_update {
            self.store_checkpoint(&manager, name, &pager, redaction)
                .await?;
        }
        self.output_summary(&pager);
        outcome
    }

    async fn checkpoints(&self) -> Result<()> {
        let manager = self.state_manager()?;
        for name in manager.names().await {
            let message = match manager.get(&name).await? {
                Some(blob) => match PaginationState::import(&blob) {
                    Ok(state) => json!({
                        "type": "CHECKPOINT",
                        "name": name,
                        "resource": state.descriptor.resource,
                        "mode": state.mode(),
                        "exhausted": state.is_exhausted(),
                        "distinct_fetched": state.distinct_fetched_count(),
                        "filters_redacted": state.filters_redacted,
                    }),
                    Err(e) => json!({
                        "type": "CHECKPOINT",
                        "name": name,
                        "error": e.to_string(),
                    }),
                },
                None => continue,
            };
            self.output_message(&message);
        }
        Ok(())
    }

    /// Continue a walk until exhausted or `walk.pages` pages were fetched
    async fn walk<S: EntityStore>(
        &self,
        pager: &mut EntityPager<S>,
        walk: &WalkArgs,
        mut pages: usize,
    ) -> Result<()> {
        while !pager.is_exhausted() && (walk.pages == 0 || pages < walk.pages) {
            let entities = if walk.ordered {
                pager.fetch_next_ordered(None, walk.options()).await?
            } else {
                pager.fetch_next(None).await?
            };
            pages += 1;
            self.output_entities(&entities);

            if entities.is_empty() && !pager.is_exhausted() {
                warn!("Store returned an empty page before the listing was exhausted; stopping");
                break;
            }
        }
        Ok(())
    }

    async fn store_checkpoint<S: EntityStore>(
        &self,
        manager: &StateManager,
        name: &str,
        pager: &EntityPager<S>,
        redaction: Redaction,
    ) -> Result<()> {
        let blob = pager.export_state(redaction.include_entities, redaction.include_filter_values)?;
        manager.put(name, &blob).await?;
        info!(checkpoint = name, path = %manager.path().display(), "Stored checkpoint");
        Ok(())
    }

    fn output_entities(&self, entities: &[Entity]) {
        for entity in entities {
            self.output_message(&json!({
                "type": "RECORD",
                "record": entity,
            }));
        }
    }

    fn output_summary<S: EntityStore>(&self, pager: &EntityPager<S>) {
        let Some(state) = pager.state() else {
            return;
        };
        self.output_message(&json!({
            "type": "STATE",
            "resource": state.descriptor.resource,
            "mode": state.mode(),
            "order": state.live.sort_order(),
            "exhausted": state.is_exhausted(),
            "distinct_fetched": state.distinct_fetched_count(),
            "entities_returned": pager.stats().entities_returned,
        }));
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
