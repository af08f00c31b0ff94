use crate::{
    Commands, DeficienciesArgs, EmbeddingsCommand, EndpointArgs, RequestCommand, ReviewCommand,
    RuleCommand, SearchCommand, SearchOptions,
};
use anyhow::Result;
use rules_review::{
    embedding_coverage, generate_embeddings, run_exact_review, run_semantic_review,
    search_by_text, similar_requests_for_rule, similar_rules_for_request, Inventory, ReviewConfig,
};
use rules_review_protocol::{NewRequest, NewRule, RequestSpec, RuleAction};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

pub struct Ctx {
    pub config: ReviewConfig,
    pub inventory_path: PathBuf,
}

impl Ctx {
    async fn inventory(&self) -> Result<Inventory> {
        Ok(Inventory::load_or_default(&self.inventory_path).await?)
    }

    async fn save(&self, inventory: &Inventory) -> Result<()> {
        inventory.save(&self.inventory_path).await?;
        log::debug!("inventory saved to {}", self.inventory_path.display());
        Ok(())
    }

    fn threshold(&self, options: &SearchOptions) -> f64 {
        options
            .threshold
            .unwrap_or(self.config.similarity_threshold)
    }
}

pub async fn dispatch(ctx: &Ctx, command: Commands) -> Result<Value> {
    match command {
        Commands::Request(command) => request(ctx, command).await,
        Commands::Rule(command) => rule(ctx, command).await,
        Commands::Embeddings(command) => embeddings(ctx, command).await,
        Commands::Review(command) => review(ctx, command).await,
        Commands::Search(command) => search(ctx, command).await,
        Commands::Deficiencies(args) => deficiencies(ctx, args).await,
    }
}

async fn request(ctx: &Ctx, command: RequestCommand) -> Result<Value> {
    let mut inventory = ctx.inventory().await?;
    match command {
        RequestCommand::Add(endpoints) => {
            let created = inventory
                .add_request(NewRequest {
                    name: endpoints.name,
                    spec: RequestSpec {
                        sources: endpoints.sources,
                        destinations: endpoints.destinations,
                        ports: endpoints.ports,
                    },
                })?
                .clone();
            ctx.save(&inventory).await?;
            log::info!("request {} recorded", created.id);
            json(&created)
        }
        RequestCommand::List { status } => {
            json(&inventory.requests_with_status(status).collect::<Vec<_>>())
        }
        RequestCommand::Show { id } => json(inventory.request(id)?),
        RequestCommand::Status { id, status } => {
            let updated = inventory.set_request_status(id, status)?.clone();
            ctx.save(&inventory).await?;
            json(&updated)
        }
    }
}

async fn rule(ctx: &Ctx, command: RuleCommand) -> Result<Value> {
    let mut inventory = ctx.inventory().await?;
    match command {
        RuleCommand::Add {
            endpoints,
            device,
            action,
        } => {
            let created = inventory.add_rule(new_rule(endpoints, device, action))?.clone();
            ctx.save(&inventory).await?;
            log::info!("rule {} recorded", created.id);
            json(&created)
        }
        RuleCommand::List => json(inventory.rules()),
        RuleCommand::Show { id } => json(inventory.rule(id)?),
        RuleCommand::Delete { id } => {
            let removed = inventory.delete_rule(id)?;
            ctx.save(&inventory).await?;
            log::info!("rule {id} deleted");
            json(&removed)
        }
    }
}

fn new_rule(endpoints: EndpointArgs, device: String, action: RuleAction) -> NewRule {
    NewRule {
        name: endpoints.name,
        device,
        action,
        ports: endpoints.ports,
        sources: endpoints.sources,
        destinations: endpoints.destinations,
    }
}

async fn embeddings(ctx: &Ctx, command: EmbeddingsCommand) -> Result<Value> {
    let mut inventory = ctx.inventory().await?;
    match command {
        EmbeddingsCommand::Generate { force, batch_size } => {
            let provider = ctx.config.embedding.build_provider()?;
            let batch_size = batch_size.unwrap_or(ctx.config.embedding.batch_size);
            let report =
                generate_embeddings(&mut inventory, provider.as_ref(), batch_size, force).await?;
            ctx.save(&inventory).await?;
            if !report.failures.is_empty() {
                log::warn!("{} entities could not be embedded", report.failures.len());
            }
            json(&report)
        }
        EmbeddingsCommand::Status => json(&embedding_coverage(&inventory)),
    }
}

async fn review(ctx: &Ctx, command: ReviewCommand) -> Result<Value> {
    let mut inventory = ctx.inventory().await?;
    let output = match command {
        ReviewCommand::Exact => json(&run_exact_review(&mut inventory))?,
        ReviewCommand::Semantic { threshold } => {
            json(&run_semantic_review(&mut inventory, &ctx.config, threshold).await?)?
        }
    };
    ctx.save(&inventory).await?;
    Ok(output)
}

async fn search(ctx: &Ctx, command: SearchCommand) -> Result<Value> {
    let mut inventory = ctx.inventory().await?;
    let provider = ctx.config.embedding.build_provider()?;
    match command {
        SearchCommand::ByRequest { id, options } => {
            let result = similar_rules_for_request(
                &mut inventory,
                provider.as_ref(),
                id,
                ctx.threshold(&options),
                options.limit,
            )
            .await?;
            ctx.save(&inventory).await?;
            json(&result)
        }
        SearchCommand::ByRule { id, options } => {
            let result = similar_requests_for_rule(
                &mut inventory,
                provider.as_ref(),
                id,
                ctx.threshold(&options),
                options.limit,
            )
            .await?;
            ctx.save(&inventory).await?;
            json(&result)
        }
        SearchCommand::Text {
            query,
            scope,
            options,
        } => json(
            &search_by_text(
                &inventory,
                provider.as_ref(),
                &query,
                scope,
                ctx.threshold(&options),
                options.limit,
            )
            .await?,
        ),
    }
}

async fn deficiencies(ctx: &Ctx, args: DeficienciesArgs) -> Result<Value> {
    let inventory = ctx.inventory().await?;
    match (args.semantic, args.id) {
        (false, Some(id)) => json(inventory.deficiency(id)?),
        (true, Some(id)) => json(inventory.semantic_deficiency(id)?),
        (false, None) => json(&inventory.deficiencies(args.kind).collect::<Vec<_>>()),
        (true, None) => json(&inventory.semantic_deficiencies(args.kind).collect::<Vec<_>>()),
    }
}

fn json<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
