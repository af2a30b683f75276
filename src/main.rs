//! apibind CLI entrypoint
//! Loads an API description and exposes its resources, operations and catalogs.
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use apibind::{
    ApiDescription, Arguments, CatalogIndexer, Client, ClientConfig, HttpMethod, IndexerOptions,
    KeySource,
};
use clap::Parser;
use serde_json::Value;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apibind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug)]
pub struct Connection {
    /// Base URL of the API server
    #[arg(long)]
    base_url: String,
    /// Extra header sent with every call, as NAME=VALUE
    #[arg(long = "header", value_parser = parse_pair)]
    headers: Vec<(String, String)>,
    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// List the resources of an API description
    Resources {
        /// Path to the API description (YAML or JSON)
        doc: PathBuf,
    },
    /// List the operations of one resource
    Operations {
        /// Path to the API description (YAML or JSON)
        doc: PathBuf,
        /// Resource name
        resource: String,
    },
    /// Call the operation declared at METHOD PATH
    Call {
        /// Path to the API description (YAML or JSON)
        doc: PathBuf,
        #[command(flatten)]
        connection: Connection,
        /// HTTP method
        method: HttpMethod,
        /// Path exactly as declared in the description
        path: String,
        /// Operation argument as NAME=VALUE; VALUE is parsed as JSON when possible
        #[arg(long = "arg", value_parser = parse_pair)]
        args: Vec<(String, String)>,
        /// JSON body for the operation's body parameter
        #[arg(long)]
        body: Option<String>,
        /// Return the response as a model instance
        #[arg(long)]
        model: bool,
    },
    /// Build a catalog from a collection-returning GET operation and print it
    Catalog {
        /// Path to the API description (YAML or JSON)
        doc: PathBuf,
        #[command(flatten)]
        connection: Connection,
        /// Path of the GET operation
        path: String,
        /// Item property holding the id
        #[arg(long)]
        id_from: Option<String>,
        /// Item property holding the name
        #[arg(long)]
        name_from: Option<String>,
        /// Operation argument as NAME=VALUE
        #[arg(long = "arg", value_parser = parse_pair)]
        args: Vec<(String, String)>,
    },
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))
}

fn to_arguments(pairs: &[(String, String)]) -> Arguments {
    pairs
        .iter()
        .map(|(name, raw)| {
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            (name.clone(), value)
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with default level INFO
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Resources { doc } => list_resources(doc).await?,
        Commands::Operations { doc, resource } => list_operations(doc, resource).await?,
        Commands::Call {
            doc,
            connection,
            method,
            path,
            args,
            body,
            model,
        } => {
            call_operation(
                doc,
                connection,
                *method,
                path,
                to_arguments(args),
                body.as_deref(),
                *model,
            )
            .await?
        }
        Commands::Catalog {
            doc,
            connection,
            path,
            id_from,
            name_from,
            args,
        } => {
            print_catalog(
                doc,
                connection,
                path,
                id_from.as_deref(),
                name_from.as_deref(),
                to_arguments(args),
            )
            .await?
        }
    }
    Ok(())
}

async fn load(doc: &Path) -> anyhow::Result<ApiDescription> {
    let api = ApiDescription::from_path(doc)
        .await
        .with_context(|| format!("Failed to load API description from {}", doc.display()))?;
    info!(
        "Loaded {} {}",
        api.title().unwrap_or("API description"),
        api.version().unwrap_or_default()
    );
    Ok(api)
}

async fn connect(doc: &Path, connection: &Connection, model: bool) -> anyhow::Result<Client> {
    let api = load(doc).await?;
    let mut builder = ClientConfig::builder()
        .base_url(connection.base_url.as_str())
        .model_response(model);
    for (name, value) in &connection.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(secs) = connection.timeout {
        builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    let config = builder.build().context("Failed to build client configuration")?;
    Client::new(api, &config).context("Failed to create client")
}

async fn list_resources(doc: &Path) -> anyhow::Result<()> {
    let api = load(doc).await?;
    for name in api.resource_names() {
        let count = api.resource(name).map(|ops| ops.len()).unwrap_or_default();
        println!("{} ({} operations)", name, count);
    }
    Ok(())
}

async fn list_operations(doc: &Path, resource: &str) -> anyhow::Result<()> {
    let api = load(doc).await?;
    let Some(operations) = api.resource(resource) else {
        bail!("No resource named '{}'", resource);
    };
    for (name, op) in operations {
        println!(
            "{:<32} {:<7} {}",
            name,
            op.method.as_str().to_uppercase(),
            op.path
        );
    }
    Ok(())
}

async fn call_operation(
    doc: &Path,
    connection: &Connection,
    method: HttpMethod,
    path: &str,
    mut args: Arguments,
    body: Option<&str>,
    model: bool,
) -> anyhow::Result<()> {
    let client = connect(doc, connection, model).await?;
    let request = client.command_request(method, path)?;

    if let Some(body) = body {
        let Some(param) = request.body_parameter() else {
            bail!("{} {} takes no body", method, path);
        };
        let value: Value = serde_json::from_str(body).context("Failed to parse JSON body")?;
        args.insert(param.to_string(), value);
    }

    let (payload, ok) = request.call(args).await?.into_parts();
    if !ok {
        warn!("{} {} did not succeed", method, path);
    }
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

async fn print_catalog(
    doc: &Path,
    connection: &Connection,
    path: &str,
    id_from: Option<&str>,
    name_from: Option<&str>,
    args: Arguments,
) -> anyhow::Result<()> {
    let client = connect(doc, connection, false).await?;
    let request = client.command_request(HttpMethod::Get, path)?;

    let mut options = IndexerOptions::new();
    if let Some(property) = id_from {
        options = options.id_from(KeySource::property(property));
    }
    if let Some(property) = name_from {
        options = options.name_from(KeySource::property(property));
    }

    let mut indexer = CatalogIndexer::new(request, options)?;
    indexer.run(args).await.context("Failed to build catalog")?;
    for entry in &indexer {
        println!("{:>8}  {}", entry.id().to_string(), entry.name());
    }
    println!("{}", indexer);
    Ok(())
}
