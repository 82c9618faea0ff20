//! spectral-graph CLI - serve, build or assemble spectral similarity networks

use clap::{Args, Parser, Subcommand};
use spectral_graph::{
    assemble_with, EdgeDedup, ExpansionConfig, ExpansionDriver, FileHostConfig, GraphError, HttpFileHost, IonMode,
    Result, SimilarityGraph, Spec2VecClient, Spec2VecConfig,
};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "server")]
use spectral_graph::server::{serve, CorsConfig, ServerConfig};

#[derive(Parser)]
#[command(name = "spectral-graph")]
#[command(author, version, about = "One-hop mass spectrum similarity networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    #[cfg(feature = "server")]
    Serve {
        /// Address to bind
        #[arg(short, long, default_value = "127.0.0.1:1338")]
        address: String,

        /// Allow any origin to read /data
        #[arg(long)]
        permissive_cors: bool,

        /// Whole-request timeout in seconds
        #[arg(long, default_value = "300")]
        request_timeout_secs: u64,

        /// Page title
        #[arg(long, default_value = "Spectral similarity network")]
        title: String,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Expand one spectrum and print the graph document as JSON
    Graph {
        /// Spectrum id of the root
        spectrum_id: String,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Assemble a similarity graph JSON file (or stdin) into a graph document
    Assemble {
        /// Input file; reads stdin when omitted
        input: Option<String>,

        /// Edge dedup policy (triple, pair)
        #[arg(long, default_value = "triple")]
        dedup: EdgeDedup,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
}

/// Collaborator and expansion settings shared by `serve` and `graph`.
#[derive(Args)]
struct RemoteArgs {
    /// Base URL of the spectral file host
    #[arg(long, default_value = "https://files.omigami.com/gnps")]
    file_host_url: String,

    /// Similarity endpoint template; `{ion_mode}` is substituted
    #[arg(long)]
    endpoint: Option<String>,

    /// Bearer token for the similarity provider
    #[arg(long, env = "OMIGAMI_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Matches requested per spectrum
    #[arg(short = 'n', long, default_value = "5")]
    top_n: usize,

    /// Ion mode (positive, negative)
    #[arg(long, default_value = "positive")]
    ion_mode: IonMode,

    /// Edge dedup policy (triple, pair)
    #[arg(long, default_value = "triple")]
    dedup: EdgeDedup,

    /// Per-call timeout for the file host and similarity provider, in seconds
    #[arg(long, default_value = "60")]
    timeout_secs: u64,
}

impl RemoteArgs {
    fn file_host(&self) -> FileHostConfig {
        FileHostConfig::new(&self.file_host_url).with_timeout(Duration::from_secs(self.timeout_secs))
    }

    fn spec2vec(&self) -> Spec2VecConfig {
        let mut config = Spec2VecConfig::default().with_timeout(Duration::from_secs(self.timeout_secs));
        config.token = self.token.clone();
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }
        config
    }

    fn expansion(&self) -> ExpansionConfig {
        ExpansionConfig::default()
            .with_top_n(self.top_n)
            .with_ion_mode(self.ion_mode)
            .with_dedup(self.dedup)
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        #[cfg(feature = "server")]
        Commands::Serve {
            address,
            permissive_cors,
            request_timeout_secs,
            title,
            remote,
        } => serve_command(&address, permissive_cors, request_timeout_secs, &title, &remote),
        Commands::Graph {
            spectrum_id,
            pretty,
            remote,
        } => graph_command(&spectrum_id, pretty, &remote),
        Commands::Assemble { input, dedup, pretty } => assemble_command(input.as_deref(), dedup, pretty),
    };

    if let Err(e) = result {
        eprintln!("{}", e.format_with_hints());
        std::process::exit(1);
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| GraphError::InvalidConfig(e.to_string()))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

#[cfg(feature = "server")]
fn serve_command(
    address: &str,
    permissive_cors: bool,
    request_timeout_secs: u64,
    title: &str,
    remote: &RemoteArgs,
) -> Result<()> {
    let mut config = ServerConfig::new(address)
        .map_err(|e| GraphError::InvalidConfig(format!("Invalid address: {}", e)))?
        .with_request_timeout(request_timeout_secs)
        .with_title(title)
        .with_file_host(remote.file_host())
        .with_spec2vec(remote.spec2vec())
        .with_expansion(remote.expansion());
    if permissive_cors {
        config = config.with_cors(CorsConfig::permissive());
    }

    runtime()?.block_on(async { serve(config).await.map_err(|e| GraphError::InvalidConfig(e.to_string())) })
}

fn graph_command(spectrum_id: &str, pretty: bool, remote: &RemoteArgs) -> Result<()> {
    let expansion = remote.expansion();
    expansion.validate()?;
    let file_host = HttpFileHost::new(remote.file_host())?;
    let provider = Spec2VecClient::new(remote.spec2vec())?;
    let driver = ExpansionDriver::new(Arc::new(file_host), Arc::new(provider), expansion);

    let doc = runtime()?.block_on(async {
        let root = driver.fetch_query(spectrum_id).await?;
        driver.build_document(&root).await
    })?;

    print_json(&doc, pretty)
}

fn assemble_command(input: Option<&str>, dedup: EdgeDedup, pretty: bool) -> Result<()> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let graph: SimilarityGraph = serde_json::from_str(&text)?;
    let doc = assemble_with(&graph, dedup);
    tracing::debug!(nodes = doc.nodes.len(), edges = doc.edges.len(), "Assembled graph");
    print_json(&doc, pretty)
}
