//! Process settings from command-line flags or `RAG_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use ragapi_core::{
    DEFAULT_SOURCE_TAG, DEFAULT_SYSTEM_INSTRUCTION, EmbeddingConfig, GenerationConfig,
    GenerationParameters, ProviderKind, RagConfig, SimilarityMetric, StoreConfig,
};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    #[value(alias = "pretty")]
    Text,
    Json,
}

/// Extra HTTP headers written as `name=value,name=value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(pub Vec<(String, String)>);

impl FromStr for HeaderList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((name, value)) if !name.trim().is_empty() => {
                    Ok((name.trim().to_string(), value.trim().to_string()))
                }
                _ => Err(format!("expected name=value, got '{pair}'")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(HeaderList)
    }
}

/// Flags for the `ragapi` binary. Each one falls back to its `RAG_*` variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "ragapi", version, about = "Retrieval-augmented generation over HTTP")]
pub struct Args {
    #[arg(long, env = "RAG_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "RAG_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Budget for one HTTP request, in seconds.
    #[arg(long, env = "RAG_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Budget for one provider call, in seconds.
    #[arg(long, env = "RAG_CALL_TIMEOUT_SECS", default_value_t = 20)]
    pub call_timeout_secs: u64,

    #[arg(long, env = "RAG_LOG_FORMAT", value_enum, ignore_case = true, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(long, env = "RAG_EMBEDDING_PROVIDER", default_value = "ollama")]
    pub embedding_provider: ProviderKind,

    #[arg(long, env = "RAG_EMBEDDING_ENDPOINT", default_value = "http://localhost:11434")]
    pub embedding_endpoint: String,

    #[arg(long, env = "RAG_EMBEDDING_MODEL", default_value = "mxbai-embed-large")]
    pub embedding_model: String,

    #[arg(long, env = "RAG_EMBEDDING_DIMENSIONS", default_value_t = 1024)]
    pub embedding_dimensions: usize,

    /// Send the configured dimensions to OpenAI-compatible providers.
    #[arg(long, env = "RAG_EMBEDDING_SEND_DIMENSIONS")]
    pub embedding_send_dimensions: bool,

    #[arg(long, env = "RAG_EMBEDDING_API_KEY", hide_env_values = true)]
    pub embedding_api_key: Option<String>,

    #[arg(long, env = "RAG_EMBEDDING_HEADERS")]
    pub embedding_headers: Option<HeaderList>,

    #[arg(long, env = "RAG_GENERATION_PROVIDER", default_value = "ollama")]
    pub generation_provider: ProviderKind,

    /// Defaults to the embedding endpoint when both sides use the same provider.
    #[arg(long, env = "RAG_GENERATION_ENDPOINT")]
    pub generation_endpoint: Option<String>,

    #[arg(long, env = "RAG_GENERATION_MODEL", default_value = "llama3")]
    pub generation_model: String,

    #[arg(long, env = "RAG_GENERATION_API_KEY", hide_env_values = true)]
    pub generation_api_key: Option<String>,

    #[arg(long, env = "RAG_GENERATION_HEADERS")]
    pub generation_headers: Option<HeaderList>,

    /// PostgreSQL URL. Without it documents live in memory.
    #[arg(long, env = "RAG_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "RAG_TABLE", default_value = "documents")]
    pub table: String,

    #[arg(long, env = "RAG_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    #[arg(long, env = "RAG_METRIC", default_value = "cosine")]
    pub metric: SimilarityMetric,

    #[arg(long, env = "RAG_TOP_K", default_value_t = 3)]
    pub top_k: usize,

    #[arg(long, env = "RAG_SOURCE_TAG", default_value = DEFAULT_SOURCE_TAG)]
    pub source_tag: String,

    #[arg(long, env = "RAG_SYSTEM_INSTRUCTION")]
    pub system_instruction: Option<String>,

    #[arg(long, env = "RAG_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    #[arg(long, env = "RAG_TEMPERATURE")]
    pub temperature: Option<f32>,

    #[arg(long, env = "RAG_TOP_P")]
    pub top_p: Option<f32>,
}

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Budget for one HTTP request, spanning every pipeline stage.
    pub request_timeout: Duration,
    pub log_format: LogFormat,
    pub rag: RagConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub store: StoreConfig,
}

impl Settings {
    /// Validate parsed flags and turn them into component configs.
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let call_timeout = Duration::from_secs(args.call_timeout_secs);

        let embedding = EmbeddingConfig {
            provider: args.embedding_provider,
            endpoint: args.embedding_endpoint,
            model: args.embedding_model,
            dimensions: args.embedding_dimensions,
            send_dimensions: args.embedding_send_dimensions,
            api_key: args.embedding_api_key,
            headers: args.embedding_headers.unwrap_or_default().0,
            timeout: call_timeout,
        };

        let generation_endpoint = args.generation_endpoint.unwrap_or_else(|| {
            if args.generation_provider == embedding.provider {
                embedding.endpoint.clone()
            } else {
                GenerationConfig::default().endpoint
            }
        });
        let generation = GenerationConfig {
            provider: args.generation_provider,
            endpoint: generation_endpoint,
            model: args.generation_model,
            api_key: args.generation_api_key,
            headers: args.generation_headers.unwrap_or_default().0,
            timeout: call_timeout,
        };

        let store = StoreConfig {
            database_url: args.database_url,
            table: args.table,
            max_connections: args.max_connections,
            metric: args.metric,
            ..StoreConfig::default()
        };

        let defaults = GenerationParameters::default();
        let parameters = GenerationParameters {
            max_tokens: args.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: args.temperature.unwrap_or(defaults.temperature),
            top_p: args.top_p.unwrap_or(defaults.top_p),
        };

        let rag = RagConfig::builder()
            .top_k(args.top_k)
            .source_tag(args.source_tag)
            .system_instruction(
                args.system_instruction.unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            )
            .parameters(parameters)
            .build()
            .context("invalid pipeline settings")?;

        Ok(Self {
            host: args.host,
            port: args.port,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            log_format: args.log_format,
            rag,
            embedding,
            generation,
            store,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(flags: &[&str]) -> anyhow::Result<Settings> {
        let argv = std::iter::once("ragapi").chain(flags.iter().copied());
        Settings::from_args(Args::try_parse_from(argv)?)
    }

    #[test]
    fn no_flags_give_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 8080);
        assert_eq!(s.request_timeout, Duration::from_secs(30));
        assert_eq!(s.log_format, LogFormat::Text);
        assert_eq!(s.rag, RagConfig::default());
        assert_eq!(s.embedding.model, "mxbai-embed-large");
        assert_eq!(s.embedding.dimensions, 1024);
        assert!(!s.embedding.send_dimensions);
        assert!(s.embedding.headers.is_empty());
        assert_eq!(s.embedding.timeout, Duration::from_secs(20));
        assert_eq!(s.generation.model, "llama3");
        assert_eq!(s.generation.endpoint, "http://localhost:11434");
        assert!(s.store.database_url.is_none());
        assert_eq!(s.store.table, "documents");
        assert_eq!(s.store.max_connections, 5);
    }

    #[test]
    fn flags_override_defaults() {
        let s = settings(&[
            "--port", "9000",
            "--top-k", "5",
            "--source-tag", "wiki",
            "--metric", "l2",
            "--temperature", "0.1",
            "--embedding-provider", "openai",
            "--embedding-endpoint", "https://api.openai.com/v1",
            "--embedding-dimensions", "1536",
            "--embedding-send-dimensions",
            "--generation-provider", "openai",
            "--database-url", "postgres://localhost/rag",
            "--log-format", "JSON",
        ])
        .unwrap();
        assert_eq!(s.port, 9000);
        assert_eq!(s.rag.top_k, 5);
        assert_eq!(s.rag.source_tag, "wiki");
        assert_eq!(s.rag.parameters.temperature, 0.1);
        assert_eq!(s.store.metric, SimilarityMetric::Euclidean);
        assert_eq!(s.embedding.provider, ProviderKind::OpenAi);
        assert_eq!(s.embedding.dimensions, 1536);
        assert!(s.embedding.send_dimensions);
        assert_eq!(s.generation.endpoint, "https://api.openai.com/v1");
        assert_eq!(s.store.database_url.as_deref(), Some("postgres://localhost/rag"));
        assert_eq!(s.log_format, LogFormat::Json);
    }

    #[test]
    fn header_flags_reach_both_providers() {
        let s = settings(&[
            "--embedding-headers", "x-team=search, x-trace=on",
            "--generation-headers", "OpenAI-Organization=org-1",
        ])
        .unwrap();
        assert_eq!(
            s.embedding.headers,
            vec![
                ("x-team".to_string(), "search".to_string()),
                ("x-trace".to_string(), "on".to_string()),
            ]
        );
        assert_eq!(s.generation.headers, vec![("OpenAI-Organization".to_string(), "org-1".to_string())]);
    }

    #[test]
    fn header_list_rejects_pairs_without_a_name() {
        assert_eq!("".parse::<HeaderList>().unwrap(), HeaderList::default());
        assert_eq!(
            "a=1,,b=x=y".parse::<HeaderList>().unwrap().0,
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "x=y".to_string())]
        );
        assert!("novalue".parse::<HeaderList>().is_err());
        assert!("=value".parse::<HeaderList>().is_err());
        assert!(settings(&["--embedding-headers", "broken"]).is_err());
    }

    #[test]
    fn malformed_values_name_the_flag() {
        let err = settings(&["--port", "eighty"]).unwrap_err();
        assert!(err.to_string().contains("--port"));

        let err = settings(&["--metric", "manhattan"]).unwrap_err();
        assert!(err.to_string().contains("--metric"));
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        assert!(settings(&["--top-k", "0"]).is_err());
        assert!(settings(&["--top-p", "1.5"]).is_err());
        assert!(settings(&["--max-tokens", "0"]).is_err());
    }

    #[test]
    fn every_setting_has_an_environment_variable() {
        use clap::CommandFactory;

        let command = Args::command();
        for arg in command.get_arguments() {
            let id = arg.get_id().as_str();
            if id == "help" || id == "version" {
                continue;
            }
            let env = arg.get_env().and_then(|e| e.to_str()).unwrap_or_default();
            assert!(env.starts_with("RAG_"), "{id} has no RAG_ variable");
        }
        command.debug_assert();
    }
}
