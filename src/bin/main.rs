use clap::Parser;
use http::{Method, StatusCode};
use lambda_runtime_bridge::config::{self, CONFIG_FILE_ENV, RuntimeConfig, RuntimeSettings};
use lambda_runtime_bridge::runtime::trace::EnvTraceSink;
use lambda_runtime_bridge::{
    ApiClient, Context, HandlerCapability, HandlerError, HandlerRegistry, Runtime, StartupError,
    StructuredRequest, StructuredResponse,
};
use log::info;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Custom runtime bootstrap bridging the host's invocation protocol to a handler
#[derive(Parser)]
#[command(name = "bootstrap")]
#[command(version)]
#[command(about = "Custom runtime bootstrap bridging the host's invocation protocol to a handler")]
struct Cli {
    /// Name of the registered handler to run
    #[arg(long)]
    handler: Option<String>,

    /// TOML configuration file (default: $LAMBDA_RUNTIME_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit per-invocation timing records on stderr
    #[arg(long)]
    debug: bool,

    /// Invocation endpoint as host:port (default: $AWS_LAMBDA_RUNTIME_API)
    #[arg(long)]
    runtime_api: Option<String>,

    /// Timeout in milliseconds for posting results and error reports
    #[arg(long)]
    send_timeout_ms: Option<u64>,

    /// Print the registered handler names and exit
    #[arg(long)]
    list_handlers: bool,
}

impl Cli {
    fn settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            runtime_api: self.runtime_api.clone(),
            handler: self.handler.clone(),
            debug: self.debug.then_some(true),
            send_timeout_ms: self.send_timeout_ms,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.list_handlers {
        for name in registry().names() {
            println!("{}", name);
        }
        return;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.debug);

    if let Err(e) = start(config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig, StartupError> {
    let file_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from));
    let file = match file_path {
        Some(path) => RuntimeSettings::load_file(&path)?,
        None => RuntimeSettings::default(),
    };

    let merged = config::merge_all(&[
        RuntimeSettings::defaults(),
        file,
        RuntimeSettings::from_process_env()?,
        cli.settings(),
    ]);
    RuntimeConfig::from_settings(merged)
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .try_init();
}

/// Resolve the handler and run the loop. Returns only on startup failure;
/// a fatal loop failure exits the process.
fn start(config: RuntimeConfig) -> Result<(), StartupError> {
    let dispatcher = registry().resolve(&config.handler)?;
    let api = ApiClient::new(&config.endpoint, config.send_timeout).map_err(StartupError::Client)?;

    info!(
        target: "lambda_runtime_bridge::runtime",
        "Starting handler '{}' against {}",
        config.handler,
        api.base_url()
    );

    let runtime = Runtime::new(api, dispatcher)
        .with_trace_sink(EnvTraceSink)
        .with_debug(config.debug);

    match runtime.run() {
        Ok(never) => match never {},
        Err(_) => std::process::exit(1),
    }
}

fn registry() -> HandlerRegistry {
    HandlerRegistry::new()
        .register("handler", HandlerCapability::request(health))
        .register("function", HandlerCapability::event(function))
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn json_response(status: StatusCode, body: Value) -> Result<StructuredResponse, HandlerError> {
    StructuredResponse::json(status, &body).map_err(HandlerError::new)
}

/// Request-shaped demo: a health endpoint.
fn health(request: StructuredRequest) -> Result<StructuredResponse, HandlerError> {
    if request.method != Method::GET {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "Method not allowed" }),
        );
    }

    match request.path.as_str() {
        "/" | "/health" => json_response(
            StatusCode::OK,
            json!({
                "status": "healthy",
                "runtime": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": unix_seconds(),
            }),
        ),
        _ => json_response(
            StatusCode::NOT_FOUND,
            json!({ "error": "Not found", "path": request.path }),
        ),
    }
}

/// Raw-shaped demo: answers with request metadata, no HTTP conversion.
fn function(_event: Value, context: &Context) -> Result<Value, HandlerError> {
    Ok(json!({
        "statusCode": 200,
        "message": "Function handler response",
        "timestamp": unix_seconds(),
        "requestId": context.request_id,
    }))
}
