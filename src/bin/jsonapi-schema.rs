//! JSON:API Schema CLI
//!
//! Command-line interface for serializing, deserializing and inspecting
//! JSON:API documents against a schema.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use jsonapi_schema::{
    load_json_auto, load_json_str, load_schema, parse_query_arg, plan_mutation,
    resolve_query_type_map, Method, MutationOptions, Schema, Serializer,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonapi-schema")]
#[command(about = "Convert between JSON:API documents and plain objects using a schema")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Schema configuration file (types without an entry pass through)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serialize an object or list of objects into a wire document
    Serialize {
        /// Resource type of the input
        #[arg(value_name = "TYPE")]
        resource_type: String,

        /// Input file, or - for stdin
        input: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Deserialize a wire document into plain objects
    Deserialize {
        /// Input file, or - for stdin
        input: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Parse a path and report its URL, id and touched resource types
    Query {
        /// Path segments (e.g. todos 1 or todos/1/relationships/user)
        #[arg(required = true)]
        segments: Vec<String>,

        /// Query parameters as a JSON object (e.g. '{"include":"user"}')
        #[arg(long)]
        params: Option<String>,

        /// Payload whose relationships add related types, or - for stdin
        #[arg(long)]
        payload: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Plan a mutation request without sending it
    Mutation {
        /// Path segments of the mutated resource
        #[arg(required = true)]
        segments: Vec<String>,

        /// Object to send, or - for stdin
        #[arg(long)]
        data: String,

        /// HTTP method: POST, PATCH, PUT or DELETE
        #[arg(long, default_value = "POST")]
        method: Method,

        /// Additional type to invalidate (repeatable)
        #[arg(long)]
        invalidate: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serialize {
            resource_type,
            input,
            common,
        } => run_serialize(&resource_type, &input, &common),

        Commands::Deserialize { input, common } => run_deserialize(&input, &common),

        Commands::Query {
            segments,
            params,
            payload,
            common,
        } => run_query(&segments, params.as_deref(), payload.as_deref(), &common),

        Commands::Mutation {
            segments,
            data,
            method,
            invalidate,
            common,
        } => run_mutation(
            &segments,
            &data,
            MutationOptions { method, invalidate },
            &common,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` overrides
/// the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_serialize(resource_type: &str, input: &str, common: &CommonArgs) -> Result<(), u8> {
    let serializer = load_serializer(common)?;
    let attrs = load_input(input, "input")?;

    let document = serializer.serialize(resource_type, &attrs).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(&document, common)
}

fn run_deserialize(input: &str, common: &CommonArgs) -> Result<(), u8> {
    let serializer = load_serializer(common)?;
    let document = load_input(input, "input")?;

    write_output(&serializer.deserialize(&document), common)
}

fn run_query(
    segments: &[String],
    params: Option<&str>,
    payload: Option<&str>,
    common: &CommonArgs,
) -> Result<(), u8> {
    let schema = load_schema_arg(common)?;
    let descriptor = build_descriptor(segments, params)?;
    let payload = payload
        .map(|source| load_input(source, "payload"))
        .transpose()?;

    let query = parse_query_arg(&descriptor);
    let type_map = resolve_query_type_map(&query, &schema, payload.as_ref());

    let report = json!({
        "url": query.url,
        "id": query.id,
        "params": query.params,
        "keys": query.keys,
        "type": type_map.resource_type,
        "relationships": type_map.relationships,
    });
    write_output(&report, common)
}

fn run_mutation(
    segments: &[String],
    data: &str,
    options: MutationOptions,
    common: &CommonArgs,
) -> Result<(), u8> {
    let serializer = load_serializer(common)?;
    let attrs = load_input(data, "data")?;
    let descriptor = build_descriptor(segments, None)?;

    let request = plan_mutation(&serializer, &descriptor, &attrs, &options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let value = serde_json::to_value(&request).map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    write_output(&value, common)
}

fn load_schema_arg(common: &CommonArgs) -> Result<Schema, u8> {
    match &common.schema {
        Some(path) => load_schema(path).map_err(|e| {
            eprintln!("Error loading schema: {}", e);
            e.exit_code() as u8
        }),
        None => Ok(Schema::new()),
    }
}

fn load_serializer(common: &CommonArgs) -> Result<Serializer, u8> {
    load_schema_arg(common).map(Serializer::new)
}

fn load_input(source: &str, what: &str) -> Result<Value, u8> {
    load_json_auto(source).map_err(|e| {
        eprintln!("Error loading {}: {}", what, e);
        e.exit_code() as u8
    })
}

/// Path segments followed by the optional parameter object.
fn build_descriptor(segments: &[String], params: Option<&str>) -> Result<Value, u8> {
    let mut descriptor: Vec<Value> = segments.iter().cloned().map(Value::String).collect();

    if let Some(params) = params {
        let params = load_json_str(params).map_err(|e| {
            eprintln!("Error parsing --params: {}", e);
            e.exit_code() as u8
        })?;
        if !params.is_object() {
            eprintln!("Error: --params must be a JSON object");
            return Err(2);
        }
        descriptor.push(params);
    }

    Ok(Value::Array(descriptor))
}

fn write_output(value: &Value, common: &CommonArgs) -> Result<(), u8> {
    let json_output = if common.pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match &common.output {
        Some(path) => {
            std::fs::write(path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
