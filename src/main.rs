//! Command-line interface for xmldbms

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
use xmldbms::config::{GenerateMapConfig, Properties};
#[cfg(feature = "cli")]
use xmldbms::exports::{generate_map, load_schema};
#[cfg(feature = "cli")]
use xmldbms::{ActionCompiler, DdlWriter, Dialect, Dtd, Map, MapFactory, MapOptions, MapReader};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xmldbms")]
#[command(author, version, about = "XML to relational database mapping tool", long_about = None)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a map document and CREATE TABLE script from a schema
    #[command(name = "generate-map")]
    GenerateMap {
        /// Properties as key=value pairs, e.g. SchemaFile=orders.dtd
        #[arg(value_name = "PROPERTY", required = true)]
        properties: Vec<String>,
    },

    /// Compile an actions document
    #[command(name = "compile-actions")]
    CompileActions {
        /// Path to the actions document
        #[arg(value_name = "ACTIONS")]
        actions: PathBuf,

        /// Map document to check the actions against
        #[arg(short, long, value_name = "FILE")]
        map: Option<PathBuf>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Write the CREATE TABLE script for a map document
    Ddl {
        /// Path to the map document
        #[arg(value_name = "MAP")]
        map: PathBuf,

        /// SQL dialect: standard, mysql, postgresql, oracle, duckdb
        #[arg(short, long, default_value = "standard")]
        dialect: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show how the element types of a schema are mapped
    Inspect {
        /// Path to a DTD, an XML document with a DOCTYPE, or a DDML document
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Schema type: dtd, xml or ddml (defaults to the file extension)
        #[arg(short = 't', long)]
        schema_type: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::GenerateMap { properties } => cmd_generate_map(properties),
        Commands::CompileActions { actions, map, json } => cmd_compile_actions(actions, map, json),
        Commands::Ddl {
            map,
            dialect,
            output,
        } => cmd_ddl(map, dialect, output),
        Commands::Inspect {
            schema,
            schema_type,
            json,
        } => cmd_inspect(schema, schema_type, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn cmd_generate_map(properties: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let props = Properties::from_args(&properties)?;
    let config = GenerateMapConfig::from_properties(&props)?;
    let (map, result) = generate_map(&config)?;

    println!(
        "Mapped {} classes to {} tables",
        map.class_maps.len(),
        map.tables.len()
    );
    for path in result.exported_files() {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_compile_actions(
    actions_path: PathBuf,
    map_path: Option<PathBuf>,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let map = match map_path {
        Some(path) => Some(MapReader::new().read_file(path)?),
        None => None,
    };
    let mut compiler = ActionCompiler::new();
    if let Some(map) = &map {
        compiler = compiler.with_map(map);
    }
    let actions = compiler.compile_file(&actions_path)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(());
    }

    match &actions.default_action {
        Some(kind) => println!("Default action: {}", kind),
        None => println!("Default action: (none)"),
    }
    println!("\n=== Actions ===");
    for action in actions.actions.values() {
        println!("  {} : {}", action.element_type.qualified(), action.kind);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_ddl(
    map_path: PathBuf,
    dialect: String,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let dialect: Dialect = dialect.parse()?;
    let map = MapReader::new().read_file(&map_path)?;
    let sql = DdlWriter::new(dialect).to_string(&map)?;

    match output {
        Some(path) => {
            fs::write(&path, &sql)?;
            eprintln!("Output written to {}", path.display());
        }
        None => print!("{}", sql),
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_inspect(
    schema_path: PathBuf,
    schema_type: Option<String>,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut props = Properties::new();
    props.set("SchemaFile", schema_path.display().to_string());
    if let Some(schema_type) = schema_type {
        props.set("SchemaType", schema_type);
    }
    let config = GenerateMapConfig::from_properties(&props)?;
    let dtd = load_schema(&config)?;
    let map = MapFactory::new(MapOptions::default().with_namespaces(config.namespaces.clone()))
        .create_map(&dtd)?;

    if json_output {
        print_inspect_json(&dtd, &map)?;
    } else {
        print_inspect_summary(&dtd, &map, &schema_path);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn print_inspect_summary(dtd: &Dtd, map: &Map, path: &std::path::Path) {
    println!("xmldbms v{}", xmldbms::VERSION);
    println!();
    println!("Schema: {}", path.display());
    println!("  Element types: {}", dtd.element_types.len());
    println!("  Classes: {}", map.class_maps.len());
    println!("  Tables: {}", map.tables.len());
    let roots: Vec<_> = map
        .root_class_maps()
        .map(|c| c.element_type.qualified())
        .collect();
    if !roots.is_empty() {
        println!("  Roots: {}", roots.join(", "));
    }

    println!("\n=== Element Types ===");
    for (name, element_type) in &dtd.element_types {
        let kind = match map.class_map(name) {
            Some(class_map) if class_map.root => format!("class, root -> {}", class_map.table),
            Some(class_map) => format!("class -> {}", class_map.table),
            None => "property".to_string(),
        };
        println!("  {} ({}) : {}", name, element_type.content_type, kind);
    }
}

#[cfg(feature = "cli")]
fn print_inspect_json(dtd: &Dtd, map: &Map) -> Result<(), Box<dyn std::error::Error>> {
    use serde_json::json;

    let elements: Vec<_> = dtd
        .element_types
        .iter()
        .map(|(name, element_type)| {
            let class_map = map.class_map(name);
            json!({
                "name": name,
                "content": element_type.content_type.to_string(),
                "attributes": element_type.attributes.keys().collect::<Vec<_>>(),
                "class": class_map.is_some(),
                "root": class_map.map_or(false, |c| c.root),
                "table": class_map.map(|c| c.table.clone()),
            })
        })
        .collect();

    let output = json!({
        "version": xmldbms::VERSION,
        "elementTypes": elements,
        "tables": map.tables.keys().collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
