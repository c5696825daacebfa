#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;
extern crate clap;
use clap::{App, Arg};
use env_logger::Env;

use common::database::Database;
use common::logical_plan::LogicalPlan;
use common::types::with_thread_instance;
use common::FlowError;
use queryexe::Executor;
use std::fs;
use std::process;

use crate::config::{parse_schema, OutputFormat, RunConfig};

mod config;
mod csv_utils;

/// Loads the tables, runs the plan and renders the result.
fn run(config: RunConfig) -> Result<String, FlowError> {
    let db = Database::new(String::from("cli"));
    let types = config.type_factory();
    // Record types shared between tables are built once.
    with_thread_instance(|_| -> Result<(), FlowError> {
        for table in &config.tables {
            let schema = parse_schema(&table.columns, &types)?;
            db.add_table(csv_utils::import_csv(&table.name, &table.path, schema)?);
        }
        Ok(())
    })?;

    let contents = fs::read_to_string(&config.plan)?;
    let lp = LogicalPlan::from_json(&contents)?;
    debug!("Logical plan:\n{}", lp);

    let physical_plan = Executor::logical_plan_to_physical_plan(&db, &lp)?;
    let mut executor = Executor::new_ref();
    executor.configure_query(physical_plan);
    let result = executor.execute()?;

    Ok(match config.format {
        OutputFormat::Table => result.to_table_string(),
        OutputFormat::Json => serde_json::to_string_pretty(&result.to_json())?,
    })
}

fn main() {
    // Configure log environment
    env_logger::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file, replacing the other flags")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("plan")
                .short("p")
                .long("plan")
                .value_name("FILE")
                .help("JSON logical plan to run")
                .takes_value(true)
                .required_unless("config"),
        )
        .arg(
            Arg::with_name("table")
                .short("t")
                .long("table")
                .value_name("NAME=CSV_PATH")
                .help("Loads a headerless csv file as a table")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("schema")
                .short("s")
                .long("schema")
                .value_name("NAME=COL:TYPE,...")
                .help("Column names and types of a table")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("type")
                .long("type")
                .value_name("NAME=FIELD:TYPE,...")
                .help("Defines a record type usable in --schema")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .possible_values(&["table", "json"])
                .default_value("table")
                .help("Output format")
                .takes_value(true),
        )
        .get_matches();

    let config: Result<RunConfig, FlowError> = if let Some(config_path) = matches.value_of("config")
    {
        fs::read_to_string(config_path)
            .map_err(FlowError::from)
            .and_then(|contents| serde_json::from_str(&contents).map_err(FlowError::from))
    } else {
        let tables: Vec<&str> = matches.values_of("table").map_or(Vec::new(), |v| v.collect());
        let schemas: Vec<&str> = matches.values_of("schema").map_or(Vec::new(), |v| v.collect());
        let types: Vec<&str> = matches.values_of("type").map_or(Vec::new(), |v| v.collect());
        matches
            .value_of("format")
            .unwrap_or("table")
            .parse::<OutputFormat>()
            .and_then(|format| {
                RunConfig::from_flags(
                    matches.value_of("plan").unwrap_or_default(),
                    &tables,
                    &schemas,
                    &types,
                    format,
                )
            })
    };

    let outcome = config.and_then(|config| {
        info!("Running with config: {:?}", config);
        run(config)
    });
    match outcome {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
