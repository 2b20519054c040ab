//! Command-line front end: compile expressions against a schema file and
//! print them, render them as SQL, or apply them to a JSON data file

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value as Json;
use slog::{info, Logger};

use crate::backend::{MemoryFilter, MemoryOrder, SqlFilter, SqlOrder};
use crate::inspect::{AttributeInspector, EntityType, Schema};
use crate::output::SafeOutput;

/// Compile filter and order expressions into specifications
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// JSON schema describing the mapped entity types
    #[clap(short, long)]
    pub schema: PathBuf,

    /// Entity type the expressions apply to
    #[clap(short, long)]
    pub entity: String,

    /// Filter expression, e.g. 'name:equal-to:"Rose","Tulip"~height:less-than:5.2'
    #[clap(short, long)]
    pub filter: Option<String>,

    /// Order expression, e.g. 'site.name:asc~height:desc'
    #[clap(short, long)]
    pub order: Option<String>,

    /// JSON array of records to filter and sort
    #[clap(short, long)]
    pub data: Option<PathBuf>,

    /// Print a parameterised SQL rendering instead of the specification
    #[clap(long, conflicts_with = "data")]
    pub sql: bool,

    /// Reject paths that traverse a to-many relationship
    #[clap(long)]
    pub strict: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub fn run<W: Write>(args: &Args, logger: &Logger, out: &mut SafeOutput<W>) -> Result<()> {
    if args.filter.is_none() && args.order.is_none() {
        bail!("nothing to do: pass --filter and/or --order");
    }

    let schema = Schema::load(&args.schema)?;
    if !schema.contains(&args.entity) {
        bail!(
            "unknown entity type '{}' (schema declares: {})",
            args.entity,
            itertools::join(schema.entity_names(), ", ")
        );
    }

    let entity = EntityType::new(&args.entity);
    let inspector = AttributeInspector::new(schema)
        .with_aggregate_traversal(!args.strict)
        .with_logger(logger.clone());

    let filter = args
        .filter
        .as_deref()
        .map(|expression| crate::compile_filter(&inspector, &entity, expression))
        .transpose()?;
    let order = args
        .order
        .as_deref()
        .map(|expression| crate::compile_order(&inspector, &entity, expression))
        .transpose()?;

    if let Some(path) = &args.data {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read data file {}", path.display()))?;
        let records: Vec<Json> = serde_json::from_str(&json)
            .with_context(|| format!("{} is not a JSON array of records", path.display()))?;

        let mut selected: Vec<&Json> = match filter {
            Some(spec) => MemoryFilter::new(spec)
                .with_logger(logger.clone())
                .filter(&records),
            None => records.iter().collect(),
        };
        if let Some(spec) = order {
            MemoryOrder::new(spec)
                .with_logger(logger.clone())
                .sort(&mut selected);
        }

        info!(logger, "selected records"; "count" => selected.len());
        for record in selected {
            out.writeln(&serde_json::to_string(record)?)?;
        }
    } else if args.sql {
        if let Some(spec) = &filter {
            let sql = SqlFilter::from_spec(spec);
            out.writeln(&format!("WHERE {}", sql.clause))?;
            for (idx, param) in sql.params.iter().enumerate() {
                out.writeln(&format!("-- ${} = {}", idx + 1, param))?;
            }
        }
        if let Some(spec) = &order {
            out.writeln(&format!("ORDER BY {}", SqlOrder::from_spec(spec).clause))?;
        }
    } else {
        if let Some(spec) = &filter {
            out.writeln(&format!("filter: {}", spec))?;
        }
        if let Some(spec) = &order {
            out.writeln(&format!("order: {}", spec))?;
        }
    }

    Ok(())
}
