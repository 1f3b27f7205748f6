//! Thin CLI driver for the transpiler core (spec.md §6): `transform-sql`,
//! `transform-routine`, and `dump-ast`, each taking `--schema` and
//! `--indices-path`. The core never parses source text itself, so this
//! binary also owns the minimal convenience reader in `reader`.

mod reader;

use std::fs;
use std::path::PathBuf;

use env_logger::Env;
use plsql2pg_core::{ErrorKind, Indices, TranspileResult};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "plsql2pg", about = "Oracle PL/SQL to PostgreSQL PL/pgSQL transpiler")]
enum Opt {
    /// Transform a standalone SQL statement.
    TransformSql {
        /// Path to the file holding the Oracle SQL statement.
        input_path: PathBuf,
        /// Current schema, used to qualify unqualified names.
        #[structopt(long)]
        schema: String,
        /// Path to a JSON-encoded `Indices` snapshot.
        #[structopt(long)]
        indices_path: PathBuf,
    },
    /// Transform a PROCEDURE or FUNCTION definition.
    TransformRoutine {
        input_path: PathBuf,
        #[structopt(long)]
        schema: String,
        #[structopt(long)]
        indices_path: PathBuf,
    },
    /// Transform an anonymous PL/SQL block (`DECLARE ... BEGIN ... END;`).
    TransformBlock {
        input_path: PathBuf,
        #[structopt(long)]
        schema: String,
        #[structopt(long)]
        indices_path: PathBuf,
    },
    /// Print a textual AST dump instead of rewriting.
    DumpAst {
        input_path: PathBuf,
        /// Which reader entry point to parse the input with.
        #[structopt(long, default_value = "sql")]
        kind: String,
    },
}

fn load_indices(path: &PathBuf) -> Result<Indices, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn print_result(result: TranspileResult) {
    match result {
        TranspileResult::Success { postgres_source, diagnostics, .. } => {
            println!("{postgres_source}");
            for d in &diagnostics {
                log::warn!("{:?}: {}", d.severity, d.message);
            }
        }
        TranspileResult::Failure { error_kind, error_message, diagnostics, .. } => {
            log::error!("transpile failed ({}): {error_message}", describe_kind(error_kind));
            for d in &diagnostics {
                log::warn!("{:?}: {}", d.severity, d.message);
            }
            std::process::exit(1);
        }
    }
}

fn describe_kind(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ParseError => "parse error",
        ErrorKind::UnsupportedConstruct => "unsupported construct",
        ErrorKind::SemanticViolation => "semantic violation",
        ErrorKind::TransformationBug => "transformation bug",
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("plsql2pg=info")).init();
    let opt = Opt::from_args();

    match opt {
        Opt::TransformSql { input_path, schema, indices_path } => {
            log::info!("transforming SQL statement from {}", input_path.display());
            let source = fs::read_to_string(&input_path)?;
            let indices = load_indices(&indices_path)?;
            let query = reader::Parser::new(&source)?.parse_query()?;
            print_result(plsql2pg_core::transform_sql(&source, &query, &schema, &indices));
        }
        Opt::TransformRoutine { input_path, schema, indices_path } => {
            log::info!("transforming routine from {}", input_path.display());
            let source = fs::read_to_string(&input_path)?;
            let indices = load_indices(&indices_path)?;
            let routine = reader::Parser::new(&source)?.parse_routine()?;
            print_result(plsql2pg_core::transform_routine(&source, &routine, &schema, &indices));
        }
        Opt::TransformBlock { input_path, schema, indices_path } => {
            log::info!("transforming anonymous block from {}", input_path.display());
            let source = fs::read_to_string(&input_path)?;
            let indices = load_indices(&indices_path)?;
            let (declarations, body, handlers) = reader::Parser::new(&source)?.parse_block_body()?;
            let unit = plsql2pg_core::ast::TranslationUnit::AnonymousBlock { declarations, body, handlers };
            print_result(plsql2pg_core::transform_anonymous_block(&source, &unit, &schema, &indices));
        }
        Opt::DumpAst { input_path, kind } => {
            log::info!("dumping AST for {} (kind={kind})", input_path.display());
            let source = fs::read_to_string(&input_path)?;
            let unit = match kind.as_str() {
                "sql" => plsql2pg_core::ast::TranslationUnit::Sql(reader::Parser::new(&source)?.parse_query()?),
                "routine" => plsql2pg_core::ast::TranslationUnit::Routine(reader::Parser::new(&source)?.parse_routine()?),
                "block" => {
                    let (declarations, body, handlers) = reader::Parser::new(&source)?.parse_block_body()?;
                    plsql2pg_core::ast::TranslationUnit::AnonymousBlock { declarations, body, handlers }
                }
                other => return Err(format!("unknown --kind '{other}', expected sql|routine|block").into()),
            };
            println!("{}", plsql2pg_core::dump_ast(&unit));
        }
    }
    Ok(())
}
