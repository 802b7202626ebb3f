use std::path::PathBuf;
use std::process;
use tracing::{debug, info};
use websetup::config::{self, Config};
use websetup::core::db::StatementType;
use websetup::{DbError, ExecutionContext, Result, Value};

const USAGE: &str = "usage: websetup [--config PATH] SQL [ARG...]";

/// Parsed command line
#[derive(Debug, PartialEq)]
struct Invocation {
    config: Option<PathBuf>,
    sql: String,
    args: Vec<Value>,
}

fn parse_args<I: IntoIterator<Item = String>>(argv: I) -> Result<Invocation> {
    let mut argv = argv.into_iter();
    let mut config = None;
    let mut positional = Vec::new();
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = argv
                    .next()
                    .ok_or_else(|| DbError::InvalidArgument("--config needs a path".to_string()))?;
                config = Some(PathBuf::from(path));
            }
            _ => positional.push(arg),
        }
    }
    let mut positional = positional.into_iter();
    let sql = positional
        .next()
        .ok_or_else(|| DbError::InvalidArgument(USAGE.to_string()))?;
    Ok(Invocation {
        config,
        sql,
        args: positional.map(Value::from).collect(),
    })
}

fn load(invocation: &Invocation) -> Result<Config> {
    let path = match &invocation.config {
        Some(path) => path.clone(),
        None => config::default_config_path()
            .ok_or_else(|| DbError::Config("no configuration directory available".to_string()))?,
    };
    config::load_config(path)
}

fn run(invocation: Invocation) -> Result<()> {
    let config = load(&invocation)?;
    tracing_subscriber::fmt()
        .with_max_level(config.logging.level_filter()?)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting websetup...");
    config::initialize_from_config(&config.database)?;

    let mut ctx = ExecutionContext::new();
    let statement = StatementType::from_sql(&invocation.sql);
    debug!("statement type: {:?}", statement);
    if statement.returns_rows() {
        for row in ctx.select_all(&invocation.sql, &invocation.args)? {
            let line = serde_json::to_string(&row)
                .map_err(|e| DbError::InvalidArgument(e.to_string()))?;
            println!("{}", line);
        }
    } else {
        let affected = ctx.update(&invocation.sql, &invocation.args)?;
        println!("{}", affected);
    }
    Ok(())
}

fn main() {
    let result = parse_args(std::env::args().skip(1)).and_then(run);
    if let Err(e) = result {
        eprintln!("websetup: {}", e);
        process::exit(1);
    }
}
