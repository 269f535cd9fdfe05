use criteria_expr::{Criteria, Dialect, Expression};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dialect_named(name: &str) -> Option<Dialect> {
    match name.to_ascii_lowercase().as_str() {
        "default" => Some(Dialect::default()),
        "sqlserver" | "mssql" => Some(Dialect::sql_server()),
        "mysql" => Some(Dialect::mysql()),
        "postgres" => Some(Dialect::postgres()),
        "sqlite" => Some(Dialect::sqlite()),
        "access" => Some(Dialect::access()),
        "firebird" => Some(Dialect::firebird()),
        _ => None,
    }
}

/// Reads one criteria per line from stdin and prints its display form and
///  the SQL it renders to. Lines starting with `legacy:` go through the
///  legacy expression parser instead.
///
/// Usage: criteria_check [default|sqlserver|mysql|postgres|sqlite|access|firebird]
fn main() {
    init_logging();

    let name = std::env::args().nth(1).unwrap_or_else(|| "default".to_string());
    let Some(dialect) = dialect_named(&name) else {
        eprintln!("Unknown dialect '{name}'");
        std::process::exit(2);
    };

    for line in std::io::stdin().lines() {
        let Ok(line) = line else {
            break;
        };
        let now = std::time::Instant::now();
        let rendered = if let Some(text) = line.strip_prefix("legacy:") {
            Expression::create(text).and_then(|e| Ok((e.to_string(), e.to_sql_statement(&dialect)?)))
        } else {
            line.parse::<Criteria>()
                .and_then(|c| Ok((c.to_string(), c.to_sql_statement(&dialect)?)))
        };
        print!("[in {}μs] ", now.elapsed().as_micros());
        match rendered {
            Err(e) => println!("Error: {e}"),
            Ok((display, stmt)) => {
                println!("{display}");
                println!("  sql: {stmt}");
                for param in stmt.parameters() {
                    println!("  {} = {}", param.name, param.value);
                }
            }
        }
    }
}
