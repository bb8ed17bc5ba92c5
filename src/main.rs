use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lab_supplies_lib::alerts::{AlertBoard, AlertFilter, SortOrder};
use lab_supplies_lib::dashboard::load_teacher_chart;
use lab_supplies_lib::location::ShelfLookup;
use lab_supplies_lib::models::{Movement, MovementType, RequestStatus};
use lab_supplies_lib::requests::UsageRequestStore;
use lab_supplies_lib::{
    diagnostics, storage, ApiClient, AppConfig, MovementListStore, OperatorContext,
    ReconciliationSession, SubmitOutcome, TypeFilter,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "labstock", version, about = "Lab supplies inventory operator client")]
struct Cli {
    /// Config file (default: labstock.toml next to the binary)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store the operator identity sent with backend requests
    Login { id: String, name: String },
    /// Forget the stored operator
    Logout,
    /// List inventory movements
    Movements {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// all, prestamo or devolucion
        #[arg(long = "type", default_value = "all")]
        kind: TypeFilter,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// List usage requests in one status
    Requests {
        #[arg(long, default_value = "pendiente")]
        status: RequestStatus,
    },
    /// Approve, reject or complete a usage request
    SetStatus { id: i64, status: RequestStatus },
    /// List stock alerts
    Alerts {
        #[arg(long, default_value = "all")]
        state: AlertFilter,
        /// desc (newest first) or asc
        #[arg(long, default_value = "desc")]
        order: SortOrder,
    },
    /// Show what is stored in one slot of a scanned shelf
    Shelf { code: String, slot: u8 },
    /// Register the return of a loan; unlisted supplies count as fully returned
    Return {
        id: i64,
        /// SUPPLY_ID=QUANTITY, repeatable
        #[arg(long = "returned", value_parser = parse_returned)]
        returned: Vec<(i64, String)>,
        /// Show the not-returned list without sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Teachers with the most laboratory sessions
    TopTeachers,
}

fn parse_returned(raw: &str) -> Result<(i64, String), String> {
    let (id, qty) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SUPPLY_ID=QUANTITY, got {raw}"))?;
    let id = id
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid supply id: {id}"))?;
    Ok((id, qty.to_string()))
}

fn require_operator() -> Result<OperatorContext> {
    storage::load_operator()
        .context("Failed to read stored operator")?
        .ok_or_else(|| anyhow::anyhow!("No operator logged in; run `labstock login <id> <name>`"))
}

fn print_movement(m: &Movement) {
    let (label, sign) = match m.kind {
        MovementType::Loan => ("SALIDA", "-"),
        MovementType::Return => ("ENTRADA", "+"),
        MovementType::Other => ("OTRO", ""),
    };
    let when = m
        .delivered_time()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let action = if m.kind == MovementType::Loan && m.can_complete() {
        "[completar]"
    } else {
        ""
    };
    println!(
        "#{:<6} {:<8} {}{} {:<6} {:<30} solicitud #{:<6} {:<20} {} {}",
        m.id,
        label,
        sign,
        m.quantity.unwrap_or(0),
        m.unit.as_deref().unwrap_or(""),
        m.supply_name.as_deref().unwrap_or("Insumo no especificado"),
        m.request_id.map(|id| id.to_string()).unwrap_or_default(),
        m.responsible.as_deref().unwrap_or(""),
        when,
        action,
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _guard = diagnostics::init_logging(&config.logging);
    info!("Starting labstock v{}", env!("CARGO_PKG_VERSION"));

    let api = ApiClient::new(&config.api.base_url, config.api.timeout())?;

    match cli.command {
        Command::Login { id, name } => {
            if id.trim().is_empty() {
                bail!("Operator id cannot be empty");
            }
            storage::save_operator(&OperatorContext::new(id.trim(), name.trim()))?;
            println!("Logged in as {}", name.trim());
        }
        Command::Logout => {
            storage::clear_operator()?;
            println!("Logged out");
        }
        Command::Movements { page, kind, search } => {
            let operator = require_operator()?;
            let mut store = MovementListStore::with_page_size(config.api.page_size);
            store.load(&api, &operator, page).await?;
            let visible = store.apply_filter(kind, &search).to_vec();
            let pagination = store.pagination();

            if visible.is_empty() {
                if store.movements().is_empty() {
                    println!("No hay movimientos registrados");
                } else {
                    println!("No hay movimientos que coincidan");
                }
            }
            for m in &visible {
                print_movement(m);
            }
            println!(
                "page {}/{} ({} total)",
                pagination.page, pagination.total_pages, pagination.total
            );
        }
        Command::Requests { status } => {
            let operator = require_operator()?;
            let mut store = UsageRequestStore::new();
            store.load(&api, &operator).await?;
            let counts = store.counts();
            let summary: Vec<String> = RequestStatus::ALL
                .iter()
                .map(|s| format!("{} {}", s.as_str(), counts.get(*s)))
                .collect();
            println!("{}", summary.join(" | "));
            let visible = store.set_status_filter(status);
            if visible.is_empty() {
                println!("No se encontraron solicitudes {}", status.as_str().to_lowercase());
            }
            for r in visible {
                println!(
                    "#{:<6} {:<25} {:<25} {}",
                    r.id,
                    r.teacher_name.as_deref().unwrap_or("-"),
                    r.laboratory_name.as_deref().unwrap_or("-"),
                    r.practice_title.as_deref().unwrap_or("Sin práctica"),
                );
            }
        }
        Command::SetStatus { id, status } => {
            let operator = require_operator()?;
            let mut store = UsageRequestStore::new();
            store.load(&api, &operator).await?;
            store.change_status(&api, &operator, id, status).await?;
            println!("Request #{id} is now {status}");
        }
        Command::Alerts { state, order } => {
            let mut board = AlertBoard::new();
            board.load(&api).await?;
            board.set_filter(state);
            board.set_order(order);
            for a in board.visible() {
                println!(
                    "{:<9} {:<30} stock {} (min {}, max {}) {}",
                    format!("{:?}", a.state),
                    a.supply_name.as_deref().unwrap_or("No disponible"),
                    a.stock_current.unwrap_or(0),
                    a.stock_min.unwrap_or(0),
                    a.stock_max.unwrap_or(0),
                    a.timestamp()
                        .map(|t| t.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "No disponible".to_string()),
                );
            }
        }
        Command::Shelf { code, slot } => {
            let mut lookup = ShelfLookup::from_scan(&code)
                .ok_or_else(|| anyhow::anyhow!("Not a shelf code: {code:?}"))?;
            let supplies = lookup.open_slot(&api, slot).await?;
            if supplies.is_empty() {
                println!("No hay insumos en esta ubicación");
            }
            for s in supplies {
                println!(
                    "#{:<6} {:<30} {} {}",
                    s.supply_id,
                    s.name,
                    s.quantity.map(|q| q.to_string()).unwrap_or_default(),
                    s.unit.as_deref().unwrap_or(""),
                );
            }
        }
        Command::Return {
            id,
            returned,
            dry_run,
        } => {
            let operator = require_operator()?;
            let mut session = ReconciliationSession::new();
            session.open(&api, id).await?;

            for (supply_id, raw) in &returned {
                let stored = session.set_returned(*supply_id, raw)?;
                if stored.to_string() != raw.trim() {
                    println!("supply {supply_id}: {raw:?} recorded as {stored}");
                }
            }

            let calc = session.calculator();
            for line in calc.lines() {
                println!(
                    "{:<30} total {:>5} devueltos {:>5} no devueltos {:>5} {}",
                    line.name,
                    line.total_loaned,
                    calc.returned(line.supply_id),
                    calc.outstanding(line.supply_id),
                    line.unit.as_deref().unwrap_or(""),
                );
            }

            if dry_run {
                let pending = session.compute_not_returned();
                println!("{}", serde_json::to_string_pretty(&pending)?);
                return Ok(());
            }

            let mut list = MovementListStore::with_page_size(config.api.page_size);
            match session.submit(&api, &operator, &mut list).await? {
                SubmitOutcome::Completed { not_returned } => {
                    println!(
                        "Return registered. Supplies not returned: {}",
                        not_returned.len()
                    );
                }
                SubmitOutcome::Stale => println!("Return superseded; nothing applied"),
            }
        }
        Command::TopTeachers => {
            let chart = load_teacher_chart(&api).await?;
            for (label, value) in chart.labels.iter().zip(&chart.values) {
                println!("{label:<30} {value}");
            }
        }
    }

    Ok(())
}
