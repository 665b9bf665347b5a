//! budget-runner: headless driver for the restock budget simulation.
//!
//! Usage:
//!   budget-runner --db budget.db --data-dir ./data --import-prices
//!   budget-runner --db budget.db --ipc-mode

use anyhow::Result;
use restock_core::{
    command::BudgetCommand,
    config::BudgetConfig,
    format::{format_money, format_percent},
    session::BudgetSession,
    snapshot::SimulationSnapshot,
    store::SimStore,
    tier::Tier,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Command { command: BudgetCommand },
    ReloadPrices,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let import_prices = args.iter().any(|a| a == "--import-prices");
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");

    if !ipc_mode {
        println!("Restock budget-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let config = BudgetConfig::load(data_dir)?;
    let store = SimStore::open(db)?;
    store.migrate()?;

    if import_prices || store.price_record_count()? == 0 {
        let n = store.import_price_records(&config.price_records)?;
        log::info!("imported {n} price records from {data_dir}");
    }

    let mut session = BudgetSession::open(&store, &config)?;

    if ipc_mode {
        run_ipc_loop(&mut session)?;
    } else {
        print_summary(&session.snapshot());
    }

    Ok(())
}

fn run_ipc_loop(session: &mut BudgetSession<&SimStore>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => {}
            IpcCommand::Command { command } => {
                let diagnostics = session.apply(command);
                for d in &diagnostics {
                    log::debug!("diagnostic: {d}");
                }
            }
            IpcCommand::ReloadPrices => {
                if let Err(e) = session.reload_prices() {
                    log::warn!("reload_prices failed: {e}");
                    let err_json = serde_json::json!({ "error": e.to_string() });
                    writeln!(stdout, "{}", err_json)?;
                    stdout.flush()?;
                    continue;
                }
            }
        }
        writeln!(stdout, "{}", serde_json::to_string(&session.snapshot())?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_summary(snap: &SimulationSnapshot) {
    println!("=== SIMULATION SUMMARY ===");
    println!("  session:        {}", snap.session_id);
    println!("  groups:         {}", snap.selections.len());
    println!("  selected skus:  {}", snap.line_totals.len());

    println!();
    println!("=== LINES ===");
    if snap.line_totals.is_empty() {
        println!("  (No SKUs selected)");
    } else {
        for line in &snap.line_totals {
            println!(
                "  {} / {} | qty {} @ {} = {}",
                line.group_key,
                line.sku,
                line.quantity,
                format_money(line.unit_price),
                format_money(line.total)
            );
        }
        for (group_key, list) in &snap.selections {
            for s in list.iter().filter(|s| s.diagnostic.is_some()) {
                if let Some(d) = &s.diagnostic {
                    println!("  ! {group_key} / {}: {d}", s.sku);
                }
            }
        }
    }

    println!();
    println!("=== PER-TIER COMPARISON ===");
    for tier in Tier::ALL {
        let total = snap.per_tier_total.get(&tier).copied().unwrap_or_default();
        println!("  {:>5} units | {}", tier.quantity(), format_money(total));
    }

    println!();
    println!("=== BUDGET ===");
    println!("  grand total:    {}", format_money(snap.grand_total));
    println!("  budget cap:     {}", format_money(snap.settings.budget_cap));
    println!("  remaining:      {}", format_money(snap.budget.remaining_budget));
    println!("  used:           {}", format_percent(snap.budget.percent_used));
    println!(
        "  deposit ({}):  {}",
        format_percent(snap.settings.deposit_percentage),
        format_money(snap.budget.deposit_amount)
    );
    if snap.over_budget {
        println!("  ** OVER BUDGET **");
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
