// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use partnership_ledger::logging::init_logging;
use partnership_ledger::{
    export_file_name, format_amount, format_signed, parse_amount, parse_date, AllocationEngine, Config,
    Controller, Storage, FIRM_NAME,
};
use std::env;
use std::path::PathBuf;

type CliController = Controller<Box<dyn Storage + Send>>;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = Config::from_env().context("Failed to read configuration")?;

    let command = args.first().map(String::as_str).unwrap_or("ui");

    if command == "ui" {
        return run_ui_mode(&config);
    }

    init_logging(config.log_format, None)?;
    let mut controller = open_controller(&config)?;
    controller.set_actor("cli");

    match command {
        "partners" => print_partners(&controller)?,
        "contribute" => run_contribute(&mut controller, &args[1..])?,
        "record" => run_record(&mut controller, &args[1..])?,
        "periods" => print_periods(&controller),
        "delete" => run_delete(&mut controller, &args[1..])?,
        "export" => run_export(&controller, &args[1..])?,
        "help" | "--help" | "-h" => print_usage(),
        other => {
            print_usage();
            bail!("Unknown command: {}", other);
        }
    }

    Ok(())
}

fn open_controller(config: &Config) -> Result<CliController> {
    let storage = config
        .open_storage()
        .with_context(|| format!("Failed to open storage in {:?}", config.data_dir))?;
    let engine = AllocationEngine::new(config.fee_rate);
    Ok(Controller::load(storage, engine, Utc::now().date_naive()))
}

fn print_usage() {
    println!("{} - Partnership Tracking & P&L Calculator", FIRM_NAME);
    println!();
    println!("Usage: partnership-ledger [command]");
    println!();
    println!("  ui                                    Interactive terminal UI (default)");
    println!("  partners                              List partners, contributions, ownership");
    println!("  contribute <partner-id> <amount>      Set a partner's capital contribution");
    println!("  record <total-value> [--date YYYY-MM-DD] [--notes TEXT]");
    println!("                                        Record a new period");
    println!("  periods                               Show period history");
    println!("  delete <period-id>                    Delete a period");
    println!("  export [path|-]                       Write CSV (default: dated file name)");
}

/// Fail loudly when the last write didn't reach storage
fn check_saved(controller: &CliController) -> Result<()> {
    if controller.status() == Some(partnership_ledger::controller::STATUS_SAVE_FAILED) {
        bail!("Change applied but could not be saved");
    }
    Ok(())
}

fn print_partners(controller: &CliController) -> Result<()> {
    let summary = controller.summary()?;

    println!("👥 Partner Contributions");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for partner in &controller.state().partners {
        println!(
            "  {:>2}  {:<20} ${:>14}  {:>6}%",
            partner.id,
            partner.name,
            format_amount(partner.contribution),
            format_amount(controller.ownership_of(partner.id))
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Total Capital:   ${}", format_amount(summary.total_capital));
    println!("  Active Partners: {}", summary.active_partners);
    Ok(())
}

fn run_contribute(controller: &mut CliController, args: &[String]) -> Result<()> {
    let (id, amount) = match args {
        [id, amount, ..] => (id, amount),
        _ => bail!("Usage: contribute <partner-id> <amount>"),
    };

    let id: u32 = id.parse().with_context(|| format!("Invalid partner id: {}", id))?;
    let amount = parse_amount(amount)?;

    controller.update_contribution(id, amount)?;
    check_saved(controller)?;

    println!("✓ Contribution for partner {} set to ${}", id, format_amount(amount));
    Ok(())
}

fn run_record(controller: &mut CliController, args: &[String]) -> Result<()> {
    let mut value = None;
    let mut date = Utc::now().date_naive();
    let mut notes = String::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--date" => {
                let text = iter.next().context("--date needs a value")?;
                date = parse_date(text)?;
            }
            "--notes" => {
                notes = iter.next().context("--notes needs a value")?.clone();
            }
            other if value.is_none() => value = Some(parse_amount(other)?),
            other => bail!("Unexpected argument: {}", other),
        }
    }

    let value = value.context("Usage: record <total-value> [--date YYYY-MM-DD] [--notes TEXT]")?;
    let id = controller.record_period(date, value, notes)?;
    check_saved(controller)?;

    if let Some(period) = controller.state().period(id) {
        println!("✓ Recorded period {} ({})", id, period.date);
        println!("  Management Fee: -${}", format_amount(period.management_fee));
        println!("  Net Value:       ${}", format_amount(period.net_value));
        println!("  Total P&L:       {}", format_signed(period.profit_loss));
    }
    Ok(())
}

fn print_periods(controller: &CliController) {
    let periods = &controller.state().periods;
    if periods.is_empty() {
        println!("No periods recorded yet.");
        return;
    }

    println!("📈 Historical Performance");
    for (idx, period) in periods.iter().enumerate() {
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Period {} - {}  (id {})", idx + 1, period.date, period.id);
        if !period.notes.is_empty() {
            println!("  {}", period.notes);
        }
        println!(
            "  Value ${}  Fee -${}  Net ${}  P&L {}  Return {}%",
            format_amount(period.total_value),
            format_amount(period.management_fee),
            format_amount(period.net_value),
            format_signed(period.profit_loss),
            format_amount(period.return_pct())
        );
        for p in &period.partners {
            println!(
                "    {:<20} {:>6}%  {:>14}  ${:>14}",
                p.name,
                format_amount(p.ownership),
                format_signed(p.allocation),
                format_amount(p.balance)
            );
        }
    }
}

fn run_delete(controller: &mut CliController, args: &[String]) -> Result<()> {
    let id = args.first().context("Usage: delete <period-id>")?;
    let id: i64 = id.parse().with_context(|| format!("Invalid period id: {}", id))?;

    controller.delete_period(id)?;
    check_saved(controller)?;

    println!("✓ Deleted period {}", id);
    Ok(())
}

fn run_export(controller: &CliController, args: &[String]) -> Result<()> {
    let csv = controller.export_csv()?;

    match args.first().map(String::as_str) {
        Some("-") => print!("{}", csv),
        target => {
            let path = target
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(export_file_name(Utc::now().date_naive())));
            std::fs::write(&path, &csv).with_context(|| format!("Failed to write {:?}", path))?;
            eprintln!("✓ Exported {} periods to {:?}", controller.state().periods.len(), path);
        }
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {:?}", config.data_dir))?;
    init_logging(config.log_format, Some(&config.log_path()))?;

    let controller = open_controller(config)?;
    let gate = partnership_ledger::LoginGate::new(
        controller.state().partners.iter().map(|p| p.name.clone()).collect(),
        config.password_digest.clone(),
    );

    let mut app = ui::App::new(controller, gate);
    ui::run_ui(&mut app)?;

    println!("\n✅ {} closed", FIRM_NAME);
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin ledger-server --features server");
    std::process::exit(1);
}
