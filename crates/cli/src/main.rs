use anyhow::Context;
use clap::{Parser, Subcommand};
use lis_core::config::{
    display_name_from_env_value, role_from_env_value, seed_file_from_env_value,
    sync_delay_from_env_value, thresholds_from_env_values, warehouse_thresholds_from_env_values,
};
use lis_core::constants::{
    DISPLAY_NAME_ENV, LOW_STOCK_THRESHOLD_ENV, MEDIUM_STOCK_THRESHOLD_ENV, ROLE_ENV,
    SEED_FILE_ENV, SYNC_DELAY_MS_ENV, WAREHOUSE_LOW_STOCK_THRESHOLD_ENV,
    WAREHOUSE_MEDIUM_STOCK_THRESHOLD_ENV,
};
use lis_core::dates;
use lis_core::models::{
    EventAction, EventLogField, InstrumentMode, ModeChangeRequest, StockThresholds,
    TestOrderField, TestOrderStatus,
};
use lis_core::{CoreConfig, Dashboard, ListView, Notice, Record, Role, SeedData, SortOrder, Tab};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lis")]
#[command(about = "Laboratory information system dashboard CLI")]
struct Cli {
    /// Dashboard role (lab_user or manager); overrides LIS_ROLE
    #[arg(long, global = true)]
    role: Option<String>,
    /// YAML seed file; overrides LIS_SEED_FILE
    #[arg(long, global = true)]
    seed: Option<PathBuf>,
    /// Print records as JSON instead of text rows
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the overview cards for the role
    Overview {
        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// List test orders
    Orders {
        #[arg(long)]
        query: Option<String>,
        /// Status label, or "all"
        #[arg(long)]
        status: Option<String>,
        /// Earliest creation date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Latest creation date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    /// List event logs
    Events {
        /// "newest" or "oldest"
        #[arg(long, default_value = "newest")]
        sort: String,
        #[arg(long)]
        query: Option<String>,
        /// Event action label, or "all"
        #[arg(long)]
        action: Option<String>,
    },
    /// List instruments
    Instruments,
    /// Change an instrument's mode
    SetMode {
        /// Instrument id
        id: String,
        /// Target mode (ready, maintenance, calibration, inactive)
        mode: String,
        /// Reason, required for maintenance and inactive
        #[arg(long)]
        reason: Option<String>,
        /// Confirm QC passed, required for ready
        #[arg(long)]
        qc_passed: bool,
    },
    /// List reagents or warehouse stock
    Reagents {
        /// Show warehouse stock instead of bench reagents
        #[arg(long)]
        warehouse: bool,
        #[arg(long)]
        query: Option<String>,
        /// Mark reagents past their expiration date as expired first
        #[arg(long)]
        expire: bool,
    },
    /// List audit log entries
    Audit,
    /// Queue HL7 ORU^R01 messages for resulted orders
    PublishHl7,
    /// Sync configuration entries
    SyncConfig,
    /// Print the resolved seed data as JSON
    Seed,
}

/// Resolves configuration from the environment, with command-line flags taking precedence.
fn resolve_config(role: Option<String>, seed: Option<PathBuf>) -> anyhow::Result<CoreConfig> {
    let env = |name: &str| std::env::var(name).ok();

    let role = match role {
        Some(role) => role.parse::<Role>()?,
        None => role_from_env_value(env(ROLE_ENV))?,
    };
    let seed_file = seed.or_else(|| seed_file_from_env_value(env(SEED_FILE_ENV)));

    Ok(CoreConfig::new(
        role,
        display_name_from_env_value(env(DISPLAY_NAME_ENV))?,
        seed_file,
        thresholds_from_env_values(
            env(LOW_STOCK_THRESHOLD_ENV),
            env(MEDIUM_STOCK_THRESHOLD_ENV),
            StockThresholds::default(),
        )?,
        warehouse_thresholds_from_env_values(
            env(WAREHOUSE_LOW_STOCK_THRESHOLD_ENV),
            env(WAREHOUSE_MEDIUM_STOCK_THRESHOLD_ENV),
        )?,
        sync_delay_from_env_value(env(SYNC_DELAY_MS_ENV))?,
    ))
}

fn print_rows<T: Record + Serialize>(
    json: bool,
    rows: &[&T],
    line: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else if rows.is_empty() {
        println!("No {} records match.", T::KIND);
    } else {
        for row in rows {
            println!("{}", line(row));
        }
    }
    Ok(())
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        println!("[{:?}] {}: {}", notice.level, notice.title, notice.message);
    }
}

fn print_view_notices<T: Record + lis_core::query::Filterable>(view: &mut ListView<T>) {
    print_notices(view.take_notices());
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("lis=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'lis --help' for commands");
        return Ok(());
    };

    let config = resolve_config(cli.role, cli.seed)?;
    let seed = SeedData::load(config.seed_file()).context("loading seed data")?;
    let sync_delay = config.sync_delay();
    let mut dashboard = Dashboard::new(config, &seed)?;
    let json = cli.json;
    let now = dates::now();

    match command {
        Commands::Overview { date } => {
            let today = match date {
                Some(text) => dates::parse_date(&text)
                    .with_context(|| format!("invalid date '{text}', expected YYYY-MM-DD"))?,
                None => now.date(),
            };
            let overview = dashboard.overview(today);
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                println!("{} ({}) - {}", overview.display_name, overview.role, overview.date);
                for card in &overview.cards {
                    println!("  {:<24} {:>6}   [{}]", card.title, card.value, card.tab);
                }
            }
        }
        Commands::Orders {
            query,
            status,
            from,
            to,
        } => {
            dashboard.select_tab(Tab::TestOrders)?;
            let view = &mut dashboard.test_orders;
            if let Some(query) = query {
                view.set_query(query);
            }
            if let Some(status) = status {
                let status = match status.trim() {
                    s if s.eq_ignore_ascii_case("all") => "all".to_owned(),
                    s => s.parse::<TestOrderStatus>()?.label().to_owned(),
                };
                view.set_selection(TestOrderField::Status, status.as_str());
            }
            if from.is_some() || to.is_some() {
                view.set_date_range_text(from.as_deref(), to.as_deref())?;
            }
            print_rows(json, &view.visible(), |o| {
                format!(
                    "{}\t{}\t{}\t{}\t{}",
                    o.id, o.patient_name, o.test_type, o.status, o.created_at
                )
            })?;
        }
        Commands::Events {
            sort,
            query,
            action,
        } => {
            dashboard.select_tab(Tab::EventLogs)?;
            let view = &mut dashboard.event_logs;
            let order = match sort.trim() {
                s if s.eq_ignore_ascii_case("newest") => SortOrder::NewestFirst,
                s if s.eq_ignore_ascii_case("oldest") => SortOrder::OldestFirst,
                s => s.parse::<SortOrder>()?,
            };
            view.set_sort(Some(order));
            if let Some(query) = query {
                view.set_query(query);
            }
            if let Some(action) = action {
                let action = match action.trim() {
                    a if a.eq_ignore_ascii_case("all") => "all".to_owned(),
                    a => a.parse::<EventAction>()?.label().to_owned(),
                };
                view.set_selection(EventLogField::Action, action.as_str());
            }
            print_rows(json, &view.visible(), |e| {
                format!("{}\t{}\t{}\t{}\t{}", e.id, e.timestamp, e.action, e.operator, e.message)
            })?;
        }
        Commands::Instruments => {
            dashboard.select_tab(Tab::Instruments)?;
            print_rows(json, &dashboard.instruments.visible(), |i| {
                format!("{}\t{}\t{}\t{}\t{}", i.id, i.name, i.mode, i.status, i.location)
            })?;
        }
        Commands::SetMode {
            id,
            mode,
            reason,
            qc_passed,
        } => {
            dashboard.select_tab(Tab::Instruments)?;
            let mut request = ModeChangeRequest::new(mode.parse::<InstrumentMode>()?)
                .with_qc_passed(qc_passed);
            if let Some(reason) = reason {
                request = request.with_reason(reason);
            }
            let view = &mut dashboard.instruments;
            view.open_mode_change(&id)?;
            let result = view.change_mode(&id, &request, now);
            for (field, message) in view.errors().iter() {
                eprintln!("  {field}: {message}");
            }
            print_view_notices(view);
            let transition = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(&transition)?);
            }
        }
        Commands::Reagents {
            warehouse,
            query,
            expire,
        } => {
            let view = if warehouse {
                dashboard.select_tab(Tab::Warehouse)?;
                &mut dashboard.warehouse
            } else {
                dashboard.select_tab(Tab::Reagents)?;
                &mut dashboard.reagents
            };
            if expire {
                view.expire_lapsed(now.date(), now)?;
                print_view_notices(view);
            }
            if let Some(query) = query {
                view.set_query(query);
            }
            print_rows(json, &view.visible(), |r| {
                format!(
                    "{}\t{}\t{} {}\t{}\t{}",
                    r.id, r.name, r.quantity, r.unit, r.expiration_date, r.status
                )
            })?;
        }
        Commands::Audit => {
            dashboard.select_tab(Tab::AuditLogs)?;
            print_rows(json, &dashboard.audit_logs.visible(), |a| {
                format!("{}\t{}\t{}\t{}\t{}", a.timestamp, a.user, a.action, a.entity_id, a.details)
            })?;
        }
        Commands::PublishHl7 => {
            dashboard.select_tab(Tab::Hl7Messages)?;
            let result = dashboard.publish_hl7(now);
            print_view_notices(&mut dashboard.hl7_messages);
            let ids = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ids)?);
            }
            for message in dashboard.hl7_messages.records().iter().filter(|m| ids.contains(&m.id)) {
                tracing::debug!(id = %message.id, "{}", message.payload.replace('\r', "\n"));
            }
        }
        Commands::SyncConfig => {
            dashboard.select_tab(Tab::Configuration)?;
            tracing::info!(delay_ms = sync_delay.as_millis() as u64, "syncing configuration");
            std::thread::sleep(sync_delay);
            let result = dashboard.configuration.sync(now);
            print_view_notices(&mut dashboard.configuration);
            let stamp = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stamp)?);
            }
        }
        Commands::Seed => {
            println!("{}", seed.to_json()?);
        }
    }

    Ok(())
}
