use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use condominio::{
    accrue_penalties, add_home, add_resident, create_shared_bill, distribute_shared_bill,
    generate_monthly_rent, setup_database, AuthUser, BillCategory, DistributionOutcome,
    HomeStatus, Money, NewHome, NewResident, NewSharedBill,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "condominio=info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    match command {
        "init" => run_init(),
        "seed" => run_seed(),
        "rent" => run_rent(&args[2..]),
        "overdue" => run_overdue(&args[2..]),
        "distribute" => run_distribute(&args[2..]),
        "help" | "--help" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("unknown command {other:?}");
        }
    }
}

fn print_usage() {
    println!("condominio {}", condominio::VERSION);
    println!();
    println!("Usage:");
    println!("  condominio init                  create the database");
    println!("  condominio seed                  load a small demo community");
    println!("  condominio rent <date> [force]   generate monthly rent bills due on <date>");
    println!("  condominio overdue [date]        apply late penalties as of [date] (default today)");
    println!("  condominio distribute <id>       split shared bill <id> across active residents");
    println!();
    println!("Database path comes from CONDOMINIO_DB (default ./condominio.db).");
    println!("Commands act as the manager with user id 1.");
}

fn db_path() -> PathBuf {
    env::var_os("CONDOMINIO_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("condominio.db"))
}

fn open_db() -> Result<Connection> {
    let path = db_path();
    let conn = Connection::open(&path)
        .with_context(|| format!("opening database at {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

fn run_init() -> Result<()> {
    let conn = open_db()?;
    drop(conn);
    println!("✓ Database initialized at {}", db_path().display());
    Ok(())
}

fn run_seed() -> Result<()> {
    let conn = open_db()?;
    let manager = AuthUser::manager(1);

    let units = [("A", 1, "101"), ("A", 1, "102"), ("B", 2, "201")];
    let mut home_ids = Vec::new();
    for (block, floor, number) in units {
        let home = add_home(
            &conn,
            &manager,
            &NewHome {
                block: block.into(),
                floor,
                number: number.into(),
                status: HomeStatus::Occupied,
                rent: Money::parse("500.00")?,
            },
        )?;
        home_ids.push(home.id);
    }

    let lease_start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let lease_end = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
    for (i, home_id) in home_ids.iter().enumerate() {
        add_resident(
            &conn,
            &manager,
            &NewResident {
                user_id: 100 + i as i64,
                home_id: Some(*home_id),
                unit: None,
                contact: Some(format!("resident{i}@example.com")),
                lease_start,
                lease_end,
            },
        )?;
    }

    let bill = create_shared_bill(
        &conn,
        &manager,
        &NewSharedBill {
            amount: Money::parse("300.00")?,
            due_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            category: BillCategory::Maintenance,
            description: "Elevator service".into(),
        },
    )?;

    println!("✓ Seeded 3 homes, 3 residents, shared bill {}", bill.id);
    Ok(())
}

fn run_rent(args: &[String]) -> Result<()> {
    let due_date: NaiveDate = args
        .first()
        .context("usage: condominio rent <YYYY-MM-DD> [force]")?
        .parse()
        .context("due date must be YYYY-MM-DD")?;
    let force = args.get(1).map(String::as_str) == Some("force");

    let mut conn = open_db()?;
    let manager = AuthUser::manager(1);
    let bills = generate_monthly_rent(&mut conn, &manager, due_date, force)?;

    println!("✓ {} rent bills due {due_date}", bills.len());
    for bill in &bills {
        println!("  bill {} resident {} amount {}", bill.id, bill.resident_id, bill.amount);
    }
    Ok(())
}

fn run_overdue(args: &[String]) -> Result<()> {
    let today: NaiveDate = match args.first() {
        Some(raw) => raw.parse().context("date must be YYYY-MM-DD")?,
        None => Utc::now().date_naive(),
    };

    let mut conn = open_db()?;
    let touched = accrue_penalties(&mut conn, today)?;
    println!("✓ Penalties applied to {touched} overdue bills as of {today}");
    Ok(())
}

fn run_distribute(args: &[String]) -> Result<()> {
    let id: i64 = args
        .first()
        .context("usage: condominio distribute <shared-bill-id>")?
        .parse()
        .context("shared bill id must be an integer")?;

    let mut conn = open_db()?;
    let manager = AuthUser::manager(1);
    match distribute_shared_bill(&mut conn, &manager, id)? {
        DistributionOutcome::Distributed(bills) => {
            println!("✓ Shared bill {id} split across {} residents", bills.len());
            for bill in &bills {
                println!("  bill {} resident {} amount {}", bill.id, bill.resident_id, bill.amount);
            }
        }
        DistributionOutcome::AlreadyDistributed => {
            println!("✓ Shared bill {id} was already distributed; nothing to do");
        }
        DistributionOutcome::NoEligibleResidents => {
            println!("❌ No active residents to bill; shared bill {id} left undistributed");
        }
    }
    Ok(())
}
