use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Credentials, Currency, Engine, NewAccount};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "tallyup_admin")]
#[command(about = "Admin utilities for Tallyup (bootstrap users/trips, repair lifecycle operations)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./tallyup.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Trip(Trip),
    /// Pending virtual member link/promote operations.
    Ops(Ops),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

#[derive(Args, Debug)]
struct Trip {
    #[command(subcommand)]
    command: TripCommand,
}

#[derive(Subcommand, Debug)]
enum TripCommand {
    Create(TripCreateArgs),
}

#[derive(Args, Debug)]
struct TripCreateArgs {
    /// Username of the trip admin; their password is prompted.
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, default_value = "EUR", value_parser = parse_currency)]
    currency: Currency,
}

#[derive(Args, Debug)]
struct Ops {
    #[command(subcommand)]
    command: OpsCommand,
}

#[derive(Subcommand, Debug)]
enum OpsCommand {
    /// Show unfinished operations.
    List,
    /// Re-apply unfinished operations.
    Reconcile,
}

fn parse_currency(raw: &str) -> Result<Currency, String> {
    Currency::try_from(raw).map_err(|err| err.to_string())
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let password = prompt_password_twice()?;
            let display_name = args.display_name.unwrap_or_else(|| args.username.clone());

            let mut account = NewAccount::new(&args.username, display_name, password);
            if let Some(email) = args.email {
                account = account.email(email);
            }
            let session = engine.register(account).await?;
            engine.logout(&session.token).await?;

            println!("created user: {} ({})", args.username, session.user_id);
        }
        Command::Trip(Trip {
            command: TripCommand::Create(args),
        }) => {
            let password = prompt_password(&format!("Password for {}: ", args.owner))?;
            let session = engine
                .login(Credentials::new(args.owner.as_str(), password))
                .await?;
            let actor = engine.actor_for_session(&session.token).await?;

            let created = engine
                .create_trip(
                    actor,
                    &args.name,
                    args.description.as_deref(),
                    Some(args.currency),
                )
                .await;
            engine.logout(&session.token).await?;
            let trip = created?;

            println!(
                "created trip: {} ({}), join code {}",
                trip.name, trip.id, trip.code
            );
        }
        Command::Ops(Ops {
            command: OpsCommand::List,
        }) => {
            let pending = engine.pending_operations().await?;
            if pending.is_empty() {
                println!("no pending operations");
            }
            for marker in pending {
                println!(
                    "{}\t{}\ttrip {}\tvirtual {}\t{}",
                    marker.id, marker.kind, marker.trip_id, marker.subject_id, marker.created_at
                );
                if let Some(error) = marker.error {
                    eprintln!("  {error}");
                }
            }
        }
        Command::Ops(Ops {
            command: OpsCommand::Reconcile,
        }) => {
            let report = engine.reconcile_pending_operations().await?;
            for op in &report.applied {
                println!("applied {} {}", op.id, op.command.kind());
            }
            for failure in &report.failed {
                eprintln!("failed {}: {}", failure.id, failure.error);
            }
            if !report.failed.is_empty() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
