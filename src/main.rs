use anyhow::{Context, Result};
use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use student_tracker::{
    open_file_tracker, quarter, CsvStore, StudentTracker, TrackerConfig, TrackerError,
};

type Tracker = StudentTracker<CsvStore>;

fn main() {
    // Logs go to stderr so stdout stays clean for --json
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli().get_matches()) {
        match err.downcast_ref::<TrackerError>() {
            Some(e) if e.is_recoverable() => eprintln!("⚠️  {}", e),
            _ => eprintln!("❌ {:#}", err),
        }
        std::process::exit(1);
    }
}

fn cli() -> Command {
    let name = |id: &'static str, help: &'static str| Arg::new(id).required(true).help(help);
    let number = |id: &'static str, help: &'static str| {
        Arg::new(id)
            .required(true)
            .help(help)
            .allow_negative_numbers(true)
            .value_parser(value_parser!(i32))
    };
    let quarter_arg = || {
        Arg::new("quarter")
            .help("Quarter tag, e.g. 2023Q1 (defaults to the configured or current quarter)")
    };

    Command::new("student-tracker")
        .version(crate_version!())
        .about("Tracks students, events and participation points")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .help("TOML config file")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .global(true)
                .help("Directory holding the data files")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print listings and reports as JSON"),
        )
        .subcommand(
            Command::new("add-student")
                .about("Add a student")
                .arg(name("name", "Student name"))
                .arg(number("class-year", "Class year, e.g. 2025")),
        )
        .subcommand(
            Command::new("add-event")
                .about("Add an event")
                .arg(name("name", "Event name"))
                .arg(number("points", "Points awarded per participant"))
                .arg(name("duration", "Quarter tag, e.g. 2023Q1")),
        )
        .subcommand(
            Command::new("remove-student")
                .about("Remove a student and its registrations")
                .arg(name("name", "Student name")),
        )
        .subcommand(
            Command::new("remove-event")
                .about("Remove an event and its registrations")
                .arg(name("name", "Event name")),
        )
        .subcommand(
            Command::new("rename-student")
                .arg(name("name", "Current name"))
                .arg(name("new-name", "New name")),
        )
        .subcommand(
            Command::new("rename-event")
                .arg(name("name", "Current name"))
                .arg(name("new-name", "New name")),
        )
        .subcommand(
            Command::new("set-year")
                .arg(name("name", "Student name"))
                .arg(number("class-year", "New class year")),
        )
        .subcommand(
            Command::new("set-points")
                .arg(name("name", "Event name"))
                .arg(number("points", "New points value")),
        )
        .subcommand(
            Command::new("set-duration")
                .arg(name("name", "Event name"))
                .arg(name("duration", "New quarter tag")),
        )
        .subcommand(
            Command::new("register")
                .about("Register a student for an event")
                .arg(name("student", "Student name"))
                .arg(name("event", "Event name")),
        )
        .subcommand(
            Command::new("dropoff")
                .about("Drop a student's registration for an event")
                .arg(name("student", "Student name"))
                .arg(name("event", "Event name")),
        )
        .subcommand(Command::new("students").about("List students with total points"))
        .subcommand(Command::new("events").about("List events with participant counts"))
        .subcommand(
            Command::new("participants")
                .about("List students registered for an event")
                .arg(name("event", "Event name")),
        )
        .subcommand(
            Command::new("points")
                .about("Show a student's points and registrations")
                .arg(name("student", "Student name"))
                .arg(quarter_arg()),
        )
        .subcommand(
            Command::new("report")
                .about("Quarterly standings")
                .arg(quarter_arg()),
        )
        .subcommand(
            Command::new("winners")
                .about("Top student of the quarter and a random winner")
                .arg(quarter_arg()),
        )
        .subcommand(Command::new("quarters").about("List quarter tags used by events"))
        .subcommand(Command::new("check").about("Verify data integrity"))
}

fn load_config(matches: &ArgMatches) -> Result<TrackerConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => TrackerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    if let Some(dir) = matches.get_one::<PathBuf>("data-dir") {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn run(matches: ArgMatches) -> Result<()> {
    let config = load_config(&matches)?;
    let json = matches.get_flag("json");
    let mut tracker = open_file_tracker(&config).with_context(|| {
        format!("Failed to open tracker data in {}", config.data_dir.display())
    })?;

    let Some((command, args)) = matches.subcommand() else {
        return Ok(());
    };

    let text = |id: &str| args.get_one::<String>(id).cloned().unwrap_or_default();
    let number = |id: &str| args.get_one::<i32>(id).copied().unwrap_or_default();
    let quarter_tag = || {
        let tag = args
            .get_one::<String>("quarter")
            .cloned()
            .unwrap_or_else(|| config.report_quarter());
        if !quarter::is_quarter_tag(&tag) {
            tracing::warn!(quarter = %tag, "quarter tag is not in YYYYQn form, matching exactly");
        }
        tag
    };

    match command {
        "add-student" => {
            let id = tracker.add_student(&text("name"), number("class-year"))?;
            println!("✓ Added student {} (id {})", text("name"), id);
        }
        "add-event" => {
            let duration = text("duration");
            if !quarter::is_quarter_tag(&duration) {
                tracing::warn!(duration = %duration, "duration is not in YYYYQn form");
            }
            let id = tracker.add_event(&text("name"), number("points"), &duration)?;
            println!("✓ Added event {} (id {})", text("name"), id);
        }
        "remove-student" => {
            let id = tracker.require_student(&text("name"))?;
            tracker.remove_student(id)?;
            println!("✓ Removed student {}", text("name"));
        }
        "remove-event" => {
            let id = tracker.require_event(&text("name"))?;
            tracker.remove_event(id)?;
            println!("✓ Removed event {}", text("name"));
        }
        "rename-student" => {
            tracker.rename_student(&text("name"), &text("new-name"))?;
            println!("✓ Renamed student {} → {}", text("name"), text("new-name"));
        }
        "rename-event" => {
            tracker.rename_event(&text("name"), &text("new-name"))?;
            println!("✓ Renamed event {} → {}", text("name"), text("new-name"));
        }
        "set-year" => {
            let id = tracker.require_student(&text("name"))?;
            tracker.set_student_year(id, number("class-year"))?;
            println!("✓ {} is now class of {}", text("name"), number("class-year"));
        }
        "set-points" => {
            let id = tracker.require_event(&text("name"))?;
            tracker.set_event_points(id, number("points"))?;
            println!("✓ {} now awards {} points", text("name"), number("points"));
        }
        "set-duration" => {
            let id = tracker.require_event(&text("name"))?;
            tracker.set_event_duration(id, &text("duration"))?;
            println!("✓ {} now runs in {}", text("name"), text("duration"));
        }
        "register" => {
            let student = tracker.require_student(&text("student"))?;
            let event = tracker.require_event(&text("event"))?;
            if tracker.register(student, event)? {
                println!("✓ Registered {} for {}", text("student"), text("event"));
            } else {
                println!("✓ {} was already registered for {}", text("student"), text("event"));
            }
        }
        "dropoff" => {
            let student = tracker.require_student(&text("student"))?;
            let event = tracker.require_event(&text("event"))?;
            if tracker.dropoff(student, event)? {
                println!("✓ Dropped {} from {}", text("student"), text("event"));
            } else {
                println!("✓ {} was not registered for {}", text("student"), text("event"));
            }
        }
        "students" => print_students(&tracker, json)?,
        "events" => print_events(&tracker, json)?,
        "participants" => {
            let event = tracker.require_event(&text("event"))?;
            let rows = tracker.participants(event);
            if json {
                print_json(&rows)?;
            } else {
                for row in rows {
                    println!("{:>5}  {:<24} {:>6}", row.id, row.name, row.class_year);
                }
            }
        }
        "points" => {
            let student = tracker.require_student(&text("student"))?;
            let tag = quarter_tag();
            let total = tracker.total_points(student);
            let quarterly = tracker.quarterly_report(&tag, student);
            let events = tracker.registrations_of(student);
            if json {
                print_json(&serde_json::json!({
                    "student": text("student"),
                    "total_points": total,
                    "quarter": tag,
                    "quarter_points": quarterly,
                    "events": events,
                }))?;
            } else {
                println!("{}: {} total, {} in {}", text("student"), total, quarterly, tag);
                for event in events {
                    println!("  {:<24} {:>4}  {}", event.name, event.points, event.duration);
                }
            }
        }
        "report" => {
            let tag = quarter_tag();
            let standings = tracker.quarterly_standings(&tag);
            if json {
                print_json(&standings)?;
            } else {
                println!("📊 Standings for {}", tag);
                for (rank, row) in standings.iter().enumerate() {
                    println!("{:>3}. {:<24} {:>6}", rank + 1, row.name, row.quarter_points);
                }
            }
        }
        "winners" => {
            let summary = tracker.winners(&quarter_tag());
            if json {
                print_json(&summary)?;
            } else {
                let name = |row: &Option<student_tracker::StudentRow>| {
                    row.as_ref().map_or("(no students)".to_string(), |r| r.name.clone())
                };
                println!(
                    "🏆 Top student of {}: {} ({} pts)",
                    summary.quarter,
                    name(&summary.top_student),
                    summary.top_points
                );
                println!("🎲 Random winner: {}", name(&summary.random_winner));
            }
        }
        "quarters" => {
            let quarters = tracker.known_quarters();
            if json {
                print_json(&quarters)?;
            } else {
                for tag in quarters {
                    println!("{}", tag);
                }
            }
        }
        "check" => {
            let violations = tracker.verify_integrity();
            if violations.is_empty() {
                println!("✅ Data is consistent");
            } else {
                for violation in &violations {
                    println!("❌ {}", violation);
                }
                anyhow::bail!("{} integrity violation(s)", violations.len());
            }
        }
        other => anyhow::bail!("unknown command: {}", other),
    }

    Ok(())
}

fn print_students(tracker: &Tracker, json: bool) -> Result<()> {
    let rows = tracker.student_rows();
    if json {
        return print_json(&rows);
    }
    println!("{:>5}  {:<24} {:>8} {:>8}", "ID", "Name", "Class Of", "Points");
    for row in rows {
        println!("{:>5}  {:<24} {:>8} {:>8}", row.id, row.name, row.class_year, row.total_points);
    }
    Ok(())
}

fn print_events(tracker: &Tracker, json: bool) -> Result<()> {
    let rows = tracker.event_rows();
    if json {
        return print_json(&rows);
    }
    println!("{:>5}  {:<24} {:>6} {:>8} {:>6}", "ID", "Name", "Points", "Quarter", "Count");
    for row in rows {
        println!(
            "{:>5}  {:<24} {:>6} {:>8} {:>6}",
            row.id, row.name, row.points, row.duration, row.participants
        );
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}
