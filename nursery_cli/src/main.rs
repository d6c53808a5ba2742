use chrono::Utc;
use clap::{Parser, Subcommand};
use nursery_core::dates::{age_in_months, parse_date, BabyAge};
use nursery_core::growth::reference_table;
use nursery_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nursery")]
#[command(about = "Infant sleep timer and growth tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start, stop, or inspect the sleep timer
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },

    /// Estimate the WHO growth percentile of a measurement
    Percentile {
        /// Measured value (kg for weight, cm for height)
        #[arg(long)]
        value: f64,

        /// Age in months
        #[arg(long, conflicts_with = "birth_date", required_unless_present = "birth_date")]
        age_months: Option<f64>,

        /// Birth date (YYYY-MM-DD), used to compute the age
        #[arg(long)]
        birth_date: Option<String>,

        /// male, female, or other
        #[arg(long)]
        sex: Option<String>,

        /// weight or height
        #[arg(long, default_value = "weight")]
        measure: String,
    },

    /// Predict the next nap from the sleep log
    Predict {
        #[arg(long)]
        baby_id: String,

        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: String,

        /// Also schedule a sleep reminder for the predicted nap
        #[arg(long, requires = "baby_name")]
        remind: bool,

        #[arg(long)]
        baby_name: Option<String>,
    },

    /// Manage reminder notifications
    Reminders {
        #[command(subcommand)]
        action: ReminderAction,
    },

    /// Inspect or export the sleep log
    Log {
        #[command(subcommand)]
        action: LogAction,
    },

    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TimerAction {
    /// Start timing a sleep
    Start {
        #[arg(long)]
        baby_id: String,

        #[arg(long)]
        baby_name: String,

        /// nap or night
        #[arg(long, default_value = "nap")]
        sleep_type: String,
    },

    /// Stop the timer and log the sleep
    Stop,

    /// Discard the running timer without logging
    Cancel,

    /// Show the running timer
    Status,

    /// Keep the timer notification up to date until the timer stops
    Watch {
        /// Exit after this many refresh intervals
        #[arg(long)]
        ticks: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ReminderAction {
    /// Show notification settings and scheduled notifications
    Show,

    /// Turn reminder categories on or off
    Set {
        #[arg(long)]
        sleep: Option<bool>,

        #[arg(long)]
        feeding: Option<bool>,

        #[arg(long)]
        diaper: Option<bool>,
    },

    /// Schedule a feeding reminder
    Feeding {
        #[arg(long)]
        baby_name: String,

        /// Hours until the reminder (defaults to the configured interval)
        #[arg(long)]
        hours: Option<u32>,
    },

    /// Send a test notification
    Test,

    /// Cancel every scheduled notification
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file if none exists
    Init,
}

#[derive(Subcommand)]
enum LogAction {
    /// Show sleep totals for a day
    Stats {
        /// Day to summarise (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,

        /// Only count this baby's sleeps
        #[arg(long)]
        baby_id: Option<String>,
    },

    /// Export the sleep log as CSV
    Export {
        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        baby_id: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        nursery_core::logging::init_with_level("debug");
    } else {
        nursery_core::logging::init();
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let paths = DataPaths::new(data_dir);
    tracing::debug!("Using data directory {}", paths.root.display());

    match cli.command {
        Commands::Timer { action } => cmd_timer(&paths, &config, action),
        Commands::Percentile {
            value,
            age_months,
            birth_date,
            sex,
            measure,
        } => cmd_percentile(value, age_months, birth_date, sex, &measure),
        Commands::Predict {
            baby_id,
            birth_date,
            remind,
            baby_name,
        } => cmd_predict(&paths, &config, &baby_id, &birth_date, remind, baby_name),
        Commands::Reminders { action } => cmd_reminders(&paths, &config, action),
        Commands::Log { action } => cmd_log(&paths, action),
        Commands::Config { action } => cmd_config(&config, action),
    }
}

fn sleep_timer(paths: &DataPaths) -> SleepTimer<SpoolScheduler> {
    SleepTimer::new(
        paths.active_timer(),
        SpoolScheduler::new(paths.notification_spool()),
    )
}

fn reminders(paths: &DataPaths, config: &Config) -> Reminders<SpoolScheduler> {
    Reminders::new(
        paths.notification_settings(),
        SpoolScheduler::new(paths.notification_spool()),
        config.reminders.clone(),
    )
}

fn cmd_timer(paths: &DataPaths, config: &Config, action: TimerAction) -> Result<()> {
    let mut timer = sleep_timer(paths);

    match action {
        TimerAction::Start {
            baby_id,
            baby_name,
            sleep_type,
        } => {
            let sleep_type: SleepType = sleep_type.parse()?;
            let started = timer.start(baby_id, baby_name, sleep_type)?;
            println!(
                "✓ {} timer started for {} at {}",
                started.sleep_type.label(),
                started.baby_name,
                started.start_time.format("%H:%M")
            );
        }

        TimerAction::Stop => match timer.stop()? {
            Some(summary) => {
                let log = SleepLog::new(paths.sleep_log());
                log.append(&SleepEntry::from(&summary))?;
                println!(
                    "✓ Sleep logged: {} ({} to {})",
                    dates::format_duration_minutes(summary.duration_minutes),
                    summary.start_time.format("%H:%M"),
                    summary.end_time.format("%H:%M")
                );
            }
            None => println!("No sleep timer running."),
        },

        TimerAction::Cancel => {
            let was_running = timer.active()?.is_some();
            timer.cancel()?;
            if was_running {
                println!("✓ Sleep timer cancelled");
            } else {
                println!("No sleep timer running.");
            }
        }

        TimerAction::Status => match timer.active()? {
            Some(active) => {
                let elapsed = active.elapsed_at(timer.now());
                println!(
                    "{} is sleeping ({}) - {}",
                    active.baby_name,
                    active.sleep_type.label(),
                    format_timer_duration(elapsed)
                );
                println!("  Started: {}", active.start_time.to_rfc3339());
            }
            None => println!("No sleep timer running."),
        },

        TimerAction::Watch { ticks } => cmd_watch(timer, config, ticks)?,
    }

    Ok(())
}

fn cmd_watch(
    timer: SleepTimer<SpoolScheduler>,
    config: &Config,
    ticks: Option<u32>,
) -> Result<()> {
    let interval = config.timer.refresh_interval();
    let mut supervised = SupervisedTimer::new(timer, interval);

    let Some(active) = supervised.resume()? else {
        println!("No sleep timer running.");
        return Ok(());
    };
    println!(
        "Watching {}'s {} (refresh every {}s)",
        active.baby_name,
        active.sleep_type,
        interval.as_secs()
    );

    let mut remaining = ticks;
    loop {
        if remaining == Some(0) {
            break;
        }
        std::thread::sleep(interval);
        remaining = remaining.map(|n| n - 1);

        match supervised.active()? {
            Some(active) => {
                println!("  {}", format_timer_duration(active.elapsed_at(Utc::now())));
            }
            None => {
                println!("Timer stopped.");
                break;
            }
        }
    }

    Ok(())
}

fn cmd_percentile(
    value: f64,
    age_months: Option<f64>,
    birth_date: Option<String>,
    sex: Option<String>,
    measure: &str,
) -> Result<()> {
    let measurement: Measurement = measure.parse()?;
    let sex = sex.map(|s| s.parse::<Sex>()).transpose()?;

    let age = match (age_months, birth_date) {
        (Some(age), _) => age,
        (None, Some(birth)) => {
            let age = BabyAge::between(parse_date(&birth)?, Utc::now().date_naive());
            println!("Age: {}", age.text);
            f64::from(age.months)
        }
        (None, None) => {
            return Err(Error::InvalidInput(
                "either --age-months or --birth-date is required".into(),
            ))
        }
    };

    let percentile = growth_percentile(value, age, sex, measurement)?;
    let band = PercentileBand::of(percentile);

    println!("{:?} {} at {} months", measurement, value, age);
    println!("  Percentile: {} ({:?})", percentile_label(percentile), band);

    if let Some(row) = growth::nearest_row(reference_table(sex, measurement), age) {
        println!(
            "  Reference ({} months): p3 {} | p15 {} | p50 {} | p85 {} | p97 {}",
            row.age_months, row.p3, row.p15, row.p50, row.p85, row.p97
        );
    }

    Ok(())
}

fn cmd_predict(
    paths: &DataPaths,
    config: &Config,
    baby_id: &str,
    birth_date: &str,
    remind: bool,
    baby_name: Option<String>,
) -> Result<()> {
    let now = Utc::now();
    let birth = parse_date(birth_date)?;

    if let Some(active) = sleep_timer(paths).active()? {
        if active.baby_id == baby_id {
            println!(
                "{} is asleep ({} so far).",
                active.baby_name,
                format_timer_duration(active.elapsed_at(now))
            );
            return Ok(());
        }
    }

    let log = SleepLog::new(paths.sleep_log());
    let recent = log.recent_for(baby_id, now, prediction::HISTORY_DAYS)?;
    let prediction = predict_next_nap(age_in_months(birth, now), &recent, now);

    println!(
        "Next nap: {} (in {})",
        prediction.next_nap_time.format("%Y-%m-%d %H:%M"),
        dates::format_duration_minutes(dates::duration_minutes(now, prediction.next_nap_time))
    );
    println!("  Confidence: {:.0}%", prediction.confidence * 100.0);
    println!(
        "  Wake window: {}",
        dates::format_duration_minutes(prediction.wake_window_minutes)
    );
    println!(
        "  Recommended nap: {}",
        dates::format_duration_minutes(prediction.recommended_duration_minutes)
    );

    if remind {
        let name = baby_name.unwrap_or_else(|| baby_id.to_string());
        let mut reminders = reminders(paths, config);
        match reminders.schedule_sleep_reminder(
            &name,
            prediction.next_nap_time,
            prediction.wake_window_minutes,
        ) {
            Some(_) => println!("✓ Sleep reminder scheduled"),
            None => println!("No sleep reminder scheduled."),
        }
    }

    Ok(())
}

fn cmd_reminders(paths: &DataPaths, config: &Config, action: ReminderAction) -> Result<()> {
    let mut reminders = reminders(paths, config);

    match action {
        ReminderAction::Show => {
            let settings = reminders.settings();
            println!("Sleep reminders:   {}", on_off(settings.sleep_reminders));
            println!("Feeding reminders: {}", on_off(settings.feeding_reminders));
            println!("Diaper reminders:  {}", on_off(settings.diaper_reminders));

            let scheduled = reminders.notifier().scheduled()?;
            println!("\nScheduled notifications: {}", scheduled.len());
            for n in scheduled {
                let when = match n.trigger {
                    Trigger::Immediate => "now".to_string(),
                    Trigger::At(at) => at.format("%Y-%m-%d %H:%M").to_string(),
                };
                println!("  [{:?}] {} - {} ({})", n.content.kind, n.content.title, n.content.body, when);
            }
        }

        ReminderAction::Set {
            sleep,
            feeding,
            diaper,
        } => {
            let mut settings = reminders.settings();
            if let Some(v) = sleep {
                settings.sleep_reminders = v;
            }
            if let Some(v) = feeding {
                settings.feeding_reminders = v;
            }
            if let Some(v) = diaper {
                settings.diaper_reminders = v;
            }
            reminders.save_settings(&settings)?;
            if !settings.sleep_reminders {
                reminders.cancel_sleep_reminders();
            }
            if !settings.feeding_reminders {
                reminders.cancel_feeding_reminders();
            }
            println!("✓ Notification settings saved");
        }

        ReminderAction::Feeding { baby_name, hours } => {
            match reminders.schedule_feeding_reminder(&baby_name, hours) {
                Some(_) => println!("✓ Feeding reminder scheduled"),
                None => println!("No feeding reminder scheduled."),
            }
        }

        ReminderAction::Test => {
            reminders.send_test_notification()?;
            println!("✓ Test notification sent");
        }

        ReminderAction::Clear => {
            reminders.cancel_all()?;
            println!("✓ All notifications cancelled");
        }
    }

    Ok(())
}

fn cmd_log(paths: &DataPaths, action: LogAction) -> Result<()> {
    let log = SleepLog::new(paths.sleep_log());

    match action {
        LogAction::Stats { date, baby_id } => {
            let date = match date {
                Some(d) => parse_date(&d)?,
                None => Utc::now().date_naive(),
            };
            let entries = filter_baby(log.read_entries()?, baby_id.as_deref());
            let stats = daily_sleep_stats(&entries, date);
            println!("Sleep on {}", stats.date);
            println!("  Sessions: {}", stats.count);
            println!(
                "  Total: {} ({} hours)",
                dates::format_duration_minutes(stats.total_minutes),
                stats.total_hours
            );
        }

        LogAction::Export { out, baby_id } => {
            let entries = filter_baby(log.read_entries()?, baby_id.as_deref());
            let count = export_csv(&entries, &out)?;
            println!("✓ Exported {} sleep entries", count);
            println!("  CSV: {}", out.display());
        }
    }

    Ok(())
}

fn cmd_config(config: &Config, action: ConfigAction) -> Result<()> {
    let path = Config::default_config_path();

    match action {
        ConfigAction::Show => {
            println!("# {}", path.display());
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Init => {
            if Config::default().write_if_missing(&path)? {
                println!("✓ Wrote default config to {}", path.display());
            } else {
                println!("Config already exists at {}", path.display());
            }
        }
    }

    Ok(())
}

fn filter_baby(entries: Vec<SleepEntry>, baby_id: Option<&str>) -> Vec<SleepEntry> {
    match baby_id {
        Some(id) => entries.into_iter().filter(|e| e.baby_id == id).collect(),
        None => entries,
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
