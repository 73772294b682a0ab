use clap::{Parser, Subcommand};
use lift_core::clock::format_seconds;
use lift_core::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lift")]
#[command(about = "Workout session tracker with rest timer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log in as this user (overrides the config file)
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List workout templates
    Workouts,

    /// Show the active session (default)
    Show,

    /// Switch to another workout
    Select { workout: String },

    /// Record reps and/or weight for a set
    Set {
        exercise: String,
        set: u32,

        #[arg(long)]
        reps: Option<String>,

        #[arg(long)]
        weight: Option<String>,
    },

    /// Mark a set done (or not done) and rest
    Done {
        exercise: String,
        set: u32,

        /// Do not wait for the rest countdown
        #[arg(long)]
        no_rest: bool,
    },

    /// Discard the active session and start over
    Reset {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Stop the rest timer (a countdown only runs inside `done`)
    Stop,

    /// Save the active session to history
    Finish,

    /// Show completed sessions
    History {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Per-exercise statistics
    Stats,

    /// Import workout templates from a CSV file
    Import { file: PathBuf },

    /// Rename a workout
    Rename { workout: String, name: String },

    /// Set a workout's default rest
    Rest { workout: String, seconds: u32 },

    /// Append a new exercise to a workout
    AddExercise { workout: String },

    /// Change an exercise definition
    EditExercise {
        workout: String,
        exercise: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        sets: Option<u32>,

        #[arg(long)]
        reps: Option<u32>,

        #[arg(long)]
        weight: Option<f64>,

        /// Rest override in seconds; 0 clears it
        #[arg(long)]
        rest: Option<u32>,
    },

    /// Remove an exercise from a workout
    RemoveExercise { workout: String, exercise: String },

    /// Move an exercise to where another one is
    MoveExercise {
        workout: String,
        exercise: String,
        target: String,
    },

    /// Delete a workout
    DeleteWorkout {
        workout: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    lift_core::logging::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match &e {
                Error::Completion(reason) => eprintln!("Cannot finish session: {}", reason),
                Error::Import(reason) => eprintln!("Import failed: {}", reason),
                Error::Catalog(reason) => eprintln!("{}", reason),
                other => eprintln!("Something went wrong: {}", other),
            }
            tracing::debug!("Command failed: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let identity = match cli.user {
        Some(user) => Identity::from_optional(Some(user)),
        None => config.user.identity(),
    };

    let mut tracker = open_tracker(&data_dir, &config)?;
    tracker.load(identity).await;

    let errors = tracker.catalog().validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
    }

    match cli.command.unwrap_or(Commands::Show) {
        Commands::Workouts => cmd_workouts(&tracker),
        Commands::Show => cmd_show(&tracker),
        Commands::Select { workout } => {
            let outcome = tracker.select_workout(&workout)?;
            match outcome {
                SwitchOutcome::Restored => println!("✓ Resumed {}", workout),
                SwitchOutcome::Built => println!("✓ Started {}", workout),
            }
            cmd_show(&tracker)
        }
        Commands::Set {
            exercise,
            set,
            reps,
            weight,
        } => cmd_set(&mut tracker, &exercise, set, reps, weight),
        Commands::Done {
            exercise,
            set,
            no_rest,
        } => cmd_done(&mut tracker, &exercise, set, no_rest).await,
        Commands::Reset { yes } => {
            if tracker.reset(|| yes || confirm("Discard all logged sets?")) {
                println!("✓ Session reset");
            } else {
                println!("Reset cancelled");
            }
            Ok(())
        }
        Commands::Stop => {
            if tracker.rest().is_running() {
                tracker.stop_rest();
                println!("Rest timer stopped");
            } else {
                println!("No rest timer running");
            }
            Ok(())
        }
        Commands::Finish => {
            let entry = tracker.complete().await?;
            println!(
                "✓ Saved {}: {} sets, volume {}",
                entry.workout_name, entry.total_sets_done, entry.volume
            );
            Ok(())
        }
        Commands::History { limit } => cmd_history(&tracker, limit),
        Commands::Stats => cmd_stats(&tracker).await,
        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file)?;
            let count = tracker.import_csv(&text).await?;
            println!("✓ Imported {} workouts from {}", count, file.display());
            Ok(())
        }
        Commands::Rename { workout, name } => {
            tracker.rename_workout(&workout, &name).await?;
            println!("✓ Renamed {} to {}", workout, name);
            Ok(())
        }
        Commands::Rest { workout, seconds } => {
            tracker.set_default_rest(&workout, seconds).await?;
            println!("✓ Default rest for {} is now {}s", workout, seconds);
            Ok(())
        }
        Commands::AddExercise { workout } => {
            let id = tracker.add_exercise(&workout).await?;
            println!("✓ Added exercise {}", id);
            Ok(())
        }
        Commands::EditExercise {
            workout,
            exercise,
            name,
            sets,
            reps,
            weight,
            rest,
        } => {
            let patches = name
                .map(ExercisePatch::Name)
                .into_iter()
                .chain(sets.map(ExercisePatch::TargetSets))
                .chain(reps.map(ExercisePatch::TargetReps))
                .chain(weight.map(ExercisePatch::DefaultWeight))
                .chain(rest.map(|s| ExercisePatch::RestSeconds(Some(s).filter(|s| *s > 0))))
                .collect::<Vec<_>>();
            // All or nothing
            for patch in &patches {
                patch.check()?;
            }

            let mut changed = false;
            for patch in patches {
                changed |= tracker.update_exercise(&workout, &exercise, patch).await?;
            }
            if changed {
                println!("✓ Updated {}", exercise);
            } else {
                println!("Nothing to change for {}", exercise);
            }
            Ok(())
        }
        Commands::RemoveExercise { workout, exercise } => {
            if tracker.remove_exercise(&workout, &exercise).await? {
                println!("✓ Removed {}", exercise);
            } else {
                println!("{} has no exercise {}", workout, exercise);
            }
            Ok(())
        }
        Commands::MoveExercise {
            workout,
            exercise,
            target,
        } => {
            if tracker.move_exercise(&workout, &exercise, &target).await? {
                println!("✓ Moved {} to the position of {}", exercise, target);
            } else {
                println!("Nothing moved");
            }
            Ok(())
        }
        Commands::DeleteWorkout { workout, yes } => {
            let deleted = tracker
                .delete_workout(&workout, || {
                    yes || confirm(&format!("Delete workout {}?", workout))
                })
                .await?;
            if deleted {
                println!("✓ Deleted {}", workout);
            } else {
                println!("Delete cancelled");
            }
            Ok(())
        }
    }
}

fn open_tracker(data_dir: &Path, config: &Config) -> Result<Tracker<TableStore>> {
    std::fs::create_dir_all(data_dir)?;

    let cache = Arc::new(FileCache::new(data_dir.join("cache")));
    let remote = TableStore::open(data_dir.join("remote.json"));
    let reconciler = Reconciler::new(remote, cache, config.history.limit);
    Ok(Tracker::new(reconciler, Arc::new(BellNotifier), config))
}

fn cmd_workouts(tracker: &Tracker<TableStore>) -> Result<()> {
    let selected = tracker.selected_workout().map(|w| w.id.as_str());
    for workout in tracker.catalog().workouts() {
        let marker = if Some(workout.id.as_str()) == selected {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<16} {} ({} exercises, rest {}s)",
            marker,
            workout.id,
            workout.name,
            workout.exercises.len(),
            workout.default_rest_seconds
        );
    }
    Ok(())
}

fn cmd_show(tracker: &Tracker<TableStore>) -> Result<()> {
    let Some(session) = tracker.session() else {
        println!("No active session");
        return Ok(());
    };

    println!("\n{}  [{}]", session.workout_name, session.workout_id);
    println!("  Elapsed: {}", format_seconds(tracker.elapsed_seconds()));
    for exercise in &session.exercises {
        println!();
        println!("  {} ({})", exercise.name, exercise.id);
        for set in &exercise.sets {
            println!(
                "    {} set {}  target {:>2}  reps {:>5}  weight {:>6}",
                if set.done { "[x]" } else { "[ ]" },
                set.index,
                set.target_reps,
                display_field(&set.reps),
                display_field(&set.weight),
            );
        }
    }
    println!();
    println!("  Volume: {}", tracker.volume());
    Ok(())
}

fn display_field(value: &FieldValue) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value.as_str()
    }
}

fn cmd_set(
    tracker: &mut Tracker<TableStore>,
    exercise: &str,
    set: u32,
    reps: Option<String>,
    weight: Option<String>,
) -> Result<()> {
    if reps.is_none() && weight.is_none() {
        return Err(Error::Other("pass --reps and/or --weight".into()));
    }

    let updates = reps
        .map(|r| SetUpdate::Reps(FieldValue::new(r)))
        .into_iter()
        .chain(weight.map(|w| SetUpdate::Weight(FieldValue::new(w))));

    let mut applied = false;
    for update in updates {
        applied |= tracker.set_field(exercise, set, update);
    }

    if applied {
        println!("✓ {} set {} updated", exercise, set);
    } else {
        println!("No set {} for {} in this session", set, exercise);
    }
    Ok(())
}

async fn cmd_done(
    tracker: &mut Tracker<TableStore>,
    exercise: &str,
    set: u32,
    no_rest: bool,
) -> Result<()> {
    match tracker.toggle_set_done(exercise, set) {
        None => println!("No set {} for {} in this session", set, exercise),
        Some(Toggle::Reopened) => println!("✓ {} set {} marked not done", exercise, set),
        Some(Toggle::Completed) => {
            println!("✓ {} set {} done", exercise, set);
            if no_rest {
                tracker.stop_rest();
            } else {
                wait_for_rest(tracker).await?;
            }
        }
    }
    Ok(())
}

/// Show the countdown until it finishes on its own
async fn wait_for_rest(tracker: &Tracker<TableStore>) -> Result<()> {
    let mut stdout = io::stdout();
    loop {
        let rest = tracker.rest();
        if !rest.is_running() {
            break;
        }
        write!(stdout, "\r  Rest: {}  ", format_seconds(u64::from(rest.seconds_left())))?;
        stdout.flush()?;
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
    writeln!(stdout, "\r  Rest complete   ")?;
    Ok(())
}

fn cmd_history(tracker: &Tracker<TableStore>, limit: Option<usize>) -> Result<()> {
    let history = tracker.history();
    if history.is_empty() {
        println!("No completed sessions yet");
        return Ok(());
    }

    let limit = limit.unwrap_or(history.len());
    for entry in history.entries().iter().take(limit) {
        let minutes = (entry.finished_at - entry.started_at).num_minutes();
        println!(
            "{}  {:<16} {:>3} sets  volume {:>8}  {} min",
            entry.started_at.format("%Y-%m-%d %H:%M"),
            entry.workout_name,
            entry.total_sets_done,
            entry.volume,
            minutes
        );
    }
    println!(
        "\nTotal: {} sessions, {} sets, volume {}",
        history.len(),
        history.total_sets(),
        history.total_volume()
    );
    Ok(())
}

async fn cmd_stats(tracker: &Tracker<TableStore>) -> Result<()> {
    let stats = tracker.stats().await?;
    if stats.is_empty() {
        println!("No statistics yet");
        return Ok(());
    }

    for s in stats {
        println!("{}", s.name);
        println!(
            "  sessions {}  sets {}  reps {}  volume {}",
            s.total_sessions, s.total_sets, s.total_reps, s.total_volume
        );
        println!(
            "  max weight {}  avg weight/rep {:.1}  last {}",
            s.max_weight,
            s.avg_weight_per_rep,
            s.last_performed
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".into())
        );
    }
    Ok(())
}

fn confirm(question: &str) -> bool {
    print!("{} [y/N] ", question);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
