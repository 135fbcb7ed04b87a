use chrono::Utc;
use clap::{Parser, Subcommand};
use fitness_core::achievements::{self, AchievementMetrics};
use fitness_core::metrics::{daily_history, recent, MetricsSummary};
use fitness_core::session_file::find_active;
use fitness_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fittrack")]
#[command(about = "Workout session tracker with streaks and achievements", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the user whose data is used
    #[arg(long, global = true)]
    user: Option<String>,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available workout plans
    Plans,

    /// Start a session for a plan
    Start {
        /// Plan id (see `plans`)
        plan: String,
    },

    /// Show the active session (default)
    Status,

    /// Complete one set
    Set {
        /// Exercise number (1-based); defaults to the current exercise
        #[arg(long)]
        exercise: Option<usize>,
    },

    /// Advance the session timers
    Tick {
        /// Number of seconds to advance
        #[arg(long, default_value_t = 1)]
        seconds: u32,
    },

    /// Pause the session timers
    Pause,

    /// Resume the session timers
    Resume,

    /// Jump to an exercise (1-based)
    Goto { exercise: usize },

    /// Move to the next exercise
    Next,

    /// Move to the previous exercise
    Prev,

    /// Finish the session and log the workout
    Finish {
        /// Finish even though sets remain
        #[arg(long)]
        force: bool,
    },

    /// Discard the session without logging anything
    Abandon,

    /// Show totals, streaks and recent history
    Stats,

    /// Show achievement progress and record new unlocks
    Achievements {
        /// Number of community posts shared
        #[arg(long, default_value_t = 0)]
        social: u32,

        /// Meditation sessions tracked outside fittrack
        #[arg(long, default_value_t = 0)]
        meditation: u32,
    },

    /// Export the workout log as CSV
    Export {
        /// Destination CSV file
        path: PathBuf,
    },
}

struct Context {
    data_dir: PathBuf,
    user: String,
    config: Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    fitness_core::logging::init_with_level(if cli.verbose { "debug" } else { "warn" });

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = Context {
        data_dir: cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone()),
        user: cli.user.unwrap_or_else(|| config.data.user.clone()),
        config,
    };
    tracing::debug!("Using data dir {:?} for user '{}'", ctx.data_dir, ctx.user);

    match cli.command {
        Some(Commands::Plans) => cmd_plans(&ctx),
        Some(Commands::Start { plan }) => cmd_start(&ctx, &plan),
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::Set { exercise }) => cmd_set(&ctx, exercise),
        Some(Commands::Tick { seconds }) => cmd_tick(&ctx, seconds),
        Some(Commands::Pause) => cmd_apply(&ctx, SessionEvent::Pause),
        Some(Commands::Resume) => cmd_apply(&ctx, SessionEvent::Resume),
        Some(Commands::Goto { exercise }) => {
            let index = to_index(exercise)?;
            cmd_apply(&ctx, SessionEvent::GoTo(index))
        }
        Some(Commands::Next) => cmd_apply(&ctx, SessionEvent::Next),
        Some(Commands::Prev) => cmd_apply(&ctx, SessionEvent::Previous),
        Some(Commands::Finish { force }) => cmd_finish(&ctx, force),
        Some(Commands::Abandon) => cmd_abandon(&ctx),
        Some(Commands::Stats) => cmd_stats(&ctx),
        Some(Commands::Achievements { social, meditation }) => cmd_achievements(
            &ctx,
            ExternalCounts {
                social_posts: social,
                meditation_sessions: meditation,
            },
        ),
        Some(Commands::Export { path }) => cmd_export(&ctx, &path),
    }
}

fn to_index(exercise: usize) -> Result<usize> {
    exercise
        .checked_sub(1)
        .ok_or_else(|| Error::Other("exercise numbers start at 1".into()))
}

/// Bring the session timers up to the current time when configured to
fn sync_clock(ctx: &Context, session: &mut SessionState) {
    if ctx.config.session.track_wall_clock {
        session.catch_up(Utc::now());
    }
}

/// Load the active session while holding the user's session lock
///
/// Keep the returned lock alive until the session has been saved.
fn load_active(ctx: &Context) -> Result<(SessionLock, SessionFile, SessionState)> {
    let lock = SessionLock::acquire(&ctx.data_dir, &ctx.user)?;
    let (file, mut session) = find_active(&ctx.data_dir, &ctx.user)?.ok_or_else(|| {
        Error::NotFound("no active session - run `fittrack start <plan>` first".into())
    })?;
    sync_clock(ctx, &mut session);
    Ok((lock, file, session))
}

/// Apply one event and save; a rejected event leaves the file untouched
fn apply_and_save(file: &SessionFile, session: &mut SessionState, event: SessionEvent) -> Result<()> {
    match session.apply(event) {
        SessionOutcome::Rejected(rejection) => {
            eprintln!("Rejected: {}", rejection);
            Err(Error::Session(rejection.to_string()))
        }
        SessionOutcome::Applied | SessionOutcome::Unchanged => file.save(session),
    }
}

fn cmd_plans(ctx: &Context) -> Result<()> {
    let library = PlanLibrary::new(&ctx.data_dir);
    for plan in library.list()? {
        println!(
            "{:<22} {} ({} exercises, {:?})",
            plan.id,
            plan.title,
            plan.exercises.len(),
            plan.intensity
        );
    }
    Ok(())
}

fn cmd_start(ctx: &Context, plan_id: &str) -> Result<()> {
    let library = PlanLibrary::new(&ctx.data_dir);
    let plan = library
        .fetch_plan(plan_id)?
        .ok_or_else(|| Error::NotFound(format!("plan '{}'", plan_id)))?;

    let _lock = SessionLock::acquire(&ctx.data_dir, &ctx.user)?;
    if let Some((_, active)) = find_active(&ctx.data_dir, &ctx.user)? {
        eprintln!(
            "A session for '{}' is already in progress. Finish or abandon it first.",
            active.plan().id
        );
        return Err(Error::Session("session already active".into()));
    }

    let mut session = SessionState::new(&plan, SessionSettings::from_config(&ctx.config))?;
    session.start();
    sync_clock(ctx, &mut session);

    let file = SessionFile::new(&ctx.data_dir, &ctx.user, &plan.id)?;
    file.save(&session)?;

    println!("✓ Started {}", plan.title);
    display_session(&session);
    Ok(())
}

fn cmd_status(ctx: &Context) -> Result<()> {
    match find_active(&ctx.data_dir, &ctx.user)? {
        Some((_, mut session)) => {
            sync_clock(ctx, &mut session);
            display_session(&session);
        }
        None => println!("No active session. Run `fittrack start <plan>` to begin."),
    }
    Ok(())
}

fn cmd_set(ctx: &Context, exercise: Option<usize>) -> Result<()> {
    let (_lock, file, mut session) = load_active(ctx)?;
    let index = match exercise {
        Some(n) => to_index(n)?,
        None => session.current_exercise(),
    };

    apply_and_save(&file, &mut session, SessionEvent::CompleteSet(index))?;

    if session.is_ready_to_finish() {
        println!("✓ All sets complete! Run `fittrack finish` to log the workout.");
    } else if session.is_resting() {
        println!("Rest {}s", session.rest_remaining_seconds());
    }
    display_session(&session);
    Ok(())
}

fn cmd_tick(ctx: &Context, seconds: u32) -> Result<()> {
    let (_lock, file, mut session) = load_active(ctx)?;
    for _ in 0..seconds {
        session.apply(SessionEvent::Tick);
    }
    file.save(&session)?;
    display_session(&session);
    Ok(())
}

fn cmd_apply(ctx: &Context, event: SessionEvent) -> Result<()> {
    let (_lock, file, mut session) = load_active(ctx)?;
    apply_and_save(&file, &mut session, event)?;
    display_session(&session);
    Ok(())
}

fn cmd_finish(ctx: &Context, force: bool) -> Result<()> {
    let (_lock, file, mut session) = load_active(ctx)?;

    let remaining = session.incomplete_sets();
    if remaining > 0 && !force {
        println!(
            "{} sets are still incomplete. Run `fittrack finish --force` to finish anyway.",
            remaining
        );
        return Ok(());
    }

    let mode = if force {
        FinishMode::Force
    } else {
        FinishMode::RequireProgress
    };

    let mut log = JsonlWorkoutLog::new(&ctx.data_dir);
    let record = finish_and_record(&mut session, mode, &ctx.user, &mut log, Utc::now())?;

    // A saved completed session is never resumed, so the workout cannot be
    // logged twice even if the remove below fails.
    let retired = file.save(&session);
    match (retired, file.remove()) {
        (_, Ok(())) => {}
        (Ok(()), Err(e)) => {
            tracing::warn!("Could not remove finished session {:?}: {}", file.path(), e)
        }
        (Err(_), Err(e)) => return Err(e),
    }

    println!("\n✓ Workout logged!");
    println!("  {}", record.title);
    println!("  Duration: {} min", record.duration_minutes);
    println!("  Weight lifted: {:.1} kg", record.total_weight.unwrap_or(0.0));
    if let Some(calories) = record.calories {
        println!("  Calories: {:.0}", calories);
    }

    let mut unlocks = JsonlUnlockStore::new(&ctx.data_dir);
    let unlocked = refresh_achievements(
        &ctx.user,
        &log,
        &mut unlocks,
        &ExternalCounts::default(),
        Utc::now(),
    )?;
    display_unlocks(&unlocked);
    Ok(())
}

fn cmd_abandon(ctx: &Context) -> Result<()> {
    let _lock = SessionLock::acquire(&ctx.data_dir, &ctx.user)?;
    match find_active(&ctx.data_dir, &ctx.user)? {
        Some((file, session)) => {
            file.remove()?;
            println!(
                "Session for '{}' abandoned; nothing was logged.",
                session.plan().title
            );
        }
        None => println!("No active session."),
    }
    Ok(())
}

fn cmd_stats(ctx: &Context) -> Result<()> {
    let log = JsonlWorkoutLog::new(&ctx.data_dir);
    let records = log.fetch_all(&ctx.user)?;
    let summary = MetricsSummary::from_log(&records);

    println!("Workouts:        {}", summary.total_workouts);
    println!("Exercises:       {}", summary.total_exercises);
    println!("Weight lifted:   {:.1} kg", summary.total_weight);
    println!("Time trained:    {} min", summary.total_duration_minutes);
    println!("Calories:        {:.0}", summary.total_calories);
    println!("Current streak:  {} days", summary.current_streak);
    println!("Longest streak:  {} days", summary.longest_streak);
    println!("Last 7 days:     {} workouts", recent(&records, Utc::now(), 7).len());

    let history = daily_history(&records);
    if !history.is_empty() {
        println!("\nRecent days:");
        for day in history.iter().take(7) {
            println!(
                "  {}  {} workout(s), {} min, {:.0} kcal, {:.1} kg",
                day.date, day.workouts, day.minutes, day.calories, day.weight
            );
        }
    }
    Ok(())
}

fn cmd_achievements(ctx: &Context, external: ExternalCounts) -> Result<()> {
    let log = JsonlWorkoutLog::new(&ctx.data_dir);
    let mut unlocks = JsonlUnlockStore::new(&ctx.data_dir);
    let unlocked = refresh_achievements(&ctx.user, &log, &mut unlocks, &external, Utc::now())?;

    let summary = MetricsSummary::from_log(&log.fetch_all(&ctx.user)?);
    let metrics = AchievementMetrics::from_summary(&summary, &external);

    for progress in achievements::evaluate(&metrics) {
        let tier = progress
            .tier
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".into());
        let status = if progress.completed {
            "completed".to_string()
        } else {
            format!("{}/{}", progress.current, progress.next_target)
        };
        println!("{:<18} {:<9} {}", progress.achievement.as_str(), tier, status);
    }

    display_unlocks(&unlocked);
    Ok(())
}

fn cmd_export(ctx: &Context, path: &std::path::Path) -> Result<()> {
    let log = JsonlWorkoutLog::new(&ctx.data_dir);
    let records = log.fetch_all(&ctx.user)?;
    let count = fitness_core::export::export_csv(&records, path)?;
    println!("✓ Exported {} workouts to {}", count, path.display());
    Ok(())
}

fn display_unlocks(unlocked: &[AchievementUnlocked]) {
    for unlock in unlocked {
        println!(
            "\n{} Achievement unlocked: {} ({} {})",
            unlock.icon, unlock.title, unlock.achievement, unlock.tier
        );
        println!("  {}", unlock.description);
    }
}

fn display_session(session: &SessionState) {
    let plan = session.plan();
    let elapsed = session.elapsed_seconds();
    let state = match (session.phase(), session.is_paused()) {
        (_, true) => "PAUSED".to_string(),
        (Phase::Resting, false) => format!("RESTING {}s", session.rest_remaining_seconds()),
        (phase, false) => format!("{:?}", phase).to_uppercase(),
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", plan.title);
    println!("╰─────────────────────────────────────────╯");
    println!(
        "  {}  {:02}:{:02}  {:.1} kg lifted",
        state,
        elapsed / 60,
        elapsed % 60,
        session.accumulated_weight()
    );
    println!();

    for (i, exercise) in session.exercises().iter().enumerate() {
        let marker = if i == session.current_exercise() { "→" } else { " " };
        let done = session.completed_sets(i).unwrap_or(0);
        let weight = exercise
            .target_weight
            .as_ref()
            .map(|w| format!(" @ {}", w))
            .unwrap_or_default();
        println!(
            "  {} {}. {:<24} {}/{} sets × {}{}",
            marker,
            i + 1,
            exercise.name,
            done,
            exercise.target_sets,
            exercise.target_reps,
            weight
        );
    }
    println!();
}
