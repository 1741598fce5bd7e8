use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use crossfire_core::geometry::Position;
use crossfire_core::match_state::MatchState;
use crossfire_core::participant::{Participant, ParticipantId, TeamId};
use crossfire_host::{HostConfig, HostError, LogFormat, RouterHandle, SessionCommand, spawn_router};
use crossfire_referee::MatchEvent;
use crossfire_referee::arena::{Arena, load_arena};

/// How often the demo driver moves a bot.
const DRIVER_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    let config = HostConfig::load();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    if let Err(e) = config.validate() {
        tracing::error!("{e}");
        std::process::exit(1);
    }

    tracing::info!(
        tick_rate_hz = config.tick_rate_hz,
        participants = config.demo.participants,
        "Crossfire host starting"
    );

    if let Err(e) = run_demo(config).await {
        tracing::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

/// Play one headless match with wandering bots until it finishes, times out,
/// or ctrl-c is pressed.
async fn run_demo(config: HostConfig) -> Result<(), HostError> {
    let arena = load_arena(config.referee.team_count);
    let (router, router_task) =
        spawn_router(config.referee.clone(), arena.clone(), config.tick_interval());
    let mut events = router.subscribe();

    let mut rng = match config.demo.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut bots = Vec::with_capacity(config.demo.participants);
    for i in 0..config.demo.participants {
        let id = i as ParticipantId + 1;
        let team = (i % usize::from(config.referee.team_count)) as TeamId + 1;
        let mut bot = Participant::new(id, team);
        bot.display_name = format!("Bot{id}");
        bot.position = near_base(&arena, team, &mut rng);
        router.join(bot.clone())?;
        bots.push(bot);
    }

    let host = bots.first().map(|b| b.id).unwrap_or(1);
    router.command(host, SessionCommand::StartMatch(config.demo.settings.clone()))?;

    let deadline = tokio::time::sleep(Duration::from_secs(config.demo.max_duration_secs));
    tokio::pin!(deadline);
    let mut driver = tokio::time::interval(DRIVER_INTERVAL);
    let mut playing = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                tracing::warn!(
                    secs = config.demo.max_duration_secs,
                    "Match did not finish in time"
                );
                break;
            }
            _ = driver.tick(), if playing => {
                drive_bot(&router, &arena, &mut bots, &mut rng)?;
            }
            received = events.recv() => match received {
                Ok((participant, event)) => {
                    if participant != host {
                        tracing::trace!(participant, ?event, "Match event");
                        continue;
                    }
                    match &event {
                        MatchEvent::StateChanged { to, .. } => {
                            playing = *to == MatchState::Playing;
                            tracing::info!(state = %to, "Match state changed");
                        },
                        MatchEvent::MatchFinished { reason, winner, scores } => {
                            tracing::info!(?reason, ?winner, ?scores, "Match finished");
                            break;
                        },
                        other => tracing::info!(event = ?other, "Match event"),
                    }
                },
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Event subscriber lagged by {n} messages");
                },
                Err(RecvError::Closed) => break,
            },
        }
    }

    router.shutdown().await?;
    if let Err(e) = router_task.await {
        tracing::error!(error = %e, "Router task failed");
    }
    Ok(())
}

/// Move one random bot toward an objective, and sometimes have it tag someone
/// or get tagged.
fn drive_bot(
    router: &RouterHandle,
    arena: &Arena,
    bots: &mut [Participant],
    rng: &mut StdRng,
) -> Result<(), HostError> {
    if bots.is_empty() {
        return Ok(());
    }
    let idx = rng.random_range(0..bots.len());
    let bot = &mut bots[idx];

    if !bot.alive {
        bot.alive = true;
        bot.position = near_base(arena, bot.team, rng);
        return router.update(bot.clone());
    }

    let roll: f32 = rng.random();
    bot.position = if roll < 0.4 {
        match arena.control_points.first() {
            Some(cp) => jitter(cp.center, cp.radius * 0.5, rng),
            None => near_base(arena, bot.team, rng),
        }
    } else if roll < 0.7 {
        let enemy_flag = arena.flags.iter().find(|f| f.home_team != bot.team);
        match enemy_flag {
            Some(flag) => jitter(flag.home, 0.3, rng),
            None => near_base(arena, bot.team, rng),
        }
    } else {
        near_base(arena, bot.team, rng)
    };
    if rng.random_bool(0.1) {
        bot.alive = false;
    }
    router.update(bot.clone())?;

    if rng.random_bool(0.3) {
        let shooter = bots[rng.random_range(0..bots.len())].id;
        router.command(shooter, SessionCommand::RecordTag { shooter })?;
    }
    Ok(())
}

fn near_base(arena: &Arena, team: TeamId, rng: &mut StdRng) -> Position {
    match arena.base_for(team) {
        Some(base) => jitter(base.zone.center, base.zone.radius * 0.5, rng),
        None => Position::default(),
    }
}

fn jitter(center: Position, spread: f32, rng: &mut StdRng) -> Position {
    Position::new(
        center.x + rng.random_range(-spread..=spread),
        center.y,
        center.z + rng.random_range(-spread..=spread),
    )
}
