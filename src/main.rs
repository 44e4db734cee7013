use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use questline::config::{DEFAULT_CONFIG_PATH, ServerConfig};
use questline::console::{self, ConsoleCommand, HELP};
use questline::protocol::{self, ServerMessage};
use questline::quest::{QuestManager, QuestRegistry, Role};
use questline::replication::QuestObserver;
use questline::world::SimulatedWorld;

// ============================================================================
// Authority
// ============================================================================

/// Run one console command against the authority
fn run_command(
    manager: &mut QuestManager,
    world: &mut SimulatedWorld,
    command: ConsoleCommand,
) -> Result<(), String> {
    match command {
        ConsoleCommand::Activate { quest_id, start_at, focus } => {
            manager
                .activate(world, quest_id, start_at, focus)
                .map_err(|e| e.to_string())?;
        }
        ConsoleCommand::Focus(quest_id) => {
            if !manager.focus_quest(quest_id).map_err(|e| e.to_string())? {
                return Err(format!("Quest {} is not active", quest_id));
            }
        }
        ConsoleCommand::Reset(quest_id) => {
            manager.reset_quest(world, quest_id).map_err(|e| e.to_string())?;
        }
        ConsoleCommand::Event(event) => {
            let updates = manager.route(world, &event).map_err(|e| e.to_string())?;
            for update in updates {
                let done = if update.objective_completed {
                    " (done)"
                } else {
                    ""
                };
                info!(
                    "Quest {} step {}: {}/{}{}",
                    update.quest_id, update.step, update.current, update.target, done
                );
            }
        }
        ConsoleCommand::Join(player) => {
            info!("Player {} joined", player);
            world.add_player(player);
        }
        ConsoleCommand::Part(player) => {
            info!("Player {} left", player);
            world.remove_player(&player);
        }
        ConsoleCommand::Status => {
            let snapshot = manager.snapshot();
            let dump = serde_json::to_string_pretty(&snapshot)
                .map_err(|e| format!("Failed to serialize status: {}", e))?;
            info!("Quest state:\n{}", dump);
            if let Some(objective) = manager.focused_objective() {
                let progress = objective.progress();
                info!(
                    "Focused: quest {} step {} ({}) {}/{}",
                    objective.quest_id,
                    objective.step,
                    objective.objective_type().as_str(),
                    progress.current,
                    progress.target
                );
            }
            info!("Players: {:?}", world.players());
        }
        ConsoleCommand::Quests => {
            for def in manager.registry().iter() {
                info!("{:>4}  {} ({} steps)", def.id, def.name, def.step_count());
            }
        }
        ConsoleCommand::Help => info!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

/// Push notifications and, if it changed, the quest state to observers
fn publish(manager: &mut QuestManager, tx: &broadcast::Sender<Vec<u8>>) {
    let mut messages: Vec<ServerMessage> = manager
        .take_notifications()
        .into_iter()
        .map(|notification| ServerMessage::Notification { notification })
        .collect();
    if let Some(state) = manager.take_replication() {
        messages.push(ServerMessage::QuestState { state });
    }

    for msg in messages {
        match protocol::encode_server_message(&msg) {
            // No subscribers is fine
            Ok(bytes) => {
                let _ = tx.send(bytes);
            }
            Err(e) => error!("Failed to encode {}: {}", msg.msg_type(), e),
        }
    }
}

// ============================================================================
// Observer and console tasks
// ============================================================================

async fn run_observer(registry: Arc<QuestRegistry>, mut rx: broadcast::Receiver<Vec<u8>>) {
    let mut observer = QuestObserver::new(registry);
    loop {
        let bytes = match rx.recv().await {
            Ok(bytes) => bytes,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Observer lagged, skipped {} messages", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let msg = match protocol::decode_server_message(&bytes) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Observer dropped a frame: {}", e);
                continue;
            }
        };

        if let Some(notification) = observer.handle(msg) {
            info!("[observer] {:?}", notification);
        } else if let Some(view) = observer.focused_view() {
            let description = view.objective.map(|o| o.description.as_str()).unwrap_or("");
            info!(
                "[observer] Focused quest: {} - step {} {}",
                view.name, view.current_step, description
            );
        }
    }
    info!("Observer stopped");
}

async fn read_console(tx: mpsc::Sender<ConsoleCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read console: {}", e);
                break;
            }
        };

        match console::parse_command(&line) {
            Ok(Some(command)) => {
                let quit = command == ConsoleCommand::Quit;
                if tx.send(command).await.is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{}", e),
        }
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = match ServerConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    match config.log_filter.parse::<tracing_subscriber::filter::Directive>() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring log_filter '{}': {}", config.log_filter, e),
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = match QuestRegistry::load_from_directory(&config.data_dir) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to load quest registry: {}", e);
            Arc::new(QuestRegistry::default())
        }
    };

    let mut world = config.build_world();
    let mut manager = match config.rng_seed {
        Some(seed) => QuestManager::with_seed(registry.clone(), Role::Authority, seed),
        None => QuestManager::new(registry.clone(), Role::Authority),
    };

    let (broadcast_tx, broadcast_rx) = broadcast::channel::<Vec<u8>>(256);
    let observer_task = tokio::spawn(run_observer(registry.clone(), broadcast_rx));

    let (console_tx, mut console_rx) = mpsc::channel::<ConsoleCommand>(64);
    tokio::spawn(read_console(console_tx));

    info!(
        "Quest server running with {} quests, ticking every {}ms. {}",
        registry.len(),
        config.tick_interval_ms,
        HELP
    );

    let mut interval = tokio::time::interval(Duration::from_millis(config.tick_interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                manager.tick(&mut world);
            }
            command = console_rx.recv() => match command {
                Some(ConsoleCommand::Quit) | None => break,
                Some(command) => {
                    if let Err(e) = run_command(&mut manager, &mut world, command) {
                        warn!("{}", e);
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
        publish(&mut manager, &broadcast_tx);
    }

    if let Err(e) = manager.shutdown(&mut world) {
        error!("Shutdown failed: {}", e);
    }
    publish(&mut manager, &broadcast_tx);
    drop(broadcast_tx);
    let _ = observer_task.await;
    info!("Quest server stopped");
}
