//! Sproutvale headless host.
//!
//! Runs the farm tick and autosave, and reads voice-style commands from
//! stdin ("plant tomatoes", "water my crops", "check my farm") as one
//! player. Usage: `sproutvale [config.ron] [--user <id>]`.

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use sproutvale::config::FarmConfig;
use sproutvale::data::CropCatalog;
use sproutvale::homestead::{FarmContext, FarmRepository};
use sproutvale::save::{platform_store, save_all, SaveRequestEvent};
use sproutvale::shared::*;
use sproutvale::voice::{Intent, VoiceRequest, VoiceSkill};
use sproutvale::SproutvalePlugin;

const DEFAULT_CONFIG_PATH: &str = "sproutvale.ron";
const DEFAULT_USER: &str = "local";
const FRAME: Duration = Duration::from_millis(50);

/// Lines typed on stdin, fed by a reader thread.
#[derive(Resource)]
struct ConsoleInput(Mutex<Receiver<String>>);

/// The player this console speaks for.
#[derive(Resource)]
struct ConsoleUser(OwnerId);

fn main() -> AppExit {
    let mut config_path = DEFAULT_CONFIG_PATH.to_string();
    let mut user = DEFAULT_USER.to_string();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--user" => {
                if let Some(id) = args.next() {
                    user = id;
                }
            }
            _ => config_path = arg,
        }
    }

    let config = FarmConfig::load(Path::new(&config_path));
    let repo = FarmRepository::with_store(platform_store(&config));

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut app = App::new();
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(FRAME)))
        .add_plugins(LogPlugin::default())
        .add_plugins(StatesPlugin)
        .insert_resource(config)
        .insert_resource(repo)
        .insert_resource(VoiceSkill::default())
        .insert_resource(ConsoleInput(Mutex::new(rx)))
        .insert_resource(ConsoleUser(OwnerId::new(user)))
        .add_plugins(SproutvalePlugin)
        .add_systems(OnEnter(HostState::Running), greet)
        .add_systems(
            Update,
            (read_console, announce_ready).run_if(in_state(HostState::Running)),
        );

    let exit = app.run();

    // The exit frame may end before SavePlugin sees the request.
    let world = app.world();
    if let (Some(repo), Some(clock)) = (
        world.get_resource::<FarmRepository>(),
        world.get_resource::<FarmClock>(),
    ) {
        let saved = save_all(repo, clock.now());
        info!("[Save] Saved {saved} farm(s) on shutdown");
    }
    exit
}

fn greet(
    user: Res<ConsoleUser>,
    config: Res<FarmConfig>,
    catalog: Res<CropCatalog>,
    clock: Res<FarmClock>,
    repo: Res<FarmRepository>,
    mut skill: ResMut<VoiceSkill>,
) {
    let ctx = FarmContext::new(&config, &catalog);
    let now = clock.now();
    // Load now so the tick reports crops that ripened while we were away.
    repo.get_or_create(&user.0, ctx, now);
    let request = VoiceRequest {
        user: user.0.clone(),
        intent: Intent::Launch,
    };
    println!("{}", skill.handle(&request, &repo, ctx, now).speech);
}

#[allow(clippy::too_many_arguments)]
fn read_console(
    input: Res<ConsoleInput>,
    user: Res<ConsoleUser>,
    config: Res<FarmConfig>,
    catalog: Res<CropCatalog>,
    clock: Res<FarmClock>,
    repo: Res<FarmRepository>,
    mut skill: ResMut<VoiceSkill>,
    mut save_writer: EventWriter<SaveRequestEvent>,
    mut exit: EventWriter<AppExit>,
) {
    let ctx = FarmContext::new(&config, &catalog);
    let rx = input.0.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        let line = match rx.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                info!("[Voice] Console closed");
                exit.send(AppExit::Success);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(intent) = Intent::parse(&line) else {
            println!("Sorry, I didn't catch that. Say \"help\" to hear what you can do.");
            continue;
        };

        let request = VoiceRequest {
            user: user.0.clone(),
            intent,
        };
        let response = skill.handle(&request, &repo, ctx, clock.now());
        if !response.speech.is_empty() {
            println!("{}", response.speech);
        }
        if response.end_session {
            save_writer.send(SaveRequestEvent {
                owner: Some(user.0.clone()),
            });
            exit.send(AppExit::Success);
            return;
        }
    }
}

fn announce_ready(user: Res<ConsoleUser>, mut ready: EventReader<CropsReadyEvent>) {
    for ev in ready.read().filter(|ev| ev.owner == user.0) {
        let plots: Vec<String> = ev.slots.iter().map(|s| (s + 1).to_string()).collect();
        println!(
            "Your crops in plot {} are ready to harvest! Say \"harvest my crops\".",
            plots.join(", ")
        );
    }
}
