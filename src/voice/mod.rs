//! Voice adapter: spoken intents in, speech out.
//!
//! Each request locks the speaker's homestead through the repository, runs
//! one core operation, and renders the structured result as a line of
//! speech plus a reprompt. Line choice uses a seedable RNG so responses are
//! reproducible in tests.

pub mod lines;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Duration;

use crate::data::CropCatalog;
use crate::farming::{ClearTarget, SlotTarget};
use crate::homestead::{FarmContext, FarmRepository, FarmStatus, HarvestOutcome, PlantOutcome};
use crate::shared::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Launch,
    PlantCrop { crop: Option<String> },
    WaterCrops { crop: Option<String> },
    HarvestCrops { crop: Option<String> },
    CheckFarm,
    Help,
    Stop,
    SessionEnded,
}

impl Intent {
    /// Parse a typed utterance such as "plant tomatoes" or "water my crops".
    pub fn parse(utterance: &str) -> Option<Intent> {
        let lowered = utterance.trim().to_ascii_lowercase();
        let mut words = lowered.split_whitespace();
        let verb = words.next()?;
        let object: Vec<&str> = words
            .filter(|w| !matches!(*w, "my" | "the" | "some" | "all" | "crops" | "crop" | "farm"))
            .collect();
        let crop = (!object.is_empty()).then(|| object.join(" "));

        let intent = match verb {
            "launch" | "start" | "open" => Intent::Launch,
            "plant" | "sow" => Intent::PlantCrop { crop },
            "water" => Intent::WaterCrops { crop },
            "harvest" | "pick" => Intent::HarvestCrops { crop },
            "check" | "status" | "how" => Intent::CheckFarm,
            "help" => Intent::Help,
            "stop" | "cancel" | "quit" | "exit" | "bye" => Intent::Stop,
            _ => return None,
        };
        Some(intent)
    }
}

#[derive(Debug, Clone)]
pub struct VoiceRequest {
    pub user: OwnerId,
    pub intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoiceResponse {
    pub speech: String,
    pub reprompt: Option<String>,
    pub end_session: bool,
}

impl VoiceResponse {
    fn ask(speech: impl Into<String>, reprompt: &str) -> Self {
        Self {
            speech: speech.into(),
            reprompt: Some(reprompt.to_string()),
            end_session: false,
        }
    }

    fn close(speech: impl Into<String>) -> Self {
        Self {
            speech: speech.into(),
            reprompt: None,
            end_session: true,
        }
    }
}

/// Match a spoken crop name to a catalog id: "tomato" and "Tomatoes" both
/// resolve to `tomatoes`, "strawberry" to `strawberries`. Unmatched words
/// pass through so the catalog reports them as unknown.
pub fn resolve_crop(catalog: &CropCatalog, spoken: &str) -> CropId {
    let spoken = spoken.trim().to_ascii_lowercase();
    let mut candidates = vec![spoken.clone(), format!("{spoken}s"), format!("{spoken}es")];
    if let Some(stem) = spoken.strip_suffix('y') {
        candidates.push(format!("{stem}ies"));
    }
    if let Some(hit) = candidates.iter().find(|id| catalog.contains(id)) {
        return hit.clone();
    }
    catalog
        .list_all()
        .into_iter()
        .find(|def| def.name.eq_ignore_ascii_case(&spoken))
        .map_or(spoken, |def| def.id.clone())
}

/// Speak a wait time the way a person would: "about 3 hours".
pub fn describe_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    let (amount, unit) = if secs >= 3600 {
        ((secs + 1800) / 3600, "hour")
    } else if secs >= 60 {
        ((secs + 30) / 60, "minute")
    } else {
        (secs.max(1), "second")
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("about {amount} {unit}{plural}")
}

fn crop_name(catalog: &CropCatalog, id: &str) -> String {
    catalog
        .get(id)
        .map_or_else(|_| id.to_string(), |def| def.name.to_ascii_lowercase())
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {one}")
    } else {
        format!("{count} {many}")
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SKILL
// ═══════════════════════════════════════════════════════════════════════

#[derive(Resource)]
pub struct VoiceSkill {
    rng: StdRng,
}

impl Default for VoiceSkill {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl VoiceSkill {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, pool: &[&str]) -> String {
        pool.choose(&mut self.rng).copied().unwrap_or_default().to_string()
    }

    pub fn handle(
        &mut self,
        request: &VoiceRequest,
        repo: &FarmRepository,
        ctx: FarmContext<'_>,
        now: Timestamp,
    ) -> VoiceResponse {
        debug!("[Voice] {} -> {:?}", request.user, request.intent);
        let user = &request.user;
        match &request.intent {
            Intent::Launch => VoiceResponse::ask(lines::WELCOME, lines::WELCOME_REPROMPT),
            Intent::Help => VoiceResponse::ask(self.help(ctx), lines::HELP_REPROMPT),
            Intent::Stop => VoiceResponse::close(self.pick(lines::GOODBYES)),
            Intent::SessionEnded => VoiceResponse::close(String::new()),
            Intent::PlantCrop { crop: None } => {
                let prompt = format!(
                    "What would you like to plant? You can choose from {}.",
                    self.available(repo, user, ctx, now)
                );
                VoiceResponse::ask(prompt.clone(), &prompt)
            }
            Intent::PlantCrop { crop: Some(spoken) } => {
                let crop = resolve_crop(ctx.catalog, spoken);
                let result = repo.with_farm(user, ctx, now, |home| home.plant(ctx, None, &crop, now));
                match result {
                    Ok(outcome) => VoiceResponse::ask(self.planted(&outcome), lines::NEXT_REPROMPT),
                    Err(err) => self.refusal(ctx, &err),
                }
            }
            Intent::WaterCrops { crop } => {
                let target = crop
                    .as_deref()
                    .map_or(SlotTarget::All, |c| SlotTarget::Crop(resolve_crop(ctx.catalog, c)));
                match repo.with_farm(user, ctx, now, |home| home.water(ctx, &target, now)) {
                    Ok(report) => {
                        let mut speech = self.pick(lines::WATERED);
                        speech.push_str(&format!(
                            " I watered {} for you!",
                            plural(report.watered.len(), "crop", "crops")
                        ));
                        if report.nearly_ready > 0 {
                            speech.push_str(" Some of your crops are almost ready to harvest!");
                        }
                        VoiceResponse::ask(speech, lines::NEXT_REPROMPT)
                    }
                    Err(FarmError::NoCrops { .. }) => VoiceResponse::ask(
                        "I don't see any crops to water yet! You'll need to plant some seeds first. \
Try saying \"plant tomatoes\" to get started.",
                        lines::NEXT_REPROMPT,
                    ),
                    Err(err) => self.refusal(ctx, &err),
                }
            }
            Intent::HarvestCrops { crop } => {
                let target = crop
                    .as_deref()
                    .map_or(SlotTarget::All, |c| SlotTarget::Crop(resolve_crop(ctx.catalog, c)));
                // Speech has no clear command, so harvested plots are freed at once.
                let result = repo.with_farm(user, ctx, now, |home| {
                    let outcome = home.harvest(ctx, &target, now)?;
                    home.clear(&ClearTarget::AllHarvested, now)?;
                    Ok::<_, FarmError>(outcome)
                });
                match result {
                    Ok(outcome) => VoiceResponse::ask(self.harvested(ctx, &outcome), lines::NEXT_REPROMPT),
                    Err(FarmError::NoCrops { .. }) => VoiceResponse::ask(
                        "Your farm is empty! You'll need to plant some seeds first, then water them \
and wait for them to grow. Try saying \"plant tomatoes\" to get started!",
                        lines::NEXT_REPROMPT,
                    ),
                    Err(err) => self.refusal(ctx, &err),
                }
            }
            Intent::CheckFarm => {
                let status = repo.with_farm(user, ctx, now, |home| home.status(ctx, now));
                let reprompt = if status.slots.is_empty() {
                    "What would you like to plant first?"
                } else {
                    "What would you like to do? You can harvest ready crops, water growing crops, \
or plant new ones!"
                };
                VoiceResponse::ask(self.report(ctx, &status), reprompt)
            }
        }
    }

    fn available(
        &self,
        repo: &FarmRepository,
        user: &OwnerId,
        ctx: FarmContext<'_>,
        now: Timestamp,
    ) -> String {
        let level = repo.with_farm(user, ctx, now, |home| home.ledger.level());
        let names: Vec<String> = ctx
            .catalog
            .list_for_level(level)
            .into_iter()
            .map(|def| def.name.to_ascii_lowercase())
            .collect();
        join_spoken(&names)
    }

    fn help(&self, ctx: FarmContext<'_>) -> String {
        let waits: Vec<String> = ctx
            .catalog
            .list_for_level(1)
            .into_iter()
            .map(|def| {
                format!(
                    "{} takes {}",
                    def.name.to_ascii_lowercase(),
                    describe_wait(ctx.config.growth_duration(def.growth_units))
                )
            })
            .collect();
        format!(
            "Here's how to play. To plant, say \"plant tomatoes\". To water, say \"water my \
crops\". To harvest what's ready, say \"harvest my crops\". To see what's growing, say \
\"check my farm\". Crops take real time to grow: {}. The more you harvest, the higher your \
farming level becomes, and new crops unlock as you level up. What would you like to do?",
            join_spoken(&waits)
        )
    }

    fn planted(&mut self, outcome: &PlantOutcome) -> String {
        let name = outcome.crop_name.to_ascii_lowercase();
        let mut speech = self.pick(lines::PLANTED).replace("{crop}", &name);
        speech.push_str(&format!(
            " Your {name} will be ready to harvest in {}.",
            describe_wait(outcome.growth)
        ));
        if outcome.cost > 0 {
            speech.push_str(&format!(
                " The seeds cost {} and you have {} left.",
                plural(outcome.cost as usize, "coin", "coins"),
                outcome.coins_left
            ));
        }
        for unlock in &outcome.unlocks {
            speech.push(' ');
            speech.push_str(&unlock.headline());
        }
        speech
    }

    fn harvested(&mut self, ctx: FarmContext<'_>, outcome: &HarvestOutcome) -> String {
        let mut speech = self.pick(lines::HARVESTED);
        match outcome.report.crops.as_slice() {
            [only] => speech.push_str(&format!(
                " You harvested your {}!",
                crop_name(ctx.catalog, &only.crop_id)
            )),
            crops => speech.push_str(&format!(" You harvested {} wonderful crops!", crops.len())),
        }
        let total = outcome.report.total;
        speech.push_str(&format!(
            " You earned {} coins and {} experience points!",
            total.coins, total.xp
        ));
        if outcome.leveled_up() {
            speech.push_str(&format!(
                " Congratulations! You've reached level {}!",
                outcome.level
            ));
            for level_up in &outcome.level_ups {
                if let Some(benefit) = &level_up.benefit {
                    speech.push(' ');
                    speech.push_str(&benefit.message());
                }
            }
        } else {
            speech.push_str(&format!(
                " You're now at level {} with {} total experience points!",
                outcome.level, outcome.experience
            ));
        }
        for unlock in &outcome.unlocks {
            speech.push(' ');
            speech.push_str(&unlock.headline());
        }
        speech.push_str(&self.pick(lines::ENCOURAGEMENTS));
        speech
    }

    fn report(&self, ctx: FarmContext<'_>, status: &FarmStatus) -> String {
        let mut speech = format!(
            "You're level {} with {} experience points and {} coins. You've harvested {} so far!",
            status.level,
            status.experience,
            status.coins,
            plural(status.total_harvests as usize, "crop", "crops")
        );
        if status.slots.is_empty() {
            let names: Vec<String> = status
                .available_crops
                .iter()
                .map(|id| crop_name(ctx.catalog, id))
                .collect();
            speech.push_str(&format!(
                " Your farm is ready for planting! You can grow {}. What would you like to plant first?",
                join_spoken(&names)
            ));
            return speech;
        }

        let names_in = |state: CropState| -> Vec<String> {
            status
                .slots
                .iter()
                .filter(|s| s.state == state)
                .map(|s| crop_name(ctx.catalog, &s.crop_id))
                .collect()
        };
        let ready = names_in(CropState::Ready);
        let thirsty = names_in(CropState::Planted);
        let growing: Vec<String> = status
            .slots
            .iter()
            .filter(|s| s.state == CropState::Growing)
            .map(|s| {
                format!(
                    "{} (ready in {})",
                    crop_name(ctx.catalog, &s.crop_id),
                    describe_wait(s.remaining)
                )
            })
            .collect();

        if !ready.is_empty() {
            speech.push_str(&format!(
                " Great news! You have {} ready to harvest: {}. Say \"harvest my crops\" to collect them!",
                plural(ready.len(), "crop", "crops"),
                join_spoken(&ready)
            ));
        }
        if !growing.is_empty() {
            speech.push_str(&format!(
                " You have {} growing nicely: {}.",
                plural(growing.len(), "crop", "crops"),
                join_spoken(&growing)
            ));
        }
        if !thirsty.is_empty() {
            speech.push_str(&format!(
                " {} could use some water: {}. Say \"water my crops\" to help them along!",
                plural(thirsty.len(), "crop", "crops"),
                join_spoken(&thirsty)
            ));
        }
        if let Some(level) = status.next_unlock_level {
            speech.push_str(&format!(" New crops unlock at level {level}."));
        }
        speech
    }

    fn refusal(&mut self, ctx: FarmContext<'_>, err: &FarmError) -> VoiceResponse {
        if err.is_integrity_failure() {
            warn!("[Voice] Request failed: {err}");
            return VoiceResponse::ask(self.pick(lines::ERRORS), lines::ERROR_REPROMPT);
        }
        let lead = match err {
            FarmError::NotReady {
                reason: NotReadyReason::StillGrowing { count },
            } => format!(
                "Your crops aren't ready yet. {} still growing.",
                plural(*count, "crop is", "crops are")
            ),
            FarmError::NotReady {
                reason: NotReadyReason::NeverPlanted,
            } => "I don't see any of those on your farm.".to_string(),
            FarmError::UnknownCrop { crop } => format!("I don't know how to grow {crop}."),
            FarmError::CropLocked {
                crop,
                required_level,
                ..
            } => format!(
                "{} unlock at level {required_level}.",
                capitalize(&crop_name(ctx.catalog, crop))
            ),
            FarmError::FarmFull { .. } => "Your farm is getting full!".to_string(),
            FarmError::InsufficientFunds { needed, .. } => {
                format!("Those seeds cost {needed} coins.")
            }
            other => format!("{}.", capitalize(&other.to_string())),
        };
        VoiceResponse::ask(format!("{lead} {}", err.suggestion()), lines::NEXT_REPROMPT)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// "a", "a or b", "a, b, or c".
fn join_spoken(items: &[String]) -> String {
    match items {
        [] => "nothing yet".to_string(),
        [one] => one.clone(),
        [a, b] => format!("{a} or {b}"),
        [rest @ .., last] => format!("{}, or {last}", rest.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FarmConfig;
    use crate::data::builtin_catalog;

    const HOUR: Duration = Duration::from_secs(3600);

    fn ask(
        skill: &mut VoiceSkill,
        repo: &FarmRepository,
        ctx: FarmContext<'_>,
        intent: Intent,
        now: Timestamp,
    ) -> VoiceResponse {
        let request = VoiceRequest {
            user: OwnerId::new("amzn1.ask.account.test"),
            intent,
        };
        skill.handle(&request, repo, ctx, now)
    }

    #[test]
    fn test_parse_utterances() {
        assert_eq!(
            Intent::parse("plant tomatoes"),
            Some(Intent::PlantCrop {
                crop: Some("tomatoes".into())
            })
        );
        assert_eq!(Intent::parse("Water my crops"), Some(Intent::WaterCrops { crop: None }));
        assert_eq!(
            Intent::parse("harvest my carrots"),
            Some(Intent::HarvestCrops {
                crop: Some("carrots".into())
            })
        );
        assert_eq!(Intent::parse("check my farm"), Some(Intent::CheckFarm));
        assert_eq!(Intent::parse("quit"), Some(Intent::Stop));
        assert_eq!(Intent::parse("dance"), None);
        assert_eq!(Intent::parse("   "), None);
    }

    #[test]
    fn test_resolve_crop_names() {
        let catalog = builtin_catalog();
        assert_eq!(resolve_crop(&catalog, "tomato"), "tomatoes");
        assert_eq!(resolve_crop(&catalog, "Carrot"), "carrots");
        assert_eq!(resolve_crop(&catalog, "strawberry"), "strawberries");
        assert_eq!(resolve_crop(&catalog, "corn"), "corn");
        assert_eq!(resolve_crop(&catalog, "mandrake"), "mandrake");
    }

    #[test]
    fn test_describe_wait() {
        assert_eq!(describe_wait(HOUR * 4), "about 4 hours");
        assert_eq!(describe_wait(HOUR), "about 1 hour");
        assert_eq!(describe_wait(Duration::from_secs(90)), "about 2 minutes");
        assert_eq!(describe_wait(Duration::from_secs(6)), "about 6 seconds");
    }

    #[test]
    fn test_plant_water_harvest_conversation() {
        let config = FarmConfig::default();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let repo = FarmRepository::default();
        let mut skill = VoiceSkill::seeded(7);
        let t0 = Timestamp::from_secs(10_000);

        let launch = ask(&mut skill, &repo, ctx, Intent::Launch, t0);
        assert!(!launch.end_session);
        assert!(launch.reprompt.is_some());

        let planted = ask(
            &mut skill,
            &repo,
            ctx,
            Intent::PlantCrop {
                crop: Some("tomato".into()),
            },
            t0,
        );
        assert!(planted.speech.contains("tomatoes"), "{}", planted.speech);
        assert!(planted.speech.contains("about 4 hours"), "{}", planted.speech);

        let watered = ask(&mut skill, &repo, ctx, Intent::WaterCrops { crop: None }, t0);
        assert!(watered.speech.contains("I watered 1 crop"), "{}", watered.speech);

        let early = ask(&mut skill, &repo, ctx, Intent::HarvestCrops { crop: None }, t0);
        assert!(early.speech.contains("aren't ready yet"), "{}", early.speech);

        let later = t0.plus(HOUR * 4);
        let harvested = ask(&mut skill, &repo, ctx, Intent::HarvestCrops { crop: None }, later);
        assert!(harvested.speech.contains("harvested your tomatoes"), "{}", harvested.speech);
        assert!(harvested.speech.contains("18 coins and 10 experience"));

        let status = ask(&mut skill, &repo, ctx, Intent::CheckFarm, later);
        assert!(status.speech.contains("ready for planting"), "{}", status.speech);
    }

    #[test]
    fn test_errors_are_spoken_with_a_remedy() {
        let config = FarmConfig::default();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let repo = FarmRepository::default();
        let mut skill = VoiceSkill::seeded(1);

        let empty = ask(&mut skill, &repo, ctx, Intent::WaterCrops { crop: None }, Timestamp::ZERO);
        assert!(empty.speech.contains("plant some seeds first"));

        let locked = ask(
            &mut skill,
            &repo,
            ctx,
            Intent::PlantCrop {
                crop: Some("pumpkin".into()),
            },
            Timestamp::ZERO,
        );
        assert!(locked.speech.contains("level 5"), "{}", locked.speech);
        assert!(!locked.end_session);
    }

    #[test]
    fn test_stop_and_session_end_close_the_session() {
        let config = FarmConfig::default();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let repo = FarmRepository::default();
        let mut skill = VoiceSkill::seeded(3);

        let bye = ask(&mut skill, &repo, ctx, Intent::Stop, Timestamp::ZERO);
        assert!(bye.end_session);
        assert!(lines::GOODBYES.contains(&bye.speech.as_str()));

        let ended = ask(&mut skill, &repo, ctx, Intent::SessionEnded, Timestamp::ZERO);
        assert!(ended.end_session);
        assert!(ended.speech.is_empty());
        assert!(repo.is_empty(), "no farm is created just to say goodbye");
    }

    #[test]
    fn test_entropy_seeded_skill_picks_known_lines() {
        let mut skill = VoiceSkill::default();
        for _ in 0..5 {
            let line = skill.pick(lines::GOODBYES);
            assert!(lines::GOODBYES.contains(&line.as_str()));
        }
    }

    #[test]
    fn test_same_seed_same_lines() {
        let mut a = VoiceSkill::seeded(42);
        let mut b = VoiceSkill::seeded(42);
        for _ in 0..5 {
            assert_eq!(a.pick(lines::GOODBYES), b.pick(lines::GOODBYES));
        }
    }
}
