use super::*;
use crate::types::{StatChanges, STAT_MAX, STAT_MIN};
use chrono::Utc;
use tokio::sync::RwLock;

/// Tuning for the in-memory engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hunger gained per tick
    pub hunger_decay: i32,
    /// Happiness lost per tick
    pub happiness_decay: i32,
    /// Energy lost per tick
    pub energy_decay: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hunger_decay: 2,
            happiness_decay: 1,
            energy_decay: 1,
        }
    }
}

/// Pet engine keeping a single pet in memory.
///
/// Every mutation runs under one write lock, so actions and ticks never
/// interleave inside a single pet update.
pub struct MemoryEngine {
    pet: RwLock<Option<PetState>>,
    config: EngineConfig,
}

/// Name used when resetting without an existing pet
const DEFAULT_NAME: &str = "Tama";

/// Which stat an action touches, and by how much
type Adjustments<'a> = &'a [(Stat, i32)];

#[derive(Debug, Clone, Copy)]
enum Stat {
    Hunger,
    Happiness,
    Energy,
}

impl Stat {
    fn name(self) -> &'static str {
        match self {
            Stat::Hunger => "hunger",
            Stat::Happiness => "happiness",
            Stat::Energy => "energy",
        }
    }

    fn slot(self, pet: &mut PetState) -> &mut i32 {
        match self {
            Stat::Hunger => &mut pet.hunger,
            Stat::Happiness => &mut pet.happiness,
            Stat::Energy => &mut pet.energy,
        }
    }
}

/// Apply clamped adjustments and report the deltas that actually happened
fn adjust(pet: &mut PetState, adjustments: Adjustments<'_>) -> StatChanges {
    let mut changes = StatChanges::new();
    for &(stat, delta) in adjustments {
        let slot = stat.slot(pet);
        let before = *slot;
        *slot = (before + delta).clamp(STAT_MIN, STAT_MAX);
        changes.insert(stat.name().to_string(), *slot - before);
    }
    changes
}

impl MemoryEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            pet: RwLock::new(None),
            config,
        }
    }

    /// Engine that already holds a fresh pet
    pub fn with_pet(name: &str) -> Self {
        Self {
            pet: RwLock::new(Some(PetState::new(name))),
            config: EngineConfig::default(),
        }
    }

    /// Apply one decay step. Returns the updated snapshot.
    pub async fn tick(&self) -> Option<PetState> {
        let mut guard = self.pet.write().await;
        let pet = guard.as_mut()?;

        pet.age = (Utc::now() - pet.created_at).num_minutes();
        if pet.is_alive {
            adjust(
                pet,
                &[
                    (Stat::Hunger, self.config.hunger_decay),
                    (Stat::Happiness, -self.config.happiness_decay),
                    (Stat::Energy, -self.config.energy_decay),
                ],
            );
            if pet.should_die() {
                pet.kill();
                tracing::info!("{} has died (deaths: {})", pet.name, pet.deaths);
            } else {
                pet.update_mood();
            }
        }

        Some(pet.clone())
    }

    /// Shared body of the four care actions
    async fn care<F>(&self, apply: F) -> EngineResult<ActionResult>
    where
        F: FnOnce(&mut PetState) -> Result<(String, StatChanges), String>,
    {
        let mut guard = self.pet.write().await;
        let pet = guard.as_mut().ok_or(EngineError::NoPet)?;

        if !pet.is_alive {
            return Ok(ActionResult::failed(format!(
                "{} is dead. Revive them first.",
                pet.name
            )));
        }

        let (message, stat_changes) = match apply(pet) {
            Ok(outcome) => outcome,
            Err(reason) => return Ok(ActionResult::failed(reason)),
        };

        pet.total_interactions += 1;
        let message = if pet.should_die() {
            pet.kill();
            format!("{} Then {} collapsed.", message, pet.name)
        } else {
            pet.update_mood();
            message
        };

        Ok(ActionResult {
            success: true,
            message,
            stat_changes,
            new_mood: pet.current_mood.clone(),
        })
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[async_trait]
impl PetEngine for MemoryEngine {
    async fn get_state(&self) -> EngineResult<Option<PetState>> {
        Ok(self.pet.read().await.clone())
    }

    async fn feed(&self) -> EngineResult<ActionResult> {
        self.care(|pet| {
            if pet.hunger <= 10 {
                return Err(format!("{} is too full to eat.", pet.name));
            }
            let changes = adjust(pet, &[(Stat::Hunger, -25), (Stat::Happiness, 5)]);
            pet.last_fed = Utc::now();
            Ok((format!("{} ate happily.", pet.name), changes))
        })
        .await
    }

    async fn play(&self) -> EngineResult<ActionResult> {
        self.care(|pet| {
            if pet.energy < 15 {
                return Err(format!("{} is too tired to play.", pet.name));
            }
            let changes = adjust(
                pet,
                &[
                    (Stat::Happiness, 20),
                    (Stat::Energy, -15),
                    (Stat::Hunger, 10),
                ],
            );
            pet.last_played = Utc::now();
            Ok((format!("{} played for a while.", pet.name), changes))
        })
        .await
    }

    async fn sleep(&self) -> EngineResult<ActionResult> {
        self.care(|pet| {
            if pet.energy >= 90 {
                return Err(format!("{} is not sleepy.", pet.name));
            }
            let changes = adjust(pet, &[(Stat::Energy, 40), (Stat::Hunger, 5)]);
            pet.last_slept = Utc::now();
            Ok((format!("{} took a nap.", pet.name), changes))
        })
        .await
    }

    async fn pet(&self) -> EngineResult<ActionResult> {
        self.care(|pet| {
            let changes = adjust(pet, &[(Stat::Happiness, 10)]);
            pet.last_pet = Utc::now();
            Ok((format!("{} enjoyed the attention.", pet.name), changes))
        })
        .await
    }

    async fn revive(&self) -> EngineResult<ActionResult> {
        let mut guard = self.pet.write().await;
        let pet = guard.as_mut().ok_or(EngineError::NoPet)?;

        if pet.is_alive {
            return Ok(ActionResult::failed(format!("{} is already alive.", pet.name)));
        }

        let (hunger, happiness, energy) = (pet.hunger, pet.happiness, pet.energy);
        pet.revive();
        pet.total_interactions += 1;

        let stat_changes = StatChanges::from([
            ("hunger".to_string(), pet.hunger - hunger),
            ("happiness".to_string(), pet.happiness - happiness),
            ("energy".to_string(), pet.energy - energy),
        ]);

        Ok(ActionResult {
            success: true,
            message: format!("{} is back from the dead.", pet.name),
            stat_changes,
            new_mood: pet.current_mood.clone(),
        })
    }

    async fn create(&self, name: &str) -> EngineResult<PetState> {
        let pet = PetState::new(name);
        *self.pet.write().await = Some(pet.clone());
        tracing::info!("Created new pet: {}", name);
        Ok(pet)
    }

    /// Start over with a fresh pet of the same name
    async fn reset(&self) -> EngineResult<PetState> {
        let mut guard = self.pet.write().await;
        let name = guard
            .as_ref()
            .map_or_else(|| DEFAULT_NAME.to_string(), |p| p.name.clone());
        let pet = PetState::new(name);
        *guard = Some(pet.clone());
        tracing::info!("Pet reset");
        Ok(pet)
    }
}
