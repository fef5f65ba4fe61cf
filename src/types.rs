use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Stat name -> signed delta applied by an action
pub type StatChanges = HashMap<String, i32>;

/// Mood shown when there is no pet to read one from
pub const NEUTRAL_MOOD: &str = "😐";

pub const STAT_MIN: i32 = 0;
pub const STAT_MAX: i32 = 100;

/// Snapshot of the shared pet.
///
/// `hunger` grows towards 100 (starving); `happiness` and `energy` drain towards 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PetState {
    pub name: String,
    /// Minutes since the pet was created
    pub age: i64,
    pub hunger: i32,
    pub happiness: i32,
    pub energy: i32,
    pub is_alive: bool,
    pub current_mood: String,
    pub last_fed: DateTime<Utc>,
    pub last_played: DateTime<Utc>,
    pub last_slept: DateTime<Utc>,
    pub last_pet: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub total_interactions: u64,
    pub deaths: u32,
}

impl PetState {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut pet = Self {
            name: name.into(),
            age: 0,
            hunger: 50,
            happiness: 75,
            energy: 100,
            is_alive: true,
            current_mood: String::new(),
            last_fed: now,
            last_played: now,
            last_slept: now,
            last_pet: now,
            created_at: now,
            total_interactions: 0,
            deaths: 0,
        };
        pet.update_mood();
        pet
    }

    /// Derive the mood emoji from the current stats
    pub fn mood_emoji(&self) -> &'static str {
        if !self.is_alive {
            return "💀";
        }

        // Critical states win over everything else
        if self.hunger >= 90 {
            return "😵";
        }
        if self.energy <= 10 {
            return "😴";
        }
        if self.happiness <= 10 {
            return "😢";
        }

        if self.happiness >= 80 && self.energy >= 70 {
            "😊"
        } else if self.happiness >= 60 {
            "🙂"
        } else if self.happiness >= 40 {
            NEUTRAL_MOOD
        } else {
            "😔"
        }
    }

    pub fn update_mood(&mut self) {
        self.current_mood = self.mood_emoji().to_string();
    }

    pub fn should_die(&self) -> bool {
        self.hunger >= STAT_MAX || self.happiness <= STAT_MIN || self.energy <= STAT_MIN
    }

    pub fn kill(&mut self) {
        self.is_alive = false;
        self.deaths += 1;
        self.update_mood();
    }

    /// Bring the pet back with moderate stats
    pub fn revive(&mut self) {
        self.is_alive = true;
        self.hunger = 60;
        self.happiness = 50;
        self.energy = 70;
        self.update_mood();
    }
}

/// Outcome of a state-changing action, as reported by the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub stat_changes: StatChanges,
    #[serde(default)]
    pub new_mood: String,
}

impl ActionResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            stat_changes: StatChanges::new(),
            new_mood: String::new(),
        }
    }
}

/// The fixed set of state-changing actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PetAction {
    Feed,
    Play,
    Sleep,
    Pet,
    Revive,
}

impl PetAction {
    pub const ALL: [PetAction; 5] = [
        PetAction::Feed,
        PetAction::Play,
        PetAction::Sleep,
        PetAction::Pet,
        PetAction::Revive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PetAction::Feed => "feed",
            PetAction::Play => "play",
            PetAction::Sleep => "sleep",
            PetAction::Pet => "pet",
            PetAction::Revive => "revive",
        }
    }
}

impl fmt::Display for PetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for PetAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PetAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
