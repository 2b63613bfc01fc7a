use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

impl AbilityScores {
    pub const NAMES: [&'static str; 6] = [
        "strength",
        "dexterity",
        "constitution",
        "intelligence",
        "wisdom",
        "charisma",
    ];

    /// Mutable access by lowercase ability name, in [`Self::NAMES`] order.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut i32> {
        match name {
            "strength" => Some(&mut self.strength),
            "dexterity" => Some(&mut self.dexterity),
            "constitution" => Some(&mut self.constitution),
            "intelligence" => Some(&mut self.intelligence),
            "wisdom" => Some(&mut self.wisdom),
            "charisma" => Some(&mut self.charisma),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackSpec {
    pub name: String,
    pub attack_bonus: i32,
    pub damage_dice: String, // "XdY"
    pub damage_bonus: i32,
    pub damage_type: String,
    /// Feet.
    #[serde(default = "default_reach")]
    pub reach: u32,
}

fn default_reach() -> u32 {
    5
}

/// Body of a join request: everything the server needs to seat a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub name: String,
    pub owner_id: String,
    pub ability_scores: AbilityScores,
    pub max_hp: u32,
    pub armor_class: u32,
    pub speed: u32,
    pub attacks: Vec<AttackSpec>,
}

impl CharacterSheet {
    /// Starting point for the interactive builder; every field has a usable default.
    pub fn custom() -> Self {
        Self {
            name: "Custom Hero".to_string(),
            owner_id: "custom_player".to_string(),
            ability_scores: AbilityScores::default(),
            max_hp: 25,
            armor_class: 14,
            speed: 30,
            attacks: vec![AttackSpec {
                name: "Shortsword".to_string(),
                attack_bonus: 4,
                damage_dice: "1d6".to_string(),
                damage_bonus: 2,
                damage_type: "slashing".to_string(),
                reach: default_reach(),
            }],
        }
    }
}
