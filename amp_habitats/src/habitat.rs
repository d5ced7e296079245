//! Habitat vocabulary: raw habitat labels collapse into eight coarse groups,
//! and each coarse group carries a host-association flag.
//!
//! The built-in tables are plain data; [`HabitatTables::from_json_path`] swaps
//! them for a curated file without touching any pipeline code.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HabitatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HabitatGroup {
    #[serde(rename = "human gut")]
    HumanGut,
    #[serde(rename = "other human")]
    OtherHuman,
    #[serde(rename = "non-human mammal gut", alias = "mammal gut")]
    MammalGut,
    #[serde(rename = "other animal")]
    OtherAnimal,
    #[serde(rename = "soil/plant")]
    SoilPlant,
    #[serde(rename = "aquatic")]
    Aquatic,
    #[serde(rename = "anthropogenic")]
    Anthropogenic,
    #[serde(rename = "other")]
    Other,
}

impl HabitatGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitatGroup::HumanGut => "human gut",
            HabitatGroup::OtherHuman => "other human",
            HabitatGroup::MammalGut => "non-human mammal gut",
            HabitatGroup::OtherAnimal => "other animal",
            HabitatGroup::SoilPlant => "soil/plant",
            HabitatGroup::Aquatic => "aquatic",
            HabitatGroup::Anthropogenic => "anthropogenic",
            HabitatGroup::Other => "other",
        }
    }
}

impl fmt::Display for HabitatGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HabitatGroup {
    type Err = HabitatError;

    fn from_str(s: &str) -> Result<Self> {
        let group = match s.trim() {
            "human gut" => HabitatGroup::HumanGut,
            "other human" => HabitatGroup::OtherHuman,
            "non-human mammal gut" | "mammal gut" => HabitatGroup::MammalGut,
            "other animal" => HabitatGroup::OtherAnimal,
            "soil/plant" => HabitatGroup::SoilPlant,
            "aquatic" => HabitatGroup::Aquatic,
            "anthropogenic" => HabitatGroup::Anthropogenic,
            "other" => HabitatGroup::Other,
            other => return Err(HabitatError::UnknownHabitatGroup(other.to_string())),
        };
        Ok(group)
    }
}

// ─── Built-in tables ─────────────────────────────────────────────────────────

const HIGHER_LEVEL: &[(&str, HabitatGroup)] = &[
    ("sediment", HabitatGroup::Other),
    ("bird gut", HabitatGroup::OtherAnimal),
    ("cat gut", HabitatGroup::MammalGut),
    ("insect associated", HabitatGroup::OtherAnimal),
    ("human urogenital tract", HabitatGroup::OtherHuman),
    ("dog gut", HabitatGroup::MammalGut),
    ("fermented food", HabitatGroup::Anthropogenic),
    ("groundwater", HabitatGroup::Aquatic),
    ("coral associated", HabitatGroup::OtherAnimal),
    ("rat gut", HabitatGroup::MammalGut),
    ("human associated", HabitatGroup::OtherHuman),
    ("cattle gut", HabitatGroup::MammalGut),
    ("deer gut", HabitatGroup::MammalGut),
    ("mouse gut", HabitatGroup::MammalGut),
    ("river associated", HabitatGroup::Aquatic),
    ("primate gut", HabitatGroup::MammalGut),
    ("human respiratory tract", HabitatGroup::OtherHuman),
    ("cattle rumen", HabitatGroup::OtherAnimal),
    ("human saliva", HabitatGroup::OtherHuman),
    ("activated sludge", HabitatGroup::Anthropogenic),
    ("lake associated", HabitatGroup::Aquatic),
    ("wastewater", HabitatGroup::Anthropogenic),
    ("chicken gut", HabitatGroup::OtherAnimal),
    ("air", HabitatGroup::Other),
    ("human mouth", HabitatGroup::OtherHuman),
    ("plant associated", HabitatGroup::SoilPlant),
    ("water associated", HabitatGroup::Aquatic),
    ("pig gut", HabitatGroup::MammalGut),
    ("human skin", HabitatGroup::OtherHuman),
    ("marine", HabitatGroup::Aquatic),
    ("soil", HabitatGroup::SoilPlant),
    ("built environment", HabitatGroup::Anthropogenic),
    ("human gut", HabitatGroup::HumanGut),
    ("anthropogenic", HabitatGroup::Anthropogenic),
    ("bear gut", HabitatGroup::MammalGut),
    ("bee gut", HabitatGroup::OtherAnimal),
    ("bat gut", HabitatGroup::MammalGut),
    ("dog associated", HabitatGroup::OtherAnimal),
    ("cattle associated", HabitatGroup::OtherAnimal),
    ("crustacean associated", HabitatGroup::OtherAnimal),
    ("insect gut", HabitatGroup::OtherAnimal),
    ("goat gut", HabitatGroup::MammalGut),
    ("rodent gut", HabitatGroup::MammalGut),
    ("fisher gut", HabitatGroup::MammalGut),
    ("human digestive tract", HabitatGroup::OtherHuman),
    ("coyote gut", HabitatGroup::MammalGut),
    ("planarian associated", HabitatGroup::OtherAnimal),
    ("sponge associated", HabitatGroup::OtherAnimal),
    ("goat rumen", HabitatGroup::OtherAnimal),
    ("crustacean gut", HabitatGroup::OtherAnimal),
    ("annelidae associated", HabitatGroup::OtherAnimal),
    ("bird skin", HabitatGroup::OtherAnimal),
    ("beatle gut", HabitatGroup::OtherAnimal),
    ("termite gut", HabitatGroup::OtherAnimal),
    ("fish gut", HabitatGroup::OtherAnimal),
    ("mollusc associated", HabitatGroup::OtherAnimal),
    ("ship worm associated", HabitatGroup::OtherAnimal),
    ("rabbit gut", HabitatGroup::MammalGut),
    ("tunicate associated", HabitatGroup::OtherAnimal),
    ("mussel associated", HabitatGroup::OtherAnimal),
    ("horse gut", HabitatGroup::MammalGut),
    ("wasp gut", HabitatGroup::OtherAnimal),
    ("guinea pig gut", HabitatGroup::MammalGut),
];

const HOST_ASSOCIATED: &[(HabitatGroup, bool)] = &[
    (HabitatGroup::HumanGut, true),
    (HabitatGroup::SoilPlant, false),
    (HabitatGroup::Aquatic, false),
    (HabitatGroup::Anthropogenic, false),
    (HabitatGroup::OtherHuman, true),
    (HabitatGroup::MammalGut, true),
    (HabitatGroup::OtherAnimal, true),
    (HabitatGroup::Other, false),
];

/// On-disk layout of a habitat table override.
#[derive(Debug, Deserialize)]
struct HabitatTablesFile {
    higher_level: BTreeMap<String, String>,
    host_associated: BTreeMap<String, bool>,
}

/// The two lookup tables used by the normalizer.
#[derive(Debug, Clone)]
pub struct HabitatTables {
    higher_level: BTreeMap<String, HabitatGroup>,
    host_associated: BTreeMap<HabitatGroup, bool>,
}

impl Default for HabitatTables {
    fn default() -> Self {
        Self {
            higher_level: HIGHER_LEVEL
                .iter()
                .map(|&(label, group)| (label.to_string(), group))
                .collect(),
            host_associated: HOST_ASSOCIATED.iter().copied().collect(),
        }
    }
}

impl HabitatTables {
    pub fn new(
        higher_level: BTreeMap<String, HabitatGroup>,
        host_associated: BTreeMap<HabitatGroup, bool>,
    ) -> Self {
        Self { higher_level, host_associated }
    }

    /// Reads an override file and validates it before returning.
    pub fn from_json_path(path: &Path) -> Result<Self> {
        info!("Reading habitat tables from {}", path.display());
        let file = std::fs::File::open(path)?;
        let raw: HabitatTablesFile = serde_json::from_reader(std::io::BufReader::new(file))?;

        let higher_level = raw
            .higher_level
            .into_iter()
            .map(|(label, group)| Ok((label, group.parse()?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let host_associated = raw
            .host_associated
            .into_iter()
            .map(|(group, flag)| Ok((group.parse()?, flag)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let tables = Self::new(higher_level, host_associated);
        tables.validate()?;
        Ok(tables)
    }

    /// Coarse group for a raw label; unmapped labels fall into `other`.
    /// Lookup is exact, so padded labels are unmapped.
    pub fn normalize(&self, label: &str) -> HabitatGroup {
        self.higher_level
            .get(label)
            .copied()
            .unwrap_or(HabitatGroup::Other)
    }

    pub fn host_associated(&self, group: HabitatGroup) -> Result<bool> {
        self.host_associated
            .get(&group)
            .copied()
            .ok_or_else(|| HabitatError::MissingCategoryMapping {
                group: group.to_string(),
            })
    }

    pub fn classify(&self, label: &str) -> Result<(HabitatGroup, bool)> {
        let group = self.normalize(label);
        Ok((group, self.host_associated(group)?))
    }

    /// Every group `normalize` can return must have a host-association entry.
    pub fn validate(&self) -> Result<()> {
        for group in self
            .higher_level
            .values()
            .copied()
            .chain(std::iter::once(HabitatGroup::Other))
        {
            self.host_associated(group)?;
        }
        debug!(
            "Habitat tables valid: {} labels, {} host entries",
            self.higher_level.len(),
            self.host_associated.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ALL: [HabitatGroup; 8] = [
        HabitatGroup::HumanGut,
        HabitatGroup::OtherHuman,
        HabitatGroup::MammalGut,
        HabitatGroup::OtherAnimal,
        HabitatGroup::SoilPlant,
        HabitatGroup::Aquatic,
        HabitatGroup::Anthropogenic,
        HabitatGroup::Other,
    ];

    #[test]
    fn normalize_is_total_over_the_enumeration() {
        let tables = HabitatTables::default();
        for label in ["human gut", "cat gut", "marine", "volcano", "", "  soil  "] {
            let group = tables.normalize(label);
            assert!(ALL.contains(&group), "{label} -> {group}");
        }
        assert_eq!(tables.normalize("volcano"), HabitatGroup::Other);
        assert_eq!(tables.normalize("soil"), HabitatGroup::SoilPlant);
        assert_eq!(tables.normalize("  soil  "), HabitatGroup::Other);
        assert_eq!(tables.normalize("Soil"), HabitatGroup::Other);
    }

    #[test]
    fn builtin_tables_cover_every_group() {
        let tables = HabitatTables::default();
        tables.validate().unwrap();
        for group in ALL {
            assert!(tables.host_associated(group).is_ok());
        }
        assert_eq!(tables.classify("pig gut").unwrap(), (HabitatGroup::MammalGut, true));
        assert_eq!(tables.classify("wastewater").unwrap(), (HabitatGroup::Anthropogenic, false));
    }

    #[test]
    fn missing_host_entry_fails_loudly() {
        let mut host = BTreeMap::new();
        host.insert(HabitatGroup::HumanGut, true);
        let mut higher = BTreeMap::new();
        higher.insert("human gut".to_string(), HabitatGroup::HumanGut);
        let tables = HabitatTables::new(higher, host);

        match tables.classify("marine") {
            Err(HabitatError::MissingCategoryMapping { group }) => assert_eq!(group, "other"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(tables.validate().is_err());
    }

    #[test]
    fn group_names_round_trip_and_accept_alias() {
        for group in ALL {
            assert_eq!(group.as_str().parse::<HabitatGroup>().unwrap(), group);
        }
        assert_eq!("mammal gut".parse::<HabitatGroup>().unwrap(), HabitatGroup::MammalGut);
        assert!("reef".parse::<HabitatGroup>().is_err());
    }

    #[test]
    fn override_file_is_parsed_and_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"higher_level": {{"cave": "other", "cat gut": "mammal gut"}},
                "host_associated": {{"other": false, "non-human mammal gut": true}}}}"#
        )
        .unwrap();
        let tables = HabitatTables::from_json_path(file.path()).unwrap();
        assert_eq!(tables.classify("cat gut").unwrap(), (HabitatGroup::MammalGut, true));
        assert_eq!(tables.normalize("cave"), HabitatGroup::Other);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(
            bad,
            r#"{{"higher_level": {{"cat gut": "mammal gut"}}, "host_associated": {{"other": false}}}}"#
        )
        .unwrap();
        assert!(matches!(
            HabitatTables::from_json_path(bad.path()),
            Err(HabitatError::MissingCategoryMapping { .. })
        ));
    }
}
