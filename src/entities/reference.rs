// 🗂️ Reference Data - sectors, job roles, shift schedules, cities
//
// Small lookup tables behind the contract and address forms. Sector and
// role names are stored denormalized on contracts, so these registries
// only feed dropdowns and uniqueness checks.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// NAMED ITEMS (sectors, job roles)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedItem {
    pub id: i64,
    pub name: String,
}

/// Registry of unique names, used for both sectors and job roles.
pub struct NamedItemRegistry {
    items: Vec<NamedItem>,
    next_id: i64,
}

impl NamedItemRegistry {
    pub fn new() -> Self {
        NamedItemRegistry {
            items: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, name: &str) -> Result<i64, String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err("name cannot be empty".to_string());
        }

        if self
            .items
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(trimmed))
        {
            return Err(format!("name already exists: {}", trimmed));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.items.push(NamedItem {
            id,
            name: trimmed.to_string(),
        });
        Ok(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&NamedItem> {
        self.items
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn all(&self) -> &[NamedItem] {
        &self.items
    }
}

impl Default for NamedItemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SHIFT SCHEDULE
// ============================================================================

/// Daily working-hours template referenced by contracts: two mandatory
/// shifts plus an optional extra one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftSchedule {
    pub id: i64,

    pub first_shift_start: NaiveTime,
    pub first_shift_end: NaiveTime,
    pub second_shift_start: NaiveTime,
    pub second_shift_end: NaiveTime,

    pub extra_shift_start: Option<NaiveTime>,
    pub extra_shift_end: Option<NaiveTime>,
}

impl ShiftSchedule {
    pub fn validate(&self) -> Result<(), String> {
        if self.first_shift_start >= self.first_shift_end {
            return Err("first shift start must be before its end".to_string());
        }
        if self.second_shift_start >= self.second_shift_end {
            return Err("second shift start must be before its end".to_string());
        }
        if self.second_shift_start < self.first_shift_end {
            return Err("second shift cannot overlap the first".to_string());
        }

        match (self.extra_shift_start, self.extra_shift_end) {
            (Some(start), Some(end)) if start >= end => {
                Err("extra shift start must be before its end".to_string())
            }
            (Some(_), None) | (None, Some(_)) => {
                Err("extra shift needs both start and end".to_string())
            }
            _ => Ok(()),
        }
    }
}

pub struct ShiftScheduleRegistry {
    schedules: Vec<ShiftSchedule>,
    next_id: i64,
}

impl ShiftScheduleRegistry {
    pub fn new() -> Self {
        ShiftScheduleRegistry {
            schedules: Vec::new(),
            next_id: 1,
        }
    }

    pub fn register(&mut self, mut schedule: ShiftSchedule) -> Result<i64, String> {
        schedule.validate()?;

        schedule.id = self.next_id;
        self.next_id += 1;

        let id = schedule.id;
        self.schedules.push(schedule);
        Ok(id)
    }

    pub fn find_by_id(&self, id: i64) -> Option<&ShiftSchedule> {
        self.schedules.iter().find(|s| s.id == id)
    }
}

impl Default for ShiftScheduleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CITIES
// ============================================================================

/// City keyed by its 7-digit IBGE code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub ibge_code: String,
    pub name: String,
    pub state_uf: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub region: Option<String>,
}

pub struct CityRegistry {
    cities: Vec<City>,
}

impl CityRegistry {
    pub fn new() -> Self {
        CityRegistry { cities: Vec::new() }
    }

    pub fn register(&mut self, city: City) -> Result<(), String> {
        if city.ibge_code.len() != 7 || !city.ibge_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("IBGE code must be 7 digits: {}", city.ibge_code));
        }

        if self.cities.iter().any(|c| c.ibge_code == city.ibge_code) {
            return Err(format!("IBGE code already registered: {}", city.ibge_code));
        }

        self.cities.push(city);
        Ok(())
    }

    pub fn find_by_code(&self, ibge_code: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.ibge_code == ibge_code)
    }

    /// Cities of one state, name-sorted, for the address dropdowns.
    pub fn by_state(&self, state_uf: &str) -> Vec<&City> {
        let uf = state_uf.to_uppercase();
        let mut cities: Vec<&City> = self
            .cities
            .iter()
            .filter(|c| c.state_uf.eq_ignore_ascii_case(&uf))
            .collect();
        cities.sort_by(|a, b| a.name.cmp(&b.name));
        cities
    }

    /// Distinct state codes, sorted.
    pub fn states(&self) -> Vec<String> {
        let mut states: Vec<String> = self.cities.iter().map(|c| c.state_uf.clone()).collect();
        states.sort();
        states.dedup();
        states
    }
}

impl Default for CityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_named_items_unique_case_insensitive() {
        let mut sectors = NamedItemRegistry::new();
        sectors.add("Production").unwrap();

        assert!(sectors.add("production").is_err());
        assert!(sectors.add("  ").is_err());
        assert!(sectors.find_by_name("PRODUCTION").is_some());
    }

    #[test]
    fn test_shift_schedule_validation() {
        let mut registry = ShiftScheduleRegistry::new();

        let schedule = ShiftSchedule {
            id: 0,
            first_shift_start: time(8, 0),
            first_shift_end: time(12, 0),
            second_shift_start: time(13, 0),
            second_shift_end: time(17, 30),
            extra_shift_start: None,
            extra_shift_end: None,
        };
        let id = registry.register(schedule.clone()).unwrap();
        assert!(registry.find_by_id(id).is_some());

        let mut overlapping = schedule.clone();
        overlapping.second_shift_start = time(11, 0);
        assert!(registry.register(overlapping).is_err());

        let mut half_extra = schedule;
        half_extra.extra_shift_start = Some(time(18, 0));
        assert!(registry.register(half_extra).is_err());
    }

    #[test]
    fn test_city_registry() {
        let mut registry = CityRegistry::new();
        registry
            .register(City {
                ibge_code: "3550308".to_string(),
                name: "São Paulo".to_string(),
                state_uf: "SP".to_string(),
                latitude: None,
                longitude: None,
                region: Some("Sudeste".to_string()),
            })
            .unwrap();
        registry
            .register(City {
                ibge_code: "3509502".to_string(),
                name: "Campinas".to_string(),
                state_uf: "SP".to_string(),
                latitude: None,
                longitude: None,
                region: Some("Sudeste".to_string()),
            })
            .unwrap();

        // Name-sorted within a state, case-insensitive UF
        let sp = registry.by_state("sp");
        assert_eq!(sp.len(), 2);
        assert_eq!(sp[0].name, "Campinas");

        assert_eq!(registry.states(), vec!["SP".to_string()]);
        assert!(registry
            .register(City {
                ibge_code: "3550308".to_string(),
                name: "Duplicate".to_string(),
                state_uf: "SP".to_string(),
                latitude: None,
                longitude: None,
                region: None,
            })
            .is_err());

        assert!(registry
            .register(City {
                ibge_code: "12AB".to_string(),
                name: "Bad".to_string(),
                state_uf: "SP".to_string(),
                latitude: None,
                longitude: None,
                region: None,
            })
            .is_err());
    }
}
