//! Top lotteries and animals.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;
use taquilla_types::{Bet, Cents};

pub const TOP_LOTTERIES: usize = 5;
pub const TOP_ANIMALS: usize = 10;

/// What a ranking orders by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ranking {
    Sales,
    Count,
}

/// Bets grouped under one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct RankedEntity {
    pub key: String,
    pub name: String,
    pub count: u64,
    pub sales: Cents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct AnimalRank {
    pub number: String,
    pub name: String,
    pub count: u64,
    pub sales: Cents,
}

struct Tally<K> {
    key: K,
    name: String,
    count: u64,
    sales: Cents,
}

/// Groups appear in discovery order before sorting and the sort is stable,
/// so ties keep discovery order. The display name is the one seen last.
fn tally<K, F>(bets: &[Bet], key_of: F, ranking: Ranking, limit: usize) -> Vec<Tally<K>>
where
    K: Eq + Hash + Clone,
    F: Fn(&Bet) -> (K, String),
{
    let mut groups: Vec<Tally<K>> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();

    for bet in bets {
        let (key, name) = key_of(bet);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Tally {
                key,
                name: String::new(),
                count: 0,
                sales: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.name = name;
        group.count += 1;
        group.sales += bet.amount;
    }

    match ranking {
        Ranking::Sales => groups.sort_by(|a, b| b.sales.cmp(&a.sales)),
        Ranking::Count => groups.sort_by(|a, b| b.count.cmp(&a.count)),
    }
    groups.truncate(limit);
    groups
}

/// Group bets by `key_of` (returning key and display name), rank by
/// `ranking` descending and keep the first `limit`.
pub fn top_entities<F>(bets: &[Bet], key_of: F, ranking: Ranking, limit: usize) -> Vec<RankedEntity>
where
    F: Fn(&Bet) -> (String, String),
{
    tally(bets, key_of, ranking, limit)
        .into_iter()
        .map(|t| RankedEntity {
            key: t.key,
            name: t.name,
            count: t.count,
            sales: t.sales,
        })
        .collect()
}

/// Lotteries with the highest sales.
pub fn top_lotteries(bets: &[Bet]) -> Vec<RankedEntity> {
    top_entities(
        bets,
        |b| (b.lottery_id.clone(), b.lottery_name.clone()),
        Ranking::Sales,
        TOP_LOTTERIES,
    )
}

/// Most-played animals. Number and name together identify an animal.
pub fn top_animals(bets: &[Bet]) -> Vec<AnimalRank> {
    tally(
        bets,
        |b| ((b.animal_number.clone(), b.animal_name.clone()), b.animal_name.clone()),
        Ranking::Count,
        TOP_ANIMALS,
    )
    .into_iter()
    .map(|t| AnimalRank {
        number: t.key.0,
        name: t.name,
        count: t.count,
        sales: t.sales,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bet, wed};

    #[test]
    fn test_single_lottery() {
        let bets = vec![
            bet("Lotto Activo", ("1", "Carnero"), 100, wed(9, 0)),
            bet("Lotto Activo", ("2", "Toro"), 50, wed(9, 5)),
        ];
        let top = top_lotteries(&bets);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].sales, 150);
        assert_eq!(top[0].count, 2);
        assert_eq!(top[0].name, "Lotto Activo");
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let bets = vec![
            bet("Granjita", ("1", "Carnero"), 100, wed(9, 0)),
            bet("Lotto Activo", ("1", "Carnero"), 300, wed(9, 1)),
            bet("Selva Plus", ("1", "Carnero"), 100, wed(9, 2)),
        ];
        let top = top_lotteries(&bets);
        let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Lotto Activo", "Granjita", "Selva Plus"]);
    }

    #[test]
    fn test_limit() {
        let bets: Vec<Bet> = (0..8)
            .map(|i| bet(&format!("L{i}"), ("1", "Carnero"), 10 + i, wed(9, 0)))
            .collect();
        let top = top_lotteries(&bets);
        assert_eq!(top.len(), TOP_LOTTERIES);
        assert_eq!(top[0].name, "L7");
    }

    #[test]
    fn test_animals_by_count_with_composite_key() {
        let bets = vec![
            bet("Granjita", ("0", "Delfín"), 500, wed(9, 0)),
            bet("Granjita", ("00", "Ballena"), 10, wed(9, 1)),
            bet("Lotto Activo", ("00", "Ballena"), 10, wed(9, 2)),
        ];
        let top = top_animals(&bets);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].number, "00");
        assert_eq!(top[0].name, "Ballena");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].number, "0");
    }

    #[test]
    fn test_empty() {
        assert!(top_lotteries(&[]).is_empty());
        assert!(top_animals(&[]).is_empty());
    }

    #[test]
    fn test_animal_fields_with_hyphens_survive_grouping() {
        let bets = vec![
            bet("Granjita", ("1-A", "Oso-Hormiguero"), 20, wed(9, 0)),
            bet("Granjita", ("1-A", "Oso-Hormiguero"), 30, wed(9, 1)),
            bet("Granjita", ("1", "A-Oso-Hormiguero"), 10, wed(9, 2)),
        ];
        let top = top_animals(&bets);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].number, "1-A");
        assert_eq!(top[0].name, "Oso-Hormiguero");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[0].sales, 50);
        assert_eq!(top[1].number, "1");
    }
}
