use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Pair, Symbol};

/// Sector name → duplicate-free list of member symbols, as delivered by
/// the reference-data collaborator.
pub type SectorMap = BTreeMap<String, Vec<Symbol>>;

/// All unordered pairs that can be formed within each sector. A sector
/// with n symbols yields exactly n(n-1)/2 pairs; pairs never cross
/// sector boundaries.
pub fn enumerate_pairs(sectors: &SectorMap) -> Vec<Pair> {
    let mut pairs = Vec::new();
    for symbols in sectors.values() {
        for i in 0..symbols.len() {
            for j in (i + 1)..symbols.len() {
                if let Ok(pair) = Pair::new(symbols[i].clone(), symbols[j].clone()) {
                    pairs.push(pair);
                }
            }
        }
    }
    pairs
}

/// Per-sector universe size summary for the reporting collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorPairCounts {
    pub sector: String,
    pub num_stocks: usize,
    pub num_pairs: usize,
}

/// Stock and pair counts per sector, with a final "Sum" row totalling
/// the universe.
pub fn pair_counts(sectors: &SectorMap) -> Vec<SectorPairCounts> {
    let mut rows: Vec<SectorPairCounts> = sectors
        .iter()
        .map(|(sector, symbols)| {
            let n = symbols.len();
            SectorPairCounts {
                sector: sector.clone(),
                num_stocks: n,
                num_pairs: n * n.saturating_sub(1) / 2,
            }
        })
        .collect();
    let total_stocks: usize = rows.iter().map(|r| r.num_stocks).sum();
    let total_pairs: usize = rows.iter().map(|r| r.num_pairs).sum();
    rows.push(SectorPairCounts {
        sector: "Sum".to_string(),
        num_stocks: total_stocks,
        num_pairs: total_pairs,
    });
    rows
}
