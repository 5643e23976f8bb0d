use crate::UniverseError;
use std::{fmt, str::FromStr};

/// Neighbours of the cell at bit 5 of a 4x4 bitmask (row stride 4), the cell excluded.
const NEIGHBOURS_MASK: u16 = 0x757;
/// The cell itself.
const CENTER_MASK: u16 = 0x20;

/// Population count of every value a masked neighbourhood can take.
const BITCOUNTS: [u8; NEIGHBOURS_MASK as usize + 1] = {
    let mut table = [0; NEIGHBOURS_MASK as usize + 1];
    let mut i = 0;
    while i < table.len() {
        table[i] = (i as u16).count_ones() as u8;
        i += 1;
    }
    table
};

/// Birth/survival rule of a two-state Life-like automaton.
///
/// Bit `i` of `birth` (`survival`) is set when a dead (live) cell with `i` live
/// neighbours is alive in the next generation. Only bits 0..=8 are meaningful.
///
/// The textual form is the usual rulestring: `B3/S23` (also `b3s23`), or the
/// letterless `S/B` form `23/3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    birth: u16,
    survival: u16,
}

impl Rule {
    const COUNTS_MASK: u16 = 0x1FF;

    /// Conway's Game of Life, B3/S23.
    pub const fn conway() -> Self {
        Self {
            birth: 1 << 3,
            survival: 1 << 2 | 1 << 3,
        }
    }

    /// Creates a rule from birth and survival bitmasks over neighbour counts 0..=8.
    pub fn new(birth: u16, survival: u16) -> Result<Self, UniverseError> {
        if birth & !Self::COUNTS_MASK != 0 || survival & !Self::COUNTS_MASK != 0 {
            return Err(UniverseError::InvalidRule(format!(
                "bitmasks {birth:#x}/{survival:#x} mention neighbour counts above 8"
            )));
        }
        Ok(Self { birth, survival })
    }

    /// Creates a rule from lists of neighbour counts.
    pub fn from_counts(birth: &[u8], survival: &[u8]) -> Result<Self, UniverseError> {
        let to_mask = |counts: &[u8]| -> Result<u16, UniverseError> {
            counts.iter().try_fold(0u16, |mask, &n| {
                if n > 8 {
                    Err(UniverseError::InvalidRule(format!(
                        "neighbour count {n} is above 8"
                    )))
                } else {
                    Ok(mask | 1 << n)
                }
            })
        };
        Self::new(to_mask(birth)?, to_mask(survival)?)
    }

    pub fn birth(&self) -> u16 {
        self.birth
    }

    pub fn survival(&self) -> u16 {
        self.survival
    }

    /// Whether the empty background would come alive under this rule.
    pub fn births_on_empty(&self) -> bool {
        self.birth & 1 != 0
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::conway()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = |mask: u16| -> String {
            (0..=8u16)
                .filter(|&i| (mask >> i) & 1 != 0)
                .map(|i| char::from(b'0' + i as u8))
                .collect()
        };
        write!(f, "B{}/S{}", digits(self.birth), digits(self.survival))
    }
}

impl FromStr for Rule {
    type Err = UniverseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || UniverseError::InvalidRule(format!("cannot parse rulestring {s:?}"));

        let digits_to_mask = |digits: &str| -> Result<u16, UniverseError> {
            digits.chars().try_fold(0u16, |mask, c| match c.to_digit(10) {
                Some(n) if n <= 8 => Ok(mask | 1 << n),
                _ => Err(invalid()),
            })
        };

        let s = s.trim();
        if !s.contains(['b', 'B', 's', 'S']) {
            // S/B notation, survival first
            let (survival, birth) = s.split_once('/').ok_or_else(invalid)?;
            return Self::new(digits_to_mask(birth)?, digits_to_mask(survival)?);
        }

        enum Part {
            None,
            Birth,
            Survival,
        }

        let (mut birth, mut survival) = (0u16, 0u16);
        let (mut seen_birth, mut seen_survival) = (false, false);
        let mut part = Part::None;
        for c in s.chars() {
            match c {
                'b' | 'B' if !seen_birth => {
                    part = Part::Birth;
                    seen_birth = true;
                }
                's' | 'S' if !seen_survival => {
                    part = Part::Survival;
                    seen_survival = true;
                }
                '/' => {}
                c => {
                    let n = c.to_digit(10).filter(|&n| n <= 8).ok_or_else(invalid)?;
                    match part {
                        Part::Birth => birth |= 1 << n,
                        Part::Survival => survival |= 1 << n,
                        Part::None => return Err(invalid()),
                    }
                }
            }
        }
        if !seen_birth || !seen_survival {
            return Err(invalid());
        }
        Self::new(birth, survival)
    }
}

/// Constant-time evaluation of a [`Rule`] on 4x4 neighbourhood bitmasks.
///
/// Bit `y * 4 + x` of a bitmask is the cell in column `x` and row `y`; the cell
/// being evaluated sits at bit 5, its neighbours at bits 0, 1, 2, 4, 6, 8, 9, 10.
pub(crate) struct RuleTable {
    rule: Rule,
}

impl RuleTable {
    pub(crate) fn new(rule: Rule) -> Self {
        Self { rule }
    }

    pub(crate) fn rule(&self) -> Rule {
        self.rule
    }

    /// Returns `true` if the rule actually changed.
    pub(crate) fn set_rule(&mut self, rule: Rule) -> bool {
        let changed = self.rule != rule;
        self.rule = rule;
        changed
    }

    /// Next state of the cell at bit 5 of `bitmask`.
    #[inline]
    pub(crate) fn evaluate(&self, bitmask: u16) -> bool {
        let set = if bitmask & CENTER_MASK != 0 {
            self.rule.survival
        } else {
            self.rule.birth
        };
        let count = BITCOUNTS[(bitmask & NEIGHBOURS_MASK) as usize];
        (set >> count) & 1 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a bitmask from (x, y) cells of a 4x4 block.
    fn mask(cells: &[(u16, u16)]) -> u16 {
        cells.iter().fold(0, |m, &(x, y)| m | 1 << (y * 4 + x))
    }

    #[test]
    fn test_bitcounts() {
        assert_eq!(BITCOUNTS[0], 0);
        assert_eq!(BITCOUNTS[NEIGHBOURS_MASK as usize], 8);
        assert_eq!(BITCOUNTS[0b101], 2);
    }

    #[test]
    fn test_conway_evaluation() {
        let table = RuleTable::new(Rule::conway());
        // live cell at (1, 1)
        assert!(!table.evaluate(mask(&[(1, 1)])));
        assert!(!table.evaluate(mask(&[(1, 1), (0, 0)])));
        assert!(table.evaluate(mask(&[(1, 1), (0, 0), (2, 2)])));
        assert!(table.evaluate(mask(&[(1, 1), (0, 0), (2, 2), (1, 0)])));
        assert!(!table.evaluate(mask(&[(1, 1), (0, 0), (2, 2), (1, 0), (0, 1)])));
        // dead cell at (1, 1)
        assert!(!table.evaluate(mask(&[(0, 0), (2, 2)])));
        assert!(table.evaluate(mask(&[(0, 0), (2, 2), (0, 2)])));
        assert!(!table.evaluate(mask(&[(0, 0), (2, 2), (0, 2), (2, 0)])));
    }

    #[test]
    fn test_cells_outside_neighbourhood_are_ignored() {
        let table = RuleTable::new(Rule::conway());
        let born = mask(&[(0, 0), (1, 0), (2, 0)]);
        let noise = mask(&[(3, 0), (3, 1), (3, 2), (0, 3), (1, 3), (2, 3), (3, 3)]);
        assert!(table.evaluate(born));
        assert!(table.evaluate(born | noise));
    }

    #[test]
    fn test_set_rule_reports_change() {
        let mut table = RuleTable::new(Rule::conway());
        assert!(!table.set_rule(Rule::conway()));
        let highlife = Rule::from_counts(&[3, 6], &[2, 3]).unwrap();
        assert!(table.set_rule(highlife));
        let six = mask(&[(0, 0), (1, 0), (2, 0), (0, 1), (2, 1), (0, 2)]);
        assert!(table.evaluate(six));
    }

    #[test]
    fn test_rulestrings() {
        assert_eq!("B3/S23".parse::<Rule>().unwrap(), Rule::conway());
        assert_eq!("b3s23".parse::<Rule>().unwrap(), Rule::conway());
        assert_eq!("23/3".parse::<Rule>().unwrap(), Rule::conway());
        let highlife: Rule = "B36/S23".parse().unwrap();
        assert_eq!(highlife.birth(), 0b100_1000);
        assert_eq!(highlife.to_string(), "B36/S23");
        assert_eq!(Rule::conway().to_string(), "B3/S23");
        let seeds: Rule = "B2/S".parse().unwrap();
        assert_eq!(seeds.survival(), 0);
    }

    #[test]
    fn test_invalid_rules() {
        for s in ["", "B9/S23", "B3/S23x", "3", "B3", "B3/S2/S3", "12"] {
            assert!(s.parse::<Rule>().is_err(), "{s:?} should not parse");
        }
        assert!(Rule::new(1 << 9, 0).is_err());
        assert!(Rule::from_counts(&[9], &[]).is_err());
        assert!(Rule::from_counts(&[0, 3], &[]).unwrap().births_on_empty());
    }
}
