use std::fmt;
use std::ops::AddAssign;

/// Potential energy of a system split by force term, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnergyBreakdown {
    terms: Vec<(String, f64)>,
}

impl EnergyBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `energy` under `name`, adding to an existing entry of the same name.
    pub fn add(&mut self, name: &str, energy: f64) {
        match self.terms.iter_mut().find(|(n, _)| n == name) {
            Some((_, e)) => *e += energy,
            None => self.terms.push((name.to_string(), energy)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.terms.iter().find(|(n, _)| n == name).map(|(_, e)| *e)
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.terms.iter().map(|(_, e)| e).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.terms.iter().map(|(n, e)| (n.as_str(), *e))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Divides every entry by `n`, used to report energies per bead.
    pub fn per_bead(&self, n: usize) -> Self {
        let n = n.max(1) as f64;
        Self {
            terms: self.terms.iter().map(|(k, e)| (k.clone(), e / n)).collect(),
        }
    }
}

impl AddAssign<&EnergyBreakdown> for EnergyBreakdown {
    fn add_assign(&mut self, rhs: &EnergyBreakdown) {
        for (name, energy) in rhs.iter() {
            self.add(name, energy);
        }
    }
}

impl fmt::Display for EnergyBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.names().map(str::len).max().unwrap_or(0).max(5);
        for (name, energy) in self.iter() {
            writeln!(f, "{:<width$}  {:>14.6}", name, energy, width = width)?;
        }
        write!(f, "{:<width$}  {:>14.6}", "Total", self.total(), width = width)
    }
}
