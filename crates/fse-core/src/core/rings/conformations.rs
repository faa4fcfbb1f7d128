use super::chain::ChainIdentity;
use super::registry::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every ring-closing conformation found for one chain, each described by
/// its dihedral signature. An empty record means the chain cannot close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingClosingConformations {
    chain_id: ChainIdentity,
    conformations: Vec<Vec<f64>>,
}

impl RingClosingConformations {
    pub fn new(chain_id: ChainIdentity) -> Self {
        Self {
            chain_id,
            conformations: Vec::new(),
        }
    }

    pub fn from_parts(
        chain_id: ChainIdentity,
        conformations: Vec<Vec<f64>>,
    ) -> Result<Self, RegistryError> {
        let mut record = Self::new(chain_id);
        for signature in conformations {
            record.push(signature)?;
        }
        Ok(record)
    }

    /// Adds a signature; all signatures of a record have the same length.
    pub fn push(&mut self, signature: Vec<f64>) -> Result<(), RegistryError> {
        if let Some(expected) = self.signature_len() {
            if signature.len() != expected {
                return Err(RegistryError::LengthMismatch {
                    chain: self.chain_id.clone(),
                    expected,
                    found: signature.len(),
                });
            }
        }
        self.conformations.push(signature);
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), RegistryError> {
        let Some(expected) = self.signature_len() else {
            return Ok(());
        };
        match self.conformations.iter().find(|c| c.len() != expected) {
            Some(bad) => Err(RegistryError::LengthMismatch {
                chain: self.chain_id.clone(),
                expected,
                found: bad.len(),
            }),
            None => Ok(()),
        }
    }

    pub fn chain_id(&self) -> &ChainIdentity {
        &self.chain_id
    }

    pub fn conformations(&self) -> &[Vec<f64>] {
        &self.conformations
    }

    pub fn number_of_conformations(&self) -> usize {
        self.conformations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conformations.is_empty()
    }

    pub fn signature_len(&self) -> Option<usize> {
        self.conformations.first().map(Vec::len)
    }

    /// Whether a stored conformation matches `signature` within `tolerance_deg`
    /// on every dihedral, comparing angles on the circle.
    pub fn contains_similar(&self, signature: &[f64], tolerance_deg: f64) -> bool {
        self.conformations.iter().any(|stored| {
            stored.len() == signature.len()
                && stored
                    .iter()
                    .zip(signature)
                    .all(|(a, b)| angular_gap(*a, *b) <= tolerance_deg)
        })
    }
}

fn angular_gap(a: f64, b: f64) -> f64 {
    let gap = (a - b).rem_euclid(360.0);
    gap.min(360.0 - gap)
}

impl fmt::Display for RingClosingConformations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} ring-closing conformations)",
            self.chain_id,
            self.conformations.len()
        )
    }
}
