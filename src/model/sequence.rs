use serde::{Deserialize, Serialize};

use super::measure::Measure;
use super::pulse::PulseState;
use crate::error::ValidationError;

/// What changed in a sequence, so the transport can keep its position valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEdit {
    Added(usize),
    Removed(usize),
    Resized(usize),
    PulseChanged(usize),
    Replaced,
}

/// Measures in playback order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence {
    measures: Vec<Measure>,
}

impl Sequence {
    pub fn new(measures: Vec<Measure>) -> Self {
        Self { measures }
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Measure> {
        self.measures.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measure> {
        self.measures.iter()
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    fn measure_mut(&mut self, index: usize) -> Result<&mut Measure, ValidationError> {
        let len = self.measures.len();
        self.measures
            .get_mut(index)
            .ok_or(ValidationError::NoSuchMeasure { index, len })
    }

    pub fn push(&mut self, measure: Measure) -> SequenceEdit {
        self.measures.push(measure);
        SequenceEdit::Added(self.measures.len() - 1)
    }

    pub fn add_default(&mut self) -> SequenceEdit {
        self.push(Measure::default())
    }

    pub fn remove(&mut self, index: usize) -> Result<(Measure, SequenceEdit), ValidationError> {
        let len = self.measures.len();
        if index >= len {
            return Err(ValidationError::NoSuchMeasure { index, len });
        }
        Ok((self.measures.remove(index), SequenceEdit::Removed(index)))
    }

    pub fn set_subdivisions(
        &mut self,
        index: usize,
        subdivisions: i64,
    ) -> Result<SequenceEdit, ValidationError> {
        self.measure_mut(index)?.set_subdivisions(subdivisions)?;
        Ok(SequenceEdit::Resized(index))
    }

    pub fn rotate_pulse(
        &mut self,
        index: usize,
        pulse: usize,
    ) -> Result<(PulseState, SequenceEdit), ValidationError> {
        let state = self.measure_mut(index)?.rotate_pulse(pulse)?;
        Ok((state, SequenceEdit::PulseChanged(index)))
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Measure;
    type IntoIter = std::slice::Iter<'a, Measure>;

    fn into_iter(self) -> Self::IntoIter {
        self.measures.iter()
    }
}
